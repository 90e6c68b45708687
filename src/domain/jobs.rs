use super::error::JobError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Format the finished result is delivered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Annotation,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Table => ".csv",
            OutputFormat::Json => ".json",
            OutputFormat::Annotation => ".eaf",
        }
    }
}

/// Selected keypoint identifiers, per group, in selection order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypoints {
    #[serde(default)]
    pub left: Vec<u32>,
    #[serde(default)]
    pub right: Vec<u32>,
    #[serde(default)]
    pub body: Vec<u32>,
}

impl Keypoints {
    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty() && self.body.is_empty()
    }
}

/// Analysis parameters for one submitted file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Detection threshold
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// A movement must last at least this many frames
    #[serde(default = "default_cutoff")]
    pub min_cutoff: u32,
    /// Movements closer than this many frames are merged
    #[serde(default = "default_cutoff")]
    pub gap_cutoff: u32,
    #[serde(default)]
    pub keypoints: Keypoints,
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_threshold() -> f64 {
    0.3
}

fn default_cutoff() -> u32 {
    4
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            min_cutoff: default_cutoff(),
            gap_cutoff: default_cutoff(),
            keypoints: Keypoints::default(),
            format: OutputFormat::default(),
        }
    }
}

/// Non-fatal condition reported by a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobWarning {
    NoDetections,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Running,
    Completed { output: PathBuf },
    Failed(JobError),
}

/// Observable state of a job. Terminal transitions happen at most once.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatus {
    pub state: JobState,
    pub progress: f64,
    pub warnings: Vec<JobWarning>,
}

impl JobStatus {
    pub fn running() -> Self {
        Self {
            state: JobState::Running,
            progress: 0.0,
            warnings: Vec::new(),
        }
    }

    pub fn failed(err: JobError) -> Self {
        Self {
            state: JobState::Failed(err),
            progress: 0.0,
            warnings: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, JobState::Running)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, JobState::Completed { .. })
    }

    pub fn error(&self) -> Option<&JobError> {
        match &self.state {
            JobState::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn output(&self) -> Option<&Path> {
        match &self.state {
            JobState::Completed { output } => Some(output),
            _ => None,
        }
    }

    /// Returns whether the value changed.
    pub fn record_progress(&mut self, fraction: f64) -> bool {
        if !self.is_running() || self.progress == fraction {
            return false;
        }
        self.progress = fraction;
        true
    }

    pub fn warn(&mut self, warning: JobWarning) -> bool {
        if self.warnings.contains(&warning) {
            return false;
        }
        self.warnings.push(warning);
        true
    }

    /// Completion also pins progress at 1.0.
    pub fn complete(&mut self, output: PathBuf) -> bool {
        if !self.is_running() {
            return false;
        }
        self.progress = 1.0;
        self.state = JobState::Completed { output };
        true
    }

    pub fn fail(&mut self, err: JobError) -> bool {
        if !self.is_running() {
            return false;
        }
        self.state = JobState::Failed(err);
        true
    }
}

/// Per-file job data owned by the orchestrator.
#[derive(Debug)]
pub struct JobRecord {
    pub file: PathBuf,
    pub config: JobConfig,
    /// Final output directory, shared across jobs
    pub output_dir: PathBuf,
    scratch: TempDir,
    plot: Option<PathBuf>,
}

impl JobRecord {
    pub fn new(file: PathBuf, config: JobConfig, output_dir: PathBuf, scratch: TempDir) -> Self {
        Self {
            file,
            config,
            output_dir,
            scratch,
            plot: None,
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    pub fn plot(&self) -> Option<&Path> {
        self.plot.as_deref()
    }

    /// Sets the plot marker. Returns false if it was already set.
    pub fn mark_plot(&mut self, dir: &Path) -> bool {
        if self.plot.is_some() {
            return false;
        }
        self.plot = Some(dir.to_path_buf());
        true
    }

    /// File stem of the input video, used to name outputs.
    pub fn stem(&self) -> String {
        self.file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("output"))
    }

    /// Where the external process writes its raw table.
    pub fn raw_table_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}{}", self.stem(), OutputFormat::Table.extension()))
    }
}

/// Serializable view of a job for external callers.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub file: PathBuf,
    pub format: OutputFormat,
    pub progress: f64,
    pub complete: bool,
    pub running: bool,
    pub failed: bool,
    pub error: Option<String>,
    pub output: Option<PathBuf>,
    pub warnings: Vec<JobWarning>,
    pub plot: Option<PathBuf>,
}

impl JobSnapshot {
    pub fn new(record: &JobRecord, status: &JobStatus) -> Self {
        Self {
            file: record.file.clone(),
            format: record.config.format,
            progress: status.progress,
            complete: status.is_complete(),
            running: status.is_running(),
            failed: status.error().is_some(),
            error: status.error().map(|e| e.to_string()),
            output: status.output().map(Path::to_path_buf),
            warnings: status.warnings.clone(),
            plot: record.plot().map(Path::to_path_buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: JobConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, JobConfig::default());
        assert_eq!(config.threshold, 0.3);
        assert_eq!(config.min_cutoff, 4);
        assert_eq!(config.format, OutputFormat::Table);
    }

    #[test]
    fn test_config_format_names() {
        let config: JobConfig =
            serde_json::from_str(r#"{"format": "annotation", "keypoints": {"left": [4]}}"#).unwrap();
        assert_eq!(config.format, OutputFormat::Annotation);
        assert_eq!(config.keypoints.left, vec![4]);
        assert!(!config.keypoints.is_empty());
    }

    #[test]
    fn test_terminal_state_is_set_once() {
        let mut status = JobStatus::running();
        assert!(status.fail(JobError::ScriptRuntime("boom".into())));
        assert!(!status.complete(PathBuf::from("out.csv")));
        assert!(!status.is_complete());
        assert_eq!(status.error(), Some(&JobError::ScriptRuntime("boom".into())));
    }

    #[test]
    fn test_progress_ignored_after_completion() {
        let mut status = JobStatus::running();
        assert!(status.record_progress(0.5));
        assert!(status.complete(PathBuf::from("out.csv")));
        assert!(!status.record_progress(0.7));
        assert_eq!(status.progress, 1.0);
        assert!(status.error().is_none());
    }

    #[test]
    fn test_warning_recorded_once() {
        let mut status = JobStatus::running();
        assert!(status.warn(JobWarning::NoDetections));
        assert!(!status.warn(JobWarning::NoDetections));
        assert_eq!(status.warnings.len(), 1);
    }

    #[test]
    fn test_plot_marker_set_once() {
        let scratch = tempfile::tempdir().unwrap();
        let mut record = JobRecord::new(
            PathBuf::from("/videos/clip.mp4"),
            JobConfig::default(),
            PathBuf::from("/out"),
            scratch,
        );
        assert!(record.mark_plot(Path::new("/plots")));
        assert!(!record.mark_plot(Path::new("/elsewhere")));
        assert_eq!(record.plot(), Some(Path::new("/plots")));
        assert_eq!(record.raw_table_path(), PathBuf::from("/out/clip.csv"));
    }
}
