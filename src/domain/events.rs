use super::jobs::JobWarning;
use serde::Serialize;
use std::path::PathBuf;

/// Broadcast to observers whenever a job changes in a way worth showing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Progress { file: PathBuf, fraction: f64 },
    Warning { file: PathBuf, warning: JobWarning },
    Completed { file: PathBuf, output: PathBuf },
    Failed { file: PathBuf, error: String },
    PlotFinished { file: PathBuf, dir: PathBuf },
    PlotFailed { file: PathBuf, error: String },
}

impl JobEvent {
    pub fn file(&self) -> &PathBuf {
        match self {
            JobEvent::Progress { file, .. }
            | JobEvent::Warning { file, .. }
            | JobEvent::Completed { file, .. }
            | JobEvent::Failed { file, .. }
            | JobEvent::PlotFinished { file, .. }
            | JobEvent::PlotFailed { file, .. } => file,
        }
    }
}
