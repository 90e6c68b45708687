//! Error taxonomy for jobs and output conversion.

use std::path::PathBuf;

/// Failure of a single job. Every variant is local to the job it is attached to.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JobError {
    #[error("a job for {} is already running", .0.display())]
    DuplicateJob(PathBuf),

    #[error("missing input: {0}")]
    MissingInput(String),

    #[error("failed to launch {program}: {reason}")]
    ProcessLaunch { program: String, reason: String },

    #[error("analysis script reported an error: {0}")]
    ScriptRuntime(String),

    #[error("output conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("job was cancelled before it finished")]
    Cancelled,

    #[error("job monitor stopped before the job settled")]
    Aborted,

    #[error("{} writes the same output as running job {}", .file.display(), .other.display())]
    OutputConflict { file: PathBuf, other: PathBuf },

    #[error("no job registered for {}", .0.display())]
    UnknownJob(PathBuf),

    #[error("job for {} has not completed", .0.display())]
    NotFinished(PathBuf),

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for JobError {
    fn from(err: std::io::Error) -> Self {
        JobError::Io(err.to_string())
    }
}

/// Failure while turning the raw table into a structured document.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    #[error("row {line}: expected 5 fields, found {found}")]
    MalformedRow { line: usize, found: usize },

    #[error("row {line}: time {value:?} is not in H:MM:SS.fff form")]
    MalformedTime { line: usize, value: String },

    #[error("raw table {} was not produced", .0.display())]
    MissingTable(PathBuf),

    #[error("template is missing the {0} marker")]
    TemplateMarker(&'static str),

    #[error("template could not be parsed: {0}")]
    Template(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("json error: {0}")]
    Json(String),
}

impl From<std::io::Error> for ConversionError {
    fn from(err: std::io::Error) -> Self {
        ConversionError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ConversionError {
    fn from(err: serde_json::Error) -> Self {
        ConversionError::Json(err.to_string())
    }
}
