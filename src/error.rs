use thiserror::Error;

/// Errors raised while acquiring, caching or loading measurement data.
///
/// Payloads are plain strings so the error can be cloned into every
/// place that reports it (batch warnings, CLI output, test assertions).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Data validation error: {0}")]
    Validation(String),
    #[error("Failed to download data for the selected sensor {sensor_id}: {reason}")]
    Download { sensor_id: i64, reason: String },
}

impl SyncError {
    pub(crate) fn io(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        SyncError::Io(format!("{}: {}", path.display(), err))
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Parse(err.to_string())
    }
}
