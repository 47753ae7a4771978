use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdaptiveError {
    #[error("Smoothing constant alpha must lie in (0, 1), got {0}")]
    InvalidAlpha(f64),
    #[error("Invalid knowledge tracing parameters: {0}")]
    InvalidBktParameters(String),
    #[error("Unknown scheduling strategy: {0}")]
    UnknownStrategy(String),
    #[error("Unknown difficulty zone: {0}")]
    UnknownZone(String),
    #[error("Snapshot deserialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AdaptiveError>;
