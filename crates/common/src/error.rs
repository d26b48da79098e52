use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Upstream fetch failed, timed out or returned an unusable payload.
    #[error("Market data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Insufficient data: need {required} candles, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Signal not found: {0}")]
    NotFound(String),

    #[error("Signal already resolved: {0}")]
    NotPending(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Notification failed: {0}")]
    Notify(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
