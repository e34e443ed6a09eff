use super::util::Retryable;
use bytes::Bytes;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tryhard::RetryPolicy;

const MAX_RETRIES: u32 = 7;
const RETRY_INITIAL_DELAY_DURATION: Duration = Duration::from_millis(250);
const OVERLOADED_DELAY_DURATION: Duration = Duration::from_secs(30);

/// Errors carried by terminal `Error` events.
///
/// Subjects replay a stored error to every late subscriber, so this type is
/// cheap to clone.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Request failed with status {status}")]
    RequestFailed { status: StatusCode, body: Bytes },
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Object was already disposed")]
    Disposed,
    #[error("{0}")]
    Custom(Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap a caller-defined error so that it can be pushed into a stream.
    pub fn custom<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Custom(Arc::new(error))
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Error::Transport(error.to_string())
    }
}

impl Retryable for Error {
    fn max_retries() -> u32 {
        MAX_RETRIES
    }

    fn log_level() -> Option<log::Level> {
        Some(log::Level::Warn)
    }

    fn default_initial_delay() -> Duration {
        RETRY_INITIAL_DELAY_DURATION
    }

    fn custom_retry_policy(&self) -> Option<RetryPolicy> {
        match self {
            Error::Transport(_) => None,
            Error::Timeout(_) => None,
            Error::RequestFailed {
                status: StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE,
                ..
            } => Some(RetryPolicy::Delay(OVERLOADED_DELAY_DURATION)),
            Error::RequestFailed { status, .. } if status.is_server_error() => None,
            _ => Some(RetryPolicy::Break),
        }
    }
}
