mod retries;
pub use retries::{backoff_policy, retry_future, ErrorBackoff, LogOnRetry, Retryable};
