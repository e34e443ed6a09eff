use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT_DURATION: Duration = Duration::from_secs(10);
const TCP_KEEPALIVE_DURATION: Duration = Duration::from_secs(20);
const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Settings for the HTTP client behind [`crate::ReqwestTransport`].
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub request_timeout: Duration,
    pub tcp_keepalive: Option<Duration>,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT_DURATION,
            tcp_keepalive: Some(TCP_KEEPALIVE_DURATION),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}
