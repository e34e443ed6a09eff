//! The boundary between the request pipeline and the network.
use super::{ClientConfig, Error};
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode, Url};

#[derive(Clone, Debug)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Build a `GET` request from a URL string.
    pub fn parse(url: &str) -> Result<Self, Error> {
        Url::parse(url)
            .map(Self::get)
            .map_err(|error| Error::InvalidRequest(format!("{}: {}", url, error)))
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// The key under which a successful response body is cached.
    pub fn cache_key(&self) -> String {
        self.url.to_string()
    }
}

#[derive(Clone, Debug)]
pub struct Response {
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Performs a single request-response exchange.
///
/// Implementations report only failures of the exchange itself; a response
/// with any status code is a successful exchange.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: Request) -> BoxFuture<'static, Result<Response, Error>>;
}

#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> reqwest::Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(config.request_timeout)
                .tcp_keepalive(config.tcp_keepalive)
                .user_agent(config.user_agent.clone())
                .build()?,
        })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: Request) -> BoxFuture<'static, Result<Response, Error>> {
        let builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);

        async move {
            let response = builder.send().await?;
            let url = response.url().clone();
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?;

            log::debug!("{} {}", status, url);

            Ok(Response {
                url,
                status,
                headers,
                body,
            })
        }
        .boxed()
    }
}
