//! Reactive access to a [`Transport`] with response caching.
use super::{
    util::retry_future, Disposable, Error, Observable, Request, Response, ResponseCache,
    Scheduler, Transport,
};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Issues requests through a transport and caches successful response bodies.
///
/// Every observable returned here is cold: the request is sent once per
/// subscription, on a task spawned on the session's scheduler. Disposing a
/// subscription before it completes aborts that task.
#[derive(Clone)]
pub struct Session {
    transport: Arc<dyn Transport>,
    cache: ResponseCache,
    scheduler: Scheduler,
}

impl Session {
    pub fn new<T: Transport>(transport: T, cache: ResponseCache, scheduler: Scheduler) -> Self {
        Self {
            transport: Arc::new(transport),
            cache,
            scheduler,
        }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The raw exchange, bypassing the cache.
    ///
    /// Transport failures are delivered as an `Err` value followed by
    /// completion, so a subscriber can inspect status codes and failures in the
    /// same place.
    pub fn response(&self, request: Request) -> Observable<Result<Response, Error>> {
        let transport = self.transport.clone();

        Observable::from_future(&self.scheduler, move || {
            let response = transport.send(request.clone());
            async move { Ok(response.await) }
        })
    }

    /// The response body, served from the cache when possible.
    ///
    /// A cached body is emitted synchronously inside `subscribe`. Non-2xx
    /// responses fail with [`Error::RequestFailed`] and are not cached.
    pub fn data(&self, request: Request) -> Observable<Bytes> {
        let transport = self.transport.clone();
        let cache = self.cache.clone();
        let key = request.cache_key();

        let remote = {
            let cache = cache.clone();
            Observable::from_future(&self.scheduler, move || {
                load(transport.clone(), cache.clone(), request.clone())
            })
        };

        Observable::create(move |subscriber| match cache.try_get(&key) {
            Some(body) => {
                log::debug!("Cache hit for {}", key);
                subscriber.on_next(body);
                subscriber.on_completed();
                Disposable::empty()
            }
            None => remote.subscribe_with(subscriber),
        })
    }

    /// The response body decoded as UTF-8, replacing invalid sequences.
    pub fn string(&self, request: Request) -> Observable<String> {
        self.data(request)
            .map(|body| String::from_utf8_lossy(&body).into_owned())
    }

    pub fn json(&self, request: Request) -> Observable<serde_json::Value> {
        self.decodable(request)
    }

    pub fn decodable<T: DeserializeOwned + Send + 'static>(
        &self,
        request: Request,
    ) -> Observable<T> {
        self.data(request).try_map(|body| {
            serde_json::from_slice(&body)
                .map_err(|error| Error::DeserializationFailed(error.to_string()))
        })
    }

    /// Load a response body with retries for temporary failures.
    pub async fn fetch(&self, request: Request) -> Result<Bytes, Error> {
        retry_future(|| load(self.transport.clone(), self.cache.clone(), request.clone())).await
    }
}

async fn load(
    transport: Arc<dyn Transport>,
    cache: ResponseCache,
    request: Request,
) -> Result<Bytes, Error> {
    let key = request.cache_key();

    if let Some(body) = cache.get(&key).await {
        log::debug!("Cache hit for {}", key);
        return Ok(body);
    }

    let response = transport.send(request).await?;

    if response.is_success() {
        cache.insert(key, response.body.clone()).await;
        Ok(response.body)
    } else {
        Err(Error::RequestFailed {
            status: response.status,
            body: response.body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Session;
    use crate::{Error, Request, Response, ResponseCache, Scheduler, Transport};
    use bytes::Bytes;
    use futures::future::{BoxFuture, FutureExt};
    use parking_lot::Mutex;
    use reqwest::{header::HeaderMap, StatusCode};
    use serde_derive::Deserialize;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct StubTransport {
        calls: Arc<AtomicUsize>,
        replies: Arc<Mutex<VecDeque<Result<(StatusCode, &'static str), Error>>>>,
    }

    impl StubTransport {
        fn reply(self, status: StatusCode, body: &'static str) -> Self {
            self.replies.lock().push_back(Ok((status, body)));
            self
        }

        fn fail(self, error: Error) -> Self {
            self.replies.lock().push_back(Err(error));
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for StubTransport {
        fn send(&self, request: Request) -> BoxFuture<'static, Result<Response, Error>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self
                .replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Transport("no reply".to_string())));

            async move {
                reply.map(|(status, body)| Response {
                    url: request.url,
                    status,
                    headers: HeaderMap::new(),
                    body: Bytes::from_static(body.as_bytes()),
                })
            }
            .boxed()
        }
    }

    fn session(transport: &StubTransport) -> Session {
        Session::new(
            transport.clone(),
            ResponseCache::new(),
            Scheduler::current().unwrap(),
        )
    }

    fn request() -> Request {
        Request::parse("https://example.com/a").unwrap()
    }

    #[tokio::test]
    async fn cached_bodies_are_served_without_the_transport() {
        let transport = StubTransport::default()
            .reply(StatusCode::OK, r#"{"x":1}"#)
            .fail(Error::Transport("offline".to_string()));
        let session = session(&transport);

        let first = session.data(request()).to_vec().await.unwrap();
        assert_eq!(first, vec![Bytes::from_static(br#"{"x":1}"#)]);
        assert_eq!(
            session.cache().get("https://example.com/a").await,
            Some(Bytes::from_static(br#"{"x":1}"#))
        );

        let second = session.data(request()).to_vec().await.unwrap();
        assert_eq!(second, first);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn failed_statuses_are_errors_and_not_cached() {
        let transport = StubTransport::default().reply(StatusCode::NOT_FOUND, "missing");
        let session = session(&transport);

        let result = session.data(request()).to_vec().await;

        match result {
            Err(Error::RequestFailed { status, body }) => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(body, Bytes::from_static(b"missing"));
            }
            other => panic!("Unexpected result: {:?}", other),
        }
        assert!(session.cache().is_empty().await);
    }

    #[tokio::test]
    async fn transport_failures_are_terminal_errors() {
        let transport = StubTransport::default().fail(Error::Transport("reset".to_string()));
        let session = session(&transport);

        assert!(matches!(
            session.data(request()).first().await,
            Err(Error::Transport(_))
        ));
    }

    #[tokio::test]
    async fn responses_deliver_failures_as_values() {
        let transport = StubTransport::default()
            .reply(StatusCode::INTERNAL_SERVER_ERROR, "")
            .fail(Error::Transport("reset".to_string()));
        let session = session(&transport);

        let first = session.response(request()).to_vec().await.unwrap();
        let second = session.response(request()).to_vec().await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(
            first[0].as_ref().map(|response| response.status).ok(),
            Some(StatusCode::INTERNAL_SERVER_ERROR)
        );
        assert!(matches!(second[0], Err(Error::Transport(_))));
        assert!(session.cache().is_empty().await);
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        x: u32,
    }

    #[tokio::test]
    async fn bodies_are_decoded() {
        let transport = StubTransport::default()
            .reply(StatusCode::OK, r#"{"x":1}"#)
            .reply(StatusCode::OK, "not json");
        let session = session(&transport);

        assert_eq!(
            session.decodable::<Payload>(request()).first().await.unwrap(),
            Some(Payload { x: 1 })
        );
        assert_eq!(
            session.json(request()).first().await.unwrap(),
            Some(serde_json::json!({"x": 1}))
        );
        assert_eq!(
            session.string(request()).first().await.unwrap().as_deref(),
            Some(r#"{"x":1}"#)
        );
        assert_eq!(transport.calls(), 1);

        let other = Request::parse("https://example.com/b").unwrap();
        assert!(matches!(
            session.decodable::<Payload>(other).first().await,
            Err(Error::DeserializationFailed(_))
        ));
        assert!(session.cache().contains("https://example.com/b").await);
    }

    #[tokio::test]
    async fn cache_hits_are_delivered_inside_subscribe() {
        let transport = StubTransport::default();
        let session = session(&transport);
        session
            .cache()
            .insert("https://example.com/a".to_string(), Bytes::from_static(b"x"))
            .await;

        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let _subscription = session
            .data(request())
            .subscribe(move |event: crate::Event<Bytes>| sink.lock().push(format!("{:?}", event)));

        assert_eq!(*log.lock(), vec!["Next(b\"x\")", "Completed"]);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn strings_replace_invalid_utf8() {
        let transport = StubTransport::default();
        let session = session(&transport);
        session
            .cache()
            .insert(
                "https://example.com/a".to_string(),
                Bytes::from_static(b"ok\xff"),
            )
            .await;

        assert_eq!(
            session.string(request()).first().await.unwrap().as_deref(),
            Some("ok\u{fffd}")
        );
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_retries_temporary_failures() {
        let transport = StubTransport::default()
            .fail(Error::Transport("reset".to_string()))
            .reply(StatusCode::INTERNAL_SERVER_ERROR, "")
            .reply(StatusCode::OK, "done");
        let session = session(&transport);

        let body = session.fetch(request()).await.unwrap();

        assert_eq!(body, Bytes::from_static(b"done"));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn disposing_before_completion_delivers_nothing() {
        struct SlowTransport;

        impl Transport for SlowTransport {
            fn send(&self, request: Request) -> BoxFuture<'static, Result<Response, Error>> {
                async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(Response {
                        url: request.url,
                        status: StatusCode::OK,
                        headers: HeaderMap::new(),
                        body: Bytes::new(),
                    })
                }
                .boxed()
            }
        }

        let session = Session::new(
            SlowTransport,
            ResponseCache::new(),
            Scheduler::current().unwrap(),
        );
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let subscription = session.data(request()).subscribe(move |_: crate::Event<Bytes>| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        subscription.dispose();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert!(session.cache().is_empty().await);
    }
}
