//! Lazy push-based event sequences.
//!
//! An [`Observable`] only describes how to produce events. Nothing happens
//! until [`Observable::subscribe`] is called, and every subscription runs the
//! producer independently (see [`Observable::share_replay`] for sharing one
//! upstream subscription).
use super::{Disposable, Error, Event, Observer, Scheduler};
use futures::Future;
use std::sync::Arc;
use std::time::Duration;

mod operators;
mod share;
mod stream;
mod subscriber;

pub use stream::EventStream;
pub use subscriber::Subscriber;

type SubscribeFn<T> = dyn Fn(Subscriber<T>) -> Disposable + Send + Sync;

pub struct Observable<T> {
    subscribe_fn: Arc<SubscribeFn<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            subscribe_fn: self.subscribe_fn.clone(),
        }
    }
}

impl<T: Send + 'static> Observable<T> {
    /// Build an observable from a producer function.
    ///
    /// The producer runs synchronously inside every call to `subscribe` and
    /// returns the handle that releases whatever it acquired.
    pub fn create<F>(producer: F) -> Self
    where
        F: Fn(Subscriber<T>) -> Disposable + Send + Sync + 'static,
    {
        Self {
            subscribe_fn: Arc::new(producer),
        }
    }

    pub fn subscribe<O: Observer<T> + 'static>(&self, observer: O) -> Disposable {
        self.subscribe_with(Subscriber::new(observer))
    }

    /// Subscribe with a closure that only cares about values.
    pub fn subscribe_next<F>(&self, on_next: F) -> Disposable
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.subscribe(move |event: Event<T>| {
            if let Event::Next(value) = event {
                on_next(value);
            }
        })
    }

    pub fn subscribe_with(&self, subscriber: Subscriber<T>) -> Disposable {
        let upstream = (self.subscribe_fn)(subscriber.clone());

        Disposable::new(move || {
            subscriber.close();
            upstream.dispose();
        })
    }

    pub fn empty() -> Self {
        Self::create(|subscriber| {
            subscriber.on_completed();
            Disposable::empty()
        })
    }

    /// A sequence that never emits anything.
    pub fn never() -> Self {
        Self::create(|_| Disposable::empty())
    }

    pub fn error(error: Error) -> Self {
        Self::create(move |subscriber| {
            subscriber.on_error(error.clone());
            Disposable::empty()
        })
    }

    /// Create a fresh observable for every subscription.
    pub fn defer<F>(factory: F) -> Self
    where
        F: Fn() -> Observable<T> + Send + Sync + 'static,
    {
        Self::create(move |subscriber| factory().subscribe_with(subscriber))
    }

    /// Run a future on the scheduler for every subscription and emit its
    /// result.
    ///
    /// Disposing the subscription aborts the task.
    pub fn from_future<F, Fut>(scheduler: &Scheduler, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
    {
        let scheduler = scheduler.clone();

        Self::create(move |subscriber| {
            let future = factory();

            scheduler.spawn(async move {
                match future.await {
                    Ok(value) => {
                        subscriber.on_next(value);
                        subscriber.on_completed();
                    }
                    Err(error) => subscriber.on_error(error),
                }
            })
        })
    }
}

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    pub fn just(value: T) -> Self {
        Self::create(move |subscriber| {
            subscriber.on_next(value.clone());
            subscriber.on_completed();
            Disposable::empty()
        })
    }

    /// Emit every item synchronously, then complete.
    pub fn from_iter<I: IntoIterator<Item = T>>(values: I) -> Self {
        let values = values.into_iter().collect::<Vec<_>>();

        Self::create(move |subscriber| {
            for value in &values {
                if subscriber.is_closed() {
                    break;
                }
                subscriber.on_next(value.clone());
            }
            subscriber.on_completed();
            Disposable::empty()
        })
    }
}

impl Observable<()> {
    /// Emit a single unit value after the delay.
    pub fn timer(delay: Duration, scheduler: &Scheduler) -> Self {
        let scheduler = scheduler.clone();

        Self::create(move |subscriber| {
            scheduler.schedule_after(delay, move || {
                subscriber.on_next(());
                subscriber.on_completed();
            })
        })
    }
}
