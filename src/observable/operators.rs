use super::{Observable, Subscriber};
use crate::{CompositeDisposable, Disposable, Error, Event, Scheduler, SerialDisposable};
use futures::StreamExt;
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tryhard::RetryPolicy;

impl<T: Send + 'static> Observable<T> {
    pub fn map<U, F>(&self, f: F) -> Observable<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);

        Observable::create(move |subscriber: Subscriber<U>| {
            let f = f.clone();
            source.subscribe(move |event: Event<T>| subscriber.on(event.map(|value| f(value))))
        })
    }

    /// Map values with a fallible function; the first failure terminates the
    /// sequence with that error.
    pub fn try_map<U, F>(&self, f: F) -> Observable<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Result<U, Error> + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);

        Observable::create(move |subscriber: Subscriber<U>| {
            let f = f.clone();
            let upstream = SerialDisposable::new();
            let on_failure = upstream.clone();

            upstream.set(source.subscribe(move |event: Event<T>| match event {
                Event::Next(value) => match f(value) {
                    Ok(mapped) => subscriber.on_next(mapped),
                    Err(error) => {
                        subscriber.on_error(error);
                        on_failure.dispose();
                    }
                },
                Event::Error(error) => subscriber.on_error(error),
                Event::Completed => subscriber.on_completed(),
            }));

            upstream.as_disposable()
        })
    }

    pub fn filter<F>(&self, predicate: F) -> Observable<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.filter_map(move |value| if predicate(&value) { Some(value) } else { None })
    }

    pub fn filter_map<U, F>(&self, f: F) -> Observable<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Option<U> + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);

        Observable::create(move |subscriber: Subscriber<U>| {
            let f = f.clone();
            source.subscribe(move |event: Event<T>| match event {
                Event::Next(value) => {
                    if let Some(mapped) = f(value) {
                        subscriber.on_next(mapped);
                    }
                }
                Event::Error(error) => subscriber.on_error(error),
                Event::Completed => subscriber.on_completed(),
            })
        })
    }

    /// Subscribe to an inner observable for every value and merge everything
    /// the inner observables emit, in arrival order.
    ///
    /// The result completes once the source and every inner observable have
    /// completed. The first error from any of them terminates the result and
    /// disposes all other subscriptions.
    pub fn flat_map<U, F>(&self, f: F) -> Observable<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Observable<U> + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);

        Observable::create(move |subscriber: Subscriber<U>| {
            let group = CompositeDisposable::new();
            // The source itself counts as one active stream.
            let active = Arc::new(AtomicUsize::new(1));

            let f = f.clone();
            let outer_group = group.clone();
            let outer_active = active.clone();

            let outer = source.subscribe(move |event: Event<T>| match event {
                Event::Next(value) => {
                    let inner = f(value);
                    outer_active.fetch_add(1, Ordering::SeqCst);

                    let slot = SerialDisposable::new();
                    // Disposing the entry itself lets the group prune it.
                    let entry = slot.as_disposable();
                    outer_group.add(entry.clone());

                    let subscriber = subscriber.clone();
                    let group = outer_group.clone();
                    let active = outer_active.clone();
                    let finished = entry;

                    slot.set(inner.subscribe(move |event: Event<U>| match event {
                        Event::Next(value) => subscriber.on_next(value),
                        Event::Error(error) => {
                            subscriber.on_error(error);
                            group.dispose();
                        }
                        Event::Completed => {
                            if active.fetch_sub(1, Ordering::SeqCst) == 1 {
                                subscriber.on_completed();
                            }
                            finished.dispose();
                        }
                    }));
                }
                Event::Error(error) => {
                    subscriber.on_error(error);
                    outer_group.dispose();
                }
                Event::Completed => {
                    if outer_active.fetch_sub(1, Ordering::SeqCst) == 1 {
                        subscriber.on_completed();
                    }
                }
            });

            group.add(outer);
            group.as_disposable()
        })
    }

    /// Merge several sequences into one, in arrival order.
    pub fn merge<I>(sources: I) -> Observable<T>
    where
        I: IntoIterator<Item = Observable<T>>,
    {
        Observable::from_iter(sources).flat_map(|source| source)
    }

    /// Emit at most `count` values, then complete and release the source.
    pub fn take(&self, count: usize) -> Observable<T> {
        let source = self.clone();

        Observable::create(move |subscriber: Subscriber<T>| {
            if count == 0 {
                subscriber.on_completed();
                return Disposable::empty();
            }

            let remaining = AtomicUsize::new(count);
            let upstream = SerialDisposable::new();
            let on_done = upstream.clone();

            upstream.set(source.subscribe(move |event: Event<T>| match event {
                Event::Next(value) => {
                    match remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                        left.checked_sub(1)
                    }) {
                        Ok(1) => {
                            subscriber.on_next(value);
                            subscriber.on_completed();
                            on_done.dispose();
                        }
                        Ok(_) => subscriber.on_next(value),
                        Err(_) => {}
                    }
                }
                other => subscriber.on(other),
            }));

            upstream.as_disposable()
        })
    }

    /// Drop the first `count` values.
    pub fn skip(&self, count: usize) -> Observable<T> {
        let source = self.clone();

        Observable::create(move |subscriber: Subscriber<T>| {
            let seen = AtomicUsize::new(0);

            source.subscribe(move |event: Event<T>| match event {
                Event::Next(value) => {
                    if seen.fetch_add(1, Ordering::SeqCst) >= count {
                        subscriber.on_next(value);
                    }
                }
                other => subscriber.on(other),
            })
        })
    }

    /// Run a side effect for every event before forwarding it.
    pub fn tap<F>(&self, f: F) -> Observable<T>
    where
        F: Fn(&Event<T>) + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);

        Observable::create(move |subscriber: Subscriber<T>| {
            let f = f.clone();
            source.subscribe(move |event: Event<T>| {
                f(&event);
                subscriber.on(event);
            })
        })
    }

    /// Log subscription, events and disposal at debug level.
    pub fn debug(&self, label: &str) -> Observable<T>
    where
        T: Debug,
    {
        let source = self.clone();
        let label: Arc<str> = Arc::from(label);

        Observable::create(move |subscriber: Subscriber<T>| {
            log::debug!("{} -> subscribed", label);

            let event_label = label.clone();
            let upstream = source.subscribe(move |event: Event<T>| {
                log::debug!("{} -> {:?}", event_label, event);
                subscriber.on(event);
            });

            let label = label.clone();
            Disposable::new(move || {
                log::debug!("{} -> disposed", label);
                upstream.dispose();
            })
        })
    }

    /// Continue with the observable returned by `handler` when the source
    /// fails.
    pub fn catch_error<F>(&self, handler: F) -> Observable<T>
    where
        F: Fn(Error) -> Observable<T> + Send + Sync + 'static,
    {
        let source = self.clone();
        let handler = Arc::new(handler);

        Observable::create(move |subscriber: Subscriber<T>| {
            let group = CompositeDisposable::new();
            let handler = handler.clone();
            let fallback_group = group.clone();
            let downstream = subscriber.clone();

            group.add(source.subscribe(move |event: Event<T>| match event {
                Event::Error(error) => {
                    log::debug!("Recovering from error: {}", error);
                    fallback_group.add(handler(error).subscribe_with(downstream.clone()));
                }
                other => downstream.on(other),
            }));

            group.as_disposable()
        })
    }

    /// Replace an error with a final value and complete.
    pub fn catch_error_just_return(&self, value: T) -> Observable<T>
    where
        T: Clone + Sync,
    {
        self.catch_error(move |_| Observable::just(value.clone()))
    }

    /// Resubscribe to the source up to `max_retries` times after errors.
    pub fn retry(&self, max_retries: u32) -> Observable<T> {
        self.retry_with(
            move |attempt, _| {
                if attempt <= max_retries {
                    RetryPolicy::Delay(Duration::ZERO)
                } else {
                    RetryPolicy::Break
                }
            },
            None,
        )
    }

    /// Resubscribe to the source after errors according to `policy`.
    ///
    /// The policy receives the number of failures so far (starting at one) and
    /// the latest error. `RetryPolicy::Delay` waits on the scheduler before
    /// resubscribing (a zero delay resubscribes immediately);
    /// `RetryPolicy::Break` forwards the error.
    pub fn retry_when<P>(&self, policy: P, scheduler: &Scheduler) -> Observable<T>
    where
        P: Fn(u32, &Error) -> RetryPolicy + Send + Sync + 'static,
    {
        self.retry_with(policy, Some(scheduler.clone()))
    }

    fn retry_with<P>(&self, policy: P, scheduler: Option<Scheduler>) -> Observable<T>
    where
        P: Fn(u32, &Error) -> RetryPolicy + Send + Sync + 'static,
    {
        let source = self.clone();
        let policy: Arc<RetryPolicyFn> = Arc::new(policy);

        Observable::create(move |subscriber: Subscriber<T>| {
            let attempts = CompositeDisposable::new();
            let retry = Retry {
                source: source.clone(),
                subscriber,
                policy: policy.clone(),
                scheduler: scheduler.clone(),
                attempts: attempts.clone(),
            };
            retry.attempt(1);

            attempts.as_disposable()
        })
    }

    /// Fail with [`Error::Timeout`] unless the source terminates within
    /// `duration`.
    pub fn timeout(&self, duration: Duration, scheduler: &Scheduler) -> Observable<T> {
        let source = self.clone();
        let scheduler = scheduler.clone();

        Observable::create(move |subscriber: Subscriber<T>| {
            let group = CompositeDisposable::new();

            let timer_group = group.clone();
            let timer_subscriber = subscriber.clone();
            group.add(scheduler.schedule_after(duration, move || {
                timer_subscriber.on_error(Error::Timeout(duration));
                timer_group.dispose();
            }));

            let source_group = group.clone();
            group.add(source.subscribe(move |event: Event<T>| {
                let terminal = event.is_terminal();
                subscriber.on(event);

                if terminal {
                    source_group.dispose();
                }
            }));

            group.as_disposable()
        })
    }

    /// Forward a value only after `interval` has passed without another one.
    ///
    /// A pending value is flushed when the source completes. Errors are
    /// forwarded immediately and drop the pending value.
    pub fn debounce(&self, interval: Duration, scheduler: &Scheduler) -> Observable<T> {
        let source = self.clone();
        let scheduler = scheduler.clone();

        Observable::create(move |subscriber: Subscriber<T>| {
            let timer = SerialDisposable::new();
            let pending = Arc::new(Mutex::new(Debounced::<T> {
                value: None,
                generation: 0,
            }));

            let scheduler = scheduler.clone();
            let source_timer = timer.clone();

            let upstream = source.subscribe(move |event: Event<T>| match event {
                Event::Next(value) => {
                    let generation = {
                        let mut pending = pending.lock();
                        pending.generation += 1;
                        pending.value = Some(value);
                        pending.generation
                    };

                    let pending = pending.clone();
                    let subscriber = subscriber.clone();
                    source_timer.set(scheduler.schedule_after(interval, move || {
                        let value = {
                            let mut pending = pending.lock();
                            if pending.generation == generation {
                                pending.value.take()
                            } else {
                                None
                            }
                        };

                        if let Some(value) = value {
                            subscriber.on_next(value);
                        }
                    }));
                }
                Event::Error(error) => {
                    source_timer.dispose();
                    pending.lock().value = None;
                    subscriber.on_error(error);
                }
                Event::Completed => {
                    source_timer.dispose();
                    let value = pending.lock().value.take();

                    if let Some(value) = value {
                        subscriber.on_next(value);
                    }
                    subscriber.on_completed();
                }
            });

            Disposable::new(move || {
                timer.dispose();
                upstream.dispose();
            })
        })
    }

    /// Forward a value only if at least `interval` has passed since the last
    /// forwarded one; values arriving sooner are dropped.
    pub fn throttle(&self, interval: Duration) -> Observable<T> {
        let source = self.clone();

        Observable::create(move |subscriber: Subscriber<T>| {
            let last: Mutex<Option<Instant>> = Mutex::new(None);

            source.subscribe(move |event: Event<T>| match event {
                Event::Next(value) => {
                    let now = Instant::now();
                    let forward = {
                        let mut last = last.lock();
                        match *last {
                            Some(previous) if now.duration_since(previous) < interval => false,
                            _ => {
                                *last = Some(now);
                                true
                            }
                        }
                    };

                    if forward {
                        subscriber.on_next(value);
                    }
                }
                other => subscriber.on(other),
            })
        })
    }

    /// Deliver every event, in order, from a task on the given scheduler.
    pub fn observe_on(&self, scheduler: &Scheduler) -> Observable<T> {
        let source = self.clone();
        let scheduler = scheduler.clone();

        Observable::create(move |subscriber: Subscriber<T>| {
            let (sender, mut receiver) = futures::channel::mpsc::unbounded::<Event<T>>();

            let delivery = scheduler.spawn(async move {
                while let Some(event) = receiver.next().await {
                    let terminal = event.is_terminal();
                    subscriber.on(event);

                    if terminal {
                        break;
                    }
                }
            });

            let upstream = source.subscribe(move |event: Event<T>| {
                // The receiver is gone only after disposal or a terminal event.
                let _ = sender.unbounded_send(event);
            });

            Disposable::new(move || {
                upstream.dispose();
                delivery.dispose();
            })
        })
    }
}

type RetryPolicyFn = dyn Fn(u32, &Error) -> RetryPolicy + Send + Sync;

struct Debounced<T> {
    value: Option<T>,
    generation: u64,
}

struct Retry<T> {
    source: Observable<T>,
    subscriber: Subscriber<T>,
    policy: Arc<RetryPolicyFn>,
    scheduler: Option<Scheduler>,
    attempts: CompositeDisposable,
}

impl<T> Clone for Retry<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            subscriber: self.subscriber.clone(),
            policy: self.policy.clone(),
            scheduler: self.scheduler.clone(),
            attempts: self.attempts.clone(),
        }
    }
}

impl<T: Send + 'static> Retry<T> {
    fn attempt(&self, failures: u32) {
        if self.attempts.is_disposed() {
            return;
        }

        let retry = self.clone();
        let subscription = self.source.subscribe(move |event: Event<T>| match event {
            Event::Error(error) => match ((retry.policy)(failures, &error), &retry.scheduler) {
                (RetryPolicy::Break, _) => retry.subscriber.on_error(error),
                (RetryPolicy::Delay(delay), Some(scheduler)) if delay > Duration::ZERO => {
                    log::debug!(
                        "Retry {}; waiting {:?} after error: {}",
                        failures,
                        delay,
                        error
                    );
                    let next = retry.clone();
                    retry.attempts.add(
                        scheduler.schedule_after(delay, move || next.attempt(failures + 1)),
                    );
                }
                _ => {
                    log::debug!("Retry {} after error: {}", failures, error);
                    retry.attempt(failures + 1);
                }
            },
            other => retry.subscriber.on(other),
        });

        self.attempts.add(subscription);
    }
}
