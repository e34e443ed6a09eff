use crate::{Error, Event, Observer};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The observer handle a producer emits into.
///
/// A subscriber enforces the event grammar for one subscription: once it has
/// seen a terminal event, or once the subscription has been disposed, every
/// further event is dropped. Deliveries are serialized, so an observer is never
/// called concurrently even when several producer tasks share a subscriber.
pub struct Subscriber<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    observer: Box<dyn Observer<T>>,
    stopped: AtomicBool,
    gate: Mutex<()>,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Subscriber<T> {
    pub fn new<O: Observer<T> + 'static>(observer: O) -> Self {
        Self {
            inner: Arc::new(Inner {
                observer: Box::new(observer),
                stopped: AtomicBool::new(false),
                gate: Mutex::new(()),
            }),
        }
    }

    pub fn on(&self, event: Event<T>) {
        if self.is_closed() {
            return;
        }

        let _gate = self.inner.gate.lock();

        if event.is_terminal() {
            if self.inner.stopped.swap(true, Ordering::SeqCst) {
                return;
            }
        } else if self.is_closed() {
            return;
        }

        self.inner.observer.on(event);
    }

    pub fn on_next(&self, value: T) {
        self.on(Event::Next(value))
    }

    pub fn on_error(&self, error: Error) {
        self.on(Event::Error(error))
    }

    pub fn on_completed(&self) {
        self.on(Event::Completed)
    }

    /// Whether this subscriber will drop any further events.
    pub fn is_closed(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    pub(crate) fn close(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
    }
}

impl<T> Observer<T> for Subscriber<T> {
    fn on(&self, event: Event<T>) {
        Subscriber::on(self, event)
    }
}

#[cfg(test)]
mod tests {
    use super::Subscriber;
    use crate::{Error, Event};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recording() -> (Arc<Mutex<Vec<String>>>, Subscriber<i32>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        (
            log,
            Subscriber::new(move |event: Event<i32>| sink.lock().push(event.to_string())),
        )
    }

    #[test]
    fn nothing_follows_a_terminal_event() {
        let (log, subscriber) = recording();

        subscriber.on_next(1);
        subscriber.on_completed();
        subscriber.on_next(2);
        subscriber.on_error(Error::Disposed);
        subscriber.on_completed();

        assert_eq!(*log.lock(), vec!["next(1)", "completed"]);
        assert!(subscriber.is_closed());
    }

    #[test]
    fn closed_subscribers_drop_everything() {
        let (log, subscriber) = recording();

        subscriber.close();
        subscriber.on_next(1);
        subscriber.on_completed();

        assert!(log.lock().is_empty());
    }
}
