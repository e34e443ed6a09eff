//! Hot sources that are both an observer and an observable.
//!
//! All subjects share the same state machine. A subject is active until it
//! receives its first terminal event, after which it is terminated for good:
//! further pushes are ignored and new subscribers receive the replayed values
//! (if any) followed by the stored terminal event.
//!
//! Pushes and subscription attaches go through a per-subject queue. The caller
//! that finds the queue idle drains it, delivering one action at a time with
//! the state lock released, so a push made from inside an observer is
//! delivered after the current one instead of interleaving with it.
use crate::{Disposable, Event, Observable, Subscriber, Terminal};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// The methods every subject exposes, delegating to its core.
macro_rules! subject_api {
    ($name:ident) => {
        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                Self {
                    core: self.core.clone(),
                }
            }
        }

        impl<T: Clone + Send + 'static> $name<T> {
            pub fn on(&self, event: crate::Event<T>) {
                self.core.push(event);
            }

            pub fn on_next(&self, value: T) {
                self.on(crate::Event::Next(value));
            }

            pub fn on_error(&self, error: crate::Error) {
                self.on(crate::Event::Error(error));
            }

            pub fn on_completed(&self) {
                self.on(crate::Event::Completed);
            }

            pub fn as_observable(&self) -> crate::Observable<T> {
                self.core.observable()
            }

            pub fn subscribe<O: crate::Observer<T> + 'static>(
                &self,
                observer: O,
            ) -> crate::Disposable {
                self.as_observable().subscribe(observer)
            }

            /// The number of currently registered observers.
            pub fn observer_count(&self) -> usize {
                self.core.observer_count()
            }

            pub fn is_terminated(&self) -> bool {
                self.core.is_terminated()
            }

            pub fn is_disposed(&self) -> bool {
                self.core.is_disposed()
            }

            /// Release every observer and any replayed values.
            ///
            /// Current observers are not notified. Later subscribers only see the
            /// terminal event, and later pushes are ignored.
            pub fn dispose(&self) {
                self.core.dispose();
            }
        }

        impl<T: Clone + Send + 'static> crate::Observer<T> for $name<T> {
            fn on(&self, event: crate::Event<T>) {
                self.core.push(event);
            }
        }
    };
}

mod behavior;
mod publish;
mod relay;
mod replay;

pub use behavior::BehaviorSubject;
pub use publish::PublishSubject;
pub use relay::BehaviorRelay;
pub use replay::ReplaySubject;

pub(crate) enum Replay<T> {
    Nothing,
    Latest(Option<T>),
    Buffer {
        values: VecDeque<T>,
        capacity: Option<usize>,
    },
}

impl<T: Clone> Replay<T> {
    fn record(&mut self, value: &T) {
        match self {
            Replay::Nothing => {}
            Replay::Latest(latest) => *latest = Some(value.clone()),
            Replay::Buffer { values, capacity } => {
                if *capacity == Some(0) {
                    return;
                }
                values.push_back(value.clone());
                if let Some(capacity) = capacity {
                    while values.len() > *capacity {
                        values.pop_front();
                    }
                }
            }
        }
    }

    fn snapshot(&self) -> Vec<T> {
        match self {
            Replay::Nothing => vec![],
            Replay::Latest(latest) => latest.iter().cloned().collect(),
            Replay::Buffer { values, .. } => values.iter().cloned().collect(),
        }
    }

    fn clear(&mut self) {
        match self {
            Replay::Nothing => {}
            Replay::Latest(latest) => *latest = None,
            Replay::Buffer { values, .. } => values.clear(),
        }
    }
}

enum Action<T> {
    Emit(Event<T>),
    Attach(u64, Subscriber<T>),
}

struct State<T> {
    observers: Vec<(u64, Subscriber<T>)>,
    terminal: Option<Terminal>,
    replay: Replay<T>,
    disposed: bool,
    queue: VecDeque<Action<T>>,
    draining: bool,
    next_id: u64,
}

pub(crate) struct SubjectCore<T> {
    state: Mutex<State<T>>,
}

impl<T: Clone + Send + 'static> SubjectCore<T> {
    pub(crate) fn new(replay: Replay<T>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                observers: vec![],
                terminal: None,
                replay,
                disposed: false,
                queue: VecDeque::new(),
                draining: false,
                next_id: 0,
            }),
        })
    }

    pub(crate) fn push(&self, event: Event<T>) {
        self.enqueue(Action::Emit(event), || {});
    }

    /// Push an event, running `before` under the state lock as it is queued.
    ///
    /// Concurrent callers run `before` in the same order their events are
    /// delivered.
    pub(crate) fn push_with<F: FnOnce()>(&self, event: Event<T>, before: F) {
        self.enqueue(Action::Emit(event), before);
    }

    pub(crate) fn attach(self: &Arc<Self>, subscriber: Subscriber<T>) -> Disposable {
        let id = {
            let mut state = self.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            id
        };

        self.enqueue(Action::Attach(id, subscriber), || {});

        let core = Arc::downgrade(self);
        Disposable::new(move || {
            if let Some(core) = core.upgrade() {
                let removed = {
                    let mut state = core.state.lock();
                    let position = state.observers.iter().position(|(other, _)| *other == id);
                    position.map(|index| state.observers.remove(index))
                };
                drop(removed);
            }
        })
    }

    pub(crate) fn observable(self: &Arc<Self>) -> Observable<T> {
        let core = self.clone();
        Observable::create(move |subscriber| core.attach(subscriber))
    }

    pub(crate) fn observer_count(&self) -> usize {
        self.state.lock().observers.len()
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.state.lock().terminal.is_some()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// The most recent replayed value, unless the subject has been disposed.
    pub(crate) fn latest(&self) -> Option<T> {
        let state = self.state.lock();
        if state.disposed {
            None
        } else {
            state.replay.snapshot().pop()
        }
    }

    pub(crate) fn terminal(&self) -> Option<Terminal> {
        self.state.lock().terminal.clone()
    }

    /// Drop every observer and the replay storage without notifying anyone.
    pub(crate) fn dispose(&self) {
        let observers = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }

            state.disposed = true;
            state.replay.clear();
            if state.terminal.is_none() {
                state.terminal = Some(Terminal::Completed);
            }
            std::mem::take(&mut state.observers)
        };

        // Observers may own subscriptions to this subject.
        drop(observers);
    }

    fn enqueue<F: FnOnce()>(&self, action: Action<T>, before: F) {
        {
            let mut state = self.state.lock();
            before();
            state.queue.push_back(action);
            if state.draining {
                return;
            }
            state.draining = true;
        }

        loop {
            let action = {
                let mut state = self.state.lock();
                match state.queue.pop_front() {
                    Some(action) => action,
                    None => {
                        state.draining = false;
                        return;
                    }
                }
            };

            match action {
                Action::Emit(event) => self.deliver(event),
                Action::Attach(id, subscriber) => self.replay_to(id, subscriber),
            }
        }
    }

    fn deliver(&self, event: Event<T>) {
        let targets = {
            let mut state = self.state.lock();
            if state.terminal.is_some() {
                return;
            }

            match event {
                Event::Next(ref value) => {
                    state.replay.record(value);
                    state.observers.clone()
                }
                Event::Error(ref error) => {
                    state.terminal = Some(Terminal::Error(error.clone()));
                    std::mem::take(&mut state.observers)
                }
                Event::Completed => {
                    state.terminal = Some(Terminal::Completed);
                    std::mem::take(&mut state.observers)
                }
            }
        };

        for (_, subscriber) in targets {
            subscriber.on(event.clone());
        }
    }

    fn replay_to(&self, id: u64, subscriber: Subscriber<T>) {
        if subscriber.is_closed() {
            return;
        }

        let (values, terminal) = {
            let mut state = self.state.lock();
            let values = state.replay.snapshot();
            let terminal = state.terminal.clone();
            if terminal.is_none() {
                state.observers.push((id, subscriber.clone()));
            }
            (values, terminal)
        };

        for value in values {
            subscriber.on_next(value);
        }

        if let Some(terminal) = terminal {
            subscriber.on(terminal.to_event());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Replay;
    use std::collections::VecDeque;

    #[test]
    fn buffers_keep_the_most_recent_values() {
        let mut replay = Replay::Buffer {
            values: VecDeque::new(),
            capacity: Some(2),
        };

        for value in 1..=4 {
            replay.record(&value);
        }

        assert_eq!(replay.snapshot(), vec![3, 4]);
        replay.clear();
        assert!(replay.snapshot().is_empty());
    }

    #[test]
    fn zero_capacity_buffers_keep_nothing() {
        let mut replay = Replay::Buffer {
            values: VecDeque::new(),
            capacity: Some(0),
        };
        replay.record(&1);

        assert!(replay.snapshot().is_empty());
    }

    #[test]
    fn latest_keeps_one_value() {
        let mut replay = Replay::Latest(None);
        replay.record(&1);
        replay.record(&2);

        assert_eq!(replay.snapshot(), vec![2]);
    }
}
