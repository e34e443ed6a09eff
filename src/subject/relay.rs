use super::{Replay, SubjectCore};
use crate::{Disposable, Event, Observable, Observer};
use parking_lot::RwLock;
use std::sync::Arc;

/// A behavior subject that can only receive values.
///
/// Since nothing can terminate or dispose it, reading the current value never
/// fails.
pub struct BehaviorRelay<T> {
    core: Arc<SubjectCore<T>>,
    current: Arc<RwLock<T>>,
}

impl<T: Clone + Send + Sync + 'static> BehaviorRelay<T> {
    pub fn new(initial: T) -> Self {
        Self {
            core: SubjectCore::new(Replay::Latest(Some(initial.clone()))),
            current: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn accept(&self, value: T) {
        let current = &self.current;
        let next = value.clone();
        // The value is updated while the event is queued, so readers never
        // disagree with the order observers see.
        self.core
            .push_with(Event::Next(value), move || *current.write() = next);
    }

    pub fn value(&self) -> T {
        self.current.read().clone()
    }

    pub fn as_observable(&self) -> Observable<T> {
        self.core.observable()
    }

    pub fn subscribe<O: Observer<T> + 'static>(&self, observer: O) -> Disposable {
        self.as_observable().subscribe(observer)
    }
}

impl<T> Clone for BehaviorRelay<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
            current: self.current.clone(),
        }
    }
}
