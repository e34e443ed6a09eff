//! Subscription release handles.
//!
//! Every subscription returns a [`Disposable`]. Releasing it runs its cleanup
//! action exactly once, no matter how many clones of the handle call
//! [`Disposable::dispose`] or whether the producer already finished.
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

type Action = Box<dyn FnOnce() + Send>;

#[derive(Clone)]
#[must_use = "dropping a Disposable does not cancel the subscription"]
pub struct Disposable {
    action: Arc<Mutex<Option<Action>>>,
}

impl Disposable {
    pub fn new<F: FnOnce() + Send + 'static>(action: F) -> Self {
        Self {
            action: Arc::new(Mutex::new(Some(Box::new(action)))),
        }
    }

    /// A handle with nothing to release.
    pub fn empty() -> Self {
        Self {
            action: Arc::new(Mutex::new(None)),
        }
    }

    pub fn dispose(&self) {
        let action = self.action.lock().take();

        if let Some(action) = action {
            action();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.action.lock().is_none()
    }

    /// Hand the subscription over to a bag that releases it on drop.
    pub fn disposed_by(self, bag: &DisposeBag) {
        bag.insert(self);
    }
}

impl fmt::Debug for Disposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposable")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A group of handles released together.
///
/// Adding a handle to an already disposed group disposes it immediately.
#[derive(Clone)]
pub struct CompositeDisposable {
    children: Arc<Mutex<Option<Vec<Disposable>>>>,
}

impl CompositeDisposable {
    pub fn new() -> Self {
        Self {
            children: Arc::new(Mutex::new(Some(Vec::new()))),
        }
    }

    pub fn add(&self, disposable: Disposable) {
        let mut children = self.children.lock();

        match children.as_mut() {
            Some(children) => {
                children.retain(|child| !child.is_disposed());
                children.push(disposable);
            }
            None => {
                drop(children);
                disposable.dispose();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.children
            .lock()
            .as_ref()
            .map_or(0, |children| children.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dispose(&self) {
        let children = self.children.lock().take();

        for child in children.into_iter().flatten() {
            child.dispose();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.children.lock().is_none()
    }

    pub fn as_disposable(&self) -> Disposable {
        let composite = self.clone();
        Disposable::new(move || composite.dispose())
    }
}

impl Default for CompositeDisposable {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds at most one handle; replacing it disposes the previous one.
#[derive(Clone, Default)]
pub struct SerialDisposable {
    state: Arc<Mutex<SerialState>>,
}

#[derive(Default)]
struct SerialState {
    current: Option<Disposable>,
    disposed: bool,
}

impl SerialDisposable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, disposable: Disposable) {
        let mut state = self.state.lock();

        if state.disposed {
            drop(state);
            disposable.dispose();
        } else {
            let previous = state.current.replace(disposable);
            drop(state);

            if let Some(previous) = previous {
                previous.dispose();
            }
        }
    }

    pub fn dispose(&self) {
        let current = {
            let mut state = self.state.lock();
            state.disposed = true;
            state.current.take()
        };

        if let Some(current) = current {
            current.dispose();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    pub fn as_disposable(&self) -> Disposable {
        let serial = self.clone();
        Disposable::new(move || serial.dispose())
    }
}

/// Owner scope for subscriptions: everything inserted is disposed when the bag
/// is dropped.
#[derive(Default)]
pub struct DisposeBag {
    inner: CompositeDisposable,
}

impl DisposeBag {
    pub fn new() -> Self {
        Self {
            inner: CompositeDisposable::new(),
        }
    }

    pub fn insert(&self, disposable: Disposable) {
        self.inner.add(disposable);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Drop for DisposeBag {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}
