use super::{Replay, SubjectCore};
use crate::{Error, Terminal};
use std::sync::Arc;

/// Holds a current value that every new subscriber receives first.
pub struct BehaviorSubject<T> {
    core: Arc<SubjectCore<T>>,
}

impl<T: Clone + Send + 'static> BehaviorSubject<T> {
    pub fn new(initial: T) -> Self {
        Self {
            core: SubjectCore::new(Replay::Latest(Some(initial))),
        }
    }

    /// The current value.
    ///
    /// Fails with the stored error if the subject terminated with one, and with
    /// [`Error::Disposed`] once the subject has been disposed.
    pub fn value(&self) -> Result<T, Error> {
        if self.core.is_disposed() {
            return Err(Error::Disposed);
        }

        if let Some(Terminal::Error(error)) = self.core.terminal() {
            return Err(error);
        }

        self.core.latest().ok_or(Error::Disposed)
    }
}

subject_api!(BehaviorSubject);
