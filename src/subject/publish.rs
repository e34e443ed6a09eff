use super::{Replay, SubjectCore};
use std::sync::Arc;

/// Forwards events to the observers registered at the time of the push.
///
/// Nothing is replayed: a late subscriber to an active subject only sees later
/// events, and a subscriber to a terminated subject only sees the terminal
/// event.
pub struct PublishSubject<T> {
    core: Arc<SubjectCore<T>>,
}

impl<T: Clone + Send + 'static> PublishSubject<T> {
    pub fn new() -> Self {
        Self {
            core: SubjectCore::new(Replay::Nothing),
        }
    }
}

impl<T: Clone + Send + 'static> Default for PublishSubject<T> {
    fn default() -> Self {
        Self::new()
    }
}

subject_api!(PublishSubject);
