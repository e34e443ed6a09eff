use super::{Replay, SubjectCore};
use std::collections::VecDeque;
use std::sync::Arc;

/// Replays a window of the most recent values to every new subscriber.
pub struct ReplaySubject<T> {
    core: Arc<SubjectCore<T>>,
}

impl<T: Clone + Send + 'static> ReplaySubject<T> {
    /// Keep at most `buffer_size` values; a size of zero replays nothing.
    pub fn new(buffer_size: usize) -> Self {
        Self::with_capacity(Some(buffer_size))
    }

    /// Keep every value ever pushed.
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            core: SubjectCore::new(Replay::Buffer {
                values: VecDeque::with_capacity(capacity.unwrap_or_default().min(64)),
                capacity,
            }),
        }
    }
}

subject_api!(ReplaySubject);
