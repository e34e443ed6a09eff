use super::Error;
use std::fmt;

/// A single notification delivered to an observer.
///
/// `Error` and `Completed` are terminal: no further events follow them on the
/// same subscription.
#[derive(Clone, Debug)]
pub enum Event<T> {
    Next(T),
    Error(Error),
    Completed,
}

impl<T> Event<T> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Event::Next(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Event::Next(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Event::Next(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Event::Error(error) => Some(error),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Event<U> {
        match self {
            Event::Next(value) => Event::Next(f(value)),
            Event::Error(error) => Event::Error(error),
            Event::Completed => Event::Completed,
        }
    }

    /// Convert a terminal event into its stored form.
    ///
    /// Returns the value back if the event is `Next`.
    pub fn into_terminal(self) -> Result<Terminal, T> {
        match self {
            Event::Next(value) => Err(value),
            Event::Error(error) => Ok(Terminal::Error(error)),
            Event::Completed => Ok(Terminal::Completed),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Next(value) => write!(f, "next({})", value),
            Event::Error(error) => write!(f, "error({})", error),
            Event::Completed => write!(f, "completed"),
        }
    }
}

/// The terminal state of a finished stream.
#[derive(Clone, Debug)]
pub enum Terminal {
    Error(Error),
    Completed,
}

impl Terminal {
    pub fn to_event<T>(&self) -> Event<T> {
        match self {
            Terminal::Error(error) => Event::Error(error.clone()),
            Terminal::Completed => Event::Completed,
        }
    }
}

/// Receiver of stream events.
///
/// Implementations must be fast and non-blocking. If you need async processing,
/// use [`crate::Observable::observe_on`] or enqueue events into a channel and
/// handle them in a separate task.
pub trait Observer<T>: Send + Sync {
    fn on(&self, event: Event<T>);
}

impl<T, F> Observer<T> for F
where
    F: Fn(Event<T>) + Send + Sync,
{
    fn on(&self, event: Event<T>) {
        self(event)
    }
}
