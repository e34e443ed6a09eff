use super::{Observable, Subscriber};
use crate::{Disposable, Event, ReplaySubject};
use parking_lot::Mutex;
use std::sync::Arc;

struct Connection<T> {
    id: u64,
    subject: ReplaySubject<T>,
    upstream: Option<Disposable>,
    subscribers: usize,
}

struct Shared<T> {
    source: Observable<T>,
    buffer_size: usize,
    state: Mutex<SharedState<T>>,
}

struct SharedState<T> {
    connection: Option<Connection<T>>,
    next_id: u64,
}

impl<T: Clone + Send + 'static> Observable<T> {
    /// Share one upstream subscription between all subscribers while at least
    /// one of them is subscribed.
    ///
    /// Late subscribers first receive up to `buffer_size` of the most recent
    /// values. When the last subscriber disposes, the upstream subscription is
    /// released, and the next subscriber starts a fresh one with an empty
    /// buffer. A terminal upstream event also ends the connection.
    pub fn share_replay(&self, buffer_size: usize) -> Observable<T> {
        let shared = Arc::new(Shared {
            source: self.clone(),
            buffer_size,
            state: Mutex::new(SharedState {
                connection: None,
                next_id: 0,
            }),
        });

        Observable::create(move |subscriber| shared.attach(subscriber))
    }

    /// Share one upstream subscription without replaying anything.
    pub fn share(&self) -> Observable<T> {
        self.share_replay(0)
    }
}

impl<T: Clone + Send + 'static> Shared<T> {
    fn attach(self: &Arc<Self>, subscriber: Subscriber<T>) -> Disposable {
        let (id, subject, connect) = {
            let mut state = self.state.lock();

            match state.connection.as_mut() {
                Some(connection) => {
                    connection.subscribers += 1;
                    (connection.id, connection.subject.clone(), false)
                }
                None => {
                    let id = state.next_id;
                    state.next_id += 1;
                    let subject = ReplaySubject::new(self.buffer_size);
                    state.connection = Some(Connection {
                        id,
                        subject: subject.clone(),
                        upstream: None,
                        subscribers: 1,
                    });
                    (id, subject, true)
                }
            }
        };

        let downstream = subject.as_observable().subscribe_with(subscriber);

        if connect {
            log::debug!("Connecting shared subscription {}", id);
            let shared = self.clone();
            let forward = subject.clone();
            let upstream = self.source.subscribe(move |event: Event<T>| {
                let terminal = event.is_terminal();
                forward.on(event);

                if terminal {
                    shared.reset(id);
                }
            });

            let mut state = self.state.lock();
            match state.connection.as_mut() {
                Some(connection) if connection.id == id => {
                    connection.upstream = Some(upstream);
                }
                _ => {
                    drop(state);
                    upstream.dispose();
                }
            }
        }

        let shared = self.clone();
        Disposable::new(move || {
            downstream.dispose();
            shared.detach(id);
        })
    }

    fn detach(&self, id: u64) {
        let released = {
            let mut state = self.state.lock();
            let last = match state.connection.as_mut() {
                Some(connection) if connection.id == id => {
                    connection.subscribers -= 1;
                    connection.subscribers == 0
                }
                _ => false,
            };

            if last {
                state.connection.take()
            } else {
                None
            }
        };

        if let Some(connection) = released {
            log::debug!("Releasing shared subscription {}", connection.id);
            if let Some(upstream) = connection.upstream {
                upstream.dispose();
            }
        }
    }

    fn reset(&self, id: u64) {
        let mut state = self.state.lock();

        if matches!(&state.connection, Some(connection) if connection.id == id) {
            state.connection = None;
        }
    }
}
