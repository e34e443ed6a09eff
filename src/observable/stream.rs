use super::Observable;
use crate::{Disposable, Error, Event};
use futures::channel::mpsc::{unbounded, UnboundedReceiver};
use futures::{Stream, StreamExt, TryStreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

/// An observable subscription viewed as a [`Stream`].
///
/// Values are yielded as `Ok`, an error event is yielded as a final `Err`, and
/// completion ends the stream. Dropping the stream disposes the subscription.
pub struct EventStream<T> {
    receiver: UnboundedReceiver<Event<T>>,
    subscription: Disposable,
    done: bool,
}

impl<T> Stream for EventStream<T> {
    type Item = Result<T, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        match Pin::new(&mut self.receiver).poll_next(cx) {
            Poll::Ready(Some(Event::Next(value))) => Poll::Ready(Some(Ok(value))),
            Poll::Ready(Some(Event::Error(error))) => {
                self.done = true;
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(Some(Event::Completed)) | Poll::Ready(None) => {
                self.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for EventStream<T> {
    fn drop(&mut self) {
        self.subscription.dispose();
    }
}

impl<T: Send + 'static> Observable<T> {
    pub fn into_stream(&self) -> EventStream<T> {
        let (sender, receiver) = unbounded();
        let subscription = self.subscribe(move |event: Event<T>| {
            // The receiver is gone once the stream is dropped.
            let _ = sender.unbounded_send(event);
        });

        EventStream {
            receiver,
            subscription,
            done: false,
        }
    }

    /// Wait for the first value, disposing the subscription afterwards.
    ///
    /// Returns `None` if the sequence completes without emitting anything.
    pub async fn first(&self) -> Result<Option<T>, Error> {
        self.into_stream().next().await.transpose()
    }

    /// Wait for the last value before completion.
    pub async fn last(&self) -> Result<Option<T>, Error> {
        self.into_stream()
            .try_fold(None, |_, value| async move { Ok(Some(value)) })
            .await
    }

    /// Collect every value until completion.
    pub async fn to_vec(&self) -> Result<Vec<T>, Error> {
        self.into_stream().try_collect().await
    }
}

#[cfg(test)]
mod tests {
    use crate::{Disposable, Error, Observable, PublishSubject};
    use futures::StreamExt;

    #[tokio::test]
    async fn stream_ends_with_the_error() {
        let observable = Observable::create(|subscriber| {
            subscriber.on_next(1);
            subscriber.on_next(2);
            subscriber.on_error(Error::Disposed);
            Disposable::empty()
        });
        let items = observable.into_stream().collect::<Vec<_>>().await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().ok(), Some(&1));
        assert_eq!(items[1].as_ref().ok(), Some(&2));
        assert!(matches!(items[2], Err(Error::Disposed)));
    }

    #[tokio::test]
    async fn first_disposes_the_subscription() {
        let subject = PublishSubject::new();
        let observable = subject.as_observable();
        let pending = tokio::spawn(async move { observable.first().await });

        while subject.observer_count() == 0 {
            tokio::task::yield_now().await;
        }
        subject.on_next(7);

        assert_eq!(pending.await.unwrap().unwrap(), Some(7));
        assert_eq!(subject.observer_count(), 0);
    }

    #[tokio::test]
    async fn last_and_empty_sequences() {
        assert_eq!(Observable::from_iter(vec![1, 2, 3]).last().await.unwrap(), Some(3));
        assert_eq!(Observable::<i32>::empty().last().await.unwrap(), None);
        assert_eq!(Observable::<i32>::empty().first().await.unwrap(), None);
    }
}
