use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures_channel::oneshot;
use futures_util::future::Shared;
use futures_util::FutureExt;

use crate::Error;

/// Fulfilment side of a single write acknowledgement.
///
/// A request body producer awaits the [`AckFuture`] handed back with each
/// write before producing the next part. While the producer is paused the
/// task machine holds on to the `WriteAck` and fulfils it on the transition
/// out of the paused state.
///
/// Dropping an unfulfilled `WriteAck` fails the awaiting producer with
/// [`Error::RequestStreamCancelled`], which is what keeps the "fulfilled on
/// any transition out of paused" rule intact when a machine moves to a
/// terminal state and drops its payload.
pub struct WriteAck {
    tx: oneshot::Sender<Result<(), Error>>,
}

impl WriteAck {
    /// A new, pending acknowledgement.
    pub fn pending() -> (WriteAck, AckFuture) {
        let (tx, rx) = oneshot::channel();
        (WriteAck { tx }, AckFuture { rx: rx.shared() })
    }

    /// An acknowledgement that is already successful.
    ///
    /// Handed out while the producer is running unhindered, so awaiting it
    /// resolves immediately.
    pub fn completed() -> AckFuture {
        let (ack, future) = WriteAck::pending();
        ack.succeed();
        future
    }

    /// Let the awaiting producer continue.
    pub fn succeed(self) {
        let _ = self.tx.send(Ok(()));
    }

    /// Fail the awaiting producer.
    ///
    /// This only fails the producer's wait, not the task as a whole.
    pub fn fail(self, error: Error) {
        let _ = self.tx.send(Err(error));
    }
}

impl fmt::Debug for WriteAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WriteAck")
    }
}

/// Await side of a single write acknowledgement.
///
/// Clonable: a repeated write while the producer is paused hands out the
/// same pending acknowledgement again, and every clone resolves when it is
/// fulfilled.
#[derive(Clone)]
pub struct AckFuture {
    rx: Shared<oneshot::Receiver<Result<(), Error>>>,
}

impl Future for AckFuture {
    type Output = Result<(), Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match ready!(Pin::new(&mut self.rx).poll(cx)) {
            Ok(v) => Poll::Ready(v),
            // The fulfilment side was dropped without an answer.
            Err(_) => Poll::Ready(Err(Error::RequestStreamCancelled)),
        }
    }
}

impl fmt::Debug for AckFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AckFuture")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_executor::block_on;
    use futures_util::FutureExt;

    #[test]
    fn succeed_resolves_awaiter() {
        let (ack, future) = WriteAck::pending();
        ack.succeed();
        assert_eq!(block_on(future), Ok(()));
    }

    #[test]
    fn fail_resolves_awaiter_with_error() {
        let (ack, future) = WriteAck::pending();
        ack.fail(Error::Cancelled);
        assert_eq!(block_on(future), Err(Error::Cancelled));
    }

    #[test]
    fn drop_fails_awaiter() {
        let (ack, future) = WriteAck::pending();
        drop(ack);
        assert_eq!(block_on(future), Err(Error::RequestStreamCancelled));
    }

    #[test]
    fn completed_resolves_immediately() {
        let future = WriteAck::completed();
        assert_eq!(future.now_or_never(), Some(Ok(())));
    }

    #[test]
    fn clones_share_fulfilment() {
        let (ack, future) = WriteAck::pending();
        let second = future.clone();

        assert!(second.clone().now_or_never().is_none());

        ack.succeed();

        assert_eq!(block_on(future), Ok(()));
        assert_eq!(block_on(second), Ok(()));
    }
}
