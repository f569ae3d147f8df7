//! Result channel abstraction (send side) and subscriptions (receive side).
//!
//! Jobs report their terminal outcome through a **result channel**. The channel
//! decouples job execution from result handling:
//!
//! ```text
//! caller ─ start job ─▶ job thread ─ send(msg) ─▶ ResultChannel ─▶ Subscription ─▶ consumer
//! ```
//!
//! ## Contract
//!
//! - **Send-only for producers**: jobs never read from the channel and never close it.
//!   Closing is the consumer's lifecycle decision (dropping its receiver).
//! - **Many producers**: any number of jobs may send concurrently.
//! - **No ordering across producers**: messages from different jobs arrive in any order.
//! - **Ownership moves on send**: a producer keeps no reference to a sent message.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, Sender, SyncSender, TryRecvError};
use std::time::Duration;

use thiserror::Error;

/// Receiving half handed to a consumer.
///
/// Designed for single-threaded consumption: one consumer thread per subscription.
///
/// ```ignore
/// let sub = bus.subscribe();
/// loop {
///     match sub.recv_timeout(Duration::from_millis(250)) {
///         Ok(msg) => handle(msg),
///         Err(RecvTimeoutError::Timeout) => continue,     // check for shutdown
///         Err(RecvTimeoutError::Disconnected) => break,   // all producers gone
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// The receiving side is gone; the message was not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("result channel closed")]
pub struct ChannelClosed;

/// Send-only handle for delivering job results.
///
/// Implementations must be safe to share across threads: every running job
/// holds (a clone of) the same channel.
pub trait ResultChannel<M>: Send + Sync {
    type Error: core::fmt::Debug + core::fmt::Display + Send + Sync + 'static;

    fn send(&self, message: M) -> Result<(), Self::Error>;
}

impl<M, C> ResultChannel<M> for Arc<C>
where
    C: ResultChannel<M> + ?Sized,
{
    type Error = C::Error;

    fn send(&self, message: M) -> Result<(), Self::Error> {
        (**self).send(message)
    }
}

impl<M, C> ResultChannel<M> for &C
where
    C: ResultChannel<M> + ?Sized,
{
    type Error = C::Error;

    fn send(&self, message: M) -> Result<(), Self::Error> {
        (**self).send(message)
    }
}

impl<M: Send> ResultChannel<M> for Sender<M> {
    type Error = ChannelClosed;

    fn send(&self, message: M) -> Result<(), Self::Error> {
        Sender::send(self, message).map_err(|_| ChannelClosed)
    }
}

/// Bounded variant: `send` blocks while the buffer is full.
impl<M: Send> ResultChannel<M> for SyncSender<M> {
    type Error = ChannelClosed;

    fn send(&self, message: M) -> Result<(), Self::Error> {
        SyncSender::send(self, message).map_err(|_| ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn sender_delivers_to_subscription() {
        let (tx, rx) = mpsc::channel::<u32>();
        let sub = Subscription::new(rx);

        ResultChannel::send(&tx, 7).unwrap();

        assert_eq!(sub.try_recv().unwrap(), 7);
    }

    #[test]
    fn sender_reports_closed_channel() {
        let (tx, rx) = mpsc::channel::<u32>();
        drop(rx);

        assert_eq!(ResultChannel::send(&tx, 1), Err(ChannelClosed));
    }

    #[test]
    fn arc_forwards_to_inner_channel() {
        let (tx, rx) = mpsc::sync_channel::<&'static str>(1);
        let shared = Arc::new(tx);

        shared.send("done").unwrap();

        assert_eq!(rx.recv().unwrap(), "done");
    }
}
