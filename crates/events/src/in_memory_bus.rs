//! In-memory fan-out result bus for tests/dev.

use std::sync::{Mutex, mpsc};

use thiserror::Error;
use tracing::debug;

use crate::channel::{ResultChannel, Subscription};

#[derive(Debug, Error)]
pub enum InMemoryBusError {
    /// Send failed due to internal lock poisoning.
    #[error("result bus lock poisoned")]
    Poisoned,
}

/// In-memory multi-producer result bus.
///
/// - No IO / no async
/// - Every subscriber receives a copy of every message
/// - Dropped subscribers are pruned on the next send
/// - Messages sent while nobody is subscribed are discarded
#[derive(Debug)]
pub struct InMemoryResultBus<M> {
    subscribers: Mutex<Vec<mpsc::Sender<M>>>,
}

impl<M> InMemoryResultBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new consumer.
    pub fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        // If the lock is poisoned, we still return a subscription;
        // it just won't receive messages until the process restarts.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|subs| subs.len()).unwrap_or(0)
    }
}

impl<M> Default for InMemoryResultBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M> ResultChannel<M> for InMemoryResultBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn send(&self, message: M) -> Result<(), Self::Error> {
        let mut subs = self
            .subscribers
            .lock()
            .map_err(|_| InMemoryBusError::Poisoned)?;

        subs.retain(|tx| tx.send(message.clone()).is_ok());
        if subs.is_empty() {
            debug!("result bus has no subscribers; message dropped");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fans_out_to_every_subscriber() {
        let bus = InMemoryResultBus::<String>::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.send("T1".to_string()).unwrap();

        assert_eq!(a.try_recv().unwrap(), "T1");
        assert_eq!(b.try_recv().unwrap(), "T1");
    }

    #[test]
    fn prunes_dropped_subscribers() {
        let bus = InMemoryResultBus::<u8>::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        bus.send(1).unwrap();

        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(kept.try_recv().unwrap(), 1);
    }
}
