//! Bounded, non-blocking fan-out to subscribers

use crate::risk::RiskError;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Longest a callback may hold up its own subscriber queue
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Delivers records to every subscriber without ever waiting on one
///
/// Each subscriber owns a bounded queue. A full queue drops the record for
/// that subscriber only and bumps the drop counter.
pub struct Notifier<T> {
    capacity: usize,
    subscribers: RwLock<Vec<mpsc::Sender<T>>>,
    dropped: AtomicU64,
}

impl<T: Clone + Send + 'static> Notifier<T> {
    /// Create a new notifier with the given per-subscriber queue size
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: RwLock::new(Vec::new()),
            dropped: AtomicU64::new(0),
        }
    }

    /// Subscribe with a raw receiver
    pub fn subscribe(&self) -> mpsc::Receiver<T> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers.write().push(tx);
        rx
    }

    /// Subscribe with a callback
    ///
    /// Records are drained by an async task; each callback runs on the
    /// blocking pool, so a slow callback never occupies a runtime worker. A
    /// callback exceeding `CALLBACK_TIMEOUT` is abandoned and the next
    /// record is dispatched.
    pub fn subscribe_fn<F>(&self, callback: F) -> Result<(), RiskError>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| RiskError::NoRuntime)?;
        let mut rx = self.subscribe();
        let callback = Arc::new(callback);
        let blocking = handle.clone();
        handle.spawn(async move {
            while let Some(item) = rx.recv().await {
                let callback = Arc::clone(&callback);
                let call = blocking.spawn_blocking(move || callback(item));
                match tokio::time::timeout(CALLBACK_TIMEOUT, call).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::error!(error = %e, "Subscriber callback panicked"),
                    Err(_) => tracing::warn!(
                        timeout_secs = CALLBACK_TIMEOUT.as_secs(),
                        "Subscriber callback timed out, moving on"
                    ),
                }
            }
        });
        Ok(())
    }

    /// Offer a record to every subscriber
    ///
    /// Returns the number of subscribers that accepted it.
    pub fn publish(&self, item: &T) -> usize {
        let mut delivered = 0;
        let mut closed = false;
        {
            let subscribers = self.subscribers.read();
            for tx in subscribers.iter() {
                match tx.try_send(item.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!("Subscriber queue full, notification dropped");
                    }
                    Err(TrySendError::Closed(_)) => closed = true,
                }
            }
        }
        if closed {
            self.subscribers.write().retain(|tx| !tx.is_closed());
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Records dropped because a subscriber was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
