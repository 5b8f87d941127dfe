//! The mailbox a managed process owns and drains.
//!
//! [`ProcessEnvelope`] cannot implement [`crate::message::Message`] (it is
//! not `Clone` — it carries a type-erased, non-cloneable payload), so this
//! module provides a dedicated sender/receiver pair rather than
//! parameterising [`crate::mailbox::bounded::BoundedMailbox`]. It keeps the
//! same vocabulary and error types as the generic mailbox module
//! ([`BackpressureStrategy`], [`MailboxCapacity`], [`MailboxError`],
//! [`AtomicMetrics`]) so the two mailbox flavors read as siblings.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use tokio::sync::mpsc;

// Layer 3: Internal module imports
use super::envelope::ProcessEnvelope;
use crate::mailbox::{AtomicMetrics, BackpressureStrategy, MailboxCapacity, MailboxError, MetricsRecorder, TryRecvError};

/// Sending half of a process mailbox. Cheaply `Clone`, shareable across
/// every task that addresses this process.
#[derive(Debug, Clone)]
pub struct ProcessMailboxSender {
    tx: mpsc::Sender<ProcessEnvelope>,
    metrics: Arc<AtomicMetrics>,
    capacity: usize,
    strategy: BackpressureStrategy,
}

impl ProcessMailboxSender {
    /// Sends an envelope, applying the configured backpressure strategy if
    /// the mailbox is at capacity.
    ///
    /// # Errors
    ///
    /// Returns [`MailboxError::Full`] under `Error`, or
    /// [`MailboxError::Closed`] if the receiver has been dropped.
    pub async fn send(&self, envelope: ProcessEnvelope) -> Result<(), MailboxError> {
        match self.strategy {
            BackpressureStrategy::Block => {
                self.tx.send(envelope).await.map_err(|_| MailboxError::Closed)?;
                self.metrics.record_sent();
                Ok(())
            }
            BackpressureStrategy::Drop => match self.tx.try_send(envelope) {
                Ok(()) => {
                    self.metrics.record_sent();
                    Ok(())
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.metrics.record_dropped();
                    Ok(())
                }
                Err(mpsc::error::TrySendError::Closed(_)) => Err(MailboxError::Closed),
            },
            BackpressureStrategy::Error => self.try_send(envelope),
        }
    }

    /// Attempts to send without blocking, regardless of the configured
    /// strategy; always returns an error if the mailbox is full.
    pub fn try_send(&self, envelope: ProcessEnvelope) -> Result<(), MailboxError> {
        match self.tx.try_send(envelope) {
            Ok(()) => {
                self.metrics.record_sent();
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(MailboxError::Full {
                capacity: self.capacity,
            }),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(MailboxError::Closed),
        }
    }

    /// Current metrics snapshot for this mailbox.
    pub fn metrics(&self) -> &AtomicMetrics {
        &self.metrics
    }
}

/// Receiving half of a process mailbox, owned exclusively by the server
/// loop. Not `Clone`, matching [`crate::mailbox::traits::MailboxReceiver`]'s
/// single-owner discipline.
pub struct ProcessMailboxReceiver {
    rx: mpsc::Receiver<ProcessEnvelope>,
    metrics: Arc<AtomicMetrics>,
    capacity: MailboxCapacity,
}

impl ProcessMailboxReceiver {
    /// Creates a bounded mailbox pair with the given capacity and
    /// backpressure strategy.
    pub fn bounded(capacity: usize, strategy: BackpressureStrategy) -> (ProcessMailboxSender, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        let metrics = Arc::new(AtomicMetrics::new());
        (
            ProcessMailboxSender {
                tx,
                metrics: metrics.clone(),
                capacity,
                strategy,
            },
            Self {
                rx,
                metrics,
                capacity: MailboxCapacity::Bounded(capacity),
            },
        )
    }

    /// Blocks until the next envelope arrives, or returns `None` if the
    /// mailbox is closed and drained.
    ///
    /// Expired envelopes (per `ttl`) are transparently skipped, matching
    /// the TTL-on-receive discipline already used by
    /// [`crate::mailbox::unbounded::UnboundedMailbox`].
    pub async fn recv(&mut self) -> Option<ProcessEnvelope> {
        loop {
            let envelope = self.rx.recv().await?;
            self.metrics.record_received();
            if envelope.is_expired() {
                continue;
            }
            return Some(envelope);
        }
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Result<ProcessEnvelope, TryRecvError> {
        loop {
            let envelope = match self.rx.try_recv() {
                Ok(envelope) => envelope,
                Err(mpsc::error::TryRecvError::Empty) => return Err(TryRecvError::Empty),
                Err(mpsc::error::TryRecvError::Disconnected) => return Err(TryRecvError::Closed),
            };
            self.metrics.record_received();
            if envelope.is_expired() {
                continue;
            }
            return Ok(envelope);
        }
    }

    /// The mailbox's capacity configuration.
    pub fn capacity(&self) -> MailboxCapacity {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::envelope::ProcessEnvelope;

    #[tokio::test]
    async fn test_send_and_recv_roundtrip() {
        let (tx, mut rx) = ProcessMailboxReceiver::bounded(8, BackpressureStrategy::Block);
        tx.send(ProcessEnvelope::cast(1i64)).await.unwrap();
        let envelope = rx.recv().await.unwrap();
        assert!(!envelope.is_call());
    }

    #[tokio::test]
    async fn test_error_strategy_errors_when_full() {
        let (tx, _rx) = ProcessMailboxReceiver::bounded(1, BackpressureStrategy::Error);
        tx.send(ProcessEnvelope::cast(1i64)).await.unwrap();
        let result = tx.send(ProcessEnvelope::cast(2i64)).await;
        assert!(matches!(result, Err(MailboxError::Full { capacity: 1 })));
    }

    #[tokio::test]
    async fn test_drop_strategy_discards_silently_when_full() {
        let (tx, _rx) = ProcessMailboxReceiver::bounded(1, BackpressureStrategy::Drop);
        tx.send(ProcessEnvelope::cast(1i64)).await.unwrap();
        // Should not error even though the mailbox is full.
        tx.send(ProcessEnvelope::cast(2i64)).await.unwrap();
        assert_eq!(tx.metrics().dropped_count(), 1);
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let (_tx, mut rx) = ProcessMailboxReceiver::bounded(4, BackpressureStrategy::Block);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_closed_mailbox_recv_returns_none() {
        let (tx, mut rx) = ProcessMailboxReceiver::bounded(4, BackpressureStrategy::Block);
        drop(tx);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_expired_envelope_is_skipped_on_recv() {
        let (tx, mut rx) = ProcessMailboxReceiver::bounded(4, BackpressureStrategy::Block);
        let mut expired = ProcessEnvelope::cast(1i64).with_ttl(chrono::Duration::seconds(1));
        expired.timestamp = chrono::Utc::now() - chrono::Duration::seconds(10);
        tx.send(expired).await.unwrap();
        tx.send(ProcessEnvelope::cast(2i64)).await.unwrap();

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.payload.downcast::<i64>().unwrap(), 2);
    }
}
