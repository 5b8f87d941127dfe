//! The exit channel: a dedicated side-band receive-port for structured exit
//! signals from linked/monitored peers (§6, §9).
//!
//! Exit signals are not ordinary mailbox traffic. §9 fixes their dispatch
//! priority as equal to the control channel: checked ahead of ordinary
//! mailbox messages, but delivered one at a time, never batched. Modeling
//! this as its own unbounded channel (mirroring [`super::control`]) keeps
//! that precedence mechanical rather than something each receive loop has
//! to reimplement.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use tokio::sync::mpsc;

// Layer 3: Internal module imports
use super::envelope::Opaque;
use crate::util::ActorId;

/// The shareable send half of an exit channel.
///
/// Cheaply `Clone`; any peer that holds one can report its own exit to the
/// process it is linked to or monitored by.
#[derive(Debug)]
pub struct ExitSender {
    tx: mpsc::UnboundedSender<(ActorId, Opaque)>,
}

impl Clone for ExitSender {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl ExitSender {
    /// Delivers a structured exit signal on behalf of `from`. Returns the
    /// reason back if the receive-port has been dropped.
    pub fn notify<T: Send + 'static>(&self, from: ActorId, reason: T) -> Result<(), T> {
        self.tx
            .send((from, Opaque::new(reason)))
            .map_err(|e| e.0 .1.downcast::<T>().unwrap_or_else(|_| unreachable!("reason was just boxed as T")))
    }
}

/// The receive half of an exit channel, owned exclusively by the server loop.
///
/// A dropped send-port (every [`ExitSender`] clone gone) is non-terminating,
/// matching the control channel's resolution of the same open question:
/// [`Self::try_recv`] simply never yields again and the loop continues
/// dispatching ordinary mailbox traffic.
pub struct ExitReceiver {
    rx: mpsc::UnboundedReceiver<(ActorId, Opaque)>,
}

impl ExitReceiver {
    /// Creates an exit channel pair.
    pub fn new() -> (ExitSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ExitSender { tx }, Self { rx })
    }

    /// Non-blocking poll, used by the receive loop to give exit signals
    /// strict precedence over the ordinary mailbox (§9).
    pub fn try_recv(&mut self) -> Option<(ActorId, Opaque)> {
        self.rx.try_recv().ok()
    }

    /// Awaits the next exit signal. Resolves to `None` only if every
    /// [`ExitSender`] has been dropped; the receive loop must not treat
    /// that as a reason to stop.
    pub async fn recv(&mut self) -> Option<(ActorId, Opaque)> {
        self.rx.recv().await
    }
}

impl Default for ExitReceiver {
    fn default() -> Self {
        Self::new().1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_and_try_recv() {
        let (tx, mut rx) = ExitReceiver::new();
        let from = ActorId::new();
        tx.notify(from, "boom".to_string()).unwrap();
        let (sender, opaque) = rx.try_recv().unwrap();
        assert_eq!(sender, from);
        assert_eq!(opaque.downcast::<String>().unwrap(), "boom");
    }

    #[test]
    fn test_try_recv_empty_returns_none() {
        let (_tx, mut rx) = ExitReceiver::new();
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn test_sender_is_cheaply_cloneable() {
        let (tx, mut rx) = ExitReceiver::new();
        let tx2 = tx.clone();
        let from = ActorId::new();
        tx2.notify(from, 1i64).unwrap();
        let (sender, opaque) = rx.try_recv().unwrap();
        assert_eq!(sender, from);
        assert_eq!(opaque.downcast::<i64>().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_recv_awaits_a_message() {
        let (tx, mut rx) = ExitReceiver::new();
        let from = ActorId::new();
        tx.notify(from, 7i64).unwrap();
        let (sender, opaque) = rx.recv().await.unwrap();
        assert_eq!(sender, from);
        assert_eq!(opaque.downcast::<i64>().unwrap(), 7);
    }

    #[test]
    fn test_dropped_sender_is_non_terminating_for_try_recv() {
        let (tx, mut rx) = ExitReceiver::new();
        drop(tx);
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn test_notify_after_drop_returns_reason_back() {
        let (tx, rx) = ExitReceiver::new();
        drop(rx);
        let result = tx.notify(ActorId::new(), 99i64);
        assert_eq!(result, Err(99));
    }
}
