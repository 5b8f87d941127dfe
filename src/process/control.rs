//! Control channels: a typed side-band receive-port with elevated dispatch
//! priority over ordinary mailbox traffic (§4.5).
//!
//! Unlike the ordinary mailbox, a control channel carries one concrete
//! payload type `B` directly — there is no type erasure here, since the
//! loop that owns the receive-port knows `B` statically at construction
//! time.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use tokio::sync::mpsc;

// Layer 3: Internal module imports
// (none)

/// The shareable, serializable send half of a control channel.
///
/// Cheaply `Clone`; every holder can push control messages independent of
/// the ordinary mailbox's backpressure policy.
#[derive(Debug)]
pub struct ControlSender<B> {
    tx: mpsc::UnboundedSender<B>,
}

impl<B> Clone for ControlSender<B> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<B> ControlSender<B> {
    /// Sends a control message. Returns `Err` with the message back if the
    /// receive-port has been dropped.
    pub fn send(&self, message: B) -> Result<(), B> {
        self.tx.send(message).map_err(|e| e.0)
    }
}

/// The receive half of a control channel, owned exclusively by the server loop.
///
/// Per the open question in §9, a dropped send-port (all [`ControlSender`]
/// clones gone) is treated as non-terminating: [`Self::try_recv`] simply
/// never yields a message again and the loop continues to dispatch
/// ordinary mailbox traffic. See `DESIGN.md` for the rationale.
pub struct ControlReceiver<B> {
    rx: mpsc::UnboundedReceiver<B>,
}

impl<B> ControlReceiver<B> {
    /// Creates a control channel pair.
    pub fn new() -> (ControlSender<B>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ControlSender { tx }, Self { rx })
    }

    /// Non-blocking poll, used by the receive loop to give the control port
    /// strict precedence over the ordinary mailbox (§4.5).
    pub fn try_recv(&mut self) -> Option<B> {
        self.rx.try_recv().ok()
    }

    /// Awaits the next control message. Resolves to `None` only if every
    /// [`ControlSender`] has been dropped; per the non-terminating
    /// resolution of the open question, the receive loop must not treat a
    /// `None` here as a reason to stop — it should stop polling this port
    /// and fall back to ordinary dispatch.
    pub async fn recv(&mut self) -> Option<B> {
        self.rx.recv().await
    }
}

impl<B> Default for ControlReceiver<B> {
    fn default() -> Self {
        Self::new().1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_send_and_try_recv() {
        let (tx, mut rx) = ControlReceiver::new();
        tx.send(42i64).unwrap();
        assert_eq!(rx.try_recv(), Some(42));
    }

    #[test]
    fn test_try_recv_empty_returns_none() {
        let (_tx, mut rx) = ControlReceiver::<i64>::new();
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn test_sender_is_cheaply_cloneable() {
        let (tx, mut rx) = ControlReceiver::new();
        let tx2 = tx.clone();
        tx2.send("hi".to_string()).unwrap();
        assert_eq!(rx.try_recv(), Some("hi".to_string()));
    }

    #[tokio::test]
    async fn test_recv_awaits_a_message() {
        let (tx, mut rx) = ControlReceiver::new();
        tx.send(7i64).unwrap();
        assert_eq!(rx.recv().await, Some(7));
    }

    #[tokio::test]
    async fn test_dropped_sender_is_non_terminating_for_try_recv() {
        let (tx, mut rx) = ControlReceiver::<i64>::new();
        drop(tx);
        // Per the open-question resolution, this is simply "nothing more
        // will ever arrive," not a fatal condition for the receive loop.
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn test_send_after_drop_returns_message_back() {
        let (tx, rx) = ControlReceiver::new();
        drop(rx);
        let result = tx.send(99i64);
        assert_eq!(result, Err(99));
    }
}
