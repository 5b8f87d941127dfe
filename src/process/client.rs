//! Client-side call/cast API (§4.2, §6 wire formats).
//!
//! A [`ProcessClient`] is a cheap, `Clone`able handle addressing one
//! managed process's mailbox. It is the only way the rest of the crate
//! talks to a managed process — the mailbox sender is never exposed raw.

// Layer 1: Standard library imports
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use tokio::sync::oneshot;

// Layer 3: Internal module imports
use super::envelope::{Opaque, ProcessEnvelope, ReplyAddress, ReplyToken, ReplyTokenFactory};
use super::error::ProcessError;
use super::exit::ExitSender;
use super::mailbox::ProcessMailboxSender;
use crate::util::ActorId;

/// Handle for sending casts and calls to a managed process.
///
/// Carries the target's exit-signal sender alongside its mailbox sender so
/// a single client can fully address a process: `exit` is `None` for a
/// caller that only ever intends to cast/call, `Some` once linked against
/// the target via [`Self::linked_to`] so [`Self::notify_exit`] becomes
/// available.
#[derive(Clone)]
pub struct ProcessClient {
    mailbox: ProcessMailboxSender,
    exit: Option<ExitSender>,
    pending: Arc<DashMap<ReplyToken, oneshot::Sender<Opaque>>>,
    tokens: ReplyTokenFactory,
}

impl ProcessClient {
    /// Wraps a mailbox sender with fresh call-correlation state.
    pub fn new(mailbox: ProcessMailboxSender) -> Self {
        Self {
            mailbox,
            exit: None,
            pending: Arc::new(DashMap::new()),
            tokens: ReplyTokenFactory::new(),
        }
    }

    /// Attaches the target's exit-signal sender, enabling [`Self::notify_exit`].
    /// Used once a link/monitor is established against the target (§6).
    pub fn linked_to(mut self, exit: ExitSender) -> Self {
        self.exit = Some(exit);
        self
    }

    /// Fire-and-forget send; no reply is ever expected.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Mailbox`] if the target's mailbox is closed
    /// or rejects the send under its configured backpressure strategy.
    pub async fn cast<T: Send + 'static>(&self, payload: T) -> Result<(), ProcessError> {
        self.mailbox.send(ProcessEnvelope::cast(payload)).await?;
        Ok(())
    }

    /// Delivers a structured exit signal on behalf of `from` over the
    /// target's dedicated exit channel (§6, §9) — not the ordinary mailbox,
    /// so it is drained ahead of cast/call traffic. Used by links/monitors
    /// reporting a peer's termination; no reply is ever expected.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::MailboxClosed`] if no [`Self::linked_to`] exit
    /// sender is attached, or if the target's exit receiver has been dropped.
    pub fn notify_exit<T: Send + 'static>(&self, from: ActorId, reason: T) -> Result<(), ProcessError> {
        match &self.exit {
            Some(exit) => exit.notify(from, reason).map_err(|_| ProcessError::MailboxClosed),
            None => Err(ProcessError::MailboxClosed),
        }
    }

    /// Request/response call, correlated through the shared pending-reply
    /// table (the general-purpose path; see [`Self::call_chan`] for the
    /// table-free fast path).
    ///
    /// Blocks indefinitely if the server's reply type does not match `R`
    /// expectations at the type level — this is the documented
    /// type-mismatch hazard (§4.2). Prefer [`Self::call_timeout`] unless the
    /// protocol contract is already statically verified.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Mailbox`] if the send fails, or
    /// [`ProcessError::UnroutableReply`] if a reply arrived but its runtime
    /// type did not match `R`.
    pub async fn call<T: Send + 'static, R: Send + 'static>(&self, payload: T) -> Result<R, ProcessError> {
        let token = self.tokens.next();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(token, tx);

        let address = ReplyAddress::Correlated {
            pending: self.pending.clone(),
            token,
        };
        if let Err(err) = self.mailbox.send(ProcessEnvelope::call(payload, address, token)).await {
            self.pending.remove(&token);
            return Err(err.into());
        }

        match rx.await {
            Ok(opaque) => opaque.downcast::<R>().map_err(|_| ProcessError::UnroutableReply),
            Err(_) => Err(ProcessError::MailboxClosed),
        }
    }

    /// Like [`Self::call`], but bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::ReplyTimeout`] if no reply arrives within
    /// `timeout`, in addition to the errors [`Self::call`] can return.
    pub async fn call_timeout<T: Send + 'static, R: Send + 'static>(
        &self,
        payload: T,
        timeout: Duration,
    ) -> Result<R, ProcessError> {
        let token = self.tokens.next();
        match tokio::time::timeout(timeout, self.call_with_token::<T, R>(payload, token)).await {
            Ok(result) => result,
            Err(_) => {
                self.pending.remove(&token);
                Err(ProcessError::ReplyTimeout { token: token.to_string() })
            }
        }
    }

    async fn call_with_token<T: Send + 'static, R: Send + 'static>(
        &self,
        payload: T,
        token: ReplyToken,
    ) -> Result<R, ProcessError> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(token, tx);

        let address = ReplyAddress::Correlated {
            pending: self.pending.clone(),
            token,
        };
        self.mailbox
            .send(ProcessEnvelope::call(payload, address, token))
            .await?;

        let opaque = rx.await.map_err(|_| ProcessError::MailboxClosed)?;
        opaque.downcast::<R>().map_err(|_| ProcessError::UnroutableReply)
    }

    /// Call variant that bypasses the shared pending-reply table entirely:
    /// a private oneshot channel is embedded directly in the envelope
    /// (§4.2's `call_chan`), avoiding the table insert/remove on the hot
    /// path at the cost of the caller committing to a single expected
    /// reply type up front.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Mailbox`] if the send fails, or
    /// [`ProcessError::UnroutableReply`] if the reply's runtime type did
    /// not match `R`.
    pub async fn call_chan<T: Send + 'static, R: Send + 'static>(&self, payload: T) -> Result<R, ProcessError> {
        let (tx, rx) = oneshot::channel();
        let token = self.tokens.next();
        self.mailbox
            .send(ProcessEnvelope::call(payload, ReplyAddress::Direct(tx), token))
            .await?;

        let opaque = rx.await.map_err(|_| ProcessError::MailboxClosed)?;
        opaque.downcast::<R>().map_err(|_| ProcessError::UnroutableReply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::BackpressureStrategy;
    use crate::process::exit::ExitReceiver;
    use crate::process::mailbox::ProcessMailboxReceiver;

    #[tokio::test]
    async fn test_notify_exit_delivers_over_the_exit_channel_not_the_mailbox() {
        let (mailbox_tx, mut mailbox_rx) = ProcessMailboxReceiver::bounded(4, BackpressureStrategy::Block);
        let (exit_tx, mut exit_rx) = ExitReceiver::new();
        let client = ProcessClient::new(mailbox_tx).linked_to(exit_tx);
        let from = ActorId::new();
        client.notify_exit(from, "boom".to_string()).unwrap();

        let (sender, opaque) = exit_rx.try_recv().unwrap();
        assert_eq!(sender, from);
        assert_eq!(opaque.downcast::<String>().unwrap(), "boom");
        assert!(mailbox_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_notify_exit_without_a_linked_sender_errors() {
        let (mailbox_tx, _mailbox_rx) = ProcessMailboxReceiver::bounded(4, BackpressureStrategy::Block);
        let client = ProcessClient::new(mailbox_tx);
        let result = client.notify_exit(ActorId::new(), "boom".to_string());
        assert!(matches!(result, Err(ProcessError::MailboxClosed)));
    }

    #[tokio::test]
    async fn test_cast_delivers_payload() {
        let (tx, mut rx) = ProcessMailboxReceiver::bounded(4, BackpressureStrategy::Block);
        let client = ProcessClient::new(tx);
        client.cast(5i64).await.unwrap();
        let envelope = rx.recv().await.unwrap();
        assert!(!envelope.is_call());
        assert_eq!(envelope.payload.downcast::<i64>().unwrap(), 5);
    }

    #[tokio::test]
    async fn test_call_chan_roundtrip() {
        let (tx, mut rx) = ProcessMailboxReceiver::bounded(4, BackpressureStrategy::Block);
        let client = ProcessClient::new(tx);

        let server = tokio::spawn(async move {
            let envelope = rx.recv().await.unwrap();
            let n = envelope.payload.downcast::<i64>().unwrap();
            match envelope.kind {
                crate::process::envelope::EnvelopeKind::Call { reply_address, .. } => {
                    reply_address.reply(Opaque::new(n + 1));
                }
                crate::process::envelope::EnvelopeKind::Cast => {
                    panic!("expected call")
                }
            }
        });

        let reply: i64 = client.call_chan(41i64).await.unwrap();
        assert_eq!(reply, 42);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_call_correlated_roundtrip() {
        let (tx, mut rx) = ProcessMailboxReceiver::bounded(4, BackpressureStrategy::Block);
        let client = ProcessClient::new(tx);

        let server = tokio::spawn(async move {
            let envelope = rx.recv().await.unwrap();
            let n = envelope.payload.downcast::<i64>().unwrap();
            match envelope.kind {
                crate::process::envelope::EnvelopeKind::Call { reply_address, .. } => {
                    reply_address.reply(Opaque::new(n * 2));
                }
                crate::process::envelope::EnvelopeKind::Cast => {
                    panic!("expected call")
                }
            }
        });

        let reply: i64 = client.call(21i64).await.unwrap();
        assert_eq!(reply, 42);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_call_wrong_reply_type_is_unroutable() {
        let (tx, mut rx) = ProcessMailboxReceiver::bounded(4, BackpressureStrategy::Block);
        let client = ProcessClient::new(tx);

        let server = tokio::spawn(async move {
            let envelope = rx.recv().await.unwrap();
            match envelope.kind {
                crate::process::envelope::EnvelopeKind::Call { reply_address, .. } => {
                    reply_address.reply(Opaque::new("not an i64".to_string()));
                }
                crate::process::envelope::EnvelopeKind::Cast => {
                    panic!("expected call")
                }
            }
        });

        let reply = client.call::<i64, i64>(1i64).await;
        assert!(matches!(reply, Err(ProcessError::UnroutableReply)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_call_timeout_fires_when_no_reply() {
        let (tx, _rx) = ProcessMailboxReceiver::bounded(4, BackpressureStrategy::Block);
        let client = ProcessClient::new(tx);
        let result: Result<i64, ProcessError> = client.call_timeout(1i64, Duration::from_millis(20)).await;
        assert!(matches!(result, Err(ProcessError::ReplyTimeout { .. })));
    }

    #[tokio::test]
    async fn test_call_on_closed_mailbox_errors() {
        let (tx, rx) = ProcessMailboxReceiver::bounded(4, BackpressureStrategy::Block);
        drop(rx);
        let client = ProcessClient::new(tx);
        let result = client.cast(1i64).await;
        assert!(matches!(result, Err(ProcessError::Mailbox(_))));
    }
}
