//! Opaque message wrappers and the call/cast wire envelope.
//!
//! A handler registry holds dispatchers over heterogeneous concrete payload
//! types. [`Opaque`] is the type-erasure boundary that makes that possible:
//! a payload is boxed once at send time and recovered by a `TypeId` check at
//! match time, mirroring the "existential handler payload" design note.

// Layer 1: Standard library imports
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc}; // §3.2 MANDATORY
use dashmap::DashMap;
use tokio::sync::oneshot;

// Layer 3: Internal module imports
use crate::util::ActorId;

/// A type-erased payload, analogous to `Box<dyn Any + Send>` with a
/// friendlier API for the dispatch engine.
///
/// Construction captures both the `TypeId` and a human-readable type name
/// so unhandled-message diagnostics and dead-letter logging can describe
/// what arrived without having matched it.
pub struct Opaque {
    type_id: TypeId,
    type_name: &'static str,
    value: Box<dyn Any + Send>,
}

impl Opaque {
    /// Wraps an arbitrary `Send + 'static` payload.
    pub fn new<T: Send + 'static>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Box::new(value),
        }
    }

    /// The `TypeId` of the wrapped payload, used by handler matchers.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The wrapped payload's type name, for diagnostics and dead-letter logs.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the wrapped payload has concrete type `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Peeks at the wrapped payload without consuming it, for guard
    /// predicates that must inspect a value before a handler commits to it.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Attempts a typed projection, consuming the envelope.
    ///
    /// Returns `Err(self)` if the wrapped payload is not of type `T`, so
    /// callers can try the next matcher in the handler chain without
    /// losing the envelope.
    pub fn downcast<T: Send + 'static>(self) -> Result<T, Self> {
        if self.type_id != TypeId::of::<T>() {
            return Err(self);
        }
        match self.value.downcast::<T>() {
            Ok(boxed) => Ok(*boxed),
            Err(value) => Err(Self {
                type_id: self.type_id,
                type_name: self.type_name,
                value,
            }),
        }
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Opaque")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Reply token correlating a call with its eventual reply.
///
/// Generated from a monotonic per-client counter plus the client's
/// [`ActorId`], guaranteeing uniqueness within the caller's lifetime
/// without a central allocator (§5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplyToken {
    client: ActorId,
    seq: u64,
}

impl ReplyToken {
    /// Low-level constructor; prefer [`ReplyTokenFactory::next`] in client code.
    pub fn new(client: ActorId, seq: u64) -> Self {
        Self { client, seq }
    }

    /// The client identity that minted this token.
    pub fn client(&self) -> ActorId {
        self.client
    }

    /// The per-client sequence number.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for ReplyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.client, self.seq)
    }
}

/// Monotonic token generator owned by a single call client.
///
/// Cheap to clone; the counter is shared via `Arc` so every clone of a
/// client handle mints tokens from the same sequence.
#[derive(Debug, Clone)]
pub struct ReplyTokenFactory {
    client: ActorId,
    counter: Arc<AtomicU64>,
}

impl ReplyTokenFactory {
    /// Creates a fresh factory identified by a newly generated client id.
    pub fn new() -> Self {
        Self {
            client: ActorId::new(),
            counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Mints the next token in this client's sequence.
    pub fn next(&self) -> ReplyToken {
        ReplyToken::new(self.client, self.counter.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ReplyTokenFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a call dispatcher's reply should be delivered.
///
/// `Correlated` is the general-purpose path: the reply is looked up by
/// token in a shared table (mirroring [`crate::broker::in_memory::InMemoryMessageBroker`]'s
/// `pending_requests` map). `Direct` is the `call_chan` fast path: a
/// private oneshot channel embedded in the envelope, bypassing the shared
/// table entirely (§4.2).
pub enum ReplyAddress {
    /// Reply is routed through a shared, token-keyed table.
    Correlated {
        /// Table of in-flight reply channels, shared by every call this client has outstanding.
        pending: Arc<DashMap<ReplyToken, oneshot::Sender<Opaque>>>,
        /// The token identifying which entry to resolve.
        token: ReplyToken,
    },
    /// Reply is sent directly to a private, single-use channel.
    Direct(oneshot::Sender<Opaque>),
}

impl fmt::Debug for ReplyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyAddress::Correlated { token, .. } => {
                f.debug_struct("Correlated").field("token", token).finish()
            }
            ReplyAddress::Direct(_) => f.debug_struct("Direct").finish(),
        }
    }
}

impl ReplyAddress {
    /// Delivers a reply value to whichever client is waiting.
    ///
    /// Silently drops the reply if the caller already gave up (timed out or
    /// was dropped) — matching the "fire and forget toward a possibly-gone
    /// receiver" semantics of a plain channel send.
    pub fn reply(self, value: Opaque) {
        match self {
            ReplyAddress::Correlated { pending, token } => {
                if let Some((_, tx)) = pending.remove(&token) {
                    let _ = tx.send(value);
                }
            }
            ReplyAddress::Direct(tx) => {
                let _ = tx.send(value);
            }
        }
    }
}

/// Discriminates a [`ProcessEnvelope`] as a call awaiting a reply or a
/// fire-and-forget cast.
///
/// Exit signals are *not* a mailbox envelope kind: §9 fixes their dispatch
/// priority as equal to the control channel (checked ahead of ordinary
/// mailbox traffic, one at a time), so they travel over the dedicated
/// [`super::exit::ExitSender`]/[`super::exit::ExitReceiver`] channel instead.
#[derive(Debug)]
pub enum EnvelopeKind {
    /// Fire-and-forget; no reply is ever expected.
    Cast,
    /// Request/response; `reply_address` must eventually receive exactly
    /// one reply for `reply_token`.
    Call {
        /// Where to deliver the eventual reply.
        reply_address: ReplyAddress,
        /// The token the reply must be tagged with.
        reply_token: ReplyToken,
    },
}

/// The wire-level envelope carried through a managed process's mailbox.
///
/// Mirrors the wire semantics of §6: a cast envelope is payload-only, a
/// call envelope additionally carries a reply address and token.
#[derive(Debug)]
pub struct ProcessEnvelope {
    /// The type-erased message payload.
    pub payload: Opaque,
    /// Call or cast, and (for call) the reply routing.
    pub kind: EnvelopeKind,
    /// Optional sender identity, used for guard predicates and dead-lettering.
    pub sender: Option<ActorId>,
    /// Creation timestamp (§3.2 chrono `DateTime<Utc>`).
    pub timestamp: DateTime<Utc>,
    /// Optional time-to-live; envelopes older than this are dropped at
    /// receive time rather than dispatched, matching `MailboxError::TtlExpired`.
    pub ttl: Option<chrono::Duration>,
}

impl ProcessEnvelope {
    /// Builds a cast envelope (no reply contract).
    pub fn cast<T: Send + 'static>(payload: T) -> Self {
        Self {
            payload: Opaque::new(payload),
            kind: EnvelopeKind::Cast,
            sender: None,
            timestamp: Utc::now(),
            ttl: None,
        }
    }

    /// Builds a call envelope awaiting a reply at `reply_address`.
    pub fn call<T: Send + 'static>(
        payload: T,
        reply_address: ReplyAddress,
        reply_token: ReplyToken,
    ) -> Self {
        Self {
            payload: Opaque::new(payload),
            kind: EnvelopeKind::Call {
                reply_address,
                reply_token,
            },
            sender: None,
            timestamp: Utc::now(),
            ttl: None,
        }
    }

    /// Builder method: tag the envelope with a sender identity.
    pub fn with_sender(mut self, sender: ActorId) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Builder method: set a time-to-live.
    pub fn with_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Whether this envelope has outlived its TTL, if one was set.
    pub fn is_expired(&self) -> bool {
        match self.ttl {
            Some(ttl) => Utc::now().signed_duration_since(self.timestamp) > ttl,
            None => false,
        }
    }

    /// `true` for a call envelope, `false` for a cast envelope.
    pub fn is_call(&self) -> bool {
        matches!(self.kind, EnvelopeKind::Call { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opaque_roundtrip() {
        let opaque = Opaque::new(42i64);
        assert!(opaque.is::<i64>());
        assert!(!opaque.is::<String>());
        assert_eq!(opaque.downcast::<i64>().unwrap(), 42);
    }

    #[test]
    fn test_opaque_downcast_wrong_type_returns_self() {
        let opaque = Opaque::new("hello".to_string());
        let opaque = match opaque.downcast::<i64>() {
            Ok(_) => panic!("should not have matched i64"),
            Err(opaque) => opaque,
        };
        assert_eq!(opaque.downcast::<String>().unwrap(), "hello");
    }

    #[test]
    fn test_opaque_downcast_ref_does_not_consume() {
        let opaque = Opaque::new(7u32);
        assert_eq!(opaque.downcast_ref::<u32>(), Some(&7));
        // Still usable afterward.
        assert_eq!(opaque.downcast::<u32>().unwrap(), 7);
    }

    #[test]
    fn test_opaque_type_name() {
        let opaque = Opaque::new(1i64);
        assert!(opaque.type_name().contains("i64"));
    }

    #[test]
    fn test_reply_token_factory_is_monotonic_per_client() {
        let factory = ReplyTokenFactory::new();
        let t1 = factory.next();
        let t2 = factory.next();
        assert_eq!(t1.client(), t2.client());
        assert_eq!(t1.seq(), 0);
        assert_eq!(t2.seq(), 1);
        assert_ne!(t1, t2);
    }

    #[test]
    fn test_reply_token_factories_differ_across_clients() {
        let a = ReplyTokenFactory::new();
        let b = ReplyTokenFactory::new();
        assert_ne!(a.next().client(), b.next().client());
    }

    #[test]
    fn test_reply_token_display() {
        let factory = ReplyTokenFactory::new();
        let token = factory.next();
        let s = token.to_string();
        assert!(s.contains(':'));
    }

    #[tokio::test]
    async fn test_reply_address_correlated_routes_to_table_entry() {
        let pending = Arc::new(DashMap::new());
        let factory = ReplyTokenFactory::new();
        let token = factory.next();
        let (tx, rx) = oneshot::channel();
        pending.insert(token, tx);

        let address = ReplyAddress::Correlated {
            pending: pending.clone(),
            token,
        };
        address.reply(Opaque::new(99i64));

        let reply = rx.await.unwrap();
        assert_eq!(reply.downcast::<i64>().unwrap(), 99);
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_reply_address_direct_bypasses_table() {
        let (tx, rx) = oneshot::channel();
        let address = ReplyAddress::Direct(tx);
        address.reply(Opaque::new("pong".to_string()));
        let reply = rx.await.unwrap();
        assert_eq!(reply.downcast::<String>().unwrap(), "pong");
    }

    #[test]
    fn test_reply_to_dropped_waiter_is_silently_ignored() {
        let (tx, rx) = oneshot::channel();
        drop(rx);
        let address = ReplyAddress::Direct(tx);
        // Must not panic even though nobody is listening anymore.
        address.reply(Opaque::new(1i64));
    }

    #[test]
    fn test_cast_envelope_has_no_reply_contract() {
        let envelope = ProcessEnvelope::cast(5i64);
        assert!(!envelope.is_call());
    }

    #[test]
    fn test_call_envelope_carries_reply_routing() {
        let (tx, _rx) = oneshot::channel();
        let factory = ReplyTokenFactory::new();
        let token = factory.next();
        let envelope = ProcessEnvelope::call(5i64, ReplyAddress::Direct(tx), token);
        assert!(envelope.is_call());
    }

    #[test]
    fn test_envelope_ttl_expiration() {
        let mut envelope = ProcessEnvelope::cast(1i64).with_ttl(chrono::Duration::seconds(1));
        assert!(!envelope.is_expired());
        envelope.timestamp = Utc::now() - chrono::Duration::seconds(5);
        assert!(envelope.is_expired());
    }

    #[test]
    fn test_envelope_without_ttl_never_expires() {
        let mut envelope = ProcessEnvelope::cast(1i64);
        envelope.timestamp = Utc::now() - chrono::Duration::days(365);
        assert!(!envelope.is_expired());
    }
}
