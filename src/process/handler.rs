//! Typed handler registration and the type-erased registry entries the
//! dispatch engine actually matches against.
//!
//! User code never touches [`Opaque`] directly: `on_call`, `on_cast`,
//! `on_info`, and `on_exit` accept fully typed closures and perform the
//! erasure/downcast bookkeeping here, once, at registration time.

// Layer 1: Standard library imports
use std::any::TypeId;
use std::future::Future;
use std::pin::Pin;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::action::{Action, CallReply, DispatchCallOutcome, ExitReason};
use super::envelope::{Opaque, ReplyToken};
use crate::util::ActorId;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A registered call handler, erased over its concrete payload/reply types.
pub struct CallEntry<S> {
    type_id: TypeId,
    type_name: &'static str,
    guard: Option<Box<dyn Fn(&S, &Opaque) -> bool + Send + Sync>>,
    #[allow(clippy::type_complexity)]
    invoke: Box<
        dyn Fn(S, Option<ActorId>, ReplyToken, Opaque) -> BoxFuture<'static, DispatchCallOutcome<S>> + Send + Sync,
    >,
}

impl<S> CallEntry<S> {
    /// `true` if this entry's payload type (and optional guard) matches.
    pub fn matches(&self, state: &S, opaque: &Opaque) -> bool {
        opaque.type_id() == self.type_id && self.guard.as_ref().map_or(true, |g| g(state, opaque))
    }

    /// Runs the handler, consuming `opaque` (already confirmed to match via [`Self::matches`]).
    pub async fn invoke(
        &self,
        state: S,
        sender: Option<ActorId>,
        reply_token: ReplyToken,
        opaque: Opaque,
    ) -> DispatchCallOutcome<S> {
        (self.invoke)(state, sender, reply_token, opaque).await
    }

    /// Human-readable payload type name, for unhandled-message diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Registers a call handler for payload type `T`, replying with `R`.
pub fn on_call<S, T, R, F, Fut>(handler: F) -> CallEntry<S>
where
    S: Send + 'static,
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(S, Option<ActorId>, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallReply<S, R>> + Send + 'static,
{
    on_call_guarded(None, handler)
}

/// Registers a call handler for payload type `T`, only matched when `guard`
/// (given the current state and a peek at the payload) also returns `true`.
pub fn on_call_guarded<S, T, R, F, Fut>(
    guard: Option<Box<dyn Fn(&S, &Opaque) -> bool + Send + Sync>>,
    handler: F,
) -> CallEntry<S>
where
    S: Send + 'static,
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(S, Option<ActorId>, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallReply<S, R>> + Send + 'static,
{
    CallEntry {
        type_id: TypeId::of::<T>(),
        type_name: std::any::type_name::<T>(),
        guard,
        invoke: Box::new(move |state, sender, _reply_token, opaque| {
            let typed = match opaque.downcast::<T>() {
                Ok(value) => value,
                Err(_) => unreachable!("matches() guarantees the payload type"),
            };
            let fut = handler(state, sender, typed);
            Box::pin(async move {
                match fut.await {
                    CallReply::Reply(value, state) => DispatchCallOutcome::Reply(Opaque::new(value), state),
                    CallReply::NoReply(state) => DispatchCallOutcome::NoReply(state),
                    CallReply::StopReply(value, state, reason) => {
                        DispatchCallOutcome::StopReply(Opaque::new(value), state, reason)
                    }
                }
            })
        }),
    }
}

/// A registered cast handler, erased over its concrete payload type.
pub struct CastEntry<S> {
    type_id: TypeId,
    type_name: &'static str,
    guard: Option<Box<dyn Fn(&S, &Opaque) -> bool + Send + Sync>>,
    invoke: Box<dyn Fn(S, Option<ActorId>, Opaque) -> BoxFuture<'static, Action<S>> + Send + Sync>,
}

impl<S> CastEntry<S> {
    /// `true` if this entry's payload type (and optional guard) matches.
    pub fn matches(&self, state: &S, opaque: &Opaque) -> bool {
        opaque.type_id() == self.type_id && self.guard.as_ref().map_or(true, |g| g(state, opaque))
    }

    /// Runs the handler, consuming `opaque` (already confirmed to match via [`Self::matches`]).
    pub async fn invoke(&self, state: S, sender: Option<ActorId>, opaque: Opaque) -> Action<S> {
        (self.invoke)(state, sender, opaque).await
    }

    /// Human-readable payload type name, for unhandled-message diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Registers a cast handler for payload type `T`.
pub fn on_cast<S, T, F, Fut>(handler: F) -> CastEntry<S>
where
    S: Send + 'static,
    T: Send + 'static,
    F: Fn(S, Option<ActorId>, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Action<S>> + Send + 'static,
{
    on_cast_guarded(None, handler)
}

/// Registers a cast handler for payload type `T`, gated by `guard`.
pub fn on_cast_guarded<S, T, F, Fut>(
    guard: Option<Box<dyn Fn(&S, &Opaque) -> bool + Send + Sync>>,
    handler: F,
) -> CastEntry<S>
where
    S: Send + 'static,
    T: Send + 'static,
    F: Fn(S, Option<ActorId>, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Action<S>> + Send + 'static,
{
    CastEntry {
        type_id: TypeId::of::<T>(),
        type_name: std::any::type_name::<T>(),
        guard,
        invoke: Box::new(move |state, sender, opaque| {
            let typed = match opaque.downcast::<T>() {
                Ok(value) => value,
                Err(_) => unreachable!("matches() guarantees the payload type"),
            };
            Box::pin(handler(state, sender, typed))
        }),
    }
}

/// A registered info handler (out-of-band, non-call/cast message), erased
/// over its concrete payload type.
pub struct InfoEntry<S> {
    type_id: TypeId,
    type_name: &'static str,
    invoke: Box<dyn Fn(S, Opaque) -> BoxFuture<'static, Action<S>> + Send + Sync>,
}

impl<S> InfoEntry<S> {
    /// `true` if this entry's payload type matches.
    pub fn matches(&self, opaque: &Opaque) -> bool {
        opaque.type_id() == self.type_id
    }

    /// Runs the handler, consuming `opaque` (already confirmed to match via [`Self::matches`]).
    pub async fn invoke(&self, state: S, opaque: Opaque) -> Action<S> {
        (self.invoke)(state, opaque).await
    }

    /// Human-readable payload type name, for unhandled-message diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Registers an info handler for payload type `T`.
pub fn on_info<S, T, F, Fut>(handler: F) -> InfoEntry<S>
where
    S: Send + 'static,
    T: Send + 'static,
    F: Fn(S, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Action<S>> + Send + 'static,
{
    InfoEntry {
        type_id: TypeId::of::<T>(),
        type_name: std::any::type_name::<T>(),
        invoke: Box::new(move |state, opaque| {
            let typed = match opaque.downcast::<T>() {
                Ok(value) => value,
                Err(_) => unreachable!("matches() guarantees the payload type"),
            };
            Box::pin(handler(state, typed))
        }),
    }
}

/// A registered exit handler, matched against the typed payload carried by
/// an [`ExitReason::Other`].
pub struct ExitEntry<S> {
    type_id: TypeId,
    type_name: &'static str,
    invoke: Box<dyn Fn(S, ActorId, Opaque) -> BoxFuture<'static, Action<S>> + Send + Sync>,
}

impl<S> ExitEntry<S> {
    /// `true` if this entry's payload type matches the exit reason's payload.
    pub fn matches(&self, opaque: &Opaque) -> bool {
        opaque.type_id() == self.type_id
    }

    /// Runs the handler, consuming `opaque` (already confirmed to match via [`Self::matches`]).
    pub async fn invoke(&self, state: S, from: ActorId, opaque: Opaque) -> Action<S> {
        (self.invoke)(state, from, opaque).await
    }

    /// Human-readable payload type name, for unhandled-message diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Registers an exit handler for exit-reason payload type `T`.
///
/// Only reachable for [`ExitReason::Other`]; `Normal` and `Shutdown` carry
/// no typed payload and are handled by the runtime's fixed exit protocol
/// rather than a registered handler.
pub fn on_exit<S, T, F, Fut>(handler: F) -> ExitEntry<S>
where
    S: Send + 'static,
    T: Send + 'static,
    F: Fn(S, ActorId, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Action<S>> + Send + 'static,
{
    ExitEntry {
        type_id: TypeId::of::<T>(),
        type_name: std::any::type_name::<T>(),
        invoke: Box::new(move |state, from, opaque| {
            let typed = match opaque.downcast::<T>() {
                Ok(value) => value,
                Err(_) => unreachable!("matches() guarantees the payload type"),
            };
            Box::pin(handler(state, from, typed))
        }),
    }
}
