//! Tagged sum types returned by handler bodies: the process action, the
//! call reply, the exit reason, and the init outcome.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::envelope::Opaque;
use super::mailbox::ProcessMailboxSender;

/// What a handler wants the receive loop to do next.
///
/// State is threaded by value rather than through `&mut S`: every variant
/// that keeps the process alive carries the new state directly, matching
/// the functional-update style of the originating model and sidestepping
/// the lifetime friction of borrowing state across an `.await` point.
pub enum Action<S> {
    /// Loop again with the new state, no deadline.
    Continue(S),
    /// Loop again with the new state; fire `timeout_handler` if no message
    /// arrives within `Duration`.
    TimeoutAfter(S, Duration),
    /// Release non-essential resources, sleep at least `Duration`, then
    /// resume with no deadline.
    Hibernate(S, Duration),
    /// Run `shutdown_handler(state, reason)` and terminate.
    Stop(S, ExitReason),
}

impl<S> Action<S> {
    /// Convenience constructor for `Stop(state, ExitReason::Normal)`.
    pub fn stop_normal(state: S) -> Self {
        Action::Stop(state, ExitReason::Normal)
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for Action<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Continue(s) => f.debug_tuple("Continue").field(s).finish(),
            Action::TimeoutAfter(s, d) => f.debug_tuple("TimeoutAfter").field(s).field(d).finish(),
            Action::Hibernate(s, d) => f.debug_tuple("Hibernate").field(s).field(d).finish(),
            Action::Stop(s, r) => f.debug_tuple("Stop").field(s).field(r).finish(),
        }
    }
}

/// The outcome of a call handler body, typed from the user's perspective.
///
/// `R` is the reply value type; it is erased to an [`Opaque`] once the
/// dispatch engine routes the reply, so user code never deals with
/// erasure directly.
pub enum CallReply<S, R> {
    /// Send `value` to the caller, then continue with `state`.
    Reply(R, S),
    /// Do not reply now. The dispatcher records `(token, reply_address)` in
    /// the pending-replies table; the handler is responsible for replying
    /// later via that token.
    NoReply(S),
    /// Send `value`, then stop with `reason`.
    StopReply(R, S, ExitReason),
}

/// The type-erased counterpart of [`CallReply`] used internally by the
/// dispatch engine once a handler body has returned.
pub(crate) enum DispatchCallOutcome<S> {
    Reply(Opaque, S),
    NoReply(S),
    StopReply(Opaque, S, ExitReason),
}

/// Closed sum of reasons a process may terminate with.
///
/// `Other` carries an erased payload so structured exits can transport
/// arbitrary user-defined reason types, recovered by `exit_handlers`
/// through the same matcher mechanism as ordinary messages.
pub enum ExitReason {
    /// Ordinary, expected termination.
    Normal,
    /// Termination requested by a supervisor or peer.
    Shutdown,
    /// Any other typed reason, routed through `exit_handlers` on the
    /// receiving end.
    Other(Opaque),
}

impl ExitReason {
    /// Convenience constructor wrapping any `Send + 'static` payload.
    pub fn other<T: Send + 'static>(payload: T) -> Self {
        ExitReason::Other(Opaque::new(payload))
    }

    /// `true` for `Normal`.
    pub fn is_normal(&self) -> bool {
        matches!(self, ExitReason::Normal)
    }
}

impl std::fmt::Debug for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::Normal => write!(f, "Normal"),
            ExitReason::Shutdown => write!(f, "Shutdown"),
            ExitReason::Other(opaque) => write!(f, "Other({})", opaque.type_name()),
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// What `init(args)` decided before the receive loop would start.
pub enum InitResult<S> {
    /// Enter the loop with `state` and an optional initial deadline.
    InitOk(S, Option<Duration>),
    /// Do not enter the loop; terminate immediately reporting `reason`.
    InitStop(ExitReason),
    /// Do not enter the loop; return normally without reporting anything.
    InitIgnore,
}

/// The terminal rule applied when no handler in the registry matches an
/// incoming envelope.
///
/// `DeadLetter` holds a mailbox sender rather than an address: this crate
/// has no global registry capable of resolving an address into a sink, so
/// the caller must already hold a handle to whatever process should
/// receive the forwarded envelope.
#[derive(Debug, Clone)]
pub enum UnhandledPolicy {
    /// Stop the process with `Other("unhandled")`.
    Terminate,
    /// Discard the envelope silently and keep running.
    Drop,
    /// Forward the opaque envelope to this mailbox and keep running.
    DeadLetter(ProcessMailboxSender),
}

impl Default for UnhandledPolicy {
    fn default() -> Self {
        UnhandledPolicy::Terminate
    }
}
