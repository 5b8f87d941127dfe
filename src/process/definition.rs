//! `ProcessDefinition<S>`: the handler registry plus lifecycle hooks that
//! parameterise a managed process (§3, §4.1).

// Layer 1: Standard library imports
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::action::{Action, ExitReason, UnhandledPolicy};
use super::error::ProcessError;
use super::handler::{CallEntry, CastEntry, ExitEntry, InfoEntry};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A single entry in `api_handlers`, preserving call/cast interleaving in
/// insertion order (§4.1: "interleaved in insertion order").
pub enum ApiEntry<S> {
    /// A registered call handler.
    Call(CallEntry<S>),
    /// A registered cast handler.
    Cast(CastEntry<S>),
}

/// The full handler registry and lifecycle hooks for a managed process
/// over state `S`.
///
/// Built via [`ProcessDefinitionBuilder`]; never constructed directly so
/// [`ProcessDefinitionBuilder::build`] can enforce configuration
/// invariants (e.g. an `unhandled_policy` that actually exists).
pub struct ProcessDefinition<S> {
    /// Handlers for the control port, tried before `api_handlers` (§4.1:
    /// control-chan sits at the front of the matcher list). Modeled as
    /// [`CastEntry`] since a control handler's shape — `(state, sender,
    /// typed payload) -> Action<S>` — is identical to an ordinary cast.
    pub(crate) control_handlers: Vec<CastEntry<S>>,
    pub(crate) api_handlers: Vec<ApiEntry<S>>,
    pub(crate) info_handlers: Vec<InfoEntry<S>>,
    pub(crate) exit_handlers: Vec<ExitEntry<S>>,
    pub(crate) timeout_handler: Option<Box<dyn Fn(S, Duration) -> BoxFuture<'static, Action<S>> + Send + Sync>>,
    pub(crate) shutdown_handler: Option<Box<dyn Fn(S, ExitReason) -> BoxFuture<'static, ()> + Send + Sync>>,
    pub(crate) unhandled_policy: UnhandledPolicy,
}

impl<S> ProcessDefinition<S> {
    /// Starts building a new definition.
    pub fn builder() -> ProcessDefinitionBuilder<S> {
        ProcessDefinitionBuilder::default()
    }
}

/// Fluent builder for [`ProcessDefinition`], following the same
/// `with_*`-then-`build()` shape used elsewhere in this crate's
/// configuration types.
pub struct ProcessDefinitionBuilder<S> {
    control_handlers: Vec<CastEntry<S>>,
    api_handlers: Vec<ApiEntry<S>>,
    info_handlers: Vec<InfoEntry<S>>,
    exit_handlers: Vec<ExitEntry<S>>,
    timeout_handler: Option<Box<dyn Fn(S, Duration) -> BoxFuture<'static, Action<S>> + Send + Sync>>,
    shutdown_handler: Option<Box<dyn Fn(S, ExitReason) -> BoxFuture<'static, ()> + Send + Sync>>,
    unhandled_policy: UnhandledPolicy,
}

impl<S> Default for ProcessDefinitionBuilder<S> {
    fn default() -> Self {
        Self {
            control_handlers: Vec::new(),
            api_handlers: Vec::new(),
            info_handlers: Vec::new(),
            exit_handlers: Vec::new(),
            timeout_handler: None,
            shutdown_handler: None,
            unhandled_policy: UnhandledPolicy::default(),
        }
    }
}

impl<S: Send + 'static> ProcessDefinitionBuilder<S> {
    /// Registers a control-port handler, tried before every `api_handlers`
    /// entry (§4.1, §4.5).
    pub fn on_control(mut self, entry: CastEntry<S>) -> Self {
        self.control_handlers.push(entry);
        self
    }

    /// Registers a call handler entry, preserving insertion order among
    /// `api_handlers`.
    pub fn on_call(mut self, entry: CallEntry<S>) -> Self {
        self.api_handlers.push(ApiEntry::Call(entry));
        self
    }

    /// Registers a cast handler entry, preserving insertion order among
    /// `api_handlers`.
    pub fn on_cast(mut self, entry: CastEntry<S>) -> Self {
        self.api_handlers.push(ApiEntry::Cast(entry));
        self
    }

    /// Registers an info handler entry.
    pub fn on_info(mut self, entry: InfoEntry<S>) -> Self {
        self.info_handlers.push(entry);
        self
    }

    /// Registers an exit handler entry.
    pub fn on_exit(mut self, entry: ExitEntry<S>) -> Self {
        self.exit_handlers.push(entry);
        self
    }

    /// Sets the handler fired when a `TimeoutAfter` deadline elapses with
    /// no message received.
    pub fn timeout_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(S, Duration) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Action<S>> + Send + 'static,
    {
        self.timeout_handler = Some(Box::new(move |state, duration| Box::pin(handler(state, duration))));
        self
    }

    /// Sets the handler run exactly once on every terminating path (§3 invariant).
    pub fn shutdown_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(S, ExitReason) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.shutdown_handler = Some(Box::new(move |state, reason| Box::pin(handler(state, reason))));
        self
    }

    /// Sets the terminal rule applied when no handler matches an envelope.
    /// Defaults to [`UnhandledPolicy::Terminate`].
    pub fn unhandled_policy(mut self, policy: UnhandledPolicy) -> Self {
        self.unhandled_policy = policy;
        self
    }

    /// Validates and finalizes the definition.
    ///
    /// # Errors
    ///
    /// Currently infallible at the non-prioritised layer; kept as
    /// `Result` so [`super::prioritized::PrioritizedProcessDefinition`]'s
    /// additional validation (control channel + priorities is a
    /// configuration error, §4.5) can surface through the same API shape.
    pub fn build(self) -> Result<ProcessDefinition<S>, ProcessError> {
        Ok(ProcessDefinition {
            control_handlers: self.control_handlers,
            api_handlers: self.api_handlers,
            info_handlers: self.info_handlers,
            exit_handlers: self.exit_handlers,
            timeout_handler: self.timeout_handler,
            shutdown_handler: self.shutdown_handler,
            unhandled_policy: self.unhandled_policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::handler::{on_call, on_cast};
    use crate::process::action::CallReply;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Counter(i64);

    #[derive(Debug)]
    struct Inc;

    #[derive(Debug)]
    struct Get;

    #[test]
    fn test_default_unhandled_policy_is_terminate() {
        let def: ProcessDefinition<Counter> = ProcessDefinition::builder().build().unwrap();
        assert!(matches!(def.unhandled_policy, UnhandledPolicy::Terminate));
    }

    #[test]
    fn test_api_handlers_preserve_interleaved_insertion_order() {
        let def: ProcessDefinition<Counter> = ProcessDefinition::builder()
            .on_cast(on_cast(|state: Counter, _sender, _msg: Inc| async move {
                Action::Continue(Counter(state.0 + 1))
            }))
            .on_call(on_call(|state: Counter, _sender, _msg: Get| async move {
                let value = state.0;
                CallReply::Reply(value, state)
            }))
            .build()
            .unwrap();

        assert_eq!(def.api_handlers.len(), 2);
        assert!(matches!(def.api_handlers[0], ApiEntry::Cast(_)));
        assert!(matches!(def.api_handlers[1], ApiEntry::Call(_)));
    }

    #[test]
    fn test_unhandled_policy_override_is_respected() {
        let def: ProcessDefinition<Counter> = ProcessDefinition::builder()
            .unhandled_policy(UnhandledPolicy::Drop)
            .build()
            .unwrap();
        assert!(matches!(def.unhandled_policy, UnhandledPolicy::Drop));
    }

    #[tokio::test]
    async fn test_timeout_handler_runs() {
        let def: ProcessDefinition<Counter> = ProcessDefinition::builder()
            .timeout_handler(|state: Counter, _d| async move { Action::stop_normal(state) })
            .build()
            .unwrap();

        let action = (def.timeout_handler.as_ref().unwrap())(Counter(1), Duration::from_millis(1)).await;
        match action {
            Action::Stop(state, reason) => {
                assert_eq!(state, Counter(1));
                assert!(reason.is_normal());
            }
            _ => panic!("expected Stop"),
        }
    }

    #[tokio::test]
    async fn test_shutdown_handler_runs() {
        let def: ProcessDefinition<Counter> = ProcessDefinition::builder()
            .shutdown_handler(|_state: Counter, _reason| async move {})
            .build()
            .unwrap();

        (def.shutdown_handler.as_ref().unwrap())(Counter(0), ExitReason::Normal).await;
    }
}
