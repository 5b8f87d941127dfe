//! Prioritised process definition: a drain-then-dispatch discipline layered
//! over an ordinary [`ProcessDefinition`] (§3, §4.4).

// Layer 1: Standard library imports
use std::any::TypeId;
use std::time::Duration;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::definition::ProcessDefinition;
use super::envelope::Opaque;
use super::error::ProcessError;

const DEFAULT_RECV_TIMEOUT_POLICY: RecvTimeoutPolicy = RecvTimeoutPolicy::Counter(32);

/// How long the drain step may run before the loop gives up on collecting
/// more messages and moves to dispatch (§4.4).
#[derive(Debug, Clone, Copy)]
pub enum RecvTimeoutPolicy {
    /// Drain at most `n` envelopes before dispatching.
    Counter(usize),
    /// Drain for at most `d` wall-clock time before dispatching.
    Timer(Duration),
}

/// One priority rule: if `matcher` recognizes an envelope's payload type,
/// it is assigned `priority`. Rules are tried in insertion order; an
/// envelope matching no rule gets priority 0 (§4.4).
pub struct DispatchPriority {
    type_id: TypeId,
    type_name: &'static str,
    priority: u32,
}

impl DispatchPriority {
    /// Assigns `priority` to every envelope carrying a payload of type `T`.
    pub fn for_type<T: 'static>(priority: u32) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            priority,
        }
    }

    /// Returns `Some(priority)` if `opaque`'s payload type matches this rule.
    pub fn matches(&self, opaque: &Opaque) -> Option<u32> {
        (opaque.type_id() == self.type_id).then_some(self.priority)
    }

    /// The payload type name this rule matches, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// A [`ProcessDefinition`] augmented with priority rules and a drain
/// budget, switching the receive loop from "block on one message" to
/// "drain then dispatch by priority" (§4.4).
///
/// Cannot be combined with a control channel (§4.5): construction from a
/// runtime that also owns a control receive-port must call
/// [`Self::reject_control_channel`] and propagate its error.
pub struct PrioritizedProcessDefinition<S> {
    pub(crate) inner: ProcessDefinition<S>,
    pub(crate) priorities: Vec<DispatchPriority>,
    pub(crate) recv_timeout_policy: RecvTimeoutPolicy,
}

impl<S> PrioritizedProcessDefinition<S> {
    /// Wraps `inner` with ordered priority rules and a drain budget.
    pub fn new(inner: ProcessDefinition<S>, priorities: Vec<DispatchPriority>, recv_timeout_policy: RecvTimeoutPolicy) -> Self {
        Self {
            inner,
            priorities,
            recv_timeout_policy,
        }
    }

    /// The priority assigned to `opaque` by the first matching rule, or 0.
    pub fn priority_of(&self, opaque: &Opaque) -> u32 {
        self.priorities
            .iter()
            .find_map(|rule| rule.matches(opaque))
            .unwrap_or(0)
    }

    /// Errors out if the caller also intends to attach a control channel;
    /// per §4.5 this is a definition-time configuration error, not a
    /// runtime hazard, so it is checked eagerly.
    pub fn reject_control_channel(&self, has_control_channel: bool) -> Result<(), ProcessError> {
        if has_control_channel {
            return Err(ProcessError::ConfigError(
                "a control channel cannot be combined with a prioritised process".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fluent builder for [`PrioritizedProcessDefinition`], matching
/// [`super::definition::ProcessDefinitionBuilder`]'s shape.
pub struct PrioritizedProcessDefinitionBuilder<S> {
    inner: ProcessDefinition<S>,
    priorities: Vec<DispatchPriority>,
    recv_timeout_policy: RecvTimeoutPolicy,
    has_control_channel: bool,
}

impl<S> PrioritizedProcessDefinitionBuilder<S> {
    /// Starts building from an already-assembled [`ProcessDefinition`].
    pub fn new(inner: ProcessDefinition<S>) -> Self {
        Self {
            inner,
            priorities: Vec::new(),
            recv_timeout_policy: DEFAULT_RECV_TIMEOUT_POLICY,
            has_control_channel: false,
        }
    }

    /// Appends a priority rule; earlier calls take precedence on ties (§4.4).
    pub fn priority(mut self, rule: DispatchPriority) -> Self {
        self.priorities.push(rule);
        self
    }

    /// Sets the drain budget bounding each drain-then-dispatch cycle.
    pub fn recv_timeout_policy(mut self, policy: RecvTimeoutPolicy) -> Self {
        self.recv_timeout_policy = policy;
        self
    }

    /// Marks that the caller also intends to attach a control channel, so
    /// `build()` can reject the combination (§4.5).
    pub fn with_control_channel(mut self) -> Self {
        self.has_control_channel = true;
        self
    }

    /// Validates and finalizes the definition.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::ConfigError`] if a control channel was also
    /// requested via [`Self::with_control_channel`].
    pub fn build(self) -> Result<PrioritizedProcessDefinition<S>, ProcessError> {
        let definition = PrioritizedProcessDefinition::new(self.inner, self.priorities, self.recv_timeout_policy);
        definition.reject_control_channel(self.has_control_channel)?;
        Ok(definition)
    }
}
