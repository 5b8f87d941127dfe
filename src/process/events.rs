//! Monitoring events emitted by the managed-process dispatch engine.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use serde::Serialize;

// Layer 3: Internal module imports
use crate::monitoring::{EventSeverity, MonitoringEvent};
use crate::util::ActorId;

/// A monitoring event emitted by a managed process as it runs.
///
/// Recorded through the same [`crate::monitoring::Monitor`] abstraction
/// used everywhere else in this crate; a [`crate::monitoring::NoopMonitor`]
/// compiles the recording calls away entirely.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessEvent {
    /// Timestamp when the event occurred (§3.2 chrono `DateTime<Utc>`).
    pub timestamp: DateTime<Utc>,

    /// ID of the process that emitted this event.
    pub process_id: ActorId,

    /// What happened.
    pub event_kind: ProcessEventKind,
}

impl ProcessEvent {
    /// Builds an event stamped with the current time.
    pub fn new(process_id: ActorId, event_kind: ProcessEventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            process_id,
            event_kind,
        }
    }
}

impl MonitoringEvent for ProcessEvent {
    const EVENT_TYPE: &'static str = "process";

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn severity(&self) -> EventSeverity {
        match &self.event_kind {
            ProcessEventKind::Started => EventSeverity::Info,
            ProcessEventKind::Dispatched { .. } => EventSeverity::Trace,
            ProcessEventKind::Unhandled { .. } => EventSeverity::Warning,
            ProcessEventKind::TimeoutFired => EventSeverity::Debug,
            ProcessEventKind::Hibernating { .. } => EventSeverity::Debug,
            ProcessEventKind::ExitRouted { matched: true } => EventSeverity::Info,
            ProcessEventKind::ExitRouted { matched: false } => EventSeverity::Error,
            ProcessEventKind::Stopped { reason } if reason == "Normal" => EventSeverity::Info,
            ProcessEventKind::Stopped { .. } => EventSeverity::Warning,
        }
    }
}

/// Specific kinds of events a managed process can report.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ProcessEventKind {
    /// The process entered its receive loop after a successful `init`.
    Started,

    /// A handler was matched and invoked.
    Dispatched {
        /// Human-readable handler kind: "call", "cast", "control", "info", "exit".
        handler_kind: &'static str,
    },

    /// No handler matched; `unhandled_policy` was applied.
    Unhandled {
        /// Display name of the `unhandled_policy` variant that was applied.
        policy: &'static str,
    },

    /// `timeout_handler` fired after the receive deadline elapsed.
    TimeoutFired,

    /// The process entered `Hibernate`.
    Hibernating {
        /// How long the process slept.
        #[serde(with = "crate::util::duration_serde")]
        duration: Duration,
    },

    /// An exit signal was routed through `exit_handlers`.
    ExitRouted {
        /// Whether a registered handler matched the exit payload type.
        matched: bool,
    },

    /// The process terminated.
    Stopped {
        /// Display rendering of the `ExitReason` the process stopped with.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_started_event_is_info() {
        let event = ProcessEvent::new(ActorId::new(), ProcessEventKind::Started);
        assert_eq!(event.severity(), EventSeverity::Info);
        assert_eq!(ProcessEvent::EVENT_TYPE, "process");
    }

    #[test]
    fn test_unhandled_event_is_warning() {
        let event = ProcessEvent::new(
            ActorId::new(),
            ProcessEventKind::Unhandled { policy: "Terminate" },
        );
        assert_eq!(event.severity(), EventSeverity::Warning);
    }

    #[test]
    fn test_stopped_normal_is_info() {
        let event = ProcessEvent::new(
            ActorId::new(),
            ProcessEventKind::Stopped {
                reason: "Normal".to_string(),
            },
        );
        assert_eq!(event.severity(), EventSeverity::Info);
    }

    #[test]
    fn test_stopped_other_is_warning() {
        let event = ProcessEvent::new(
            ActorId::new(),
            ProcessEventKind::Stopped {
                reason: "Other(\"unhandled\")".to_string(),
            },
        );
        assert_eq!(event.severity(), EventSeverity::Warning);
    }

    #[test]
    fn test_exit_routed_unmatched_is_error() {
        let event = ProcessEvent::new(ActorId::new(), ProcessEventKind::ExitRouted { matched: false });
        assert_eq!(event.severity(), EventSeverity::Error);
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn test_dispatched_event_serializes() {
        let event = ProcessEvent::new(
            ActorId::new(),
            ProcessEventKind::Dispatched { handler_kind: "call" },
        );
        let json = serde_json::to_string(&event).expect("serialization should succeed");
        assert!(json.contains("Dispatched"));
        assert!(json.contains("call"));
    }
}
