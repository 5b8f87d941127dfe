//! Error types for the managed-process dispatch engine.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::mailbox::MailboxError;
use crate::monitoring::MonitoringError;

/// Errors raised by a managed process while it initializes, dispatches,
/// or shuts down.
///
/// Follows the same structured-enum-plus-predicates shape as
/// [`crate::system::SystemError`] and [`crate::mailbox::MailboxError`].
#[derive(Error, Debug)]
pub enum ProcessError {
    /// `init(args)` returned `InitStop` or panicked logically before entering the loop.
    #[error("process init failed: {0}")]
    InitFailed(String),

    /// A handler body panicked. Unreachable under normal operation — a
    /// panic unwinds the task rather than returning through this enum —
    /// but retained as a taxonomy member for the unstructured-exit hazard
    /// documented for links/monitors.
    #[error("handler panicked")]
    HandlerPanicked,

    /// The process's mailbox was closed while the loop expected to keep receiving.
    #[error("process mailbox closed")]
    MailboxClosed,

    /// A `call` client's reply token never observed a matching reply within
    /// its timeout budget.
    #[error("call timed out waiting for reply to token {token}")]
    ReplyTimeout {
        /// String rendering of the reply token that timed out.
        token: String,
    },

    /// A reply value arrived whose type did not match what the waiting
    /// caller expected. Documented hazard from the type-mismatch scenario:
    /// the caller is responsible for using a timeout-bearing call variant.
    #[error("reply value type did not match caller expectation")]
    UnroutableReply,

    /// Definition-time configuration error, e.g. combining a control
    /// channel with a prioritised process.
    #[error("process configuration error: {0}")]
    ConfigError(String),

    /// `shutdown_handler` raised while running. The spec treats this as
    /// an undefined, fatal-bug outcome; surfaced here rather than silently
    /// swallowed.
    #[error("shutdown handler failed: {0}")]
    ShutdownHandlerFailed(String),

    /// The process stopped with anything other than `ExitReason::Normal`
    /// (an explicit `Shutdown`, an unmatched structured exit, or a handler
    /// deciding to `Stop` with a typed reason). Re-raised as a fatal exit so
    /// a supervisor watching the process's `JoinHandle` observes it rather
    /// than seeing clean, silent success.
    #[error("process stopped abnormally: {0}")]
    AbnormalExit(String),

    /// Underlying mailbox operation failed.
    #[error("mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    /// Underlying monitoring/event-recording operation failed.
    #[error("monitoring error: {0}")]
    Monitoring(#[from] MonitoringError),
}

impl ProcessError {
    /// Returns `true` if the error reflects a condition the caller may
    /// reasonably retry (e.g. a reply that simply hasn't arrived yet).
    pub fn is_transient(&self) -> bool {
        matches!(self, ProcessError::ReplyTimeout { .. })
    }

    /// Returns `true` if the error means the process itself cannot
    /// continue running and must terminate.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProcessError::InitFailed(_)
                | ProcessError::HandlerPanicked
                | ProcessError::MailboxClosed
                | ProcessError::ShutdownHandlerFailed(_)
                | ProcessError::AbnormalExit(_)
        )
    }

    /// Returns `true` if the error can be handled without stopping the process.
    pub fn is_recoverable(&self) -> bool {
        !self.is_fatal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_failed_display() {
        let err = ProcessError::InitFailed("bad args".to_string());
        assert!(err.to_string().contains("init failed"));
        assert!(err.to_string().contains("bad args"));
    }

    #[test]
    fn test_reply_timeout_display() {
        let err = ProcessError::ReplyTimeout {
            token: "client-1:42".to_string(),
        };
        assert!(err.to_string().contains("timed out"));
        assert!(err.to_string().contains("client-1:42"));
    }

    #[test]
    fn test_transient_errors() {
        let err = ProcessError::ReplyTimeout {
            token: "t".to_string(),
        };
        assert!(err.is_transient());
        assert!(!err.is_fatal());
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_fatal_errors() {
        let err = ProcessError::MailboxClosed;
        assert!(!err.is_transient());
        assert!(err.is_fatal());
        assert!(!err.is_recoverable());

        let err = ProcessError::ShutdownHandlerFailed("panic".to_string());
        assert!(err.is_fatal());

        assert!(ProcessError::HandlerPanicked.is_fatal());

        let err = ProcessError::AbnormalExit("Other(PeerCrashed)".to_string());
        assert!(err.is_fatal());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_config_error_is_recoverable() {
        let err = ProcessError::ConfigError("control channel + prioritised".to_string());
        assert!(err.is_recoverable());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_mailbox_error_conversion() {
        let mailbox_err = MailboxError::Closed;
        let process_err: ProcessError = mailbox_err.into();
        assert!(matches!(process_err, ProcessError::Mailbox(_)));
        assert!(process_err.is_fatal());
    }
}
