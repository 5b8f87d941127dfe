//! Managed-process dispatch engine: call/cast handler registries, typed
//! mailboxes, control channels, and the receive-loop runtime (§3-§10).

pub mod action;
pub mod client;
pub mod context;
pub mod control;
pub mod definition;
pub mod envelope;
pub mod error;
pub mod events;
pub mod exit;
pub mod handler;
pub mod mailbox;
pub mod prioritized;
pub mod runtime;
pub mod supervisor_adapter;

pub use action::{Action, CallReply, ExitReason, InitResult, UnhandledPolicy};
pub use client::ProcessClient;
pub use context::ProcessContext;
pub use control::{ControlReceiver, ControlSender};
pub use definition::{ApiEntry, ProcessDefinition, ProcessDefinitionBuilder};
pub use envelope::{EnvelopeKind, Opaque, ProcessEnvelope, ReplyAddress, ReplyToken, ReplyTokenFactory};
pub use error::ProcessError;
pub use events::{ProcessEvent, ProcessEventKind};
pub use exit::{ExitReceiver, ExitSender};
pub use handler::{
    on_call, on_call_guarded, on_cast, on_cast_guarded, on_exit, on_info, CallEntry, CastEntry, ExitEntry, InfoEntry,
};
pub use mailbox::{ProcessMailboxReceiver, ProcessMailboxSender};
pub use prioritized::{
    DispatchPriority, PrioritizedProcessDefinition, PrioritizedProcessDefinitionBuilder, RecvTimeoutPolicy,
};
pub use runtime::{ManagedProcess, PrioritizedManagedProcess};
pub use supervisor_adapter::{ManagedProcessHandle, Shutdown};
