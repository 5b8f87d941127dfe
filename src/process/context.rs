//! Per-process context: self identity and the pending-reply table backing
//! `NoReply` (§4.2, §9's "mapping keyed by token" design note).

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use dashmap::DashMap;

// Layer 3: Internal module imports
use super::envelope::{Opaque, ReplyAddress, ReplyToken};
use crate::util::ActorId;

/// Context a managed process carries through its receive loop.
///
/// Exposed to handler bodies so a `NoReply` call can later be answered from
/// outside the handler that received it (§4.2: "the handler takes
/// responsibility for replying later using the explicit `reply_to`
/// primitive").
pub struct ProcessContext {
    self_id: ActorId,
    pending: DashMap<ReplyToken, ReplyAddress>,
}

impl ProcessContext {
    /// Creates a context for a process identified by `self_id`.
    pub fn new(self_id: ActorId) -> Self {
        Self {
            self_id,
            pending: DashMap::new(),
        }
    }

    /// This process's own identity.
    pub fn self_id(&self) -> ActorId {
        self.self_id
    }

    /// Records a deferred reply obligation after a handler returns `NoReply`.
    pub fn defer_reply(&self, token: ReplyToken, address: ReplyAddress) {
        self.pending.insert(token, address);
    }

    /// Resolves a previously deferred reply. Returns `true` if `token` was
    /// still pending (and the reply was delivered); `false` if it had
    /// already been answered or was never deferred.
    pub fn reply_to<T: Send + 'static>(&self, token: ReplyToken, value: T) -> bool {
        match self.pending.remove(&token) {
            Some((_, address)) => {
                address.reply(Opaque::new(value));
                true
            }
            None => false,
        }
    }

    /// Number of replies still owed. Primarily useful for diagnostics and tests.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
