//! The receive-loop engine: lifecycle, dispatch, timeout/hibernate state
//! machine, priority draining, and the exit protocol (§4.3–§4.6).

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::time::Duration;

// Layer 2: Third-party crate imports
use tokio::time::Instant;

// Layer 3: Internal module imports
use super::action::{Action, DispatchCallOutcome, ExitReason, InitResult, UnhandledPolicy};
use super::context::ProcessContext;
use super::control::ControlReceiver;
use super::definition::{ApiEntry, ProcessDefinition};
use super::envelope::{EnvelopeKind, Opaque, ProcessEnvelope};
use super::error::ProcessError;
use super::events::{ProcessEvent, ProcessEventKind};
use super::exit::{ExitReceiver, ExitSender};
use super::mailbox::ProcessMailboxReceiver;
use super::prioritized::{PrioritizedProcessDefinition, RecvTimeoutPolicy};
use crate::mailbox::TryRecvError;
use crate::monitoring::Monitor;
use crate::util::ActorId;

/// A fully-owned, running managed process.
///
/// `S` is the user state type, `C` the control channel's payload type (use
/// `()` and never call [`Self::with_control`] for a process with no
/// control channel), and `M` the monitor implementation events are
/// recorded through.
pub struct ManagedProcess<S, C, M> {
    id: ActorId,
    definition: ProcessDefinition<S>,
    mailbox: ProcessMailboxReceiver,
    control: Option<ControlReceiver<C>>,
    exit_tx: ExitSender,
    exit_rx: ExitReceiver,
    context: ProcessContext,
    monitor: M,
}

enum NextArrival<C> {
    Control(C),
    Exit(ActorId, Opaque),
    Mailbox(ProcessEnvelope),
    TimedOut,
    MailboxClosed,
}

impl<S, C, M> ManagedProcess<S, C, M>
where
    S: Send + 'static,
    C: Send + 'static,
    M: Monitor<ProcessEvent>,
{
    /// Builds a non-prioritised managed process over `definition`, draining `mailbox`.
    pub fn new(id: ActorId, definition: ProcessDefinition<S>, mailbox: ProcessMailboxReceiver, monitor: M) -> Self {
        let (exit_tx, exit_rx) = ExitReceiver::new();
        Self {
            id,
            definition,
            mailbox,
            control: None,
            exit_tx,
            exit_rx,
            context: ProcessContext::new(id),
            monitor,
        }
    }

    /// Attaches a control channel, giving its traffic dispatch precedence
    /// over ordinary mailbox messages (§4.5).
    pub fn with_control(mut self, control: ControlReceiver<C>) -> Self {
        self.control = Some(control);
        self
    }

    /// Returns a cheaply-cloneable handle links/monitors can use to report
    /// this process's peers' exits (§6). Exit signals delivered through it
    /// are drained with priority equal to the control channel: checked
    /// ahead of ordinary mailbox messages, one at a time, never batched
    /// (§9).
    pub fn exit_sender(&self) -> ExitSender {
        self.exit_tx.clone()
    }

    async fn record(&self, kind: ProcessEventKind) {
        let _ = self.monitor.record(ProcessEvent::new(self.id, kind)).await;
    }

    async fn next_arrival(&mut self, deadline: Option<Duration>) -> NextArrival<C> {
        if let Some(control) = self.control.as_mut() {
            if let Some(message) = control.try_recv() {
                return NextArrival::Control(message);
            }
        }
        if let Some((from, opaque)) = self.exit_rx.try_recv() {
            return NextArrival::Exit(from, opaque);
        }

        match deadline {
            None => {
                let mailbox = &mut self.mailbox;
                let exit_rx = &mut self.exit_rx;
                if let Some(control) = self.control.as_mut() {
                    tokio::select! {
                        biased;
                        Some(message) = control.recv() => NextArrival::Control(message),
                        Some((from, opaque)) = exit_rx.recv() => NextArrival::Exit(from, opaque),
                        received = mailbox.recv() => match received {
                            Some(envelope) => NextArrival::Mailbox(envelope),
                            None => NextArrival::MailboxClosed,
                        },
                    }
                } else {
                    tokio::select! {
                        biased;
                        Some((from, opaque)) = exit_rx.recv() => NextArrival::Exit(from, opaque),
                        received = mailbox.recv() => match received {
                            Some(envelope) => NextArrival::Mailbox(envelope),
                            None => NextArrival::MailboxClosed,
                        },
                    }
                }
            }
            Some(d) if d.is_zero() => {
                // A zero-duration deadline must still poll once (§4.3 edge case).
                match self.mailbox.try_recv() {
                    Ok(envelope) => NextArrival::Mailbox(envelope),
                    Err(TryRecvError::Empty) => NextArrival::TimedOut,
                    Err(TryRecvError::Closed) => NextArrival::MailboxClosed,
                }
            }
            Some(d) => {
                let mailbox = &mut self.mailbox;
                let exit_rx = &mut self.exit_rx;
                if let Some(control) = self.control.as_mut() {
                    tokio::select! {
                        biased;
                        Some(message) = control.recv() => NextArrival::Control(message),
                        Some((from, opaque)) = exit_rx.recv() => NextArrival::Exit(from, opaque),
                        result = tokio::time::timeout(d, mailbox.recv()) => match result {
                            Ok(Some(envelope)) => NextArrival::Mailbox(envelope),
                            Ok(None) => NextArrival::MailboxClosed,
                            Err(_) => NextArrival::TimedOut,
                        },
                    }
                } else {
                    tokio::select! {
                        biased;
                        Some((from, opaque)) = exit_rx.recv() => NextArrival::Exit(from, opaque),
                        result = tokio::time::timeout(d, mailbox.recv()) => match result {
                            Ok(Some(envelope)) => NextArrival::Mailbox(envelope),
                            Ok(None) => NextArrival::MailboxClosed,
                            Err(_) => NextArrival::TimedOut,
                        },
                    }
                }
            }
        }
    }

    /// Dispatches a control-port message through `control_handlers`, then
    /// falls back to `unhandled_policy` if nothing matches.
    async fn dispatch_control(&self, state: S, message: C) -> Action<S> {
        let opaque = Opaque::new(message);
        for entry in &self.definition.control_handlers {
            if entry.matches(&state, &opaque) {
                self.record(ProcessEventKind::Dispatched { handler_kind: "control" }).await;
                return entry.invoke(state, None, opaque).await;
            }
        }
        self.apply_unhandled(state, opaque).await
    }

    /// Dispatches a mailbox envelope through `api_handlers`, falling back to
    /// `unhandled_policy` if nothing matches.
    async fn dispatch_mailbox(&self, state: S, envelope: ProcessEnvelope) -> Action<S> {
        let sender = envelope.sender;
        match envelope.kind {
            EnvelopeKind::Cast => self.dispatch_cast(state, sender, envelope.payload).await,
            EnvelopeKind::Call { reply_address, reply_token } => {
                let outcome = self.dispatch_call(state, sender, reply_token, envelope.payload).await;
                match outcome {
                    DispatchCallOutcome::Reply(value, state) => {
                        reply_address.reply(value);
                        Action::Continue(state)
                    }
                    DispatchCallOutcome::NoReply(state) => {
                        self.context.defer_reply(reply_token, reply_address);
                        Action::Continue(state)
                    }
                    DispatchCallOutcome::StopReply(value, state, reason) => {
                        reply_address.reply(value);
                        Action::Stop(state, reason)
                    }
                }
            }
        }
    }

    async fn dispatch_cast(&self, state: S, sender: Option<ActorId>, payload: Opaque) -> Action<S> {
        for entry in &self.definition.api_handlers {
            if let ApiEntry::Cast(cast_entry) = entry {
                if cast_entry.matches(&state, &payload) {
                    self.record(ProcessEventKind::Dispatched { handler_kind: "cast" }).await;
                    return cast_entry.invoke(state, sender, payload).await;
                }
            }
        }
        self.dispatch_info(state, payload).await
    }

    /// Falls back to `info_handlers` once no `api_handlers` entry matched
    /// (§4.1: control → call/cast → exit → info), then to `unhandled_policy`.
    async fn dispatch_info(&self, state: S, payload: Opaque) -> Action<S> {
        for entry in &self.definition.info_handlers {
            if entry.matches(&payload) {
                self.record(ProcessEventKind::Dispatched { handler_kind: "info" }).await;
                return entry.invoke(state, payload).await;
            }
        }
        self.apply_unhandled(state, payload).await
    }

    async fn dispatch_call(
        &self,
        state: S,
        sender: Option<ActorId>,
        reply_token: super::envelope::ReplyToken,
        payload: Opaque,
    ) -> DispatchCallOutcome<S> {
        for entry in &self.definition.api_handlers {
            if let ApiEntry::Call(call_entry) = entry {
                if call_entry.matches(&state, &payload) {
                    self.record(ProcessEventKind::Dispatched { handler_kind: "call" }).await;
                    return call_entry.invoke(state, sender, reply_token, payload).await;
                }
            }
        }
        // No call handler matched: `apply_unhandled` only ever produces
        // `Continue` or `Stop` (never a deadline-bearing variant), so both
        // map cleanly onto a `DispatchCallOutcome` without a reply value.
        match self.apply_unhandled(state, payload).await {
            Action::Continue(state) => DispatchCallOutcome::NoReply(state),
            Action::Stop(state, reason) => DispatchCallOutcome::StopReply(Opaque::new(()), state, reason),
            Action::TimeoutAfter(..) | Action::Hibernate(..) => {
                unreachable!("apply_unhandled never returns a deadline-bearing action")
            }
        }
    }

    async fn apply_unhandled(&self, state: S, opaque: Opaque) -> Action<S> {
        match &self.definition.unhandled_policy {
            UnhandledPolicy::Terminate => {
                self.record(ProcessEventKind::Unhandled { policy: "Terminate" }).await;
                Action::Stop(state, ExitReason::other("unhandled".to_string()))
            }
            UnhandledPolicy::Drop => {
                self.record(ProcessEventKind::Unhandled { policy: "Drop" }).await;
                Action::Continue(state)
            }
            UnhandledPolicy::DeadLetter(sink) => {
                self.record(ProcessEventKind::Unhandled { policy: "DeadLetter" }).await;
                let _ = sink.send(ProcessEnvelope::cast(opaque)).await;
                Action::Continue(state)
            }
        }
    }

    async fn dispatch_exit(&self, state: S, from: ActorId, opaque: Opaque) -> Action<S> {
        for entry in &self.definition.exit_handlers {
            if entry.matches(&opaque) {
                self.record(ProcessEventKind::ExitRouted { matched: true }).await;
                return entry.invoke(state, from, opaque).await;
            }
        }
        self.record(ProcessEventKind::ExitRouted { matched: false }).await;
        Action::Stop(state, ExitReason::Other(opaque))
    }

    /// Runs the process to completion: init, receive loop, shutdown.
    ///
    /// `init` is invoked exactly once before the loop starts; its `Fut`
    /// typically closes over whatever arguments the caller wants to pass.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::InitFailed`] if `init` returns `InitStop`,
    /// or [`ProcessError::ShutdownHandlerFailed`]-class errors are not
    /// raised here (the shutdown handler contract is "must not fail";
    /// see §7).
    pub async fn run<F, Fut>(mut self, init: F) -> Result<(), ProcessError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = InitResult<S>>,
    {
        let (mut state, mut deadline) = match init().await {
            InitResult::InitOk(state, deadline) => (state, deadline),
            InitResult::InitStop(reason) => {
                self.record(ProcessEventKind::Stopped { reason: reason.to_string() }).await;
                return Err(ProcessError::InitFailed(reason.to_string()));
            }
            InitResult::InitIgnore => return Ok(()),
        };

        self.record(ProcessEventKind::Started).await;

        loop {
            let action = match self.next_arrival(deadline).await {
                NextArrival::Control(message) => self.dispatch_control(state, message).await,
                NextArrival::Exit(from, opaque) => self.dispatch_exit(state, from, opaque).await,
                NextArrival::Mailbox(envelope) => self.dispatch_mailbox(state, envelope).await,
                NextArrival::TimedOut => {
                    self.record(ProcessEventKind::TimeoutFired).await;
                    match &self.definition.timeout_handler {
                        Some(handler) => handler(state, deadline.unwrap_or_default()).await,
                        None => Action::stop_normal(state),
                    }
                }
                NextArrival::MailboxClosed => return Err(ProcessError::MailboxClosed),
            };

            match action {
                Action::Continue(next_state) => {
                    state = next_state;
                    deadline = None;
                }
                Action::TimeoutAfter(next_state, duration) => {
                    state = next_state;
                    deadline = Some(duration);
                }
                Action::Hibernate(next_state, duration) => {
                    self.record(ProcessEventKind::Hibernating { duration }).await;
                    if !duration.is_zero() {
                        tokio::time::sleep(duration).await;
                    }
                    state = next_state;
                    deadline = None;
                }
                Action::Stop(final_state, reason) => {
                    return self.shutdown(final_state, reason).await;
                }
            }
        }
    }

    /// Runs `shutdown_handler`, then re-raises anything but a normal exit
    /// (§4.6 step 2, §6) so a supervisor watching this process's
    /// `JoinHandle` observes a fatal termination rather than clean success.
    async fn shutdown(&self, state: S, reason: ExitReason) -> Result<(), ProcessError> {
        self.record(ProcessEventKind::Stopped { reason: reason.to_string() }).await;
        let is_normal = reason.is_normal();
        let rendered = reason.to_string();
        if let Some(handler) = &self.definition.shutdown_handler {
            handler(state, reason).await;
        }
        if is_normal {
            Ok(())
        } else {
            Err(ProcessError::AbnormalExit(rendered))
        }
    }
}

/// A prioritised managed process: drains the mailbox into an internal
/// priority queue before dispatching (§4.4). Cannot carry a control
/// channel (§4.5).
pub struct PrioritizedManagedProcess<S, M> {
    id: ActorId,
    definition: PrioritizedProcessDefinition<S>,
    mailbox: ProcessMailboxReceiver,
    exit_tx: ExitSender,
    exit_rx: ExitReceiver,
    context: ProcessContext,
    monitor: M,
    queue: Vec<VecDeque<ProcessEnvelope>>,
}

impl<S, M> PrioritizedManagedProcess<S, M>
where
    S: Send + 'static,
    M: Monitor<ProcessEvent>,
{
    /// Builds a prioritised managed process. `queue_levels` bounds the
    /// number of distinct priority buckets tracked (priorities at or above
    /// this are clamped to the top bucket); callers typically pick this
    /// from the highest priority value registered in their
    /// `DispatchPriority` rules, plus one for the implicit priority-0 bucket.
    pub fn new(
        id: ActorId,
        definition: PrioritizedProcessDefinition<S>,
        mailbox: ProcessMailboxReceiver,
        monitor: M,
        queue_levels: usize,
    ) -> Result<Self, ProcessError> {
        definition.reject_control_channel(false)?;
        let (exit_tx, exit_rx) = ExitReceiver::new();
        Ok(Self {
            id,
            definition,
            mailbox,
            exit_tx,
            exit_rx,
            context: ProcessContext::new(id),
            monitor,
            queue: (0..queue_levels.max(1)).map(|_| VecDeque::new()).collect(),
        })
    }

    /// Returns a cheaply-cloneable handle links/monitors can use to report
    /// this process's peers' exits (§6, §9).
    pub fn exit_sender(&self) -> ExitSender {
        self.exit_tx.clone()
    }

    async fn record(&self, kind: ProcessEventKind) {
        let _ = self.monitor.record(ProcessEvent::new(self.id, kind)).await;
    }

    fn bucket_index(&self, priority: u32) -> usize {
        (priority as usize).min(self.queue.len() - 1)
    }

    fn enqueue(&mut self, envelope: ProcessEnvelope) {
        let priority = self.definition.priority_of(&envelope.payload);
        let index = self.bucket_index(priority);
        self.queue[index].push_back(envelope);
    }

    fn dequeue_highest(&mut self) -> Option<ProcessEnvelope> {
        self.queue.iter_mut().rev().find_map(|bucket| bucket.pop_front())
    }

    fn queue_is_empty(&self) -> bool {
        self.queue.iter().all(VecDeque::is_empty)
    }

    /// Drains the mailbox into the priority queue, honoring the configured
    /// [`RecvTimeoutPolicy`] budget (§4.4 step 1).
    async fn drain(&mut self) {
        if self.queue_is_empty() {
            // Nothing queued: block for the first message to avoid
            // busy-looping (§4.4 step 3), then fall through to the ordinary
            // budgeted drain below so any further envelopes already
            // buffered in the mailbox get a chance to reorder by priority
            // too, rather than being dispatched one at a time in arrival
            // order.
            match self.mailbox.recv().await {
                Some(envelope) => self.enqueue(envelope),
                None => return,
            }
        }

        match self.definition.recv_timeout_policy {
            RecvTimeoutPolicy::Counter(budget) => {
                for _ in 0..budget {
                    match self.mailbox.try_recv() {
                        Ok(envelope) => self.enqueue(envelope),
                        Err(_) => break,
                    }
                }
            }
            RecvTimeoutPolicy::Timer(budget) => {
                let started = Instant::now();
                while started.elapsed() < budget {
                    match self.mailbox.try_recv() {
                        Ok(envelope) => self.enqueue(envelope),
                        Err(_) => break,
                    }
                }
            }
        }
    }

    /// Runs the prioritised process to completion.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::InitFailed`] on `InitStop`.
    pub async fn run<F, Fut>(mut self, init: F) -> Result<(), ProcessError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = InitResult<S>>,
    {
        let mut state = match init().await {
            InitResult::InitOk(state, _deadline) => state,
            InitResult::InitStop(reason) => {
                self.record(ProcessEventKind::Stopped { reason: reason.to_string() }).await;
                return Err(ProcessError::InitFailed(reason.to_string()));
            }
            InitResult::InitIgnore => return Ok(()),
        };

        self.record(ProcessEventKind::Started).await;

        loop {
            // Exit signals are checked ahead of ordinary mailbox traffic,
            // one at a time, never batched — the same precedence a control
            // channel would get (§9).
            let action = if let Some((from, opaque)) = self.exit_rx.try_recv() {
                self.dispatch_exit(state, from, opaque).await
            } else {
                if self.queue_is_empty() {
                    // Opportunistically drain non-blockingly first; if still
                    // empty, `drain` blocks on the first arrival.
                    self.drain().await;
                    if self.queue_is_empty() {
                        continue;
                    }
                } else {
                    self.drain().await;
                }

                let Some(envelope) = self.dequeue_highest() else {
                    continue;
                };

                self.dispatch(state, envelope).await
            };
            match action {
                Action::Continue(next_state) => state = next_state,
                Action::TimeoutAfter(next_state, _duration) => {
                    // A prioritised loop has no single blocking receive
                    // point to attach a deadline to; treat the same as
                    // `Continue` and rely on the drain budget for pacing.
                    state = next_state;
                }
                Action::Hibernate(next_state, duration) => {
                    self.record(ProcessEventKind::Hibernating { duration }).await;
                    if !duration.is_zero() {
                        tokio::time::sleep(duration).await;
                    }
                    state = next_state;
                }
                Action::Stop(final_state, reason) => {
                    self.record(ProcessEventKind::Stopped { reason: reason.to_string() }).await;
                    let is_normal = reason.is_normal();
                    let rendered = reason.to_string();
                    if let Some(handler) = &self.definition.inner.shutdown_handler {
                        handler(final_state, reason).await;
                    }
                    return if is_normal {
                        Ok(())
                    } else {
                        Err(ProcessError::AbnormalExit(rendered))
                    };
                }
            }
        }
    }

    async fn dispatch(&self, state: S, envelope: ProcessEnvelope) -> Action<S> {
        let sender = envelope.sender;
        match envelope.kind {
            EnvelopeKind::Cast => {
                for entry in &self.definition.inner.api_handlers {
                    if let ApiEntry::Cast(cast_entry) = entry {
                        if cast_entry.matches(&state, &envelope.payload) {
                            self.record(ProcessEventKind::Dispatched { handler_kind: "cast" }).await;
                            return cast_entry.invoke(state, sender, envelope.payload).await;
                        }
                    }
                }
                self.dispatch_info(state, envelope.payload).await
            }
            EnvelopeKind::Call { reply_address, reply_token } => {
                for entry in &self.definition.inner.api_handlers {
                    if let ApiEntry::Call(call_entry) = entry {
                        if call_entry.matches(&state, &envelope.payload) {
                            self.record(ProcessEventKind::Dispatched { handler_kind: "call" }).await;
                            let outcome = call_entry
                                .invoke(state, sender, reply_token, envelope.payload)
                                .await;
                            return match outcome {
                                DispatchCallOutcome::Reply(value, state) => {
                                    reply_address.reply(value);
                                    Action::Continue(state)
                                }
                                DispatchCallOutcome::NoReply(state) => {
                                    self.context.defer_reply(reply_token, reply_address);
                                    Action::Continue(state)
                                }
                                DispatchCallOutcome::StopReply(value, state, reason) => {
                                    reply_address.reply(value);
                                    Action::Stop(state, reason)
                                }
                            };
                        }
                    }
                }
                self.apply_unhandled(state, envelope.payload).await
            }
        }
    }

    async fn dispatch_exit(&self, state: S, from: ActorId, opaque: Opaque) -> Action<S> {
        for entry in &self.definition.inner.exit_handlers {
            if entry.matches(&opaque) {
                self.record(ProcessEventKind::ExitRouted { matched: true }).await;
                return entry.invoke(state, from, opaque).await;
            }
        }
        self.record(ProcessEventKind::ExitRouted { matched: false }).await;
        Action::Stop(state, ExitReason::Other(opaque))
    }

    /// Falls back to `info_handlers` once no `api_handlers` entry matched
    /// (§4.1: control → call/cast → exit → info), then to `unhandled_policy`.
    async fn dispatch_info(&self, state: S, payload: Opaque) -> Action<S> {
        for entry in &self.definition.inner.info_handlers {
            if entry.matches(&payload) {
                self.record(ProcessEventKind::Dispatched { handler_kind: "info" }).await;
                return entry.invoke(state, payload).await;
            }
        }
        self.apply_unhandled(state, payload).await
    }

    async fn apply_unhandled(&self, state: S, opaque: Opaque) -> Action<S> {
        match &self.definition.inner.unhandled_policy {
            UnhandledPolicy::Terminate => {
                self.record(ProcessEventKind::Unhandled { policy: "Terminate" }).await;
                Action::Stop(state, ExitReason::other("unhandled".to_string()))
            }
            UnhandledPolicy::Drop => {
                self.record(ProcessEventKind::Unhandled { policy: "Drop" }).await;
                Action::Continue(state)
            }
            UnhandledPolicy::DeadLetter(sink) => {
                self.record(ProcessEventKind::Unhandled { policy: "DeadLetter" }).await;
                let _ = sink.send(ProcessEnvelope::cast(opaque)).await;
                Action::Continue(state)
            }
        }
    }
}
