//! Integration tests for the managed-process dispatch engine: end-to-end
//! runs of [`ManagedProcess::run`] and [`PrioritizedManagedProcess::run`]
//! driven through a [`ProcessClient`], the way a caller would actually use
//! the engine rather than exercising individual handler entries in
//! isolation.

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use airssys_rt::mailbox::BackpressureStrategy;
use airssys_rt::monitoring::NoopMonitor;
use airssys_rt::process::mailbox::ProcessMailboxReceiver;
use airssys_rt::process::prioritized::{DispatchPriority, PrioritizedProcessDefinitionBuilder, RecvTimeoutPolicy};
use airssys_rt::process::{
    on_call, on_cast, on_exit, Action, CallReply, InitResult, ManagedProcess, PrioritizedManagedProcess, ProcessClient,
    ProcessDefinition, ProcessEvent, UnhandledPolicy,
};
use airssys_rt::ActorId;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Counter(i64);

#[derive(Debug)]
struct Increment(i64);

#[derive(Debug)]
struct GetValue;

#[derive(Debug)]
struct PeerCrashed(String);

fn echo_counter_definition() -> ProcessDefinition<Counter> {
    ProcessDefinition::builder()
        .on_cast(on_cast(|state: Counter, _sender, Increment(n)| async move {
            Action::Continue(Counter(state.0 + n))
        }))
        .on_call(on_call(|state: Counter, _sender, _msg: GetValue| async move {
            let value = state.0;
            CallReply::Reply(value, state)
        }))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_cast_then_call_echoes_accumulated_state() {
    let id = ActorId::new();
    let (mailbox_tx, mailbox_rx) = ProcessMailboxReceiver::bounded(16, BackpressureStrategy::Block);
    let process: ManagedProcess<Counter, (), _> =
        ManagedProcess::new(id, echo_counter_definition(), mailbox_rx, NoopMonitor::<ProcessEvent>::new());
    let client = ProcessClient::new(mailbox_tx);

    let handle = tokio::spawn(process.run(|| async { InitResult::InitOk(Counter(0), None) }));

    client.cast(Increment(5)).await.unwrap();
    client.cast(Increment(2)).await.unwrap();
    let value: i64 = client.call(GetValue).await.unwrap();
    assert_eq!(value, 7);

    client.cast(Increment(-7)).await.unwrap();
    // No second call needed: shut the loop down by closing the sender side
    // and confirming a clean `MailboxClosed` exit once the queue drains.
    drop(client);
    let result = handle.await.unwrap();
    assert!(matches!(result, Err(airssys_rt::ProcessError::MailboxClosed)));
}

#[tokio::test]
async fn test_timeout_after_fires_when_no_message_arrives() {
    let id = ActorId::new();
    let (_mailbox_tx, mailbox_rx) = ProcessMailboxReceiver::bounded(4, BackpressureStrategy::Block);
    let definition: ProcessDefinition<Counter> = ProcessDefinition::builder()
        .timeout_handler(|state: Counter, _d| async move { Action::stop_normal(state) })
        .build()
        .unwrap();
    let process: ManagedProcess<Counter, (), _> =
        ManagedProcess::new(id, definition, mailbox_rx, NoopMonitor::<ProcessEvent>::new());

    let result = process
        .run(|| async { InitResult::InitOk(Counter(0), Some(Duration::from_millis(20))) })
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_unhandled_payload_terminates_by_default() {
    let id = ActorId::new();
    let (mailbox_tx, mailbox_rx) = ProcessMailboxReceiver::bounded(4, BackpressureStrategy::Block);
    let definition: ProcessDefinition<Counter> = ProcessDefinition::builder()
        .on_cast(on_cast(|state: Counter, _sender, Increment(n)| async move {
            Action::Continue(Counter(state.0 + n))
        }))
        .build()
        .unwrap();
    let process: ManagedProcess<Counter, (), _> =
        ManagedProcess::new(id, definition, mailbox_rx, NoopMonitor::<ProcessEvent>::new());
    let client = ProcessClient::new(mailbox_tx);

    let handle = tokio::spawn(process.run(|| async { InitResult::InitOk(Counter(0), None) }));
    client.cast(GetValue).await.unwrap();
    let result = handle.await.unwrap();
    assert!(matches!(result, Err(airssys_rt::ProcessError::AbnormalExit(_))));
}

#[tokio::test]
async fn test_dead_letter_policy_forwards_unhandled_payload() {
    let id = ActorId::new();
    let (mailbox_tx, mailbox_rx) = ProcessMailboxReceiver::bounded(4, BackpressureStrategy::Block);
    let (dead_letter_tx, mut dead_letter_rx) = ProcessMailboxReceiver::bounded(4, BackpressureStrategy::Block);
    let definition: ProcessDefinition<Counter> = ProcessDefinition::builder()
        .unhandled_policy(UnhandledPolicy::DeadLetter(dead_letter_tx))
        .build()
        .unwrap();
    let process: ManagedProcess<Counter, (), _> =
        ManagedProcess::new(id, definition, mailbox_rx, NoopMonitor::<ProcessEvent>::new());
    let client = ProcessClient::new(mailbox_tx);

    let handle = tokio::spawn(process.run(|| async { InitResult::InitOk(Counter(0), None) }));
    client.cast(Increment(1)).await.unwrap();
    let forwarded = dead_letter_rx.recv().await.unwrap();
    assert_eq!(forwarded.payload.downcast::<Increment>().unwrap().0, 1);

    drop(client);
    handle.await.unwrap().unwrap_err();
}

#[tokio::test]
async fn test_exit_handler_recovers_from_typed_peer_crash() {
    let id = ActorId::new();
    let (mailbox_tx, mailbox_rx) = ProcessMailboxReceiver::bounded(4, BackpressureStrategy::Block);
    let definition: ProcessDefinition<Counter> = ProcessDefinition::builder()
        .on_exit(on_exit(|state: Counter, _from, PeerCrashed(_reason)| async move {
            Action::Continue(Counter(state.0 - 1))
        }))
        .on_call(on_call(|state: Counter, _sender, _msg: GetValue| async move {
            let value = state.0;
            CallReply::Reply(value, state)
        }))
        .build()
        .unwrap();
    let process: ManagedProcess<Counter, (), _> =
        ManagedProcess::new(id, definition, mailbox_rx, NoopMonitor::<ProcessEvent>::new());
    let client = ProcessClient::new(mailbox_tx).linked_to(process.exit_sender());

    let handle = tokio::spawn(process.run(|| async { InitResult::InitOk(Counter(10), None) }));
    client.notify_exit(ActorId::new(), PeerCrashed("boom".to_string())).unwrap();
    let value: i64 = client.call(GetValue).await.unwrap();
    assert_eq!(value, 9);

    drop(client);
    handle.await.unwrap().unwrap_err();
}

#[tokio::test]
async fn test_unmatched_exit_signal_stops_the_process() {
    let id = ActorId::new();
    let (mailbox_tx, mailbox_rx) = ProcessMailboxReceiver::bounded(4, BackpressureStrategy::Block);
    let definition: ProcessDefinition<Counter> = ProcessDefinition::builder().build().unwrap();
    let process: ManagedProcess<Counter, (), _> =
        ManagedProcess::new(id, definition, mailbox_rx, NoopMonitor::<ProcessEvent>::new());
    let client = ProcessClient::new(mailbox_tx).linked_to(process.exit_sender());

    let handle = tokio::spawn(process.run(|| async { InitResult::InitOk(Counter(0), None) }));
    client.notify_exit(ActorId::new(), PeerCrashed("boom".to_string())).unwrap();
    let result = handle.await.unwrap();
    assert!(matches!(result, Err(airssys_rt::ProcessError::AbnormalExit(_))));
}

#[tokio::test]
async fn test_prioritized_process_dispatches_high_priority_first() {
    let id = ActorId::new();
    let (mailbox_tx, mailbox_rx) = ProcessMailboxReceiver::bounded(16, BackpressureStrategy::Block);
    let inner = echo_counter_definition();
    let definition = PrioritizedProcessDefinitionBuilder::new(inner)
        .priority(DispatchPriority::for_type::<Increment>(10))
        .recv_timeout_policy(RecvTimeoutPolicy::Counter(8))
        .build()
        .unwrap();
    let process: PrioritizedManagedProcess<Counter, _> =
        PrioritizedManagedProcess::new(id, definition, mailbox_rx, NoopMonitor::<ProcessEvent>::new(), 16).unwrap();
    let client = ProcessClient::new(mailbox_tx);

    for _ in 0..5 {
        client.cast(Increment(1)).await.unwrap();
    }

    let handle = tokio::spawn(process.run(|| async { InitResult::InitOk(Counter(0), None) }));
    tokio::time::sleep(Duration::from_millis(50)).await;
    let value: i64 = client.call(GetValue).await.unwrap();
    assert_eq!(value, 5);

    drop(client);
    handle.await.unwrap().unwrap_err();
}

#[tokio::test]
async fn test_prioritized_process_dispatches_higher_priority_type_first() {
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct LowPriority;

    #[derive(Debug)]
    struct HighPriority;

    let id = ActorId::new();
    let (mailbox_tx, mailbox_rx) = ProcessMailboxReceiver::bounded(16, BackpressureStrategy::Block);
    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let low_order = order.clone();
    let high_order = order.clone();
    let inner: ProcessDefinition<Counter> = ProcessDefinition::builder()
        .on_cast(on_cast(move |state: Counter, _sender, LowPriority| {
            let low_order = low_order.clone();
            async move {
                low_order.lock().unwrap().push("low");
                Action::Continue(state)
            }
        }))
        .on_cast(on_cast(move |state: Counter, _sender, HighPriority| {
            let high_order = high_order.clone();
            async move {
                high_order.lock().unwrap().push("high");
                Action::Continue(state)
            }
        }))
        .build()
        .unwrap();
    let definition = PrioritizedProcessDefinitionBuilder::new(inner)
        .priority(DispatchPriority::for_type::<HighPriority>(10))
        .priority(DispatchPriority::for_type::<LowPriority>(0))
        .recv_timeout_policy(RecvTimeoutPolicy::Counter(8))
        .build()
        .unwrap();
    let process: PrioritizedManagedProcess<Counter, _> =
        PrioritizedManagedProcess::new(id, definition, mailbox_rx, NoopMonitor::<ProcessEvent>::new(), 16).unwrap();
    let client = ProcessClient::new(mailbox_tx);

    // Enqueue the low-priority messages first; if dispatch order followed
    // arrival order rather than priority, "low" would lead the recorded log.
    client.cast(LowPriority).await.unwrap();
    client.cast(LowPriority).await.unwrap();
    client.cast(HighPriority).await.unwrap();

    let handle = tokio::spawn(process.run(|| async { InitResult::InitOk(Counter(0), None) }));
    tokio::time::sleep(Duration::from_millis(50)).await;

    drop(client);
    handle.await.unwrap().unwrap_err();

    let recorded = order.lock().unwrap().clone();
    assert_eq!(recorded.first(), Some(&"high"));
    assert_eq!(recorded.len(), 3);
}
