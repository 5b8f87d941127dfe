//! Adapts a running managed process onto the [`Child`] interface so it can
//! be placed under a supervision tree (§10.5).

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use tokio::task::JoinHandle;

// Layer 3: Internal module imports
use super::control::ControlSender;
use super::error::ProcessError;
use crate::supervisor::{Child, ChildHealth};

/// Control message every supervised managed process understands: an
/// explicit request to stop, dispatched ahead of ordinary mailbox traffic
/// via the control channel (§4.5).
#[derive(Debug)]
pub struct Shutdown;

/// Adapts a spawned managed process onto [`Child`].
///
/// A managed process's receive loop owns its state by value and is
/// consumed by `ManagedProcess::run`/`PrioritizedManagedProcess::run`; this
/// handle holds only what supervision needs once the process is already
/// running: a control sender to request shutdown and a join handle to await
/// the loop's termination. Child and Actor remain independent traits in
/// this crate, so placing a managed process under supervision is always an
/// explicit, separate step from defining it.
pub struct ManagedProcessHandle {
    control: ControlSender<Shutdown>,
    task: Option<JoinHandle<Result<(), ProcessError>>>,
}

impl ManagedProcessHandle {
    /// Wraps an already-spawned process task and the control sender used to
    /// request its shutdown.
    pub fn new(control: ControlSender<Shutdown>, task: JoinHandle<Result<(), ProcessError>>) -> Self {
        Self {
            control,
            task: Some(task),
        }
    }
}

#[async_trait]
impl Child for ManagedProcessHandle {
    type Error = ProcessError;

    async fn start(&mut self) -> Result<(), Self::Error> {
        // The wrapped process is already running by the time it is handed
        // to the supervisor; confirm it hasn't already exited underneath us.
        match &self.task {
            Some(task) if !task.is_finished() => Ok(()),
            _ => Err(ProcessError::MailboxClosed),
        }
    }

    async fn stop(&mut self, timeout: Duration) -> Result<(), Self::Error> {
        let _ = self.control.send(Shutdown);
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(_join_err)) => Err(ProcessError::ShutdownHandlerFailed("process task panicked".to_string())),
            Err(_) => Err(ProcessError::ShutdownHandlerFailed("shutdown timed out".to_string())),
        }
    }

    async fn health_check(&self) -> ChildHealth {
        match &self.task {
            Some(task) if !task.is_finished() => ChildHealth::Healthy,
            Some(_) => ChildHealth::Failed("process task already completed".to_string()),
            None => ChildHealth::Failed("process already stopped".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::control::ControlReceiver;

    #[tokio::test]
    async fn test_start_ok_while_task_running() {
        let (control, _rx) = ControlReceiver::<Shutdown>::new();
        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        });
        let mut handle = ManagedProcessHandle::new(control, task);
        assert!(handle.start().await.is_ok());
    }

    #[tokio::test]
    async fn test_health_check_reports_healthy_then_failed() {
        let (control, _rx) = ControlReceiver::<Shutdown>::new();
        let task = tokio::spawn(async { Ok(()) });
        let handle = ManagedProcessHandle::new(control, task);
        tokio::time::sleep(Duration::from_millis(20)).await;
        match handle.health_check().await {
            ChildHealth::Failed(_) => {}
            other => panic!("expected Failed after task completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stop_sends_shutdown_and_awaits_task() {
        let (control, mut rx) = ControlReceiver::<Shutdown>::new();
        let task = tokio::spawn(async move {
            rx.recv().await;
            Ok(())
        });
        let mut handle = ManagedProcessHandle::new(control, task);
        let result = handle.stop(Duration::from_secs(1)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_stop_times_out_when_task_never_exits() {
        let (control, _rx) = ControlReceiver::<Shutdown>::new();
        // `_rx` is dropped, so `control.send` fails; the task below never
        // observes the shutdown request and the stop call must time out.
        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        });
        let mut handle = ManagedProcessHandle::new(control, task);
        let result = handle.stop(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(ProcessError::ShutdownHandlerFailed(_))));
    }
}
