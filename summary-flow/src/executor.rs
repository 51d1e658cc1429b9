//! Background execution of long calls with single-delivery outcomes.
//!
//! The foreground context starts a task, polls [`TaskHandle::is_running`]
//! cheaply, and consumes the outcome exactly once after completion. The
//! outcome travels through a single-producer single-consumer channel written
//! once by the background task, so a poll that observes completion always
//! sees the final, fully-written value. There is no cancellation and no
//! timeout: a started task always runs to completion.

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{FlowError, Result};

/// Handle to a task started with [`spawn`].
pub struct TaskHandle<T> {
    join: JoinHandle<()>,
    outcome: oneshot::Receiver<T>,
    consumed: bool,
}

/// Launch `future` on a background task and return immediately.
///
/// The executor does not know or care what the future does; it only
/// guarantees isolation of the call and single delivery of its outcome.
pub fn spawn<F, T>(future: F) -> TaskHandle<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let join = tokio::spawn(async move {
        let outcome = future.await;
        // The receiver may already be gone; nothing to deliver to then.
        let _ = tx.send(outcome);
    });

    TaskHandle {
        join,
        outcome: rx,
        consumed: false,
    }
}

impl<T> TaskHandle<T> {
    /// Whether the background task is still running. Safe to poll
    /// repeatedly; never blocks.
    pub fn is_running(&self) -> bool {
        !self.join.is_finished()
    }

    /// Consume the outcome of a finished task.
    ///
    /// Fails with [`FlowError::TaskState`] while the task is still running,
    /// on a second call (the channel is read once), or if the task died
    /// without delivering a value. A delivered value is returned exactly as
    /// the task produced it.
    pub fn try_outcome(&mut self) -> Result<T> {
        if self.is_running() {
            return Err(FlowError::TaskState(
                "cannot take the outcome while the task is still running".to_string(),
            ));
        }
        if self.consumed {
            return Err(FlowError::TaskState(
                "task outcome was already consumed".to_string(),
            ));
        }
        match self.outcome.try_recv() {
            Ok(value) => {
                self.consumed = true;
                Ok(value)
            }
            Err(_) => Err(FlowError::TaskState(
                "task finished without delivering an outcome".to_string(),
            )),
        }
    }

    /// Poll [`Self::is_running`] at a fixed interval until the task
    /// completes, then consume the outcome. The interval only paces how
    /// quickly completion is noticed; the task itself is never interrupted.
    pub async fn wait_for_outcome(mut self, interval: Duration) -> Result<T> {
        while self.is_running() {
            tokio::time::sleep(interval).await;
        }
        self.try_outcome()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_the_value_exactly_once() {
        let mut handle = spawn(async { "done".to_string() });

        while handle.is_running() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(handle.try_outcome().unwrap(), "done");
        assert!(matches!(
            handle.try_outcome(),
            Err(FlowError::TaskState(_))
        ));
    }

    #[tokio::test]
    async fn outcome_while_running_is_a_state_error() {
        let (gate_tx, gate_rx) = oneshot::channel::<()>();
        let mut handle = spawn(async move {
            let _ = gate_rx.await;
            42u32
        });

        assert!(handle.is_running());
        assert!(matches!(
            handle.try_outcome(),
            Err(FlowError::TaskState(_))
        ));

        gate_tx.send(()).unwrap();
        let value = handle
            .wait_for_outcome(Duration::from_millis(5))
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn failure_outcome_keeps_the_original_error() {
        let handle = spawn(async {
            Err::<String, FlowError>(FlowError::Generation("boom".to_string()))
        });

        let outcome = handle
            .wait_for_outcome(Duration::from_millis(5))
            .await
            .unwrap();
        match outcome {
            Err(FlowError::Generation(message)) => assert_eq!(message, "boom"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
