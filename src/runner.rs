//! Contract with the external job runner.
//!
//! The engine hands a dispatched bale to a [`JobRunner`] and never
//! blocks on its completion; the runner (or the transport in front of
//! it) enforces the delay and later reports a [`Completion`] back
//! through [`ExecutionEngine::handle_completion`](crate::engine::ExecutionEngine::handle_completion).
//! Retryable failures are the runner's own business and never reach the
//! chain state machine.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::chain::Bale;
use crate::error::RunnerError;

/// Final classification of one bale attempt, as reported by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunnerOutcome {
    Succeeded,
    /// The runner will retry on its own; no chain transition.
    FailedRetryable,
    /// Retries exhausted or non-retryable; drives the chain to Failed.
    FailedPermanent,
}

impl std::fmt::Display for RunnerOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunnerOutcome::Succeeded => write!(f, "succeeded"),
            RunnerOutcome::FailedRetryable => write!(f, "failed (retryable)"),
            RunnerOutcome::FailedPermanent => write!(f, "failed (permanent)"),
        }
    }
}

/// A completion notification for one bale, with optional result data
/// that the chain accumulates for its hooks.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub outcome: RunnerOutcome,
    pub data: Option<serde_json::Value>,
}

impl Completion {
    pub fn succeeded() -> Self {
        Self {
            outcome: RunnerOutcome::Succeeded,
            data: None,
        }
    }

    pub fn succeeded_with(data: serde_json::Value) -> Self {
        Self {
            outcome: RunnerOutcome::Succeeded,
            data: Some(data),
        }
    }

    pub fn retryable() -> Self {
        Self {
            outcome: RunnerOutcome::FailedRetryable,
            data: None,
        }
    }

    pub fn permanent() -> Self {
        Self {
            outcome: RunnerOutcome::FailedPermanent,
            data: None,
        }
    }
}

/// Submits a bale for execution, honoring its resolved
/// delay/queue/connection. Fire-and-forget: completions come back
/// asynchronously.
#[allow(async_fn_in_trait)]
pub trait JobRunner: Send + Sync {
    async fn submit(&self, bale: &Bale) -> Result<(), RunnerError>;
}

/// What a runner was asked to execute, as recorded by [`QueueRunner`].
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub chain_id: String,
    pub index: usize,
    pub job_name: String,
    pub delay_seconds: u64,
    pub queue: Option<String>,
    pub connection: Option<String>,
}

impl Submission {
    fn of(bale: &Bale) -> Self {
        Self {
            chain_id: bale.chain_id.clone(),
            index: bale.index,
            job_name: bale.payload.name.clone(),
            delay_seconds: bale.delay_seconds,
            queue: bale.queue.clone(),
            connection: bale.connection.clone(),
        }
    }
}

/// In-process runner that records submissions in a FIFO queue.
///
/// The demo CLI drains the queue, sleeps each submission's delay and
/// feeds completions back to the engine; tests use the recorded history
/// to assert ordering invariants.
#[derive(Default)]
pub struct QueueRunner {
    queue: Mutex<VecDeque<Submission>>,
    history: Mutex<Vec<Submission>>,
}

impl QueueRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the oldest not-yet-executed submission.
    pub fn pop(&self) -> Option<Submission> {
        self.queue.lock().unwrap().pop_front()
    }

    pub fn queued(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Every submission ever made, in order.
    pub fn history(&self) -> Vec<Submission> {
        self.history.lock().unwrap().clone()
    }
}

impl JobRunner for QueueRunner {
    async fn submit(&self, bale: &Bale) -> Result<(), RunnerError> {
        let submission = Submission::of(bale);
        self.history.lock().unwrap().push(submission.clone());
        self.queue.lock().unwrap().push_back(submission);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::chain::{BaleStatus, JobPayload};

    fn bale(index: usize) -> Bale {
        Bale {
            chain_id: "chain-1".into(),
            index,
            payload: JobPayload::new(format!("job-{index}")),
            delay_seconds: index as u64 * 10,
            queue: Some("testing".into()),
            connection: None,
            status: BaleStatus::Pending,
        }
    }

    #[tokio::test]
    async fn submissions_are_fifo() {
        let runner = QueueRunner::new();
        runner.submit(&bale(0)).await.unwrap();
        runner.submit(&bale(1)).await.unwrap();
        assert_eq!(runner.queued(), 2);

        let first = runner.pop().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.job_name, "job-0");
        assert_eq!(first.delay_seconds, 0);

        let second = runner.pop().unwrap();
        assert_eq!(second.index, 1);
        assert_eq!(second.delay_seconds, 10);
        assert_eq!(second.queue.as_deref(), Some("testing"));

        assert!(runner.pop().is_none());
    }

    #[tokio::test]
    async fn history_outlives_the_queue() {
        let runner = QueueRunner::new();
        runner.submit(&bale(0)).await.unwrap();
        runner.pop();

        let history = runner.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].index, 0);
    }

    #[test]
    fn completion_constructors() {
        assert_eq!(Completion::succeeded().outcome, RunnerOutcome::Succeeded);
        assert_eq!(Completion::retryable().outcome, RunnerOutcome::FailedRetryable);
        assert_eq!(Completion::permanent().outcome, RunnerOutcome::FailedPermanent);

        let with_data = Completion::succeeded_with(serde_json::json!({"rows": 3}));
        assert_eq!(with_data.data.unwrap()["rows"], 3);
    }

    #[test]
    fn outcome_display() {
        assert_eq!(RunnerOutcome::Succeeded.to_string(), "succeeded");
        assert_eq!(RunnerOutcome::FailedRetryable.to_string(), "failed (retryable)");
        assert_eq!(RunnerOutcome::FailedPermanent.to_string(), "failed (permanent)");
    }
}
