//! Task execution.

use std::time::Duration;

use async_trait::async_trait;
use clawboard_core::protocol::TaskAssignment;
use thiserror::Error;
use tracing::debug;

/// A task could not be completed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct TaskError(pub String);

/// Runs one assigned task.
///
/// Called from a spawned task, so the connection keeps reading while work is
/// in flight.
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    /// Execute `task`. An `Err` is reported as a `failed` task update.
    async fn process(&self, task: &TaskAssignment) -> Result<(), TaskError>;
}

/// Waits a fixed duration, then succeeds.
#[derive(Debug, Clone)]
pub struct SimulatedProcessor {
    duration: Duration,
}

impl SimulatedProcessor {
    /// Processor that completes every task after `duration`.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl Default for SimulatedProcessor {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl TaskProcessor for SimulatedProcessor {
    async fn process(&self, task: &TaskAssignment) -> Result<(), TaskError> {
        debug!(task_id = %task.id, title = task.title.as_deref().unwrap_or(""), "simulating task");
        tokio::time::sleep(self.duration).await;
        Ok(())
    }
}
