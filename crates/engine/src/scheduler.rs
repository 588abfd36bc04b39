//! Durable-wait scheduling.
//!
//! Every delay in the engine -- step offsets, retry backoff, re-polls after
//! store failures -- is expressed as a [`ScheduledTask`] with a due time,
//! never as an in-process sleep. The runner polls [`Scheduler::due`] on an
//! interval and hands due tasks to the orchestrator, which re-derives the
//! real fire time from persisted state. Because of that re-derivation the
//! scheduler may be lossy across restarts: recovery re-seeds it from the
//! store's active workflows.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use cadence_core::WorkflowId;

use crate::error::EngineError;

/// A pending poke for one workflow step.
///
/// Duplicates are harmless: step execution is idempotent and ignores tasks
/// whose step index no longer matches the workflow's current position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    /// The workflow to poke.
    pub workflow_id: WorkflowId,
    /// The step index the task was scheduled for.
    pub step_index: usize,
    /// Earliest time the task should be handed to the orchestrator.
    pub due_at: DateTime<Utc>,
}

impl ScheduledTask {
    /// Create a task due at `due_at`.
    #[must_use]
    pub fn new(workflow_id: WorkflowId, step_index: usize, due_at: DateTime<Utc>) -> Self {
        Self {
            workflow_id,
            step_index,
            due_at,
        }
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.due_at
            .cmp(&other.due_at)
            .then_with(|| self.workflow_id.as_str().cmp(other.workflow_id.as_str()))
            .then_with(|| self.step_index.cmp(&other.step_index))
    }
}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Task queue ordered by due time.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Enqueue a task.
    async fn schedule(&self, task: ScheduledTask) -> Result<(), EngineError>;

    /// Drain every task with `due_at <= now`, earliest first.
    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledTask>, EngineError>;

    /// Number of tasks currently queued.
    async fn len(&self) -> usize;

    /// Whether the queue is empty.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// In-process scheduler backed by a min-heap.
///
/// Not durable on its own; restart recovery re-populates it from the
/// campaign store.
#[derive(Debug, Default)]
pub struct MemoryScheduler {
    heap: Mutex<BinaryHeap<Reverse<ScheduledTask>>>,
}

impl MemoryScheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Scheduler for MemoryScheduler {
    async fn schedule(&self, task: ScheduledTask) -> Result<(), EngineError> {
        self.heap.lock().await.push(Reverse(task));
        Ok(())
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledTask>, EngineError> {
        let mut heap = self.heap.lock().await;
        let mut ready = Vec::new();
        while let Some(Reverse(task)) = heap.peek() {
            if task.due_at > now {
                break;
            }
            let Some(Reverse(task)) = heap.pop() else {
                break;
            };
            ready.push(task);
        }
        Ok(ready)
    }

    async fn len(&self) -> usize {
        self.heap.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn task(id: &str, step: usize, due_at: DateTime<Utc>) -> ScheduledTask {
        ScheduledTask::new(WorkflowId::new(id), step, due_at)
    }

    #[tokio::test]
    async fn due_drains_only_ripe_tasks() {
        let scheduler = MemoryScheduler::new();
        let now = Utc::now();

        scheduler
            .schedule(task("wf-late", 0, now + TimeDelta::hours(1)))
            .await
            .unwrap();
        scheduler
            .schedule(task("wf-ripe", 0, now - TimeDelta::minutes(5)))
            .await
            .unwrap();

        let ready = scheduler.due(now).await.unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].workflow_id.as_str(), "wf-ripe");
        assert_eq!(scheduler.len().await, 1);
    }

    #[tokio::test]
    async fn due_returns_earliest_first() {
        let scheduler = MemoryScheduler::new();
        let now = Utc::now();

        scheduler
            .schedule(task("wf-b", 0, now - TimeDelta::minutes(1)))
            .await
            .unwrap();
        scheduler
            .schedule(task("wf-a", 0, now - TimeDelta::minutes(10)))
            .await
            .unwrap();

        let ready = scheduler.due(now).await.unwrap();
        assert_eq!(ready.len(), 2);
        assert_eq!(ready[0].workflow_id.as_str(), "wf-a");
        assert_eq!(ready[1].workflow_id.as_str(), "wf-b");
        assert!(scheduler.is_empty().await);
    }

    #[tokio::test]
    async fn empty_scheduler_yields_nothing() {
        let scheduler = MemoryScheduler::new();
        assert!(scheduler.due(Utc::now()).await.unwrap().is_empty());
    }
}
