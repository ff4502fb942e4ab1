// src/dag/state.rs

//! Per-run task instance state and the run state store.

use std::collections::HashMap;
use std::time::SystemTime;

use serde::Serialize;
use tracing::debug;

use crate::dag::graph::TaskGraph;
use crate::errors::{Result, RundagError};
use crate::types::{RunId, TaskName};

/// State of one task instance within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting for its upstream dependencies.
    Pending,
    /// Selected for dispatch; about to start.
    Queued,
    /// The action is currently executing.
    Running,
    /// Failed an attempt and is cooling down before becoming eligible again.
    Retrying,
    Success,
    /// Exhausted its retries.
    Failed,
    /// Skipped because a transitive upstream dependency failed.
    UpstreamFailed,
    /// The run was cancelled before this instance reached another terminal
    /// state.
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failed | Self::UpstreamFailed | Self::Cancelled
        )
    }

    /// Legal edges of the instance state machine.
    fn can_transition_to(self, to: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, to),
            (Pending, Queued)
                | (Pending, UpstreamFailed)
                | (Pending, Cancelled)
                | (Queued, Running)
                | (Queued, Cancelled)
                | (Running, Success)
                | (Running, Failed)
                | (Running, Retrying)
                | (Retrying, Pending)
                | (Retrying, Cancelled)
        )
    }
}

/// Mutable per-run record for one task.
#[derive(Debug, Clone)]
pub struct TaskInstance {
    pub task: TaskName,
    pub state: TaskState,
    /// Number of times the action has been invoked.
    pub attempts: u32,
    /// Error message from the most recent failed attempt, or the upstream
    /// failure that short-circuited this instance.
    pub last_error: Option<String>,
    pub started_at: Option<SystemTime>,
    pub finished_at: Option<SystemTime>,
}

impl TaskInstance {
    fn new(task: TaskName) -> Self {
        Self {
            task,
            state: TaskState::Pending,
            attempts: 0,
            last_error: None,
            started_at: None,
            finished_at: None,
        }
    }
}

/// State for one run: exactly one [`TaskInstance`] per task in the graph.
///
/// This is the single piece of mutable shared state in the core. Callers
/// wrap it in `Arc<Mutex<_>>` so executor workers and status readers observe
/// every read-modify-write transition atomically.
#[derive(Debug)]
pub struct RunStateStore {
    run_id: RunId,
    logical_ts: SystemTime,
    instances: HashMap<TaskName, TaskInstance>,
}

impl RunStateStore {
    /// Create the state for a fresh run: every task starts `Pending`.
    pub fn create_run(graph: &TaskGraph, run_id: RunId, logical_ts: SystemTime) -> Self {
        let instances = graph
            .task_names()
            .map(|name| (name.to_string(), TaskInstance::new(name.to_string())))
            .collect();
        Self {
            run_id,
            logical_ts,
            instances,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn logical_timestamp(&self) -> SystemTime {
        self.logical_ts
    }

    pub fn get(&self, task: &str) -> Option<&TaskInstance> {
        self.instances.get(task)
    }

    pub fn state_of(&self, task: &str) -> Option<TaskState> {
        self.instances.get(task).map(|inst| inst.state)
    }

    /// True once every instance is in a terminal state.
    pub fn all_terminal(&self) -> bool {
        self.instances.values().all(|inst| inst.state.is_terminal())
    }

    /// Apply a state transition, enforcing the legal edges of the state
    /// machine. An [`RundagError::InvalidTransition`] here means a scheduler
    /// or executor bug, not bad user input.
    pub fn transition(&mut self, task: &str, to: TaskState) -> Result<()> {
        let inst = self
            .instances
            .get_mut(task)
            .ok_or_else(|| RundagError::TaskNotFound(task.to_string()))?;

        if !inst.state.can_transition_to(to) {
            return Err(RundagError::InvalidTransition {
                task: task.to_string(),
                from: inst.state,
                to,
            });
        }

        debug!(
            run_id = self.run_id,
            task = %task,
            from = ?inst.state,
            to = ?to,
            "task state transition"
        );
        inst.state = to;
        Ok(())
    }

    /// Queued -> Running: bump the attempt counter and stamp the start time.
    pub fn mark_running(&mut self, task: &str) -> Result<u32> {
        self.transition(task, TaskState::Running)?;
        let inst = self
            .instances
            .get_mut(task)
            .ok_or_else(|| RundagError::TaskNotFound(task.to_string()))?;
        inst.attempts += 1;
        inst.started_at = Some(SystemTime::now());
        Ok(inst.attempts)
    }

    pub fn mark_success(&mut self, task: &str) -> Result<()> {
        self.transition(task, TaskState::Success)?;
        self.stamp_finished(task)
    }

    pub fn mark_failed(&mut self, task: &str, error: String) -> Result<()> {
        self.transition(task, TaskState::Failed)?;
        self.set_error(task, error)?;
        self.stamp_finished(task)
    }

    pub fn mark_retrying(&mut self, task: &str, error: String) -> Result<()> {
        self.transition(task, TaskState::Retrying)?;
        self.set_error(task, error)
    }

    /// Pending -> UpstreamFailed, recording which upstream caused the skip.
    /// The action is never invoked, so no timestamps are stamped.
    pub fn mark_upstream_failed(&mut self, task: &str, upstream: &str) -> Result<()> {
        self.transition(task, TaskState::UpstreamFailed)?;
        self.set_error(task, format!("upstream task '{upstream}' failed"))
    }

    pub fn mark_cancelled(&mut self, task: &str) -> Result<()> {
        self.transition(task, TaskState::Cancelled)?;
        self.stamp_finished(task)
    }

    fn set_error(&mut self, task: &str, error: String) -> Result<()> {
        let inst = self
            .instances
            .get_mut(task)
            .ok_or_else(|| RundagError::TaskNotFound(task.to_string()))?;
        inst.last_error = Some(error);
        Ok(())
    }

    fn stamp_finished(&mut self, task: &str) -> Result<()> {
        let inst = self
            .instances
            .get_mut(task)
            .ok_or_else(|| RundagError::TaskNotFound(task.to_string()))?;
        inst.finished_at = Some(SystemTime::now());
        Ok(())
    }
}
