// src/dag/task.rs

//! Task definitions and per-graph defaults.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::exec::action::TaskAction;
use crate::types::TaskName;

/// Defaults applied to every task when the graph is built.
///
/// This is an explicit value passed once to [`GraphBuilder::new`]; it is
/// applied per task at construction and never consulted again afterwards.
///
/// [`GraphBuilder::new`]: crate::dag::graph::GraphBuilder::new
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphDefaults {
    /// How many times a failed task is retried before it is marked failed.
    pub retry_limit: u32,
    /// Fixed delay between a failure and the next attempt becoming eligible.
    pub retry_delay: Duration,
}

impl Default for GraphDefaults {
    fn default() -> Self {
        Self {
            retry_limit: 0,
            retry_delay: Duration::ZERO,
        }
    }
}

/// Caller-facing description of one task, fed to the graph builder.
///
/// Unset retry fields fall back to the graph's [`GraphDefaults`].
pub struct TaskSpec {
    pub name: TaskName,
    pub action: Arc<dyn TaskAction>,
    pub retry_limit: Option<u32>,
    pub retry_delay: Option<Duration>,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>, action: Arc<dyn TaskAction>) -> Self {
        Self {
            name: name.into(),
            action,
            retry_limit: None,
            retry_delay: None,
        }
    }

    pub fn retry_limit(mut self, limit: u32) -> Self {
        self.retry_limit = Some(limit);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.name)
            .field("retry_limit", &self.retry_limit)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

/// A named unit of work plus its retry policy and declared dependencies.
///
/// Immutable once the owning graph is built; shared read-only across runs.
#[derive(Clone)]
pub struct Task {
    pub name: TaskName,
    pub action: Arc<dyn TaskAction>,
    pub retry_limit: u32,
    pub retry_delay: Duration,
    /// Direct upstream dependencies, in declaration order.
    pub upstream: Vec<TaskName>,
}

impl Task {
    pub(crate) fn from_spec(spec: TaskSpec, defaults: GraphDefaults) -> Self {
        Self {
            name: spec.name,
            action: spec.action,
            retry_limit: spec.retry_limit.unwrap_or(defaults.retry_limit),
            retry_delay: spec.retry_delay.unwrap_or(defaults.retry_delay),
            upstream: Vec::new(),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("retry_limit", &self.retry_limit)
            .field("retry_delay", &self.retry_delay)
            .field("upstream", &self.upstream)
            .finish_non_exhaustive()
    }
}
