// src/dag/scheduler.rs

//! Readiness computation and failure propagation for one run.
//!
//! The scheduler is deliberately a pure function of the run state: given the
//! same [`RunStateStore`] contents, [`Scheduler::ready_tasks`] returns the
//! same set in the same order, no matter how often it is called or what it
//! returned before. All asynchrony lives in the executor.

use tracing::debug;

use crate::dag::graph::TaskGraph;
use crate::dag::state::{RunStateStore, TaskState};
use crate::errors::Result;
use crate::types::TaskName;

pub struct Scheduler<'a> {
    graph: &'a TaskGraph,
}

impl<'a> Scheduler<'a> {
    pub fn new(graph: &'a TaskGraph) -> Self {
        Self { graph }
    }

    /// Tasks eligible for dispatch right now: `Pending`, with every upstream
    /// instance in `Success`. Queued, Running and Retrying instances are
    /// never returned; a Retrying instance only becomes eligible once the
    /// executor has moved it back to `Pending` after its delay.
    ///
    /// Upstream failures are propagated to fixpoint first, so the caller
    /// never dispatches a task whose dependency chain is already doomed.
    /// The result iterates in the graph's declaration order.
    pub fn ready_tasks(&self, store: &mut RunStateStore) -> Result<Vec<TaskName>> {
        self.propagate_failures(store)?;

        let mut ready = Vec::new();
        for name in self.graph.task_names() {
            if store.state_of(name) != Some(TaskState::Pending) {
                continue;
            }
            let deps_ok = self
                .graph
                .upstream_of(name)
                .iter()
                .all(|dep| store.state_of(dep) == Some(TaskState::Success));
            if deps_ok {
                ready.push(name.to_string());
            }
        }
        Ok(ready)
    }

    /// Mark every `Pending` task downstream of a failed instance as
    /// `UpstreamFailed`, recursing until fixpoint. Terminal-failed states
    /// (`Failed` and `UpstreamFailed` itself) both propagate.
    pub fn propagate_failures(&self, store: &mut RunStateStore) -> Result<()> {
        let mut stack: Vec<TaskName> = self
            .graph
            .task_names()
            .filter(|name| {
                matches!(
                    store.state_of(name),
                    Some(TaskState::Failed) | Some(TaskState::UpstreamFailed)
                )
            })
            .map(|name| name.to_string())
            .collect();

        while let Some(failed) = stack.pop() {
            for dependent in self.graph.downstream_of(&failed) {
                if store.state_of(dependent) == Some(TaskState::Pending) {
                    debug!(
                        task = %dependent,
                        upstream = %failed,
                        "skipping task due to upstream failure"
                    );
                    store.mark_upstream_failed(dependent, &failed)?;
                    stack.push(dependent.clone());
                }
            }
        }
        Ok(())
    }

    /// True once every instance in the run is terminal.
    pub fn is_run_complete(&self, store: &RunStateStore) -> bool {
        store.all_terminal()
    }
}
