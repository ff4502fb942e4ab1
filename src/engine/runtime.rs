// src/engine/runtime.rs

//! Run submission, status reporting, and cancellation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info};

use crate::dag::graph::TaskGraph;
use crate::dag::state::{RunStateStore, TaskState};
use crate::errors::{Result, RundagError};
use crate::exec::executor::{CancelHandle, Executor};
use crate::types::{RunId, TaskName};

/// Overall state of one run, derived from its task instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Success,
    Failed,
    Cancelled,
}

/// Snapshot of one task instance for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatus {
    pub task: TaskName,
    pub state: TaskState,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Snapshot of a whole run; tasks appear in graph declaration order.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatusReport {
    pub run_id: RunId,
    pub state: RunState,
    pub tasks: Vec<TaskStatus>,
}

struct RunSlot {
    graph: Arc<TaskGraph>,
    store: Arc<Mutex<RunStateStore>>,
    cancel: CancelHandle,
    /// Flips to `true` when the run's executor loop exits.
    done: watch::Receiver<bool>,
}

/// Owns all submitted runs: spawns their executors, answers status queries,
/// and routes cancellation. The graph itself is shared read-only.
pub struct Engine {
    runs: Mutex<HashMap<RunId, RunSlot>>,
    run_counter: AtomicU64,
    concurrency_limit: usize,
}

impl Engine {
    pub fn new(concurrency_limit: usize) -> Self {
        Self {
            runs: Mutex::new(HashMap::new()),
            run_counter: AtomicU64::new(0),
            concurrency_limit: concurrency_limit.max(1),
        }
    }

    fn runs(&self) -> MutexGuard<'_, HashMap<RunId, RunSlot>> {
        self.runs.lock().expect("run table lock poisoned")
    }

    /// Create a run of `graph` at the given logical timestamp and start
    /// executing it immediately. Returns without waiting for completion.
    pub fn submit_run(&self, graph: Arc<TaskGraph>, logical_ts: SystemTime) -> RunId {
        let run_id = self.run_counter.fetch_add(1, Ordering::Relaxed) + 1;

        let store = Arc::new(Mutex::new(RunStateStore::create_run(
            &graph, run_id, logical_ts,
        )));
        let executor = Executor::new(graph.clone(), store.clone(), self.concurrency_limit);
        let cancel = executor.cancel_handle();

        info!(run_id, tasks = graph.len(), "submitting run");

        let (done_tx, done_rx) = watch::channel(false);
        tokio::spawn(async move {
            if let Err(err) = executor.run_to_completion().await {
                // Only invariant violations end up here; task failures are
                // recorded in the run state, not returned as errors.
                error!(run_id, error = %err, "executor aborted");
            }
            let _ = done_tx.send(true);
        });

        self.runs().insert(
            run_id,
            RunSlot {
                graph,
                store,
                cancel,
                done: done_rx,
            },
        );
        run_id
    }

    /// Per-task states plus the derived overall state for one run.
    pub fn run_status(&self, run_id: RunId) -> Result<RunStatusReport> {
        let runs = self.runs();
        let slot = runs.get(&run_id).ok_or(RundagError::RunNotFound(run_id))?;
        let store = slot.store.lock().expect("run state lock poisoned");

        let mut tasks = Vec::with_capacity(slot.graph.len());
        for name in slot.graph.task_names() {
            let inst = store
                .get(name)
                .ok_or_else(|| RundagError::TaskNotFound(name.to_string()))?;
            tasks.push(TaskStatus {
                task: inst.task.clone(),
                state: inst.state,
                attempts: inst.attempts,
                last_error: inst.last_error.clone(),
            });
        }

        Ok(RunStatusReport {
            run_id,
            state: overall_state(tasks.iter().map(|t| t.state)),
            tasks,
        })
    }

    /// Request cancellation of a run. No-op if the run already finished.
    pub fn cancel_run(&self, run_id: RunId) -> Result<()> {
        let runs = self.runs();
        let slot = runs.get(&run_id).ok_or(RundagError::RunNotFound(run_id))?;
        slot.cancel.cancel();
        Ok(())
    }

    /// Wait until the run's executor loop has exited. May be called from
    /// multiple callers and repeatedly.
    pub async fn wait(&self, run_id: RunId) -> Result<()> {
        let mut done = {
            let runs = self.runs();
            let slot = runs.get(&run_id).ok_or(RundagError::RunNotFound(run_id))?;
            slot.done.clone()
        };

        while !*done.borrow_and_update() {
            if done.changed().await.is_err() {
                // Sender dropped: the executor task is gone either way.
                break;
            }
        }
        Ok(())
    }
}

/// Derive the run-level state from the instance states.
///
/// Any non-terminal instance means the run is still `Running`. Among
/// terminal-only runs, `Cancelled` wins over `Failed` (cancellation is the
/// operator's last word on the run), and `Failed` covers both exhausted
/// retries and skipped downstream tasks.
fn overall_state(states: impl Iterator<Item = TaskState>) -> RunState {
    let mut saw_failed = false;
    let mut saw_cancelled = false;

    for state in states {
        if !state.is_terminal() {
            return RunState::Running;
        }
        match state {
            TaskState::Failed | TaskState::UpstreamFailed => saw_failed = true,
            TaskState::Cancelled => saw_cancelled = true,
            _ => {}
        }
    }

    if saw_cancelled {
        RunState::Cancelled
    } else if saw_failed {
        RunState::Failed
    } else {
        RunState::Success
    }
}
