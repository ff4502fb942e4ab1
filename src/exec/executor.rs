// src/exec/executor.rs

//! Bounded concurrent execution of one run.
//!
//! The executor owns the event loop for a single run: it asks the scheduler
//! for ready tasks, dispatches them onto Tokio tasks up to the concurrency
//! limit, and folds completion/retry/cancel events back into the run state.
//! The run state store is the only shared mutable state; every transition
//! happens under its lock, and only this loop performs transitions.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dag::graph::TaskGraph;
use crate::dag::scheduler::Scheduler;
use crate::dag::state::{RunStateStore, TaskState};
use crate::errors::{Result, RundagError};
use crate::exec::action::ActionOutcome;
use crate::types::{RunId, TaskName};

/// Events flowing back into the executor loop from workers and timers.
#[derive(Debug)]
enum ExecEvent {
    /// A worker finished one invocation of a task's action.
    AttemptFinished { task: TaskName, outcome: ActionOutcome },
    /// A retry delay elapsed; the task may re-enter the ready pool.
    RetryDelayElapsed { task: TaskName },
    /// Cancellation was requested for the whole run.
    CancelRequested,
}

/// Handle used to request cancellation of a running run.
///
/// Cancellation stops new dispatch immediately; in-flight actions run to
/// completion and every remaining non-terminal instance is marked
/// `Cancelled`. Safe to call more than once.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: mpsc::Sender<ExecEvent>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        if self.tx.try_send(ExecEvent::CancelRequested).is_err() {
            // Channel full or loop already gone; retry off-thread so the
            // caller never blocks. A closed channel means the run finished.
            let tx = self.tx.clone();
            tokio::spawn(async move {
                let _ = tx.send(ExecEvent::CancelRequested).await;
            });
        }
    }
}

/// Drives a single run's tasks with bounded concurrency until every task
/// instance reaches a terminal state.
pub struct Executor {
    graph: Arc<TaskGraph>,
    store: Arc<Mutex<RunStateStore>>,
    concurrency_limit: usize,
    event_tx: mpsc::Sender<ExecEvent>,
    event_rx: mpsc::Receiver<ExecEvent>,
    in_flight: usize,
    cancelled: bool,
}

impl Executor {
    pub fn new(
        graph: Arc<TaskGraph>,
        store: Arc<Mutex<RunStateStore>>,
        concurrency_limit: usize,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(64);
        Self {
            graph,
            store,
            concurrency_limit: concurrency_limit.max(1),
            event_tx,
            event_rx,
            in_flight: 0,
            cancelled: false,
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: self.event_tx.clone(),
        }
    }

    fn store(&self) -> MutexGuard<'_, RunStateStore> {
        self.store.lock().expect("run state lock poisoned")
    }

    fn run_complete(&self) -> bool {
        self.store().all_terminal()
    }

    /// Main loop: dispatch, wait for an event, fold it in, repeat.
    pub async fn run_to_completion(mut self) -> Result<()> {
        let run_id = self.store().run_id();
        info!(
            run_id,
            concurrency = self.concurrency_limit,
            tasks = self.graph.len(),
            "executor started"
        );

        self.dispatch_ready(run_id)?;

        while !self.run_complete() {
            let event = match self.event_rx.recv().await {
                Some(event) => event,
                // We hold a sender ourselves, so this only happens if the
                // loop is being torn down externally.
                None => break,
            };
            self.handle_event(run_id, event)?;
            self.dispatch_ready(run_id)?;
        }

        info!(run_id, "run complete");
        Ok(())
    }

    /// Ask the scheduler for ready tasks and dispatch as many as the pool
    /// allows, in the scheduler's deterministic order. Leftover ready tasks
    /// stay `Pending` and are picked up when a slot frees.
    fn dispatch_ready(&mut self, run_id: RunId) -> Result<()> {
        if self.cancelled {
            return Ok(());
        }

        let ready = {
            let scheduler = Scheduler::new(&self.graph);
            let mut store = self.store();
            scheduler.ready_tasks(&mut store)?
        };

        for task in ready {
            if self.in_flight >= self.concurrency_limit {
                debug!(
                    run_id,
                    task = %task,
                    "pool at capacity; task stays pending this round"
                );
                break;
            }
            self.dispatch_one(run_id, &task)?;
        }
        Ok(())
    }

    /// Pending -> Queued -> Running, then hand the action to a worker.
    fn dispatch_one(&mut self, run_id: RunId, task: &str) -> Result<()> {
        let action = self
            .graph
            .get(task)
            .ok_or_else(|| RundagError::TaskNotFound(task.to_string()))?
            .action
            .clone();

        let attempt = {
            let mut store = self.store();
            store.transition(task, TaskState::Queued)?;
            store.mark_running(task)?
        };

        info!(run_id, task = %task, attempt, "dispatching task");
        self.in_flight += 1;

        let tx = self.event_tx.clone();
        let name = task.to_string();
        tokio::spawn(async move {
            let outcome = action.run().await;
            let _ = tx.send(ExecEvent::AttemptFinished { task: name, outcome }).await;
        });
        Ok(())
    }

    fn handle_event(&mut self, run_id: RunId, event: ExecEvent) -> Result<()> {
        match event {
            ExecEvent::AttemptFinished { task, outcome } => {
                self.handle_attempt_finished(run_id, task, outcome)
            }
            ExecEvent::RetryDelayElapsed { task } => {
                let mut store = self.store();
                // The instance may have been cancelled while cooling down.
                if store.state_of(&task) == Some(TaskState::Retrying) {
                    debug!(run_id, task = %task, "retry delay elapsed; task eligible again");
                    store.transition(&task, TaskState::Pending)?;
                }
                Ok(())
            }
            ExecEvent::CancelRequested => self.handle_cancel(run_id),
        }
    }

    fn handle_attempt_finished(
        &mut self,
        run_id: RunId,
        task: TaskName,
        outcome: ActionOutcome,
    ) -> Result<()> {
        self.in_flight = self.in_flight.saturating_sub(1);

        let (retry_limit, retry_delay) = self
            .graph
            .get(&task)
            .map(|t| (t.retry_limit, t.retry_delay))
            .ok_or_else(|| RundagError::TaskNotFound(task.clone()))?;

        let mut store = self.store();
        let attempts = store
            .get(&task)
            .map(|inst| inst.attempts)
            .ok_or_else(|| RundagError::TaskNotFound(task.clone()))?;

        if outcome.success {
            info!(run_id, task = %task, attempt = attempts, "task succeeded");
            store.mark_success(&task)?;
            return Ok(());
        }

        let error = outcome
            .error
            .unwrap_or_else(|| "action reported failure".to_string());

        if !self.cancelled && attempts <= retry_limit {
            warn!(
                run_id,
                task = %task,
                attempt = attempts,
                retry_limit,
                delay = ?retry_delay,
                error = %error,
                "task failed; will retry after delay"
            );
            store.mark_retrying(&task, error)?;
            drop(store);
            self.schedule_retry(task, retry_delay);
        } else {
            warn!(
                run_id,
                task = %task,
                attempt = attempts,
                error = %error,
                "task failed permanently"
            );
            store.mark_failed(&task, error)?;
        }
        Ok(())
    }

    /// The retry timer is a scheduled re-check, not a blocked worker: the
    /// pool slot was already released when the failing attempt finished.
    fn schedule_retry(&self, task: TaskName, delay: Duration) {
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(ExecEvent::RetryDelayElapsed { task }).await;
        });
    }

    /// Stop dispatching, cancel everything not yet in flight, and let
    /// in-flight actions drain. A failing in-flight action goes straight to
    /// `Failed`; no retries are scheduled once cancelled.
    fn handle_cancel(&mut self, run_id: RunId) -> Result<()> {
        if self.cancelled {
            return Ok(());
        }
        self.cancelled = true;
        info!(run_id, in_flight = self.in_flight, "cancellation requested");

        let mut store = self.store();
        for name in self.graph.task_names() {
            if matches!(
                store.state_of(name),
                Some(TaskState::Pending) | Some(TaskState::Queued) | Some(TaskState::Retrying)
            ) {
                store.mark_cancelled(name)?;
            }
        }
        Ok(())
    }
}
