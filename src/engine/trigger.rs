// src/engine/trigger.rs

//! Interval-based run triggering.
//!
//! The trigger is deliberately thin: it produces successive logical
//! timestamps and drives a timer loop that submits runs. All scheduling and
//! execution semantics live in the scheduler and executor.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::dag::graph::TaskGraph;
use crate::engine::runtime::Engine;
use crate::errors::Result;

/// Produces successive logical run timestamps from a fixed interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalTrigger {
    /// Logical timestamp of the first run.
    pub start: SystemTime,
    pub interval: Duration,
}

impl IntervalTrigger {
    pub fn new(start: SystemTime, interval: Duration) -> Self {
        Self { start, interval }
    }

    /// Next logical timestamp: `last_run + interval`, or the configured
    /// start if nothing has run yet.
    pub fn next_run_timestamp(&self, last_run: Option<SystemTime>) -> SystemTime {
        match last_run {
            Some(ts) => ts + self.interval,
            None => self.start,
        }
    }
}

/// Timer loop: submit one run per tick and wait for it to finish before
/// scheduling the next.
///
/// - With `once`, a single run is submitted immediately and the loop returns
///   after it completes.
/// - A message on `shutdown` cancels the active run (if any), waits for it
///   to drain, and returns.
pub async fn run_trigger_loop(
    engine: Arc<Engine>,
    graph: Arc<TaskGraph>,
    trigger: IntervalTrigger,
    once: bool,
    mut shutdown: mpsc::Receiver<()>,
) -> Result<()> {
    let mut last_run: Option<SystemTime> = None;

    loop {
        let logical_ts = trigger.next_run_timestamp(last_run);

        if let Ok(delay) = logical_ts.duration_since(SystemTime::now()) {
            debug!(?delay, "sleeping until next scheduled run");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => {
                    info!("shutdown requested while idle; exiting trigger loop");
                    return Ok(());
                }
            }
        }

        let run_id = engine.submit_run(graph.clone(), logical_ts);
        info!(run_id, "triggered scheduled run");

        tokio::select! {
            res = engine.wait(run_id) => res?,
            _ = shutdown.recv() => {
                info!(run_id, "shutdown requested; cancelling active run");
                engine.cancel_run(run_id)?;
                engine.wait(run_id).await?;
                return Ok(());
            }
        }

        let status = engine.run_status(run_id)?;
        info!(run_id, state = ?status.state, "run finished");

        last_run = Some(logical_ts);
        if once {
            return Ok(());
        }
    }
}
