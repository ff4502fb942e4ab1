// tests/executor_retry.rs

//! Retry behaviour: attempt accounting, delay honouring, and exhaustion.
//!
//! These tests run with Tokio's paused clock, so the only thing that can
//! advance time is the executor's own retry timers. Asserting on elapsed
//! time therefore proves the delay was honoured, deterministically.

mod common;
use crate::common::init_tracing;

use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::time::Instant;

use rundag::dag::{GraphBuilder, GraphDefaults, TaskSpec, TaskState};
use rundag::engine::{Engine, RunState};
use rundag_test_utils::actions::{FailingAction, FlakyAction};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test(start_paused = true)]
async fn each_retry_waits_the_configured_delay() -> TestResult {
    init_tracing();

    let delay = Duration::from_secs(5);
    let (action, calls) = FlakyAction::new(2);
    let graph = GraphBuilder::new(GraphDefaults::default())
        .task(
            TaskSpec::new("flaky", action)
                .retry_limit(2)
                .retry_delay(delay),
        )
        .build()?;

    let engine = Engine::new(1);
    let started = Instant::now();
    let run_id = engine.submit_run(Arc::new(graph), SystemTime::now());
    engine.wait(run_id).await?;

    // Two failures, each cooling down for 5s before the next attempt.
    assert!(
        started.elapsed() >= delay * 2,
        "run finished after {:?}, expected at least {:?}",
        started.elapsed(),
        delay * 2
    );

    let status = engine.run_status(run_id)?;
    assert_eq!(status.state, RunState::Success);
    assert_eq!(status.tasks[0].attempts, 3);
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_leave_the_task_failed() -> TestResult {
    init_tracing();

    let (action, calls) = FailingAction::new("still broken");
    let graph = GraphBuilder::new(GraphDefaults::default())
        .task(
            TaskSpec::new("doomed", action)
                .retry_limit(2)
                .retry_delay(Duration::from_millis(100)),
        )
        .build()?;

    let engine = Engine::new(1);
    let run_id = engine.submit_run(Arc::new(graph), SystemTime::now());
    engine.wait(run_id).await?;

    let status = engine.run_status(run_id)?;
    assert_eq!(status.state, RunState::Failed);
    let task = &status.tasks[0];
    assert_eq!(task.state, TaskState::Failed);
    // retry_limit 2 means up to three invocations in total.
    assert_eq!(task.attempts, 3);
    assert_eq!(task.last_error.as_deref(), Some("still broken"));
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn zero_retry_limit_fails_on_the_first_attempt() -> TestResult {
    init_tracing();

    let (action, calls) = FailingAction::new("no second chances");
    let graph = GraphBuilder::new(GraphDefaults::default())
        .task(TaskSpec::new("fragile", action))
        .build()?;

    let engine = Engine::new(1);
    let run_id = engine.submit_run(Arc::new(graph), SystemTime::now());
    engine.wait(run_id).await?;

    let status = engine.run_status(run_id)?;
    assert_eq!(status.tasks[0].state, TaskState::Failed);
    assert_eq!(status.tasks[0].attempts, 1);
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn default_retry_settings_come_from_the_graph() -> TestResult {
    init_tracing();

    // Graph-wide default: one retry, no delay. The task itself sets nothing.
    let (action, _calls) = FlakyAction::new(1);
    let graph = GraphBuilder::new(GraphDefaults {
        retry_limit: 1,
        retry_delay: Duration::ZERO,
    })
    .task(TaskSpec::new("uses_defaults", action))
    .build()?;

    let engine = Engine::new(1);
    let run_id = engine.submit_run(Arc::new(graph), SystemTime::now());
    engine.wait(run_id).await?;

    let status = engine.run_status(run_id)?;
    assert_eq!(status.state, RunState::Success);
    assert_eq!(status.tasks[0].attempts, 2);
    Ok(())
}
