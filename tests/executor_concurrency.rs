// tests/executor_concurrency.rs

//! The pool bound: with limit N and more than N simultaneously-ready tasks,
//! at most N actions are ever in flight at once.

mod common;
use crate::common::init_tracing;

use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use rundag::dag::{GraphBuilder, GraphDefaults, TaskSpec};
use rundag::engine::{Engine, RunState};
use rundag_test_utils::actions::GaugeAction;
use rundag_test_utils::with_timeout;

type TestResult = Result<(), Box<dyn Error>>;

/// Six independent roots, all held in flight briefly by a shared gauge.
fn gauged_fan(
    hold: Duration,
) -> (
    Arc<rundag::dag::TaskGraph>,
    Arc<AtomicUsize>,
    Arc<AtomicUsize>,
) {
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut builder = GraphBuilder::new(GraphDefaults::default());
    for name in ["t1", "t2", "t3", "t4", "t5", "t6"] {
        builder = builder.task(TaskSpec::new(
            name,
            GaugeAction::new(hold, current.clone(), peak.clone()),
        ));
    }
    let graph = builder.build().expect("fan graph must build");
    (Arc::new(graph), current, peak)
}

#[tokio::test]
async fn pool_never_exceeds_the_concurrency_limit() -> TestResult {
    init_tracing();

    let (graph, current, peak) = gauged_fan(Duration::from_millis(50));
    let engine = Engine::new(2);
    let run_id = engine.submit_run(graph, SystemTime::now());
    with_timeout(engine.wait(run_id)).await?;

    assert_eq!(current.load(Ordering::SeqCst), 0);
    let peak = peak.load(Ordering::SeqCst);
    assert!(peak <= 2, "observed {peak} concurrent tasks with limit 2");

    let status = engine.run_status(run_id)?;
    assert_eq!(status.state, RunState::Success);
    Ok(())
}

#[tokio::test]
async fn wider_pool_actually_runs_tasks_in_parallel() -> TestResult {
    init_tracing();

    let (graph, _current, peak) = gauged_fan(Duration::from_millis(100));
    let engine = Engine::new(4);
    let run_id = engine.submit_run(graph, SystemTime::now());
    with_timeout(engine.wait(run_id)).await?;

    let peak = peak.load(Ordering::SeqCst);
    assert!(peak <= 4, "observed {peak} concurrent tasks with limit 4");
    assert!(peak >= 2, "expected some overlap, saw peak {peak}");
    Ok(())
}
