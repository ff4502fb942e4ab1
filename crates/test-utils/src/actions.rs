//! Scripted task actions for driving the executor in tests without spawning
//! real processes.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use rundag::exec::{ActionOutcome, TaskAction};

/// Succeeds immediately, counting invocations.
pub struct CountingAction {
    calls: Arc<AtomicU32>,
}

impl CountingAction {
    /// Returns the action plus a handle to its invocation counter.
    pub fn new() -> (Arc<Self>, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        (Arc::new(Self { calls: calls.clone() }), calls)
    }
}

impl TaskAction for CountingAction {
    fn run(&self) -> Pin<Box<dyn Future<Output = ActionOutcome> + Send + '_>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { ActionOutcome::success(Vec::new()) })
    }
}

/// Fails every invocation with a fixed message.
pub struct FailingAction {
    message: String,
    calls: Arc<AtomicU32>,
}

impl FailingAction {
    pub fn new(message: impl Into<String>) -> (Arc<Self>, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        (
            Arc::new(Self {
                message: message.into(),
                calls: calls.clone(),
            }),
            calls,
        )
    }
}

impl TaskAction for FailingAction {
    fn run(&self) -> Pin<Box<dyn Future<Output = ActionOutcome> + Send + '_>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let message = self.message.clone();
        Box::pin(async move { ActionOutcome::failure(message) })
    }
}

/// Fails the first `fail_times` invocations, then succeeds.
pub struct FlakyAction {
    fail_times: u32,
    calls: Arc<AtomicU32>,
}

impl FlakyAction {
    pub fn new(fail_times: u32) -> (Arc<Self>, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        (
            Arc::new(Self {
                fail_times,
                calls: calls.clone(),
            }),
            calls,
        )
    }
}

impl TaskAction for FlakyAction {
    fn run(&self) -> Pin<Box<dyn Future<Output = ActionOutcome> + Send + '_>> {
        let invocation = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let fail_times = self.fail_times;
        Box::pin(async move {
            if invocation <= fail_times {
                ActionOutcome::failure(format!("scripted failure {invocation}"))
            } else {
                ActionOutcome::success(Vec::new())
            }
        })
    }
}

/// Holds for a fixed duration while tracking how many invocations are in
/// flight; the high-water mark is what concurrency tests assert on.
pub struct GaugeAction {
    hold: Duration,
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl GaugeAction {
    /// The `current`/`peak` handles may be shared by several actions so the
    /// gauge spans the whole graph.
    pub fn new(
        hold: Duration,
        current: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    ) -> Arc<Self> {
        Arc::new(Self {
            hold,
            current,
            peak,
        })
    }
}

impl TaskAction for GaugeAction {
    fn run(&self) -> Pin<Box<dyn Future<Output = ActionOutcome> + Send + '_>> {
        let hold = self.hold;
        let current = self.current.clone();
        let peak = self.peak.clone();
        Box::pin(async move {
            let now = current.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(hold).await;
            current.fetch_sub(1, Ordering::SeqCst);
            ActionOutcome::success(Vec::new())
        })
    }
}

/// Blocks until released, then succeeds. Used to hold a task "in flight"
/// while a test pokes at the run from outside.
pub struct BlockingAction {
    started: AtomicU32,
    release: Arc<Notify>,
}

impl BlockingAction {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            started: AtomicU32::new(0),
            release: Arc::new(Notify::new()),
        })
    }

    /// How many invocations have started (and possibly finished).
    pub fn started(&self) -> u32 {
        self.started.load(Ordering::SeqCst)
    }

    /// Release one blocked (or future) invocation.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

impl TaskAction for BlockingAction {
    fn run(&self) -> Pin<Box<dyn Future<Output = ActionOutcome> + Send + '_>> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let release = self.release.clone();
        Box::pin(async move {
            release.notified().await;
            ActionOutcome::success(Vec::new())
        })
    }
}
