#![allow(dead_code)]

//! Shorthand graph construction for tests.

use std::sync::Arc;

use rundag::dag::{GraphBuilder, GraphDefaults, TaskGraph, TaskSpec};
use rundag::exec::{ActionOutcome, FnAction, TaskAction};

/// An action that succeeds immediately.
pub fn ok_action() -> Arc<dyn TaskAction> {
    Arc::new(FnAction::new(|| async { ActionOutcome::success(Vec::new()) }))
}

/// An action that fails immediately with the given message.
pub fn fail_action(message: &str) -> Arc<dyn TaskAction> {
    let message = message.to_string();
    Arc::new(FnAction::new(move || {
        let message = message.clone();
        async move { ActionOutcome::failure(message) }
    }))
}

/// A spec for a task that succeeds immediately.
pub fn ok_spec(name: &str) -> TaskSpec {
    TaskSpec::new(name, ok_action())
}

/// Build a linear chain `names[0] -> names[1] -> ..` of immediately
/// succeeding tasks.
pub fn chain_graph(names: &[&str]) -> TaskGraph {
    let mut builder = GraphBuilder::new(GraphDefaults::default());
    for name in names {
        builder = builder.task(ok_spec(name));
    }
    for pair in names.windows(2) {
        builder = builder.dependency(pair[0], pair[1]);
    }
    builder.build().expect("chain graph must build")
}

/// Build a graph of independent root tasks sharing the same action.
pub fn fan_graph(names: &[&str], action: impl Fn() -> Arc<dyn TaskAction>) -> TaskGraph {
    let mut builder = GraphBuilder::new(GraphDefaults::default());
    for name in names {
        builder = builder.task(TaskSpec::new(*name, action()));
    }
    builder.build().expect("fan graph must build")
}
