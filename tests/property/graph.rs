use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use proptest::prelude::*;

use rundag::dag::{GraphBuilder, GraphDefaults, TaskGraph, TaskState};
use rundag::dag::{RunStateStore, Scheduler, TaskSpec};
use rundag::exec::{ActionOutcome, FnAction, TaskAction};

fn noop() -> Arc<dyn TaskAction> {
    Arc::new(FnAction::new(|| async { ActionOutcome::success(Vec::new()) }))
}

/// Build a graph of `task_0 .. task_{n-1}` where task i may only depend on
/// tasks with a smaller index, guaranteeing acyclicity by construction.
fn build_graph(raw_deps: Vec<Vec<usize>>) -> TaskGraph {
    let num_tasks = raw_deps.len();
    let mut builder = GraphBuilder::new(GraphDefaults::default());
    for i in 0..num_tasks {
        builder = builder.task(TaskSpec::new(format!("task_{i}"), noop()));
    }

    for (i, potential_deps) in raw_deps.into_iter().enumerate() {
        let mut valid_deps = HashSet::new();
        for dep_idx in potential_deps {
            if i > 0 {
                valid_deps.insert(dep_idx % i);
            }
        }
        for dep_idx in valid_deps {
            builder = builder.dependency(format!("task_{dep_idx}"), format!("task_{i}"));
        }
    }

    builder.build().expect("index-bounded deps are always acyclic")
}

fn deps_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
    })
}

proptest! {
    /// Every acyclic task set builds, and the topological order is a valid
    /// linearization: each task appears after all of its upstream tasks.
    #[test]
    fn topological_order_is_a_valid_linearization(raw_deps in deps_strategy(12)) {
        let graph = build_graph(raw_deps);
        let order = graph.topological_order();
        prop_assert_eq!(order.len(), graph.len());

        let position: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(pos, name)| (name.as_str(), pos))
            .collect();

        for name in graph.task_names() {
            for dep in graph.upstream_of(name) {
                prop_assert!(
                    position[dep.as_str()] < position[name],
                    "{} scheduled before its dependency {}",
                    name,
                    dep
                );
            }
        }
    }

    /// A non-empty acyclic graph always has at least one root.
    #[test]
    fn acyclic_graphs_have_roots(raw_deps in deps_strategy(12)) {
        let graph = build_graph(raw_deps);
        prop_assert!(!graph.roots().is_empty());
    }

    /// Repeatedly asking for ready tasks without changing state returns the
    /// same answer, and completing tasks in ready order drains every run.
    #[test]
    fn scheduling_by_readiness_always_terminates(raw_deps in deps_strategy(10)) {
        let graph = build_graph(raw_deps);
        let scheduler = Scheduler::new(&graph);
        let mut store = RunStateStore::create_run(&graph, 1, std::time::SystemTime::UNIX_EPOCH);

        let mut completed = 0usize;
        while !scheduler.is_run_complete(&store) {
            let ready = scheduler.ready_tasks(&mut store).expect("ready");
            let again = scheduler.ready_tasks(&mut store).expect("ready again");
            prop_assert_eq!(&ready, &again, "ready_tasks not idempotent");
            prop_assert!(!ready.is_empty(), "live run with no ready tasks");

            for task in ready {
                store.transition(&task, TaskState::Queued).expect("queue");
                store.mark_running(&task).expect("run");
                store.mark_success(&task).expect("succeed");
                completed += 1;
            }
        }
        prop_assert_eq!(completed, graph.len());
    }
}
