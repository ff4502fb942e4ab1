// src/dag/graph.rs

//! Immutable task graph: build-time validation and traversal helpers.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::dag::task::{GraphDefaults, Task, TaskSpec};
use crate::errors::{Result, RundagError};
use crate::types::TaskName;

/// Explicit builder for a [`TaskGraph`].
///
/// Tasks are declared with [`task`](Self::task); dependencies with
/// [`dependency`](Self::dependency), where `dependency(a, b)` means `a` must
/// succeed before `b` may start. All validation happens in
/// [`build`](Self::build).
#[derive(Debug)]
pub struct GraphBuilder {
    defaults: GraphDefaults,
    specs: Vec<TaskSpec>,
    edges: Vec<(TaskName, TaskName)>,
}

impl GraphBuilder {
    pub fn new(defaults: GraphDefaults) -> Self {
        Self {
            defaults,
            specs: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn task(mut self, spec: TaskSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Declare that `from` must succeed before `to` may start.
    pub fn dependency(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    pub fn build(self) -> Result<TaskGraph> {
        TaskGraph::build(self.defaults, self.specs, self.edges)
    }
}

/// Validated, immutable directed acyclic graph of tasks.
///
/// Shared read-only across runs; requires no synchronization.
#[derive(Debug)]
pub struct TaskGraph {
    tasks: HashMap<TaskName, Task>,
    /// Task names in declaration order; the basis for every deterministic
    /// iteration over the graph.
    order: Vec<TaskName>,
    downstream: HashMap<TaskName, Vec<TaskName>>,
}

impl TaskGraph {
    /// Build and validate a graph from task specs and dependency edges.
    ///
    /// Fails with [`RundagError::DuplicateTask`] on a name collision,
    /// [`RundagError::UnknownDependency`] when an edge references a task that
    /// was never declared, and [`RundagError::Cycle`] (carrying one offending
    /// task sequence) when the edges are not acyclic.
    pub fn build(
        defaults: GraphDefaults,
        specs: Vec<TaskSpec>,
        edges: Vec<(TaskName, TaskName)>,
    ) -> Result<Self> {
        if specs.is_empty() {
            return Err(RundagError::ConfigError(
                "task graph must contain at least one task".to_string(),
            ));
        }

        let mut tasks: HashMap<TaskName, Task> = HashMap::new();
        let mut order: Vec<TaskName> = Vec::new();

        for spec in specs {
            let name = spec.name.clone();
            if tasks.contains_key(&name) {
                return Err(RundagError::DuplicateTask(name));
            }
            tasks.insert(name.clone(), Task::from_spec(spec, defaults));
            order.push(name);
        }

        let mut downstream: HashMap<TaskName, Vec<TaskName>> = order
            .iter()
            .map(|name| (name.clone(), Vec::new()))
            .collect();

        for (from, to) in &edges {
            if !tasks.contains_key(from) {
                return Err(RundagError::UnknownDependency {
                    task: to.clone(),
                    dependency: from.clone(),
                });
            }
            if !tasks.contains_key(to) {
                return Err(RundagError::UnknownDependency {
                    task: from.clone(),
                    dependency: to.clone(),
                });
            }
            if from == to {
                return Err(RundagError::Cycle {
                    cycle: vec![from.clone(), to.clone()],
                });
            }

            // Ignore a repeated declaration of the same edge.
            let task = tasks
                .get_mut(to)
                .ok_or_else(|| RundagError::TaskNotFound(to.clone()))?;
            if !task.upstream.contains(from) {
                task.upstream.push(from.clone());
                downstream
                    .get_mut(from)
                    .ok_or_else(|| RundagError::TaskNotFound(from.clone()))?
                    .push(to.clone());
            }
        }

        let graph = Self {
            tasks,
            order,
            downstream,
        };
        graph.ensure_acyclic()?;

        debug!(
            tasks = graph.order.len(),
            roots = graph.roots().len(),
            "task graph built"
        );
        Ok(graph)
    }

    /// Validate acyclicity with a toposort; on failure, extract one offending
    /// cycle via DFS so the error names the full task sequence.
    fn ensure_acyclic(&self) -> Result<()> {
        let mut check: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in &self.order {
            check.add_node(name.as_str());
        }
        for (from, targets) in &self.downstream {
            for to in targets {
                check.add_edge(from.as_str(), to.as_str(), ());
            }
        }

        match toposort(&check, None) {
            Ok(_order) => Ok(()),
            Err(_cycle) => {
                let cycle = self
                    .find_cycle()
                    .unwrap_or_else(|| vec!["<unknown>".to_string()]);
                Err(RundagError::Cycle { cycle })
            }
        }
    }

    /// Three-color DFS that returns one cycle as `[a, b, .., a]`.
    fn find_cycle(&self) -> Option<Vec<TaskName>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let mut marks: HashMap<&str, Mark> = self
            .order
            .iter()
            .map(|name| (name.as_str(), Mark::Unvisited))
            .collect();
        let mut path: Vec<&str> = Vec::new();

        fn visit<'a>(
            node: &'a str,
            downstream: &'a HashMap<TaskName, Vec<TaskName>>,
            marks: &mut HashMap<&'a str, Mark>,
            path: &mut Vec<&'a str>,
        ) -> Option<Vec<TaskName>> {
            marks.insert(node, Mark::InProgress);
            path.push(node);

            for next in downstream.get(node).map(Vec::as_slice).unwrap_or(&[]) {
                match marks.get(next.as_str()).copied() {
                    Some(Mark::InProgress) => {
                        // Found a back edge; the cycle is the path suffix
                        // starting at `next`, closed with `next` again.
                        let start = path
                            .iter()
                            .position(|n| *n == next.as_str())
                            .unwrap_or(0);
                        let mut cycle: Vec<TaskName> =
                            path[start..].iter().map(|n| n.to_string()).collect();
                        cycle.push(next.clone());
                        return Some(cycle);
                    }
                    Some(Mark::Unvisited) => {
                        if let Some(cycle) = visit(next, downstream, marks, path) {
                            return Some(cycle);
                        }
                    }
                    _ => {}
                }
            }

            path.pop();
            marks.insert(node, Mark::Done);
            None
        }

        for name in &self.order {
            if marks.get(name.as_str()) == Some(&Mark::Unvisited) {
                if let Some(cycle) = visit(name, &self.downstream, &mut marks, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    /// Task names in declaration order.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Tasks with no upstream dependencies, in declaration order.
    pub fn roots(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|name| {
                self.tasks
                    .get(*name)
                    .is_some_and(|task| task.upstream.is_empty())
            })
            .map(String::as_str)
            .collect()
    }

    /// Direct upstream dependencies of `name` (declaration order).
    pub fn upstream_of(&self, name: &str) -> &[TaskName] {
        self.tasks
            .get(name)
            .map(|task| task.upstream.as_slice())
            .unwrap_or(&[])
    }

    /// Direct downstream dependents of `name`.
    pub fn downstream_of(&self, name: &str) -> &[TaskName] {
        self.downstream
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// A valid linearization: every task appears after all of its upstream
    /// tasks. Ties are broken by declaration order, so the result is stable
    /// for a given builder input.
    pub fn topological_order(&self) -> Vec<TaskName> {
        use std::cmp::Reverse;
        use std::collections::BinaryHeap;

        let index: HashMap<&str, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let mut indegree: HashMap<&str, usize> = self
            .order
            .iter()
            .map(|name| (name.as_str(), self.upstream_of(name).len()))
            .collect();

        let mut heap: BinaryHeap<Reverse<usize>> = self
            .order
            .iter()
            .filter(|name| indegree[name.as_str()] == 0)
            .map(|name| Reverse(index[name.as_str()]))
            .collect();

        let mut sorted = Vec::with_capacity(self.order.len());
        while let Some(Reverse(i)) = heap.pop() {
            let name = &self.order[i];
            sorted.push(name.clone());
            for next in self.downstream_of(name) {
                if let Some(d) = indegree.get_mut(next.as_str()) {
                    *d -= 1;
                    if *d == 0 {
                        heap.push(Reverse(index[next.as_str()]));
                    }
                }
            }
        }
        sorted
    }
}
