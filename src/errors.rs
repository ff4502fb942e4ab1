// src/errors.rs

//! Crate-wide error taxonomy and `Result` alias.
//!
//! Graph construction errors (`DuplicateTask`, `UnknownDependency`, `Cycle`)
//! are fatal to the caller: no graph is produced. `InvalidTransition` is an
//! internal invariant violation and indicates a bug in the scheduler or
//! executor, never bad user input. Task action failures are not errors at
//! this level at all; they are recorded per task instance and surfaced
//! through run status.

use thiserror::Error;

use crate::dag::state::TaskState;
use crate::types::RunId;

#[derive(Error, Debug)]
pub enum RundagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("duplicate task id '{0}' in graph definition")]
    DuplicateTask(String),

    #[error("dependency edge '{dependency}' -> '{task}' references an unknown task")]
    UnknownDependency { task: String, dependency: String },

    #[error("cycle detected in task graph: {}", .cycle.join(" -> "))]
    Cycle { cycle: Vec<String> },

    #[error("invalid state transition for task '{task}': {from:?} -> {to:?}")]
    InvalidTransition {
        task: String,
        from: TaskState,
        to: TaskState,
    },

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(RunId),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RundagError>;
