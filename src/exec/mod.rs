// src/exec/mod.rs

//! Task execution layer.
//!
//! - [`action`] defines the opaque `TaskAction` capability the core consumes,
//!   plus the production `ShellAction` (runs a command line via the platform
//!   shell) and the closure-based `FnAction`.
//! - [`executor`] owns the per-run event loop: bounded concurrent dispatch,
//!   fixed-delay retries, and cancellation.

pub mod action;
pub mod executor;

pub use action::{ActionOutcome, FnAction, ShellAction, TaskAction};
pub use executor::{CancelHandle, Executor};
