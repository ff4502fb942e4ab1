// src/config/model.rs

//! Strongly typed model for the TOML task definition file.
//!
//! The file is only a convenience front-end: [`ConfigFile::build_graph`]
//! translates it into explicit [`GraphBuilder`] calls, so the core never
//! sees TOML. Shape:
//!
//! ```toml
//! [config]
//! concurrency = 4
//!
//! [trigger]
//! interval_secs = 86400
//!
//! [default]
//! retries = 1
//! retry_delay_ms = 300000
//!
//! [task.print_date]
//! cmd = "date"
//!
//! [task.sleep]
//! cmd = "sleep 5"
//! after = ["print_date"]
//! retries = 3
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::dag::graph::{GraphBuilder, TaskGraph};
use crate::dag::task::{GraphDefaults, TaskSpec};
use crate::errors::Result;
use crate::exec::action::ShellAction;

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Maximum number of concurrently running tasks per run.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    4
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

/// Scheduling cadence. When the section is absent, the binary behaves as if
/// `--once` was given.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TriggerSection {
    /// Seconds between successive scheduled runs.
    pub interval_secs: u64,
}

/// Retry settings applied to every task that does not override them.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DefaultSection {
    pub retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Shell command line to execute.
    pub cmd: String,
    /// Names of tasks that must succeed before this one starts.
    #[serde(default)]
    pub after: Vec<String>,
    pub retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

/// Raw deserialized file, prior to validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,
    #[serde(default)]
    pub default: DefaultSection,
    pub trigger: Option<TriggerSection>,
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated configuration (see the `TryFrom<RawConfigFile>` impl in
/// [`validate`](crate::config::validate)).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub default: DefaultSection,
    pub trigger: Option<TriggerSection>,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        default: DefaultSection,
        trigger: Option<TriggerSection>,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self {
            config,
            default,
            trigger,
            task,
        }
    }

    /// Translate the declarative file into explicit builder calls.
    ///
    /// Graph-level validation (cycles, unknown edges) happens in the builder
    /// and its errors surface unchanged.
    pub fn build_graph(&self) -> Result<TaskGraph> {
        let defaults = GraphDefaults {
            retry_limit: self.default.retries.unwrap_or(0),
            retry_delay: Duration::from_millis(self.default.retry_delay_ms.unwrap_or(0)),
        };

        let mut builder = GraphBuilder::new(defaults);
        for (name, tc) in self.task.iter() {
            let mut spec =
                TaskSpec::new(name.as_str(), Arc::new(ShellAction::new(tc.cmd.as_str())));
            if let Some(retries) = tc.retries {
                spec = spec.retry_limit(retries);
            }
            if let Some(ms) = tc.retry_delay_ms {
                spec = spec.retry_delay(Duration::from_millis(ms));
            }
            builder = builder.task(spec);
        }
        for (name, tc) in self.task.iter() {
            for dep in tc.after.iter() {
                builder = builder.dependency(dep.clone(), name.clone());
            }
        }
        builder.build()
    }
}
