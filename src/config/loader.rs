// src/config/loader.rs

use std::path::Path;

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Read, parse, and validate a task definition file.
pub fn load_and_validate(path: &Path) -> Result<ConfigFile> {
    debug!(path = %path.display(), "loading task definition file");
    let text = std::fs::read_to_string(path)?;
    let raw: RawConfigFile = toml::from_str(&text)?;
    ConfigFile::try_from(raw)
}
