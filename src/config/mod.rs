// src/config/mod.rs

//! Declarative TOML front-end for defining task graphs.
//!
//! This is a thin caller of the explicit graph builder: nothing below the
//! config layer knows the file format exists.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::load_and_validate;
pub use model::{
    ConfigFile, ConfigSection, DefaultSection, RawConfigFile, TaskConfig, TriggerSection,
};
