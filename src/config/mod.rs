// src/config/mod.rs

//! TOML configuration for pools and pipelines.
//!
//! - `model.rs`: the file format and its validated form.
//! - `loader.rs`: reading files from disk.
//! - `validate.rs`: `RawConfigFile` → `ConfigFile`, resolving `[default]`.
//! - `runner.rs`: starting the configured pool or pipeline.

pub mod duration;
pub mod loader;
pub mod model;
pub mod runner;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{default_config_path, load_and_validate, load_from_path, load_from_str};
pub use model::{
    CommandConfig, CommandEntry, CommandInput, ConfigFile, ConfigSection, DefaultSection,
    RawConfigFile,
};
pub use runner::{Outcome, Started};
