// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{ExecutionMode, Key, Priority, StrategyKind};

/// Configuration exactly as read from a TOML file.
///
/// ```toml
/// [config]
/// mode = "pool"
/// concurrency = 2
/// timeout = "30s"
///
/// [default]
/// timeout = "10s"
/// env = { RUST_LOG = "info" }
///
/// [[command]]
/// key = "lint"
/// cmd = ["cargo", "clippy"]
/// priority = "high"
/// ```
///
/// Turn it into a [`ConfigFile`] with `ConfigFile::try_from`, which
/// validates durations and inputs and resolves `[default]` into every
/// command.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub default: DefaultSection,

    /// `[[command]]` entries, in declaration order.
    #[serde(default)]
    pub command: Vec<CommandConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigSection {
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Pool worker count; 0 runs every command at once.
    #[serde(default)]
    pub concurrency: usize,

    /// Deadline for the whole pool or pipeline, e.g. `"30s"`.
    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default)]
    pub strategy: StrategyKind,

    /// Default for commands without their own `quiet`.
    #[serde(default)]
    pub quiet: bool,
}

/// `[default]` section: values every command inherits unless it sets them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultSection {
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Merged under each command's own `env`.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Per-command timeout for pool members.
    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default)]
    pub disable_buffering: bool,
}

/// One `[[command]]` entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandConfig {
    /// Result key; defaults to the entry's position.
    #[serde(default)]
    pub key: Option<String>,

    /// Program followed by its arguments.
    pub cmd: Vec<String>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Literal stdin.
    #[serde(default)]
    pub input: Option<String>,

    /// File streamed to stdin. Mutually exclusive with `input`.
    #[serde(default)]
    pub input_file: Option<PathBuf>,

    #[serde(default)]
    pub quiet: Option<bool>,

    #[serde(default)]
    pub disable_buffering: Option<bool>,
}

/// Stdin of a configured command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandInput {
    Literal(String),
    File(PathBuf),
}

/// A command with `[default]` already applied.
#[derive(Debug, Clone)]
pub struct CommandEntry {
    pub key: Key,
    pub program: String,
    pub args: Vec<String>,
    pub priority: Priority,
    pub timeout: Option<Duration>,
    pub path: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub input: Option<CommandInput>,
    pub quiet: bool,
    pub disable_buffering: bool,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub mode: ExecutionMode,
    pub concurrency: usize,
    pub timeout: Option<Duration>,
    pub strategy: StrategyKind,
    pub commands: Vec<CommandEntry>,
}

impl ConfigFile {
    /// Construct without validation. Use `ConfigFile::try_from` instead.
    pub fn new_unchecked(
        mode: ExecutionMode,
        concurrency: usize,
        timeout: Option<Duration>,
        strategy: StrategyKind,
        commands: Vec<CommandEntry>,
    ) -> Self {
        Self {
            mode,
            concurrency,
            timeout,
            strategy,
            commands,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(|c| c.key.as_str())
    }
}
