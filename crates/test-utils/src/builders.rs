#![allow(dead_code)]

use procflow::config::{CommandConfig, ConfigFile, RawConfigFile};
use procflow::errors::Result;
use procflow::types::{ExecutionMode, Priority, StrategyKind};

/// Builder for `RawConfigFile` / `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_command(mut self, command: CommandConfig) -> Self {
        self.config.command.push(command);
        self
    }

    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.config.config.mode = mode;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.config.concurrency = n;
        self
    }

    pub fn timeout(mut self, duration: &str) -> Self {
        self.config.config.timeout = Some(duration.to_string());
        self
    }

    pub fn strategy(mut self, strategy: StrategyKind) -> Self {
        self.config.config.strategy = strategy;
        self
    }

    pub fn quiet(mut self, val: bool) -> Self {
        self.config.config.quiet = val;
        self
    }

    pub fn default_timeout(mut self, duration: &str) -> Self {
        self.config.default.timeout = Some(duration.to_string());
        self
    }

    pub fn default_env(mut self, key: &str, value: &str) -> Self {
        self.config
            .default
            .env
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for one `[[command]]` entry.
pub struct CommandConfigBuilder {
    command: CommandConfig,
}

impl CommandConfigBuilder {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: CommandConfig {
                cmd: argv.into_iter().map(Into::into).collect(),
                ..CommandConfig::default()
            },
        }
    }

    /// `sh -c <script>`.
    pub fn shell(script: &str) -> Self {
        Self::new(["sh", "-c", script])
    }

    pub fn key(mut self, key: &str) -> Self {
        self.command.key = Some(key.to_string());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.command.priority = priority;
        self
    }

    pub fn timeout(mut self, duration: &str) -> Self {
        self.command.timeout = Some(duration.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.command.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn input(mut self, text: &str) -> Self {
        self.command.input = Some(text.to_string());
        self
    }

    pub fn input_file(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.command.input_file = Some(path.into());
        self
    }

    pub fn quiet(mut self, val: bool) -> Self {
        self.command.quiet = Some(val);
        self
    }

    pub fn disable_buffering(mut self, val: bool) -> Self {
        self.command.disable_buffering = Some(val);
        self
    }

    pub fn build(self) -> CommandConfig {
        self.command
    }
}
