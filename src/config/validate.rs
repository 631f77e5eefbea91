// src/config/validate.rs

use std::collections::HashSet;
use std::time::Duration;

use tracing::warn;

use crate::config::duration::parse_duration;
use crate::config::model::{
    CommandConfig, CommandEntry, CommandInput, ConfigFile, DefaultSection, RawConfigFile,
};
use crate::errors::{ProcflowError, Result};
use crate::types::ExecutionMode;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ProcflowError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_commands(&raw)?;

        let timeout = optional_duration(raw.config.timeout.as_deref(), "[config].timeout")?;
        let default_timeout =
            optional_duration(raw.default.timeout.as_deref(), "[default].timeout")?;

        let commands = raw
            .command
            .into_iter()
            .enumerate()
            .map(|(pos, cmd)| {
                resolve_command(pos, cmd, &raw.default, default_timeout, raw.config.quiet)
            })
            .collect::<Result<Vec<_>>>()?;

        warn_duplicate_keys(&commands);
        if raw.config.mode == ExecutionMode::Pipeline
            && commands.iter().any(|c| c.timeout.is_some())
        {
            warn!("per-command timeouts are ignored in pipeline mode; use [config].timeout");
        }

        Ok(ConfigFile::new_unchecked(
            raw.config.mode,
            raw.config.concurrency,
            timeout,
            raw.config.strategy,
            commands,
        ))
    }
}

fn ensure_has_commands(cfg: &RawConfigFile) -> Result<()> {
    if cfg.command.is_empty() {
        return Err(ProcflowError::ConfigError(
            "config must contain at least one [[command]] entry".to_string(),
        ));
    }
    Ok(())
}

fn optional_duration(value: Option<&str>, field: &str) -> Result<Option<Duration>> {
    value
        .map(|s| {
            parse_duration(s).map_err(|e| ProcflowError::ConfigError(format!("{field}: {e}")))
        })
        .transpose()
        .map(|d| d.filter(|d| !d.is_zero()))
}

fn resolve_command(
    pos: usize,
    cmd: CommandConfig,
    defaults: &DefaultSection,
    default_timeout: Option<Duration>,
    default_quiet: bool,
) -> Result<CommandEntry> {
    let key = cmd.key.unwrap_or_else(|| pos.to_string());

    let mut argv = cmd.cmd.into_iter();
    let program = argv
        .next()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ProcflowError::ConfigError(format!("command '{key}' has an empty `cmd`")))?;

    let timeout = match cmd.timeout.as_deref() {
        Some(s) => optional_duration(Some(s), &format!("command '{key}' timeout"))?,
        None => default_timeout,
    };

    let input = match (cmd.input, cmd.input_file) {
        (Some(_), Some(_)) => {
            return Err(ProcflowError::ConfigError(format!(
                "command '{key}' sets both `input` and `input_file`"
            )));
        }
        (Some(text), None) => Some(CommandInput::Literal(text)),
        (None, Some(path)) => Some(CommandInput::File(path)),
        (None, None) => None,
    };

    let mut env = defaults.env.clone();
    env.extend(cmd.env);

    Ok(CommandEntry {
        key,
        program,
        args: argv.collect(),
        priority: cmd.priority,
        timeout,
        path: cmd.path.or_else(|| defaults.path.clone()),
        env,
        input,
        quiet: cmd.quiet.unwrap_or(default_quiet),
        disable_buffering: cmd.disable_buffering.unwrap_or(defaults.disable_buffering),
    })
}

fn warn_duplicate_keys(commands: &[CommandEntry]) {
    let mut seen = HashSet::new();
    for c in commands {
        if !seen.insert(c.key.as_str()) {
            warn!(key = %c.key, "duplicate command key; the result finishing last wins");
        }
    }
}
