// src/process/spec.rs

//! Process specification and the single-process builder.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::Result;
use crate::exec::launch;
use crate::output::{self, OutputHandler};
use crate::process::{Input, ProcessResult, RunningProcess};
use crate::types::{Key, StreamKind};

/// Everything needed to launch one external command.
///
/// `quiet` and `buffering` stay `None` until set so pipeline and pool level
/// defaults can fill them in without overriding an explicit choice.
pub(crate) struct CommandSpec {
    pub(crate) program: String,
    pub(crate) args: Vec<String>,
    pub(crate) path: Option<PathBuf>,
    pub(crate) env: Vec<(String, String)>,
    pub(crate) input: Option<Input>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) quiet: Option<bool>,
    pub(crate) buffering: Option<bool>,
    pub(crate) handlers: Vec<OutputHandler>,
}

impl CommandSpec {
    pub(crate) fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            path: None,
            env: Vec::new(),
            input: None,
            timeout: None,
            quiet: None,
            buffering: None,
            handlers: Vec::new(),
        }
    }

    /// Run `script` through the platform shell.
    pub(crate) fn shell(script: &str) -> Self {
        if cfg!(windows) {
            let mut spec = Self::new("cmd");
            spec.args = vec!["/C".to_string(), script.to_string()];
            spec
        } else {
            let mut spec = Self::new("sh");
            spec.args = vec!["-c".to_string(), script.to_string()];
            spec
        }
    }

    pub(crate) fn set_timeout(&mut self, timeout: Duration) {
        // A zero timeout means "no timeout".
        self.timeout = if timeout.is_zero() { None } else { Some(timeout) };
    }

    pub(crate) fn is_quiet(&self) -> bool {
        self.quiet.unwrap_or(false)
    }

    pub(crate) fn is_buffering(&self) -> bool {
        self.buffering.unwrap_or(true)
    }

    /// Fill unset fields from pipeline/pool defaults. Environment overlays
    /// merge with the command's own entries applied last.
    pub(crate) fn apply_defaults(&mut self, defaults: &CommandDefaults) {
        if self.path.is_none() {
            self.path = defaults.path.clone();
        }
        if !defaults.env.is_empty() {
            let own = std::mem::take(&mut self.env);
            self.env = defaults.env.iter().cloned().chain(own).collect();
        }
        if self.quiet.is_none() {
            self.quiet = defaults.quiet;
        }
        if self.buffering.is_none() {
            self.buffering = defaults.buffering;
        }
        self.handlers.extend(defaults.handlers.iter().cloned());
    }

    /// Diagnostic rendering of the command line.
    pub(crate) fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(quote_arg)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("command", &self.command_line())
            .field("path", &self.path)
            .field("env", &self.env)
            .field("input", &self.input)
            .field("timeout", &self.timeout)
            .field("quiet", &self.quiet)
            .field("buffering", &self.buffering)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

fn quote_arg(arg: &str) -> String {
    if !arg.is_empty() && !arg.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"') {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Settings a pipeline or pool applies to every command that did not set
/// its own.
#[derive(Default, Clone)]
pub(crate) struct CommandDefaults {
    pub(crate) path: Option<PathBuf>,
    pub(crate) env: Vec<(String, String)>,
    pub(crate) quiet: Option<bool>,
    pub(crate) buffering: Option<bool>,
    pub(crate) handlers: Vec<OutputHandler>,
}

/// Builder for a single external process.
///
/// ```no_run
/// # async fn demo() -> procflow::errors::Result<()> {
/// use procflow::process::Process;
///
/// let result = Process::new("echo").arg("hello").quiet().run().await?;
/// assert_eq!(result.output(), "hello\n");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Process {
    key: Option<Key>,
    spec: CommandSpec,
}

impl Process {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            key: None,
            spec: CommandSpec::new(program),
        }
    }

    /// Run a script through `sh -c` (or `cmd /C` on Windows).
    pub fn shell(script: impl AsRef<str>) -> Self {
        Self {
            key: None,
            spec: CommandSpec::shell(script.as_ref()),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.spec.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Key passed to output handlers. Defaults to `"0"`.
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Working directory.
    pub fn path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spec.path = Some(dir.into());
        self
    }

    /// Overlay one variable on the inherited environment.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.env.push((key.into(), value.into()));
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.spec
            .env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn input(mut self, input: impl Into<Input>) -> Self {
        self.spec.input = Some(input.into());
        self
    }

    /// Kill the process once `timeout` has elapsed. Zero disables the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.spec.set_timeout(timeout);
        self
    }

    /// Do not echo output to the controlling terminal.
    pub fn quiet(mut self) -> Self {
        self.spec.quiet = Some(true);
        self
    }

    /// Skip in-memory capture; `output()` stays empty.
    pub fn disable_buffering(mut self) -> Self {
        self.spec.buffering = Some(false);
        self
    }

    /// Register a per-line output callback.
    pub fn on_output<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, StreamKind, Vec<u8>) + Send + Sync + 'static,
    {
        self.spec.handlers.push(output::handler(f));
        self
    }

    pub fn command_line(&self) -> String {
        self.spec.command_line()
    }

    /// Spawn the process and return immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self) -> Result<RunningProcess> {
        let key = self.key.unwrap_or_else(|| "0".to_string());
        let launched = launch::launch(key, self.spec, false)?;
        Ok(launched.supervise(None, None))
    }

    /// `start` followed by `wait`.
    pub async fn run(self) -> Result<ProcessResult> {
        let running = self.start()?;
        Ok(running.wait().await)
    }
}
