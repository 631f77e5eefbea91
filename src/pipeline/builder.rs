// src/pipeline/builder.rs

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::errors::{ProcflowError, Result};
use crate::exec::cancel::cancel_pair;
use crate::exec::launch::{self, Launched};
use crate::output;
use crate::pipeline::running::{self, RunningPipeline};
use crate::process::spec::{CommandDefaults, CommandSpec};
use crate::process::{Input, ProcessResult};
use crate::types::{Key, StreamKind};

/// One stage of a pipeline.
#[derive(Debug)]
pub struct Step {
    key: Key,
    spec: CommandSpec,
}

impl Step {
    /// Override the stage key (defaults to its position, `"0"`, `"1"`, ...).
    pub fn key(&mut self, key: impl Into<Key>) -> &mut Self {
        self.key = key.into();
        self
    }

    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.spec.args.push(arg.into());
        self
    }

    pub fn path(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.spec.path = Some(dir.into());
        self
    }

    pub fn env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.spec.env.push((key.into(), value.into()));
        self
    }

    /// Explicit stdin for this stage. The previous stage is then not piped
    /// into it.
    pub fn input(&mut self, input: impl Into<Input>) -> &mut Self {
        self.spec.input = Some(input.into());
        self
    }

    pub fn quiet(&mut self) -> &mut Self {
        self.spec.quiet = Some(true);
        self
    }

    pub fn disable_buffering(&mut self) -> &mut Self {
        self.spec.buffering = Some(false);
        self
    }

    pub fn on_output<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&str, StreamKind, Vec<u8>) + Send + Sync + 'static,
    {
        self.spec.handlers.push(output::handler(f));
        self
    }
}

/// Collects the stages handed to [`Pipeline::start`]'s builder callback.
#[derive(Debug, Default)]
pub struct Pipe {
    steps: Vec<Step>,
}

impl Pipe {
    /// Append a stage running `program` with `args`.
    pub fn command<I, S>(&mut self, program: impl Into<String>, args: I) -> &mut Step
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spec = CommandSpec::new(program);
        spec.args.extend(args.into_iter().map(Into::into));
        self.push(spec)
    }

    /// Append a stage running `script` through the platform shell.
    pub fn shell(&mut self, script: impl AsRef<str>) -> &mut Step {
        self.push(CommandSpec::shell(script.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// `(key, command line)` of every stage, in pipeline order.
    pub fn plan(&self) -> Vec<(Key, String)> {
        self.steps
            .iter()
            .map(|s| (s.key.clone(), s.spec.command_line()))
            .collect()
    }

    fn push(&mut self, spec: CommandSpec) -> &mut Step {
        let key = self.steps.len().to_string();
        self.steps.push(Step { key, spec });
        let last = self.steps.len() - 1;
        &mut self.steps[last]
    }
}

/// Builder for a pipeline. Settings here are defaults for every stage.
///
/// ```no_run
/// # async fn demo() -> procflow::errors::Result<()> {
/// use procflow::pipeline::Pipeline;
///
/// let result = Pipeline::new()
///     .quiet()
///     .run(|pipe| {
///         pipe.command("printf", ["hello"]);
///         pipe.command("tr", ["a-z", "A-Z"]);
///     })
///     .await?;
/// assert_eq!(result.output(), "HELLO");
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct Pipeline {
    defaults: CommandDefaults,
    input: Option<Input>,
    timeout: Option<Duration>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.defaults.path = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.env.push((key.into(), value.into()));
        self
    }

    /// Stdin of the first stage, unless that stage sets its own.
    pub fn input(mut self, input: impl Into<Input>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Deadline shared by all stages. Zero disables it.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn quiet(mut self) -> Self {
        self.defaults.quiet = Some(true);
        self
    }

    pub fn disable_buffering(mut self) -> Self {
        self.defaults.buffering = Some(false);
        self
    }

    /// Output handler added to every stage, alongside any the stage has.
    pub fn on_output<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, StreamKind, Vec<u8>) + Send + Sync + 'static,
    {
        self.defaults.handlers.push(output::handler(f));
        self
    }

    /// Launch every stage and return immediately.
    ///
    /// Either all stages are running on return, or none are: a launch
    /// failure kills the stages already spawned before the error is
    /// returned.
    pub fn start<F>(self, build: F) -> Result<RunningPipeline>
    where
        F: FnOnce(&mut Pipe),
    {
        let mut pipe = Pipe::default();
        build(&mut pipe);
        self.start_steps(pipe.steps)
    }

    /// `start` followed by `wait`.
    pub async fn run<F>(self, build: F) -> Result<ProcessResult>
    where
        F: FnOnce(&mut Pipe),
    {
        let running = self.start(build)?;
        Ok(running.wait().await)
    }

    fn start_steps(self, steps: Vec<Step>) -> Result<RunningPipeline> {
        if steps.is_empty() {
            return Err(ProcflowError::EmptyPipeline);
        }

        let Pipeline {
            defaults,
            mut input,
            timeout,
        } = self;

        let mut launched: Vec<Launched> = Vec::with_capacity(steps.len());
        for (index, mut step) in steps.into_iter().enumerate() {
            step.spec.apply_defaults(&defaults);
            // Per-stage timeouts are not supported; the pipeline deadline
            // covers every stage.
            step.spec.timeout = None;
            if index == 0 && step.spec.input.is_none() {
                step.spec.input = input.take();
            }
            let upstream = index > 0 && step.spec.input.is_none();

            match launch::launch(step.key, step.spec, upstream) {
                Ok(stage) => launched.push(stage),
                Err(e) => {
                    debug!(stage = index, error = %e, "pipeline launch failed; aborting started stages");
                    for stage in launched {
                        stage.abort();
                    }
                    return Err(e);
                }
            }
        }

        let command = launched
            .iter()
            .map(Launched::command)
            .collect::<Vec<_>>()
            .join(" | ");
        let keys = launched
            .iter()
            .map(|stage| stage.key().to_string())
            .collect::<Vec<_>>();
        info!(stages = launched.len(), %command, "pipeline started");

        // Stage i relays into stage i+1 when the latter was launched with an
        // upstream pipe.
        let mut relays: Vec<_> = launched
            .iter_mut()
            .skip(1)
            .map(|stage| stage.take_upstream_stdin())
            .collect();
        relays.push(None);

        let (canceller, cancel) = cancel_pair();
        let deadline = timeout.map(|t| canceller.arm_deadline(t, "pipeline"));

        let stages = launched
            .into_iter()
            .zip(relays)
            .map(|(stage, relay)| stage.supervise(relay, Some(cancel.clone())))
            .collect::<Vec<_>>();

        let (result_tx, result_rx) = watch::channel(None);
        tokio::spawn(running::wait_all(
            stages.clone(),
            command.clone(),
            deadline,
            result_tx,
        ));

        Ok(RunningPipeline::new(keys, stages, command, result_rx))
    }
}
