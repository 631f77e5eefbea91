// src/pool/builder.rs

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::errors::{ProcflowError, Result};
use crate::exec::cancel::{cancel_pair, CancelSignal};
use crate::exec::launch;
use crate::output;
use crate::pool::running::{self, LiveMembers, RunningPool};
use crate::pool::strategy::{execution_order, PriorityFirst, Schedulable, Strategy};
use crate::process::spec::{CommandDefaults, CommandSpec};
use crate::process::{Input, ProcessResult};
use crate::types::{Key, Priority, StrategyKind, StreamKind};

/// One member of a pool.
#[derive(Debug)]
pub struct PoolCommand {
    key: Key,
    priority: Priority,
    spec: CommandSpec,
}

impl PoolCommand {
    /// Override the result-map key (defaults to the submission position).
    pub fn key(&mut self, key: impl Into<Key>) -> &mut Self {
        self.key = key.into();
        self
    }

    pub fn priority(&mut self, priority: Priority) -> &mut Self {
        self.priority = priority;
        self
    }

    /// Per-member timeout. Zero disables it.
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.spec.set_timeout(timeout);
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

/// Collects the members handed to [`Pool::start`]'s builder callback.
#[derive(Debug, Default)]
pub struct PoolBuilder {
    commands: Vec<PoolCommand>,
}

impl PoolBuilder {
    pub fn command<I, S>(&mut self, program: impl Into<String>, args: I) -> &mut PoolCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spec = CommandSpec::new(program);
        spec.args.extend(args.into_iter().map(Into::into));
        self.push(spec)
    }

    pub fn shell(&mut self, script: impl AsRef<str>) -> &mut PoolCommand {
        self.push(CommandSpec::shell(script.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    fn push(&mut self, spec: CommandSpec) -> &mut PoolCommand {
        let key = self.commands.len().to_string();
        self.commands.push(PoolCommand {
            key,
            priority: Priority::default(),
            spec,
        });
        let last = self.commands.len() - 1;
        &mut self.commands[last]
    }
}

struct Job {
    position: usize,
    key: Key,
    spec: CommandSpec,
}

/// Builder for a pool of independent processes.
///
/// ```no_run
/// # async fn demo() -> procflow::errors::Result<()> {
/// use procflow::pool::Pool;
///
/// let results = Pool::new()
///     .concurrency(2)
///     .quiet()
///     .run(|pool| {
///         pool.shell("exit 0").key("a");
///         pool.shell("exit 3").key("b");
///     })
///     .await?;
/// assert_eq!(results["b"].exit_code(), 3);
/// # Ok(())
/// # }
/// ```
pub struct Pool {
    concurrency: usize,
    timeout: Option<Duration>,
    strategy: Box<dyn Strategy>,
    defaults: CommandDefaults,
}

impl Default for Pool {
    fn default() -> Self {
        Self {
            concurrency: 0,
            timeout: None,
            strategy: Box::new(PriorityFirst),
            defaults: CommandDefaults::default(),
        }
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("concurrency", &self.concurrency)
            .field("timeout", &self.timeout)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl Pool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum number of members running at once. Zero, or anything above
    /// the member count, means one worker per member.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Deadline for the whole pool. Zero disables it.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn strategy<S>(mut self, strategy: S) -> Self
    where
        S: Strategy + 'static,
    {
        self.strategy = Box::new(strategy);
        self
    }

    pub fn strategy_kind(mut self, kind: StrategyKind) -> Self {
        self.strategy = kind.into();
        self
    }

    pub fn path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.defaults.path = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.env.push((key.into(), value.into()));
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

    /// Output handler added to every member, alongside its own.
    pub fn on_output<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, StreamKind, Vec<u8>) + Send + Sync + 'static,
    {
        self.defaults.handlers.push(output::handler(f));
        self
    }

    /// `(key, command line)` of every member, in the order workers will
    /// pick them up. Nothing is spawned.
    pub fn plan<F>(&self, build: F) -> Vec<(Key, String)>
    where
        F: FnOnce(&mut PoolBuilder),
    {
        let mut builder = PoolBuilder::default();
        build(&mut builder);
        self.plan_commands(&builder.commands)
    }

    /// Queue every member and return immediately.
    ///
    /// Launch failures of individual members do not fail the pool; they are
    /// reported as results with exit code -1.
    pub fn start<F>(self, build: F) -> Result<RunningPool>
    where
        F: FnOnce(&mut PoolBuilder),
    {
        let mut builder = PoolBuilder::default();
        build(&mut builder);
        self.start_commands(builder.commands)
    }

    pub async fn run<F>(self, build: F) -> Result<HashMap<Key, ProcessResult>>
    where
        F: FnOnce(&mut PoolBuilder),
    {
        let running = self.start(build)?;
        Ok(running.wait().await)
    }

    fn order(&self, commands: &[PoolCommand]) -> Vec<usize> {
        let items = commands
            .iter()
            .enumerate()
            .map(|(pos, c)| Schedulable::new(c.key.clone(), c.spec.timeout, c.priority, pos))
            .collect();
        execution_order(self.strategy.as_ref(), items)
    }

    fn plan_commands(&self, commands: &[PoolCommand]) -> Vec<(Key, String)> {
        self.order(commands)
            .into_iter()
            .map(|pos| (commands[pos].key.clone(), commands[pos].spec.command_line()))
            .collect()
    }

    fn start_commands(self, commands: Vec<PoolCommand>) -> Result<RunningPool> {
        if commands.is_empty() {
            return Err(ProcflowError::EmptyPool);
        }

        let total = commands.len();
        let workers = if self.concurrency == 0 || self.concurrency > total {
            total
        } else {
            self.concurrency
        };

        let order = self.order(&commands);
        let mut slots = commands.into_iter().map(Some).collect::<Vec<_>>();
        let queue = order
            .into_iter()
            .filter_map(|pos| slots[pos].take().map(|c| (pos, c)))
            .map(|(position, mut c)| {
                c.spec.apply_defaults(&self.defaults);
                Job {
                    position,
                    key: c.key,
                    spec: c.spec,
                }
            })
            .collect::<VecDeque<_>>();
        let queue = Arc::new(Mutex::new(queue));

        info!(members = total, workers, timeout = ?self.timeout, "pool started");

        let (canceller, cancel) = cancel_pair();
        let deadline = self.timeout.map(|t| canceller.arm_deadline(t, "pool"));

        let live = LiveMembers::default();
        let (tx, rx) = mpsc::unbounded_channel();
        let handles = (0..workers)
            .map(|worker| {
                tokio::spawn(work(
                    worker,
                    Arc::clone(&queue),
                    cancel.clone(),
                    live.clone(),
                    tx.clone(),
                ))
            })
            .collect::<Vec<_>>();
        drop(tx);

        let (results_tx, results_rx) = watch::channel(None);
        tokio::spawn(running::collect(total, rx, handles, deadline, results_tx));

        Ok(RunningPool::new(live, results_rx))
    }
}

async fn work(
    worker: usize,
    queue: Arc<Mutex<VecDeque<Job>>>,
    cancel: CancelSignal,
    live: LiveMembers,
    tx: mpsc::UnboundedSender<(Key, ProcessResult)>,
) {
    loop {
        let job = queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let Some(Job {
            position,
            key,
            spec,
        }) = job
        else {
            break;
        };

        let command = spec.command_line();
        let result = if cancel.is_cancelled() {
            debug!(worker, key = %key, "pool deadline passed; not starting");
            ProcessResult::unavailable(command, "pool deadline expired before the command started")
                .with_timed_out(true)
        } else if live.is_halted() {
            debug!(worker, key = %key, "pool stopped; not starting");
            ProcessResult::unavailable(command, "pool stopped before the command started")
        } else {
            match launch::launch(key.clone(), spec, false) {
                Ok(launched) => {
                    let running = launched.supervise(None, Some(cancel.clone()));
                    live.insert(position, running.clone());
                    if live.is_halted() {
                        let _ = running.kill();
                    }
                    let result = running.wait().await;
                    live.remove(position);
                    result
                }
                Err(e) => {
                    debug!(worker, key = %key, error = %e, "pool member failed to start");
                    ProcessResult::unavailable(command, e.to_string())
                }
            }
        };

        if tx.send((key, result)).is_err() {
            break;
        }
    }
    debug!(worker, "pool worker finished");
}
