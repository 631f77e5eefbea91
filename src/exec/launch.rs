// src/exec/launch.rs

//! Spawning a child and handing it to a supervisor.
//!
//! Launching is split in two so pipelines can spawn every stage first and
//! only then wire stage *i*'s stdout into stage *i+1*'s stdin.

use std::process::Stdio;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{watch, Notify};
use tracing::{debug, info};

use crate::errors::{ProcflowError, Result};
use crate::exec::cancel::CancelSignal;
use crate::exec::platform::{Platform, ProcessControl};
use crate::exec::pump::{spawn_feeder, spawn_pump};
use crate::exec::supervisor::Supervisor;
use crate::output::{OutputBuffer, OutputHandler, StreamSink};
use crate::process::input::Feed;
use crate::process::running::Shared;
use crate::process::spec::CommandSpec;
use crate::process::RunningProcess;
use crate::types::{Key, StreamKind};

/// A spawned child whose streams are not wired up yet.
pub(crate) struct Launched {
    child: Child,
    key: Key,
    upstream: bool,
    command: String,
    feed: Option<Feed>,
    timeout: Option<Duration>,
    quiet: bool,
    handlers: Vec<OutputHandler>,
    stdout: OutputBuffer,
    stderr: OutputBuffer,
}

/// Spawn `spec`.
///
/// With `upstream` set, stdin is a pipe the caller takes through
/// [`Launched::take_upstream_stdin`] and feeds from the previous pipeline stage; the
/// command's own input is ignored.
pub(crate) fn launch(key: Key, spec: CommandSpec, upstream: bool) -> Result<Launched> {
    let command = spec.command_line();
    let quiet = spec.is_quiet();
    let buffering = spec.is_buffering();
    let CommandSpec {
        program,
        args,
        path,
        env,
        input,
        timeout,
        handlers,
        ..
    } = spec;

    let mut cmd = Command::new(&program);
    cmd.args(&args);
    if let Some(dir) = &path {
        cmd.current_dir(dir);
    }
    cmd.envs(env);

    let feed = if upstream {
        cmd.stdin(Stdio::piped());
        None
    } else {
        let (stdio, feed) = input
            .unwrap_or_default()
            .into_stdio()
            .map_err(|source| ProcflowError::Spawn {
                command: command.clone(),
                source,
            })?;
        cmd.stdin(stdio);
        feed
    };

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    Platform::prepare(&mut cmd);

    let child = cmd.spawn().map_err(|source| ProcflowError::Spawn {
        command: command.clone(),
        source,
    })?;

    info!(
        key = %key,
        pid = child.id(),
        cmd = %command,
        "process started"
    );

    Ok(Launched {
        child,
        key,
        upstream,
        command,
        feed,
        timeout,
        quiet,
        handlers,
        stdout: OutputBuffer::new(buffering),
        stderr: OutputBuffer::new(buffering),
    })
}

impl Launched {
    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn command(&self) -> &str {
        &self.command
    }

    /// The stdin pipe reserved for the previous pipeline stage. `None`
    /// unless launched with `upstream`.
    pub(crate) fn take_upstream_stdin(&mut self) -> Option<ChildStdin> {
        if self.upstream {
            self.child.stdin.take()
        } else {
            None
        }
    }

    /// Force-kill a child that will never be supervised. Tokio reaps it in
    /// the background once dropped.
    pub(crate) fn abort(mut self) {
        debug!(key = %self.key, pid = self.child.id(), "aborting launched process");
        let _ = self.child.start_kill();
    }

    /// Wire the streams and hand the child to a supervisor task.
    ///
    /// `relay` receives a copy of stdout (next pipeline stage); `cancel`
    /// links the process to a pipeline or pool deadline.
    pub(crate) fn supervise(
        mut self,
        relay: Option<ChildStdin>,
        cancel: Option<CancelSignal>,
    ) -> RunningProcess {
        let pid = self.child.id();

        let mut pumps = Vec::with_capacity(2);
        if let Some(out) = self.child.stdout.take() {
            let sink = StreamSink::new(
                self.key.clone(),
                StreamKind::Stdout,
                self.stdout.clone(),
                self.quiet,
                self.handlers.clone(),
            );
            pumps.push(spawn_pump(out, sink, relay));
        }
        if let Some(err) = self.child.stderr.take() {
            let sink = StreamSink::new(
                self.key.clone(),
                StreamKind::Stderr,
                self.stderr.clone(),
                self.quiet,
                self.handlers.clone(),
            );
            pumps.push(spawn_pump(err, sink, None));
        }

        let feeder = match (self.feed.take(), self.child.stdin.take()) {
            (Some(feed), Some(stdin)) => Some(spawn_feeder(feed, stdin)),
            _ => None,
        };

        let kill = Arc::new(Notify::new());
        let exited = Arc::new(AtomicBool::new(false));
        let (result_tx, result_rx) = watch::channel(None);

        let supervisor = Supervisor {
            child: self.child,
            key: self.key.clone(),
            command: self.command.clone(),
            timeout: self.timeout,
            cancel,
            kill: Arc::clone(&kill),
            exited: Arc::clone(&exited),
            pumps,
            feeder,
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
            result_tx,
        };
        tokio::spawn(supervisor.run());

        RunningProcess::from_shared(Shared {
            key: self.key,
            command: self.command,
            pid,
            stdout: self.stdout,
            stderr: self.stderr,
            kill,
            exited,
            result_rx,
            waited: AtomicBool::new(false),
        })
    }
}
