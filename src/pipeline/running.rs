// src/pipeline/running.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use crate::errors::{first_error, Result};
use crate::exec::cancel::DeadlineGuard;
use crate::exec::platform::{Platform, ProcessControl};
use crate::process::{ProcessResult, RunningProcess};
use crate::types::{Key, Signal};

/// Wait on every stage in order, then publish the pipeline's result.
pub(super) async fn wait_all(
    stages: Vec<RunningProcess>,
    command: String,
    deadline: Option<DeadlineGuard>,
    result_tx: watch::Sender<Option<ProcessResult>>,
) {
    let mut timed_out = false;
    let mut last = None;
    for stage in &stages {
        let result = stage.wait().await;
        timed_out |= result.timed_out();
        last = Some(result);
    }
    drop(deadline);

    let result = match last {
        Some(result) => result.with_command(command).with_timed_out(timed_out),
        None => ProcessResult::unavailable(command, "pipeline had no stages"),
    };
    info!(
        exit_code = result.exit_code(),
        timed_out = result.timed_out(),
        "pipeline finished"
    );
    result_tx.send_replace(Some(result));
}

/// Handle returned by `Pipeline::start`.
#[derive(Clone)]
pub struct RunningPipeline {
    inner: Arc<Inner>,
}

struct Inner {
    keys: Vec<Key>,
    stages: Vec<RunningProcess>,
    command: String,
    result_rx: watch::Receiver<Option<ProcessResult>>,
}

impl fmt::Debug for RunningPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningPipeline")
            .field("command", &self.inner.command)
            .field("stages", &self.inner.stages.len())
            .field("done", &self.is_done())
            .finish()
    }
}

impl RunningPipeline {
    pub(super) fn new(
        keys: Vec<Key>,
        stages: Vec<RunningProcess>,
        command: String,
        result_rx: watch::Receiver<Option<ProcessResult>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                keys,
                stages,
                command,
                result_rx,
            }),
        }
    }

    /// The whole pipeline, stages joined with `" | "`.
    pub fn command(&self) -> &str {
        &self.inner.command
    }

    /// Per-stage handles, in pipeline order.
    pub fn stages(&self) -> &[RunningProcess] {
        &self.inner.stages
    }

    /// Stage key to PID; 0 for a stage without an OS PID.
    pub fn pids(&self) -> HashMap<Key, u32> {
        self.inner
            .keys
            .iter()
            .cloned()
            .zip(self.inner.stages.iter().map(|s| s.pid().unwrap_or(0)))
            .collect()
    }

    /// True while any stage is alive.
    pub fn is_running(&self) -> bool {
        self.inner.stages.iter().any(RunningProcess::is_running)
    }

    pub fn is_done(&self) -> bool {
        self.inner.result_rx.borrow().is_some()
    }

    /// Resolves once every stage has exited and been reaped.
    pub async fn done(&self) {
        let mut rx = self.inner.result_rx.clone();
        let _ = rx.wait_for(Option::is_some).await;
    }

    /// Result of the last stage, with the whole pipeline as its command.
    ///
    /// Idempotent.
    pub async fn wait(&self) -> ProcessResult {
        let mut rx = self.inner.result_rx.clone();
        let published = match rx.wait_for(Option::is_some).await {
            Ok(slot) => (*slot).clone(),
            Err(_) => None,
        };
        published.unwrap_or_else(|| {
            ProcessResult::unavailable(
                self.inner.command.clone(),
                "process record missing: pipeline waiter ended without reporting a result",
            )
        })
    }

    pub fn try_result(&self) -> Option<ProcessResult> {
        self.inner.result_rx.borrow().clone()
    }

    /// Signal every live stage. Delivery continues past failures; the first
    /// error is returned.
    pub fn signal(&self, signal: Signal) -> Result<()> {
        first_error(
            self.inner
                .stages
                .iter()
                .filter(|s| !s.has_exited())
                .map(|s| s.signal(signal)),
        )
    }

    pub async fn stop(&self, timeout: Duration) -> Result<()> {
        self.stop_with(timeout, Platform::graceful_signal()).await
    }

    /// Stop every stage concurrently with `signal`, force-killing whatever
    /// is left after `timeout`.
    pub async fn stop_with(&self, timeout: Duration, signal: Signal) -> Result<()> {
        let stops = self
            .inner
            .stages
            .iter()
            .map(|s| {
                let s = s.clone();
                tokio::spawn(async move { s.stop_with(timeout, signal).await })
            })
            .collect::<Vec<_>>();

        let mut outcomes = Vec::with_capacity(stops.len());
        for stop in stops {
            outcomes.push(match stop.await {
                Ok(res) => res,
                Err(join) => Err(anyhow::Error::from(join).into()),
            });
        }
        first_error(outcomes.into_iter())
    }
}
