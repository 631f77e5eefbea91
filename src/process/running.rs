// src/process/running.rs

//! Live handle to one supervised OS process.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tracing::{debug, warn};

use crate::errors::{ProcflowError, Result};
use crate::exec::platform::{Delivery, Platform, ProcessControl};
use crate::output::OutputBuffer;
use crate::process::ProcessResult;
use crate::types::{Key, Signal};

/// Where a process is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Started and not yet reaped.
    Running,
    /// Reaped by its supervisor; nobody has called `wait` yet.
    Exited,
    /// `wait` has returned the memoized result at least once.
    Waited,
}

pub(crate) struct Shared {
    pub(crate) key: Key,
    pub(crate) command: String,
    pub(crate) pid: Option<u32>,
    pub(crate) stdout: OutputBuffer,
    pub(crate) stderr: OutputBuffer,
    /// Wakes the supervisor to force-kill the child.
    pub(crate) kill: Arc<Notify>,
    /// Set by the supervisor once the child has been reaped.
    pub(crate) exited: Arc<AtomicBool>,
    pub(crate) result_rx: watch::Receiver<Option<ProcessResult>>,
    pub(crate) waited: AtomicBool,
}

/// Handle returned by `Process::start`.
///
/// Clones share the same process. The child is owned and reaped by a
/// background supervisor task; this handle only observes and signals it.
#[derive(Clone)]
pub struct RunningProcess {
    inner: Arc<Shared>,
}

impl fmt::Debug for RunningProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningProcess")
            .field("key", &self.inner.key)
            .field("command", &self.inner.command)
            .field("pid", &self.inner.pid)
            .field("state", &self.state())
            .finish()
    }
}

impl RunningProcess {
    pub(crate) fn from_shared(shared: Shared) -> Self {
        Self {
            inner: Arc::new(shared),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.inner.pid
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn command(&self) -> &str {
        &self.inner.command
    }

    pub fn state(&self) -> ProcessState {
        if self.inner.waited.load(Ordering::Acquire) {
            ProcessState::Waited
        } else if self.has_exited() {
            ProcessState::Exited
        } else {
            ProcessState::Running
        }
    }

    /// Probe the OS for the process.
    ///
    /// Returns `false` once the supervisor has reaped the child, so a
    /// recycled PID is never mistaken for this process.
    pub fn is_running(&self) -> bool {
        if self.has_exited() {
            return false;
        }
        self.inner.pid.is_some_and(Platform::probe_liveness)
    }

    /// Full stdout capture so far.
    pub fn output(&self) -> String {
        self.inner.stdout.contents()
    }

    /// Full stderr capture so far.
    pub fn error_output(&self) -> String {
        self.inner.stderr.contents()
    }

    /// Last few KiB of stdout, maintained even when buffering is disabled.
    pub fn latest_output(&self) -> String {
        self.inner.stdout.latest()
    }

    pub fn latest_error_output(&self) -> String {
        self.inner.stderr.latest()
    }

    /// Deliver `signal` to the process.
    ///
    /// On platforms without a native equivalent the process is force-killed.
    pub fn signal(&self, signal: Signal) -> Result<()> {
        let pid = self
            .inner
            .pid
            .ok_or_else(|| ProcflowError::NotStarted(self.inner.command.clone()))?;
        if self.has_exited() {
            return Err(ProcflowError::AlreadyExited { pid });
        }

        debug!(key = %self.inner.key, pid, %signal, "delivering signal");
        match Platform::deliver_signal(pid, signal)? {
            Delivery::Sent => Ok(()),
            Delivery::RequiresKill => self.kill(),
        }
    }

    /// Force-kill the process.
    pub fn kill(&self) -> Result<()> {
        if self.has_exited() {
            let pid = self.inner.pid.unwrap_or_default();
            return Err(ProcflowError::AlreadyExited { pid });
        }
        self.inner.kill.notify_one();
        Ok(())
    }

    /// Graceful stop with the platform's default termination signal.
    pub async fn stop(&self, timeout: Duration) -> Result<()> {
        self.stop_with(timeout, Platform::graceful_signal()).await
    }

    /// Send `signal`, give the process `timeout` to exit, then force-kill.
    ///
    /// Stopping a process that already exited is a no-op.
    pub async fn stop_with(&self, timeout: Duration, signal: Signal) -> Result<()> {
        if self.has_exited() {
            return Ok(());
        }

        match self.signal(signal) {
            Ok(()) => {}
            Err(ProcflowError::AlreadyExited { .. }) => return Ok(()),
            Err(e) => {
                warn!(
                    key = %self.inner.key,
                    pid = self.inner.pid,
                    error = %e,
                    "graceful signal failed; force killing"
                );
                self.inner.kill.notify_one();
                return Err(e);
            }
        }

        if tokio::time::timeout(timeout, self.wait_for_result()).await.is_err() {
            warn!(
                key = %self.inner.key,
                pid = self.inner.pid,
                ?timeout,
                "process did not exit after {signal}; force killing"
            );
            self.inner.kill.notify_one();
            self.wait_for_result().await;
        }
        Ok(())
    }

    /// Wait for the process to exit and return its result.
    ///
    /// Idempotent: every call returns the same memoized result.
    pub async fn wait(&self) -> ProcessResult {
        let result = self.wait_for_result().await;
        self.inner.waited.store(true, Ordering::Release);
        result
    }

    /// The result, if the process has already been reaped.
    pub fn try_result(&self) -> Option<ProcessResult> {
        self.inner.result_rx.borrow().clone()
    }

    pub fn is_done(&self) -> bool {
        self.inner.result_rx.borrow().is_some()
    }

    pub(crate) fn has_exited(&self) -> bool {
        self.inner.exited.load(Ordering::Acquire)
    }

    async fn wait_for_result(&self) -> ProcessResult {
        let mut rx = self.inner.result_rx.clone();
        let published = match rx.wait_for(Option::is_some).await {
            Ok(slot) => (*slot).clone(),
            Err(_) => None,
        };

        // The supervisor always publishes before exiting; if it vanished
        // without doing so, report that rather than hang.
        published.unwrap_or_else(|| {
            ProcessResult::unavailable(
                self.inner.command.clone(),
                "process record missing: supervisor ended without reporting a result",
            )
        })
    }
}
