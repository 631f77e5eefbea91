// src/exec/supervisor.rs

//! The task that owns a child from spawn to reap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::exec::cancel::CancelSignal;
use crate::exec::platform::{Platform, ProcessControl};
use crate::output::OutputBuffer;
use crate::process::{ProcessResult, EXIT_CODE_UNAVAILABLE};
use crate::types::Key;

/// How long pumps may keep draining after a forced exit. A grandchild that
/// inherited the pipe can hold it open indefinitely.
const PUMP_DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Natural,
    Killed,
    TimedOut,
}

pub(crate) struct Supervisor {
    pub(crate) child: Child,
    pub(crate) key: Key,
    pub(crate) command: String,
    pub(crate) timeout: Option<Duration>,
    pub(crate) cancel: Option<CancelSignal>,
    pub(crate) kill: Arc<Notify>,
    pub(crate) exited: Arc<AtomicBool>,
    pub(crate) pumps: Vec<JoinHandle<()>>,
    pub(crate) feeder: Option<JoinHandle<()>>,
    pub(crate) stdout: OutputBuffer,
    pub(crate) stderr: OutputBuffer,
    pub(crate) result_tx: watch::Sender<Option<ProcessResult>>,
}

impl Supervisor {
    pub(crate) async fn run(mut self) {
        let pid = self.child.id();
        let deadline = self.timeout;
        let mut cancel = self.cancel.take();

        let (status, how) = tokio::select! {
            status = self.child.wait() => (status, Exit::Natural),
            _ = self.kill.notified() => {
                debug!(key = %self.key, pid, "kill requested");
                (self.force_kill().await, Exit::Killed)
            }
            _ = sleep_or_forever(deadline) => {
                info!(key = %self.key, pid, timeout = ?deadline, "process timed out; killing");
                (self.force_kill().await, Exit::TimedOut)
            }
            _ = cancelled_or_forever(cancel.as_mut()) => {
                info!(key = %self.key, pid, "cancelled by group deadline; killing");
                (self.force_kill().await, Exit::TimedOut)
            }
        };

        self.exited.store(true, Ordering::Release);

        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }

        let panic = self.drain_pumps(how != Exit::Natural).await;

        let exit_code = match status {
            Ok(status) => Platform::exit_code(status),
            Err(e) => {
                warn!(key = %self.key, pid, error = %e, "failed to reap process");
                EXIT_CODE_UNAVAILABLE
            }
        };

        let mut result = ProcessResult::new(
            exit_code,
            self.command.clone(),
            self.stdout.contents(),
            self.stderr.contents(),
            how == Exit::TimedOut,
        );
        if let Some(message) = panic {
            result = result.with_diagnostic(&format!("output handler panicked: {message}"));
        }

        info!(
            key = %self.key,
            pid,
            exit_code = result.exit_code(),
            timed_out = result.timed_out(),
            "process exited"
        );

        self.result_tx.send_replace(Some(result));
    }

    async fn force_kill(&mut self) -> std::io::Result<std::process::ExitStatus> {
        if let Err(e) = self.child.start_kill() {
            debug!(key = %self.key, error = %e, "start_kill failed; process may have exited");
        }
        self.child.wait().await
    }

    /// Join the stream pumps. Returns the panic message of a pump whose
    /// output handler panicked.
    async fn drain_pumps(&mut self, forced: bool) -> Option<String> {
        let mut panic = None;
        for mut pump in std::mem::take(&mut self.pumps) {
            let joined = if forced {
                match tokio::time::timeout(PUMP_DRAIN_GRACE, &mut pump).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        debug!(key = %self.key, "stream still open after kill; abandoning");
                        pump.abort();
                        continue;
                    }
                }
            } else {
                pump.await
            };

            if let Err(e) = joined {
                if e.is_panic() {
                    let payload = e.into_panic();
                    let message = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    warn!(key = %self.key, %message, "output handler panicked");
                    panic.get_or_insert(message);
                }
            }
        }
        panic
    }
}

async fn sleep_or_forever(timeout: Option<Duration>) {
    match timeout {
        Some(t) => tokio::time::sleep(t).await,
        None => std::future::pending().await,
    }
}

async fn cancelled_or_forever(cancel: Option<&mut CancelSignal>) {
    match cancel {
        Some(signal) => signal.cancelled().await,
        None => std::future::pending().await,
    }
}
