// src/pool/running.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::errors::{first_error, Result};
use crate::exec::cancel::DeadlineGuard;
use crate::exec::platform::{Platform, ProcessControl};
use crate::process::{ProcessResult, RunningProcess};
use crate::types::{Key, Signal};

type Results = HashMap<Key, ProcessResult>;

/// Members currently running, by submission position, plus the flag that
/// keeps workers from starting queued members after a stop.
#[derive(Clone, Default)]
pub(super) struct LiveMembers {
    inner: Arc<Mutex<HashMap<usize, RunningProcess>>>,
    halted: Arc<AtomicBool>,
}

impl LiveMembers {
    pub(super) fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    fn halt(&self) {
        self.halted.store(true, Ordering::Release);
    }

    pub(super) fn insert(&self, position: usize, process: RunningProcess) {
        self.lock().insert(position, process);
    }

    pub(super) fn remove(&self, position: usize) {
        self.lock().remove(&position);
    }

    fn snapshot(&self) -> Vec<RunningProcess> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<usize, RunningProcess>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Gather one result per member, then publish the map.
///
/// Results are inserted in arrival order, so when keys collide the member
/// that finished last wins.
pub(super) async fn collect(
    total: usize,
    mut rx: mpsc::UnboundedReceiver<(Key, ProcessResult)>,
    workers: Vec<JoinHandle<()>>,
    deadline: Option<DeadlineGuard>,
    results_tx: watch::Sender<Option<Results>>,
) {
    let mut results = Results::with_capacity(total);
    let mut received = 0usize;
    while received < total {
        let Some((key, result)) = rx.recv().await else {
            break;
        };
        received += 1;
        if results.insert(key.clone(), result).is_some() {
            warn!(key = %key, "duplicate pool key; keeping the later result");
        }
    }

    for worker in workers {
        if let Err(e) = worker.await {
            warn!(error = %e, "pool worker ended abnormally");
        }
    }
    drop(deadline);

    if received < total {
        warn!(received, total, "pool finished with missing results");
    }
    let failed = results.values().filter(|r| r.failed()).count();
    info!(members = total, failed, "pool finished");
    results_tx.send_replace(Some(results));
}

/// Handle returned by `Pool::start`.
#[derive(Clone)]
pub struct RunningPool {
    live: LiveMembers,
    results_rx: watch::Receiver<Option<Results>>,
}

impl fmt::Debug for RunningPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningPool")
            .field("live", &self.live.snapshot().len())
            .field("done", &self.is_done())
            .finish()
    }
}

impl RunningPool {
    pub(super) fn new(live: LiveMembers, results_rx: watch::Receiver<Option<Results>>) -> Self {
        Self { live, results_rx }
    }

    /// Key to PID of every member currently running.
    pub fn pids(&self) -> HashMap<Key, u32> {
        self.live
            .snapshot()
            .into_iter()
            .map(|p| (p.key().to_string(), p.pid().unwrap_or(0)))
            .collect()
    }

    /// Handles of the members currently running.
    pub fn members(&self) -> Vec<RunningProcess> {
        self.live.snapshot()
    }

    /// True until every member has finished and been collected.
    pub fn is_running(&self) -> bool {
        !self.is_done()
    }

    pub fn is_done(&self) -> bool {
        self.results_rx.borrow().is_some()
    }

    pub async fn done(&self) {
        let mut rx = self.results_rx.clone();
        let _ = rx.wait_for(Option::is_some).await;
    }

    /// Key to result for every member. Idempotent.
    pub async fn wait(&self) -> HashMap<Key, ProcessResult> {
        let mut rx = self.results_rx.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(slot) => (*slot).clone().unwrap_or_default(),
            Err(_) => HashMap::new(),
        }
    }

    pub fn try_results(&self) -> Option<HashMap<Key, ProcessResult>> {
        self.results_rx.borrow().clone()
    }

    /// Signal every running member; the first error is returned.
    pub fn signal(&self, signal: Signal) -> Result<()> {
        first_error(self.live.snapshot().iter().map(|p| p.signal(signal)))
    }

    pub async fn stop(&self, timeout: Duration) -> Result<()> {
        self.stop_with(timeout, Platform::graceful_signal()).await
    }

    /// Stop every running member concurrently. Members still queued are
    /// never started and are reported as failed.
    pub async fn stop_with(&self, timeout: Duration, signal: Signal) -> Result<()> {
        self.live.halt();
        let stops = self
            .live
            .snapshot()
            .into_iter()
            .map(|p| tokio::spawn(async move { p.stop_with(timeout, signal).await }))
            .collect::<Vec<_>>();

        let mut outcomes = Vec::with_capacity(stops.len());
        for stop in stops {
            outcomes.push(match stop.await {
                Ok(res) => res,
                Err(join) => Err(anyhow::Error::from(join).into()),
            });
        }
        first_error(outcomes)
    }
}
