// src/exec/cancel.rs

//! Shared cancellation for groups of processes (pipeline and pool deadlines).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Sending half: flips every linked [`CancelSignal`] to cancelled.
#[derive(Debug, Clone)]
pub(crate) struct Canceller {
    tx: Arc<watch::Sender<bool>>,
}

/// Receiving half, handed to each supervised process.
#[derive(Debug, Clone)]
pub(crate) struct CancelSignal {
    rx: watch::Receiver<bool>,
}

pub(crate) fn cancel_pair() -> (Canceller, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (Canceller { tx: Arc::new(tx) }, CancelSignal { rx })
}

impl Canceller {
    pub(crate) fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Cancel once `timeout` elapses. The timer is released when the
    /// returned guard is dropped.
    pub(crate) fn arm_deadline(&self, timeout: Duration, scope: &str) -> DeadlineGuard {
        let canceller = self.clone();
        let scope = scope.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            info!(scope = %scope, ?timeout, "deadline reached; cancelling in-flight processes");
            canceller.cancel();
        });
        DeadlineGuard { handle }
    }
}

impl CancelSignal {
    pub(crate) fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled; never resolves if the canceller is dropped
    /// without cancelling.
    pub(crate) async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[derive(Debug)]
pub(crate) struct DeadlineGuard {
    handle: JoinHandle<()>,
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
