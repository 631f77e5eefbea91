// src/exec/platform/mod.rs

//! OS-specific process control.
//!
//! Everything that differs between POSIX and Windows sits behind
//! [`ProcessControl`]. Callers use the portable `RunningProcess` contract and
//! never see native signal types. Force-kill is not part of the trait: it
//! goes through the supervisor (`Child::start_kill`) on every platform.

use std::process::ExitStatus;

use tokio::process::Command;

use crate::errors::Result;
use crate::types::Signal;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub(crate) use unix::Platform;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub(crate) use windows::Platform;

/// Outcome of a signal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// The OS accepted the signal.
    Sent,
    /// No native equivalent; the caller must force-kill instead.
    RequiresKill,
}

pub(crate) trait ProcessControl {
    /// Whether a process with this PID currently exists.
    fn probe_liveness(pid: u32) -> bool;

    fn deliver_signal(pid: u32, signal: Signal) -> Result<Delivery>;

    /// Platform tweaks applied to every command before spawn.
    fn prepare(cmd: &mut Command);

    /// Map an exit status to the integer reported in results.
    fn exit_code(status: ExitStatus) -> i32;

    /// Signal sent first by `stop`.
    fn graceful_signal() -> Signal {
        Signal::Terminate
    }
}
