// src/exec/platform/unix.rs

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use nix::errno::Errno;
use nix::sys::signal::{self, Signal as NixSignal};
use nix::unistd::Pid;
use tokio::process::Command;

use super::{Delivery, ProcessControl};
use crate::errors::{ProcflowError, Result};
use crate::process::EXIT_CODE_UNAVAILABLE;
use crate::types::Signal;

/// POSIX signals via `kill(2)`.
pub(crate) struct Platform;

fn native(signal: Signal) -> NixSignal {
    match signal {
        Signal::Interrupt => NixSignal::SIGINT,
        Signal::Terminate => NixSignal::SIGTERM,
        Signal::Kill => NixSignal::SIGKILL,
        Signal::Hangup => NixSignal::SIGHUP,
        Signal::Quit => NixSignal::SIGQUIT,
        Signal::User1 => NixSignal::SIGUSR1,
        Signal::User2 => NixSignal::SIGUSR2,
    }
}

impl ProcessControl for Platform {
    fn probe_liveness(pid: u32) -> bool {
        // Signal 0 performs the permission and existence checks only.
        match signal::kill(Pid::from_raw(pid as i32), Option::<NixSignal>::None) {
            Ok(()) => true,
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    fn deliver_signal(pid: u32, sig: Signal) -> Result<Delivery> {
        signal::kill(Pid::from_raw(pid as i32), native(sig)).map_err(|errno| match errno {
            Errno::ESRCH => ProcflowError::AlreadyExited { pid },
            other => ProcflowError::Signal {
                pid,
                signal: sig,
                reason: other.desc().to_string(),
            },
        })?;
        Ok(Delivery::Sent)
    }

    fn prepare(_cmd: &mut Command) {}

    fn exit_code(status: ExitStatus) -> i32 {
        // Killed by signal N is reported as 128 + N, like a shell does.
        status
            .code()
            .or_else(|| status.signal().map(|sig| 128 + sig))
            .unwrap_or(EXIT_CODE_UNAVAILABLE)
    }
}
