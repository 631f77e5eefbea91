// src/exec/platform/windows.rs

use std::io;
use std::process::ExitStatus;

use tokio::process::Command;
use windows_sys::Win32::Foundation::{CloseHandle, STILL_ACTIVE};
use windows_sys::Win32::System::Console::{CTRL_BREAK_EVENT, GenerateConsoleCtrlEvent};
use windows_sys::Win32::System::Threading::{
    CREATE_NEW_PROCESS_GROUP, GetExitCodeProcess, OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION,
};

use super::{Delivery, ProcessControl};
use crate::errors::{ProcflowError, Result};
use crate::process::EXIT_CODE_UNAVAILABLE;
use crate::types::Signal;

/// Console control events for `Interrupt`, hard kill for everything else.
///
/// Children are started in their own process group so that
/// `CTRL_BREAK_EVENT` reaches only them.
pub(crate) struct Platform;

impl ProcessControl for Platform {
    fn probe_liveness(pid: u32) -> bool {
        // SAFETY: the handle is checked for null and closed before returning.
        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
            if handle.is_null() {
                return false;
            }
            let mut code: u32 = 0;
            let ok = GetExitCodeProcess(handle, &mut code);
            CloseHandle(handle);
            ok != 0 && code == STILL_ACTIVE as u32
        }
    }

    fn deliver_signal(pid: u32, signal: Signal) -> Result<Delivery> {
        match signal {
            Signal::Interrupt => {
                // SAFETY: plain FFI call with integer arguments.
                let ok = unsafe { GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, pid) };
                if ok == 0 {
                    return Err(ProcflowError::Signal {
                        pid,
                        signal,
                        reason: io::Error::last_os_error().to_string(),
                    });
                }
                Ok(Delivery::Sent)
            }
            _ => Ok(Delivery::RequiresKill),
        }
    }

    fn prepare(cmd: &mut Command) {
        cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
    }

    fn exit_code(status: ExitStatus) -> i32 {
        status.code().unwrap_or(EXIT_CODE_UNAVAILABLE)
    }
}
