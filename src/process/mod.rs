// src/process/mod.rs

//! A single external process: builder, live handle and final result.

pub(crate) mod input;
pub(crate) mod result;
pub(crate) mod running;
pub(crate) mod spec;

pub use input::Input;
pub use result::{ProcessResult, EXIT_CODE_UNAVAILABLE};
pub use running::{ProcessState, RunningProcess};
pub use spec::Process;
