// src/errors.rs

//! Crate-wide error type.
//!
//! Only structural misuse and launch/signal failures are errors. A process
//! that ran and failed (non-zero exit, timeout, killed by a signal) is a
//! normal outcome and is reported through
//! [`ProcessResult`](crate::process::ProcessResult) instead.

use thiserror::Error;

use crate::types::Signal;

#[derive(Error, Debug)]
pub enum ProcflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("pipeline must have at least one command")]
    EmptyPipeline,

    #[error("pool must have at least one command")]
    EmptyPool,

    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("process '{0}' was never started")]
    NotStarted(String),

    #[error("process {pid} has already exited")]
    AlreadyExited { pid: u32 },

    #[error("failed to deliver {signal} to process {pid}: {reason}")]
    Signal {
        pid: u32,
        signal: Signal,
        reason: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ProcflowError>;

/// Drain `results`, returning the first error seen.
pub(crate) fn first_error(results: impl IntoIterator<Item = Result<()>>) -> Result<()> {
    let mut first = None;
    for res in results {
        if let Err(e) = res {
            first.get_or_insert(e);
        }
    }
    first.map_or(Ok(()), Err)
}
