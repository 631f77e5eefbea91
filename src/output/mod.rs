// src/output/mod.rs

//! Output routing for child process streams.
//!
//! Raw bytes read from a child's stdout/stderr flow through a
//! [`StreamSink`], which fans each chunk out to:
//! - an [`OutputBuffer`] (full capture plus a bounded tail window),
//! - the controlling terminal, unless the process is quiet,
//! - a [`LineWriter`] that re-segments the stream into lines and hands each
//!   line to the registered [`OutputHandler`]s.

pub mod capture;
pub mod lines;
pub mod sink;

use std::sync::Arc;

use crate::types::StreamKind;

pub use capture::{OutputBuffer, LATEST_OUTPUT_WINDOW};
pub use lines::LineWriter;
pub use sink::StreamSink;

/// Callback invoked once per output line with `(key, stream, line)`.
///
/// The line is an owned copy without its trailing `\n`; handlers may keep or
/// mutate it freely.
pub type OutputHandler = Arc<dyn Fn(&str, StreamKind, Vec<u8>) + Send + Sync>;

/// Wrap a closure as an [`OutputHandler`].
pub fn handler<F>(f: F) -> OutputHandler
where
    F: Fn(&str, StreamKind, Vec<u8>) + Send + Sync + 'static,
{
    Arc::new(f)
}
