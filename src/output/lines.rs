// src/output/lines.rs

//! Line re-segmentation of a byte stream.

use std::io;

use tracing::trace;

use crate::output::OutputHandler;
use crate::types::{Key, StreamKind};

/// Turns arbitrarily sized writes into discrete lines.
///
/// Every complete `\n`-terminated line is delivered to each handler as a
/// fresh `Vec<u8>` (without the newline). Empty lines are delivered as empty
/// vectors. A trailing partial line is held back until the next newline or
/// until [`LineWriter::close`] is called.
pub struct LineWriter {
    key: Key,
    stream: StreamKind,
    pending: Vec<u8>,
    handlers: Vec<OutputHandler>,
    closed: bool,
}

impl LineWriter {
    pub fn new(key: impl Into<Key>, stream: StreamKind, handlers: Vec<OutputHandler>) -> Self {
        Self {
            key: key.into(),
            stream,
            pending: Vec::new(),
            handlers,
            closed: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn stream(&self) -> StreamKind {
        self.stream
    }

    /// Bytes of the current incomplete line.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Flush a trailing partial line, if any. Further writes are ignored.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.emit(line);
        }
    }

    fn emit(&self, line: Vec<u8>) {
        trace!(
            target: "procflow::output",
            key = %self.key,
            stream = %self.stream,
            line = %String::from_utf8_lossy(&line),
        );

        let Some((last, rest)) = self.handlers.split_last() else {
            return;
        };
        for handler in rest {
            handler(&self.key, self.stream, line.clone());
        }
        last(&self.key, self.stream, line);
    }
}

impl io::Write for LineWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Ok(buf.len());
        }

        let mut rest = buf;
        while let Some(idx) = rest.iter().position(|b| *b == b'\n') {
            let (segment, tail) = rest.split_at(idx);
            let mut line = std::mem::take(&mut self.pending);
            line.extend_from_slice(segment);
            self.emit(line);
            rest = &tail[1..];
        }
        self.pending.extend_from_slice(rest);

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
