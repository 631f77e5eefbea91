// src/output/sink.rs

//! Fan-out writer for one child stream.

use std::io::{self, Write};

use crate::output::{LineWriter, OutputBuffer, OutputHandler};
use crate::types::{Key, StreamKind};

/// Feeds every chunk of a child stream to the capture buffer, the terminal
/// (unless quiet) and the line handlers.
pub struct StreamSink {
    capture: OutputBuffer,
    echo: bool,
    lines: LineWriter,
}

impl StreamSink {
    pub fn new(
        key: impl Into<Key>,
        stream: StreamKind,
        capture: OutputBuffer,
        quiet: bool,
        handlers: Vec<OutputHandler>,
    ) -> Self {
        Self {
            capture,
            echo: !quiet,
            lines: LineWriter::new(key, stream, handlers),
        }
    }

    pub fn capture(&self) -> &OutputBuffer {
        &self.capture
    }

    /// Emit any trailing partial line; called once the stream hits EOF.
    pub fn close(&mut self) {
        self.lines.close();
        if self.echo {
            let _ = self.flush_console();
        }
    }

    fn echo_to_console(&self, buf: &[u8]) -> io::Result<()> {
        match self.lines.stream() {
            StreamKind::Stdout => io::stdout().lock().write_all(buf),
            StreamKind::Stderr => io::stderr().lock().write_all(buf),
        }
    }

    fn flush_console(&self) -> io::Result<()> {
        match self.lines.stream() {
            StreamKind::Stdout => io::stdout().lock().flush(),
            StreamKind::Stderr => io::stderr().lock().flush(),
        }
    }
}

impl Write for StreamSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.capture.append(buf);

        // The terminal going away must not stop capture or line delivery.
        if self.echo {
            let _ = self.echo_to_console(buf);
        }

        self.lines.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.echo {
            self.flush_console()?;
        }
        Ok(())
    }
}
