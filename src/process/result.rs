// src/process/result.rs

use regex::Regex;
use serde::Serialize;

/// Exit code reserved for "no result": the process never started, could not
/// be waited on, or its supervisor failed.
pub const EXIT_CODE_UNAVAILABLE: i32 = -1;

/// Terminal outcome of a process, pipeline or pool member.
///
/// Created exactly once per run and never mutated afterwards; clones are
/// cheap enough to hand out from every `wait` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessResult {
    exit_code: i32,
    command: String,
    output: String,
    error_output: String,
    timed_out: bool,
}

impl ProcessResult {
    pub(crate) fn new(
        exit_code: i32,
        command: impl Into<String>,
        output: String,
        error_output: String,
        timed_out: bool,
    ) -> Self {
        Self {
            exit_code,
            command: command.into(),
            output,
            error_output,
            timed_out,
        }
    }

    /// A result for something that produced no exit status at all.
    pub(crate) fn unavailable(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(
            EXIT_CODE_UNAVAILABLE,
            command,
            String::new(),
            reason.into(),
            false,
        )
    }

    /// Downgrade to an unavailable result, keeping captures and appending a
    /// diagnostic line to the error output.
    pub(crate) fn with_diagnostic(mut self, message: &str) -> Self {
        self.exit_code = EXIT_CODE_UNAVAILABLE;
        if !self.error_output.is_empty() && !self.error_output.ends_with('\n') {
            self.error_output.push('\n');
        }
        self.error_output.push_str(message);
        self
    }

    pub(crate) fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    pub(crate) fn with_timed_out(mut self, timed_out: bool) -> Self {
        self.timed_out = self.timed_out || timed_out;
        self
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Captured stdout; empty when buffering was disabled.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Captured stderr; empty when buffering was disabled.
    pub fn error_output(&self) -> &str {
        &self.error_output
    }

    pub fn successful(&self) -> bool {
        self.exit_code == 0
    }

    pub fn failed(&self) -> bool {
        !self.successful()
    }

    /// Whether the process was terminated because a timeout or deadline
    /// expired.
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn seen_in_output(&self, needle: &str) -> bool {
        self.output.contains(needle)
    }

    pub fn seen_in_error_output(&self, needle: &str) -> bool {
        self.error_output.contains(needle)
    }

    pub fn output_matches(&self, pattern: &Regex) -> bool {
        pattern.is_match(&self.output)
    }

    pub fn error_output_matches(&self, pattern: &Regex) -> bool {
        pattern.is_match(&self.error_output)
    }
}
