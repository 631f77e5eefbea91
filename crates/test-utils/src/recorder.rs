use std::sync::{Arc, Mutex};

use procflow::types::StreamKind;

/// One line seen by an output handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedLine {
    pub key: String,
    pub stream: StreamKind,
    pub line: String,
}

/// Collects every line passed to the handlers it hands out.
#[derive(Debug, Clone, Default)]
pub struct LineRecorder {
    lines: Arc<Mutex<Vec<RecordedLine>>>,
}

impl LineRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A closure suitable for `on_output`.
    pub fn handler(&self) -> impl Fn(&str, StreamKind, Vec<u8>) + Send + Sync + use<> {
        let lines = Arc::clone(&self.lines);
        move |key: &str, stream: StreamKind, line: Vec<u8>| {
            lines.lock().unwrap().push(RecordedLine {
                key: key.to_string(),
                stream,
                line: String::from_utf8_lossy(&line).into_owned(),
            });
        }
    }

    pub fn lines(&self) -> Vec<RecordedLine> {
        self.lines.lock().unwrap().clone()
    }

    /// Text of every line from `key` on `stream`, in delivery order.
    pub fn text_for(&self, key: &str, stream: StreamKind) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|l| l.key == key && l.stream == stream)
            .map(|l| l.line)
            .collect()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lines().into_iter().map(|l| l.key).collect();
        keys.sort();
        keys.dedup();
        keys
    }
}
