// src/output/capture.rs

use std::sync::{Arc, Mutex};

/// Size of the tail window returned by `latest_output`.
pub const LATEST_OUTPUT_WINDOW: usize = 4096;

#[derive(Debug, Default)]
struct CaptureState {
    full: Vec<u8>,
    tail: Vec<u8>,
}

/// Shared in-memory capture of one stream.
///
/// The full capture is skipped when buffering is disabled; the tail window
/// is always maintained so long-lived processes can be polled with bounded
/// memory.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    state: Arc<Mutex<CaptureState>>,
    buffering: bool,
}

impl OutputBuffer {
    pub fn new(buffering: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(CaptureState::default())),
            buffering,
        }
    }

    pub fn is_buffering(&self) -> bool {
        self.buffering
    }

    pub fn append(&self, bytes: &[u8]) {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if self.buffering {
            state.full.extend_from_slice(bytes);
        }

        if bytes.len() >= LATEST_OUTPUT_WINDOW {
            state.tail.clear();
            state
                .tail
                .extend_from_slice(&bytes[bytes.len() - LATEST_OUTPUT_WINDOW..]);
        } else {
            state.tail.extend_from_slice(bytes);
            let overflow = state.tail.len().saturating_sub(LATEST_OUTPUT_WINDOW);
            if overflow > 0 {
                state.tail.drain(..overflow);
            }
        }
    }

    /// Everything captured so far (empty when buffering is disabled).
    pub fn contents(&self) -> String {
        self.with_state(|s| String::from_utf8_lossy(&s.full).into_owned())
    }

    /// At most the last [`LATEST_OUTPUT_WINDOW`] bytes written.
    pub fn latest(&self) -> String {
        self.with_state(|s| String::from_utf8_lossy(&s.tail).into_owned())
    }

    pub fn len(&self) -> usize {
        self.with_state(|s| s.full.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_state<T>(&self, f: impl FnOnce(&CaptureState) -> T) -> T {
        match self.state.lock() {
            Ok(guard) => f(&guard),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }
}
