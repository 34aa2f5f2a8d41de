//! Keystroke accumulation
//!
//! Keys typed between polls wait here. The buffer is small and bounded;
//! when it is full, new keystrokes are refused whole until a poll drains
//! it. Buffered bytes are never overwritten, reordered, or split.

use tracing::debug;

/// Bounded buffer of key bytes awaiting the next poll.
pub struct KeyBuffer {
    buf: Vec<u8>,
    capacity: usize,
    dropped: u64,
}

impl KeyBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append one keystroke (a key may be a multi-byte sequence, kept
    /// atomic). Returns false when the keystroke did not fit.
    pub fn push(&mut self, keystroke: &[u8]) -> bool {
        if keystroke.is_empty() {
            return true;
        }
        if self.buf.len() + keystroke.len() > self.capacity {
            self.dropped += 1;
            debug!("key buffer full, refused a {} byte keystroke", keystroke.len());
            return false;
        }
        self.buf.extend_from_slice(keystroke);
        true
    }

    /// The buffered bytes, oldest first.
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Keystrokes refused so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
