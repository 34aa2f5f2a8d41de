//! Scripted console for tests and the demo mode.

use std::collections::VecDeque;
use std::time::Duration;

use super::{Console, Result};

/// Minimal fake console: keystrokes come from a script, display output
/// and echoes are recorded for inspection.
#[derive(Default)]
pub struct FakeConsole {
    keys: VecDeque<Vec<u8>>,
    /// Bytes the peer wrote to the display.
    pub output: Vec<u8>,
    /// Bytes echoed back for locally typed keys.
    pub echoed: Vec<u8>,
}

impl FakeConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one keystroke to be returned by a later poll.
    pub fn queue_key(&mut self, bytes: &[u8]) {
        self.keys.push_back(bytes.to_vec());
    }
}

impl Console for FakeConsole {
    fn poll_key(&mut self, _wait: Duration) -> Result<Option<Vec<u8>>> {
        Ok(self.keys.pop_front())
    }

    fn write_output(&mut self, bytes: &[u8]) -> Result<()> {
        self.output.extend_from_slice(bytes);
        Ok(())
    }

    fn echo(&mut self, bytes: &[u8]) -> Result<()> {
        self.echoed.extend_from_slice(bytes);
        Ok(())
    }
}
