//! In-memory transport.
//!
//! A pair of queues wired back to back. Used by the demo mode and by
//! tests that need both protocol ends inside one process.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::{Link, LinkError, Result};

type Shared = Arc<Mutex<VecDeque<u8>>>;

/// One end of an in-memory byte pipe.
pub struct MemoryLink {
    rx: Shared,
    tx: Shared,
}

impl MemoryLink {
    /// Create two connected ends. Bytes sent on one are received on the
    /// other.
    pub fn pair() -> (MemoryLink, MemoryLink) {
        let a: Shared = Arc::new(Mutex::new(VecDeque::new()));
        let b: Shared = Arc::new(Mutex::new(VecDeque::new()));
        (
            MemoryLink {
                rx: a.clone(),
                tx: b.clone(),
            },
            MemoryLink { rx: b, tx: a },
        )
    }

    fn pop(&self) -> Result<Option<u8>> {
        let mut queue = self.rx.lock().map_err(|_| LinkError::Closed)?;
        Ok(queue.pop_front())
    }

    /// The peer end has been dropped and nothing more can arrive.
    fn peer_gone(&self) -> bool {
        Arc::strong_count(&self.rx) == 1
    }
}

impl Link for MemoryLink {
    fn send_byte(&mut self, byte: u8) -> Result<()> {
        let mut queue = self.tx.lock().map_err(|_| LinkError::Closed)?;
        queue.push_back(byte);
        Ok(())
    }

    fn recv_byte(&mut self) -> Result<u8> {
        loop {
            if let Some(byte) = self.pop()? {
                return Ok(byte);
            }
            if self.peer_gone() {
                return Err(LinkError::Closed);
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn try_recv_byte(&mut self) -> Result<Option<u8>> {
        match self.pop()? {
            Some(byte) => Ok(Some(byte)),
            None if self.peer_gone() => Err(LinkError::Closed),
            None => Ok(None),
        }
    }

    fn has_data(&mut self) -> Result<bool> {
        let queue = self.rx.lock().map_err(|_| LinkError::Closed)?;
        Ok(!queue.is_empty())
    }

    fn send_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut queue = self.tx.lock().map_err(|_| LinkError::Closed)?;
        queue.extend(bytes);
        Ok(())
    }
}
