//! Character device transport.
//!
//! Serial lines show up as character devices already configured by the
//! system (speed, parity, discipline). Reads on such a device block, so a
//! dedicated reader thread pumps bytes into a channel and the link hands
//! them out from there.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

use tracing::debug;

use super::{Link, LinkError, Result};

/// A character device pumped by a background reader thread.
pub struct DeviceLink {
    writer: File,
    output_rx: Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
    running: Arc<AtomicBool>,
}

impl DeviceLink {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(LinkError::Open)?;
        let writer = reader.try_clone().map_err(LinkError::Open)?;
        debug!("opened device {}", path.as_ref().display());

        let running = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::channel::<Vec<u8>>();

        // Reader thread: blocks on the device, forwards chunks until the
        // device closes or the link is dropped.
        let thread_running = running.clone();
        thread::spawn(move || {
            let mut reader = reader;
            let mut buffer = vec![0u8; 256];

            loop {
                if !thread_running.load(Ordering::SeqCst) {
                    break;
                }

                match reader.read(&mut buffer) {
                    Ok(0) => {
                        thread_running.store(false, Ordering::SeqCst);
                        break;
                    }
                    Ok(n) => {
                        if tx.send(buffer[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!("device read failed: {}", e);
                        thread_running.store(false, Ordering::SeqCst);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            writer,
            output_rx: rx,
            pending: VecDeque::new(),
            running,
        })
    }

    /// Move one buffered chunk from the channel into the pending queue.
    fn refill(&mut self) -> Result<bool> {
        match self.output_rx.try_recv() {
            Ok(chunk) => {
                self.pending.extend(chunk);
                Ok(true)
            }
            Err(TryRecvError::Empty) => Ok(false),
            Err(TryRecvError::Disconnected) => Err(LinkError::Closed),
        }
    }
}

impl Link for DeviceLink {
    fn send_byte(&mut self, byte: u8) -> Result<()> {
        self.writer.write_all(&[byte]).map_err(LinkError::Write)
    }

    fn recv_byte(&mut self) -> Result<u8> {
        if let Some(byte) = self.pending.pop_front() {
            return Ok(byte);
        }
        match self.output_rx.recv() {
            Ok(chunk) => {
                self.pending.extend(chunk);
                // Chunks from the reader thread are never empty.
                self.pending.pop_front().ok_or(LinkError::Closed)
            }
            Err(_) => Err(LinkError::Closed),
        }
    }

    fn try_recv_byte(&mut self) -> Result<Option<u8>> {
        if self.pending.is_empty() && !self.refill()? {
            return Ok(None);
        }
        Ok(self.pending.pop_front())
    }

    fn has_data(&mut self) -> Result<bool> {
        if !self.pending.is_empty() {
            return Ok(true);
        }
        self.refill()
    }

    fn send_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes).map_err(LinkError::Write)
    }
}

impl Drop for DeviceLink {
    fn drop(&mut self) {
        // The blocking read cannot be cancelled portably; the thread exits
        // on its own when the device yields a byte or errors out.
        self.running.store(false, Ordering::SeqCst);
    }
}
