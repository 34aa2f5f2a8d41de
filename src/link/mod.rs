//! Byte transports.
//!
//! Everything above this module sees a [`Link`]: a byte-at-a-time,
//! half-duplex channel. Three transports implement it:
//!
//! - **socket**: a connected unix stream socket
//! - **device**: a character device (a serial line configured elsewhere)
//! - **memory**: a paired in-process queue for tests and the demo mode

pub mod device;
pub mod memory;
pub mod socket;

pub use device::DeviceLink;
pub use memory::MemoryLink;
pub use socket::UnixLink;

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("failed to connect to socket: {0}")]
    Connect(#[source] io::Error),

    #[error("failed to open device: {0}")]
    Open(#[source] io::Error),

    #[error("failed to read from link: {0}")]
    Read(#[source] io::Error),

    #[error("failed to write to link: {0}")]
    Write(#[source] io::Error),

    #[error("link closed by peer")]
    Closed,
}

pub type Result<T> = std::result::Result<T, LinkError>;

/// A byte-oriented transport.
///
/// All methods operate on single bytes; the framing layer above decides
/// where packets begin and end. Errors from a link are fatal to the
/// session, there is no retransmission.
pub trait Link {
    /// Send one byte.
    fn send_byte(&mut self, byte: u8) -> Result<()>;

    /// Receive one byte, blocking until it arrives.
    fn recv_byte(&mut self) -> Result<u8>;

    /// Receive one byte if one is already buffered, without blocking.
    fn try_recv_byte(&mut self) -> Result<Option<u8>>;

    /// Whether at least one byte is waiting to be received.
    fn has_data(&mut self) -> Result<bool>;

    /// Send a whole buffer.
    fn send_all(&mut self, bytes: &[u8]) -> Result<()> {
        for &byte in bytes {
            self.send_byte(byte)?;
        }
        Ok(())
    }
}
