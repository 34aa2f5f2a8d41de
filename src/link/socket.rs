//! Unix stream socket transport.

use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;

use tracing::debug;

use super::{Link, LinkError, Result};

/// A connected unix stream socket.
///
/// Reads block by default; the non-blocking probes flip the socket into
/// non-blocking mode for one call and restore it afterwards.
pub struct UnixLink {
    stream: UnixStream,
}

impl UnixLink {
    pub fn connect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let stream = UnixStream::connect(&path).map_err(LinkError::Connect)?;
        debug!("connected to socket {}", path.as_ref().display());
        Ok(Self { stream })
    }

    /// Run one read attempt with the socket temporarily non-blocking.
    fn probe<T>(&mut self, read: impl FnOnce(&mut UnixStream) -> Result<T>) -> Result<T> {
        self.stream.set_nonblocking(true).map_err(LinkError::Read)?;
        let result = read(&mut self.stream);
        self.stream.set_nonblocking(false).map_err(LinkError::Read)?;
        result
    }
}

impl Link for UnixLink {
    fn send_byte(&mut self, byte: u8) -> Result<()> {
        self.stream.write_all(&[byte]).map_err(LinkError::Write)
    }

    fn recv_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => return Err(LinkError::Closed),
                Ok(_) => return Ok(buf[0]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(LinkError::Read(e)),
            }
        }
    }

    fn try_recv_byte(&mut self) -> Result<Option<u8>> {
        self.probe(|stream| {
            let mut buf = [0u8; 1];
            match stream.read(&mut buf) {
                Ok(0) => Err(LinkError::Closed),
                Ok(_) => Ok(Some(buf[0])),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
                Err(e) => Err(LinkError::Read(e)),
            }
        })
    }

    fn has_data(&mut self) -> Result<bool> {
        self.probe(|stream| {
            let mut buf = [0u8; 1];
            match stream.peek(&mut buf) {
                Ok(0) => Err(LinkError::Closed),
                Ok(_) => Ok(true),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
                Err(e) => Err(LinkError::Read(e)),
            }
        })
    }

    fn send_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).map_err(LinkError::Write)
    }
}
