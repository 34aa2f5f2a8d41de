//! Host-side protocol driver.
//!
//! The other end of the wire: where [`Session`](crate::session::Session)
//! answers, `HostDriver` asks. It queries the terminal's identity, polls
//! its keyboard, writes its display in frame-sized chunks, and resets it.
//! The demo mode and the integration tests run it over an in-memory link;
//! it works the same over a socket or serial line.

use thiserror::Error;
use tracing::debug;

use crate::link::{Link, LinkError};
use crate::proto::{encode_frame, FrameDecoder, FrameError, Opcode, Packet};

#[derive(Error, Debug)]
pub enum HostError {
    #[error("transport failed: {0}")]
    Link(#[from] LinkError),

    #[error("request could not be framed: {0}")]
    Frame(#[from] FrameError),
}

pub type Result<T> = std::result::Result<T, HostError>;

/// Drives a remote terminal, one request and one reply at a time.
pub struct HostDriver<L: Link> {
    link: L,
    decoder: FrameDecoder,
    max_frame: usize,
}

impl<L: Link> HostDriver<L> {
    pub fn new(link: L, max_frame: usize) -> Self {
        Self {
            link,
            decoder: FrameDecoder::new(max_frame),
            max_frame,
        }
    }

    /// Ask the terminal to identify itself.
    pub fn query_termspec(&mut self) -> Result<String> {
        let payload = match self.exchange(Packet::header(Opcode::Termspec))? {
            Some(reply) if reply.opcode == Opcode::Termspec => reply.payload,
            _ => Vec::new(),
        };
        // Older terminals pad the string with trailing NULs.
        let trimmed: Vec<u8> = payload.into_iter().filter(|&b| b != 0).collect();
        Ok(String::from_utf8_lossy(&trimmed).into_owned())
    }

    /// Collect whatever the terminal's keyboard buffered since the last
    /// poll. A reply that does not echo the poll header yields no keys.
    pub fn poll_keys(&mut self) -> Result<Vec<u8>> {
        match self.exchange(Packet::header(Opcode::KeyPoll))? {
            Some(reply) if reply.opcode == Opcode::KeyPoll => Ok(reply.payload),
            _ => Ok(Vec::new()),
        }
    }

    /// Write bytes to the terminal's display.
    ///
    /// Large buffers go out as several packets, each within the frame
    /// budget, awaiting the terminal's acknowledgment in between.
    pub fn write_display(&mut self, bytes: &[u8]) -> Result<()> {
        let budget = self.max_frame.saturating_sub(2).max(1);
        for chunk in bytes.chunks(budget) {
            let reply = self.exchange(Packet::new(Opcode::DisplayWrite, chunk.to_vec()))?;
            if reply.is_none() {
                debug!("display write acknowledged with an unrecognized packet");
            }
        }
        Ok(())
    }

    /// Reset the terminal. Fire and forget: no reply is defined.
    pub fn send_interrupt(&mut self) -> Result<()> {
        self.send(Packet::header(Opcode::Interrupt))
    }

    fn send(&mut self, packet: Packet) -> Result<()> {
        let frame = encode_frame(&packet.encode(), self.max_frame)?;
        self.link.send_all(&frame)?;
        Ok(())
    }

    /// Send a request, then block for the next complete frame. Half
    /// duplex: exactly one reply follows each request, so an unparseable
    /// reply is reported as `None` rather than waited out.
    fn exchange(&mut self, packet: Packet) -> Result<Option<Packet>> {
        self.send(packet)?;
        loop {
            let byte = self.link.recv_byte()?;
            if let Some(frame) = self.decoder.feed(byte) {
                return Ok(Packet::parse(&frame));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::MemoryLink;

    /// Queue a reply on the far end before the driver asks, so a single
    /// thread can play both sides.
    fn preload(peer: &mut MemoryLink, packet: Packet) {
        let frame = encode_frame(&packet.encode(), 8192).unwrap();
        peer.send_all(&frame).unwrap();
    }

    fn drain(peer: &mut MemoryLink) -> Vec<u8> {
        let mut bytes = Vec::new();
        while let Ok(Some(byte)) = peer.try_recv_byte() {
            bytes.push(byte);
        }
        bytes
    }

    #[test]
    fn test_termspec_strips_trailing_nul() {
        let (ours, mut peer) = MemoryLink::pair();
        let mut host = HostDriver::new(ours, 128);

        preload(&mut peer, Packet::new(Opcode::Termspec, b"old terminal\0".to_vec()));
        assert_eq!(host.query_termspec().unwrap(), "old terminal");
    }

    #[test]
    fn test_poll_keys_requires_matching_header() {
        let (ours, mut peer) = MemoryLink::pair();
        let mut host = HostDriver::new(ours, 128);

        preload(&mut peer, Packet::new(Opcode::KeyPoll, b"abc".to_vec()));
        assert_eq!(host.poll_keys().unwrap(), b"abc");

        // A reply under the wrong opcode yields no keys.
        preload(&mut peer, Packet::new(Opcode::DisplayWrite, b"abc".to_vec()));
        assert!(host.poll_keys().unwrap().is_empty());
    }

    #[test]
    fn test_write_display_chunks_to_the_frame_budget() {
        let (ours, mut peer) = MemoryLink::pair();
        // Budget of 6 payload bytes per packet: 4 for display data.
        let mut host = HostDriver::new(ours, 6);

        // Ten bytes need three chunks; preload the three acks.
        for _ in 0..3 {
            preload(&mut peer, Packet::header(Opcode::DisplayWrite));
        }
        host.write_display(b"0123456789").unwrap();

        // Decode what went over the wire and reassemble the chunks.
        let mut decoder = FrameDecoder::new(6);
        let mut chunks = Vec::new();
        for byte in drain(&mut peer) {
            if let Some(frame) = decoder.feed(byte) {
                let packet = Packet::parse(&frame).unwrap();
                assert_eq!(packet.opcode, Opcode::DisplayWrite);
                assert!(packet.payload.len() <= 4);
                chunks.push(packet.payload);
            }
        }
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), b"0123456789");
    }

    #[test]
    fn test_interrupt_sends_without_waiting() {
        let (ours, mut peer) = MemoryLink::pair();
        let mut host = HostDriver::new(ours, 128);

        host.send_interrupt().unwrap();

        let mut decoder = FrameDecoder::new(128);
        let mut parsed = None;
        for byte in drain(&mut peer) {
            if let Some(frame) = decoder.feed(byte) {
                parsed = Packet::parse(&frame);
            }
        }
        assert_eq!(parsed, Some(Packet::header(Opcode::Interrupt)));
    }
}
