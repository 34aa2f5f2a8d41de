//! Protocol dispatch and the session duty cycle.
//!
//! A [`Session`] owns one link, one console, the frame decoder, and the
//! keystroke buffer. It services one packet at a time: the peer asks, the
//! terminal answers. Nothing is pipelined and no other thread touches
//! protocol state.

pub mod keys;

pub use keys::KeyBuffer;

use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};

use crate::link::{Link, LinkError};
use crate::proto::{encode_frame, FrameDecoder, FrameError, Opcode, Packet};
use crate::term::{Console, ConsoleError};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("transport failed: {0}")]
    Link(#[from] LinkError),

    #[error("console failed: {0}")]
    Console(#[from] ConsoleError),

    #[error("reply could not be framed: {0}")]
    Frame(#[from] FrameError),

    #[error("no packet for {0} seconds")]
    IdleTimeout(u64),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// How the duty cycle waits for work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    /// Alternate short keyboard polls with non-blocking link checks.
    Poll,
    /// Block on the link; gather pending keys when a packet completes.
    Blocking,
}

/// Tunables for one session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub mode: LoopMode,
    /// Largest frame either side may send. Both peers must agree.
    pub max_frame: usize,
    /// Keystroke buffer capacity in bytes.
    pub key_buffer: usize,
    /// Keyboard poll pacing in poll mode.
    pub poll_interval: Duration,
    /// Echo keystrokes to the local display.
    pub local_echo: bool,
    /// Identification string returned to termspec queries.
    pub termspec: String,
    /// Give up when no packet arrives within this window.
    pub idle_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            mode: LoopMode::Poll,
            max_frame: 8192,
            key_buffer: 64,
            poll_interval: Duration::from_millis(10),
            local_echo: true,
            termspec: format!("auxterm {}", env!("CARGO_PKG_VERSION")),
            idle_timeout: None,
        }
    }
}

/// One half-duplex terminal session.
pub struct Session<L: Link, C: Console> {
    link: L,
    console: C,
    decoder: FrameDecoder,
    keys: KeyBuffer,
    opts: SessionOptions,
    dropped_packets: u64,
    last_packet: Instant,
    done: bool,
}

impl<L: Link, C: Console> Session<L, C> {
    pub fn new(link: L, console: C, opts: SessionOptions) -> Self {
        Self {
            link,
            console,
            decoder: FrameDecoder::new(opts.max_frame),
            keys: KeyBuffer::new(opts.key_buffer),
            opts,
            dropped_packets: 0,
            last_packet: Instant::now(),
            done: false,
        }
    }

    /// Run until the peer interrupts, the transport fails, or the idle
    /// window (if any) elapses.
    pub fn run(&mut self) -> Result<()> {
        info!("session started ({:?} mode)", self.opts.mode);
        self.last_packet = Instant::now();

        while !self.done {
            self.step()?;
        }

        info!(
            "session ended: {} frames, {} overruns, {} bad escapes, {} dropped packets, {} refused keystrokes",
            self.decoder.frames(),
            self.decoder.overruns(),
            self.decoder.bad_escapes(),
            self.dropped_packets,
            self.keys.dropped(),
        );
        Ok(())
    }

    /// One duty cycle. Exposed so tests and embedders can drive the
    /// session without a dedicated thread.
    pub fn step(&mut self) -> Result<()> {
        match self.opts.mode {
            LoopMode::Poll => self.step_poll(),
            LoopMode::Blocking => self.step_blocking(),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.done
    }

    /// Packets dropped for a bad or unknown header.
    pub fn dropped_packets(&self) -> u64 {
        self.dropped_packets
    }

    /// The console, for inspection after the session ends.
    pub fn console(&self) -> &C {
        &self.console
    }

    /// Poll variant: one bounded keyboard poll, then service at most one
    /// packet if link bytes are pending.
    fn step_poll(&mut self) -> Result<()> {
        if let Some(keystroke) = self.console.poll_key(self.opts.poll_interval)? {
            self.accept_key(&keystroke)?;
        }

        if self.link.has_data()? {
            while let Some(byte) = self.link.try_recv_byte()? {
                if let Some(frame) = self.decoder.feed(byte) {
                    self.dispatch(&frame)?;
                    break;
                }
            }
        }

        self.check_idle()
    }

    /// Blocking variant: wait on the link until a frame completes, gather
    /// whatever the keyboard has pending, then dispatch.
    fn step_blocking(&mut self) -> Result<()> {
        loop {
            let byte = self.next_link_byte()?;
            if let Some(frame) = self.decoder.feed(byte) {
                while let Some(keystroke) = self.console.poll_key(Duration::ZERO)? {
                    self.accept_key(&keystroke)?;
                }
                return self.dispatch(&frame);
            }
        }
    }

    /// Receive one byte, honoring the idle window when one is set.
    fn next_link_byte(&mut self) -> Result<u8> {
        let limit = match self.opts.idle_timeout {
            Some(limit) => limit,
            None => return Ok(self.link.recv_byte()?),
        };
        loop {
            if let Some(byte) = self.link.try_recv_byte()? {
                return Ok(byte);
            }
            if self.last_packet.elapsed() >= limit {
                return Err(SessionError::IdleTimeout(limit.as_secs()));
            }
            thread::sleep(self.opts.poll_interval);
        }
    }

    fn check_idle(&self) -> Result<()> {
        if let Some(limit) = self.opts.idle_timeout {
            if self.last_packet.elapsed() >= limit {
                return Err(SessionError::IdleTimeout(limit.as_secs()));
            }
        }
        Ok(())
    }

    /// Buffer one keystroke, echoing it only if it was accepted.
    fn accept_key(&mut self, keystroke: &[u8]) -> Result<()> {
        if self.keys.push(keystroke) && self.opts.local_echo {
            self.console.echo(keystroke)?;
        }
        Ok(())
    }

    /// Act on one decoded frame: parse, dispatch, reply.
    fn dispatch(&mut self, frame: &[u8]) -> Result<()> {
        let packet = match Packet::parse(frame) {
            Some(packet) => packet,
            None => {
                self.dropped_packets += 1;
                debug!("dropped unrecognized {} byte packet", frame.len());
                return Ok(());
            }
        };
        self.last_packet = Instant::now();

        match packet.opcode {
            Opcode::Termspec => {
                debug!("termspec query");
                let spec = self.opts.termspec.clone().into_bytes();
                self.reply(Opcode::Termspec, spec)
            }
            Opcode::KeyPoll => {
                let pending = self.keys.bytes().to_vec();
                self.reply(Opcode::KeyPoll, pending)?;
                // Cleared only once the reply is on the wire.
                self.keys.clear();
                Ok(())
            }
            Opcode::DisplayWrite => {
                self.console.write_output(&packet.payload)?;
                self.reply(Opcode::DisplayWrite, Vec::new())
            }
            Opcode::Interrupt => {
                info!("interrupt received, ending session");
                self.done = true;
                Ok(())
            }
        }
    }

    fn reply(&mut self, opcode: Opcode, payload: Vec<u8>) -> Result<()> {
        let encoded = Packet::new(opcode, payload).encode();
        let frame = encode_frame(&encoded, self.opts.max_frame)?;
        self.link.send_all(&frame)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::MemoryLink;
    use crate::term::FakeConsole;

    fn options() -> SessionOptions {
        SessionOptions {
            poll_interval: Duration::ZERO,
            termspec: "test terminal".to_string(),
            ..SessionOptions::default()
        }
    }

    fn send_packet(link: &mut MemoryLink, packet: Packet) {
        let frame = encode_frame(&packet.encode(), 8192).unwrap();
        link.send_all(&frame).unwrap();
    }

    fn recv_packet(link: &mut MemoryLink) -> Option<Packet> {
        let mut decoder = FrameDecoder::new(8192);
        while let Ok(Some(byte)) = link.try_recv_byte() {
            if let Some(frame) = decoder.feed(byte) {
                return Packet::parse(&frame);
            }
        }
        None
    }

    fn session_pair() -> (Session<MemoryLink, FakeConsole>, MemoryLink) {
        let (ours, theirs) = MemoryLink::pair();
        let session = Session::new(ours, FakeConsole::new(), options());
        (session, theirs)
    }

    #[test]
    fn test_termspec_reply() {
        let (mut session, mut peer) = session_pair();

        send_packet(&mut peer, Packet::header(Opcode::Termspec));
        session.step().unwrap();

        let reply = recv_packet(&mut peer).unwrap();
        assert_eq!(reply.opcode, Opcode::Termspec);
        assert_eq!(reply.payload, b"test terminal");
    }

    #[test]
    fn test_key_poll_drains_the_buffer() {
        let (ours, theirs) = MemoryLink::pair();
        let mut console = FakeConsole::new();
        console.queue_key(b"h");
        console.queue_key(b"i");
        let mut session = Session::new(ours, console, options());
        let mut peer = theirs;

        // Two cycles gather the two keystrokes.
        session.step().unwrap();
        session.step().unwrap();

        send_packet(&mut peer, Packet::header(Opcode::KeyPoll));
        session.step().unwrap();

        let reply = recv_packet(&mut peer).unwrap();
        assert_eq!(reply.opcode, Opcode::KeyPoll);
        assert_eq!(reply.payload, b"hi");

        // A second poll with nothing typed answers empty.
        send_packet(&mut peer, Packet::header(Opcode::KeyPoll));
        session.step().unwrap();
        let reply = recv_packet(&mut peer).unwrap();
        assert_eq!(reply.opcode, Opcode::KeyPoll);
        assert!(reply.payload.is_empty());
    }

    #[test]
    fn test_keystrokes_echo_locally() {
        let (ours, _theirs) = MemoryLink::pair();
        let mut console = FakeConsole::new();
        console.queue_key(b"a");
        let mut session = Session::new(ours, console, options());

        session.step().unwrap();
        assert_eq!(session.console().echoed, b"a");
    }

    #[test]
    fn test_no_echo_when_disabled() {
        let (ours, _theirs) = MemoryLink::pair();
        let mut console = FakeConsole::new();
        console.queue_key(b"a");
        let mut opts = options();
        opts.local_echo = false;
        let mut session = Session::new(ours, console, opts);

        session.step().unwrap();
        assert!(session.console().echoed.is_empty());
    }

    #[test]
    fn test_display_write_reaches_console_and_acks() {
        let (mut session, mut peer) = session_pair();

        send_packet(&mut peer, Packet::new(Opcode::DisplayWrite, b"hi".to_vec()));
        session.step().unwrap();

        assert_eq!(session.console().output, b"hi");

        let ack = recv_packet(&mut peer).unwrap();
        assert_eq!(ack.opcode, Opcode::DisplayWrite);
        assert!(ack.payload.is_empty());
    }

    #[test]
    fn test_unknown_opcode_is_ignored() {
        let (mut session, mut peer) = session_pair();

        let frame = encode_frame(&[0x09, 0x09], 8192).unwrap();
        peer.send_all(&frame).unwrap();
        session.step().unwrap();

        assert!(session.is_running());
        assert_eq!(session.dropped_packets(), 1);
        assert!(recv_packet(&mut peer).is_none());

        // The session still services the next packet.
        send_packet(&mut peer, Packet::header(Opcode::Termspec));
        session.step().unwrap();
        assert_eq!(recv_packet(&mut peer).unwrap().opcode, Opcode::Termspec);
    }

    #[test]
    fn test_mismatched_header_is_ignored() {
        let (mut session, mut peer) = session_pair();

        let frame = encode_frame(&[0x01, 0x02], 8192).unwrap();
        peer.send_all(&frame).unwrap();
        session.step().unwrap();

        assert_eq!(session.dropped_packets(), 1);
        assert!(recv_packet(&mut peer).is_none());
    }

    #[test]
    fn test_interrupt_ends_the_session_silently() {
        let (mut session, mut peer) = session_pair();

        send_packet(&mut peer, Packet::header(Opcode::Interrupt));
        session.step().unwrap();

        assert!(!session.is_running());
        assert!(!peer.has_data().unwrap());
    }

    #[test]
    fn test_blocking_mode_gathers_keys_before_reply() {
        let (ours, theirs) = MemoryLink::pair();
        let mut console = FakeConsole::new();
        console.queue_key(b"x");
        console.queue_key(b"y");
        let mut opts = options();
        opts.mode = LoopMode::Blocking;
        let mut session = Session::new(ours, console, opts);
        let mut peer = theirs;

        send_packet(&mut peer, Packet::header(Opcode::KeyPoll));
        session.step().unwrap();

        let reply = recv_packet(&mut peer).unwrap();
        assert_eq!(reply.payload, b"xy");
    }

    #[test]
    fn test_idle_timeout_ends_the_session() {
        let (ours, _theirs) = MemoryLink::pair();
        let mut opts = options();
        opts.idle_timeout = Some(Duration::from_millis(20));
        let mut session = Session::new(ours, FakeConsole::new(), opts);

        let result = (|| -> Result<()> {
            loop {
                session.step()?;
            }
        })();

        assert!(matches!(result, Err(SessionError::IdleTimeout(_))));
    }

    #[test]
    fn test_transport_failure_is_fatal() {
        let (ours, theirs) = MemoryLink::pair();
        let mut opts = options();
        opts.mode = LoopMode::Blocking;
        let mut session = Session::new(ours, FakeConsole::new(), opts);

        drop(theirs);
        assert!(matches!(
            session.step(),
            Err(SessionError::Link(LinkError::Closed))
        ));
    }
}
