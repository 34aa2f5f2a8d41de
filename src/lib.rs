//! Half-duplex terminal bridge over framed byte links.
//!
//! auxterm lends the local keyboard and display to a peer process across a
//! low-bandwidth byte channel. The peer drives a small packet protocol:
//! it may ask the terminal to identify itself, collect buffered
//! keystrokes, write display output, or end the session. One packet is in
//! flight at a time; the terminal only ever answers.
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── FrameDecoder (raw bytes -> delimited frames)
//! ├── Packet       (opcode header + payload inside each frame)
//! ├── KeyBuffer    (keystrokes awaiting the next poll)
//! ├── Link         (unix socket / character device / in-memory pair)
//! └── Console      (local keyboard and display)
//! ```
//!
//! The [`host`] module implements the other end of the same wire protocol,
//! used by the demo mode and by integration tests.

pub mod config;
pub mod host;
pub mod link;
pub mod proto;
pub mod session;
pub mod term;
