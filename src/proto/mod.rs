//! Wire protocol: framing below, packets above.
//!
//! - **frame**: boundary/escape byte framing with resynchronization
//! - **packet**: the opcode header and payload carried inside each frame
//!
//! # Wire layout
//!
//! ```text
//! END | escaped( tag tag payload... ) | END
//! ```

pub mod frame;
pub mod packet;

pub use frame::{encode_frame, FrameDecoder, FrameError};
pub use packet::{Opcode, Packet};
