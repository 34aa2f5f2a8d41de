//! Byte-stream framing
//!
//! Delimits packets on the raw byte channel with a boundary byte and
//! escape substitutions, in the style of RFC 1055 SLIP. The substitution
//! values differ from the RFC's by one; both ends of a deployment carry
//! the same table, so the wire stays compatible with existing peers.

use thiserror::Error;

/// Marks the end of a frame.
pub const END: u8 = 0xC0;
/// Introduces a two-byte escape sequence.
pub const ESC: u8 = 0xDB;
/// Second escape byte standing for a literal END.
pub const ESC_END: u8 = 0xDD;
/// Second escape byte standing for a literal ESC.
pub const ESC_ESC: u8 = 0xDE;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("payload of {0} bytes exceeds the {1} byte frame limit")]
    PayloadTooLarge(usize, usize),
}

/// Encode a payload as one frame: boundary, escaped payload, boundary.
///
/// The leading boundary flushes any line noise the receiver may have
/// accumulated. Worst case the output is twice the payload plus two.
pub fn encode_frame(payload: &[u8], max_frame: usize) -> Result<Vec<u8>, FrameError> {
    if payload.len() > max_frame {
        return Err(FrameError::PayloadTooLarge(payload.len(), max_frame));
    }

    let mut out = Vec::with_capacity(payload.len() + 2);
    out.push(END);
    for &byte in payload {
        match byte {
            END => {
                out.push(ESC);
                out.push(ESC_END);
            }
            ESC => {
                out.push(ESC);
                out.push(ESC_ESC);
            }
            _ => out.push(byte),
        }
    }
    out.push(END);
    Ok(out)
}

#[derive(Clone, Copy, Default, PartialEq)]
enum DecodeState {
    #[default]
    Accumulate,
    /// An ESC byte arrived; the next byte selects the literal.
    Escape,
    /// The current frame is lost; swallow bytes until the next boundary.
    Resync,
}

/// Push decoder for the framing layer.
///
/// Bytes go in one at a time; a completed frame comes out unescaped.
/// Framing errors never surface to the caller: the broken frame is
/// discarded, a counter ticks, and decoding resumes at the next boundary.
pub struct FrameDecoder {
    state: DecodeState,
    buf: Vec<u8>,
    capacity: usize,
    frames: u64,
    overruns: u64,
    bad_escapes: u64,
}

impl FrameDecoder {
    /// Create a decoder that accumulates at most `capacity` unescaped bytes
    /// per frame.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: DecodeState::Accumulate,
            buf: Vec::with_capacity(capacity.min(4096)),
            capacity,
            frames: 0,
            overruns: 0,
            bad_escapes: 0,
        }
    }

    /// Feed a single byte. Returns a complete frame, or `None` when more
    /// bytes are needed.
    pub fn feed(&mut self, byte: u8) -> Option<Vec<u8>> {
        match self.state {
            DecodeState::Accumulate => match byte {
                END => {
                    if self.buf.is_empty() {
                        // Stray or repeated boundary, nothing to deliver.
                        return None;
                    }
                    self.frames += 1;
                    Some(std::mem::take(&mut self.buf))
                }
                ESC => {
                    self.state = DecodeState::Escape;
                    None
                }
                _ => {
                    self.push_literal(byte);
                    None
                }
            },
            DecodeState::Escape => match byte {
                ESC_END => {
                    self.state = DecodeState::Accumulate;
                    self.push_literal(END);
                    None
                }
                ESC_ESC => {
                    self.state = DecodeState::Accumulate;
                    self.push_literal(ESC);
                    None
                }
                END => {
                    // The boundary that follows a dangling escape already
                    // closes the broken frame.
                    self.bad_escape(byte);
                    self.state = DecodeState::Accumulate;
                    None
                }
                _ => {
                    self.bad_escape(byte);
                    self.state = DecodeState::Resync;
                    None
                }
            },
            DecodeState::Resync => {
                if byte == END {
                    self.state = DecodeState::Accumulate;
                }
                None
            }
        }
    }

    fn push_literal(&mut self, byte: u8) {
        if self.buf.len() >= self.capacity {
            tracing::debug!("frame overran {} bytes, resyncing", self.capacity);
            self.buf.clear();
            self.overruns += 1;
            self.state = DecodeState::Resync;
            return;
        }
        self.buf.push(byte);
    }

    fn bad_escape(&mut self, byte: u8) {
        tracing::debug!("frame dropped, invalid escape byte {:#04x}", byte);
        self.buf.clear();
        self.bad_escapes += 1;
    }

    /// Frames delivered so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Frames lost to capacity overruns.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Frames lost to invalid escape sequences.
    pub fn bad_escapes(&self) -> u64 {
        self.bad_escapes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(decoder: &mut FrameDecoder, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        for &b in bytes {
            if let Some(frame) = decoder.feed(b) {
                frames.push(frame);
            }
        }
        frames
    }

    #[test]
    fn test_round_trip() {
        let payload = b"\x02\x02hello, world";
        let encoded = encode_frame(payload, 128).unwrap();

        let mut decoder = FrameDecoder::new(128);
        let frames = feed_all(&mut decoder, &encoded);

        assert_eq!(frames, vec![payload.to_vec()]);
        assert_eq!(decoder.frames(), 1);
    }

    #[test]
    fn test_escape_substitution() {
        let payload = [0x01, END, 0x02, ESC, 0x03];
        let encoded = encode_frame(&payload, 128).unwrap();

        assert_eq!(
            encoded,
            vec![END, 0x01, ESC, ESC_END, 0x02, ESC, ESC_ESC, 0x03, END]
        );

        let mut decoder = FrameDecoder::new(128);
        assert_eq!(feed_all(&mut decoder, &encoded), vec![payload.to_vec()]);
    }

    #[test]
    fn test_stray_boundaries_yield_nothing() {
        let mut decoder = FrameDecoder::new(128);
        assert!(feed_all(&mut decoder, &[END, END, END]).is_empty());
        assert_eq!(decoder.frames(), 0);
    }

    #[test]
    fn test_overrun_resyncs_on_next_boundary() {
        let mut decoder = FrameDecoder::new(4);

        // Nine literals without a boundary, then a well-formed frame.
        let mut stream = vec![1, 2, 3, 4, 5, 6, 7, 8, 9, END];
        stream.extend(encode_frame(b"ok", 4).unwrap());

        let frames = feed_all(&mut decoder, &stream);
        assert_eq!(frames, vec![b"ok".to_vec()]);
        assert_eq!(decoder.overruns(), 1);
        assert_eq!(decoder.frames(), 1);
    }

    #[test]
    fn test_invalid_escape_discards_frame() {
        let mut decoder = FrameDecoder::new(128);

        let mut stream = vec![0x41, ESC, 0x00, 0x42, 0x43, END];
        stream.extend(encode_frame(b"ok", 128).unwrap());

        let frames = feed_all(&mut decoder, &stream);
        assert_eq!(frames, vec![b"ok".to_vec()]);
        assert_eq!(decoder.bad_escapes(), 1);
    }

    #[test]
    fn test_escape_then_boundary_closes_broken_frame() {
        let mut decoder = FrameDecoder::new(128);

        // ESC directly before the boundary loses the frame, but the very
        // next frame must decode.
        let mut stream = vec![0x41, ESC, END];
        stream.extend(encode_frame(b"ok", 128).unwrap());

        let frames = feed_all(&mut decoder, &stream);
        assert_eq!(frames, vec![b"ok".to_vec()]);
        assert_eq!(decoder.bad_escapes(), 1);
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut stream = encode_frame(b"one", 128).unwrap();
        stream.extend(encode_frame(b"two", 128).unwrap());

        let mut decoder = FrameDecoder::new(128);
        let frames = feed_all(&mut decoder, &stream);
        assert_eq!(frames, vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let payload = vec![0u8; 129];
        assert!(encode_frame(&payload, 128).is_err());
    }

    #[test]
    fn test_payload_at_capacity_round_trips() {
        let payload = vec![END; 64];
        let encoded = encode_frame(&payload, 64).unwrap();

        let mut decoder = FrameDecoder::new(64);
        assert_eq!(feed_all(&mut decoder, &encoded), vec![payload]);
    }
}
