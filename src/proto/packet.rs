//! Packet layer
//!
//! Each frame carries one packet: a two-byte opcode header followed by an
//! opcode-specific payload. The opcode byte is repeated on the wire; a
//! header whose bytes disagree, or that names no known opcode, drops the
//! packet without a reply.

/// Protocol opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Ask the terminal to identify itself.
    Termspec = 0x00,
    /// Collect all keystrokes buffered since the last poll.
    KeyPoll = 0x01,
    /// Deliver bytes for the terminal's display.
    DisplayWrite = 0x02,
    /// End the session. The only packet that takes no reply.
    Interrupt = 0x03,
}

impl Opcode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Opcode::Termspec),
            0x01 => Some(Opcode::KeyPoll),
            0x02 => Some(Opcode::DisplayWrite),
            0x03 => Some(Opcode::Interrupt),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// One decoded packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub opcode: Opcode,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(opcode: Opcode, payload: Vec<u8>) -> Self {
        Self { opcode, payload }
    }

    /// A packet with no payload, header only.
    pub fn header(opcode: Opcode) -> Self {
        Self::new(opcode, Vec::new())
    }

    /// Parse a decoded frame. `None` means the frame is not acted upon:
    /// too short, header bytes disagree, or the opcode is unknown.
    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < 2 {
            return None;
        }
        if frame[0] != frame[1] {
            return None;
        }
        let opcode = Opcode::from_u8(frame[0])?;
        Some(Self::new(opcode, frame[2..].to_vec()))
    }

    /// Serialize into the frame payload: doubled tag, then the bytes.
    pub fn encode(&self) -> Vec<u8> {
        let tag = self.opcode.as_u8();
        let mut out = Vec::with_capacity(self.payload.len() + 2);
        out.push(tag);
        out.push(tag);
        out.extend_from_slice(&self.payload);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_values() {
        assert_eq!(Opcode::from_u8(0x00), Some(Opcode::Termspec));
        assert_eq!(Opcode::from_u8(0x01), Some(Opcode::KeyPoll));
        assert_eq!(Opcode::from_u8(0x02), Some(Opcode::DisplayWrite));
        assert_eq!(Opcode::from_u8(0x03), Some(Opcode::Interrupt));
        assert_eq!(Opcode::from_u8(0x04), None);
        assert_eq!(Opcode::from_u8(0x09), None);

        assert_eq!(Opcode::DisplayWrite.as_u8(), 0x02);
    }

    #[test]
    fn test_encode_doubles_the_tag() {
        let packet = Packet::new(Opcode::DisplayWrite, b"hi".to_vec());
        assert_eq!(packet.encode(), vec![0x02, 0x02, b'h', b'i']);

        let empty = Packet::header(Opcode::KeyPoll);
        assert_eq!(empty.encode(), vec![0x01, 0x01]);
    }

    #[test]
    fn test_parse_round_trip() {
        let packet = Packet::new(Opcode::Termspec, b"vt-ish".to_vec());
        assert_eq!(Packet::parse(&packet.encode()), Some(packet));
    }

    #[test]
    fn test_parse_rejects_short_frames() {
        assert_eq!(Packet::parse(&[]), None);
        assert_eq!(Packet::parse(&[0x01]), None);
    }

    #[test]
    fn test_parse_rejects_mismatched_header() {
        assert_eq!(Packet::parse(&[0x01, 0x02]), None);
        assert_eq!(Packet::parse(&[0x02, 0x01, b'x']), None);
    }

    #[test]
    fn test_parse_rejects_unknown_opcode() {
        assert_eq!(Packet::parse(&[0x09, 0x09]), None);
        assert_eq!(Packet::parse(&[0xFF, 0xFF, 1, 2, 3]), None);
    }
}
