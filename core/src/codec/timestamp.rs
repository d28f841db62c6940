//! AppleMIDI clock-sync ("CK") packets.

use crate::error::ParseError;

const PREAMBLE: u16 = 0xFFFF;
const COMMAND: [u8; 2] = *b"CK";
const LEN: usize = 2 + 2 + 4 + 1 + 3 + 8 + 8 + 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampPacket {
    pub ssrc: u32,
    pub count: u8,
    pub t1: u64,
    pub t2: u64,
    pub t3: u64,
}

pub fn parse(buf: &[u8]) -> Result<TimestampPacket, ParseError> {
    if buf.len() < LEN {
        return Err(ParseError::Truncated { need: LEN, have: buf.len() });
    }
    let preamble = u16::from_be_bytes([buf[0], buf[1]]);
    if preamble != PREAMBLE {
        return Err(ParseError::Preamble);
    }
    if buf[2..4] != COMMAND {
        return Err(ParseError::UnknownCommand([buf[2], buf[3]]));
    }
    let ssrc = u32::from_be_bytes(buf[4..8].try_into().unwrap());
    let count = buf[8];
    // buf[9..12] is 3 bytes of ignored padding.
    let t1 = u64::from_be_bytes(buf[12..20].try_into().unwrap());
    let t2 = u64::from_be_bytes(buf[20..28].try_into().unwrap());
    let t3 = u64::from_be_bytes(buf[28..36].try_into().unwrap());
    Ok(TimestampPacket { ssrc, count, t1, t2, t3 })
}

pub fn build(packet: &TimestampPacket) -> Vec<u8> {
    let mut out = Vec::with_capacity(LEN);
    out.extend_from_slice(&PREAMBLE.to_be_bytes());
    out.extend_from_slice(&COMMAND);
    out.extend_from_slice(&packet.ssrc.to_be_bytes());
    out.push(packet.count);
    out.extend_from_slice(&[0, 0, 0]);
    out.extend_from_slice(&packet.t1.to_be_bytes());
    out.extend_from_slice(&packet.t2.to_be_bytes());
    out.extend_from_slice(&packet.t3.to_be_bytes());
    out
}
