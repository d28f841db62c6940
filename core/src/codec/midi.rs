//! RTP-MIDI data packets: the 12-byte RTP header, the command section with
//! its running-status-compressed event list, and the (opaque) recovery
//! journal.

use std::fmt;

use crate::codec::journal::{self, Journal};
use crate::error::{BuildError, ParseError};
use crate::note::note_to_name;

const RTP_HEADER_LEN: usize = 12;

/// The 12-byte RTP header. All eight "constant" fields are preserved
/// verbatim on round-trip; the codec never rejects a packet on the basis
/// of a non-canonical flag value, since real peers violate them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    pub version: u8,
    pub padding: bool,
    pub extension: bool,
    pub csrc_count: u8,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

impl RtpHeader {
    /// The header a conforming encoder writes: V=2, P=0, X=0, CC=0, M=1, PT=0x61.
    pub fn canonical(sequence_number: u16, timestamp: u32, ssrc: u32) -> Self {
        RtpHeader {
            version: 2,
            padding: false,
            extension: false,
            csrc_count: 0,
            marker: true,
            payload_type: 0x61,
            sequence_number,
            timestamp,
            ssrc,
        }
    }

    fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.len() < RTP_HEADER_LEN {
            return Err(ParseError::Truncated {
                need: RTP_HEADER_LEN,
                have: buf.len(),
            });
        }
        Ok(RtpHeader {
            version: buf[0] >> 6,
            padding: buf[0] & 0x20 != 0,
            extension: buf[0] & 0x10 != 0,
            csrc_count: buf[0] & 0x0F,
            marker: buf[1] & 0x80 != 0,
            payload_type: buf[1] & 0x7F,
            sequence_number: u16::from_be_bytes([buf[2], buf[3]]),
            timestamp: u32::from_be_bytes(buf[4..8].try_into().unwrap()),
            ssrc: u32::from_be_bytes(buf[8..12].try_into().unwrap()),
        })
    }

    fn build(&self, out: &mut Vec<u8>) {
        let byte0 = (self.version << 6)
            | (if self.padding { 0x20 } else { 0 })
            | (if self.extension { 0x10 } else { 0 })
            | (self.csrc_count & 0x0F);
        let byte1 = (if self.marker { 0x80 } else { 0 }) | (self.payload_type & 0x7F);
        out.push(byte0);
        out.push(byte1);
        out.extend_from_slice(&self.sequence_number.to_be_bytes());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&self.ssrc.to_be_bytes());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiEventKind {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8, velocity: u8 },
    Aftertouch { channel: u8, key: u8, touch: u8 },
    ControlModeChange { channel: u8, controller: u8, value: u8 },
    /// An unrecognized status nibble. Its length is unknowable, so it
    /// swallows the rest of the event list; no further events follow it.
    Other { status: u8, data: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiEvent {
    /// Ticks since the previous event. Meaningless (and never serialized)
    /// for the first event of a list.
    pub delta_time: u32,
    pub kind: MidiEventKind,
}

impl fmt::Display for MidiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            MidiEventKind::NoteOn { key, .. } => write!(f, "note_on {}", note_to_name(*key)),
            MidiEventKind::NoteOff { key, .. } => write!(f, "note_off {}", note_to_name(*key)),
            MidiEventKind::Aftertouch { key, .. } => write!(f, "aftertouch {}", note_to_name(*key)),
            MidiEventKind::ControlModeChange { controller, value, .. } => {
                write!(f, "control_mode_change {controller}={value}")
            }
            MidiEventKind::Other { status, .. } => write!(f, "other({status:#x})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiPacket {
    pub header: RtpHeader,
    pub z: bool,
    pub p: bool,
    pub events: Vec<MidiEvent>,
    pub journal: Option<Journal>,
}

impl fmt::Display for MidiPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MidiPacket [seq={}", self.header.sequence_number)?;
        for event in &self.events {
            write!(f, " {event}")?;
        }
        write!(f, "]")
    }
}

pub fn parse_variable_length_quantity(buf: &[u8]) -> Result<(u32, usize), ParseError> {
    let mut value: u32 = 0;
    for (i, &byte) in buf.iter().enumerate() {
        if i == 4 {
            return Err(ParseError::VlqOverflow);
        }
        value = (value << 7) | (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(ParseError::Truncated { need: 1, have: 0 })
}

pub fn encode_variable_length_quantity(mut value: u32) -> Vec<u8> {
    let mut bytes = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        bytes.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    bytes.reverse();
    bytes
}

fn parse_event_list(buf: &[u8]) -> Result<Vec<MidiEvent>, ParseError> {
    let mut events = Vec::new();
    let mut last_status: Option<u8> = None;
    let mut idx = 0;

    while idx < buf.len() {
        let delta_time = if events.is_empty() {
            0
        } else {
            match parse_variable_length_quantity(&buf[idx..]) {
                Ok((value, consumed)) => {
                    idx += consumed;
                    value
                }
                Err(_) => break, // truncated mid-event: stop defensively
            }
        };
        if idx >= buf.len() {
            break;
        }

        let first = buf[idx];
        let status = if first & 0x80 != 0 {
            idx += 1;
            last_status = Some(first);
            first
        } else {
            last_status.ok_or(ParseError::RunningStatusUnderflow)?
        };
        let channel = status & 0x0F;
        let kind = match status & 0xF0 {
            0x80 => {
                if idx + 2 > buf.len() {
                    break;
                }
                let (key, velocity) = (buf[idx], buf[idx + 1]);
                idx += 2;
                MidiEventKind::NoteOff { channel, key, velocity }
            }
            0x90 => {
                if idx + 2 > buf.len() {
                    break;
                }
                let (key, velocity) = (buf[idx], buf[idx + 1]);
                idx += 2;
                MidiEventKind::NoteOn { channel, key, velocity }
            }
            0xA0 => {
                if idx + 2 > buf.len() {
                    break;
                }
                let (key, touch) = (buf[idx], buf[idx + 1]);
                idx += 2;
                MidiEventKind::Aftertouch { channel, key, touch }
            }
            0xB0 => {
                if idx + 2 > buf.len() {
                    break;
                }
                let (controller, value) = (buf[idx], buf[idx + 1]);
                idx += 2;
                MidiEventKind::ControlModeChange { channel, controller, value }
            }
            _ => {
                let data = buf[idx..].to_vec();
                idx = buf.len();
                MidiEventKind::Other { status, data }
            }
        };
        let terminal = matches!(kind, MidiEventKind::Other { .. });
        events.push(MidiEvent { delta_time, kind });
        if terminal {
            break;
        }
    }
    Ok(events)
}

fn build_event_list(events: &[MidiEvent]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, event) in events.iter().enumerate() {
        if i > 0 {
            out.extend(encode_variable_length_quantity(event.delta_time));
        }
        match &event.kind {
            MidiEventKind::NoteOff { channel, key, velocity } => {
                out.push(0x80 | (channel & 0x0F));
                out.push(*key);
                out.push(*velocity);
            }
            MidiEventKind::NoteOn { channel, key, velocity } => {
                out.push(0x90 | (channel & 0x0F));
                out.push(*key);
                out.push(*velocity);
            }
            MidiEventKind::Aftertouch { channel, key, touch } => {
                out.push(0xA0 | (channel & 0x0F));
                out.push(*key);
                out.push(*touch);
            }
            MidiEventKind::ControlModeChange { channel, controller, value } => {
                out.push(0xB0 | (channel & 0x0F));
                out.push(*controller);
                out.push(*value);
            }
            MidiEventKind::Other { status, data } => {
                out.push(*status);
                out.extend_from_slice(data);
            }
        }
    }
    out
}

pub fn parse(buf: &[u8]) -> Result<MidiPacket, ParseError> {
    let header = RtpHeader::parse(buf)?;
    let mut offset = RTP_HEADER_LEN;

    if buf.len() <= offset {
        return Err(ParseError::Truncated { need: offset + 1, have: buf.len() });
    }
    let flags = buf[offset];
    let b = flags & 0x80 != 0;
    let j = flags & 0x40 != 0;
    let z = flags & 0x20 != 0;
    let p = flags & 0x10 != 0;
    let len = if b {
        if buf.len() <= offset + 1 {
            return Err(ParseError::Truncated { need: offset + 2, have: buf.len() });
        }
        let len = (((flags & 0x0F) as u16) << 8) | buf[offset + 1] as u16;
        offset += 2;
        len as usize
    } else {
        offset += 1;
        (flags & 0x0F) as usize
    };

    if buf.len() < offset + len {
        return Err(ParseError::Truncated {
            need: offset + len,
            have: buf.len(),
        });
    }
    let events = parse_event_list(&buf[offset..offset + len])?;
    offset += len;

    let journal = if j {
        let (journal, consumed) = journal::parse(&buf[offset..])?;
        offset += consumed;
        Some(journal)
    } else {
        None
    };
    let _ = offset;

    Ok(MidiPacket { header, z, p, events, journal })
}

pub fn build(packet: &MidiPacket) -> Result<Vec<u8>, BuildError> {
    let mut out = Vec::with_capacity(RTP_HEADER_LEN + 16);
    packet.header.build(&mut out);

    let body = build_event_list(&packet.events);
    if body.len() > 0xFFF {
        return Err(BuildError::LengthOverflow(body.len()));
    }
    let j = packet.journal.is_some();
    if body.len() <= 0x0F {
        let flags = (if j { 0x40 } else { 0 })
            | (if packet.z { 0x20 } else { 0 })
            | (if packet.p { 0x10 } else { 0 })
            | (body.len() as u8 & 0x0F);
        out.push(flags);
    } else {
        let flags = 0x80
            | (if j { 0x40 } else { 0 })
            | (if packet.z { 0x20 } else { 0 })
            | (if packet.p { 0x10 } else { 0 })
            | ((body.len() >> 8) as u8 & 0x0F);
        out.push(flags);
        out.push((body.len() & 0xFF) as u8);
    }
    out.extend_from_slice(&body);
    if let Some(journal) = &packet.journal {
        journal::build(journal, &mut out);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A captured single note-on packet, with its recovery journal.
    const SINGLE_NOTE_ON: [u8; 25] = [
        0x80, 0x61, 0x42, 0x7a, 0x4b, 0x9f, 0x30, 0x36, 0x47, 0xd8, 0x10, 0x96, 0x43, 0x90, 0x30,
        0x26, 0x20, 0x42, 0x76, 0x00, 0x06, 0x08, 0x00, 0x66, 0x85,
    ];

    /// A captured two-note packet using running status on the second event.
    const RUNNING_STATUS: [u8; 37] = [
        0x80, 0x61, 0x42, 0x9a, 0x51, 0xd2, 0xdc, 0x87, 0x47, 0xd8, 0x10, 0x96, 0x46, 0x90, 0x3e,
        0x31, 0x0a, 0x40, 0x3b, 0x21, 0x42, 0x7c, 0x00, 0x09, 0x08, 0x81, 0x67, 0x3c, 0x25, 0x0d,
        0x50, 0xc8, 0x06, 0x08, 0x80, 0x44, 0x0e,
    ];

    #[test]
    fn parses_scenario_4_single_note_on_with_journal() {
        let packet = parse(&SINGLE_NOTE_ON).unwrap();
        assert_eq!(packet.header.version, 2);
        assert!(!packet.header.marker); // sic: sample has M=0
        assert_eq!(packet.header.payload_type, 0x61);
        assert_eq!(packet.header.sequence_number, 17018);
        assert_eq!(packet.header.ssrc, 1205342358);
        assert!(!packet.z);
        assert!(!packet.p);
        assert_eq!(packet.events.len(), 1);
        match &packet.events[0].kind {
            MidiEventKind::NoteOn { channel, key, velocity } => {
                assert_eq!(*channel, 0);
                assert_eq!(*key, 48);
                assert_eq!(*velocity, 38);
            }
            other => panic!("expected note_on, got {other:?}"),
        }
        assert!(packet.journal.is_some());
    }

    #[test]
    fn parses_scenario_5_running_status() {
        let packet = parse(&RUNNING_STATUS).unwrap();
        assert_eq!(packet.header.sequence_number, 17050);
        assert_eq!(packet.events.len(), 2);
        match &packet.events[0].kind {
            MidiEventKind::NoteOn { channel, key, velocity } => {
                assert_eq!(*channel, 0);
                assert_eq!(*key, 62);
                assert_eq!(*velocity, 49);
            }
            other => panic!("expected note_on, got {other:?}"),
        }
        match &packet.events[1].kind {
            MidiEventKind::NoteOn { channel, key, velocity } => {
                assert_eq!(*channel, 0);
                assert_eq!(*key, 64);
                assert_eq!(*velocity, 59);
            }
            other => panic!("expected inherited note_on, got {other:?}"),
        }
    }

    #[test]
    fn control_mode_change_scenario_6() {
        // Only the command-section event bytes (`b0 6c 00`) were captured
        // for this sample; exercise the event-list decoder directly rather
        // than a full packet, since its journal bytes aren't available.
        let events = parse_event_list(&[0xb0, 0x6c, 0x00]).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0].kind {
            MidiEventKind::ControlModeChange { channel, controller, value } => {
                assert_eq!(*channel, 0);
                assert_eq!(*controller, 108);
                assert_eq!(*value, 0);
            }
            other => panic!("expected control_mode_change, got {other:?}"),
        }
    }

    #[test]
    fn zero_len_parses_to_empty_event_list() {
        let mut buf = Vec::new();
        RtpHeader::canonical(1, 0, 0xAABBCCDD).build(&mut buf);
        buf.push(0x00); // B=0 J=0 Z=0 P=0 LEN=0
        let packet = parse(&buf).unwrap();
        assert!(packet.events.is_empty());
        assert!(packet.journal.is_none());
    }

    #[test]
    fn first_event_with_no_running_status_is_underflow() {
        let mut buf = Vec::new();
        RtpHeader::canonical(1, 0, 1).build(&mut buf);
        buf.push(0x02); // LEN=2
        buf.push(0x30); // MSB clear: no status byte to inherit
        buf.push(0x40);
        assert_eq!(parse(&buf), Err(ParseError::RunningStatusUnderflow));
    }

    #[test]
    fn build_always_emits_explicit_status_bytes() {
        let packet = MidiPacket {
            header: RtpHeader::canonical(42, 1000, 0x47D81096),
            z: false,
            p: false,
            events: vec![
                MidiEvent { delta_time: 0, kind: MidiEventKind::NoteOn { channel: 0, key: 60, velocity: 100 } },
                MidiEvent { delta_time: 5, kind: MidiEventKind::NoteOn { channel: 0, key: 62, velocity: 90 } },
            ],
            journal: None,
        };
        let bytes = build(&packet).unwrap();
        let reparsed = parse(&bytes).unwrap();
        assert_eq!(reparsed.events, packet.events);
    }

    #[test]
    fn vlq_round_trips_and_caps_at_four_bytes() {
        for value in [0u32, 1, 127, 128, 16383, 16384, 0x0FFFFFFF] {
            let encoded = encode_variable_length_quantity(value);
            assert!(encoded.len() <= 4);
            let (decoded, consumed) = parse_variable_length_quantity(&encoded).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(consumed, encoded.len());
        }
    }
}
