//! RFC 6295 recovery journal — parsed and length-accounted for losslessly,
//! never applied. The core's job here is to consume exactly the journal's
//! byte range so the surrounding MIDI packet round-trips; the contents of
//! each sub-journal are kept as opaque bytes.

use crate::error::ParseError;

/// A system journal: present iff the outer header's `S` bit is set.
/// Its 2-byte header packs 6 flag bits followed by a 10-bit length that
/// includes the header itself; only the length is interpreted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemJournal {
    pub flags: u8,
    pub body: Vec<u8>,
}

/// One channel journal: present iff the outer header's `A` bit is set,
/// with `TOTCHAN + 1` of these appearing back to back. Each has a 3-byte
/// header (6 flag/channel bits, a 10-bit header-inclusive length, and a
/// trailing flags byte) that this core doesn't interpret beyond the length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelJournal {
    pub flags: u8,
    pub trailer: u8,
    pub body: Vec<u8>,
}

/// The outer recovery-journal header plus whichever sub-journals it
/// declares present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Journal {
    pub single_packet_loss: bool, // S
    pub ssrc_change_to_come: bool, // Y (reserved-for-future in RFC 6295, round-tripped only)
    pub channel_journal_present: bool, // A
    pub enhanced_encoding: bool, // H
    pub tot_chan: u8, // 4 bits: number of channel journals minus one
    pub checkpoint_sequence_number: u16,
    pub system: Option<SystemJournal>,
    pub channel: Vec<ChannelJournal>,
}

const OUTER_HEADER_LEN: usize = 3; // 1 flags byte + 2-byte checkpoint seq

pub fn parse(buf: &[u8]) -> Result<(Journal, usize), ParseError> {
    if buf.len() < OUTER_HEADER_LEN {
        return Err(ParseError::Truncated {
            need: OUTER_HEADER_LEN,
            have: buf.len(),
        });
    }
    let flags = buf[0];
    let single_packet_loss = flags & 0x80 != 0;
    let ssrc_change_to_come = flags & 0x40 != 0;
    let channel_journal_present = flags & 0x20 != 0;
    let enhanced_encoding = flags & 0x10 != 0;
    let tot_chan = flags & 0x0F;
    let checkpoint_sequence_number = u16::from_be_bytes([buf[1], buf[2]]);

    let mut offset = OUTER_HEADER_LEN;
    let mut system = None;
    if single_packet_loss {
        let (j, consumed) = parse_system(&buf[offset..])?;
        system = Some(j);
        offset += consumed;
    }
    let mut channel = Vec::new();
    if channel_journal_present {
        for _ in 0..=tot_chan {
            let (j, consumed) = parse_channel(&buf[offset..])?;
            channel.push(j);
            offset += consumed;
        }
    }

    Ok((
        Journal {
            single_packet_loss,
            ssrc_change_to_come,
            channel_journal_present,
            enhanced_encoding,
            tot_chan,
            checkpoint_sequence_number,
            system,
            channel,
        },
        offset,
    ))
}

fn parse_system(buf: &[u8]) -> Result<(SystemJournal, usize), ParseError> {
    const HEADER: usize = 2;
    if buf.len() < HEADER {
        return Err(ParseError::Truncated { need: HEADER, have: buf.len() });
    }
    let flags = buf[0] >> 2;
    let length = (((buf[0] & 0x03) as u16) << 8 | buf[1] as u16) as usize;
    if length < HEADER {
        return Err(ParseError::JournalLengthUnderflow {
            len: length as u16,
            header: HEADER as u16,
        });
    }
    let body_len = length - HEADER;
    if buf.len() < HEADER + body_len {
        return Err(ParseError::Truncated {
            need: HEADER + body_len,
            have: buf.len(),
        });
    }
    let body = buf[HEADER..HEADER + body_len].to_vec();
    Ok((SystemJournal { flags, body }, HEADER + body_len))
}

fn parse_channel(buf: &[u8]) -> Result<(ChannelJournal, usize), ParseError> {
    const HEADER: usize = 3;
    if buf.len() < HEADER {
        return Err(ParseError::Truncated { need: HEADER, have: buf.len() });
    }
    let flags = buf[0] >> 2;
    let length = (((buf[0] & 0x03) as u16) << 8 | buf[1] as u16) as usize;
    let trailer = buf[2];
    if length < HEADER {
        return Err(ParseError::JournalLengthUnderflow {
            len: length as u16,
            header: HEADER as u16,
        });
    }
    let body_len = length - HEADER;
    if buf.len() < HEADER + body_len {
        return Err(ParseError::Truncated {
            need: HEADER + body_len,
            have: buf.len(),
        });
    }
    let body = buf[HEADER..HEADER + body_len].to_vec();
    Ok((ChannelJournal { flags, trailer, body }, HEADER + body_len))
}

pub fn build(journal: &Journal, out: &mut Vec<u8>) {
    let mut flags = 0u8;
    if journal.single_packet_loss {
        flags |= 0x80;
    }
    if journal.ssrc_change_to_come {
        flags |= 0x40;
    }
    if journal.channel_journal_present {
        flags |= 0x20;
    }
    if journal.enhanced_encoding {
        flags |= 0x10;
    }
    flags |= journal.tot_chan & 0x0F;
    out.push(flags);
    out.extend_from_slice(&journal.checkpoint_sequence_number.to_be_bytes());

    if let Some(sys) = &journal.system {
        let length = (2 + sys.body.len()) as u16;
        out.push((sys.flags << 2) | ((length >> 8) as u8 & 0x03));
        out.push((length & 0xFF) as u8);
        out.extend_from_slice(&sys.body);
    }
    for chan in &journal.channel {
        let length = (3 + chan.body.len()) as u16;
        out.push((chan.flags << 2) | ((length >> 8) as u8 & 0x03));
        out.push((length & 0xFF) as u8);
        out.push(chan.trailer);
        out.extend_from_slice(&chan.body);
    }
}
