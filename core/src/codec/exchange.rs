//! AppleMIDI session-control ("exchange") packets: `IN`, `OK`, `NO`, `BY`.

use std::fmt;

use crate::error::ParseError;

const PREAMBLE: u16 = 0xFFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeCommand {
    Invitation,
    Accepted,
    Rejected,
    Exit,
}

impl ExchangeCommand {
    fn wire(self) -> [u8; 2] {
        match self {
            ExchangeCommand::Invitation => *b"IN",
            ExchangeCommand::Accepted => *b"OK",
            ExchangeCommand::Rejected => *b"NO",
            ExchangeCommand::Exit => *b"BY",
        }
    }

    fn from_wire(bytes: [u8; 2]) -> Result<Self, ParseError> {
        match &bytes {
            b"IN" => Ok(ExchangeCommand::Invitation),
            b"OK" => Ok(ExchangeCommand::Accepted),
            b"NO" => Ok(ExchangeCommand::Rejected),
            b"BY" => Ok(ExchangeCommand::Exit),
            _ => Err(ParseError::UnknownCommand(bytes)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangePacket {
    pub command: ExchangeCommand,
    pub protocol_version: u32,
    pub initiator_token: u32,
    pub ssrc: u32,
    pub name: Option<String>,
}

impl fmt::Display for ExchangePacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let command = std::str::from_utf8(&self.command.wire()).unwrap_or("??");
        write!(f, "AppleMIDIExchangePacket [command={command} ssrc={:#x}", self.ssrc)?;
        if let Some(name) = &self.name {
            write!(f, " name={name}")?;
        }
        write!(f, "]")
    }
}

const FIXED_LEN: usize = 2 + 2 + 4 + 4 + 4; // preamble, command, version, token, ssrc

pub fn parse(buf: &[u8]) -> Result<ExchangePacket, ParseError> {
    if buf.len() < FIXED_LEN {
        return Err(ParseError::Truncated {
            need: FIXED_LEN,
            have: buf.len(),
        });
    }
    let preamble = u16::from_be_bytes([buf[0], buf[1]]);
    if preamble != PREAMBLE {
        return Err(ParseError::Preamble);
    }
    let command = ExchangeCommand::from_wire([buf[2], buf[3]])?;
    let protocol_version = u32::from_be_bytes(buf[4..8].try_into().unwrap());
    let initiator_token = u32::from_be_bytes(buf[8..12].try_into().unwrap());
    let ssrc = u32::from_be_bytes(buf[12..16].try_into().unwrap());

    let name = if buf.len() > FIXED_LEN {
        let rest = &buf[FIXED_LEN..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(ParseError::UnterminatedName)?;
        let name = &rest[..nul];
        if !name.is_ascii() {
            return Err(ParseError::InvalidName);
        }
        Some(String::from_utf8(name.to_vec()).map_err(|_| ParseError::InvalidName)?)
    } else {
        None
    };

    Ok(ExchangePacket {
        command,
        protocol_version,
        initiator_token,
        ssrc,
        name,
    })
}

pub fn build(packet: &ExchangePacket) -> Vec<u8> {
    let mut out = Vec::with_capacity(FIXED_LEN + packet.name.as_ref().map_or(0, |n| n.len() + 1));
    out.extend_from_slice(&PREAMBLE.to_be_bytes());
    out.extend_from_slice(&packet.command.wire());
    out.extend_from_slice(&packet.protocol_version.to_be_bytes());
    out.extend_from_slice(&packet.initiator_token.to_be_bytes());
    out.extend_from_slice(&packet.ssrc.to_be_bytes());
    if let Some(name) = &packet.name {
        out.extend_from_slice(name.as_bytes());
        out.push(0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A captured `IN` invitation, minus its NUL name terminator (appended
    /// by each test; the terminator is easy to drop when transcribing
    /// packet hex by hand).
    const INVITATION: [u8; 29] = [
        0xff, 0xff, 0x49, 0x4e, 0x00, 0x00, 0x00, 0x02, 0x66, 0x33, 0x48, 0x73, 0x47, 0xd8, 0x10,
        0x96, 0x6d, 0x62, 0x6f, 0x6f, 0x6b, 0x2d, 0x73, 0x65, 0x73, 0x73, 0x69, 0x6f, 0x6e,
    ];

    /// A captured `BY` exit notification.
    const EXIT: [u8; 16] = [
        0xff, 0xff, 0x42, 0x59, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x47, 0xd8, 0x10,
        0x96,
    ];

    #[test]
    fn parses_invitation() {
        let mut buf = INVITATION.to_vec();
        buf.push(0); // NUL terminator for the name
        let packet = parse(&buf).unwrap();
        assert_eq!(packet.command, ExchangeCommand::Invitation);
        assert_eq!(packet.protocol_version, 2);
        assert_eq!(packet.initiator_token, 0x66334873);
        assert_eq!(packet.ssrc, 0x47D81096);
        assert_eq!(packet.name.as_deref(), Some("mbook-session"));
    }

    #[test]
    fn parses_exit_with_no_name() {
        let packet = parse(&EXIT).unwrap();
        assert_eq!(packet.command, ExchangeCommand::Exit);
        assert_eq!(packet.initiator_token, 0);
        assert_eq!(packet.ssrc, 1205342358);
        assert_eq!(packet.name, None);
    }

    #[test]
    fn round_trips_without_name() {
        let packet = parse(&EXIT).unwrap();
        assert_eq!(build(&packet), EXIT);
    }

    #[test]
    fn round_trips_with_name() {
        let mut buf = INVITATION.to_vec();
        buf.push(0);
        let packet = parse(&buf).unwrap();
        assert_eq!(build(&packet), buf);
    }

    #[test]
    fn rejects_bad_preamble() {
        let mut buf = EXIT;
        buf[0] = 0x00;
        assert_eq!(parse(&buf), Err(ParseError::Preamble));
    }

    #[test]
    fn truncated_name_is_an_error() {
        let mut buf = INVITATION.to_vec();
        // no NUL appended: name runs off the end of the buffer
        assert_eq!(parse(&buf), Err(ParseError::UnterminatedName));
        buf.clear();
    }

    #[test]
    fn non_ascii_name_is_an_error() {
        let mut buf = EXIT[..FIXED_LEN].to_vec();
        buf[2..4].copy_from_slice(b"IN");
        buf.extend_from_slice(&[0xE9, 0x00]); // 'é' in Latin-1, not ASCII
        assert_eq!(parse(&buf), Err(ParseError::InvalidName));
    }

    #[test]
    fn display_renders_command_ssrc_and_name() {
        let mut buf = INVITATION.to_vec();
        buf.push(0);
        let packet = parse(&buf).unwrap();
        assert_eq!(
            packet.to_string(),
            "AppleMIDIExchangePacket [command=IN ssrc=0x47d81096 name=mbook-session]"
        );
    }

    #[test]
    fn display_omits_name_when_absent() {
        let packet = parse(&EXIT).unwrap();
        assert_eq!(packet.to_string(), "AppleMIDIExchangePacket [command=BY ssrc=0x47d81096]");
    }
}
