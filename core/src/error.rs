use thiserror::Error;

/// Errors produced while decoding bytes off the wire.
///
/// Every variant here is something a malformed or hostile datagram can
/// trigger; callers at the protocol layer are expected to log and drop
/// rather than propagate these further.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ParseError {
    #[error("input too short: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("bad preamble: expected 0xFFFF")]
    Preamble,

    #[error("unknown AppleMIDI command {0:?}")]
    UnknownCommand([u8; 2]),

    #[error("name field has no NUL terminator")]
    UnterminatedName,

    #[error("name field is not valid ASCII")]
    InvalidName,

    #[error("variable-length quantity exceeds 4 bytes")]
    VlqOverflow,

    #[error("command byte missing and no running status to inherit")]
    RunningStatusUnderflow,

    #[error("journal length {len} underflows its {header} byte header")]
    JournalLengthUnderflow { len: u16, header: u16 },
}

/// Errors raised when constructing outgoing packets from caller-supplied data.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum BuildError {
    #[error("no note named {0:?}")]
    UnknownNote(String),

    #[error("command-section length {0} exceeds the 12-bit field (max 0xFFF)")]
    LengthOverflow(usize),
}

/// Errors raised when a structurally valid packet violates session-protocol
/// expectations (as opposed to a decode failure).
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ProtocolError {
    #[error("duplicate IN for already-registered ssrc {0:#x}")]
    DuplicateInvitation(u32),

    #[error("BY for unknown ssrc {0:#x}")]
    UnknownPeerExit(u32),

    #[error("unexpected command {0:?} on this socket")]
    UnexpectedCommand(&'static str),
}
