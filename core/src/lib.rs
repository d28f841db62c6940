//! Wire-protocol engine for an RTP-MIDI / AppleMIDI endpoint: packet codec,
//! note-name registry, peer table, and the control/data session protocols.
//!
//! Socket I/O, address-family detection, and CLI parsing are deliberately
//! out of scope for this crate — see the `rtp-midi` binary crate, which
//! drives these state machines over real UDP sockets.

pub mod codec;
pub mod error;
pub mod note;
pub mod peer;
pub mod session;

pub use error::{BuildError, ParseError, ProtocolError};
pub use note::{name_to_note, note_to_name};
pub use peer::{Peer, PeerTable};
pub use session::{ControlOutcome, ControlProtocol, DataOutcome, DataProtocol};
