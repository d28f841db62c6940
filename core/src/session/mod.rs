//! Two coupled state machines driving a session binding: [`control`] reacts
//! to exchange packets on the control port, [`data`] reacts to clock-sync
//! and MIDI packets on the data port. They share only the local SSRC; the
//! control protocol is the peer table's owner and the data protocol holds
//! a mirror, linked one-way into data and never the reverse.

pub mod control;
pub mod data;

pub use control::{ControlOutcome, ControlProtocol};
pub use data::{DataOutcome, DataProtocol};
