//! Bit-exact encode/decode for every packet type this endpoint produces or
//! consumes. Each submodule exposes a `parse` / `build` pair; bit order is
//! MSB-first, multi-byte integers are big-endian.

pub mod exchange;
pub mod journal;
pub mod midi;
pub mod timestamp;

pub use exchange::{ExchangeCommand, ExchangePacket};
pub use journal::{ChannelJournal, Journal, SystemJournal};
pub use midi::{MidiEvent, MidiEventKind, MidiPacket, RtpHeader};
pub use timestamp::TimestampPacket;
