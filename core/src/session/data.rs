//! Data-port state machine: clock-sync (`CK`) and MIDI packet reception.
//!
//! Like [`super::control::ControlProtocol`], this performs no socket I/O.
//! It holds a mirror of the peer table, kept in sync only by explicit
//! `add_peer`/`remove_peer` calls driven by the control protocol's outcomes
//! (a one-way link; the data side never reaches back into control).

use crate::codec::{midi, timestamp, MidiPacket, TimestampPacket};
use crate::error::{ParseError, ProtocolError};
use crate::peer::{Peer, PeerTable};

const PREAMBLE: [u8; 2] = [0xFF, 0xFF];
const CK_COMMAND: [u8; 2] = *b"CK";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataOutcome {
    /// Reply with this `CK` packet (steps 0->1 and 1->2 of the handshake).
    TimestampReply(TimestampPacket),
    /// The final step (`count=2`) produced a clock offset estimate, in
    /// 100 microsecond units. No reply is sent.
    ClockOffset { ssrc: u32, offset_100us: i64 },
    /// A MIDI packet from a registered peer.
    MidiReceived { peer: Peer, packet: MidiPacket },
    /// A MIDI packet from an SSRC with no registered peer; dropped at debug.
    DroppedUnknownPeer { ssrc: u32 },
    /// A structurally valid packet that violates session-protocol
    /// expectations; already logged at the appropriate level.
    Error(ProtocolError),
}

pub struct DataProtocol {
    pub local_ssrc: u32,
    peers: PeerTable,
}

impl DataProtocol {
    pub fn new(local_ssrc: u32) -> Self {
        DataProtocol {
            local_ssrc,
            peers: PeerTable::new(),
        }
    }

    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    /// Mirrors a peer registered by the paired control protocol.
    pub fn add_peer(&mut self, peer: Peer) {
        self.peers.register(peer);
    }

    /// Mirrors a removal driven by the paired control protocol.
    pub fn remove_peer(&mut self, ssrc: u32) {
        self.peers.unregister(ssrc);
    }

    /// Handles one datagram arriving on the data socket. `now_100us` is the
    /// caller's current timestamp in 100-microsecond units (passed in
    /// explicitly, rather than read from the wall clock here, so the state
    /// machine stays a pure function of its inputs).
    pub fn handle_datagram(&mut self, buf: &[u8], now_100us: u64) -> Result<DataOutcome, ParseError> {
        if buf.len() >= 4 && buf[0..2] == PREAMBLE {
            if buf[2..4] == CK_COMMAND {
                let packet = timestamp::parse(buf)?;
                return Ok(self.handle_timestamp(&packet, now_100us));
            }
            log::warn!("unexpected command {:?} on data port; ignoring", &buf[2..4]);
            return Ok(DataOutcome::Error(ProtocolError::UnexpectedCommand("data port")));
        }

        let packet = midi::parse(buf)?;
        match self.peers.lookup(packet.header.ssrc) {
            Some(peer) => Ok(DataOutcome::MidiReceived {
                peer: peer.clone(),
                packet,
            }),
            None => {
                log::debug!("dropping MIDI packet from unknown ssrc {:#x}", packet.header.ssrc);
                Ok(DataOutcome::DroppedUnknownPeer { ssrc: packet.header.ssrc })
            }
        }
    }

    fn handle_timestamp(&self, packet: &TimestampPacket, now_100us: u64) -> DataOutcome {
        match packet.count {
            0 => DataOutcome::TimestampReply(TimestampPacket {
                ssrc: self.local_ssrc,
                count: 1,
                t1: packet.t1,
                t2: now_100us,
                t3: 0,
            }),
            1 => DataOutcome::TimestampReply(TimestampPacket {
                ssrc: self.local_ssrc,
                count: 2,
                t1: packet.t1,
                t2: packet.t2,
                t3: now_100us,
            }),
            2 => {
                let offset = (packet.t3 as i64 + packet.t1 as i64) / 2 - packet.t2 as i64;
                DataOutcome::ClockOffset { ssrc: packet.ssrc, offset_100us: offset }
            }
            other => {
                log::warn!("unknown CK count {other}; ignoring");
                DataOutcome::Error(ProtocolError::UnexpectedCommand("CK count"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RtpHeader;

    fn peer(ssrc: u32) -> Peer {
        Peer {
            name: "remote".into(),
            addr: "127.0.0.1:5052".parse().unwrap(),
            ssrc,
        }
    }

    fn ck_packet(ssrc: u32, count: u8, t1: u64, t2: u64, t3: u64) -> Vec<u8> {
        timestamp::build(&TimestampPacket { ssrc, count, t1, t2, t3 })
    }

    #[test]
    fn ck_count_zero_replies_with_count_one() {
        let mut data = DataProtocol::new(0xAABBCCDD);
        let buf = ck_packet(1, 0, 1000, 0, 0);
        let outcome = data.handle_datagram(&buf, 5000).unwrap();
        match outcome {
            DataOutcome::TimestampReply(reply) => {
                assert_eq!(reply.count, 1);
                assert_eq!(reply.ssrc, 0xAABBCCDD);
                assert_eq!(reply.t1, 1000);
                assert_eq!(reply.t2, 5000);
                assert_eq!(reply.t3, 0);
            }
            other => panic!("expected TimestampReply, got {other:?}"),
        }
    }

    #[test]
    fn ck_count_two_computes_zero_offset_for_matched_clocks() {
        let mut data = DataProtocol::new(1);
        let buf = ck_packet(1, 2, 1000, 1000, 1000);
        let outcome = data.handle_datagram(&buf, 99999).unwrap();
        assert_eq!(
            outcome,
            DataOutcome::ClockOffset { ssrc: 1, offset_100us: 0 }
        );
    }

    #[test]
    fn midi_packet_from_registered_peer_is_delivered() {
        let mut data = DataProtocol::new(1);
        data.add_peer(peer(0x42));
        let packet = MidiPacket {
            header: RtpHeader::canonical(1, 0, 0x42),
            z: false,
            p: false,
            events: vec![],
            journal: None,
        };
        let bytes = midi::build(&packet).unwrap();
        let outcome = data.handle_datagram(&bytes, 0).unwrap();
        match outcome {
            DataOutcome::MidiReceived { peer, .. } => assert_eq!(peer.ssrc, 0x42),
            other => panic!("expected MidiReceived, got {other:?}"),
        }
    }

    #[test]
    fn midi_packet_from_unknown_peer_is_dropped() {
        let mut data = DataProtocol::new(1);
        let packet = MidiPacket {
            header: RtpHeader::canonical(1, 0, 0x99),
            z: false,
            p: false,
            events: vec![],
            journal: None,
        };
        let bytes = midi::build(&packet).unwrap();
        let outcome = data.handle_datagram(&bytes, 0).unwrap();
        assert_eq!(outcome, DataOutcome::DroppedUnknownPeer { ssrc: 0x99 });
    }

    #[test]
    fn remove_peer_stops_further_delivery() {
        let mut data = DataProtocol::new(1);
        data.add_peer(peer(5));
        data.remove_peer(5);
        assert!(!data.peers().contains(5));
    }

    #[test]
    fn unknown_ck_count_is_an_unexpected_command_error() {
        let mut data = DataProtocol::new(1);
        let buf = ck_packet(1, 3, 0, 0, 0);
        let outcome = data.handle_datagram(&buf, 0).unwrap();
        assert_eq!(outcome, DataOutcome::Error(ProtocolError::UnexpectedCommand("CK count")));
    }

    #[test]
    fn unrecognized_data_port_command_is_an_unexpected_command_error() {
        let mut data = DataProtocol::new(1);
        let mut buf = vec![0xff, 0xff];
        buf.extend_from_slice(b"XX");
        let outcome = data.handle_datagram(&buf, 0).unwrap();
        assert_eq!(outcome, DataOutcome::Error(ProtocolError::UnexpectedCommand("data port")));
    }
}
