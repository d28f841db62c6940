//! Control-port state machine: reacts to `IN`/`BY` exchange packets.
//!
//! Pure and synchronous — no socket I/O happens here. `handle_message`
//! takes the decoded command and the peer table, and returns an outcome
//! describing what the caller (the server façade) should do: send a reply,
//! fire a handler callback, or nothing. This mirrors the
//! event-in/response-out shape used for RTP session peers in the wider
//! example pack, adapted to AppleMIDI's IN/BY instead of a bespoke event enum.

use std::net::SocketAddr;

use crate::codec::{ExchangeCommand, ExchangePacket};
use crate::error::ProtocolError;
use crate::peer::{Peer, PeerTable};

/// What the control protocol decided to do with an incoming exchange packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlOutcome {
    /// A peer was just accepted; send `reply` back to `addr` and fire
    /// `on_peer_connected(peer)`.
    Accepted { reply: ExchangePacket, peer: Peer },
    /// A peer exited; fire `on_peer_disconnected(peer)`. The caller must
    /// mirror this removal into the paired data protocol.
    Disconnected { peer: Peer },
    /// A structurally valid packet that violates session-protocol
    /// expectations; already logged at the appropriate level.
    Error(ProtocolError),
}

pub struct ControlProtocol {
    pub local_ssrc: u32,
    pub local_name: String,
    peers: PeerTable,
}

impl ControlProtocol {
    pub fn new(local_ssrc: u32, local_name: impl Into<String>) -> Self {
        ControlProtocol {
            local_ssrc,
            local_name: local_name.into(),
            peers: PeerTable::new(),
        }
    }

    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    /// Handles one already-decoded exchange packet arriving on the control
    /// socket from `addr`.
    pub fn handle_exchange(&mut self, packet: &ExchangePacket, addr: SocketAddr) -> ControlOutcome {
        match packet.command {
            ExchangeCommand::Invitation => self.handle_invitation(packet, addr),
            ExchangeCommand::Exit => self.handle_exit(packet),
            ExchangeCommand::Accepted | ExchangeCommand::Rejected => {
                let command = if packet.command == ExchangeCommand::Accepted { "OK" } else { "NO" };
                log::warn!("control protocol received {command} on the accepting side; ignoring");
                ControlOutcome::Error(ProtocolError::UnexpectedCommand(command))
            }
        }
    }

    fn handle_invitation(&mut self, packet: &ExchangePacket, addr: SocketAddr) -> ControlOutcome {
        if self.peers.contains(packet.ssrc) {
            log::warn!("duplicate IN for ssrc {:#x}; ignoring", packet.ssrc);
            return ControlOutcome::Error(ProtocolError::DuplicateInvitation(packet.ssrc));
        }
        let peer = Peer {
            name: packet.name.clone().unwrap_or_default(),
            addr,
            ssrc: packet.ssrc,
        };
        let peer = self.peers.register(peer);
        log::info!("accepted peer {peer}");
        let reply = ExchangePacket {
            command: ExchangeCommand::Accepted,
            protocol_version: 2,
            initiator_token: packet.initiator_token,
            ssrc: self.local_ssrc,
            name: Some(self.local_name.clone()),
        };
        ControlOutcome::Accepted { reply, peer }
    }

    fn handle_exit(&mut self, packet: &ExchangePacket) -> ControlOutcome {
        match self.peers.unregister(packet.ssrc) {
            Some(peer) => {
                log::info!("peer exited: {peer}");
                ControlOutcome::Disconnected { peer }
            }
            None => {
                log::warn!("BY for unknown ssrc {:#x}; ignoring", packet.ssrc);
                ControlOutcome::Error(ProtocolError::UnknownPeerExit(packet.ssrc))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:5051".parse().unwrap()
    }

    fn invitation(ssrc: u32, name: &str) -> ExchangePacket {
        ExchangePacket {
            command: ExchangeCommand::Invitation,
            protocol_version: 2,
            initiator_token: 42,
            ssrc,
            name: Some(name.to_string()),
        }
    }

    #[test]
    fn invitation_registers_peer_and_replies_ok() {
        let mut control = ControlProtocol::new(0xAABBCCDD, "local");
        let outcome = control.handle_exchange(&invitation(1, "remote"), addr());
        match outcome {
            ControlOutcome::Accepted { reply, peer } => {
                assert_eq!(reply.command, ExchangeCommand::Accepted);
                assert_eq!(reply.ssrc, 0xAABBCCDD);
                assert_eq!(reply.initiator_token, 42);
                assert_eq!(peer.ssrc, 1);
                assert_eq!(peer.name, "remote");
            }
            other => panic!("expected Accepted, got {other:?}"),
        }
        assert!(control.peers().contains(1));
    }

    #[test]
    fn duplicate_invitation_is_ignored_and_keeps_prior_registration() {
        let mut control = ControlProtocol::new(1, "local");
        control.handle_exchange(&invitation(1, "first"), addr());
        let outcome = control.handle_exchange(&invitation(1, "second"), addr());
        assert_eq!(outcome, ControlOutcome::Error(ProtocolError::DuplicateInvitation(1)));
        assert_eq!(control.peers().lookup(1).unwrap().name, "first");
    }

    #[test]
    fn exit_for_known_peer_disconnects() {
        let mut control = ControlProtocol::new(1, "local");
        control.handle_exchange(&invitation(7, "remote"), addr());
        let by = ExchangePacket {
            command: ExchangeCommand::Exit,
            protocol_version: 2,
            initiator_token: 0,
            ssrc: 7,
            name: None,
        };
        let outcome = control.handle_exchange(&by, addr());
        match outcome {
            ControlOutcome::Disconnected { peer } => assert_eq!(peer.ssrc, 7),
            other => panic!("expected Disconnected, got {other:?}"),
        }
        assert!(!control.peers().contains(7));
    }

    #[test]
    fn exit_for_unknown_peer_is_ignored() {
        let mut control = ControlProtocol::new(1, "local");
        let by = ExchangePacket {
            command: ExchangeCommand::Exit,
            protocol_version: 2,
            initiator_token: 0,
            ssrc: 999,
            name: None,
        };
        assert_eq!(
            control.handle_exchange(&by, addr()),
            ControlOutcome::Error(ProtocolError::UnknownPeerExit(999))
        );
    }

    #[test]
    fn accepted_on_the_accepting_side_is_an_unexpected_command_error() {
        let mut control = ControlProtocol::new(1, "local");
        let ok = ExchangePacket {
            command: ExchangeCommand::Accepted,
            protocol_version: 2,
            initiator_token: 0,
            ssrc: 5,
            name: None,
        };
        assert_eq!(
            control.handle_exchange(&ok, addr()),
            ControlOutcome::Error(ProtocolError::UnexpectedCommand("OK"))
        );
    }
}
