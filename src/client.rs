//! Client façade: initiates a session with a remote (host, port), then sends
//! MIDI data packets with a monotonically increasing sequence number.

use std::net::SocketAddr;

use anyhow::{bail, Context, Result};
use log::{debug, info, log_enabled, Level};
use rtp_midi_core::codec::{exchange, midi, ExchangeCommand, ExchangePacket, MidiEvent, MidiEventKind, RtpHeader};
use tokio::net::UdpSocket;

use crate::time::now_100us;

const MAX_DATAGRAM: usize = 1500;

pub struct Client {
    control_socket: UdpSocket,
    data_socket: UdpSocket,
    remote_control_addr: SocketAddr,
    remote_data_addr: SocketAddr,
    local_ssrc: u32,
    initiator_token: u32,
    sequence_number: u16,
}

impl Client {
    /// Sends `IN` to both the control and data ports and requires an `OK`
    /// on each before returning.
    pub async fn connect(host: &str, port: u16, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let local_ssrc: u32 = rand::random();
        let initiator_token: u32 = rand::random();

        let remote_control_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("invalid control address {host}:{port}"))?;
        let remote_data_addr: SocketAddr = SocketAddr::new(remote_control_addr.ip(), port + 1);

        let control_socket = UdpSocket::bind("0.0.0.0:0").await?;
        let data_socket = UdpSocket::bind("0.0.0.0:0").await?;

        let invitation = ExchangePacket {
            command: ExchangeCommand::Invitation,
            protocol_version: 2,
            initiator_token,
            ssrc: local_ssrc,
            name: Some(name),
        };
        let bytes = exchange::build(&invitation);

        send_invitation_and_await_ok(&control_socket, &bytes, remote_control_addr).await?;
        info!("control session established with {remote_control_addr}");
        send_invitation_and_await_ok(&data_socket, &bytes, remote_data_addr).await?;
        info!("data session established with {remote_data_addr}");

        Ok(Client {
            control_socket,
            data_socket,
            remote_control_addr,
            remote_data_addr,
            local_ssrc,
            initiator_token,
            sequence_number: 1,
        })
    }

    pub async fn send_note_on(&mut self, channel: u8, key: u8, velocity: u8) -> Result<()> {
        self.send_command(vec![MidiEvent {
            delta_time: 0,
            kind: MidiEventKind::NoteOn { channel, key, velocity },
        }])
        .await
    }

    pub async fn send_note_off(&mut self, channel: u8, key: u8, velocity: u8) -> Result<()> {
        self.send_command(vec![MidiEvent {
            delta_time: 0,
            kind: MidiEventKind::NoteOff { channel, key, velocity },
        }])
        .await
    }

    /// Builds a canonical-header MIDI packet (current sequence number, then
    /// incremented; current timestamp; no journal) and sends it to the data
    /// port.
    pub async fn send_command(&mut self, events: Vec<MidiEvent>) -> Result<()> {
        let header = RtpHeader::canonical(self.sequence_number, now_100us() as u32, self.local_ssrc);
        self.sequence_number = self.sequence_number.wrapping_add(1);
        let packet = rtp_midi_core::codec::MidiPacket {
            header,
            z: false,
            p: false,
            events,
            journal: None,
        };
        let bytes = midi::build(&packet)?;
        log_hex_dump("send", self.remote_data_addr, &bytes);
        self.data_socket
            .send_to(&bytes, self.remote_data_addr)
            .await
            .context("sending MIDI data packet")?;
        Ok(())
    }

    /// Sends `BY` on the control socket only, then drops both sockets.
    pub async fn disconnect(self) -> Result<()> {
        let exit = ExchangePacket {
            command: ExchangeCommand::Exit,
            protocol_version: 2,
            initiator_token: self.initiator_token,
            ssrc: self.local_ssrc,
            name: None,
        };
        let bytes = exchange::build(&exit);
        log_hex_dump("send", self.remote_control_addr, &bytes);
        self.control_socket
            .send_to(&bytes, self.remote_control_addr)
            .await
            .context("sending BY")?;
        Ok(())
    }
}

async fn send_invitation_and_await_ok(socket: &UdpSocket, bytes: &[u8], to: SocketAddr) -> Result<()> {
    log_hex_dump("send", to, bytes);
    socket.send_to(bytes, to).await.context("sending IN")?;
    let mut buf = vec![0u8; MAX_DATAGRAM];
    let (n, from) = socket.recv_from(&mut buf).await.context("awaiting OK")?;
    log_hex_dump("recv", from, &buf[..n]);
    let reply = exchange::parse(&buf[..n]).context("parsing invitation reply")?;
    match reply.command {
        ExchangeCommand::Accepted => Ok(()),
        other => bail!("invitation to {to} was not accepted: {other:?}"),
    }
}

/// Hex-dumps a datagram at DEBUG, guarded so the encode only runs when the
/// level is actually enabled.
fn log_hex_dump(direction: &str, addr: SocketAddr, buf: &[u8]) {
    if log_enabled!(Level::Debug) {
        debug!("{direction} {addr}: {}", hex::encode(buf));
    }
}
