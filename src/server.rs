//! Server façade: binds one or more (host, port) pairs, owns a
//! `ControlProtocol`/`DataProtocol` pair per binding, and fans out decoded
//! events to registered handlers.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::future::{select_all, BoxFuture};
use log::{debug, info, log_enabled, warn, Level};
use rtp_midi_core::codec::{exchange, timestamp, MidiPacket};
use rtp_midi_core::{ControlOutcome, ControlProtocol, DataOutcome, DataProtocol, Peer};
use tokio::net::UdpSocket;

use crate::time::now_100us;

/// RTP-MIDI is comfortable well under this; 1500 covers the Ethernet MTU.
const MAX_DATAGRAM: usize = 1500;

/// The outward contract to user code — not part of the wire-protocol core.
/// Invoked synchronously from the server's processing loop.
pub trait Handler: Send + Sync {
    fn on_peer_connected(&self, _peer: &Peer) {}
    fn on_peer_disconnected(&self, _peer: &Peer) {}
    fn on_midi_commands(&self, _peer: &Peer, _packet: &MidiPacket) {}
}

struct Binding {
    addr: SocketAddr,
    control_socket: UdpSocket,
    data_socket: UdpSocket,
    control: ControlProtocol,
    data: DataProtocol,
}

pub struct Server {
    bindings: Vec<Binding>,
    handlers: Vec<Arc<dyn Handler>>,
}

impl Server {
    pub async fn new(bind_addrs: Vec<SocketAddr>, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let local_ssrc: u32 = rand::random();
        let mut bindings = Vec::with_capacity(bind_addrs.len());
        for addr in bind_addrs {
            let data_addr = SocketAddr::new(addr.ip(), addr.port() + 1);
            let control_socket = UdpSocket::bind(addr)
                .await
                .with_context(|| format!("binding control socket on {addr}"))?;
            let data_socket = UdpSocket::bind(data_addr)
                .await
                .with_context(|| format!("binding data socket on {data_addr}"))?;
            info!("bound session on {addr} (control) / {data_addr} (data)");
            bindings.push(Binding {
                addr,
                control_socket,
                data_socket,
                control: ControlProtocol::new(local_ssrc, name.clone()),
                data: DataProtocol::new(local_ssrc),
            });
        }
        Ok(Server { bindings, handlers: Vec::new() })
    }

    /// Convenience constructor parsing `"host:port"` strings, mirroring
    /// pymidi's `Server.from_bind_addrs`.
    pub async fn from_bind_addrs(addrs: &[String], name: impl Into<String>) -> Result<Self> {
        let mut parsed = Vec::with_capacity(addrs.len());
        for a in addrs {
            parsed.push(
                a.parse()
                    .with_context(|| format!("invalid bind address {a:?}"))?,
            );
        }
        Self::new(parsed, name).await
    }

    pub fn add_handler(&mut self, handler: Arc<dyn Handler>) {
        self.handlers.push(handler);
    }

    pub fn remove_handler(&mut self, handler: &Arc<dyn Handler>) {
        self.handlers.retain(|h| !Arc::ptr_eq(h, handler));
    }

    pub async fn serve_forever(&mut self) -> Result<()> {
        loop {
            self.loop_once(None).await?;
        }
    }

    /// Waits for readability across every bound socket and fully processes
    /// one datagram (decode, dispatch, all handler callbacks) before
    /// returning. With `wait` set, returns early having processed nothing
    /// if no datagram arrived in time — intended for tests and for
    /// interleaving a shutdown check in `serve_forever`-style loops.
    pub async fn loop_once(&mut self, wait: Option<Duration>) -> Result<()> {
        if self.bindings.is_empty() {
            if let Some(wait) = wait {
                tokio::time::sleep(wait).await;
            }
            return Ok(());
        }

        let mut futs: Vec<BoxFuture<'_, (usize, bool, io::Result<(Vec<u8>, SocketAddr)>)>> =
            Vec::with_capacity(self.bindings.len() * 2);
        for (i, binding) in self.bindings.iter().enumerate() {
            futs.push(Box::pin(async move {
                (i, true, recv_datagram(&binding.control_socket).await)
            }));
            futs.push(Box::pin(async move {
                (i, false, recv_datagram(&binding.data_socket).await)
            }));
        }

        let ready = select_all(futs);
        let (index, is_control, result) = match wait {
            Some(wait) => match tokio::time::timeout(wait, ready).await {
                Ok((item, _, _)) => item,
                Err(_) => return Ok(()), // nothing arrived before the deadline
            },
            None => {
                let (item, _, _) = ready.await;
                item
            }
        };

        let (buf, addr) = result.context("reading from a bound socket")?;
        if is_control {
            self.handle_control_datagram(index, &buf, addr).await?;
        } else {
            self.handle_data_datagram(index, &buf, addr).await?;
        }
        Ok(())
    }

    async fn handle_control_datagram(&mut self, index: usize, buf: &[u8], addr: SocketAddr) -> Result<()> {
        log_hex_dump("recv", addr, buf);
        let packet = match exchange::parse(buf) {
            Ok(p) => p,
            Err(e) => {
                warn!("malformed exchange packet from {addr}: {e}");
                return Ok(());
            }
        };
        let outcome = self.bindings[index].control.handle_exchange(&packet, addr);
        match outcome {
            ControlOutcome::Accepted { reply, peer } => {
                let bytes = exchange::build(&reply);
                log_hex_dump("send", addr, &bytes);
                self.bindings[index]
                    .control_socket
                    .send_to(&bytes, addr)
                    .await
                    .context("sending OK reply")?;
                self.bindings[index].data.add_peer(peer.clone());
                for handler in &self.handlers {
                    handler.on_peer_connected(&peer);
                }
            }
            ControlOutcome::Disconnected { peer } => {
                self.bindings[index].data.remove_peer(peer.ssrc);
                for handler in &self.handlers {
                    handler.on_peer_disconnected(&peer);
                }
            }
            ControlOutcome::Error(_) => {}
        }
        Ok(())
    }

    async fn handle_data_datagram(&mut self, index: usize, buf: &[u8], addr: SocketAddr) -> Result<()> {
        log_hex_dump("recv", addr, buf);
        let outcome = match self.bindings[index].data.handle_datagram(buf, now_100us()) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("malformed data-port packet from {addr}: {e}");
                return Ok(());
            }
        };
        match outcome {
            DataOutcome::TimestampReply(reply) => {
                let bytes = timestamp::build(&reply);
                log_hex_dump("send", addr, &bytes);
                self.bindings[index]
                    .data_socket
                    .send_to(&bytes, addr)
                    .await
                    .context("sending CK reply")?;
            }
            DataOutcome::ClockOffset { ssrc, offset_100us } => {
                info!("clock offset estimate for {ssrc:#x}: {offset_100us} (x100us)");
            }
            DataOutcome::MidiReceived { peer, packet } => {
                debug!("{packet}");
                for handler in &self.handlers {
                    handler.on_midi_commands(&peer, &packet);
                }
            }
            DataOutcome::DroppedUnknownPeer { .. } | DataOutcome::Error(_) => {}
        }
        Ok(())
    }

    pub fn bound_addrs(&self) -> Vec<SocketAddr> {
        self.bindings.iter().map(|b| b.addr).collect()
    }
}

/// Hex-dumps a datagram at DEBUG, guarded so the encode only runs when the
/// level is actually enabled.
fn log_hex_dump(direction: &str, addr: SocketAddr, buf: &[u8]) {
    if log_enabled!(Level::Debug) {
        debug!("{direction} {addr}: {}", hex::encode(buf));
    }
}

async fn recv_datagram(socket: &UdpSocket) -> io::Result<(Vec<u8>, SocketAddr)> {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    let (n, addr) = socket.recv_from(&mut buf).await?;
    buf.truncate(n);
    Ok((buf, addr))
}
