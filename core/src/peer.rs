//! In-memory table of active session peers, keyed by SSRC.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;

/// A remote participant in a session, created on a successful `IN` and
/// destroyed on `BY` (or administratively).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub name: String,
    pub addr: SocketAddr,
    pub ssrc: u32,
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Peer[ssrc={:#x} addr={} name={:?}]", self.ssrc, self.addr, self.name)
    }
}

/// Maps SSRC to `Peer`. At most one peer per SSRC.
///
/// The control protocol owns the authoritative table; the data protocol
/// holds a mirror kept in sync by a one-way callback from control, never
/// the reverse (see the session module for the linkage).
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: HashMap<u32, Peer>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self { peers: HashMap::new() }
    }

    /// Registers `peer`. Idempotent: if `peer.ssrc` is already present, the
    /// existing entry is left untouched and returned (caller should warn on
    /// this collision).
    pub fn register(&mut self, peer: Peer) -> Peer {
        self.peers.entry(peer.ssrc).or_insert(peer).clone()
    }

    pub fn unregister(&mut self, ssrc: u32) -> Option<Peer> {
        self.peers.remove(&ssrc)
    }

    pub fn lookup(&self, ssrc: u32) -> Option<&Peer> {
        self.peers.get(&ssrc)
    }

    pub fn contains(&self, ssrc: u32) -> bool {
        self.peers.contains_key(&ssrc)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }
}
