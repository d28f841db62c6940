//! Outer transport/CLI shell around `rtp_midi_core`: the Tokio UDP server
//! and client façades that drive its session state machines over real
//! sockets.

pub mod client;
pub mod server;
mod time;

pub use client::Client;
pub use server::{Handler, Server};
