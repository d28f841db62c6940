use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::info;
use rtp_midi::Server;

/// RTP-MIDI / AppleMIDI server: accepts invitations, receives MIDI.
#[derive(Parser, Debug)]
#[command(name = "rtp-midi-server")]
struct Args {
    /// Address to bind (control port; data is this port + 1). Repeatable.
    #[arg(short = 'b', long = "bind-addr", default_value = "0.0.0.0:5051")]
    bind_addr: Vec<String>,

    /// Name advertised to peers during the AppleMIDI handshake.
    #[arg(long, default_value = "rtp-midi-rs")]
    name: String,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("shutdown requested");
        handler_flag.store(true, Ordering::SeqCst);
    })?;

    let mut server = Server::from_bind_addrs(&args.bind_addr, args.name).await?;
    info!("listening on {:?}", server.bound_addrs());

    while !shutdown.load(Ordering::SeqCst) {
        server.loop_once(Some(Duration::from_millis(200))).await?;
    }
    info!("shut down cleanly");
    Ok(())
}
