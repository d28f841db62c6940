use anyhow::Result;
use clap::Parser;
use log::info;
use rtp_midi::Client;
use tokio::time::{sleep, Duration};

/// RTP-MIDI / AppleMIDI client: connects to a server and sends a note.
#[derive(Parser, Debug)]
#[command(name = "rtp-midi-client")]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 5004)]
    port: u16,

    #[arg(long, default_value = "rtp-midi-rs-client")]
    name: String,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut client = Client::connect(&args.host, args.port, args.name).await?;
    info!("connected to {}:{}", args.host, args.port);

    client.send_note_on(0, 60, 100).await?;
    sleep(Duration::from_millis(200)).await;
    client.send_note_off(0, 60, 0).await?;

    client.disconnect().await?;
    Ok(())
}
