//! # Relay Binary Entry Point
//!
//! Runs the directory and queue service on a UDP socket.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin relay -- --config config/relay.toml
//! ```
//!
//! The relay will:
//! 1. Load configuration from the specified TOML file
//! 2. Bind the UDP socket
//! 3. Answer register / get_user_id / get_user_list / send / get requests
//! 4. Log request statistics at the configured interval

use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;

use udp_chat::common::config::load_config;
use udp_chat::relay::{RelayConfig, RelayServer};

/// Command-line arguments for the relay binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the relay configuration file (TOML format)
    ///
    /// Example: config/relay.toml
    #[arg(short, long)]
    config: String,
}

/// Initialize the logging system with timestamp, level, and message formatting.
///
/// Format: `[HH:MM:SS] [LEVEL] message`
fn init_logger() {
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let args = Args::parse();

    let config: RelayConfig = load_config(&args.config)?;

    let server = RelayServer::bind(&config).await?;

    // Serves until the process is killed
    server.run().await?;

    Ok(())
}
