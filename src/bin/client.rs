//! # Client Binary Entry Point
//!
//! Interactive chat client talking to a relay.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin client -- --config config/alice.toml
//! ```
//!
//! The client will:
//! 1. Load configuration from the specified TOML file
//! 2. Register the configured username (or reclaim its existing identity)
//! 3. Fetch the user list and any queued messages
//! 4. Read commands from stdin until `quit`

use anyhow::Context;
use clap::Parser;
use env_logger::Builder;
use log::{error, LevelFilter};
use std::io::Write;

use udp_chat::client::{ChatSession, ClientConfig, Console, RelayClient};
use udp_chat::common::config::load_config;

/// Command-line arguments for the client binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the client configuration file (TOML format)
    ///
    /// Example: config/alice.toml
    #[arg(short, long)]
    config: String,

    /// Chat as this user instead of the one in the config file
    #[arg(short, long)]
    username: Option<String>,
}

/// Logs go to stderr at WARN by default so they do not interleave with the chat.
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
        .filter_level(LevelFilter::Warn)
        .parse_default_env()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let args = Args::parse();

    let mut config: ClientConfig = load_config(&args.config)?;
    if let Some(username) = args.username {
        config.client.username = username;
    }

    let transport = RelayClient::connect(&config)
        .await
        .with_context(|| format!("binding client socket {}", config.client.address()))?;

    let session = ChatSession::new(transport);
    let mut console = Console::new(session, config.client.username.clone());

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();

    if let Err(e) = console.run(stdin, &mut stdout).await {
        error!("❌ Session ended: {}", e);
        return Err(e.into());
    }

    Ok(())
}
