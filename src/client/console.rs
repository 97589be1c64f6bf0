//! # Interactive Console
//!
//! Line-oriented front end for a [`ChatSession`].
//!
//! ## Commands
//!
//! ```text
//! send <user> <message...>   send the text after the username
//! whoami                     print your username
//! quit                       leave the console
//! h                          help
//! anything else              just refresh users and messages
//! ```
//!
//! After every command the console refreshes the peer list and drains the
//! message queue, since the relay never pushes anything to the client.

use log::error;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::client::client::RelayTransport;
use crate::client::session::{ChatSession, ReceivedMessage};
use crate::common::error::{ChatError, Result};
use crate::common::messages::UserId;

pub const HELP: &str = "send username [message] -> send user the text message following their username\n\
whoami -> print your username from the config file\n\
quit -> quit the client\n\
_ -> anything else will retrieve & print your latest messages & update the available user listing.\n";

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    WhoAmI,
    Send { target: String, message: String },
    /// Started with `send` but lacked a target or a message.
    InvalidSend,
    /// Anything else: refresh only.
    Refresh,
}

pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    match trimmed {
        "h" => return Command::Help,
        "quit" => return Command::Quit,
        "whoami" => return Command::WhoAmI,
        "send" => return Command::InvalidSend,
        _ => {}
    }

    let Some(rest) = trimmed.strip_prefix("send ") else {
        return Command::Refresh;
    };
    match rest.trim_start().split_once(' ') {
        Some((target, message)) if !message.trim().is_empty() => Command::Send {
            target: target.to_string(),
            message: message.to_string(),
        },
        _ => Command::InvalidSend,
    }
}

/// Runs the console until `quit`, end of input, or a fatal error.
pub struct Console<T> {
    session: ChatSession<T>,
    username: String,
}

impl<T: RelayTransport> Console<T> {
    pub fn new(session: ChatSession<T>, username: impl Into<String>) -> Self {
        Self {
            session,
            username: username.into(),
        }
    }

    /// Resolve our identity, catch up, then process commands from `input`.
    ///
    /// Non-fatal errors are reported on `out` and the loop continues.
    pub async fn run<R, W>(&mut self, input: R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let self_id = self.session.resolve_self(&self.username).await?;
        let mut peers = self.catch_up(self_id, Vec::new(), out).await?;

        let mut lines = input.lines();
        loop {
            writeln!(out, "--\nUsers available: [{}]", peers.join(", "))?;
            write!(out, "Enter command (h for help): ")?;
            out.flush()?;

            let Some(line) = lines.next_line().await? else {
                writeln!(out)?;
                break;
            };

            match parse_command(&line) {
                Command::Quit => break,
                Command::Help => writeln!(out, "{}", HELP)?,
                Command::WhoAmI => writeln!(out, "{}", self.username)?,
                Command::InvalidSend => writeln!(out, "Invalid send command, see help.")?,
                Command::Send { target, message } => {
                    match self.session.send(self_id, &target, &message).await {
                        Ok(()) => {}
                        Err(ChatError::NotAPeer(_)) => {
                            writeln!(out, "Target user is not in active user list.")?
                        }
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => writeln!(out, "Error sending message: {}", e)?,
                    }
                }
                Command::Refresh => {}
            }

            peers = self.catch_up(self_id, peers, out).await?;
        }

        Ok(())
    }

    /// Refresh peers and print every queued message.
    ///
    /// On a non-fatal failure the previous peer list is kept.
    async fn catch_up<W: Write>(
        &mut self,
        self_id: UserId,
        previous: Vec<String>,
        out: &mut W,
    ) -> Result<Vec<String>> {
        writeln!(out, "Catching up your message queue...")?;

        let peers = match self.session.refresh_peers(&self.username).await {
            Ok(peers) => peers,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!("❌ Refreshing user list failed: {}", e);
                writeln!(out, "Error retrieving user list: {}", e)?;
                previous
            }
        };

        let mut received: Vec<ReceivedMessage> = Vec::new();
        let drained = self
            .session
            .drain(self_id, |message| received.push(message))
            .await;
        for message in &received {
            writeln!(out, "{}: {}", message.sender, message.body)?;
        }
        match drained {
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => writeln!(out, "Error retrieving message for user_id {}: {}", self_id.0, e)?,
        }

        Ok(peers)
    }
}
