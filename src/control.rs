//! IRC control connection
//!
//! [`ControlChannel`] is the outbound half the session talks to. Inbound traffic
//! is not delivered through callbacks: [`IrcControl`] runs a reader task that
//! turns the messages the session cares about into [`SessionEvent`]s.

use crate::config::IrcConfig;
use crate::error::Result;
use crate::session::SessionEvent;
use async_trait::async_trait;
use futures::StreamExt;
use irc::client::prelude::{Client, Command, Config as ClientConfig, Message, Response, Sender};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// CTCP payload delimiter
const CTCP_DELIMITER: char = '\u{1}';

/// Outbound operations on the control connection
#[async_trait]
pub trait ControlChannel: Send + Sync {
    /// Join a channel
    async fn join(&self, channel: &str) -> Result<()>;

    /// Send a PRIVMSG to a channel or nick
    async fn send_message(&self, target: &str, text: &str) -> Result<()>;

    /// Leave the server
    async fn quit(&self, message: &str) -> Result<()>;
}

/// Whether `name` carries one of the IRC channel prefixes (`#`, `&`, `+`, `!`)
pub fn is_channel_name(name: &str) -> bool {
    name.len() > 1 && name.starts_with(['#', '&', '+', '!'])
}

/// Split a CTCP-wrapped text into `(command, argument)`
///
/// Returns `None` when `text` is not wrapped in `\x01`. A missing closing
/// delimiter is tolerated.
pub fn parse_ctcp(text: &str) -> Option<(String, String)> {
    let inner = text.strip_prefix(CTCP_DELIMITER)?;
    let inner = inner.strip_suffix(CTCP_DELIMITER).unwrap_or(inner);
    let (command, argument) = inner.split_once(' ').unwrap_or((inner, ""));
    if command.is_empty() {
        return None;
    }
    Some((command.to_string(), argument.trim().to_string()))
}

/// Translate one IRC message into the event the session handles, if any
pub fn translate(message: &Message) -> Option<SessionEvent> {
    match &message.command {
        Command::Response(Response::RPL_WELCOME, _) => Some(SessionEvent::Welcome),
        Command::PRIVMSG(_, text) | Command::NOTICE(_, text) => {
            let (command, argument) = parse_ctcp(text)?;
            Some(SessionEvent::Ctcp {
                from: message.source_nickname().unwrap_or_default().to_string(),
                command,
                argument,
            })
        }
        _ => None,
    }
}

/// [`ControlChannel`] backed by the `irc` crate
pub struct IrcControl {
    sender: Sender,
}

impl IrcControl {
    /// Connect, register, and start forwarding events to `events`
    ///
    /// The returned task owns the client and drives both directions of the
    /// connection; it ends with [`SessionEvent::Disconnected`] when the server
    /// closes the stream.
    pub async fn connect(
        config: &IrcConfig,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<(Self, JoinHandle<()>)> {
        let client_config = ClientConfig {
            nickname: Some(config.nickname.clone()),
            server: Some(config.server.clone()),
            port: Some(config.port),
            use_tls: Some(config.use_tls),
            ..ClientConfig::default()
        };

        info!(
            server = %config.server,
            port = config.port,
            nickname = %config.nickname,
            tls = config.use_tls,
            "connecting to IRC server"
        );
        let mut client = Client::from_config(client_config).await?;
        client.identify()?;
        let stream = client.stream()?;
        let sender = client.sender();

        let reader = tokio::spawn(async move {
            // keep the client alive for as long as the stream is polled
            let _client = client;
            let mut stream = stream;
            let reason = loop {
                match stream.next().await {
                    Some(Ok(message)) => {
                        if let Some(event) = translate(&message) {
                            debug!(?event, "control event");
                            if events.send(event).await.is_err() {
                                break "session closed".to_string();
                            }
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "IRC connection error");
                        break e.to_string();
                    }
                    None => break "server closed the connection".to_string(),
                }
            };
            info!(%reason, "IRC connection ended");
            events.send(SessionEvent::Disconnected { reason }).await.ok();
        });

        Ok((Self { sender }, reader))
    }
}

#[async_trait]
impl ControlChannel for IrcControl {
    async fn join(&self, channel: &str) -> Result<()> {
        info!(%channel, "joining channel");
        self.sender
            .send(Command::JOIN(channel.to_string(), None, None))?;
        Ok(())
    }

    async fn send_message(&self, target: &str, text: &str) -> Result<()> {
        debug!(%target, %text, "sending message");
        self.sender
            .send(Command::PRIVMSG(target.to_string(), text.to_string()))?;
        Ok(())
    }

    async fn quit(&self, message: &str) -> Result<()> {
        info!("leaving server");
        self.sender.send(Command::QUIT(Some(message.to_string())))?;
        Ok(())
    }
}
