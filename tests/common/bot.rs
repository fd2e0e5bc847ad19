//! In-process stand-in for the IRC server and the search bot
//!
//! [`FakeBot`] is the session's [`ControlChannel`]. Requests it was told to
//! serve are answered with a CTCP DCC SEND offer pointing at a loopback TCP
//! listener that streams the file and records the acknowledgments it gets.

use async_trait::async_trait;
use ircget::{ControlChannel, SessionEvent};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Bytes the fake peer writes per send
const PEER_CHUNK: usize = 700;

/// One outbound control operation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Join(String),
    Message(String, String),
    Quit,
}

pub struct FakeBot {
    calls: Mutex<Vec<Call>>,
    files: Mutex<HashMap<String, (String, Vec<u8>)>>,
    acks: Arc<Mutex<HashMap<String, Vec<u32>>>>,
    events: mpsc::Sender<SessionEvent>,
}

impl FakeBot {
    pub fn new(events: mpsc::Sender<SessionEvent>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            files: Mutex::new(HashMap::new()),
            acks: Arc::new(Mutex::new(HashMap::new())),
            events,
        })
    }

    /// Answer the channel line `request` by offering `filename`
    pub fn serve(&self, request: &str, filename: &str, payload: Vec<u8>) {
        self.files
            .lock()
            .unwrap()
            .insert(request.to_string(), (filename.to_string(), payload));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Text of every message sent to the channel, in order
    pub fn messages(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Message(_, text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Acknowledgments the peer for `filename` received, once it saw EOF
    pub async fn wait_for_acks(&self, filename: &str, timeout: Duration) -> Option<Vec<u32>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(acks) = self.acks.lock().unwrap().get(filename) {
                return Some(acks.clone());
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn listen(&self, filename: String, payload: Vec<u8>) -> u16 {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let acks = Arc::clone(&self.acks);

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            for chunk in payload.chunks(PEER_CHUNK) {
                socket.write_all(chunk).await.unwrap();
            }
            socket.shutdown().await.unwrap();

            let mut seen = Vec::new();
            let mut ack = [0u8; 4];
            while socket.read_exact(&mut ack).await.is_ok() {
                seen.push(u32::from_be_bytes(ack));
            }
            acks.lock().unwrap().insert(filename, seen);
        });
        port
    }
}

#[async_trait]
impl ControlChannel for FakeBot {
    async fn join(&self, channel: &str) -> ircget::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Join(channel.to_string()));
        Ok(())
    }

    async fn send_message(&self, target: &str, text: &str) -> ircget::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Message(target.to_string(), text.to_string()));

        let served = self.files.lock().unwrap().get(text).cloned();
        if let Some((filename, payload)) = served {
            let size = payload.len();
            let port = self.listen(filename.clone(), payload).await;
            let argument = format!(
                "SEND \"{}\" {} {} {}",
                filename,
                u32::from(Ipv4Addr::LOCALHOST),
                port,
                size
            );
            self.events
                .send(SessionEvent::Ctcp {
                    from: "Search".to_string(),
                    command: "DCC".to_string(),
                    argument,
                })
                .await
                .unwrap();
        }
        Ok(())
    }

    async fn quit(&self, _message: &str) -> ircget::Result<()> {
        self.calls.lock().unwrap().push(Call::Quit);
        Ok(())
    }
}
