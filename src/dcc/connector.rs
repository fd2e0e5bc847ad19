//! Dialing the peer side of a DCC SEND

use async_trait::async_trait;
use std::net::SocketAddrV4;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

/// A bidirectional byte stream to a DCC peer
pub trait DccStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> DccStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Opens byte connections to DCC peers
///
/// The default implementation is [`TcpConnector`]; tests substitute in-memory
/// streams.
#[async_trait]
pub trait DccConnector: Send + Sync {
    /// Connect to the peer announced in an offer
    async fn connect(&self, peer: SocketAddrV4) -> std::io::Result<Box<dyn DccStream>>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Plain TCP connector
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

#[async_trait]
impl DccConnector for TcpConnector {
    async fn connect(&self, peer: SocketAddrV4) -> std::io::Result<Box<dyn DccStream>> {
        let stream = TcpStream::connect(peer).await?;
        // acknowledgments are tiny and must not sit in Nagle's buffer
        stream.set_nodelay(true)?;
        debug!(%peer, "DCC connection established");
        Ok(Box::new(stream))
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}
