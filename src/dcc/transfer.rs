//! Receive side of a single DCC SEND connection
//!
//! A [`Transfer`] owns one offer from `Offered` until the peer closes the
//! connection. Every chunk is written to the [`ByteSink`] first; only then is
//! the 4-byte big-endian running total sent back to the peer, and only after
//! that acknowledgment is the next chunk read.

use super::connector::{DccConnector, DccStream};
use super::offer::DccOffer;
use super::sink::{ByteSink, DownloadDir};
use crate::error::TransportError;
use crate::types::{Event, TransferId, TransferState};
use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Encode the DCC acknowledgment for `total` received bytes
///
/// The protocol field is 32 bits wide; totals beyond 4 GiB wrap, which is what
/// peers expect.
pub fn ack_bytes(total: u64) -> [u8; 4] {
    (total as u32).to_be_bytes()
}

/// Shared resources every transfer needs
pub struct TransferContext {
    /// Opens byte connections to peers
    pub connector: Arc<dyn DccConnector>,
    /// Where received files go
    pub downloads: Arc<DownloadDir>,
    /// Read buffer size in bytes
    pub read_buffer_size: usize,
    /// Idle limit for connect, read and acknowledge
    pub idle_timeout: Option<Duration>,
    /// Event broadcast channel
    pub event_tx: broadcast::Sender<Event>,
}

impl TransferContext {
    fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine - we just drop the event
        self.event_tx.send(event).ok();
    }
}

/// Bookkeeping for one transfer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferSession {
    /// Transfer ID
    pub id: TransferId,
    /// The offer being served
    pub offer: DccOffer,
    state: TransferState,
    received_bytes: u64,
}

impl TransferSession {
    /// Start a session in `Offered`
    pub fn new(id: TransferId, offer: DccOffer) -> Self {
        Self {
            id,
            offer,
            state: TransferState::Offered,
            received_bytes: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Bytes received so far
    pub fn received_bytes(&self) -> u64 {
        self.received_bytes
    }

    fn advance(&mut self, next: TransferState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transfer transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(transfer_id = self.id.0, from = ?self.state, to = ?next, "transfer state change");
        self.state = next;
    }

    fn record_chunk(&mut self, total: u64) {
        debug_assert!(total >= self.received_bytes);
        self.received_bytes = total;
        if self.state != TransferState::Receiving {
            self.advance(TransferState::Receiving);
        }
    }
}

/// A transfer that reached `Complete`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedTransfer {
    /// Transfer ID
    pub id: TransferId,
    /// The offer that was served
    pub offer: DccOffer,
    /// Final location of the file
    pub path: PathBuf,
    /// Total bytes received
    pub received: u64,
}

/// How a transfer ended
#[derive(Debug)]
pub enum TransferOutcome {
    /// Peer closed the connection after sending the file
    Complete(CompletedTransfer),
    /// Transport or sink failure; the partial file was discarded
    Failed {
        /// The offer that was being served
        offer: DccOffer,
        /// What went wrong
        error: TransportError,
    },
    /// Session shut down mid-transfer; the partial file was discarded
    Cancelled {
        /// The offer that was being served
        offer: DccOffer,
    },
}

impl TransferOutcome {
    /// The offer this outcome belongs to
    pub fn offer(&self) -> &DccOffer {
        match self {
            TransferOutcome::Complete(done) => &done.offer,
            TransferOutcome::Failed { offer, .. } | TransferOutcome::Cancelled { offer } => offer,
        }
    }
}

/// State machine driving one DCC SEND to completion
pub struct Transfer {
    session: TransferSession,
    ctx: Arc<TransferContext>,
}

impl Transfer {
    /// Create a transfer in `Offered`
    pub fn new(id: TransferId, offer: DccOffer, ctx: Arc<TransferContext>) -> Self {
        Self {
            session: TransferSession::new(id, offer),
            ctx,
        }
    }

    /// Current bookkeeping snapshot
    pub fn session(&self) -> &TransferSession {
        &self.session
    }

    /// Open the sink, connect, and receive until the peer closes or `cancel` fires
    ///
    /// Never retries: the first transport error ends the transfer.
    pub async fn run(mut self, cancel: CancellationToken) -> TransferOutcome {
        let id = self.session.id;
        let peer = self.session.offer.peer();
        let idle_timeout = self.ctx.idle_timeout;

        let mut sink = match self
            .ctx
            .downloads
            .open(&self.session.offer.filename, self.session.offer.declared_size)
            .await
        {
            Ok(sink) => sink,
            Err(source) => {
                let path = self.ctx.downloads.root().join(&self.session.offer.filename);
                return self.fail(TransportError::Sink { path, source });
            }
        };

        let connector = Arc::clone(&self.ctx.connector);
        let connected = tokio::select! {
            _ = cancel.cancelled() => return self.cancelled(sink).await,
            result = within(idle_timeout, connector.connect(peer)) => result,
        };
        let mut stream: Box<dyn DccStream> = match connected {
            Some(Ok(stream)) => stream,
            Some(Err(source)) => {
                return self
                    .abort(sink, TransportError::Connect { peer, source })
                    .await;
            }
            None => return self.abort(sink, idle_error(peer, idle_timeout)).await,
        };

        self.session.advance(TransferState::Connected);
        info!(transfer_id = id.0, %peer, filename = %self.session.offer.filename, "receiving file");
        self.ctx.emit_event(Event::TransferStarted { id, peer });

        let mut buf = vec![0u8; self.ctx.read_buffer_size.max(1)];
        // set once the peer refuses acknowledgments; buffered data is still drained
        let mut peer_stopped_reading: Option<TransportError> = None;
        loop {
            let read = tokio::select! {
                _ = cancel.cancelled() => return self.cancelled(sink).await,
                read = within(idle_timeout, stream.read(&mut buf)) => read,
            };
            let n = match read {
                Some(Ok(0)) => break,
                Some(Ok(n)) => n,
                Some(Err(source)) if self.hung_up_after_sending(&source) => {
                    debug!(transfer_id = id.0, error = %source, "peer hung up after sending everything");
                    break;
                }
                Some(Err(source)) => {
                    if let Some(ack_error) = peer_stopped_reading {
                        return self.abort(sink, ack_error).await;
                    }
                    return self.abort(sink, TransportError::Read { peer, source }).await;
                }
                None => return self.abort(sink, idle_error(peer, idle_timeout)).await,
            };

            let total = match sink.write(&buf[..n]).await {
                Ok(total) => total,
                Err(source) => {
                    let path = sink.path().to_path_buf();
                    return self.abort(sink, TransportError::Sink { path, source }).await;
                }
            };
            self.session.record_chunk(total);

            if peer_stopped_reading.is_none() {
                match within(idle_timeout, acknowledge(&mut stream, total)).await {
                    Some(Ok(())) => {}
                    Some(Err(source)) if is_hang_up(&source) => {
                        debug!(transfer_id = id.0, error = %source, "peer stopped reading acknowledgments");
                        peer_stopped_reading = Some(TransportError::Acknowledge { peer, source });
                    }
                    Some(Err(source)) => {
                        return self
                            .abort(sink, TransportError::Acknowledge { peer, source })
                            .await;
                    }
                    None => return self.abort(sink, idle_error(peer, idle_timeout)).await,
                }
            }

            self.ctx.emit_event(Event::Progress {
                id,
                received: total,
                declared_size: self.session.offer.declared_size,
            });
        }

        match peer_stopped_reading {
            Some(ack_error) if !self.received_everything() => {
                return self.abort(sink, ack_error).await;
            }
            _ => {}
        }

        let (path, received) = match sink.close().await {
            Ok(closed) => closed,
            Err(source) => {
                let path = sink.path().to_path_buf();
                return self.abort(sink, TransportError::Sink { path, source }).await;
            }
        };
        self.session.advance(TransferState::Complete);

        if let Some(declared) = self
            .session
            .offer
            .declared_size
            .filter(|&declared| declared != received)
        {
            warn!(
                transfer_id = id.0,
                declared,
                received,
                "received size differs from the size the peer announced"
            );
        }

        self.ctx.emit_event(Event::TransferComplete {
            id,
            path: path.clone(),
            received,
        });

        TransferOutcome::Complete(CompletedTransfer {
            id,
            offer: self.session.offer,
            path,
            received,
        })
    }

    /// Whether `error` is the peer closing its end once the file is in
    ///
    /// Peers commonly stream ahead and disconnect without waiting for the
    /// final acknowledgments. Without a declared size, any hang-up ends the file.
    fn hung_up_after_sending(&self, error: &std::io::Error) -> bool {
        is_hang_up(error) && self.received_everything()
    }

    fn received_everything(&self) -> bool {
        self.session
            .offer
            .declared_size
            .is_none_or(|declared| self.session.received_bytes >= declared)
    }

    /// Mark failed without a sink to clean up
    fn fail(mut self, error: TransportError) -> TransferOutcome {
        let id = self.session.id;
        self.session.advance(TransferState::Failed);
        warn!(transfer_id = id.0, error = %error, "transfer failed");
        self.ctx.emit_event(Event::TransferFailed {
            id,
            error: error.to_string(),
        });
        TransferOutcome::Failed {
            offer: self.session.offer,
            error,
        }
    }

    /// Discard the partial file, then mark failed
    async fn abort(self, sink: ByteSink, error: TransportError) -> TransferOutcome {
        if let Err(e) = sink.discard().await {
            warn!(transfer_id = self.session.id.0, error = %e, "failed to remove partial download");
        }
        self.fail(error)
    }

    async fn cancelled(self, sink: ByteSink) -> TransferOutcome {
        let id = self.session.id;
        if let Err(e) = sink.discard().await {
            warn!(transfer_id = id.0, error = %e, "failed to remove partial download");
        }
        info!(
            transfer_id = id.0,
            received = self.session.received_bytes,
            "transfer cancelled"
        );
        TransferOutcome::Cancelled {
            offer: self.session.offer,
        }
    }
}

/// Send the running total back to the peer
fn is_hang_up(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::UnexpectedEof
    )
}

async fn acknowledge(stream: &mut Box<dyn DccStream>, total: u64) -> std::io::Result<()> {
    stream.write_all(&ack_bytes(total)).await?;
    stream.flush().await
}

/// Await `fut`, giving up after `limit`; `None` means the limit elapsed
async fn within<F: Future>(limit: Option<Duration>, fut: F) -> Option<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
        None => Some(fut.await),
    }
}

fn idle_error(peer: std::net::SocketAddrV4, idle_timeout: Option<Duration>) -> TransportError {
    TransportError::IdleTimeout {
        peer,
        after: idle_timeout.unwrap_or_default(),
    }
}
