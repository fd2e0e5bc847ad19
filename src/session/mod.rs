//! Search session orchestration
//!
//! A [`Session`] runs one event loop over [`SessionEvent`]s coming from the
//! control connection and from transfer tasks:
//!
//! 1. On the server welcome it joins the channel and asks for a query.
//! 2. The search command makes the bot offer a listing over DCC.
//! 3. A completed listing is unpacked and shown to the [`SelectionProvider`];
//!    one retrieval command goes out per chosen line and the
//!    [`RetrievalQueue`] is set to the number sent.
//! 4. Each completed download is unpacked best-effort and counted off the
//!    queue. When it reaches zero the next query is asked for.
//!
//! Every DCC connection runs in its own task. Shutting down cancels all of
//! them and waits for them to discard their partial files.

mod queue;


pub use queue::RetrievalQueue;

use crate::config::Config;
use crate::control::{ControlChannel, is_channel_name};
use crate::dcc::{
    CompletedTransfer, DccConnector, DownloadDir, Transfer, TransferContext, TransferOutcome,
    parse_offer,
};
use crate::error::{Error, ExtractionError, Result};
use crate::extraction::ArchiveExtractor;
use crate::listing::{extract_command, is_listing, materialize_listing, read_listing};
use crate::prompt::{QueryProvider, SelectionProvider};
use crate::types::{Event, SessionState, TransferId};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Capacity of the session event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the broadcast channel for [`Event`]s
const BROADCAST_CAPACITY: usize = 1000;

/// Message sent with QUIT when the operator is done
const QUIT_MESSAGE: &str = "ircget done";

/// Inputs to the session event loop
#[derive(Debug)]
pub enum SessionEvent {
    /// Server accepted the registration
    Welcome,
    /// A CTCP request arrived
    Ctcp {
        /// Sender's nickname
        from: String,
        /// CTCP command, e.g. `DCC`
        command: String,
        /// Everything after the command, e.g. `SEND file 2130706433 5000 1024`
        argument: String,
    },
    /// A transfer task finished
    TransferFinished {
        /// Transfer ID
        id: TransferId,
        /// How it ended
        outcome: TransferOutcome,
    },
    /// The control connection closed
    Disconnected {
        /// Why
        reason: String,
    },
}

/// Create the channel control adapters and transfer tasks report into
pub fn event_channel() -> (mpsc::Sender<SessionEvent>, mpsc::Receiver<SessionEvent>) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}

/// Everything the session talks to
pub struct Collaborators {
    /// Outbound control connection
    pub control: Arc<dyn ControlChannel>,
    /// Opens DCC byte connections
    pub connector: Arc<dyn DccConnector>,
    /// Unpacks listings and downloads
    pub extractor: Arc<dyn ArchiveExtractor>,
    /// Supplies search queries
    pub query: Arc<dyn QueryProvider>,
    /// Picks lines out of listings
    pub selection: Arc<dyn SelectionProvider>,
}

enum Flow {
    Continue,
    Stop,
}

/// The search / listing / retrieval workflow over one control connection
pub struct Session {
    config: Config,
    control: Arc<dyn ControlChannel>,
    extractor: Arc<dyn ArchiveExtractor>,
    query: Arc<dyn QueryProvider>,
    selection: Arc<dyn SelectionProvider>,
    transfer_ctx: Arc<TransferContext>,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
    event_tx: broadcast::Sender<Event>,
    state: SessionState,
    queue: RetrievalQueue,
    next_transfer_id: u64,
    transfers: HashMap<TransferId, JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl Session {
    /// Build a session; `events_tx` must feed `events_rx`
    pub fn new(
        config: Config,
        collaborators: Collaborators,
        events_tx: mpsc::Sender<SessionEvent>,
        events_rx: mpsc::Receiver<SessionEvent>,
    ) -> Self {
        let (event_tx, _rx) = broadcast::channel(BROADCAST_CAPACITY);
        let transfer_ctx = Arc::new(TransferContext {
            connector: collaborators.connector,
            downloads: Arc::new(DownloadDir::new(config.download_dir().clone())),
            read_buffer_size: config.download.read_buffer_size,
            idle_timeout: config.download.idle_timeout,
            event_tx: event_tx.clone(),
        });

        Self {
            config,
            control: collaborators.control,
            extractor: collaborators.extractor,
            query: collaborators.query,
            selection: collaborators.selection,
            transfer_ctx,
            events_tx,
            events_rx,
            event_tx,
            state: SessionState::Idle,
            queue: RetrievalQueue::new(),
            next_transfer_id: 1,
            transfers: HashMap::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Subscribe to session events
    ///
    /// Slow subscribers miss events rather than blocking transfers.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Sender for injecting [`SessionEvent`]s
    pub fn event_sender(&self) -> mpsc::Sender<SessionEvent> {
        self.events_tx.clone()
    }

    /// Token that stops the session when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// What the session is currently waiting for
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Shared handle to the outstanding retrieval count
    pub fn retrieval_queue(&self) -> RetrievalQueue {
        self.queue.clone()
    }

    /// Process events until the connection closes, the operator stops, the
    /// shutdown token fires, or a fatal error occurs
    ///
    /// In-flight transfers are cancelled and awaited before returning.
    pub async fn run(mut self) -> Result<()> {
        info!(
            channel = %self.config.irc.channel,
            download_dir = ?self.config.download_dir(),
            "session started"
        );

        let result = loop {
            let event = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    self.leave().await;
                    break Ok(());
                }
                event = self.events_rx.recv() => event,
            };
            let Some(event) = event else {
                break Err(Error::SessionClosed);
            };

            match self.handle(event).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break Ok(()),
                Err(e) if e.is_fatal() => break Err(e),
                Err(e) => warn!(error = %e, "session step failed"),
            }
        };

        self.stop_transfers().await;
        info!("session ended");
        result
    }

    async fn handle(&mut self, event: SessionEvent) -> Result<Flow> {
        match event {
            SessionEvent::Welcome => self.on_welcome().await,
            SessionEvent::Ctcp {
                from,
                command,
                argument,
            } => {
                self.on_ctcp(&from, &command, &argument)?;
                Ok(Flow::Continue)
            }
            SessionEvent::TransferFinished { id, outcome } => {
                self.transfers.remove(&id);
                self.on_transfer_finished(outcome).await
            }
            SessionEvent::Disconnected { reason } => {
                info!(%reason, "control connection closed");
                Ok(Flow::Stop)
            }
        }
    }

    async fn on_welcome(&mut self) -> Result<Flow> {
        let channel = self.config.irc.channel.clone();
        if !is_channel_name(&channel) {
            return Err(Error::ChannelJoin { channel });
        }
        self.control.join(&channel).await?;
        self.search().await
    }

    /// Ask for a query and send it to the channel
    async fn search(&mut self) -> Result<Flow> {
        self.state = SessionState::Idle;
        let provider = Arc::clone(&self.query);
        let query = tokio::select! {
            _ = self.shutdown.cancelled() => {
                self.leave().await;
                return Ok(Flow::Stop);
            }
            query = provider.query() => query?,
        };

        let Some(query) = query else {
            info!("no more queries");
            self.control.quit(QUIT_MESSAGE).await?;
            return Ok(Flow::Stop);
        };

        let text = format!("{} {}", self.config.search.command_prefix, query);
        self.control
            .send_message(&self.config.irc.channel, &text)
            .await?;
        self.state = SessionState::AwaitingOffer;
        info!(%query, "search issued");
        self.emit_event(Event::SearchIssued { query });
        Ok(Flow::Continue)
    }

    fn on_ctcp(&mut self, from: &str, command: &str, argument: &str) -> Result<()> {
        if command != "DCC" {
            debug!(%from, %command, "ignoring CTCP request");
            return Ok(());
        }
        let offer = parse_offer(argument)?;

        if self.state == SessionState::Idle {
            warn!(%from, filename = %offer.filename, "accepting an offer nothing asked for");
        }

        let id = TransferId(self.next_transfer_id);
        self.next_transfer_id += 1;
        info!(
            transfer_id = id.0,
            %from,
            filename = %offer.filename,
            declared_size = ?offer.declared_size,
            peer = %offer.peer(),
            "DCC SEND offer accepted"
        );
        self.emit_event(Event::OfferReceived {
            id,
            from: from.to_string(),
            filename: offer.filename.clone(),
            declared_size: offer.declared_size,
        });

        let transfer = Transfer::new(id, offer, Arc::clone(&self.transfer_ctx));
        let cancel = self.shutdown.child_token();
        let events_tx = self.events_tx.clone();
        let handle = tokio::spawn(async move {
            let outcome = transfer.run(cancel).await;
            events_tx
                .send(SessionEvent::TransferFinished { id, outcome })
                .await
                .ok();
        });
        self.transfers.insert(id, handle);
        Ok(())
    }

    async fn on_transfer_finished(&mut self, outcome: TransferOutcome) -> Result<Flow> {
        let marker = self.config.search.listing_marker.clone();
        match outcome {
            TransferOutcome::Complete(done) if is_listing(&done.path, &marker) => {
                self.on_listing(done).await
            }
            TransferOutcome::Complete(done) => self.on_download(done).await,
            TransferOutcome::Failed { offer, error } => {
                if is_listing(Path::new(&offer.filename), &marker) {
                    warn!(filename = %offer.filename, error = %error, "listing transfer failed, searching again");
                    self.search().await
                } else {
                    warn!(filename = %offer.filename, error = %error, "download failed");
                    self.retrieval_finished().await
                }
            }
            TransferOutcome::Cancelled { offer } => {
                debug!(filename = %offer.filename, "transfer cancelled");
                Ok(Flow::Continue)
            }
        }
    }

    async fn on_listing(&mut self, done: CompletedTransfer) -> Result<Flow> {
        let canonical = self
            .config
            .download_dir()
            .join(&self.config.download.listing_file_name);

        let result = match materialize_listing(&*self.extractor, &done.path, &canonical).await {
            Ok(listing) => read_listing(&listing).await,
            Err(e) => Err(e),
        };
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                warn!(listing = ?done.path, error = %e, "could not read search listing, searching again");
                self.emit_event(Event::ExtractionFailed {
                    archive: done.path,
                    error: e.to_string(),
                });
                return self.search().await;
            }
        };

        info!(count = result.len(), "search results ready");
        self.emit_event(Event::ResultsReady {
            count: result.len(),
        });

        let selection = Arc::clone(&self.selection);
        let picks = tokio::select! {
            _ = self.shutdown.cancelled() => {
                self.leave().await;
                return Ok(Flow::Stop);
            }
            picks = selection.select(result.lines()) => picks?,
        };

        let mut sent = 0;
        for index in picks {
            let Some(line) = result.get(index) else {
                warn!(index, count = result.len(), "selection out of range, skipping");
                continue;
            };
            let command = match extract_command(line) {
                Ok(command) => command,
                Err(e) => {
                    warn!(index, error = %e, "skipping selection");
                    continue;
                }
            };
            self.control
                .send_message(&self.config.irc.channel, command)
                .await?;
            info!(%command, "retrieval requested");
            self.emit_event(Event::RetrievalRequested {
                command: command.to_string(),
            });
            sent += 1;
        }

        self.queue.set(sent);
        if sent == 0 {
            info!("nothing selected");
            return self.search().await;
        }
        self.state = SessionState::AwaitingOffer;
        Ok(Flow::Continue)
    }

    async fn on_download(&mut self, done: CompletedTransfer) -> Result<Flow> {
        let dest = self.config.download_dir().clone();
        match self.extractor.extract(&done.path, &dest).await {
            Ok(files) => {
                info!(archive = ?done.path, count = files.len(), "download extracted");
                self.emit_event(Event::Extracted {
                    archive: done.path,
                    files,
                });
            }
            Err(Error::Extraction(ExtractionError::UnknownFormat { .. })) => {
                debug!(path = ?done.path, "download is not an archive, keeping it as-is");
            }
            Err(e) => {
                warn!(archive = ?done.path, error = %e, "extraction failed, keeping the archive");
                self.emit_event(Event::ExtractionFailed {
                    archive: done.path,
                    error: e.to_string(),
                });
            }
        }
        self.retrieval_finished().await
    }

    async fn retrieval_finished(&mut self) -> Result<Flow> {
        match self.queue.decrement() {
            Some(0) => self.search().await,
            Some(remaining) => {
                debug!(remaining, "waiting for more downloads");
                Ok(Flow::Continue)
            }
            None => {
                debug!("download was not part of a selection");
                Ok(Flow::Continue)
            }
        }
    }

    async fn leave(&self) {
        info!("shutdown requested");
        if let Err(e) = self.control.quit(QUIT_MESSAGE).await {
            warn!(error = %e, "failed to send QUIT");
        }
    }

    /// Cancel every transfer and wait for the tasks to clean up
    async fn stop_transfers(&mut self) {
        if self.transfers.is_empty() {
            return;
        }
        info!(count = self.transfers.len(), "cancelling in-flight transfers");
        self.shutdown.cancel();
        let handles: Vec<_> = self.transfers.drain().map(|(_, handle)| handle).collect();
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "transfer task panicked");
            }
        }
    }

    fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine - we just drop the event
        self.event_tx.send(event).ok();
    }
}
