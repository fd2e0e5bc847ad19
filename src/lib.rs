//! # ircget
//!
//! Search and download client for IRC file-sharing bots.
//!
//! A session joins a channel, sends a search request to the channel's bot,
//! receives the result listing over DCC SEND, lets the operator pick lines, and
//! sends one retrieval command per pick. The files then arrive over DCC SEND as
//! well and are unpacked into the download directory.
//!
//! ## Layout
//!
//! - [`dcc`] parses offers and runs the byte transfers (one task per connection)
//! - [`session`] sequences searches, listings and retrievals
//! - [`control`] adapts the `irc` crate to the session's event loop
//! - [`prompt`] asks the operator for queries and selections
//! - [`extraction`] and [`listing`] turn received archives into usable files
//!
//! ## Quick Start
//!
//! ```no_run
//! use ircget::{
//!     Collaborators, Config, IrcControl, NativeExtractor, Session, TcpConnector,
//!     TerminalPrompt, event_channel, run_with_shutdown,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.irc.server = "irc.example.net".to_string();
//!     config.irc.nickname = "reader".to_string();
//!     config.irc.channel = "#ebooks".to_string();
//!     config.validate()?;
//!
//!     let (events_tx, events_rx) = event_channel();
//!     let (control, _reader) = IrcControl::connect(&config.irc, events_tx.clone()).await?;
//!     let prompt = Arc::new(TerminalPrompt);
//!     let session = Session::new(
//!         config,
//!         Collaborators {
//!             control: Arc::new(control),
//!             connector: Arc::new(TcpConnector),
//!             extractor: Arc::new(NativeExtractor),
//!             query: prompt.clone(),
//!             selection: prompt,
//!         },
//!         events_tx,
//!         events_rx,
//!     );
//!
//!     // Subscribe to events
//!     let mut events = session.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     run_with_shutdown(session).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// IRC control connection
pub mod control;
/// DCC SEND offers and transfers
pub mod dcc;
/// Error types
pub mod error;
/// Archive extraction
pub mod extraction;
/// Search listings and retrieval commands
pub mod listing;
/// Operator prompts
pub mod prompt;
/// Search session orchestration
pub mod session;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, DownloadConfig, IrcConfig, SearchConfig};
pub use control::{ControlChannel, IrcControl};
pub use dcc::{DccConnector, DccOffer, TcpConnector, TransferOutcome, parse_offer};
pub use error::{
    CommandExtractionError, Error, ExtractionError, OfferParseError, Result, TransportError,
};
pub use extraction::{ArchiveExtractor, NativeExtractor, NoOpExtractor};
pub use listing::{SearchResult, extract_command};
pub use prompt::{QueryProvider, ScriptedPrompt, SelectionProvider, TerminalPrompt};
pub use session::{Collaborators, RetrievalQueue, Session, SessionEvent, event_channel};
pub use types::{Event, SessionState, TransferId, TransferState};

/// Run a session until it ends or a termination signal arrives
///
/// On SIGTERM / SIGINT (Ctrl+C elsewhere) the session sends QUIT, cancels its
/// transfers and returns once they have cleaned up.
///
/// # Example
///
/// ```no_run
/// use ircget::{Session, run_with_shutdown};
///
/// # async fn example(session: Session) -> ircget::Result<()> {
/// run_with_shutdown(session).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_with_shutdown(session: Session) -> Result<()> {
    let shutdown = session.shutdown_token();
    let signals = tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.cancel();
    });

    let result = session.run().await;
    signals.abort();
    result
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // registration can fail in restricted environments
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Received Ctrl+C signal");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
