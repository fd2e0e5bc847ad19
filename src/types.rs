//! Core types for ircget

use serde::{Deserialize, Serialize};
use std::net::SocketAddrV4;
use std::path::PathBuf;

/// Session-unique identifier for a DCC transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(pub u64);

impl TransferId {
    /// Get the inner value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TransferId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TransferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a single DCC transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferState {
    /// Offer parsed, destination opened, not yet connected
    Offered,
    /// Byte connection to the peer established
    Connected,
    /// At least one chunk received and acknowledged
    Receiving,
    /// Peer closed the connection, sink closed
    Complete,
    /// Transport or sink failure
    Failed,
}

impl TransferState {
    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(self, next: TransferState) -> bool {
        use TransferState::*;
        match (self, next) {
            (Complete | Failed, _) => false,
            (_, Failed) => true,
            (Offered, Connected) => true,
            (Connected, Receiving | Complete) => true,
            (Receiving, Receiving | Complete) => true,
            _ => false,
        }
    }

    /// Whether the transfer has finished, successfully or not
    pub fn is_terminal(self) -> bool {
        matches!(self, TransferState::Complete | TransferState::Failed)
    }
}

/// What the session is waiting for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No request outstanding
    Idle,
    /// A search or retrieval was sent, waiting for offers
    AwaitingOffer,
}

/// Archive type detected from a file extension
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveType {
    /// RAR archive (.rar, .r00)
    Rar,
    /// 7-Zip archive (.7z)
    SevenZip,
    /// ZIP archive (.zip)
    Zip,
}

/// Event emitted during a search session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A search request was sent to the channel
    SearchIssued {
        /// The operator's query text
        query: String,
    },

    /// A DCC SEND offer was accepted
    OfferReceived {
        /// Transfer ID
        id: TransferId,
        /// Nickname that sent the offer
        from: String,
        /// Sanitized file name
        filename: String,
        /// Size announced by the peer, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        declared_size: Option<u64>,
    },

    /// Byte connection established
    TransferStarted {
        /// Transfer ID
        id: TransferId,
        /// Peer address
        peer: SocketAddrV4,
    },

    /// Chunk written and acknowledged
    Progress {
        /// Transfer ID
        id: TransferId,
        /// Total bytes received so far
        received: u64,
        /// Size announced by the peer, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        declared_size: Option<u64>,
    },

    /// Peer closed the connection and the file is on disk
    TransferComplete {
        /// Transfer ID
        id: TransferId,
        /// Final location
        path: PathBuf,
        /// Total bytes received
        received: u64,
    },

    /// Transfer failed and was discarded
    TransferFailed {
        /// Transfer ID
        id: TransferId,
        /// Error message
        error: String,
    },

    /// A search listing was read
    ResultsReady {
        /// Number of result lines
        count: usize,
    },

    /// A retrieval command was sent to the channel
    RetrievalRequested {
        /// The `!`-prefixed bot command
        command: String,
    },

    /// A downloaded archive was unpacked
    Extracted {
        /// The archive
        archive: PathBuf,
        /// Files written by the extractor
        files: Vec<PathBuf>,
    },

    /// Unpacking a downloaded archive failed (the archive stays on disk)
    ExtractionFailed {
        /// The archive
        archive: PathBuf,
        /// Error message
        error: String,
    },
}
