//! Error types for ircget
//!
//! This module provides the error taxonomy for the library:
//! - Offer parsing errors (malformed CTCP SEND payloads)
//! - Transport errors on DCC byte connections
//! - Archive extraction errors
//! - Retrieval command extraction errors
//! - Session-level errors (channel join, IRC, configuration)
//!
//! Parsing and extraction errors are local and non-fatal: the affected item is skipped.
//! Transport errors end one transfer. Join and IRC errors end the session.

use std::net::SocketAddrV4;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for ircget operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ircget
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "irc.channel")
        key: Option<String>,
    },

    /// CTCP SEND offer could not be decoded
    #[error("offer parse error: {0}")]
    OfferParse(#[from] OfferParseError),

    /// DCC byte connection failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Archive extraction failed
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// No retrieval command in a listing line
    #[error("command extraction error: {0}")]
    CommandExtraction(#[from] CommandExtractionError),

    /// Configured channel is not a valid channel name
    #[error("{channel} is not a channel")]
    ChannelJoin {
        /// The rejected channel name
        channel: String,
    },

    /// IRC client library error
    #[error("IRC error: {0}")]
    Irc(#[from] irc::error::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operator prompt failed
    #[error("prompt error: {0}")]
    Prompt(String),

    /// Operation not supported (no extractor configured, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// The session event channel was closed
    #[error("session closed")]
    SessionClosed,
}

/// Errors decoding a CTCP `DCC SEND` payload
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OfferParseError {
    /// The first token was not `SEND`
    #[error("not a SEND offer: {command:?}")]
    NotASendOffer {
        /// The token found in the command position
        command: String,
    },

    /// Token count, quoting or numeric fields are invalid
    #[error("malformed offer: {reason}")]
    Malformed {
        /// What was wrong with the payload
        reason: String,
    },

    /// Port 0 requests a reverse connection, which is not supported
    #[error("passive DCC offers are not supported")]
    PassiveOffer,
}

impl OfferParseError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

/// Errors on a DCC byte connection
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not establish the connection to the peer
    #[error("failed to connect to {peer}: {source}")]
    Connect {
        /// The peer that was dialed
        peer: SocketAddrV4,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// Reading from the peer failed
    #[error("read from {peer} failed: {source}")]
    Read {
        /// The connected peer
        peer: SocketAddrV4,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// Sending the acknowledgment to the peer failed
    #[error("acknowledgment to {peer} failed: {source}")]
    Acknowledge {
        /// The connected peer
        peer: SocketAddrV4,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// Writing received bytes to disk failed
    #[error("failed to write {path}: {source}")]
    Sink {
        /// Destination file
        path: PathBuf,
        /// Underlying file system error
        #[source]
        source: std::io::Error,
    },

    /// Peer sent nothing for longer than the idle timeout
    #[error("no data from {peer} for {after:?}")]
    IdleTimeout {
        /// The connected peer
        peer: SocketAddrV4,
        /// The timeout that elapsed
        after: Duration,
    },
}

/// Archive extraction errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// File extension is not a known archive type
    #[error("unknown archive type for {}", archive.display())]
    UnknownFormat {
        /// The archive path
        archive: PathBuf,
    },

    /// Extractor reported a failure (corruption, encryption, disk full, ...)
    #[error("failed to extract {}: {reason}", archive.display())]
    Failed {
        /// The archive path
        archive: PathBuf,
        /// Reason extraction failed
        reason: String,
    },

    /// Archive contained no files
    #[error("archive {} contained no files", archive.display())]
    Empty {
        /// The archive path
        archive: PathBuf,
    },
}

/// Errors extracting a retrieval command from a listing line
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandExtractionError {
    /// No `!`-prefixed command ending at a known extension was found
    #[error("no retrieval command found in line: {line:?}")]
    NoCommandFound {
        /// The offending line
        line: String,
    },
}

impl Error {
    /// Whether this error ends the whole session rather than one item
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ChannelJoin { .. }
                | Error::Irc(_)
                | Error::Config { .. }
                | Error::SessionClosed
                | Error::Prompt(_)
        )
    }
}
