//! DCC SEND negotiation and transfer
//!
//! - [`offer`] - decoding CTCP `DCC SEND` payloads
//! - [`sink`] - on-disk destinations for inbound transfers
//! - [`transfer`] - the per-connection receive and acknowledge state machine
//! - [`connector`] - dialing the peer's byte connection

pub mod connector;
pub mod offer;
pub mod sink;
pub mod transfer;

pub use connector::{DccConnector, DccStream, TcpConnector};
pub use offer::{DccOffer, OfferCommand, parse_offer};
pub use sink::{ByteSink, DownloadDir};
pub use transfer::{
    CompletedTransfer, Transfer, TransferContext, TransferOutcome, TransferSession, ack_bytes,
};
