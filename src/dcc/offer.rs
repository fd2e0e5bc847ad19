//! Decoding of CTCP `DCC SEND` offers
//!
//! Wire format (the argument after the `DCC` CTCP keyword):
//!
//! ```text
//! SEND <filename> <packed-ipv4> <port> [size]
//! SEND "<filename with spaces>" <packed-ipv4> <port> [size]
//! ```

use crate::error::OfferParseError;
use crate::utils::sanitize_filename;
use std::net::{Ipv4Addr, SocketAddrV4};

/// The only DCC command this client accepts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OfferCommand {
    /// `SEND`: the peer offers a file on a listening socket
    Send,
}

impl OfferCommand {
    /// Token used on the wire
    pub const fn as_str(self) -> &'static str {
        match self {
            OfferCommand::Send => "SEND",
        }
    }
}

/// A decoded DCC SEND offer
///
/// `filename` is never empty and never contains a path separator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DccOffer {
    /// Always [`OfferCommand::Send`]
    pub command: OfferCommand,
    /// File name with any directory components removed
    pub filename: String,
    /// Address the peer listens on
    pub peer_address: Ipv4Addr,
    /// Port the peer listens on (never 0)
    pub peer_port: u16,
    /// Size announced by the peer; absent in legacy offers
    pub declared_size: Option<u64>,
}

impl DccOffer {
    /// Socket address to dial for the byte connection
    pub fn peer(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.peer_address, self.peer_port)
    }
}

impl std::str::FromStr for DccOffer {
    type Err = OfferParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_offer(s)
    }
}

/// Parse the argument of a CTCP `DCC` message into a [`DccOffer`]
///
/// # Examples
///
/// ```
/// use ircget::dcc::parse_offer;
/// use std::net::Ipv4Addr;
///
/// let offer = parse_offer("SEND \"search results.zip\" 2130706433 5000 1024").unwrap();
/// assert_eq!(offer.filename, "search results.zip");
/// assert_eq!(offer.peer_address, Ipv4Addr::new(127, 0, 0, 1));
/// assert_eq!(offer.peer_port, 5000);
/// assert_eq!(offer.declared_size, Some(1024));
/// ```
pub fn parse_offer(raw: &str) -> Result<DccOffer, OfferParseError> {
    let command = raw.split_whitespace().next().unwrap_or_default();
    if command != OfferCommand::Send.as_str() {
        return Err(OfferParseError::NotASendOffer {
            command: command.to_string(),
        });
    }

    let (raw_filename, fields) = match raw.find('"') {
        Some(open) => split_quoted(raw, open)?,
        None => {
            let mut tokens = raw.split_whitespace().skip(1);
            let filename = tokens
                .next()
                .ok_or_else(|| OfferParseError::malformed("missing filename"))?;
            (filename, tokens.collect())
        }
    };

    let filename = sanitize_filename(raw_filename)
        .ok_or_else(|| OfferParseError::malformed(format!("unusable filename {raw_filename:?}")))?;

    let [address, port, rest @ ..] = fields.as_slice() else {
        return Err(OfferParseError::malformed(format!(
            "expected address and port after filename, got {} token(s)",
            fields.len()
        )));
    };

    let peer_address = parse_address(address)?;
    let peer_port: u16 = port
        .parse()
        .map_err(|_| OfferParseError::malformed(format!("invalid port {port:?}")))?;
    if peer_port == 0 {
        return Err(OfferParseError::PassiveOffer);
    }

    let declared_size = rest
        .first()
        .map(|size| {
            size.parse::<u64>()
                .map_err(|_| OfferParseError::malformed(format!("invalid size {size:?}")))
        })
        .transpose()?;

    Ok(DccOffer {
        command: OfferCommand::Send,
        filename,
        peer_address,
        peer_port,
        declared_size,
    })
}

/// Split a payload whose filename is quoted
///
/// Only `SEND` may precede the opening quote; the tokens after the closing
/// quote are the address, port and optional size.
fn split_quoted(raw: &str, open: usize) -> Result<(&str, Vec<&str>), OfferParseError> {
    let after_open = &raw[open + 1..];
    let close = after_open
        .find('"')
        .ok_or_else(|| OfferParseError::malformed("unterminated quoted filename"))?;

    let before: Vec<&str> = raw[..open].split_whitespace().collect();
    if before.len() != 1 {
        return Err(OfferParseError::malformed(
            "unexpected tokens before quoted filename",
        ));
    }

    let filename = &after_open[..close];
    let fields = after_open[close + 1..].split_whitespace().collect();
    Ok((filename, fields))
}

/// Decode a peer address: packed decimal (`2130706433`) or dotted quad
fn parse_address(token: &str) -> Result<Ipv4Addr, OfferParseError> {
    if token.contains('.') {
        return token
            .parse()
            .map_err(|_| OfferParseError::malformed(format!("invalid address {token:?}")));
    }
    token
        .parse::<u32>()
        .map(Ipv4Addr::from)
        .map_err(|_| OfferParseError::malformed(format!("invalid packed address {token:?}")))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unquoted_offer() {
        let offer = parse_offer("SEND SearchBot_results.zip 3232235777 4012 20480").unwrap();
        assert_eq!(
            offer,
            DccOffer {
                command: OfferCommand::Send,
                filename: "SearchBot_results.zip".to_string(),
                peer_address: Ipv4Addr::new(192, 168, 1, 1),
                peer_port: 4012,
                declared_size: Some(20480),
            }
        );
        assert_eq!(offer.peer().to_string(), "192.168.1.1:4012");
    }

    #[test]
    fn test_parse_quoted_offer_with_spaces() {
        let offer =
            parse_offer("SEND \"Author Name - A Long Title.epub\" 2130706433 5000 1024").unwrap();
        assert_eq!(offer.filename, "Author Name - A Long Title.epub");
        assert_eq!(offer.peer_address, Ipv4Addr::LOCALHOST);
        assert_eq!(offer.peer_port, 5000);
        assert_eq!(offer.declared_size, Some(1024));
    }

    #[test]
    fn test_parse_quoted_offer_without_spaces() {
        let offer = parse_offer("SEND \"book.mobi\" 16909060 6000 77").unwrap();
        assert_eq!(offer.filename, "book.mobi");
        assert_eq!(offer.peer_address, Ipv4Addr::new(1, 2, 3, 4));
    }

    #[test]
    fn test_parse_legacy_offer_without_size() {
        let offer = parse_offer("SEND old.txt 2130706433 5000").unwrap();
        assert_eq!(offer.declared_size, None);
    }

    #[test]
    fn test_parse_dotted_quad_address() {
        let offer = parse_offer("SEND a.zip 10.0.0.5 5000 1").unwrap();
        assert_eq!(offer.peer_address, Ipv4Addr::new(10, 0, 0, 5));
    }

    #[test]
    fn test_parse_ignores_trailing_tokens() {
        let offer = parse_offer("SEND a.zip 2130706433 5000 12 T99").unwrap();
        assert_eq!(offer.declared_size, Some(12));
    }

    #[test]
    fn test_parse_strips_path_components() {
        let offer = parse_offer("SEND \"../../etc/cron.d/evil\" 2130706433 5000 1").unwrap();
        assert_eq!(offer.filename, "evil");
        let offer = parse_offer("SEND ..\\x\\evil.rar 2130706433 5000 1").unwrap();
        assert_eq!(offer.filename, "evil.rar");
    }

    #[test]
    fn test_command_is_case_sensitive() {
        assert_eq!(
            parse_offer("send a.zip 2130706433 5000 1").unwrap_err(),
            OfferParseError::NotASendOffer {
                command: "send".to_string()
            }
        );
        assert!(matches!(
            parse_offer("CHAT chat 2130706433 5000"),
            Err(OfferParseError::NotASendOffer { .. })
        ));
        assert!(matches!(
            parse_offer(""),
            Err(OfferParseError::NotASendOffer { .. })
        ));
    }

    #[test]
    fn test_too_few_tokens_is_malformed() {
        for raw in [
            "SEND",
            "SEND a.zip",
            "SEND a.zip 2130706433",
            "SEND \"a b.zip\" 2130706433",
        ] {
            assert!(
                matches!(parse_offer(raw), Err(OfferParseError::Malformed { .. })),
                "{raw:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_bad_numbers_are_malformed() {
        for raw in [
            "SEND a.zip localhost 5000 1",
            "SEND a.zip 99999999999 5000 1",
            "SEND a.zip 2130706433 70000 1",
            "SEND a.zip 2130706433 port 1",
            "SEND a.zip 2130706433 5000 -1",
            "SEND a.zip 2130706433 5000 big",
        ] {
            assert!(
                matches!(parse_offer(raw), Err(OfferParseError::Malformed { .. })),
                "{raw:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_unterminated_quote_is_malformed() {
        assert!(matches!(
            parse_offer("SEND \"a b.zip 2130706433 5000 1"),
            Err(OfferParseError::Malformed { .. })
        ));
    }

    #[test]
    fn test_tokens_before_quote_are_malformed() {
        assert!(matches!(
            parse_offer("SEND extra \"a b.zip\" 2130706433 5000 1"),
            Err(OfferParseError::Malformed { .. })
        ));
    }

    #[test]
    fn test_empty_filename_is_malformed() {
        assert!(matches!(
            parse_offer("SEND \"\" 2130706433 5000 1"),
            Err(OfferParseError::Malformed { .. })
        ));
        assert!(matches!(
            parse_offer("SEND .. 2130706433 5000 1"),
            Err(OfferParseError::Malformed { .. })
        ));
    }

    #[test]
    fn test_port_zero_is_passive() {
        assert_eq!(
            parse_offer("SEND a.zip 2130706433 0 1 42").unwrap_err(),
            OfferParseError::PassiveOffer
        );
    }

    #[test]
    fn test_from_str() {
        let offer: DccOffer = "SEND a.zip 2130706433 5000".parse().unwrap();
        assert_eq!(offer.filename, "a.zip");
    }
}
