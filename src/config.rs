//! Configuration types for ircget

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// IRC server and channel settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IrcConfig {
    /// Server hostname
    #[serde(default)]
    pub server: String,

    /// Server port (default: 6667)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Nickname to register with
    #[serde(default)]
    pub nickname: String,

    /// Channel the search bot lives in (e.g., "#ebooks")
    #[serde(default)]
    pub channel: String,

    /// Connect with TLS (default: false)
    #[serde(default)]
    pub use_tls: bool,
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            port: default_port(),
            nickname: String::new(),
            channel: String::new(),
            use_tls: false,
        }
    }
}

/// Where and how inbound DCC transfers are stored
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadConfig {
    /// Download directory (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// File name of the extracted search listing inside the download directory
    /// (default: "searchresults.txt")
    #[serde(default = "default_listing_file_name")]
    pub listing_file_name: String,

    /// Read buffer size for DCC connections in bytes (default: 16384)
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,

    /// Give up on a DCC connection after this long without data (default: 120s, 0 or None = never)
    #[serde(
        default = "default_idle_timeout",
        with = "optional_duration_serde"
    )]
    pub idle_timeout: Option<Duration>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            listing_file_name: default_listing_file_name(),
            read_buffer_size: default_read_buffer_size(),
            idle_timeout: default_idle_timeout(),
        }
    }
}

/// Search bot conventions
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchConfig {
    /// Prefix of the search request line (default: "@search")
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// Case-sensitive substring identifying a search listing by file name (default: "SearchBot")
    #[serde(default = "default_listing_marker")]
    pub listing_marker: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            listing_marker: default_listing_marker(),
        }
    }
}

/// Main configuration for a search session
///
/// Fields are grouped into sub-configs:
/// - [`irc`](IrcConfig) — server, nickname, channel
/// - [`download`](DownloadConfig) — download directory and transfer tuning
/// - [`search`](SearchConfig) — bot command and listing conventions
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// IRC connection settings
    #[serde(default)]
    pub irc: IrcConfig,

    /// Download settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Search bot settings
    #[serde(default)]
    pub search: SearchConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing keys fall back to their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config {
            message: e.to_string(),
            key: None,
        })
    }

    /// Download directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Check that the settings needed to start a session are present
    pub fn validate(&self) -> Result<()> {
        if self.irc.server.trim().is_empty() {
            return Err(config_error("server must not be empty", "irc.server"));
        }
        if self.irc.nickname.trim().is_empty() {
            return Err(config_error("nickname must not be empty", "irc.nickname"));
        }
        if self.irc.channel.trim().is_empty() {
            return Err(config_error("channel must not be empty", "irc.channel"));
        }
        if self.irc.port == 0 {
            return Err(config_error("port must be non-zero", "irc.port"));
        }
        if self.download.read_buffer_size == 0 {
            return Err(config_error(
                "read buffer size must be non-zero",
                "download.read_buffer_size",
            ));
        }
        let listing = Path::new(&self.download.listing_file_name);
        if listing.file_name().map(|n| n != listing.as_os_str()).unwrap_or(true) {
            return Err(config_error(
                "listing file name must be a bare file name",
                "download.listing_file_name",
            ));
        }
        if self.search.listing_marker.is_empty() {
            return Err(config_error(
                "listing marker must not be empty",
                "search.listing_marker",
            ));
        }
        Ok(())
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

fn default_port() -> u16 {
    6667
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_listing_file_name() -> String {
    "searchresults.txt".to_string()
}

fn default_read_buffer_size() -> usize {
    16 * 1024
}

fn default_idle_timeout() -> Option<Duration> {
    Some(Duration::from_secs(120))
}

fn default_command_prefix() -> String {
    "@search".to_string()
}

fn default_listing_marker() -> String {
    "SearchBot".to_string()
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // 0 means disabled
        serializer.serialize_u64(duration.map_or(0, |d| d.as_secs()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.filter(|&secs| secs > 0).map(Duration::from_secs))
    }
}
