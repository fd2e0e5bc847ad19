//! Search listings: locating, reading, and turning lines into bot commands

use crate::error::{CommandExtractionError, ExtractionError, Result};
use crate::extraction::{ArchiveExtractor, detect_archive_type};
use crate::utils::remove_if_exists;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};

/// `!` up to the first known extension or any 3-character extension
#[allow(clippy::expect_used)]
static COMMAND_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!.*?(\.rar|\.zip|\.epub|\.mobi|\.pdf|\..{3})").expect("literal pattern compiles")
});

/// Ordered lines of a search listing; a line's index is its selection id
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchResult {
    lines: Vec<String>,
}

impl SearchResult {
    /// Wrap already-split lines
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Split listing text into lines (`\n` or `\r\n`)
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    /// All lines in order
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Line at `index`, if in range
    pub fn get(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    /// Number of lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the listing has no lines
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Whether a received file is a search listing rather than a requested download
///
/// Case-sensitive substring match on the file name only.
pub fn is_listing(path: &Path, marker: &str) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.contains(marker))
}

/// Find the retrieval command in a listing line
///
/// # Examples
///
/// ```
/// use ircget::listing::extract_command;
///
/// assert_eq!(
///     extract_command("Some Title !getfile123.rar extra text").unwrap(),
///     "!getfile123.rar"
/// );
/// assert!(extract_command("no command here").is_err());
/// ```
pub fn extract_command(line: &str) -> std::result::Result<&str, CommandExtractionError> {
    COMMAND_PATTERN
        .find(line)
        .map(|m| m.as_str())
        .ok_or_else(|| CommandExtractionError::NoCommandFound {
            line: line.to_string(),
        })
}

/// Produce the plain-text listing at `canonical` from a received listing file
///
/// Archives are unpacked into a staging directory next to `canonical` and
/// their first file is moved into place. A listing that is not an archive is
/// copied as-is.
pub async fn materialize_listing(
    extractor: &dyn ArchiveExtractor,
    received: &Path,
    canonical: &Path,
) -> Result<PathBuf> {
    let parent = canonical.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent).await?;

    if detect_archive_type(received).is_none() {
        debug!(?received, "listing is not an archive, using it directly");
        if received != canonical {
            tokio::fs::copy(received, canonical).await?;
        }
        return Ok(canonical.to_path_buf());
    }

    let staging = tempfile::Builder::new()
        .prefix(".listing-")
        .tempdir_in(parent)?;
    let mut files = extractor.extract(received, staging.path()).await?;
    files.sort();
    let first = files
        .into_iter()
        .next()
        .ok_or_else(|| ExtractionError::Empty {
            archive: received.to_path_buf(),
        })?;

    remove_if_exists(canonical).await?;
    tokio::fs::rename(&first, canonical).await?;
    info!(?received, listing = ?canonical, "extracted search listing");
    Ok(canonical.to_path_buf())
}

/// Read a listing file, tolerating non-UTF-8 bytes
pub async fn read_listing(path: &Path) -> Result<SearchResult> {
    let bytes = tokio::fs::read(path).await?;
    Ok(SearchResult::parse(&String::from_utf8_lossy(&bytes)))
}
