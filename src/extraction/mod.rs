//! Archive extraction
//!
//! Downloads from search bots arrive as RAR, ZIP or 7z archives. This module
//! exposes extraction as the [`ArchiveExtractor`] trait so the session never
//! shells out: [`NativeExtractor`] detects the archive type by extension and
//! routes to the matching in-process extractor, [`NoOpExtractor`] disables
//! extraction entirely.

mod rar;
mod sevenz;
mod shared;
mod zip;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

// Re-exports
pub use rar::RarExtractor;
pub use sevenz::SevenZipExtractor;
pub use shared::detect_archive_type;
pub use zip::ZipExtractor;

use crate::error::{Error, ExtractionError, Result};
use crate::types::ArchiveType;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// Unpacks downloaded archives
///
/// Implementations report structured failures; an unrecognized format is
/// [`ExtractionError::UnknownFormat`], which callers treat as "nothing to do".
///
/// # Examples
///
/// ```no_run
/// use ircget::extraction::{ArchiveExtractor, NativeExtractor};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let files = NativeExtractor
///     .extract(Path::new("downloads/book.rar"), Path::new("downloads"))
///     .await?;
/// println!("Extracted {} files", files.len());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ArchiveExtractor: Send + Sync {
    /// Extract `archive_path` into `dest_path`, returning the files written
    async fn extract(&self, archive_path: &Path, dest_path: &Path) -> Result<Vec<PathBuf>>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// In-process extractor for RAR, ZIP and 7z archives
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeExtractor;

#[async_trait]
impl ArchiveExtractor for NativeExtractor {
    async fn extract(&self, archive_path: &Path, dest_path: &Path) -> Result<Vec<PathBuf>> {
        let archive_type =
            detect_archive_type(archive_path).ok_or_else(|| ExtractionError::UnknownFormat {
                archive: archive_path.to_path_buf(),
            })?;

        info!(
            ?archive_path,
            ?archive_type,
            "dispatching extraction to appropriate extractor"
        );

        let files = match archive_type {
            ArchiveType::Rar => {
                shared::extract_blocking("RAR", RarExtractor::try_extract, archive_path, dest_path)
                    .await
            }
            ArchiveType::SevenZip => {
                shared::extract_blocking(
                    "7z",
                    SevenZipExtractor::try_extract,
                    archive_path,
                    dest_path,
                )
                .await
            }
            ArchiveType::Zip => {
                shared::extract_blocking("ZIP", ZipExtractor::try_extract, archive_path, dest_path)
                    .await
            }
        }?;

        Ok(files)
    }

    fn name(&self) -> &'static str {
        "native"
    }
}

/// Extractor used when extraction is disabled
///
/// Every call returns [`Error::NotSupported`]; downloaded archives stay as they are.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpExtractor;

#[async_trait]
impl ArchiveExtractor for NoOpExtractor {
    async fn extract(&self, archive_path: &Path, _dest_path: &Path) -> Result<Vec<PathBuf>> {
        Err(Error::NotSupported(format!(
            "archive extraction is disabled, leaving {} in place",
            archive_path.display()
        )))
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
