use crate::error::ExtractionError;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::shared::{collect_files, io_failure};

/// Archive extractor for 7z files
///
/// `sevenz_rust` extracts a whole archive at once, so entries are first
/// unpacked into a staging directory inside `dest_path`, checked to lie inside
/// it, and then moved into place.
pub struct SevenZipExtractor;

impl SevenZipExtractor {
    /// Extract every file of a 7z archive into `dest_path`
    pub fn try_extract(
        archive_path: &Path,
        dest_path: &Path,
    ) -> Result<Vec<PathBuf>, ExtractionError> {
        debug!(?archive_path, ?dest_path, "attempting 7z extraction");

        std::fs::create_dir_all(dest_path)
            .map_err(|e| io_failure(archive_path, "failed to create destination", e))?;
        let staging = tempfile::Builder::new()
            .prefix(".7z-staging-")
            .tempdir_in(dest_path)
            .map_err(|e| io_failure(archive_path, "failed to create staging directory", e))?;

        sevenz_rust::decompress_file(archive_path, staging.path()).map_err(|e| {
            ExtractionError::Failed {
                archive: archive_path.to_path_buf(),
                reason: format!("failed to extract 7z archive: {}", e),
            }
        })?;

        let canonical_staging = staging
            .path()
            .canonicalize()
            .map_err(|e| io_failure(archive_path, "failed to canonicalize staging path", e))?;
        let staged = collect_files(staging.path())
            .map_err(|e| io_failure(archive_path, "failed to list extracted files", e))?;

        let mut extracted_files = Vec::with_capacity(staged.len());
        for file in staged {
            let canonical = file
                .canonicalize()
                .map_err(|e| io_failure(archive_path, "failed to canonicalize extracted path", e))?;
            // Validate that all extracted files are within the staging directory (path traversal protection)
            let relative = canonical.strip_prefix(&canonical_staging).map_err(|_| {
                ExtractionError::Failed {
                    archive: archive_path.to_path_buf(),
                    reason: format!(
                        "path traversal detected: extracted file {:?} is outside destination",
                        canonical
                    ),
                }
            })?;

            let target = dest_path.join(relative);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| io_failure(archive_path, "failed to create parent directories", e))?;
            }
            std::fs::rename(&canonical, &target)
                .map_err(|e| io_failure(archive_path, "failed to move extracted file", e))?;
            extracted_files.push(target);
        }

        Ok(extracted_files)
    }
}
