use crate::error::ExtractionError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::shared::{io_failure, safe_entry_path};

/// Archive extractor for ZIP files
pub struct ZipExtractor;

impl ZipExtractor {
    /// Extract a single ZIP entry to disk, creating directories as needed
    fn extract_zip_entry(
        mut file: zip::read::ZipFile,
        dest_path: &Path,
        archive_path: &Path,
    ) -> Result<Option<PathBuf>, ExtractionError> {
        let Some(name) = file.enclosed_name().map(Path::to_path_buf) else {
            warn!(?archive_path, "skipping entry with unsafe path");
            return Ok(None);
        };
        let Some(file_path) = safe_entry_path(dest_path, &name) else {
            return Ok(None);
        };

        if file.is_dir() {
            std::fs::create_dir_all(&file_path)
                .map_err(|e| io_failure(archive_path, "failed to create directory", e))?;
            return Ok(None);
        }

        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| io_failure(archive_path, "failed to create parent directories", e))?;
        }

        let mut outfile = std::fs::File::create(&file_path)
            .map_err(|e| io_failure(archive_path, "failed to create output file", e))?;
        std::io::copy(&mut file, &mut outfile)
            .map_err(|e| io_failure(archive_path, "failed to extract file", e))?;

        Ok(Some(file_path))
    }

    /// Extract every entry of a ZIP archive into `dest_path`
    pub fn try_extract(
        archive_path: &Path,
        dest_path: &Path,
    ) -> Result<Vec<PathBuf>, ExtractionError> {
        debug!(?archive_path, ?dest_path, "attempting ZIP extraction");

        std::fs::create_dir_all(dest_path)
            .map_err(|e| io_failure(archive_path, "failed to create destination", e))?;

        let file = std::fs::File::open(archive_path)
            .map_err(|e| io_failure(archive_path, "failed to open ZIP archive", e))?;

        let mut archive = zip::ZipArchive::new(file).map_err(|e| ExtractionError::Failed {
            archive: archive_path.to_path_buf(),
            reason: format!("failed to read ZIP archive: {}", e),
        })?;

        let mut extracted_files = Vec::new();
        for i in 0..archive.len() {
            let entry = archive.by_index(i).map_err(|e| ExtractionError::Failed {
                archive: archive_path.to_path_buf(),
                reason: format!("failed to read ZIP entry: {}", e),
            })?;

            if let Some(file_path) = Self::extract_zip_entry(entry, dest_path, archive_path)? {
                extracted_files.push(file_path);
            }
        }

        Ok(extracted_files)
    }
}
