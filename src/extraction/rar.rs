use crate::error::ExtractionError;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::shared::{io_failure, safe_entry_path};

/// Archive extractor for RAR files
pub struct RarExtractor;

impl RarExtractor {
    fn convert_unrar_error(e: unrar::error::UnrarError, archive_path: &Path) -> ExtractionError {
        ExtractionError::Failed {
            archive: archive_path.to_path_buf(),
            reason: e.to_string(),
        }
    }

    /// Extract every file of a RAR archive into `dest_path`
    pub fn try_extract(
        archive_path: &Path,
        dest_path: &Path,
    ) -> Result<Vec<PathBuf>, ExtractionError> {
        debug!(?archive_path, ?dest_path, "attempting RAR extraction");

        std::fs::create_dir_all(dest_path)
            .map_err(|e| io_failure(archive_path, "failed to create destination", e))?;

        let processor = unrar::Archive::new(archive_path)
            .open_for_processing()
            .map_err(|e| Self::convert_unrar_error(e, archive_path))?;

        let mut extracted_files = Vec::new();

        // Process each entry using the state machine interface
        let mut at_header = processor;
        loop {
            let at_file = match at_header.read_header() {
                Ok(Some(entry_processor)) => entry_processor,
                Ok(None) => break,
                Err(e) => return Err(Self::convert_unrar_error(e, archive_path)),
            };

            let header = at_file.entry();
            let target = if header.is_directory() {
                None
            } else {
                safe_entry_path(dest_path, Path::new(&header.filename))
            };

            at_header = match target {
                Some(file_path) => {
                    if let Some(parent) = file_path.parent() {
                        std::fs::create_dir_all(parent).map_err(|e| {
                            io_failure(archive_path, "failed to create parent directories", e)
                        })?;
                    }
                    let next = at_file
                        .extract_to(&file_path)
                        .map_err(|e| Self::convert_unrar_error(e, archive_path))?;
                    extracted_files.push(file_path);
                    next
                }
                None => at_file
                    .skip()
                    .map_err(|e| Self::convert_unrar_error(e, archive_path))?,
            };
        }

        Ok(extracted_files)
    }
}
