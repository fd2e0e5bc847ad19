use crate::error::ExtractionError;
use crate::types::ArchiveType;
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};

/// Run a synchronous extractor on the blocking thread pool
pub(crate) async fn extract_blocking(
    format_name: &'static str,
    try_extract_fn: fn(&Path, &Path) -> Result<Vec<PathBuf>, ExtractionError>,
    archive_path: &Path,
    dest_path: &Path,
) -> Result<Vec<PathBuf>, ExtractionError> {
    info!(?archive_path, ?dest_path, "attempting {} extraction", format_name);

    // Use spawn_blocking to avoid blocking the async runtime during extraction
    let archive_path_owned = archive_path.to_path_buf();
    let dest_path_owned = dest_path.to_path_buf();
    let result = spawn_blocking(move || try_extract_fn(&archive_path_owned, &dest_path_owned))
        .await
        .map_err(|e| ExtractionError::Failed {
            archive: archive_path.to_path_buf(),
            reason: format!("extraction task panicked: {}", e),
        })?;

    match &result {
        Ok(files) => info!(
            ?archive_path,
            extracted_count = files.len(),
            "{} extraction successful",
            format_name
        ),
        Err(e) => warn!(?archive_path, error = %e, "{} extraction failed", format_name),
    }
    result
}

/// Detect archive type by file extension
///
/// Supports RAR (.rar, .r00), 7z (.7z), and ZIP (.zip) formats.
pub fn detect_archive_type(path: &Path) -> Option<ArchiveType> {
    let ext = path.extension()?.to_str()?.to_lowercase();

    match ext.as_str() {
        "rar" | "r00" => Some(ArchiveType::Rar),
        "7z" => Some(ArchiveType::SevenZip),
        "zip" => Some(ArchiveType::Zip),
        _ => None,
    }
}

/// Drop `.`/`..`/root components so an entry name cannot leave `dest_path`
///
/// Returns `None` when nothing remains (e.g. a pure `..` entry).
pub(crate) fn safe_entry_path(dest_path: &Path, entry_name: &Path) -> Option<PathBuf> {
    let sanitized = entry_name
        .components()
        .filter(|c| matches!(c, std::path::Component::Normal(_)))
        .collect::<PathBuf>();

    if sanitized.as_os_str().is_empty() {
        debug!(?entry_name, "skipping entry with no usable path components");
        return None;
    }
    Some(dest_path.join(sanitized))
}

/// Recursively collect all files (not directories) below `dir`
pub(crate) fn collect_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    fn visit_dir(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                visit_dir(&path, files)?;
            } else {
                files.push(path);
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    visit_dir(dir, &mut files)?;
    files.sort();
    Ok(files)
}

/// Map an I/O error during extraction to an extraction failure for `archive`
pub(crate) fn io_failure(archive: &Path, what: &str, e: std::io::Error) -> ExtractionError {
    ExtractionError::Failed {
        archive: archive.to_path_buf(),
        reason: format!("{}: {}", what, e),
    }
}
