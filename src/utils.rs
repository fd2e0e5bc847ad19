//! Utility functions for file names and paths

use std::path::Path;

/// Reduce a peer-supplied file name to its final path component
///
/// Both `/` and `\` are treated as separators so that names offered by
/// Windows peers cannot escape the download directory either. Returns `None`
/// when nothing usable remains (empty, `.` or `..`).
///
/// # Examples
///
/// ```
/// use ircget::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("passwd"));
/// assert_eq!(sanitize_filename("C:\\books\\novel.epub").as_deref(), Some("novel.epub"));
/// assert_eq!(sanitize_filename(".."), None);
/// ```
#[must_use]
pub fn sanitize_filename(name: &str) -> Option<String> {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim_matches(char::from(0))
        .trim();

    match last {
        "" | "." | ".." => None,
        other => Some(other.to_string()),
    }
}

/// Remove a file if it exists, treating "not found" as success
pub async fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
