//! On-disk destinations for inbound DCC transfers

use crate::utils::{remove_if_exists, sanitize_filename};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Which sink generation currently owns each path
type Owners = Arc<Mutex<OwnerTable>>;

#[derive(Debug, Default)]
struct OwnerTable {
    next_generation: u64,
    by_path: HashMap<PathBuf, u64>,
}

/// The directory every received file lands in
///
/// Opening a sink deletes any existing file of the same name and creates a
/// fresh one. That sequence runs under the owner table lock, so two transfers
/// targeting the same name cannot interleave their delete and create steps.
/// The newest sink for a path owns it; an older sink's
/// [`discard`](ByteSink::discard) leaves the file alone.
#[derive(Debug)]
pub struct DownloadDir {
    root: PathBuf,
    owners: Owners,
}

impl DownloadDir {
    /// Create a handle for `root`; the directory is created on first open
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            owners: Owners::default(),
        }
    }

    /// The download directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Destination path for a peer-supplied file name
    ///
    /// Directory components are stripped so the result always lies directly
    /// inside the download directory.
    pub fn resolve(&self, filename: &str) -> io::Result<PathBuf> {
        let name = sanitize_filename(filename).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unusable file name {filename:?}"),
            )
        })?;
        Ok(self.root.join(name))
    }

    /// Open a fresh sink for `filename`, replacing any file already there
    pub async fn open(&self, filename: &str, declared_size: Option<u64>) -> io::Result<ByteSink> {
        let path = self.resolve(filename)?;

        let mut owners = self.owners.lock().await;
        tokio::fs::create_dir_all(&self.root).await?;
        if remove_if_exists(&path).await? {
            info!(?path, "a file with this name already exists, deleted it");
        }
        let file = File::create(&path).await?;

        let generation = owners.next_generation;
        owners.next_generation += 1;
        owners.by_path.insert(path.clone(), generation);

        debug!(?path, ?declared_size, generation, "opened download sink");
        Ok(ByteSink {
            path,
            file: Some(file),
            received: 0,
            declared_size,
            owners: Arc::clone(&self.owners),
            generation,
        })
    }
}

/// Destination file for one transfer, tracking how many bytes it has received
#[derive(Debug)]
pub struct ByteSink {
    path: PathBuf,
    file: Option<File>,
    received: u64,
    declared_size: Option<u64>,
    owners: Owners,
    generation: u64,
}

impl ByteSink {
    /// Append a chunk and return the cumulative byte count
    ///
    /// The bytes have been handed to the file system when this returns, so the
    /// count is safe to acknowledge to the peer.
    pub async fn write(&mut self, chunk: &[u8]) -> io::Result<u64> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::other(format!("sink {} is closed", self.path.display())))?;
        file.write_all(chunk).await?;
        file.flush().await?;
        self.received += chunk.len() as u64;
        Ok(self.received)
    }

    /// Flush and release the file, returning the final path and byte count
    ///
    /// Closing an already closed sink does nothing and returns the same values.
    pub async fn close(&mut self) -> io::Result<(PathBuf, u64)> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
            self.release().await;
            info!(
                path = ?self.path,
                received = self.received,
                "received file ({} bytes)",
                self.received
            );
        }
        Ok((self.path.clone(), self.received))
    }

    /// Close the sink and delete whatever was written
    ///
    /// If a newer sink has since been opened for the same path, the file is
    /// that sink's and is left in place.
    pub async fn discard(mut self) -> io::Result<()> {
        drop(self.file.take());
        let mut owners = self.owners.lock().await;
        if owners.by_path.get(&self.path) != Some(&self.generation) {
            debug!(path = ?self.path, "path was reopened by a newer transfer, not deleting");
            return Ok(());
        }
        owners.by_path.remove(&self.path);
        if remove_if_exists(&self.path).await? {
            debug!(path = ?self.path, received = self.received, "discarded partial download");
        }
        Ok(())
    }

    /// Drop this sink's claim on its path, if it still holds it
    async fn release(&self) {
        let mut owners = self.owners.lock().await;
        if owners.by_path.get(&self.path) == Some(&self.generation) {
            owners.by_path.remove(&self.path);
        }
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written so far
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Size announced by the peer, if any
    pub fn declared_size(&self) -> Option<u64> {
        self.declared_size
    }

    /// Whether [`close`](Self::close) has run
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_download_dir() {
        let temp_dir = TempDir::new().unwrap();
        let dir = DownloadDir::new(temp_dir.path().join("downloads"));

        let mut sink = dir.open("book.epub", Some(3)).await.unwrap();
        assert_eq!(sink.path(), temp_dir.path().join("downloads/book.epub"));
        assert_eq!(sink.declared_size(), Some(3));
        sink.close().await.unwrap();
        assert!(temp_dir.path().join("downloads/book.epub").exists());
    }

    #[tokio::test]
    async fn test_write_returns_cumulative_count() {
        let temp_dir = TempDir::new().unwrap();
        let dir = DownloadDir::new(temp_dir.path());

        let mut sink = dir.open("data.bin", None).await.unwrap();
        assert_eq!(sink.write(b"abc").await.unwrap(), 3);
        assert_eq!(sink.write(b"").await.unwrap(), 3);
        assert_eq!(sink.write(b"defg").await.unwrap(), 7);
        assert_eq!(sink.received(), 7);
    }

    #[tokio::test]
    async fn test_chunked_writes_match_single_write() {
        let temp_dir = TempDir::new().unwrap();
        let dir = DownloadDir::new(temp_dir.path());

        let mut chunked = dir.open("chunked.bin", None).await.unwrap();
        chunked.write(b"hello ").await.unwrap();
        chunked.write(b"world").await.unwrap();
        let (chunked_path, chunked_len) = chunked.close().await.unwrap();

        let mut whole = dir.open("whole.bin", None).await.unwrap();
        whole.write(b"hello world").await.unwrap();
        let (whole_path, whole_len) = whole.close().await.unwrap();

        assert_eq!(chunked_len, whole_len);
        assert_eq!(
            std::fs::read(chunked_path).unwrap(),
            std::fs::read(whole_path).unwrap()
        );
    }

    #[tokio::test]
    async fn test_close_twice_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let dir = DownloadDir::new(temp_dir.path());

        let mut sink = dir.open("twice.bin", None).await.unwrap();
        sink.write(b"1234").await.unwrap();
        let first = sink.close().await.unwrap();
        let second = sink.close().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.1, 4);
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let temp_dir = TempDir::new().unwrap();
        let dir = DownloadDir::new(temp_dir.path());

        let mut sink = dir.open("closed.bin", None).await.unwrap();
        sink.close().await.unwrap();
        assert!(sink.write(b"late").await.is_err());
    }

    #[tokio::test]
    async fn test_reopen_starts_from_zero() {
        let temp_dir = TempDir::new().unwrap();
        let dir = DownloadDir::new(temp_dir.path());

        let mut first = dir.open("same.txt", None).await.unwrap();
        first.write(b"stale stale stale").await.unwrap();
        first.close().await.unwrap();

        let mut second = dir.open("same.txt", None).await.unwrap();
        assert_eq!(second.received(), 0);
        second.write(b"new").await.unwrap();
        let (path, len) = second.close().await.unwrap();

        assert_eq!(len, 3);
        assert_eq!(std::fs::read(path).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_resolve_stays_inside_root() {
        let temp_dir = TempDir::new().unwrap();
        let dir = DownloadDir::new(temp_dir.path());

        assert_eq!(
            dir.resolve("../../escape.txt").unwrap(),
            temp_dir.path().join("escape.txt")
        );
        assert!(dir.resolve("..").is_err());
    }

    #[tokio::test]
    async fn test_discard_of_replaced_sink_keeps_newer_file() {
        let temp_dir = TempDir::new().unwrap();
        let dir = DownloadDir::new(temp_dir.path());

        let mut first = dir.open("same.epub", Some(9)).await.unwrap();
        first.write(b"old").await.unwrap();
        let mut second = dir.open("same.epub", Some(9)).await.unwrap();
        second.write(b"good data").await.unwrap();

        first.discard().await.unwrap();
        let (path, len) = second.close().await.unwrap();

        assert_eq!(len, 9);
        assert_eq!(std::fs::read(path).unwrap(), b"good data");
    }

    #[tokio::test]
    async fn test_discard_after_newer_sink_discarded_is_harmless() {
        let temp_dir = TempDir::new().unwrap();
        let dir = DownloadDir::new(temp_dir.path());

        let first = dir.open("twice.rar", None).await.unwrap();
        let second = dir.open("twice.rar", None).await.unwrap();
        let path = second.path().to_path_buf();

        second.discard().await.unwrap();
        assert!(!path.exists());
        first.discard().await.unwrap();

        let mut third = dir.open("twice.rar", None).await.unwrap();
        third.write(b"x").await.unwrap();
        third.close().await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_discard_removes_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let dir = DownloadDir::new(temp_dir.path());

        let mut sink = dir.open("partial.bin", Some(100)).await.unwrap();
        sink.write(b"half").await.unwrap();
        let path = sink.path().to_path_buf();
        sink.discard().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_concurrent_opens_of_same_name_do_not_interleave() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Arc::new(DownloadDir::new(temp_dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let dir = Arc::clone(&dir);
                tokio::spawn(async move { dir.open("race.bin", None).await })
            })
            .collect();

        for handle in handles {
            let mut sink = handle.await.unwrap().unwrap();
            sink.close().await.unwrap();
        }
        assert!(temp_dir.path().join("race.bin").exists());
    }
}
