//! Test data: listings, archives and session configuration

use ircget::Config;
use std::io::{Cursor, Write};
use std::path::Path;
use std::time::Duration;

/// A three-line listing in the shape search bots produce
pub const LISTING: &str = "\
!Bot Author One - First Book.epub ::INFO:: 1.1MB\r\n\
!Bot Author Two - Second Book.mobi ::INFO:: 900KB\r\n\
!Bot Author Three - Third Book.zip ::INFO:: 2MB\r\n";

/// Build an in-memory ZIP archive
pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Deterministic payload of `len` bytes
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Session config pointing at `download_dir`
pub fn test_config(download_dir: &Path) -> Config {
    let mut config = Config::default();
    config.irc.server = "irc.example.net".to_string();
    config.irc.nickname = "tester".to_string();
    config.irc.channel = "#ebooks".to_string();
    config.download.download_dir = download_dir.to_path_buf();
    config.download.read_buffer_size = 512;
    config.download.idle_timeout = Some(Duration::from_secs(5));
    config
}
