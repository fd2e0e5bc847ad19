use crate::error::{Error, ExtractionError};
use crate::extraction::*;
use crate::types::ArchiveType;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create a valid ZIP archive containing the given files
fn create_zip_archive(archive_path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        std::io::Write::write_all(&mut writer, content).unwrap();
    }
    writer.finish().unwrap();
}

/// Create a valid 7z archive from a source directory using sevenz_rust
fn create_7z_archive(archive_path: &Path, source_dir: &Path) {
    sevenz_rust::compress_to_path(source_dir, archive_path).unwrap();
}

// ---------------------------------------------------------------------------
// Archive type detection
// ---------------------------------------------------------------------------

#[test]
fn test_detect_archive_type() {
    assert_eq!(
        detect_archive_type(Path::new("a/b/Book.RAR")),
        Some(ArchiveType::Rar)
    );
    assert_eq!(
        detect_archive_type(Path::new("part.r00")),
        Some(ArchiveType::Rar)
    );
    assert_eq!(
        detect_archive_type(Path::new("x.7z")),
        Some(ArchiveType::SevenZip)
    );
    assert_eq!(
        detect_archive_type(Path::new("SearchBot_results.zip")),
        Some(ArchiveType::Zip)
    );
    assert_eq!(detect_archive_type(Path::new("novel.epub")), None);
    assert_eq!(detect_archive_type(Path::new("noext")), None);
}

// ---------------------------------------------------------------------------
// ZIP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_native_extracts_zip() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("results.zip");
    create_zip_archive(
        &archive,
        &[("results.txt", b"line one\nline two\n"), ("sub/extra.txt", b"x")],
    );
    let dest = temp_dir.path().join("out");

    let mut files = NativeExtractor.extract(&archive, &dest).await.unwrap();
    files.sort();

    assert_eq!(
        files,
        vec![dest.join("results.txt"), dest.join("sub").join("extra.txt")]
    );
    assert_eq!(
        std::fs::read_to_string(dest.join("results.txt")).unwrap(),
        "line one\nline two\n"
    );
}

#[tokio::test]
async fn test_zip_traversal_entries_stay_inside_destination() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("evil.zip");
    create_zip_archive(&archive, &[("../escape.txt", b"nope"), ("ok.txt", b"fine")]);
    let dest = temp_dir.path().join("out");

    let files = ZipExtractor::try_extract(&archive, &dest).unwrap();

    assert_eq!(files, vec![dest.join("ok.txt")]);
    assert!(!temp_dir.path().join("escape.txt").exists());
}

#[tokio::test]
async fn test_corrupt_zip_is_extraction_failure() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("broken.zip");
    std::fs::write(&archive, b"definitely not a zip").unwrap();

    let err = NativeExtractor
        .extract(&archive, temp_dir.path())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Extraction(ExtractionError::Failed { .. })
    ));
}

// ---------------------------------------------------------------------------
// RAR
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_corrupt_rar_is_extraction_failure() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("broken.rar");
    std::fs::write(&archive, b"Rar! but not really").unwrap();

    let err = NativeExtractor
        .extract(&archive, &temp_dir.path().join("out"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Extraction(ExtractionError::Failed { .. })
    ));
}

// ---------------------------------------------------------------------------
// 7z
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_native_extracts_7z_into_destination() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("source");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(source.join("book.txt"), b"chapter one").unwrap();
    let archive = temp_dir.path().join("book.7z");
    create_7z_archive(&archive, &source);

    let dest = temp_dir.path().join("out");
    std::fs::create_dir_all(&dest).unwrap();
    std::fs::write(dest.join("unrelated.bin"), b"keep").unwrap();

    let files = NativeExtractor.extract(&archive, &dest).await.unwrap();

    assert_eq!(files.len(), 1, "should extract exactly 1 file");
    assert!(files[0].starts_with(&dest));
    assert!(files[0].ends_with("book.txt"));
    assert_eq!(std::fs::read_to_string(&files[0]).unwrap(), "chapter one");
    assert!(dest.join("unrelated.bin").exists());

    // staging directory is cleaned up
    let leftovers: Vec<PathBuf> = std::fs::read_dir(&dest)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(".7z-staging-"))
        })
        .collect();
    assert!(leftovers.is_empty(), "staging left behind: {leftovers:?}");
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_unknown_format_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let book = temp_dir.path().join("novel.epub");
    std::fs::write(&book, b"epub").unwrap();

    let err = NativeExtractor
        .extract(&book, temp_dir.path())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Extraction(ExtractionError::UnknownFormat { .. })
    ));
    assert!(book.exists());
}

#[tokio::test]
async fn test_noop_extractor_is_not_supported() {
    let err = NoOpExtractor
        .extract(Path::new("a.zip"), Path::new("."))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotSupported(_)));
    assert_eq!(NoOpExtractor.name(), "noop");
    assert_eq!(NativeExtractor.name(), "native");
}
