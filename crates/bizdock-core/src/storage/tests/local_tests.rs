use std::path::{Path, PathBuf};

use tempfile::tempdir;

use crate::kernel::error::{Error, Result};
use crate::storage::error::StorageSystemError;
use crate::storage::local::LocalStorageProvider;
use crate::storage::provider::StorageProvider;

fn p(s: &str) -> PathBuf {
    PathBuf::from(s)
}

#[test]
fn test_write_creates_parents_and_reads_back() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(temp_dir.path().to_path_buf());

    provider.write_bytes(&p("exports/2024/report.csv"), b"id;name\n1;acme\n")?;
    assert!(provider.is_dir(&p("exports/2024")));
    assert_eq!(
        provider.read_to_string(&p("exports/2024/report.csv"))?,
        "id;name\n1;acme\n"
    );

    // Overwrite replaces the whole content
    provider.write_string(&p("exports/2024/report.csv"), "empty")?;
    assert_eq!(provider.read_to_bytes(&p("exports/2024/report.csv"))?, b"empty");
    Ok(())
}

#[test]
fn test_read_dir_is_relative_and_sorted() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(temp_dir.path().to_path_buf());
    provider.write_string(&p("inbox/b.txt"), "b")?;
    provider.write_string(&p("inbox/a.txt"), "a")?;

    let entries = provider.read_dir(&p("inbox"))?;
    assert_eq!(entries, vec![p("inbox/a.txt"), p("inbox/b.txt")]);
    Ok(())
}

#[test]
fn test_rename_moves_into_new_directory() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(temp_dir.path().to_path_buf());
    provider.write_string(&p("inbox/a.txt"), "a")?;

    provider.rename(&p("inbox/a.txt"), &p("archive/a.txt"))?;
    assert!(!provider.exists(&p("inbox/a.txt")));
    assert!(provider.is_file(&p("archive/a.txt")));

    provider.remove_file(&p("archive/a.txt"))?;
    provider.remove_dir_all(&p("archive"))?;
    assert!(!provider.exists(&p("archive")));
    Ok(())
}

#[test]
fn test_paths_cannot_escape_the_root() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(temp_dir.path().join("root"));

    let err = provider.write_string(Path::new("../outside.txt"), "x").unwrap_err();
    assert!(matches!(
        err,
        Error::StorageSystem(StorageSystemError::InvalidPath { .. })
    ));
    assert!(provider.read_to_bytes(Path::new("/etc/hostname")).is_err());
    assert!(!provider.exists(Path::new("../root")));
}

#[test]
fn test_missing_file_reports_io_error() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(temp_dir.path().to_path_buf());
    let err = provider.read_to_string(&p("missing.txt")).unwrap_err();
    match err {
        Error::StorageSystem(StorageSystemError::Io { operation, path, .. }) => {
            assert_eq!(operation, "read_to_string");
            assert!(path.ends_with("missing.txt"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
