use std::fmt::Debug;
use std::path::{Path, PathBuf};

use crate::kernel::error::Result;

/// File primitives over a storage root.
///
/// Paths handed to a provider are relative to its root. Providers back the
/// shared storage offered to plugins and the loading of settings files.
pub trait StorageProvider: Send + Sync + Debug {
    /// Get the name of this provider
    fn name(&self) -> &str;

    fn exists(&self, path: &Path) -> bool;

    fn is_file(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Create a directory and all its parent directories
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    fn read_to_string(&self, path: &Path) -> Result<String>;

    fn read_to_bytes(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write bytes to a file, replacing it atomically. Missing parent
    /// directories are created.
    fn write_bytes(&self, path: &Path, contents: &[u8]) -> Result<()>;

    fn write_string(&self, path: &Path, contents: &str) -> Result<()> {
        self.write_bytes(path, contents.as_bytes())
    }

    /// Rename or move a file or directory
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    fn remove_file(&self, path: &Path) -> Result<()>;

    fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// List the entries of a directory, relative to the root, sorted
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    fn metadata(&self, path: &Path) -> Result<std::fs::Metadata>;
}
