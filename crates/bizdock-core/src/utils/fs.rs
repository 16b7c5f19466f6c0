use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// List the regular files of `dir` (not recursive) whose extension is
/// `extension`, ignoring case, sorted by file name.
pub fn list_files_with_extension<P: AsRef<Path>>(dir: P, extension: &str) -> io::Result<Vec<PathBuf>> {
    let wanted = extension.trim_start_matches('.').to_lowercase();
    let mut result = Vec::new();

    if !dir.as_ref().is_dir() {
        return Ok(result);
    }

    for entry in fs::read_dir(dir)? {
        let entry_path = entry?.path();
        if !entry_path.is_file() {
            continue;
        }
        let matches = entry_path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase() == wanted)
            .unwrap_or(false);
        if matches {
            result.push(entry_path);
        }
    }

    result.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(result)
}

/// Total size in bytes of the files below `path`. A missing path has a
/// size of zero.
pub fn directory_size<P: AsRef<Path>>(path: P) -> io::Result<u64> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(0);
    }
    if path.is_file() {
        return Ok(fs::metadata(path)?.len());
    }

    let mut total = 0;
    for entry in fs::read_dir(path)? {
        let entry_path = entry?.path();
        if entry_path.is_dir() {
            total += directory_size(&entry_path)?;
        } else {
            total += fs::metadata(&entry_path)?.len();
        }
    }
    Ok(total)
}

/// Check if a file was modified after `since`
pub fn is_modified_since<P: AsRef<Path>>(path: P, since: SystemTime) -> io::Result<bool> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(modified > since)
}
