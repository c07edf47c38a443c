//! Host filesystem checks used when planning mounts

use std::fs;
use std::io;
use std::path::Path;

/// True when `path` exists and is a directory
pub fn is_dir(path: &Path) -> bool {
    path.is_dir()
}

/// True when `path` exists and is not a directory (sockets count as files)
pub fn is_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| !m.is_dir()).unwrap_or(false)
}

/// Create `path` and its parents if missing.
///
/// An existing non-directory at `path` is an error.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    if path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "path exists and is not a directory",
        ));
    }
    fs::create_dir_all(path)
}

/// Create an empty file at `path` (and its parent directories) if missing.
///
/// Returns whether the file was created. Existing content is never touched.
pub fn ensure_file(path: &Path) -> io::Result<bool> {
    if is_file(path) {
        return Ok(false);
    }
    if path.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "path exists and is a directory",
        ));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    fs::OpenOptions::new().append(true).create(true).open(path)?;
    Ok(true)
}
