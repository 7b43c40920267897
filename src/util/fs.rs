//! Filesystem utilities.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    if !path.is_dir() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Write `contents` to `path` unless the file already holds exactly those
/// bytes. Parent directories are created as needed.
///
/// Returns `true` when the file was written. Skipping identical writes keeps
/// the file's mtime stable, which downstream compilers use to decide whether
/// anything needs rebuilding.
pub fn write_if_changed(path: &Path, contents: &[u8]) -> io::Result<bool> {
    match fs::read(path) {
        Ok(existing) if existing == contents => return Ok(false),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents)?;
    Ok(true)
}

/// Join a `/`-separated subpath onto a base directory.
///
/// An empty subpath yields the base itself, without a trailing separator.
pub fn join_subpath(base: &Path, subpath: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    for component in subpath.split('/').filter(|c| !c.is_empty()) {
        path.push(component);
    }
    path
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}
