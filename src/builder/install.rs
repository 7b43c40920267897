//! Atomic per-group installation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::util::fs::ensure_dir;

/// Prefix of the staging directories created inside install destinations.
const STAGING_PREFIX: &str = ".quay-staging-";

/// Install `files` into `dest` as a unit.
///
/// Files are first copied into a staging directory inside `dest` and then
/// renamed into place. If a rename fails the files already moved are removed
/// again, so a failed install leaves none of the new files visible.
pub fn install_atomic(files: &[PathBuf], dest: &Path) -> io::Result<Vec<PathBuf>> {
    ensure_dir(dest)?;

    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(dest)?;

    let mut staged = Vec::with_capacity(files.len());
    for file in files {
        let name = file.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot install `{}`: no file name", file.display()),
            )
        })?;
        let staged_path = staging.path().join(name);
        fs::copy(file, &staged_path)?;
        staged.push((staged_path, dest.join(name)));
    }

    let mut installed: Vec<PathBuf> = Vec::with_capacity(staged.len());
    for (from, to) in &staged {
        if let Err(e) = fs::rename(from, to) {
            for path in &installed {
                if let Err(cleanup) = fs::remove_file(path) {
                    tracing::warn!(
                        "failed to roll back {}: {}",
                        path.display(),
                        cleanup
                    );
                }
            }
            return Err(e);
        }
        installed.push(to.clone());
    }

    tracing::debug!("installed {} file(s) into {}", installed.len(), dest.display());
    Ok(installed)
}
