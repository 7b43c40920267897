//! Global context for Quay operations.
//!
//! Provides centralized access to the working directory, the global config
//! location and verbosity.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::util::config::{global_config_dir, PROJECT_FILE};

/// Error locating the project file.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("no {} found in `{}` or any parent directory", PROJECT_FILE, .dir.display())]
    NotFound { dir: PathBuf },
}

/// Global context containing configuration paths and verbosity.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global Quay data (~/.quay/)
    home: Option<PathBuf>,

    /// Whether to use verbose output
    verbose: bool,
}

impl GlobalContext {
    /// Create a new GlobalContext rooted at the process working directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        GlobalContext {
            cwd,
            home: global_config_dir(),
            verbose: false,
        }
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// The global configuration file path, if a home directory is known.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.home.as_ref().map(|h| h.join("config.toml"))
    }

    /// Find `Quay.toml`, starting at the working directory and searching
    /// upward.
    pub fn find_project(&self) -> Result<PathBuf, ProjectError> {
        let mut current = self.cwd.clone();
        loop {
            let candidate = current.join(PROJECT_FILE);
            if candidate.is_file() {
                return Ok(candidate);
            }
            if !current.pop() {
                return Err(ProjectError::NotFound {
                    dir: self.cwd.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_project_in_cwd() {
        let tmp = TempDir::new().unwrap();
        let manifest = tmp.path().join(PROJECT_FILE);
        std::fs::write(&manifest, "").unwrap();

        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf());
        assert_eq!(ctx.find_project().ok(), Some(manifest));
    }

    #[test]
    fn test_find_project_searches_upward() {
        let tmp = TempDir::new().unwrap();
        let manifest = tmp.path().join(PROJECT_FILE);
        std::fs::write(&manifest, "").unwrap();
        let nested = tmp.path().join("src").join("copyleft");
        std::fs::create_dir_all(&nested).unwrap();

        let ctx = GlobalContext::with_cwd(nested);
        assert_eq!(ctx.find_project().ok(), Some(manifest));
    }

    #[test]
    fn test_find_project_missing() {
        let tmp = TempDir::new().unwrap();
        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf());
        let err = ctx.find_project().unwrap_err();
        assert!(err.to_string().contains(PROJECT_FILE));
    }
}
