//! Binding unit discovery.
//!
//! Discovery is a pure pass over one directory: it lists the files matching
//! the unit pattern, sorted by file name, and splits off the entry file.
//! Whether an empty result is acceptable is decided by the caller.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::Pattern;
use walkdir::WalkDir;

use crate::builder::errors::GroupError;
use crate::core::unit::identifier_for;
use crate::core::{BindingUnit, GroupId};

/// How binding units are recognized inside a group directory.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Identifier of the entry file (`module` for `module.cpp`)
    pub entry: String,
    /// Pattern matched against file names
    pub pattern: Pattern,
}

impl DiscoveryOptions {
    pub fn new(entry: &str, pattern: &str) -> Result<Self> {
        let pattern = Pattern::new(pattern)
            .with_context(|| format!("invalid binding unit pattern `{}`", pattern))?;
        Ok(DiscoveryOptions {
            entry: entry.to_string(),
            pattern,
        })
    }
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        DiscoveryOptions {
            entry: "module".to_string(),
            pattern: Pattern::new("*.cpp").unwrap(),
        }
    }
}

/// Result of scanning one group directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovered {
    /// Directory that was scanned
    pub dir: PathBuf,
    /// Whether the directory exists at all
    pub dir_exists: bool,
    /// The entry file, if present
    pub entry: Option<PathBuf>,
    /// Binding units in file-name order, entry file excluded
    pub units: Vec<BindingUnit>,
}

impl Discovered {
    /// Require a buildable group: directory, entry file and at least one
    /// unit must all be present.
    pub fn require(self, group: &GroupId, entry_name: &str) -> Result<(PathBuf, Vec<BindingUnit>), GroupError> {
        if !self.dir_exists {
            return Err(GroupError::configuration(
                group,
                &self.dir,
                "source directory does not exist",
            ));
        }

        let Some(entry) = self.entry else {
            return Err(GroupError::configuration(
                group,
                &self.dir,
                format!("no entry file `{}` found", entry_name),
            ));
        };

        if self.units.is_empty() {
            return Err(GroupError::configuration(
                group,
                &self.dir,
                "no binding units found",
            ));
        }

        Ok((entry, self.units))
    }
}

/// Scan `dir` (non-recursively) for binding units.
///
/// A missing directory yields an empty result rather than an error.
pub fn discover_units(dir: &Path, opts: &DiscoveryOptions) -> io::Result<Discovered> {
    let mut discovered = Discovered {
        dir: dir.to_path_buf(),
        ..Default::default()
    };

    if !dir.is_dir() {
        return Ok(discovered);
    }
    discovered.dir_exists = true;

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Some(file_name) = entry.file_name().to_str() else {
            tracing::debug!("skipping non UTF-8 file name in {}", dir.display());
            continue;
        };
        if !opts.pattern.matches(file_name) {
            continue;
        }

        if identifier_for(file_name).as_deref() == Some(opts.entry.as_str()) {
            discovered.entry = Some(entry.path().to_path_buf());
            continue;
        }

        if let Some(unit) = BindingUnit::from_path(entry.path()) {
            discovered.units.push(unit);
        }
    }

    tracing::debug!(
        "discovered {} binding unit(s) in {}",
        discovered.units.len(),
        dir.display()
    );

    Ok(discovered)
}
