//! A loaded bindings project and its on-disk layout.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::catalog::{Catalog, GroupFlags};
use crate::util::config::{load_config, Config, ProjectConfig};
use crate::util::fs::join_subpath;

/// Top-level package directory of installed modules.
pub const INSTALL_PACKAGE: &str = "igl";

/// Directory under the build dir receiving generated glue.
pub const GLUE_DIR: &str = "generated";

/// Directory under the build dir holding target fingerprints.
pub const FINGERPRINT_DIR: &str = ".fingerprints";

/// Absolute paths of everything the orchestrator reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
    source_dir: PathBuf,
    include_dir: PathBuf,
    build_dir: PathBuf,
    install_prefix: PathBuf,
}

impl Layout {
    /// Resolve a project layout against the project root.
    pub fn new(root: impl Into<PathBuf>, project: &ProjectConfig) -> Self {
        let root = root.into();
        Layout {
            source_dir: root.join(&project.source_dir),
            include_dir: root.join(&project.include_dir),
            build_dir: root.join(&project.build_dir),
            install_prefix: root.join(&project.install_prefix),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn include_dir(&self) -> &Path {
        &self.include_dir
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn install_prefix(&self) -> &Path {
        &self.install_prefix
    }

    /// Directory scanned for a group's binding units.
    pub fn group_source_dir(&self, subpath: &str) -> PathBuf {
        join_subpath(&self.source_dir, subpath)
    }

    /// Directory receiving a group's generated glue.
    pub fn glue_dir(&self, subpath: &str) -> PathBuf {
        join_subpath(&self.build_dir.join(GLUE_DIR), subpath)
    }

    /// Directory receiving a group's compiled module, entry point and
    /// manifest.
    pub fn output_dir(&self, subpath: &str) -> PathBuf {
        join_subpath(&self.build_dir, subpath)
    }

    /// Root of the installed package (`<install_prefix>/igl`).
    pub fn install_root(&self) -> PathBuf {
        self.install_prefix.join(INSTALL_PACKAGE)
    }

    /// Install destination of a group.
    pub fn install_dir(&self, subpath: &str) -> PathBuf {
        join_subpath(&self.install_root(), subpath)
    }

    /// Fingerprint file of a target.
    pub fn fingerprint_path(&self, target_name: &str) -> PathBuf {
        self.build_dir
            .join(FINGERPRINT_DIR)
            .join(format!("{}.json", target_name))
    }
}

/// A bindings project: its configuration, layout and group catalog.
#[derive(Debug, Clone)]
pub struct Project {
    manifest_path: PathBuf,
    config: Config,
    layout: Layout,
    catalog: Catalog,
}

impl Project {
    /// Load a project from its `Quay.toml`, layering the global config
    /// underneath.
    pub fn load(manifest_path: &Path, global_config: Option<&Path>) -> Result<Self> {
        let config = load_config(global_config, manifest_path)?;
        let root = manifest_path
            .parent()
            .with_context(|| format!("invalid project file path: {}", manifest_path.display()))?;
        Self::from_config(manifest_path.to_path_buf(), root, config)
    }

    /// Build a project from an already-loaded config.
    pub fn from_config(manifest_path: PathBuf, root: &Path, config: Config) -> Result<Self> {
        let catalog = config.catalog()?;
        let layout = Layout::new(root, &config.project);

        let flags = config.flags();
        for key in flags.unknown_keys(&catalog) {
            tracing::warn!(
                "`[groups] {}` does not name a catalogued group (known: {})",
                key,
                catalog.flag_keys().join(", ")
            );
        }
        if flags.disables_core() {
            tracing::warn!("the core group cannot be disabled; ignoring `[groups] core = false`");
        }

        Ok(Project {
            manifest_path,
            config,
            layout,
            catalog,
        })
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Enablement flags from the project configuration.
    pub fn flags(&self) -> GroupFlags {
        self.config.flags()
    }
}
