//! Configuration file support for Quay.
//!
//! Quay reads two configuration files:
//! - Global: `~/.quay/config.toml` - user-wide defaults for `[build]`,
//!   `[glue]`, `[toolchain]`, `[manifest]` and `[groups]`
//! - Project: `Quay.toml` at the project root
//!
//! Project settings take precedence over global ones, and command-line flags
//! take precedence over both. The `[project]` section is only read from the
//! project file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::discovery::DiscoveryOptions;
use crate::builder::glue::GlueStyle;
use crate::core::catalog::{Catalog, GroupFlags};
use crate::core::group::GroupId;
use crate::ops::orchestrate::ErrorPolicy;

/// Name of the project file.
pub const PROJECT_FILE: &str = "Quay.toml";

/// Quay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project layout
    pub project: ProjectConfig,

    /// Per-group enablement flags, keyed by flag key
    pub groups: BTreeMap<String, bool>,

    /// Build settings
    pub build: BuildConfig,

    /// Generated glue settings
    pub glue: GlueConfig,

    /// Compiler settings for the built-in executor
    pub toolchain: ToolchainSettings,

    /// Interface manifest settings
    pub manifest: ManifestConfig,
}

/// Project layout, relative to the directory holding `Quay.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Root of the binding sources; each group lives in `<source_dir>/<subpath>`
    pub source_dir: PathBuf,

    /// Project include root added to every target
    pub include_dir: PathBuf,

    /// Build output directory
    pub build_dir: PathBuf,

    /// Install prefix; modules land in `<install_prefix>/igl/<subpath>`
    pub install_prefix: PathBuf,

    /// Identifier of the per-group entry file
    pub entry: String,

    /// Glob matched against file names to find binding units
    pub unit_pattern: String,

    /// Groups to catalog (`"core"`, `"copyleft/cgal"`, ...); defaults to the
    /// standard catalog
    pub catalog: Option<Vec<String>>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        ProjectConfig {
            source_dir: PathBuf::from("src"),
            include_dir: PathBuf::from("include"),
            build_dir: PathBuf::from("build"),
            install_prefix: PathBuf::from("dist"),
            entry: "module".to_string(),
            unit_pattern: "*.cpp".to_string(),
            catalog: None,
        }
    }
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// What to do when a group fails (fail-fast, best-effort)
    pub policy: Option<ErrorPolicy>,

    /// Number of groups built in parallel (None = auto-detect)
    pub jobs: Option<usize>,

    /// File suffix of compiled modules (e.g. `.so`, `.pyd`)
    pub module_suffix: Option<String>,
}

/// Generated glue configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlueConfig {
    /// Prefix of registration functions (`bind_`)
    pub function_prefix: Option<String>,

    /// Type of the module-handle parameter (`nb::module_ &`)
    pub handle_type: Option<String>,
}

/// Compiler settings for the built-in executor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    /// Path to the C++ compiler (defaults to `$CXX`, then `c++`)
    pub cxx: Option<PathBuf>,

    /// Additional compiler flags
    pub cxxflags: Vec<String>,

    /// Additional linker flags
    pub ldflags: Vec<String>,

    /// Extra include directories (binding toolkit, upstream headers)
    pub include_dirs: Vec<PathBuf>,

    /// Directories holding the upstream libraries
    pub lib_dirs: Vec<PathBuf>,
}

/// Interface manifest configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// Treat manifest generation failures as fatal
    pub required: Option<bool>,

    /// Program that generates the manifest (defaults to `python3`)
    pub program: Option<PathBuf>,

    /// Arguments placed before `-m <module> -o <output>`
    pub args: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file is missing or
    /// unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    ///
    /// `[project]` is not merged; see [`load_config`].
    pub fn merge(&mut self, other: Config) {
        for (key, enabled) in other.groups {
            self.groups.insert(key, enabled);
        }

        if other.build.policy.is_some() {
            self.build.policy = other.build.policy;
        }
        if other.build.jobs.is_some() {
            self.build.jobs = other.build.jobs;
        }
        if other.build.module_suffix.is_some() {
            self.build.module_suffix = other.build.module_suffix;
        }

        if other.glue.function_prefix.is_some() {
            self.glue.function_prefix = other.glue.function_prefix;
        }
        if other.glue.handle_type.is_some() {
            self.glue.handle_type = other.glue.handle_type;
        }

        if other.toolchain.cxx.is_some() {
            self.toolchain.cxx = other.toolchain.cxx;
        }
        if !other.toolchain.cxxflags.is_empty() {
            self.toolchain.cxxflags = other.toolchain.cxxflags;
        }
        if !other.toolchain.ldflags.is_empty() {
            self.toolchain.ldflags = other.toolchain.ldflags;
        }
        if !other.toolchain.include_dirs.is_empty() {
            self.toolchain.include_dirs = other.toolchain.include_dirs;
        }
        if !other.toolchain.lib_dirs.is_empty() {
            self.toolchain.lib_dirs = other.toolchain.lib_dirs;
        }

        if other.manifest.required.is_some() {
            self.manifest.required = other.manifest.required;
        }
        if other.manifest.program.is_some() {
            self.manifest.program = other.manifest.program;
        }
        if other.manifest.args.is_some() {
            self.manifest.args = other.manifest.args;
        }
    }

    /// Enablement flags from `[groups]`.
    pub fn flags(&self) -> GroupFlags {
        self.groups
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    /// The group catalog declared by the project, or the standard one.
    pub fn catalog(&self) -> Result<Catalog> {
        let Some(ref entries) = self.project.catalog else {
            return Ok(Catalog::standard());
        };

        let groups = entries
            .iter()
            .map(|entry| {
                entry
                    .parse::<GroupId>()
                    .with_context(|| format!("invalid entry in `project.catalog`: `{}`", entry))
            })
            .collect::<Result<Vec<_>>>()?;

        Catalog::new(groups).context("invalid `project.catalog`")
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.build.policy.unwrap_or_default()
    }

    pub fn module_suffix(&self) -> String {
        self.build
            .module_suffix
            .clone()
            .unwrap_or_else(|| default_module_suffix().to_string())
    }

    pub fn manifest_required(&self) -> bool {
        self.manifest.required.unwrap_or(false)
    }

    pub fn glue_style(&self) -> GlueStyle {
        let mut style = GlueStyle::default();
        if let Some(ref prefix) = self.glue.function_prefix {
            style.function_prefix = prefix.clone();
        }
        if let Some(ref handle) = self.glue.handle_type {
            style.handle_type = handle.clone();
        }
        style
    }

    pub fn discovery(&self) -> Result<DiscoveryOptions> {
        DiscoveryOptions::new(&self.project.entry, &self.project.unit_pattern)
    }
}

/// Platform default for compiled module file names.
pub fn default_module_suffix() -> &'static str {
    if cfg!(windows) {
        ".pyd"
    } else {
        ".so"
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (`Quay.toml`)
/// 2. Global config (`~/.quay/config.toml`)
/// 3. Defaults
///
/// A broken global config is warned about and ignored; a broken project file
/// is an error.
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        config.merge(Config::load_or_default(global_path));
    }

    let project = Config::load(project_path)?;
    config.project = project.project.clone();
    config.merge(project);

    Ok(config)
}

/// Get the global quay config directory (`~/.quay`).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".quay"))
}
