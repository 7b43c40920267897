//! Test fixtures for common test scenarios.
//!
//! This module provides pre-built bindings projects and source generators
//! for the orchestration tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::util::config::PROJECT_FILE;
use crate::util::fs::join_subpath;

/// Fixture for a bindings project tree.
#[derive(Debug, Clone, Default)]
pub struct ProjectFixture {
    /// Quay.toml content.
    pub manifest: String,
    /// Files (path relative to project root -> content).
    pub files: BTreeMap<PathBuf, String>,
}

impl ProjectFixture {
    /// Create an empty project fixture.
    pub fn new() -> Self {
        ProjectFixture::default()
    }

    /// The two-group project: core plus copyleft core.
    pub fn two_groups() -> Self {
        ProjectFixture::new()
            .with_manifest(manifests::catalog(&["core", "copyleft/core"]))
            .with_group("", &["cotmatrix.cpp", "massmatrix.cpp"])
            .with_group("copyleft", &["marching_cubes.cpp"])
    }

    pub fn with_manifest(mut self, manifest: impl Into<String>) -> Self {
        self.manifest = manifest.into();
        self
    }

    /// Add a group directory `src/<subpath>` with an entry file and the
    /// given unit files.
    pub fn with_group(mut self, subpath: &str, units: &[&str]) -> Self {
        let dir = join_subpath(Path::new("src"), subpath);
        self.files
            .insert(dir.join("module.cpp"), sources::entry_point(subpath));
        for unit in units {
            let id = unit.split('.').next().unwrap_or(unit);
            self.files.insert(dir.join(unit), sources::binding_unit(id));
        }
        self
    }

    /// Write the fixture under `base_path`, returning the project file path.
    pub fn write_to(&self, base_path: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(base_path)?;
        let manifest_path = base_path.join(PROJECT_FILE);
        std::fs::write(&manifest_path, &self.manifest)?;

        for (path, content) in &self.files {
            let full = base_path.join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(full, content)?;
        }

        Ok(manifest_path)
    }
}

/// Quay.toml generators.
pub mod manifests {
    /// A project restricted to the given catalog.
    pub fn catalog(groups: &[&str]) -> String {
        let list: Vec<String> = groups.iter().map(|g| format!("\"{}\"", g)).collect();
        format!("[project]\ncatalog = [{}]\n", list.join(", "))
    }

    /// A catalog plus `[groups]` flags.
    pub fn with_flags(groups: &[&str], flags: &[(&str, bool)]) -> String {
        let mut manifest = catalog(groups);
        manifest.push_str("\n[groups]\n");
        for (key, enabled) in flags {
            manifest.push_str(&format!("{} = {}\n", key, enabled));
        }
        manifest
    }
}

/// Binding source generators.
pub mod sources {
    /// An entry file including the generated glue.
    pub fn entry_point(subpath: &str) -> String {
        format!(
            r#"// entry point for `{subpath}`
#include <nanobind/nanobind.h>
namespace nb = nanobind;

#include "BINDING_DECLARATIONS.in"

NB_MODULE(module, m) {{
#include "BINDING_INVOCATIONS.in"
}}
"#
        )
    }

    /// A binding unit defining one registration function.
    pub fn binding_unit(id: &str) -> String {
        format!(
            r#"#include <nanobind/nanobind.h>
namespace nb = nanobind;

void bind_{id}(nb::module_ &m) {{
  m.def("{id}", [] {{ return 0; }});
}}
"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_two_groups_fixture() {
        let tmp = TempDir::new().unwrap();
        let manifest = ProjectFixture::two_groups().write_to(tmp.path()).unwrap();

        assert!(manifest.is_file());
        assert!(tmp.path().join("src/module.cpp").is_file());
        assert!(tmp.path().join("src/cotmatrix.cpp").is_file());
        assert!(tmp.path().join("src/copyleft/module.cpp").is_file());

        let unit = std::fs::read_to_string(tmp.path().join("src/cotmatrix.cpp")).unwrap();
        assert!(unit.contains("void bind_cotmatrix(nb::module_ &m)"));
    }

    #[test]
    fn test_manifest_generators() {
        let toml = manifests::with_flags(&["core", "copyleft/core"], &[("copyleft", false)]);
        assert!(toml.contains("catalog = [\"core\", \"copyleft/core\"]"));
        assert!(toml.contains("copyleft = false"));
    }
}
