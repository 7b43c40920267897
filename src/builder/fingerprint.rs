//! Target fingerprinting for incremental builds.
//!
//! A fingerprint captures every input of one module build. When the stored
//! fingerprint matches and the artifact is still on disk the executor is
//! skipped for that target.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::assemble::BuildTarget;
use crate::util::hash::sha256_file;

/// Inputs of one target build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFingerprint {
    /// Content hash per source file
    pub sources: BTreeMap<PathBuf, String>,

    /// Include directories, in order
    pub include_dirs: Vec<PathBuf>,

    /// Link dependencies as `ns::name`
    pub link_deps: Vec<String>,

    /// Hash of the generated glue
    pub glue: String,

    /// Executor identity (compiler and flags)
    pub toolchain: String,
}

impl TargetFingerprint {
    /// Fingerprint a target's current inputs.
    pub fn for_target(target: &BuildTarget, glue_digest: &str, toolchain: &str) -> Result<Self> {
        let mut sources = BTreeMap::new();
        for source in &target.sources {
            sources.insert(source.clone(), sha256_file(source)?);
        }

        Ok(TargetFingerprint {
            sources,
            include_dirs: target.include_dirs.clone(),
            link_deps: target.link_deps.iter().map(|d| d.to_string()).collect(),
            glue: glue_digest.to_string(),
            toolchain: toolchain.to_string(),
        })
    }

    /// Load a stored fingerprint. Missing or unreadable files yield `None`.
    pub fn load(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(fp) => Some(fp),
            Err(e) => {
                tracing::debug!("ignoring corrupt fingerprint {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write fingerprint {}", path.display()))?;
        Ok(())
    }

    /// Whether a target with this fingerprint can be skipped, given what was
    /// stored after its last build.
    pub fn is_fresh(&self, stored: Option<&TargetFingerprint>, artifact: &Path) -> bool {
        stored == Some(self) && artifact.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GroupId, LinkDependency};
    use tempfile::TempDir;

    fn target(dir: &Path) -> BuildTarget {
        let entry = dir.join("module.cpp");
        let unit = dir.join("a.cpp");
        std::fs::write(&entry, "// entry").unwrap();
        std::fs::write(&unit, "// a").unwrap();

        BuildTarget {
            name: "pyigl_core".to_string(),
            group: GroupId::core(),
            sources: vec![entry, unit],
            include_dirs: vec![dir.join("generated")],
            link_deps: vec![LinkDependency::new("igl", "core")],
            output_dir: dir.join("out"),
            install_dir: dir.join("dist"),
            artifact_name: "pyigl_core.so".to_string(),
        }
    }

    #[test]
    fn test_fingerprint_roundtrip_and_freshness() {
        let tmp = TempDir::new().unwrap();
        let target = target(tmp.path());
        let fp = TargetFingerprint::for_target(&target, "glue", "cxx").unwrap();

        let path = tmp.path().join(".fingerprints").join("pyigl_core.json");
        fp.save(&path).unwrap();
        let stored = TargetFingerprint::load(&path);
        assert_eq!(stored.as_ref(), Some(&fp));

        // Matching fingerprint but no artifact: not fresh.
        assert!(!fp.is_fresh(stored.as_ref(), &target.artifact_path()));

        std::fs::create_dir_all(&target.output_dir).unwrap();
        std::fs::write(target.artifact_path(), "").unwrap();
        assert!(fp.is_fresh(stored.as_ref(), &target.artifact_path()));
    }

    #[test]
    fn test_source_change_invalidates() {
        let tmp = TempDir::new().unwrap();
        let target = target(tmp.path());
        let before = TargetFingerprint::for_target(&target, "glue", "cxx").unwrap();

        std::fs::write(&target.sources[1], "// a, edited").unwrap();
        let after = TargetFingerprint::for_target(&target, "glue", "cxx").unwrap();
        assert_ne!(before, after);

        let other_glue = TargetFingerprint::for_target(&target, "glue2", "cxx").unwrap();
        assert_ne!(after, other_glue);
    }

    #[test]
    fn test_corrupt_fingerprint_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fp.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(TargetFingerprint::load(&path).is_none());
        assert!(TargetFingerprint::load(&tmp.path().join("absent.json")).is_none());
    }
}
