//! Test utilities and fakes for Quay unit tests.
//!
//! Provides a scratch project on disk plus fake implementations of the build
//! executor and the interface manifest generator, so orchestration can be
//! exercised without a C++ compiler or a Python interpreter.

pub mod fixtures;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Result};
use tempfile::TempDir;

use crate::builder::assemble::BuildTarget;
use crate::builder::executor::Executor;
use crate::builder::manifest::ManifestGenerator;
use crate::core::Project;

// Re-export fixtures for convenience
pub use fixtures::*;

/// A fixture written into a temporary directory and loaded as a project.
pub struct TestProject {
    dir: TempDir,
    pub project: Project,
}

impl TestProject {
    pub fn new(fixture: &ProjectFixture) -> Result<Self> {
        let dir = TempDir::new()?;
        let manifest = fixture.write_to(dir.path())?;
        let project = Project::load(&manifest, None)?;
        Ok(TestProject { dir, project })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Path relative to the project root.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }
}

/// Executor that writes a placeholder module instead of compiling.
#[derive(Debug, Default)]
pub struct FakeExecutor {
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        FakeExecutor::default()
    }

    /// Make builds of `target` fail.
    pub fn failing(mut self, target: &str) -> Self {
        self.failing.insert(target.to_string());
        self
    }

    /// Target names handed to the executor, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Executor for FakeExecutor {
    fn build(&self, target: &BuildTarget) -> Result<PathBuf> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(target.name.clone());
        }
        if self.failing.contains(&target.name) {
            bail!("compiler exited with status 1 while building {}", target.name);
        }

        std::fs::create_dir_all(&target.output_dir)?;
        let artifact = target.artifact_path();
        std::fs::write(&artifact, format!("module {}", target.name))?;
        Ok(artifact)
    }

    fn fingerprint_key(&self) -> String {
        "fake".to_string()
    }
}

/// Manifest generator that writes a one-line stub, or always fails.
#[derive(Debug, Default)]
pub struct FakeStubgen {
    fail: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeStubgen {
    pub fn new() -> Self {
        FakeStubgen::default()
    }

    pub fn broken() -> Self {
        FakeStubgen {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl ManifestGenerator for FakeStubgen {
    fn generate(&self, module: &str, module_dir: &Path, output: &Path) -> Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(module.to_string());
        }
        if self.fail {
            bail!("ModuleNotFoundError: No module named '{}'", module);
        }
        if !module_dir.is_dir() {
            bail!("{} is not a directory", module_dir.display());
        }
        std::fs::write(output, format!("# stubs for {}\n", module))?;
        Ok(())
    }
}
