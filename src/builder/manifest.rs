//! Entry points and interface manifests.
//!
//! Every built module gets an `__init__.py` re-exporting the compiled
//! module, and a `.pyi` interface manifest produced by an external stub
//! generator that imports the freshly built module.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::builder::assemble::BuildTarget;
use crate::util::config::ManifestConfig;
use crate::util::fs::write_if_changed;
use crate::util::process::ProcessBuilder;

/// File name of the package entry point.
pub const ENTRY_POINT_FILE: &str = "__init__.py";

/// Contents of the entry point for `target_name`.
pub fn entry_point_contents(target_name: &str) -> String {
    format!("from .{} import *\n", target_name)
}

/// Write the entry point into the target's output directory.
pub fn write_entry_point(target: &BuildTarget) -> io::Result<PathBuf> {
    let path = target.output_dir.join(ENTRY_POINT_FILE);
    write_if_changed(&path, entry_point_contents(&target.name).as_bytes())?;
    Ok(path)
}

/// Where the interface manifest of `target` is written.
pub fn manifest_path(target: &BuildTarget) -> PathBuf {
    target.output_dir.join(format!("{}.pyi", target.name))
}

/// Generates an interface manifest for a built module.
pub trait ManifestGenerator: Send + Sync {
    /// Produce `output` for `module`, importable from `module_dir`.
    fn generate(&self, module: &str, module_dir: &Path, output: &Path) -> Result<()>;
}

/// Runs a stub generator as a subprocess:
/// `python3 -m nanobind.stubgen -m <module> -o <output>`.
#[derive(Debug, Clone)]
pub struct StubgenCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl StubgenCommand {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        StubgenCommand {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &ManifestConfig) -> Self {
        let program = config
            .program
            .clone()
            .unwrap_or_else(|| PathBuf::from("python3"));
        let args = config
            .args
            .clone()
            .unwrap_or_else(|| vec!["-m".to_string(), "nanobind.stubgen".to_string()]);
        StubgenCommand::new(program, args)
    }

    pub fn command(&self, module: &str, module_dir: &Path, output: &Path) -> ProcessBuilder {
        ProcessBuilder::new(&self.program)
            .args(&self.args)
            .arg("-m")
            .arg(module)
            .arg("-o")
            .arg(output)
            .env("PYTHONPATH", module_dir.to_string_lossy())
            .cwd(module_dir)
    }
}

impl Default for StubgenCommand {
    fn default() -> Self {
        StubgenCommand::from_config(&ManifestConfig::default())
    }
}

impl ManifestGenerator for StubgenCommand {
    fn generate(&self, module: &str, module_dir: &Path, output: &Path) -> Result<()> {
        self.command(module, module_dir, output).exec_and_check()?;
        if !output.is_file() {
            bail!("stub generator did not produce {}", output.display());
        }
        Ok(())
    }
}

/// Ask `generator` for the manifest of a built target.
///
/// The request is only made once the compiled module exists in the output
/// directory.
pub fn request_manifest(
    generator: &dyn ManifestGenerator,
    target: &BuildTarget,
) -> Result<PathBuf> {
    let artifact = target.artifact_path();
    if !artifact.is_file() {
        bail!(
            "compiled module {} does not exist",
            artifact.display()
        );
    }

    let output = manifest_path(target);
    generator.generate(&target.name, &target.output_dir, &output)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GroupId, LinkDependency};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Recording {
        calls: Mutex<Vec<String>>,
    }

    impl ManifestGenerator for Recording {
        fn generate(&self, module: &str, _module_dir: &Path, output: &Path) -> Result<()> {
            self.calls.lock().unwrap().push(module.to_string());
            std::fs::write(output, "def f() -> None: ...\n")?;
            Ok(())
        }
    }

    fn target(dir: &Path) -> BuildTarget {
        BuildTarget {
            name: "pyigl_core".to_string(),
            group: GroupId::core(),
            sources: vec![],
            include_dirs: vec![],
            link_deps: vec![LinkDependency::new("igl", "core")],
            output_dir: dir.to_path_buf(),
            install_dir: dir.join("dist"),
            artifact_name: "pyigl_core.so".to_string(),
        }
    }

    #[test]
    fn test_entry_point() {
        let tmp = TempDir::new().unwrap();
        let path = write_entry_point(&target(tmp.path())).unwrap();
        assert_eq!(path, tmp.path().join(ENTRY_POINT_FILE));
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "from .pyigl_core import *\n"
        );
    }

    #[test]
    fn test_manifest_requires_artifact() {
        let tmp = TempDir::new().unwrap();
        let target = target(tmp.path());
        let gen = Recording {
            calls: Mutex::new(vec![]),
        };

        assert!(request_manifest(&gen, &target).is_err());
        assert!(gen.calls.lock().unwrap().is_empty());

        std::fs::write(target.artifact_path(), "").unwrap();
        let out = request_manifest(&gen, &target).unwrap();
        assert_eq!(out, tmp.path().join("pyigl_core.pyi"));
        assert_eq!(*gen.calls.lock().unwrap(), vec!["pyigl_core"]);
    }

    #[test]
    fn test_stubgen_command() {
        let cmd = StubgenCommand::default().command(
            "pyigl_core",
            Path::new("/p/build"),
            Path::new("/p/build/pyigl_core.pyi"),
        );
        assert_eq!(cmd.get_program(), Path::new("python3"));
        assert_eq!(
            cmd.get_args(),
            &["-m", "nanobind.stubgen", "-m", "pyigl_core", "-o", "/p/build/pyigl_core.pyi"]
        );
    }
}
