//! The seam to the external build executor.
//!
//! The orchestrator never compiles anything itself: it hands each assembled
//! [`BuildTarget`] to an [`Executor`] and waits for the compiled module.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::builder::assemble::BuildTarget;
use crate::util::config::ToolchainSettings;
use crate::util::fs::ensure_dir;
use crate::util::hash::Fingerprint;
use crate::util::process::{find_cxx_compiler, find_executable, ProcessBuilder};

/// Builds one target into a compiled module.
///
/// Implementations block until the artifact exists (or the build failed) and
/// must be callable from several pipelines at once.
pub trait Executor: Send + Sync {
    /// Build `target`, returning the path of the compiled module.
    fn build(&self, target: &BuildTarget) -> Result<PathBuf>;

    /// Identity of the toolchain, folded into target fingerprints so a
    /// compiler or flag change invalidates them.
    fn fingerprint_key(&self) -> String {
        String::new()
    }
}

/// Drives a C++ compiler directly: one `-shared` invocation per target.
#[derive(Debug, Clone)]
pub struct CompilerExecutor {
    cxx: PathBuf,
    cxxflags: Vec<String>,
    ldflags: Vec<String>,
    include_dirs: Vec<PathBuf>,
    lib_dirs: Vec<PathBuf>,
}

impl CompilerExecutor {
    /// Resolve the compiler from `[toolchain] cxx`, falling back to `$CXX`
    /// and the usual driver names on `PATH`.
    pub fn from_settings(settings: &ToolchainSettings) -> Result<Self> {
        let cxx = match settings.cxx {
            Some(ref cxx) => find_executable(&cxx.to_string_lossy())
                .with_context(|| format!("C++ compiler `{}` not found", cxx.display()))?,
            None => find_cxx_compiler().context(
                "no C++ compiler found; set `[toolchain] cxx` in Quay.toml or the CXX environment variable",
            )?,
        };

        tracing::debug!("using C++ compiler {}", cxx.display());

        Ok(CompilerExecutor {
            cxx,
            cxxflags: settings.cxxflags.clone(),
            ldflags: settings.ldflags.clone(),
            include_dirs: settings.include_dirs.clone(),
            lib_dirs: settings.lib_dirs.clone(),
        })
    }

    /// The compiler invocation for `target`.
    pub fn command(&self, target: &BuildTarget) -> ProcessBuilder {
        let mut cmd = ProcessBuilder::new(&self.cxx).args(["-shared", "-fPIC"]);
        cmd = cmd.args(&self.cxxflags);

        for dir in target.include_dirs.iter().chain(&self.include_dirs) {
            cmd = cmd.arg(format!("-I{}", dir.display()));
        }

        cmd = cmd.args(&target.sources);
        cmd = cmd.arg("-o").arg(target.artifact_path());

        for dir in &self.lib_dirs {
            cmd = cmd.arg(format!("-L{}", dir.display()));
        }
        for dep in &target.link_deps {
            cmd = cmd.arg(format!("-l{}", dep.library_name()));
        }

        cmd.args(&self.ldflags)
    }
}

impl Executor for CompilerExecutor {
    fn build(&self, target: &BuildTarget) -> Result<PathBuf> {
        ensure_dir(&target.output_dir).with_context(|| {
            format!(
                "failed to create output directory {}",
                target.output_dir.display()
            )
        })?;

        self.command(target).exec_and_check()?;

        let artifact = target.artifact_path();
        if !artifact.is_file() {
            bail!(
                "compiler finished but `{}` was not produced",
                artifact.display()
            );
        }
        Ok(artifact)
    }

    fn fingerprint_key(&self) -> String {
        let mut fp = Fingerprint::new();
        fp.update_str(&self.cxx.to_string_lossy());
        fp.update_strs(self.cxxflags.iter().map(String::as_str));
        fp.update_strs(self.ldflags.iter().map(String::as_str));
        for dir in self.include_dirs.iter().chain(&self.lib_dirs) {
            fp.update_str(&dir.to_string_lossy());
        }
        fp.finish_short()
    }
}

/// Wraps an executor with a progress bar over the targets handed to it.
pub struct ProgressExecutor<E> {
    inner: E,
    bar: ProgressBar,
}

impl<E: Executor> ProgressExecutor<E> {
    /// Show a bar of `total` targets, or nothing when `hidden`.
    pub fn new(inner: E, total: u64, hidden: bool) -> Self {
        let bar = if hidden || total <= 1 {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            {
                bar.set_style(style.progress_chars("#>-"));
            }
            bar
        };
        ProgressExecutor { inner, bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl<E: Executor> Executor for ProgressExecutor<E> {
    fn build(&self, target: &BuildTarget) -> Result<PathBuf> {
        self.bar.set_message(target.name.clone());
        let result = self.inner.build(target);
        self.bar.inc(1);
        result
    }

    fn fingerprint_key(&self) -> String {
        self.inner.fingerprint_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GroupDescriptor, GroupId, Layout, Prefix};
    use crate::builder::assemble::TargetAssembler;
    use crate::core::BindingUnit;
    use crate::util::config::ProjectConfig;
    use std::path::Path;

    fn executor() -> CompilerExecutor {
        CompilerExecutor {
            cxx: PathBuf::from("c++"),
            cxxflags: vec!["-std=c++17".to_string()],
            ldflags: vec!["-Wl,--as-needed".to_string()],
            include_dirs: vec![PathBuf::from("/opt/nanobind/include")],
            lib_dirs: vec![PathBuf::from("/opt/libigl/lib")],
        }
    }

    fn target() -> BuildTarget {
        let layout = Layout::new("/p", &ProjectConfig::default());
        let desc = GroupDescriptor::resolve(GroupId::new(Prefix::Copyleft, "cgal"), true);
        let units = vec![BindingUnit {
            identifier: "mesh_boolean".to_string(),
            path: PathBuf::from("/p/src/copyleft/cgal/mesh_boolean.cpp"),
        }];
        TargetAssembler::new(&layout, ".so").assemble(
            &desc,
            Path::new("/p/src/copyleft/cgal/module.cpp"),
            &units,
        )
    }

    #[test]
    fn test_compiler_command() {
        let cmd = executor().command(&target());
        let args = cmd.get_args();

        assert_eq!(&args[..3], &["-shared", "-fPIC", "-std=c++17"]);
        assert!(args.contains(&"-I/p/build/generated/copyleft/cgal".to_string()));
        assert!(args.contains(&"-I/opt/nanobind/include".to_string()));
        assert!(args.contains(&"/p/src/copyleft/cgal/module.cpp".to_string()));
        assert!(args.contains(&"/p/build/copyleft/cgal/pyigl_copyleft_cgal.so".to_string()));
        assert!(args.contains(&"-L/opt/libigl/lib".to_string()));
        assert!(args.contains(&"-ligl_core".to_string()));
        assert!(args.contains(&"-ligl_copyleft_cgal".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("-Wl,--as-needed"));

        let glue = args.iter().position(|a| a.contains("generated")).unwrap();
        let include = args.iter().position(|a| a == "-I/p/include").unwrap();
        assert!(glue < include);
    }

    #[test]
    fn test_fingerprint_key_tracks_flags() {
        let a = executor();
        let mut b = executor();
        b.cxxflags.push("-O2".to_string());
        assert_ne!(a.fingerprint_key(), b.fingerprint_key());
        assert_eq!(a.fingerprint_key(), executor().fingerprint_key());
    }
}
