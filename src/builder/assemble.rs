//! Target assembly and the umbrella aggregate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::builder::errors::GroupError;
use crate::core::{BindingUnit, GroupDescriptor, GroupId, Layout, LinkDependency};

/// Name of the aggregate target depending on every non-core module.
pub const UMBRELLA_NAME: &str = "pyigl_all";

/// Index of a target in the orchestrator's per-group slots.
///
/// Handles follow catalog order, so sorting them gives a deterministic
/// order regardless of which pipeline finished first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TargetHandle(pub usize);

/// One compiled extension module, ready for the build executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildTarget {
    pub name: String,
    pub group: GroupId,
    /// Entry file followed by the binding units
    pub sources: Vec<PathBuf>,
    /// Generated-glue directory followed by the project include root
    pub include_dirs: Vec<PathBuf>,
    pub link_deps: Vec<LinkDependency>,
    pub output_dir: PathBuf,
    pub install_dir: PathBuf,
    /// File name of the compiled module (`<name><suffix>`)
    pub artifact_name: String,
}

impl BuildTarget {
    /// Where the executor is expected to place the compiled module.
    pub fn artifact_path(&self) -> PathBuf {
        self.output_dir.join(&self.artifact_name)
    }

    pub fn is_core(&self) -> bool {
        self.group.is_core()
    }
}

/// Reject units whose identifiers collide.
///
/// Units arrive in file-name order, so the reported pair is deterministic.
pub fn ensure_unique_identifiers(
    group: &GroupId,
    units: &[BindingUnit],
) -> Result<(), GroupError> {
    let mut seen: HashMap<&str, &Path> = HashMap::new();
    for unit in units {
        if let Some(first) = seen.insert(&unit.identifier, &unit.path) {
            return Err(GroupError::DuplicateBinding {
                group: group.clone(),
                identifier: unit.identifier.clone(),
                first: first.to_path_buf(),
                second: unit.path.clone(),
            });
        }
    }
    Ok(())
}

/// Builds [`BuildTarget`]s from resolved groups.
#[derive(Debug, Clone)]
pub struct TargetAssembler<'a> {
    layout: &'a Layout,
    module_suffix: String,
}

impl<'a> TargetAssembler<'a> {
    pub fn new(layout: &'a Layout, module_suffix: impl Into<String>) -> Self {
        TargetAssembler {
            layout,
            module_suffix: module_suffix.into(),
        }
    }

    pub fn assemble(
        &self,
        desc: &GroupDescriptor,
        entry: &Path,
        units: &[BindingUnit],
    ) -> BuildTarget {
        let mut sources = Vec::with_capacity(units.len() + 1);
        sources.push(entry.to_path_buf());
        sources.extend(units.iter().map(|u| u.path.clone()));

        BuildTarget {
            name: desc.target_name.clone(),
            group: desc.id.clone(),
            sources,
            include_dirs: vec![
                self.layout.glue_dir(&desc.subpath),
                self.layout.include_dir().to_path_buf(),
            ],
            link_deps: desc.link_deps.clone(),
            output_dir: self.layout.output_dir(&desc.subpath),
            install_dir: self.layout.install_dir(&desc.subpath),
            artifact_name: format!("{}{}", desc.target_name, self.module_suffix),
        }
    }
}

/// The aggregate target: requires core and depends on every other module.
///
/// Pipelines register concurrently; the list is append-only.
#[derive(Debug)]
pub struct Umbrella {
    name: String,
    root: Mutex<Option<TargetHandle>>,
    dependencies: Mutex<Vec<TargetHandle>>,
}

impl Umbrella {
    pub fn new(name: impl Into<String>) -> Self {
        Umbrella {
            name: name.into(),
            root: Mutex::new(None),
            dependencies: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record an assembled target: core becomes the required root,
    /// everything else a dependency.
    pub fn register(&self, handle: TargetHandle, is_core: bool) {
        if is_core {
            *self.root.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        } else {
            self.dependencies
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(handle);
        }
    }

    pub fn root(&self) -> Option<TargetHandle> {
        *self.root.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Dependencies in catalog order.
    pub fn dependencies(&self) -> Vec<TargetHandle> {
        let mut deps = self
            .dependencies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        deps.sort();
        deps
    }
}

impl Default for Umbrella {
    fn default() -> Self {
        Umbrella::new(UMBRELLA_NAME)
    }
}

/// Resolved view of the umbrella, by target name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UmbrellaSummary {
    pub name: String,
    pub requires: Option<String>,
    pub dependencies: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Prefix;
    use crate::util::config::ProjectConfig;

    fn unit(id: &str, file: &str) -> BindingUnit {
        BindingUnit {
            identifier: id.to_string(),
            path: PathBuf::from(file),
        }
    }

    #[test]
    fn test_assemble_copyleft_core() {
        let layout = Layout::new("/p", &ProjectConfig::default());
        let desc = GroupDescriptor::resolve(GroupId::new(Prefix::Copyleft, "core"), true);
        let assembler = TargetAssembler::new(&layout, ".so");

        let target = assembler.assemble(
            &desc,
            Path::new("/p/src/copyleft/module.cpp"),
            &[unit("a", "/p/src/copyleft/a.cpp")],
        );

        assert_eq!(target.name, "pyigl_copyleft_core");
        assert_eq!(
            target.sources,
            vec![
                PathBuf::from("/p/src/copyleft/module.cpp"),
                PathBuf::from("/p/src/copyleft/a.cpp")
            ]
        );
        assert_eq!(target.include_dirs[0], Path::new("/p/build/generated/copyleft"));
        assert_eq!(target.include_dirs[1], Path::new("/p/include"));
        assert_eq!(target.output_dir, Path::new("/p/build/copyleft"));
        assert_eq!(target.install_dir, Path::new("/p/dist/igl/copyleft"));
        assert_eq!(
            target.artifact_path(),
            Path::new("/p/build/copyleft/pyigl_copyleft_core.so")
        );
        let deps: Vec<String> = target.link_deps.iter().map(|d| d.to_string()).collect();
        assert_eq!(deps, vec!["igl::core", "igl_copyleft::core"]);
    }

    #[test]
    fn test_duplicate_identifiers() {
        let units = vec![
            unit("bar", "bar.cpp"),
            unit("foo", "foo.cpp"),
            unit("foo", "foo.extra.cpp"),
        ];
        let err = ensure_unique_identifiers(&GroupId::core(), &units).unwrap_err();
        match err {
            GroupError::DuplicateBinding {
                identifier,
                first,
                second,
                ..
            } => {
                assert_eq!(identifier, "foo");
                assert_eq!(first, PathBuf::from("foo.cpp"));
                assert_eq!(second, PathBuf::from("foo.extra.cpp"));
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(ensure_unique_identifiers(&GroupId::core(), &units[..2]).is_ok());
    }

    #[test]
    fn test_umbrella_orders_dependencies() {
        let umbrella = Umbrella::default();
        umbrella.register(TargetHandle(3), false);
        umbrella.register(TargetHandle(0), true);
        umbrella.register(TargetHandle(1), false);

        assert_eq!(umbrella.name(), UMBRELLA_NAME);
        assert_eq!(umbrella.root(), Some(TargetHandle(0)));
        assert_eq!(umbrella.dependencies(), vec![TargetHandle(1), TargetHandle(3)]);
    }

    #[test]
    fn test_umbrella_survives_panicking_pipeline() {
        let umbrella = Umbrella::default();
        umbrella.register(TargetHandle(0), true);

        std::thread::scope(|scope| {
            let pipeline = scope.spawn(|| {
                let _root = umbrella.root.lock().unwrap();
                let _deps = umbrella.dependencies.lock().unwrap();
                panic!("pipeline panicked while registering");
            });
            assert!(pipeline.join().is_err());
        });
        assert!(umbrella.dependencies.is_poisoned());

        umbrella.register(TargetHandle(2), false);
        umbrella.register(TargetHandle(1), false);
        assert_eq!(umbrella.root(), Some(TargetHandle(0)));
        assert_eq!(umbrella.dependencies(), vec![TargetHandle(1), TargetHandle(2)]);
    }
}
