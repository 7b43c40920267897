//! Machine-readable build plan.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::builder::assemble::{BuildTarget, UmbrellaSummary};
use crate::core::LinkDependency;
use crate::ops::orchestrate::OrchestrationReport;
use crate::util::fs::relative_path;

/// Assembled targets and the umbrella, as printed by `quay plan`.
#[derive(Debug, Clone, Serialize)]
pub struct BuildPlan {
    pub targets: Vec<PlannedTarget>,
    pub umbrella: UmbrellaSummary,
    /// Groups left out by their flag
    pub skipped: Vec<SkippedGroup>,
    /// Groups that could not be planned
    pub failed: Vec<FailedGroup>,
}

/// A target, with paths relative to the project root.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedTarget {
    pub group: String,
    pub name: String,
    pub subpath: String,
    pub sources: Vec<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub link_deps: Vec<LinkDependency>,
    pub output_dir: PathBuf,
    pub install_dir: PathBuf,
    pub artifact: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedGroup {
    pub group: String,
    pub flag: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedGroup {
    pub group: String,
    pub kind: String,
    pub message: String,
}

impl PlannedTarget {
    fn new(target: &BuildTarget, subpath: &str, root: &Path) -> Self {
        let rel = |p: &Path| relative_path(root, p);
        PlannedTarget {
            group: target.group.to_string(),
            name: target.name.clone(),
            subpath: subpath.to_string(),
            sources: target.sources.iter().map(|p| rel(p)).collect(),
            include_dirs: target.include_dirs.iter().map(|p| rel(p)).collect(),
            link_deps: target.link_deps.clone(),
            output_dir: rel(&target.output_dir),
            install_dir: rel(&target.install_dir),
            artifact: rel(&target.artifact_path()),
        }
    }
}

impl BuildPlan {
    /// Build a plan from an orchestration stopped after target assembly.
    pub fn from_report(report: &OrchestrationReport, root: &Path) -> Self {
        let mut plan = BuildPlan {
            targets: Vec::new(),
            umbrella: report.umbrella.clone(),
            skipped: Vec::new(),
            failed: Vec::new(),
        };

        for outcome in &report.outcomes {
            if outcome.is_disabled() {
                plan.skipped.push(SkippedGroup {
                    group: outcome.id().to_string(),
                    flag: outcome.id().flag_key(),
                });
            } else if let Some(ref err) = outcome.error {
                plan.failed.push(FailedGroup {
                    group: outcome.id().to_string(),
                    kind: err.kind().to_string(),
                    message: err.to_string(),
                });
            } else if let Some(target) = outcome.target.and_then(|h| report.target(h)) {
                plan.targets
                    .push(PlannedTarget::new(target, &outcome.descriptor.subpath, root));
            }
        }

        plan
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GroupFlags;
    use crate::ops::orchestrate::{OrchestrateOptions, Orchestrator, Stage};
    use crate::test_support::{manifests, ProjectFixture, TestProject};

    #[test]
    fn test_plan_from_report() {
        let fixture = ProjectFixture::two_groups()
            .with_manifest(manifests::catalog(&["core", "copyleft/core", "embree"]));
        let test = TestProject::new(&fixture).unwrap();
        let project = &test.project;

        let opts = OrchestrateOptions {
            stop_after: Stage::TargetAssembled,
            module_suffix: ".so".to_string(),
            ..Default::default()
        };
        let flags = GroupFlags::new().with("embree", false);
        let report = Orchestrator::new(project.layout(), project.catalog(), flags, opts)
            .run()
            .unwrap();

        let plan = BuildPlan::from_report(&report, test.root());
        assert_eq!(plan.targets.len(), 2);
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].flag, "embree");

        let copyleft = &plan.targets[1];
        assert_eq!(copyleft.subpath, "copyleft");
        assert_eq!(copyleft.sources[0], Path::new("src/copyleft/module.cpp"));
        assert_eq!(copyleft.artifact, Path::new("build/copyleft/pyigl_copyleft_core.so"));
        assert_eq!(copyleft.install_dir, Path::new("dist/igl/copyleft"));

        let json = plan.to_json().unwrap();
        assert!(json.contains("\"igl_copyleft::core\""));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["umbrella"]["requires"], "pyigl_core");
        assert_eq!(
            value["umbrella"]["dependencies"],
            serde_json::json!(["pyigl_copyleft_core"])
        );
    }
}
