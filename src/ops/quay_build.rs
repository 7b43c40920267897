//! Implementation of `quay build`, `quay plan` and `quay glue`.

use anyhow::{bail, Result};

use crate::builder::events::BuildEvent;
use crate::builder::executor::{CompilerExecutor, ProgressExecutor};
use crate::builder::manifest::StubgenCommand;
use crate::core::{Catalog, GroupFlags, Project};
use crate::ops::orchestrate::{
    ErrorPolicy, OrchestrateOptions, OrchestrationError, OrchestrationReport, Orchestrator, Stage,
};
use crate::ops::plan::BuildPlan;

/// Event sink shared by the pipelines.
pub type EventSink<'a> = &'a (dyn Fn(&BuildEvent) + Sync);

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Flags from the command line, layered over `[groups]`
    pub flags: GroupFlags,

    /// Error policy override
    pub policy: Option<ErrorPolicy>,

    /// Number of parallel jobs
    pub jobs: Option<usize>,

    /// Fail a group when its interface manifest cannot be generated
    pub require_manifest: bool,

    /// Suppress the progress bar
    pub no_progress: bool,
}

/// Check command-line flags against the catalog.
///
/// Unknown flag keys and attempts to disable core are rejected so a typo
/// does not silently build everything.
pub fn validate_flags(catalog: &Catalog, flags: &GroupFlags) -> Result<()> {
    if flags.disables_core() {
        bail!("the core group cannot be disabled");
    }

    let unknown = flags.unknown_keys(catalog);
    if let Some(key) = unknown.first() {
        let available = catalog.flag_keys();
        bail!(
            "unknown group `{}`\n\
             available groups: {}\n\
             hint: use `quay groups` to see all groups",
            key,
            if available.is_empty() {
                "(none)".to_string()
            } else {
                available.join(", ")
            }
        );
    }

    Ok(())
}

/// Project flags with the command-line flags layered on top.
pub fn effective_flags(project: &Project, opts: &BuildOptions) -> Result<GroupFlags> {
    validate_flags(project.catalog(), &opts.flags)?;
    let mut flags = project.flags();
    flags.merge(&opts.flags);
    Ok(flags)
}

/// Orchestration options from the project config and the command line
/// (command line first).
pub fn orchestrate_options(
    project: &Project,
    opts: &BuildOptions,
    stop_after: Stage,
) -> Result<OrchestrateOptions> {
    let config = project.config();
    Ok(OrchestrateOptions {
        policy: opts.policy.unwrap_or_else(|| config.policy()),
        jobs: opts.jobs.or(config.build.jobs),
        require_manifest: opts.require_manifest || config.manifest_required(),
        stop_after,
        module_suffix: config.module_suffix(),
        glue_style: config.glue_style(),
        discovery: config.discovery()?,
    })
}

/// Turn an aborted run back into its report; the caller inspects
/// [`OrchestrationReport::is_success`].
fn into_report(
    result: Result<OrchestrationReport, OrchestrationError>,
) -> Result<OrchestrationReport> {
    match result {
        Ok(report) => Ok(report),
        Err(OrchestrationError::Aborted { report, .. }) => Ok(*report),
        Err(e) => Err(e.into()),
    }
}

/// Build and install every enabled group.
pub fn build(
    project: &Project,
    opts: &BuildOptions,
    events: Option<EventSink<'_>>,
) -> Result<OrchestrationReport> {
    let flags = effective_flags(project, opts)?;
    let orchestrate_opts = orchestrate_options(project, opts, Stage::Installed)?;

    let enabled = project
        .catalog()
        .resolve(&flags)
        .iter()
        .filter(|d| d.enabled)
        .count();

    let compiler = CompilerExecutor::from_settings(&project.config().toolchain)?;
    let executor = ProgressExecutor::new(compiler, enabled as u64, opts.no_progress);
    let stubgen = StubgenCommand::from_config(&project.config().manifest);

    tracing::debug!(
        "building {} group(s) with policy {}",
        enabled,
        orchestrate_opts.policy
    );

    let mut orchestrator = Orchestrator::new(
        project.layout(),
        project.catalog(),
        flags,
        orchestrate_opts,
    )
    .with_executor(&executor)
    .with_manifests(&stubgen);
    if let Some(events) = events {
        orchestrator = orchestrator.with_events(events);
    }

    let result = orchestrator.run();
    executor.finish();
    into_report(result)
}

/// Discover, generate glue and assemble targets without building.
pub fn plan(project: &Project, opts: &BuildOptions) -> Result<BuildPlan> {
    let report = run_until(project, opts, Stage::TargetAssembled, None)?;
    Ok(BuildPlan::from_report(&report, project.layout().root()))
}

/// Discover units and (re)generate glue for every enabled group.
pub fn generate_glue(
    project: &Project,
    opts: &BuildOptions,
    events: Option<EventSink<'_>>,
) -> Result<OrchestrationReport> {
    run_until(project, opts, Stage::GlueGenerated, events)
}

fn run_until(
    project: &Project,
    opts: &BuildOptions,
    stop_after: Stage,
    events: Option<EventSink<'_>>,
) -> Result<OrchestrationReport> {
    let flags = effective_flags(project, opts)?;
    let orchestrate_opts = orchestrate_options(project, opts, stop_after)?;

    let mut orchestrator = Orchestrator::new(
        project.layout(),
        project.catalog(),
        flags,
        orchestrate_opts,
    );
    if let Some(events) = events {
        orchestrator = orchestrator.with_events(events);
    }
    into_report(orchestrator.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{manifests, ProjectFixture, TestProject};

    #[test]
    fn test_validate_flags() {
        let catalog = Catalog::standard();
        assert!(validate_flags(&catalog, &GroupFlags::new().with("copyleft_cgal", false)).is_ok());

        let err = validate_flags(&catalog, &GroupFlags::new().with("gpl", true)).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("unknown group `gpl`"));
        assert!(msg.contains("restricted_triangle"));

        let err = validate_flags(&catalog, &GroupFlags::new().with("core", false)).unwrap_err();
        assert!(err.to_string().contains("cannot be disabled"));
    }

    #[test]
    fn test_cli_flags_override_project() {
        let fixture = ProjectFixture::two_groups().with_manifest(manifests::with_flags(
            &["core", "copyleft/core"],
            &[("copyleft", false)],
        ));
        let test = TestProject::new(&fixture).unwrap();

        let opts = BuildOptions {
            flags: GroupFlags::new().with("copyleft", true),
            ..Default::default()
        };
        let plan = plan(&test.project, &opts).unwrap();
        assert_eq!(plan.targets.len(), 2);
        assert!(plan.skipped.is_empty());

        let plan = super::plan(&test.project, &BuildOptions::default()).unwrap();
        assert_eq!(plan.targets.len(), 1);
    }

    #[test]
    fn test_options_layering() {
        let fixture = ProjectFixture::two_groups().with_manifest(
            "[project]\ncatalog = [\"core\"]\n[build]\npolicy = \"best-effort\"\njobs = 3\n",
        );
        let test = TestProject::new(&fixture).unwrap();

        let from_config =
            orchestrate_options(&test.project, &BuildOptions::default(), Stage::Installed).unwrap();
        assert_eq!(from_config.policy, ErrorPolicy::BestEffort);
        assert_eq!(from_config.jobs, Some(3));

        let cli = BuildOptions {
            policy: Some(ErrorPolicy::FailFast),
            jobs: Some(1),
            require_manifest: true,
            ..Default::default()
        };
        let overridden = orchestrate_options(&test.project, &cli, Stage::Installed).unwrap();
        assert_eq!(overridden.policy, ErrorPolicy::FailFast);
        assert_eq!(overridden.jobs, Some(1));
        assert!(overridden.require_manifest);
    }

    #[test]
    fn test_generate_glue_reports_failures() {
        let fixture = ProjectFixture::two_groups().with_group("copyleft", &["a.cpp", "a.v2.cpp"]);
        let test = TestProject::new(&fixture).unwrap();

        let report = generate_glue(&test.project, &BuildOptions::default(), None).unwrap();
        assert!(!report.is_success());
        assert!(test.path("build/generated/BINDING_INVOCATIONS.in").is_file());
        assert!(!test.path("build/generated/copyleft/BINDING_INVOCATIONS.in").exists());
    }
}
