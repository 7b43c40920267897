//! The orchestrator: drives every catalogued group through its pipeline.
//!
//! Groups are resolved against their flags, then each enabled group runs
//! `discover -> glue -> assemble -> build -> install`. The core group runs
//! to completion first; every other group links against it, so the rest run
//! in parallel only once core is built. A core failure cancels all of them.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::builder::assemble::{
    ensure_unique_identifiers, BuildTarget, TargetAssembler, TargetHandle, Umbrella,
    UmbrellaSummary,
};
use crate::builder::discovery::{discover_units, DiscoveryOptions};
use crate::builder::errors::GroupError;
use crate::builder::events::BuildEvent;
use crate::builder::executor::Executor;
use crate::builder::fingerprint::TargetFingerprint;
use crate::builder::glue::{GeneratedGlue, GlueStyle, DECLARATIONS_FILE, INVOCATIONS_FILE};
use crate::builder::install::install_atomic;
use crate::builder::manifest::{
    request_manifest, write_entry_point, ManifestGenerator, ENTRY_POINT_FILE,
};
use crate::core::{Catalog, GroupDescriptor, GroupFlags, GroupId, Layout};
use crate::util::config::default_module_suffix;

/// What to do when a group fails.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Abort on the first failing group
    #[default]
    FailFast,
    /// Record failures and finish every other group
    BestEffort,
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorPolicy::FailFast => write!(f, "fail-fast"),
            ErrorPolicy::BestEffort => write!(f, "best-effort"),
        }
    }
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail-fast" => Ok(ErrorPolicy::FailFast),
            "best-effort" => Ok(ErrorPolicy::BestEffort),
            _ => Err(format!(
                "invalid error policy '{}'; expected 'fail-fast' or 'best-effort'",
                s
            )),
        }
    }
}

/// Lifecycle of one orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrchestratorState {
    Uninitialized,
    GroupsCataloged,
    Running,
    /// All pipelines finished and the umbrella is resolved
    Aggregated,
    /// Every enabled group reached its final stage
    Done,
}

/// Progress of one group through its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Pending,
    Discovered,
    GlueGenerated,
    TargetAssembled,
    Built,
    Installed,
    Failed,
    Cancelled,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Pending => "pending",
            Stage::Discovered => "discovered",
            Stage::GlueGenerated => "glue-generated",
            Stage::TargetAssembled => "target-assembled",
            Stage::Built => "built",
            Stage::Installed => "installed",
            Stage::Failed => "failed",
            Stage::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// A stage transition and when it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageRecord {
    pub stage: Stage,
    pub at: Instant,
}

/// Everything that happened to one group.
#[derive(Debug)]
pub struct GroupOutcome {
    pub descriptor: GroupDescriptor,
    pub transitions: Vec<StageRecord>,
    pub target: Option<TargetHandle>,
    /// Number of binding units discovered
    pub units: usize,
    /// Glue line counts (declarations, invocations)
    pub glue_lines: (usize, usize),
    pub artifact: Option<PathBuf>,
    /// The executor was skipped because the fingerprint matched
    pub fresh: bool,
    pub installed: Vec<PathBuf>,
    pub warnings: Vec<String>,
    pub error: Option<GroupError>,
}

impl GroupOutcome {
    fn new(descriptor: GroupDescriptor) -> Self {
        let mut outcome = GroupOutcome {
            descriptor,
            transitions: Vec::new(),
            target: None,
            units: 0,
            glue_lines: (0, 0),
            artifact: None,
            fresh: false,
            installed: Vec::new(),
            warnings: Vec::new(),
            error: None,
        };
        if outcome.descriptor.enabled {
            outcome.record(Stage::Pending);
        }
        outcome
    }

    fn record(&mut self, stage: Stage) {
        self.transitions.push(StageRecord {
            stage,
            at: Instant::now(),
        });
    }

    pub fn id(&self) -> &GroupId {
        &self.descriptor.id
    }

    /// The latest stage reached. Disabled groups stay `Pending`.
    pub fn stage(&self) -> Stage {
        self.transitions
            .last()
            .map(|r| r.stage)
            .unwrap_or(Stage::Pending)
    }

    /// When `stage` was reached, if it was.
    pub fn reached(&self, stage: Stage) -> Option<Instant> {
        self.transitions
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| r.at)
    }

    pub fn is_disabled(&self) -> bool {
        !self.descriptor.enabled
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of an orchestration.
#[derive(Debug)]
pub struct OrchestrationReport {
    pub state: OrchestratorState,
    pub policy: ErrorPolicy,
    /// One outcome per catalogued group, in catalog order
    pub outcomes: Vec<GroupOutcome>,
    /// Assembled targets, indexed by [`TargetHandle`]
    targets: Vec<Option<BuildTarget>>,
    pub umbrella: UmbrellaSummary,
    pub duration: Duration,
}

impl OrchestrationReport {
    pub fn target(&self, handle: TargetHandle) -> Option<&BuildTarget> {
        self.targets.get(handle.0).and_then(Option::as_ref)
    }

    /// Assembled targets in catalog order.
    pub fn targets(&self) -> impl Iterator<Item = &BuildTarget> {
        self.targets.iter().flatten()
    }

    pub fn outcome(&self, id: &GroupId) -> Option<&GroupOutcome> {
        self.outcomes.iter().find(|o| o.id() == id)
    }

    /// Outcomes carrying an error, cancellations included.
    pub fn failures(&self) -> impl Iterator<Item = &GroupOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_some())
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(GroupOutcome::is_success)
    }

    /// Number of groups whose module was built or found fresh.
    pub fn built_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.artifact.is_some()).count()
    }
}

/// Orchestration failure.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("build aborted: {} failed", join_groups(.failed))]
    Aborted {
        failed: Vec<GroupId>,
        report: Box<OrchestrationReport>,
    },

    #[error("failed to start worker pool: {0}")]
    ThreadPool(String),

    #[error("no build executor configured")]
    NoExecutor,
}

impl OrchestrationError {
    /// The report of an aborted run.
    pub fn report(&self) -> Option<&OrchestrationReport> {
        match self {
            OrchestrationError::Aborted { report, .. } => Some(report),
            _ => None,
        }
    }
}

fn join_groups(groups: &[GroupId]) -> String {
    groups
        .iter()
        .map(|g| format!("`{}`", g))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Options controlling one orchestration.
#[derive(Debug, Clone)]
pub struct OrchestrateOptions {
    pub policy: ErrorPolicy,
    /// Worker threads for non-core groups (None = one per CPU)
    pub jobs: Option<usize>,
    /// Treat interface manifest failures as group failures
    pub require_manifest: bool,
    /// Last stage each group is driven to
    pub stop_after: Stage,
    pub module_suffix: String,
    pub glue_style: GlueStyle,
    pub discovery: DiscoveryOptions,
}

impl Default for OrchestrateOptions {
    fn default() -> Self {
        OrchestrateOptions {
            policy: ErrorPolicy::default(),
            jobs: None,
            require_manifest: false,
            stop_after: Stage::Installed,
            module_suffix: default_module_suffix().to_string(),
            glue_style: GlueStyle::default(),
            discovery: DiscoveryOptions::default(),
        }
    }
}

/// Per-run shared state, touched concurrently by the pipelines.
struct RunState {
    cancel: AtomicBool,
    umbrella: Umbrella,
    slots: Vec<OnceLock<BuildTarget>>,
}

/// Drives a catalog of groups through discovery, glue generation, target
/// assembly, build and install.
pub struct Orchestrator<'a> {
    layout: &'a Layout,
    catalog: &'a Catalog,
    flags: GroupFlags,
    opts: OrchestrateOptions,
    executor: Option<&'a dyn Executor>,
    manifests: Option<&'a dyn ManifestGenerator>,
    events: Option<&'a (dyn Fn(&BuildEvent) + Sync)>,
    state: OrchestratorState,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        layout: &'a Layout,
        catalog: &'a Catalog,
        flags: GroupFlags,
        opts: OrchestrateOptions,
    ) -> Self {
        Orchestrator {
            layout,
            catalog,
            flags,
            opts,
            executor: None,
            manifests: None,
            events: None,
            state: OrchestratorState::Uninitialized,
        }
    }

    pub fn with_executor(mut self, executor: &'a dyn Executor) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_manifests(mut self, manifests: &'a dyn ManifestGenerator) -> Self {
        self.manifests = Some(manifests);
        self
    }

    /// Receive a [`BuildEvent`] for every milestone. The callback may be
    /// invoked from several threads.
    pub fn with_events(mut self, events: &'a (dyn Fn(&BuildEvent) + Sync)) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Run the orchestration.
    ///
    /// Under `fail-fast` any failing group turns the result into
    /// [`OrchestrationError::Aborted`]; under `best-effort` failures are
    /// only recorded in the report.
    pub fn run(&mut self) -> Result<OrchestrationReport, OrchestrationError> {
        let start = Instant::now();

        if self.opts.stop_after >= Stage::Built && self.executor.is_none() {
            return Err(OrchestrationError::NoExecutor);
        }

        let descriptors = self.catalog.resolve(&self.flags);
        self.state = OrchestratorState::GroupsCataloged;
        tracing::debug!(
            "cataloged {} group(s), {} enabled",
            descriptors.len(),
            descriptors.iter().filter(|d| d.enabled).count()
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.opts.jobs.unwrap_or(0))
            .build()
            .map_err(|e| OrchestrationError::ThreadPool(e.to_string()))?;

        let run = RunState {
            cancel: AtomicBool::new(false),
            umbrella: Umbrella::default(),
            slots: descriptors.iter().map(|_| OnceLock::new()).collect(),
        };

        self.state = OrchestratorState::Running;
        let outcomes = self.run_groups(&pool, &run, descriptors);

        let targets: Vec<Option<BuildTarget>> =
            run.slots.into_iter().map(OnceLock::into_inner).collect();
        let umbrella = summarize_umbrella(&run.umbrella, &targets);
        self.state = OrchestratorState::Aggregated;

        let done = outcomes.iter().all(|o| {
            o.is_disabled() || (o.is_success() && o.stage() == self.opts.stop_after)
        });
        if done {
            self.state = OrchestratorState::Done;
        }

        let report = OrchestrationReport {
            state: self.state,
            policy: self.opts.policy,
            outcomes,
            targets,
            umbrella,
            duration: start.elapsed(),
        };

        if self.opts.stop_after >= Stage::Built {
            self.emit(&BuildEvent::BuildFinished {
                success: report.is_success(),
                duration_ms: report.duration.as_millis() as u64,
                targets_built: report.built_count() as u64,
                umbrella: Some(report.umbrella.name.clone()),
            });
        }

        let failed: Vec<GroupId> = report
            .failures()
            .filter(|o| !matches!(o.error, Some(GroupError::Cancelled { .. })))
            .map(|o| o.id().clone())
            .collect();

        if self.opts.policy == ErrorPolicy::FailFast && !report.is_success() {
            return Err(OrchestrationError::Aborted {
                failed,
                report: Box::new(report),
            });
        }

        Ok(report)
    }

    fn run_groups(
        &self,
        pool: &rayon::ThreadPool,
        run: &RunState,
        descriptors: Vec<GroupDescriptor>,
    ) -> Vec<GroupOutcome> {
        let mut descriptors = descriptors.into_iter().enumerate();

        // The catalog keeps core first.
        let Some((core_index, core)) = descriptors.next() else {
            return Vec::new();
        };
        let core_outcome = self.run_group(run, core_index, core);
        let core_ok = core_outcome.is_success();

        let rest: Vec<(usize, GroupDescriptor)> = descriptors.collect();
        let mut outcomes = vec![core_outcome];

        if core_ok {
            let rest_outcomes: Vec<GroupOutcome> = pool.install(|| {
                rest.into_par_iter()
                    .map(|(index, desc)| self.run_group(run, index, desc))
                    .collect()
            });
            outcomes.extend(rest_outcomes);
        } else {
            for (_, desc) in rest {
                outcomes.push(self.cancel_group(desc, "the core group failed"));
            }
        }

        // Pruning touches directories that enabled nested groups share, so
        // it runs only once every pipeline has joined.
        if self.opts.stop_after == Stage::Installed {
            for outcome in outcomes.iter().filter(|o| o.is_disabled()) {
                self.prune_group(&outcome.descriptor);
            }
        }

        outcomes
    }

    fn cancel_group(&self, desc: GroupDescriptor, reason: &str) -> GroupOutcome {
        let mut outcome = GroupOutcome::new(desc);
        if outcome.descriptor.enabled {
            let err = GroupError::cancelled(outcome.id(), reason);
            tracing::debug!("{}", err);
            self.emit(&BuildEvent::failed(&err));
            outcome.record(Stage::Cancelled);
            outcome.error = Some(err);
        }
        outcome
    }

    fn run_group(&self, run: &RunState, index: usize, desc: GroupDescriptor) -> GroupOutcome {
        let mut outcome = GroupOutcome::new(desc);

        if outcome.is_disabled() {
            self.skip_group(&outcome.descriptor);
            return outcome;
        }

        if let Err(err) = self.drive(run, index, &mut outcome) {
            if err.is_cancelled() {
                outcome.record(Stage::Cancelled);
                tracing::debug!("{}", err);
            } else {
                outcome.record(Stage::Failed);
                if self.opts.policy == ErrorPolicy::FailFast {
                    run.cancel.store(true, Ordering::SeqCst);
                }
                tracing::error!("{}", err);
            }
            self.emit(&BuildEvent::failed(&err));
            outcome.error = Some(err);
        }

        outcome
    }

    /// Stage boundary: stop when another group aborted the run.
    fn checkpoint(&self, run: &RunState, group: &GroupId) -> Result<(), GroupError> {
        if run.cancel.load(Ordering::SeqCst) {
            return Err(GroupError::cancelled(group, "another group failed"));
        }
        Ok(())
    }

    fn drive(
        &self,
        run: &RunState,
        index: usize,
        outcome: &mut GroupOutcome,
    ) -> Result<(), GroupError> {
        let desc = outcome.descriptor.clone();
        let id = &desc.id;
        let stop = self.opts.stop_after;

        // Discover
        self.checkpoint(run, id)?;
        let source_dir = self.layout.group_source_dir(&desc.subpath);
        let discovered = discover_units(&source_dir, &self.opts.discovery)
            .map_err(|e| GroupError::io(id, &source_dir, e))?;
        let (entry, units) = discovered.require(id, &self.opts.discovery.entry)?;
        ensure_unique_identifiers(id, &units)?;
        outcome.units = units.len();
        outcome.record(Stage::Discovered);
        if stop <= Stage::Discovered {
            return Ok(());
        }

        // Generate glue
        self.checkpoint(run, id)?;
        let glue = GeneratedGlue::generate(&units, &self.opts.glue_style);
        let glue_dir = self.layout.glue_dir(&desc.subpath);
        let files = glue
            .write_to(&glue_dir)
            .map_err(|e| GroupError::io(id, &glue_dir, e))?;
        outcome.glue_lines = (glue.declaration_count(), glue.invocation_count());
        self.emit(&BuildEvent::GlueGenerated {
            group: id.to_string(),
            units: units.len(),
            directory: glue_dir.clone(),
            changed: files.changed,
        });
        outcome.record(Stage::GlueGenerated);
        if stop <= Stage::GlueGenerated {
            return Ok(());
        }

        // Assemble
        self.checkpoint(run, id)?;
        let assembled = TargetAssembler::new(self.layout, self.opts.module_suffix.as_str())
            .assemble(&desc, &entry, &units);
        let handle = TargetHandle(index);
        let target = run.slots[index].get_or_init(|| assembled);
        run.umbrella.register(handle, desc.is_core());
        outcome.target = Some(handle);
        outcome.record(Stage::TargetAssembled);
        tracing::debug!(
            "assembled `{}` from {} source(s)",
            target.name,
            target.sources.len()
        );
        if stop <= Stage::TargetAssembled {
            return Ok(());
        }

        // Build
        self.checkpoint(run, id)?;
        let (artifact, fresh) = self.build_target(target, &glue)?;
        outcome.fresh = fresh;
        outcome.artifact = Some(artifact.clone());
        self.emit(&BuildEvent::ModuleArtifact {
            group: id.to_string(),
            target: target.name.clone(),
            filenames: vec![artifact.clone()],
            fresh,
        });
        outcome.record(Stage::Built);
        if stop <= Stage::Built {
            return Ok(());
        }

        // Install
        self.checkpoint(run, id)?;
        let entry_point = write_entry_point(target)
            .map_err(|e| GroupError::io(id, target.output_dir.join(ENTRY_POINT_FILE), e))?;
        let mut files = vec![artifact, entry_point];
        if let Some(manifest) = self.generate_manifest(target, outcome)? {
            files.push(manifest);
        }
        outcome.installed = install_atomic(&files, &target.install_dir)
            .map_err(|e| GroupError::io(id, &target.install_dir, e))?;
        outcome.record(Stage::Installed);
        tracing::info!("installed `{}` into {}", target.name, target.install_dir.display());

        Ok(())
    }

    /// Hand the target to the executor unless its fingerprint is current.
    fn build_target(
        &self,
        target: &BuildTarget,
        glue: &GeneratedGlue,
    ) -> Result<(PathBuf, bool), GroupError> {
        let build_error = |message: String| GroupError::Build {
            group: target.group.clone(),
            target: target.name.clone(),
            message,
        };

        let Some(executor) = self.executor else {
            return Err(build_error("no build executor configured".to_string()));
        };

        let fp_path = self.layout.fingerprint_path(&target.name);
        let fingerprint =
            match TargetFingerprint::for_target(target, &glue.digest(), &executor.fingerprint_key())
            {
                Ok(fp) => Some(fp),
                Err(e) => {
                    tracing::debug!("cannot fingerprint `{}`: {:#}", target.name, e);
                    None
                }
            };

        let artifact_path = target.artifact_path();
        if let Some(ref fp) = fingerprint {
            let stored = TargetFingerprint::load(&fp_path);
            if fp.is_fresh(stored.as_ref(), &artifact_path) {
                tracing::info!("`{}` is up to date", target.name);
                return Ok((artifact_path, true));
            }
        }

        tracing::info!("building `{}`", target.name);
        let artifact = executor
            .build(target)
            .map_err(|e| build_error(format!("{:#}", e)))?;

        if let Some(fp) = fingerprint {
            if let Err(e) = fp.save(&fp_path) {
                tracing::warn!("failed to save fingerprint for `{}`: {:#}", target.name, e);
            }
        }

        Ok((artifact, false))
    }

    /// Produce the interface manifest. A failure is a warning unless
    /// manifests are required.
    fn generate_manifest(
        &self,
        target: &BuildTarget,
        outcome: &mut GroupOutcome,
    ) -> Result<Option<PathBuf>, GroupError> {
        let Some(generator) = self.manifests else {
            tracing::debug!("no manifest generator; skipping `{}`", target.name);
            return Ok(None);
        };

        match request_manifest(generator, target) {
            Ok(path) => Ok(Some(path)),
            Err(e) => {
                let message = format!("{:#}", e);
                if self.opts.require_manifest {
                    return Err(GroupError::Manifest {
                        group: target.group.clone(),
                        target: target.name.clone(),
                        message,
                    });
                }

                tracing::warn!(
                    "interface manifest for `{}` was not generated: {}",
                    target.name,
                    message
                );
                self.emit(&BuildEvent::ManifestWarning {
                    group: target.group.to_string(),
                    target: target.name.clone(),
                    message: message.clone(),
                });
                outcome.warnings.push(message);
                Ok(None)
            }
        }
    }

    /// A disabled group contributes nothing.
    fn skip_group(&self, desc: &GroupDescriptor) {
        tracing::info!("skipping `{}` (disabled by `{}`)", desc.id, desc.id.flag_key());
        self.emit(&BuildEvent::GroupSkipped {
            group: desc.id.to_string(),
            flag: desc.id.flag_key(),
        });
    }

    /// Remove files a disabled group left behind in an earlier full build.
    fn prune_group(&self, desc: &GroupDescriptor) {
        let artifact = format!("{}{}", desc.target_name, self.opts.module_suffix);
        let manifest = format!("{}.pyi", desc.target_name);
        let glue_dir = self.layout.glue_dir(&desc.subpath);

        let mut stale = vec![
            glue_dir.join(DECLARATIONS_FILE),
            glue_dir.join(INVOCATIONS_FILE),
            self.layout.fingerprint_path(&desc.target_name),
        ];
        let dirs = [
            self.layout.output_dir(&desc.subpath),
            self.layout.install_dir(&desc.subpath),
        ];
        for dir in &dirs {
            stale.push(dir.join(&artifact));
            stale.push(dir.join(ENTRY_POINT_FILE));
            stale.push(dir.join(&manifest));
        }

        for path in stale.iter().filter(|p| p.is_file()) {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!("removed stale {}", path.display()),
                Err(e) => tracing::warn!("failed to remove {}: {}", path.display(), e),
            }
        }

        // Only empty directories go; nested groups may still live inside.
        for dir in dirs.iter().chain(std::iter::once(&glue_dir)) {
            if dir != self.layout.build_dir() && dir != &self.layout.install_root() {
                let _ = std::fs::remove_dir(dir);
            }
        }
    }

    fn emit(&self, event: &BuildEvent) {
        if let Some(events) = self.events {
            events(event);
        }
    }
}

fn summarize_umbrella(umbrella: &Umbrella, targets: &[Option<BuildTarget>]) -> UmbrellaSummary {
    let name_of = |handle: TargetHandle| {
        targets
            .get(handle.0)
            .and_then(Option::as_ref)
            .map(|t| t.name.clone())
    };

    UmbrellaSummary {
        name: umbrella.name().to_string(),
        requires: umbrella.root().and_then(name_of),
        dependencies: umbrella
            .dependencies()
            .into_iter()
            .filter_map(name_of)
            .collect(),
    }
}
