//! Command implementations

pub mod build;
pub mod clean;
pub mod completions;
pub mod glue;
pub mod groups;
pub mod plan;

use anyhow::{bail, Result};

use crate::cli::{GlobalArgs, GroupArgs};
use quay::builder::events::BuildEvent;
use quay::core::{GroupFlags, Project};
use quay::ops::OrchestrationReport;
use quay::util::diagnostic::{emit, suggestions, Diagnostic};
use quay::util::shell::format_duration;
use quay::util::{GlobalContext, Shell, Status};

/// Locate and load the project for the current directory.
pub fn load_project(global: &GlobalArgs) -> Result<Project> {
    let mut ctx = GlobalContext::new()?;
    ctx.set_verbose(global.verbose);

    let manifest = match ctx.find_project() {
        Ok(path) => path,
        Err(e) => {
            let diag = Diagnostic::error(e.to_string()).with_suggestion(suggestions::NO_PROJECT);
            emit(&diag, false);
            bail!("could not find a Quay project");
        }
    };

    tracing::debug!("using project file {}", manifest.display());
    Project::load(&manifest, ctx.config_path().as_deref())
}

/// `--enable` / `--disable` as flags. Disabling wins when both name a group.
pub fn group_flags(args: &GroupArgs) -> GroupFlags {
    let mut flags = GroupFlags::new();
    for key in &args.enable {
        flags.set(key.trim(), true);
    }
    for key in &args.disable {
        flags.set(key.trim(), false);
    }
    flags
}

/// Render an orchestration event.
pub fn report_event(shell: &Shell, event: &BuildEvent) {
    if shell.is_json() {
        shell.json_event(event);
        return;
    }

    match event {
        BuildEvent::GroupSkipped { group, flag } => {
            shell.status(Status::Skipped, format!("`{}` (`{}` is off)", group, flag));
        }
        BuildEvent::GlueGenerated {
            group,
            units,
            changed,
            ..
        } => {
            let status = if *changed {
                Status::Generated
            } else {
                Status::Fresh
            };
            shell.status(status, format!("glue for `{}` ({} units)", group, units));
        }
        BuildEvent::ModuleArtifact {
            target,
            filenames,
            fresh,
            ..
        } => {
            let status = if *fresh {
                Status::Fresh
            } else {
                Status::Compiled
            };
            match filenames.first() {
                Some(path) => shell.status(status, format!("{} -> {}", target, path.display())),
                None => shell.status(status, target),
            }
        }
        BuildEvent::ManifestWarning {
            target, message, ..
        } => {
            shell.warn(format!("no interface manifest for `{}`: {}", target, message));
        }
        BuildEvent::GroupFailed { .. } => {}
        BuildEvent::BuildFinished {
            success,
            duration_ms,
            targets_built,
            ..
        } => {
            if *success {
                let elapsed = std::time::Duration::from_millis(*duration_ms);
                shell.status(
                    Status::Finished,
                    format!("{} module(s) in {}", targets_built, format_duration(elapsed)),
                );
            }
        }
    }
}

/// Print diagnostics for every failed group and fail if there were any.
pub fn check_report(shell: &Shell, report: &OrchestrationReport) -> Result<()> {
    if report.is_success() {
        return Ok(());
    }

    let mut failed = Vec::new();
    for outcome in report.failures() {
        let Some(ref err) = outcome.error else {
            continue;
        };
        if err.is_cancelled() {
            if shell.is_verbose() {
                emit(&err.to_diagnostic(), shell.use_color());
            }
            continue;
        }
        failed.push(outcome.id().to_string());
        if !shell.is_json() {
            emit(&err.to_diagnostic(), shell.use_color());
        }
    }

    let cancelled = report
        .failures()
        .filter(|o| o.error.as_ref().is_some_and(|e| e.is_cancelled()))
        .count();
    if cancelled > 0 {
        shell.note(format!("{} group(s) cancelled", cancelled));
    }

    bail!(
        "{} group(s) failed: {}",
        failed.len(),
        failed.join(", ")
    );
}
