//! `quay build` command

use anyhow::Result;

use super::{check_report, group_flags, load_project, report_event};
use crate::cli::{BuildArgs, GlobalArgs, MessageFormat};
use quay::builder::events::BuildEvent;
use quay::ops::quay_build::{build, plan, BuildOptions};
use quay::ops::ErrorPolicy;
use quay::util::{Shell, Status};

pub fn execute(args: BuildArgs, global: &GlobalArgs) -> Result<()> {
    let json = args.message_format == MessageFormat::Json;
    let shell = Shell::from_flags(global.quiet, global.verbose, global.color, json);
    let project = load_project(global)?;

    let policy = if args.keep_going {
        Some(ErrorPolicy::BestEffort)
    } else {
        args.policy
    };

    let opts = BuildOptions {
        flags: group_flags(&args.groups),
        policy,
        jobs: args.jobs,
        require_manifest: args.require_manifest,
        no_progress: shell.is_json() || shell.is_quiet() || shell.is_verbose(),
    };

    if args.plan {
        let plan = plan(&project, &opts)?;
        shell.print(plan.to_json()?);
        return Ok(());
    }

    let sink = |event: &BuildEvent| report_event(&shell, event);
    let report = build(&project, &opts, Some(&sink))?;

    for outcome in &report.outcomes {
        if let Some(dir) = outcome.installed.first().and_then(|p| p.parent()) {
            shell.status(
                Status::Installed,
                format!("{} -> {}", outcome.descriptor.target_name, dir.display()),
            );
        }
    }

    check_report(&shell, &report)
}
