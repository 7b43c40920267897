//! `quay plan` command
//!
//! Prints the assembled targets as JSON without building anything.

use anyhow::{bail, Result};

use super::{group_flags, load_project};
use crate::cli::{GlobalArgs, PlanArgs};
use quay::ops::quay_build::{plan, BuildOptions};
use quay::util::diagnostic::{emit, Diagnostic};
use quay::util::Shell;

pub fn execute(args: PlanArgs, global: &GlobalArgs) -> Result<()> {
    let shell = Shell::from_flags(global.quiet, global.verbose, global.color, false);
    let project = load_project(global)?;

    let opts = BuildOptions {
        flags: group_flags(&args.groups),
        ..Default::default()
    };
    let plan = plan(&project, &opts)?;
    shell.print(plan.to_json()?);

    if !plan.failed.is_empty() {
        for failed in &plan.failed {
            emit(&Diagnostic::error(&failed.message), shell.use_color());
        }
        bail!("{} group(s) could not be planned", plan.failed.len());
    }

    Ok(())
}
