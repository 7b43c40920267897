//! `quay glue` command

use anyhow::Result;

use super::{check_report, group_flags, load_project, report_event};
use crate::cli::{GlobalArgs, GlueArgs, MessageFormat};
use quay::builder::events::BuildEvent;
use quay::ops::quay_build::{generate_glue, BuildOptions};
use quay::util::Shell;

pub fn execute(args: GlueArgs, global: &GlobalArgs) -> Result<()> {
    let json = args.message_format == MessageFormat::Json;
    let shell = Shell::from_flags(global.quiet, global.verbose, global.color, json);
    let project = load_project(global)?;

    let opts = BuildOptions {
        flags: group_flags(&args.groups),
        ..Default::default()
    };

    let sink = |event: &BuildEvent| report_event(&shell, event);
    let report = generate_glue(&project, &opts, Some(&sink))?;
    check_report(&shell, &report)
}
