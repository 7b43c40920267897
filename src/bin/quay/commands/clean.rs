//! `quay clean` command

use anyhow::Result;

use super::load_project;
use crate::cli::{CleanArgs, GlobalArgs};
use quay::util::fs::remove_dir_all_if_exists;
use quay::util::{Shell, Status};

pub fn execute(args: CleanArgs, global: &GlobalArgs) -> Result<()> {
    let shell = Shell::from_flags(global.quiet, global.verbose, global.color, false);
    let project = load_project(global)?;
    let layout = project.layout();

    let mut dirs = vec![layout.build_dir().to_path_buf()];
    if args.all {
        dirs.push(layout.install_root());
    }

    for dir in dirs {
        if dir.exists() {
            remove_dir_all_if_exists(&dir)?;
            shell.status(Status::Removed, dir.display());
        }
    }

    Ok(())
}
