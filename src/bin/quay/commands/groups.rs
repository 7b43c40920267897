//! `quay groups` command
//!
//! Lists the catalogued module groups with their flag and enablement.

use anyhow::Result;

use super::{group_flags, load_project};
use crate::cli::{GlobalArgs, GroupsArgs};
use quay::core::GroupDescriptor;
use quay::ops::quay_build::{effective_flags, BuildOptions};

pub fn execute(args: GroupsArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let opts = BuildOptions {
        flags: group_flags(&args.groups),
        ..Default::default()
    };
    let flags = effective_flags(&project, &opts)?;
    let groups = project.catalog().resolve(&flags);

    if args.json {
        let list: Vec<serde_json::Value> = groups.iter().map(to_json).collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    let width = groups
        .iter()
        .map(|g| g.id.to_string().len())
        .max()
        .unwrap_or(0);
    for group in &groups {
        println!("{}", format_row(group, width));
    }

    Ok(())
}

fn to_json(group: &GroupDescriptor) -> serde_json::Value {
    serde_json::json!({
        "group": group.id.to_string(),
        "flag": group.id.flag_key(),
        "enabled": group.enabled,
        "subpath": group.subpath,
        "target": group.target_name,
        "link_deps": group.link_deps,
    })
}

fn format_row(group: &GroupDescriptor, width: usize) -> String {
    let state = if group.enabled { "enabled" } else { "disabled" };
    let links: Vec<String> = group.link_deps.iter().map(|d| d.to_string()).collect();
    format!(
        "{:<width$}  {:<8}  {:<24}  flag `{}`, links {}",
        group.id.to_string(),
        state,
        group.target_name,
        group.id.flag_key(),
        links.join(" "),
        width = width
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use quay::core::GroupId;

    #[test]
    fn test_format_row() {
        let group = GroupDescriptor::resolve("copyleft/cgal".parse::<GroupId>().unwrap(), false);
        let row = format_row(&group, 13);
        assert!(row.starts_with("copyleft/cgal  disabled"));
        assert!(row.contains("pyigl_copyleft_cgal"));
        assert!(row.contains("flag `copyleft_cgal`"));
        assert!(row.ends_with("links igl::core igl_copyleft::cgal"));
    }
}
