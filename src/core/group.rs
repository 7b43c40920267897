//! Module groups and the group resolver.
//!
//! A module group is identified by a `(prefix, name)` pair and compiles into
//! one extension module. Everything the rest of the pipeline needs to know
//! about a group (output subpath, target name, link dependencies) is derived
//! here from that pair, so the naming rules live in exactly one place.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Name of the core group. `("", "core")` is the dependency root.
pub const CORE: &str = "core";

/// Prefix shared by every generated target name.
pub const TARGET_PREFIX: &str = "pyigl";

/// Namespace of the upstream geometry library's link targets.
pub const UPSTREAM_NAMESPACE: &str = "igl";

/// License family a group belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Prefix {
    /// Permissively licensed groups (no prefix).
    #[default]
    None,
    /// Groups wrapping copyleft upstream code.
    Copyleft,
    /// Groups wrapping upstream code with restrictive licenses.
    Restricted,
}

impl Prefix {
    /// The prefix as it appears in paths and names (`""` for no prefix).
    pub fn as_str(&self) -> &'static str {
        match self {
            Prefix::None => "",
            Prefix::Copyleft => "copyleft",
            Prefix::Restricted => "restricted",
        }
    }

    /// Whether this is the empty prefix.
    pub fn is_none(&self) -> bool {
        matches!(self, Prefix::None)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Prefix {
    type Err = GroupParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "none" => Ok(Prefix::None),
            "copyleft" => Ok(Prefix::Copyleft),
            "restricted" => Ok(Prefix::Restricted),
            other => Err(GroupParseError::UnknownPrefix(other.to_string())),
        }
    }
}

impl Serialize for Prefix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Error parsing a group name like `copyleft/cgal`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GroupParseError {
    #[error("unknown group prefix `{0}` (expected `copyleft` or `restricted`)")]
    UnknownPrefix(String),

    #[error("invalid group `{0}`: expected `<name>` or `<prefix>/<name>`")]
    Malformed(String),
}

/// Identity of a module group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GroupId {
    prefix: Prefix,
    name: String,
}

impl GroupId {
    /// Create a group identity.
    pub fn new(prefix: Prefix, name: impl Into<String>) -> Self {
        GroupId {
            prefix,
            name: name.into(),
        }
    }

    /// The `("", "core")` group.
    pub fn core() -> Self {
        GroupId::new(Prefix::None, CORE)
    }

    pub fn prefix(&self) -> Prefix {
        self.prefix
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is the `("", "core")` dependency root.
    ///
    /// `("copyleft", "core")` is *not* the root: it links against it.
    pub fn is_core(&self) -> bool {
        self.prefix.is_none() && self.name == CORE
    }

    /// Output subpath of the group.
    ///
    /// - `("", "core")` -> `""`
    /// - `(p, "core")` -> `"p"`
    /// - `("", n)` -> `"n"`
    /// - `(p, n)` -> `"p/n"`
    pub fn subpath(&self) -> String {
        match (self.prefix.is_none(), self.name == CORE) {
            (true, true) => String::new(),
            (false, true) => self.prefix.as_str().to_string(),
            (true, false) => self.name.clone(),
            (false, false) => format!("{}/{}", self.prefix, self.name),
        }
    }

    /// Build target name, e.g. `pyigl_core` or `pyigl_copyleft_cgal`.
    pub fn target_name(&self) -> String {
        if self.prefix.is_none() {
            format!("{}_{}", TARGET_PREFIX, self.name)
        } else {
            format!("{}_{}_{}", TARGET_PREFIX, self.prefix, self.name)
        }
    }

    /// Key of the enablement flag controlling this group.
    ///
    /// The subpath with `/` replaced by `_`: `copyleft`, `copyleft_cgal`,
    /// `restricted_triangle`. The core group's key is `core`.
    pub fn flag_key(&self) -> String {
        if self.is_core() {
            return CORE.to_string();
        }
        self.subpath().replace('/', "_")
    }

    /// The upstream library this group wraps.
    pub fn upstream_library(&self) -> LinkDependency {
        if self.prefix.is_none() {
            LinkDependency::new(UPSTREAM_NAMESPACE, &self.name)
        } else {
            LinkDependency::new(
                format!("{}_{}", UPSTREAM_NAMESPACE, self.prefix),
                &self.name,
            )
        }
    }

    /// Link dependencies: the upstream core library, plus the group's own
    /// upstream library for every group other than the root.
    pub fn link_dependencies(&self) -> Vec<LinkDependency> {
        let core = LinkDependency::new(UPSTREAM_NAMESPACE, CORE);
        if self.is_core() {
            vec![core]
        } else {
            vec![core, self.upstream_library()]
        }
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix.is_none() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.prefix, self.name)
        }
    }
}

impl FromStr for GroupId {
    type Err = GroupParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let valid_name =
            |n: &str| !n.is_empty() && n.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

        match s.split_once('/') {
            None if valid_name(s) => Ok(GroupId::new(Prefix::None, s)),
            Some((prefix, name)) if valid_name(name) => {
                Ok(GroupId::new(prefix.parse()?, name))
            }
            _ => Err(GroupParseError::Malformed(s.to_string())),
        }
    }
}

/// A named upstream link target, e.g. `igl_copyleft::cgal`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkDependency {
    namespace: String,
    name: String,
}

impl LinkDependency {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        LinkDependency {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Library name handed to the linker (`igl::core` -> `igl_core`).
    pub fn library_name(&self) -> String {
        format!("{}_{}", self.namespace, self.name)
    }
}

impl fmt::Display for LinkDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.namespace, self.name)
    }
}

impl Serialize for LinkDependency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Resolved state of one module group.
///
/// Created once per catalogued group and passed by reference through every
/// stage of that group's pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupDescriptor {
    pub id: GroupId,
    pub enabled: bool,
    pub subpath: String,
    pub target_name: String,
    pub link_deps: Vec<LinkDependency>,
}

impl GroupDescriptor {
    /// Resolve a group against its enablement flag.
    ///
    /// The core group ignores the flag: it is always enabled.
    pub fn resolve(id: GroupId, enabled: bool) -> Self {
        let enabled = id.is_core() || enabled;
        GroupDescriptor {
            subpath: id.subpath(),
            target_name: id.target_name(),
            link_deps: id.link_dependencies(),
            enabled,
            id,
        }
    }

    pub fn is_core(&self) -> bool {
        self.id.is_core()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subpath_rules() {
        assert_eq!(GroupId::core().subpath(), "");
        assert_eq!(GroupId::new(Prefix::Copyleft, "core").subpath(), "copyleft");
        assert_eq!(GroupId::new(Prefix::None, "embree").subpath(), "embree");
        assert_eq!(
            GroupId::new(Prefix::Restricted, "triangle").subpath(),
            "restricted/triangle"
        );
    }

    #[test]
    fn test_target_names_are_distinct() {
        assert_eq!(GroupId::core().target_name(), "pyigl_core");
        assert_eq!(
            GroupId::new(Prefix::Copyleft, "core").target_name(),
            "pyigl_copyleft_core"
        );
        assert_eq!(
            GroupId::new(Prefix::Copyleft, "cgal").target_name(),
            "pyigl_copyleft_cgal"
        );
    }

    #[test]
    fn test_flag_keys() {
        assert_eq!(GroupId::core().flag_key(), "core");
        assert_eq!(GroupId::new(Prefix::Copyleft, "core").flag_key(), "copyleft");
        assert_eq!(
            GroupId::new(Prefix::Copyleft, "tetgen").flag_key(),
            "copyleft_tetgen"
        );
        assert_eq!(GroupId::new(Prefix::None, "embree").flag_key(), "embree");
    }

    #[test]
    fn test_link_dependencies() {
        let core = GroupId::core().link_dependencies();
        assert_eq!(core.len(), 1);
        assert_eq!(core[0].to_string(), "igl::core");

        let copyleft_core = GroupId::new(Prefix::Copyleft, "core").link_dependencies();
        let names: Vec<String> = copyleft_core.iter().map(|d| d.to_string()).collect();
        assert_eq!(names, vec!["igl::core", "igl_copyleft::core"]);

        let embree = GroupId::new(Prefix::None, "embree").link_dependencies();
        let names: Vec<String> = embree.iter().map(|d| d.to_string()).collect();
        assert_eq!(names, vec!["igl::core", "igl::embree"]);
    }

    #[test]
    fn test_library_name() {
        let dep = LinkDependency::new("igl_copyleft", "cgal");
        assert_eq!(dep.library_name(), "igl_copyleft_cgal");
    }

    #[test]
    fn test_core_cannot_be_disabled() {
        let desc = GroupDescriptor::resolve(GroupId::core(), false);
        assert!(desc.enabled);

        let desc = GroupDescriptor::resolve(GroupId::new(Prefix::Copyleft, "core"), false);
        assert!(!desc.enabled);
    }

    #[test]
    fn test_parse_group_id() {
        assert_eq!("core".parse::<GroupId>().unwrap(), GroupId::core());
        assert_eq!(
            "copyleft/cgal".parse::<GroupId>().unwrap(),
            GroupId::new(Prefix::Copyleft, "cgal")
        );
        assert!(matches!(
            "gpl/cgal".parse::<GroupId>(),
            Err(GroupParseError::UnknownPrefix(_))
        ));
        assert!(matches!(
            "a/b/c".parse::<GroupId>(),
            Err(GroupParseError::Malformed(_))
        ));
    }
}
