//! The catalog of module groups and their enablement flags.

use std::collections::{BTreeMap, HashMap, HashSet};

use thiserror::Error;

use crate::core::group::{GroupDescriptor, GroupId, Prefix};

/// Invalid catalog definition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog does not contain the core group")]
    MissingCore,

    #[error("group `{0}` is listed more than once")]
    DuplicateGroup(GroupId),

    #[error("groups `{first}` and `{second}` share the {what} `{value}`")]
    Collision {
        first: GroupId,
        second: GroupId,
        what: &'static str,
        value: String,
    },
}

/// The ordered set of module groups known to a project.
///
/// The core group is always first; the remaining groups keep the order in
/// which they were declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    groups: Vec<GroupId>,
}

impl Catalog {
    /// Create a catalog, checking that core is present, no group repeats
    /// and no two groups derive the same subpath, flag key or target name.
    pub fn new(groups: Vec<GroupId>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for group in &groups {
            if !seen.insert(group) {
                return Err(CatalogError::DuplicateGroup(group.clone()));
            }
        }

        let derived: [(&'static str, fn(&GroupId) -> String); 3] = [
            ("subpath", GroupId::subpath),
            ("flag key", GroupId::flag_key),
            ("target name", GroupId::target_name),
        ];
        for (what, derive) in derived {
            let mut owners: HashMap<String, &GroupId> = HashMap::new();
            for group in &groups {
                let value = derive(group);
                if let Some(first) = owners.insert(value.clone(), group) {
                    return Err(CatalogError::Collision {
                        first: first.clone(),
                        second: group.clone(),
                        what,
                        value,
                    });
                }
            }
        }

        let core_pos = groups
            .iter()
            .position(GroupId::is_core)
            .ok_or(CatalogError::MissingCore)?;

        let mut groups = groups;
        let core = groups.remove(core_pos);
        groups.insert(0, core);

        Ok(Catalog { groups })
    }

    /// The catalog of groups shipped with the bindings.
    pub fn standard() -> Self {
        Catalog {
            groups: vec![
                GroupId::core(),
                GroupId::new(Prefix::None, "embree"),
                GroupId::new(Prefix::Copyleft, "core"),
                GroupId::new(Prefix::Copyleft, "cgal"),
                GroupId::new(Prefix::Copyleft, "tetgen"),
                GroupId::new(Prefix::Restricted, "triangle"),
            ],
        }
    }

    pub fn groups(&self) -> &[GroupId] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Find the group controlled by a flag key.
    pub fn by_flag(&self, key: &str) -> Option<&GroupId> {
        self.groups.iter().find(|g| g.flag_key() == key)
    }

    /// Flag keys of the groups that can be toggled (everything but core).
    pub fn flag_keys(&self) -> Vec<String> {
        self.groups
            .iter()
            .filter(|g| !g.is_core())
            .map(GroupId::flag_key)
            .collect()
    }

    /// Resolve every catalogued group against the flags, in catalog order.
    pub fn resolve(&self, flags: &GroupFlags) -> Vec<GroupDescriptor> {
        self.groups
            .iter()
            .map(|id| GroupDescriptor::resolve(id.clone(), flags.is_enabled(id)))
            .collect()
    }
}

/// Per-group enablement flags, keyed by [`GroupId::flag_key`].
///
/// Groups without an explicit flag are enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupFlags {
    flags: BTreeMap<String, bool>,
}

impl GroupFlags {
    pub fn new() -> Self {
        GroupFlags::default()
    }

    /// Set a flag. Later calls override earlier ones.
    pub fn set(&mut self, key: impl Into<String>, enabled: bool) {
        self.flags.insert(key.into(), enabled);
    }

    /// Builder-style [`GroupFlags::set`].
    pub fn with(mut self, key: impl Into<String>, enabled: bool) -> Self {
        self.set(key, enabled);
        self
    }

    /// Overlay another set of flags on top of this one.
    pub fn merge(&mut self, other: &GroupFlags) {
        for (key, enabled) in &other.flags {
            self.flags.insert(key.clone(), *enabled);
        }
    }

    pub fn is_enabled(&self, id: &GroupId) -> bool {
        id.is_core() || self.flags.get(&id.flag_key()).copied().unwrap_or(true)
    }

    /// Flag keys that do not name any group in the catalog.
    pub fn unknown_keys(&self, catalog: &Catalog) -> Vec<String> {
        self.flags
            .keys()
            .filter(|key| catalog.by_flag(key).is_none())
            .cloned()
            .collect()
    }

    /// Whether the flags try to switch off the core group.
    pub fn disables_core(&self) -> bool {
        self.flags.get(crate::core::group::CORE) == Some(&false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.flags.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, bool)> for GroupFlags {
    fn from_iter<I: IntoIterator<Item = (String, bool)>>(iter: I) -> Self {
        GroupFlags {
            flags: iter.into_iter().collect(),
        }
    }
}
