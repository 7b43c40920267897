//! Binding units: one source file contributing one registration function.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static NON_IDENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").unwrap());

/// A discovered binding unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingUnit {
    /// Name used to derive the registration function.
    pub identifier: String,
    /// Absolute path to the source file.
    pub path: PathBuf,
}

impl BindingUnit {
    /// Create a unit from a source path, deriving the identifier from its
    /// file name. Returns `None` for paths without a usable file name.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let file_name = path.file_name()?.to_str()?;
        let identifier = identifier_for(file_name)?;
        Some(BindingUnit { identifier, path })
    }

    /// The file name of the unit's source.
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Derive a unit identifier from a file name.
///
/// The identifier is everything before the first `.`, with characters that
/// cannot appear in a C++ identifier replaced by `_`. Returns `None` when the
/// stem is empty (dotfiles).
pub fn identifier_for(file_name: &str) -> Option<String> {
    let stem = file_name.split('.').next().unwrap_or_default();
    if stem.is_empty() {
        return None;
    }
    Some(NON_IDENT.replace_all(stem, "_").into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_strips_all_extensions() {
        assert_eq!(identifier_for("cotmatrix.cpp").as_deref(), Some("cotmatrix"));
        assert_eq!(identifier_for("foo.extra.cpp").as_deref(), Some("foo"));
    }

    #[test]
    fn test_identifier_sanitized() {
        assert_eq!(
            identifier_for("read-triangle mesh.cpp").as_deref(),
            Some("read_triangle_mesh")
        );
    }

    #[test]
    fn test_dotfile_has_no_identifier() {
        assert_eq!(identifier_for(".hidden.cpp"), None);
        assert!(BindingUnit::from_path("/src/.hidden.cpp").is_none());
    }

    #[test]
    fn test_unit_from_path() {
        let unit = BindingUnit::from_path("/src/copyleft/cgal/intersect.cpp").unwrap();
        assert_eq!(unit.identifier, "intersect");
        assert_eq!(unit.file_name(), "intersect.cpp");
    }
}
