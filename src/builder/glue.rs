//! Glue generation.
//!
//! For every group the entry file includes two generated fragments: one
//! declaring a registration function per binding unit, one invoking them all
//! against the module handle. The fragments only depend on the unit list, so
//! regenerating them for an unchanged directory leaves the files untouched.

use std::io;
use std::path::{Path, PathBuf};

use crate::core::BindingUnit;
use crate::util::fs::{ensure_dir, write_if_changed};
use crate::util::hash::sha256_str;

/// File receiving the forward declarations.
pub const DECLARATIONS_FILE: &str = "BINDING_DECLARATIONS.in";

/// File receiving the registration calls.
pub const INVOCATIONS_FILE: &str = "BINDING_INVOCATIONS.in";

/// Shape of the generated registration code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlueStyle {
    /// Prefix of each registration function (`bind_`)
    pub function_prefix: String,
    /// Parameter type of the module handle (`nb::module_ &`)
    pub handle_type: String,
    /// Parameter name of the module handle (`m`)
    pub handle_name: String,
}

impl Default for GlueStyle {
    fn default() -> Self {
        GlueStyle {
            function_prefix: "bind_".to_string(),
            handle_type: "nb::module_ &".to_string(),
            handle_name: "m".to_string(),
        }
    }
}

impl GlueStyle {
    pub fn function_name(&self, identifier: &str) -> String {
        format!("{}{}", self.function_prefix, identifier)
    }

    fn declaration(&self, identifier: &str) -> String {
        format!(
            "void {}({}{});\n",
            self.function_name(identifier),
            self.handle_type,
            self.handle_name
        )
    }

    fn invocation(&self, identifier: &str) -> String {
        format!("  {}({});\n", self.function_name(identifier), self.handle_name)
    }
}

/// Generated glue for one group, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedGlue {
    pub declarations: String,
    pub invocations: String,
}

/// Paths of the written glue files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlueFiles {
    pub declarations: PathBuf,
    pub invocations: PathBuf,
    /// Whether either file's contents changed
    pub changed: bool,
}

impl GeneratedGlue {
    /// Render the glue for the given units.
    pub fn generate(units: &[BindingUnit], style: &GlueStyle) -> Self {
        let mut glue = GeneratedGlue::default();
        for unit in units {
            glue.declarations.push_str(&style.declaration(&unit.identifier));
            glue.invocations.push_str(&style.invocation(&unit.identifier));
        }
        glue
    }

    pub fn declaration_count(&self) -> usize {
        self.declarations.lines().count()
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lines().count()
    }

    /// Content hash over both fragments.
    pub fn digest(&self) -> String {
        sha256_str(&format!("{}\0{}", self.declarations, self.invocations))
    }

    /// Write both fragments into `dir`, leaving files whose contents are
    /// already current untouched.
    pub fn write_to(&self, dir: &Path) -> io::Result<GlueFiles> {
        ensure_dir(dir)?;

        let declarations = dir.join(DECLARATIONS_FILE);
        let invocations = dir.join(INVOCATIONS_FILE);

        let decl_changed = write_if_changed(&declarations, self.declarations.as_bytes())?;
        let inv_changed = write_if_changed(&invocations, self.invocations.as_bytes())?;

        Ok(GlueFiles {
            declarations,
            invocations,
            changed: decl_changed || inv_changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn units(ids: &[&str]) -> Vec<BindingUnit> {
        ids.iter()
            .map(|id| BindingUnit {
                identifier: id.to_string(),
                path: PathBuf::from(format!("{}.cpp", id)),
            })
            .collect()
    }

    #[test]
    fn test_generate_in_order() {
        let glue = GeneratedGlue::generate(&units(&["a", "b"]), &GlueStyle::default());
        assert_eq!(
            glue.declarations,
            "void bind_a(nb::module_ &m);\nvoid bind_b(nb::module_ &m);\n"
        );
        assert_eq!(glue.invocations, "  bind_a(m);\n  bind_b(m);\n");
        assert_eq!(glue.declaration_count(), 2);
        assert_eq!(glue.invocation_count(), 2);
    }

    #[test]
    fn test_custom_style() {
        let style = GlueStyle {
            function_prefix: "register_".to_string(),
            ..Default::default()
        };
        let glue = GeneratedGlue::generate(&units(&["cotmatrix"]), &style);
        assert_eq!(glue.invocations, "  register_cotmatrix(m);\n");
    }

    #[test]
    fn test_empty_units() {
        let glue = GeneratedGlue::generate(&[], &GlueStyle::default());
        assert_eq!(glue.declaration_count(), 0);
        assert!(glue.invocations.is_empty());
    }

    #[test]
    fn test_write_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("generated").join("copyleft");
        let glue = GeneratedGlue::generate(&units(&["a", "b"]), &GlueStyle::default());

        let first = glue.write_to(&dir).unwrap();
        assert!(first.changed);
        let before = fs::metadata(&first.declarations).unwrap().modified().unwrap();

        let second = glue.write_to(&dir).unwrap();
        assert!(!second.changed);
        let after = fs::metadata(&second.declarations).unwrap().modified().unwrap();
        assert_eq!(before, after);
        assert_eq!(
            fs::read_to_string(&second.invocations).unwrap(),
            "  bind_a(m);\n  bind_b(m);\n"
        );
    }

    #[test]
    fn test_digest_tracks_content() {
        let style = GlueStyle::default();
        let a = GeneratedGlue::generate(&units(&["a"]), &style);
        let b = GeneratedGlue::generate(&units(&["b"]), &style);
        assert_ne!(a.digest(), b.digest());
        assert_eq!(a.digest(), GeneratedGlue::generate(&units(&["a"]), &style).digest());
    }
}
