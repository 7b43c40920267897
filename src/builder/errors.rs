//! Errors raised while driving a single module group.

use std::io;
use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::core::GroupId;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// A failure that stops one group's pipeline.
///
/// Every variant names the group it belongs to, so failures from parallel
/// pipelines can be reported together.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum GroupError {
    #[error("group `{group}`: {message}")]
    #[diagnostic(code(quay::group::configuration), help("{}", suggestions::EMPTY_GROUP))]
    Configuration {
        group: GroupId,
        path: PathBuf,
        message: String,
    },

    #[error(
        "group `{group}`: binding `{identifier}` is defined by both `{}` and `{}`",
        .first.display(),
        .second.display()
    )]
    #[diagnostic(code(quay::group::duplicate_binding), help("{}", suggestions::DUPLICATE_BINDING))]
    DuplicateBinding {
        group: GroupId,
        identifier: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("group `{group}`: I/O error on `{}`", .path.display())]
    #[diagnostic(code(quay::group::io))]
    Io {
        group: GroupId,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("group `{group}`: building `{target}` failed: {message}")]
    #[diagnostic(code(quay::group::build), help("{}", suggestions::BUILD_FAILED))]
    Build {
        group: GroupId,
        target: String,
        message: String,
    },

    #[error("group `{group}`: interface manifest for `{target}` failed: {message}")]
    #[diagnostic(code(quay::group::manifest), help("{}", suggestions::MANIFEST_FAILED))]
    Manifest {
        group: GroupId,
        target: String,
        message: String,
    },

    #[error("group `{group}`: cancelled ({reason})")]
    #[diagnostic(code(quay::group::cancelled))]
    Cancelled { group: GroupId, reason: String },
}

impl GroupError {
    pub fn io(group: &GroupId, path: impl Into<PathBuf>, source: io::Error) -> Self {
        GroupError::Io {
            group: group.clone(),
            path: path.into(),
            source,
        }
    }

    pub fn configuration(
        group: &GroupId,
        path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        GroupError::Configuration {
            group: group.clone(),
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn cancelled(group: &GroupId, reason: impl Into<String>) -> Self {
        GroupError::Cancelled {
            group: group.clone(),
            reason: reason.into(),
        }
    }

    /// The group this error belongs to.
    pub fn group(&self) -> &GroupId {
        match self {
            GroupError::Configuration { group, .. }
            | GroupError::DuplicateBinding { group, .. }
            | GroupError::Io { group, .. }
            | GroupError::Build { group, .. }
            | GroupError::Manifest { group, .. }
            | GroupError::Cancelled { group, .. } => group,
        }
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            GroupError::Configuration { .. } => "configuration",
            GroupError::DuplicateBinding { .. } => "duplicate-binding",
            GroupError::Io { .. } => "io",
            GroupError::Build { .. } => "build",
            GroupError::Manifest { .. } => "manifest",
            GroupError::Cancelled { .. } => "cancelled",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, GroupError::Cancelled { .. })
    }

    /// Convert to a user-facing diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            GroupError::Configuration { path, .. } => Diagnostic::error(self.to_string())
                .with_location(path)
                .with_suggestion(suggestions::EMPTY_GROUP),

            GroupError::DuplicateBinding { first, second, .. } => {
                Diagnostic::error(self.to_string())
                    .with_location(first)
                    .with_context(format!("also produced by {}", second.display()))
                    .with_suggestion(suggestions::DUPLICATE_BINDING)
            }

            GroupError::Io { path, source, .. } => Diagnostic::error(self.to_string())
                .with_location(path)
                .with_context(source.to_string()),

            GroupError::Build { .. } => {
                Diagnostic::error(self.to_string()).with_suggestion(suggestions::BUILD_FAILED)
            }

            GroupError::Manifest { .. } => Diagnostic::error(self.to_string())
                .with_suggestion(suggestions::MANIFEST_FAILED),

            GroupError::Cancelled { .. } => Diagnostic::note(self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Prefix;

    #[test]
    fn test_duplicate_binding_message() {
        let err = GroupError::DuplicateBinding {
            group: GroupId::new(Prefix::Copyleft, "cgal"),
            identifier: "foo".to_string(),
            first: PathBuf::from("src/copyleft/cgal/foo.cpp"),
            second: PathBuf::from("src/copyleft/cgal/foo.extra.cpp"),
        };
        let msg = err.to_string();
        assert!(msg.contains("copyleft/cgal"));
        assert!(msg.contains("`foo`"));
        assert!(msg.contains("foo.extra.cpp"));
        assert_eq!(err.kind(), "duplicate-binding");
        assert_eq!(err.group(), &GroupId::new(Prefix::Copyleft, "cgal"));
    }

    #[test]
    fn test_diagnostic_conversion() {
        let err = GroupError::configuration(&GroupId::core(), "src", "no binding units found");
        let output = err.to_diagnostic().format(false);
        assert!(output.contains("error: group `core`: no binding units found"));
        assert!(output.contains("--> src"));
    }

    #[test]
    fn test_io_error_names_path_and_cause() {
        let source = io::Error::new(io::ErrorKind::PermissionDenied, "permission denied");
        let err = GroupError::io(&GroupId::new(Prefix::None, "embree"), "src/embree", source);
        assert_eq!(err.to_string(), "group `embree`: I/O error on `src/embree`");
        assert_eq!(err.kind(), "io");

        let output = err.to_diagnostic().format(false);
        assert!(output.contains("--> src/embree"));
        assert!(output.contains("permission denied"));
    }

    #[test]
    fn test_cancelled_is_a_note() {
        let err = GroupError::cancelled(&GroupId::core(), "aborted");
        assert!(err.is_cancelled());
        assert!(err.to_diagnostic().format(false).starts_with("note:"));
    }
}
