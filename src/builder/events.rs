//! Build event types for JSON output.
//!
//! These events are emitted one per line on stdout when using
//! `--message-format json`.
//!
//! # Event Types
//!
//! - `group-skipped`: a group is disabled and left out of the build
//! - `glue-generated`: a group's glue was (re)generated
//! - `module-artifact`: a module was built or found fresh
//! - `manifest-warning`: an interface manifest could not be produced
//! - `group-failed`: a group's pipeline stopped with an error
//! - `build-finished`: the orchestration completed
//!
//! New fields may be added, but existing fields are not removed or renamed.

use std::path::PathBuf;

use serde::Serialize;

use crate::builder::errors::GroupError;

/// An event emitted during orchestration.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum BuildEvent {
    /// A disabled group was removed from the build.
    GroupSkipped {
        group: String,
        flag: String,
    },

    /// Glue for a group was written (or found current).
    GlueGenerated {
        group: String,
        units: usize,
        directory: PathBuf,
        /// Whether any glue file changed on disk
        changed: bool,
    },

    /// A compiled module is available.
    ModuleArtifact {
        group: String,
        target: String,
        filenames: Vec<PathBuf>,
        /// Whether the executor was skipped because nothing changed
        fresh: bool,
    },

    /// Interface manifest generation failed without failing the group.
    ManifestWarning {
        group: String,
        target: String,
        message: String,
    },

    /// A group stopped with an error.
    GroupFailed {
        group: String,
        kind: String,
        message: String,
    },

    /// The orchestration completed (success or failure).
    BuildFinished {
        success: bool,
        duration_ms: u64,
        targets_built: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        umbrella: Option<String>,
    },
}

impl BuildEvent {
    pub fn failed(err: &GroupError) -> Self {
        BuildEvent::GroupFailed {
            group: err.group().to_string(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }

    pub fn finished(success: bool, duration_ms: u64, targets_built: u64) -> Self {
        BuildEvent::BuildFinished {
            success,
            duration_ms,
            targets_built,
            umbrella: None,
        }
    }

    /// Serialize this event to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
