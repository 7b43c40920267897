//! Quay - a build orchestrator for binding-module groups
//!
//! This crate discovers binding units per module group, generates the glue
//! that registers them, assembles one build target per enabled group and
//! drives building, installation and interface manifest generation.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

/// Test utilities and fakes for Quay unit tests.
///
/// Only compiled for tests. Provides project fixtures on disk plus fake
/// executor and manifest generator implementations.
#[cfg(test)]
pub mod test_support;

pub use core::{BindingUnit, Catalog, GroupDescriptor, GroupFlags, GroupId, Layout, Project};
pub use ops::{ErrorPolicy, OrchestrationReport, Orchestrator};
pub use util::context::GlobalContext;
