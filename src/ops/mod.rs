//! High-level operations.
//!
//! This module contains the orchestration pipeline and the implementation of
//! Quay commands.

pub mod orchestrate;
pub mod plan;
pub mod quay_build;

pub use orchestrate::{
    ErrorPolicy, GroupOutcome, OrchestrateOptions, OrchestrationError, OrchestrationReport,
    Orchestrator, OrchestratorState, Stage,
};
pub use plan::BuildPlan;
pub use quay_build::{build, generate_glue, plan, validate_flags, BuildOptions};
