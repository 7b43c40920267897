//! Per-group build pipeline stages.
//!
//! Discovery, glue generation, target assembly, the executor seam, and the
//! post-build install and manifest steps.

pub mod assemble;
pub mod discovery;
pub mod errors;
pub mod events;
pub mod executor;
pub mod fingerprint;
pub mod glue;
pub mod install;
pub mod manifest;

pub use assemble::{BuildTarget, TargetAssembler, TargetHandle, Umbrella, UmbrellaSummary};
pub use discovery::{discover_units, DiscoveryOptions};
pub use errors::GroupError;
pub use events::BuildEvent;
pub use executor::{CompilerExecutor, Executor, ProgressExecutor};
pub use glue::{GeneratedGlue, GlueStyle};
pub use manifest::{ManifestGenerator, StubgenCommand};
