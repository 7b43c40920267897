//! Core data structures for Quay.
//!
//! This module contains the fundamental types: module groups and their
//! catalog, binding units, and the project layout.

pub mod catalog;
pub mod group;
pub mod project;
pub mod unit;

pub use catalog::{Catalog, GroupFlags};
pub use group::{GroupDescriptor, GroupId, LinkDependency, Prefix};
pub use project::{Layout, Project};
pub use unit::BindingUnit;
