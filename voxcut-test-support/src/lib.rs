//! Shared test tooling for the voxcut crates.
//!
//! Nothing here depends on `voxcut-core`: the recording layer only speaks
//! `tracing` and the run profile only reads the environment, so any crate in
//! the workspace can use them without creating a dependency cycle.

pub mod ci;
pub mod recording;
