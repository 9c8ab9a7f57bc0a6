//! Support library for the `voxcut` binary.
//!
//! Exposes the command pipeline and logging bootstrap so tests can drive a
//! segmentation without spawning a subprocess.

pub mod cli;
pub mod logging;
