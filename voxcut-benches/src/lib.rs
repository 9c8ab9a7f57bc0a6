//! Benchmark support crate for voxcut.
//!
//! Provides precomputed phantom volumes and parameter types used by the
//! Criterion benchmarks for graph construction, max-flow and alpha-expansion.

pub mod error;
pub mod params;
pub mod volume;
