//! Synthetic phantom volumes for voxcut.
//!
//! A phantom is a box of background intensity with solid spheres painted into
//! it, optional uniform noise, a ground-truth labeling and a sparse seed
//! volume. [`PhantomSource`] serves one to the segmenter as a
//! [`voxcut_core::VoxelSource`] with Gaussian intensity affinities.

mod errors;
mod generation;
mod quality;
mod source;

pub use errors::PhantomError;
pub use generation::{Phantom, PhantomBuilder, Sphere, gaussian_affinity};
pub use quality::dice;
pub use source::PhantomSource;

#[cfg(test)]
mod tests;
