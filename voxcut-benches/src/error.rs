//! Benchmark setup error type.

use voxcut_core::{GraphError, SegmentationError};
use voxcut_providers_phantom::PhantomError;

/// Errors that may occur while preparing a benchmark input.
#[derive(Debug, thiserror::Error)]
pub enum BenchSetupError {
    /// The phantom description was invalid.
    #[error("phantom generation failed: {0}")]
    Phantom(#[from] PhantomError),
    /// Grid or segmenter configuration failed.
    #[error("segmentation setup failed: {0}")]
    Segmentation(#[from] SegmentationError),
    /// Direct graph construction failed.
    #[error("graph construction failed: {0}")]
    Graph(#[from] GraphError),
}
