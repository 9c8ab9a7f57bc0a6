use thiserror::Error;
use voxcut_core::SegmentationError;

/// Ways a phantom description can be unusable.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum PhantomError {
    /// One extent was zero.
    #[error("phantom extents must be positive, got {x}x{y}x{z}")]
    ZeroExtent {
        /// Requested x extent.
        x: usize,
        /// Requested y extent.
        y: usize,
        /// Requested z extent.
        z: usize,
    },
    /// The voxel count overflows `usize`.
    #[error("phantom voxel count overflows")]
    TooLarge,
    /// A sphere radius was not finite and positive.
    #[error("sphere {label} has unusable radius {radius}")]
    InvalidRadius {
        /// Label of the offending sphere.
        label: i64,
        /// Supplied radius.
        radius: f64,
    },
    /// Seed labels must be positive.
    #[error("label {label} is not positive")]
    InvalidLabel {
        /// Supplied label.
        label: i64,
    },
    /// Noise amplitude was negative or not finite.
    #[error("noise amplitude {noise} must be finite and non-negative")]
    InvalidNoise {
        /// Supplied amplitude.
        noise: f64,
    },
    /// Seed fraction outside `(0, 1]`.
    #[error("seed fraction {fraction} must lie in (0, 1]")]
    InvalidSeedFraction {
        /// Supplied fraction.
        fraction: f64,
    },
    /// The affinity bandwidth was not finite and positive.
    #[error("affinity sigma {sigma} must be finite and positive")]
    InvalidSigma {
        /// Supplied bandwidth.
        sigma: f64,
    },
    /// The phantom extents were rejected as a segmentation grid.
    #[error("phantom grid rejected: {0}")]
    Grid(#[from] SegmentationError),
}
