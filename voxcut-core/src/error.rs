//! Error types for the voxcut core library.
//!
//! Defines the error enum exposed by the public segmentation API, the macro
//! used by every solver module to attach stable error codes, and a convenient
//! result alias.

use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::{
    execution::ExecutionMode,
    grid::{Connectivity, GridDims, Offset, Voxel},
};

macro_rules! define_error_codes {
    (
        $(#[$enum_meta:meta])*
        enum $CodeTy:ident for $ErrTy:ident {
            $(
                $(#[$variant_meta:meta])*
                $CodeVariant:ident => $ErrVariant:ident $( { $($pattern:tt)* } )? => $code:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[non_exhaustive]
        pub enum $CodeTy {
            $(
                $(#[$variant_meta])*
                $CodeVariant,
            )+
        }

        impl $CodeTy {
            /// Return the stable machine-readable representation of this error code.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$CodeVariant => $code,)+
                }
            }
        }

        impl ::std::fmt::Display for $CodeTy {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $ErrTy {
            #[doc = concat!(
                "Retrieve the stable [`",
                stringify!($CodeTy),
                "`] for this error."
            )]
            #[must_use]
            pub const fn code(&self) -> $CodeTy {
                match self {
                    $(Self::$ErrVariant $( { $($pattern)* } )? => $CodeTy::$CodeVariant,)+
                }
            }
        }
    };
}

pub(crate) use define_error_codes;

/// Error type produced when configuring or running a [`crate::Segmenter`].
///
/// Any `Err` returned from a segmentation entry point guarantees that the
/// caller's [`crate::LabelSink`] was never invoked.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SegmentationError {
    /// Every grid dimension must be at least one voxel.
    #[error("grid dimensions must all be positive (got {x}x{y}x{z})")]
    InvalidDimensions {
        /// Requested extent along X.
        x: usize,
        /// Requested extent along Y.
        y: usize,
        /// Requested extent along Z.
        z: usize,
    },
    /// The grid holds more voxels (or graph arcs) than the host can address.
    #[error("grid {x}x{y}x{z} is too large to index on this platform")]
    GridTooLarge {
        /// Requested extent along X.
        x: usize,
        /// Requested extent along Y.
        y: usize,
        /// Requested extent along Z.
        z: usize,
    },
    /// Voxel spacing components must be finite and strictly positive.
    #[error("voxel spacing must be finite and positive (got {x}, {y}, {z})")]
    InvalidSpacing {
        /// Spacing along X.
        x: f64,
        /// Spacing along Y.
        y: f64,
        /// Spacing along Z.
        z: f64,
    },
    /// Only 6- and 26-connected neighbourhoods are supported.
    #[error("unsupported neighbourhood connectivity {requested}; expected 6 or 26")]
    UnsupportedConnectivity {
        /// Connectivity requested by the caller.
        requested: u8,
    },
    /// The terminal capacity must be finite and strictly positive.
    #[error("terminal capacity must be finite and positive (got {got})")]
    InvalidTerminalCapacity {
        /// Capacity supplied by the caller.
        got: f64,
    },
    /// The foreground seed value must be a positive label.
    #[error("foreground seed label must be positive (got {got})")]
    InvalidForegroundLabel {
        /// Label supplied by the caller.
        got: i64,
    },
    /// The expansion pass bound must be at least one.
    #[error("max_cycles must be at least 1 (got {got})")]
    InvalidMaxCycles {
        /// Bound supplied by the caller.
        got: usize,
    },
    /// The seed volume contained no labels other than background.
    #[error("seed volume contains no non-background labels")]
    NoSeedLabels,
    /// The image-weight accessor returned a negative or non-finite affinity.
    #[error("image weight {weight} between voxel {voxel} and offset {offset} is not a finite non-negative value")]
    InvalidImageWeight {
        /// Voxel whose neighbour edge was being weighted.
        voxel: Voxel,
        /// Offset of the neighbour.
        offset: Offset,
        /// Weight returned by the accessor.
        weight: f64,
    },
    /// The requested execution mode cannot run the requested topology in this build.
    #[error("execution mode {requested:?} is not available for {connectivity} in this build")]
    ExecutionUnavailable {
        /// Mode requested by the caller.
        requested: ExecutionMode,
        /// Topology the call was configured with.
        connectivity: Connectivity,
    },
    /// The per-call worker pool could not be created.
    #[error("failed to start worker pool: {message}")]
    ThreadPool {
        /// Description reported by the pool builder.
        message: Arc<str>,
    },
    /// A solver produced a dense label index with no observed seed label.
    #[error("dense label index {index} has no seed label ({labels} labels observed)")]
    UnresolvedLabel {
        /// Dense index produced by the solver.
        index: usize,
        /// Number of observed labels.
        labels: usize,
    },
    /// The call observed its cancellation token and stopped early.
    #[error("segmentation was cancelled")]
    Cancelled,
    /// The max-flow or alpha-expansion solver failed.
    #[error("solver failed with {code}: {message}")]
    Solver {
        /// Stable code of the underlying solver error.
        code: Arc<str>,
        /// Human readable description of the underlying error.
        message: Arc<str>,
    },
}

define_error_codes! {
    /// Stable codes describing [`SegmentationError`] variants.
    enum SegmentationErrorCode for SegmentationError {
        /// Every grid dimension must be at least one voxel.
        InvalidDimensions => InvalidDimensions { .. } => "VOXCUT_INVALID_DIMENSIONS",
        /// The grid holds more voxels than the host can address.
        GridTooLarge => GridTooLarge { .. } => "VOXCUT_GRID_TOO_LARGE",
        /// Voxel spacing components must be finite and strictly positive.
        InvalidSpacing => InvalidSpacing { .. } => "VOXCUT_INVALID_SPACING",
        /// Only 6- and 26-connected neighbourhoods are supported.
        UnsupportedConnectivity => UnsupportedConnectivity { .. } => "VOXCUT_UNSUPPORTED_CONNECTIVITY",
        /// The terminal capacity must be finite and strictly positive.
        InvalidTerminalCapacity => InvalidTerminalCapacity { .. } => "VOXCUT_INVALID_TERMINAL_CAPACITY",
        /// The foreground seed value must be a positive label.
        InvalidForegroundLabel => InvalidForegroundLabel { .. } => "VOXCUT_INVALID_FOREGROUND_LABEL",
        /// The expansion pass bound must be at least one.
        InvalidMaxCycles => InvalidMaxCycles { .. } => "VOXCUT_INVALID_MAX_CYCLES",
        /// The seed volume contained no labels other than background.
        NoSeedLabels => NoSeedLabels => "VOXCUT_NO_SEED_LABELS",
        /// The image-weight accessor returned an unusable affinity.
        InvalidImageWeight => InvalidImageWeight { .. } => "VOXCUT_INVALID_IMAGE_WEIGHT",
        /// The requested execution mode is unavailable.
        ExecutionUnavailable => ExecutionUnavailable { .. } => "VOXCUT_EXECUTION_UNAVAILABLE",
        /// The per-call worker pool could not be created.
        ThreadPool => ThreadPool { .. } => "VOXCUT_THREAD_POOL",
        /// A dense label index could not be mapped back to a seed label.
        UnresolvedLabel => UnresolvedLabel { .. } => "VOXCUT_UNRESOLVED_LABEL",
        /// The call was cancelled.
        Cancelled => Cancelled => "VOXCUT_CANCELLED",
        /// The max-flow or alpha-expansion solver failed.
        SolverFailure => Solver { .. } => "VOXCUT_SOLVER_FAILURE",
    }
}

impl SegmentationError {
    /// Returns `true` when the error was caused by caller-supplied input rather
    /// than by the solver or the runtime.
    #[must_use]
    pub const fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidDimensions { .. }
                | Self::InvalidSpacing { .. }
                | Self::UnsupportedConnectivity { .. }
                | Self::InvalidTerminalCapacity { .. }
                | Self::InvalidForegroundLabel { .. }
                | Self::InvalidMaxCycles { .. }
                | Self::NoSeedLabels
                | Self::InvalidImageWeight { .. }
        )
    }
}

impl fmt::Display for Voxel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl fmt::Display for GridDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.x(), self.y(), self.z())
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.dx, self.dy, self.dz)
    }
}

/// Convenient alias for results returned by the core API.
pub type Result<T> = core::result::Result<T, SegmentationError>;
