//! Execution mode selection and cooperative cancellation.
//!
//! Thread counts are never read from global state during a call: `Auto`
//! consults the process-wide hardware concurrency once, and `Blocked` carries
//! an explicit count so tests and callers can force a specific layout.

use std::{
    num::NonZeroUsize,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicBool, Ordering},
    },
};

#[cfg(feature = "parallel")]
use crate::grid::GridDims;
use crate::{
    error::{Result, SegmentationError},
    grid::Connectivity,
};

/// Smallest number of grid rows handed to a worker by default.
#[cfg(feature = "parallel")]
const MIN_BLOCK_ROWS: usize = 32;

/// Selects how graph construction and energy evaluation are scheduled.
///
/// # Examples
/// ```
/// use std::num::NonZeroUsize;
/// use voxcut_core::ExecutionMode;
///
/// let threads = NonZeroUsize::new(4).expect("four is non-zero");
/// let mode = ExecutionMode::blocked(threads);
/// assert_eq!(mode, ExecutionMode::Blocked { threads, block_rows: None });
/// assert_eq!(ExecutionMode::default(), ExecutionMode::Auto);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    /// Use blocked execution for six-connected grids when more than one
    /// hardware thread is available, otherwise run serially.
    #[default]
    Auto,
    /// Build and solve on the calling thread.
    Serial,
    /// Fill capacities on a dedicated pool of `threads` workers, handing each
    /// worker `block_rows` grid rows at a time. Six-connected grids only.
    Blocked {
        /// Worker count of the per-call pool.
        threads: NonZeroUsize,
        /// Rows per work unit; `None` picks `max(32, min(Dx, Dy, Dz) / threads)`.
        block_rows: Option<NonZeroUsize>,
    },
}

impl ExecutionMode {
    /// Blocked execution with the default block size.
    #[must_use]
    pub const fn blocked(threads: NonZeroUsize) -> Self {
        Self::Blocked {
            threads,
            block_rows: None,
        }
    }

    /// Resolves the mode against the grid topology and this build.
    pub(crate) fn resolve(self, connectivity: Connectivity) -> Result<Plan> {
        match self {
            Self::Serial => Ok(Plan::Serial),
            Self::Auto => {
                #[cfg(feature = "parallel")]
                {
                    let threads = hardware_threads();
                    if connectivity == Connectivity::Six && threads.get() > 1 {
                        return Ok(Plan::Blocked {
                            threads,
                            block_rows: None,
                        });
                    }
                }
                Ok(Plan::Serial)
            }
            Self::Blocked { .. } => {
                #[cfg(feature = "parallel")]
                if let Self::Blocked {
                    threads,
                    block_rows,
                } = self
                    && connectivity == Connectivity::Six
                {
                    return Ok(Plan::Blocked {
                        threads,
                        block_rows,
                    });
                }
                Err(SegmentationError::ExecutionUnavailable {
                    requested: self,
                    connectivity,
                })
            }
        }
    }
}

/// Execution mode after resolution against the grid and the build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Plan {
    Serial,
    #[cfg(feature = "parallel")]
    Blocked {
        threads: NonZeroUsize,
        block_rows: Option<NonZeroUsize>,
    },
}

impl Plan {
    /// Name recorded in log fields.
    pub(crate) const fn label(self) -> &'static str {
        match self {
            Self::Serial => "serial",
            #[cfg(feature = "parallel")]
            Self::Blocked { .. } => "blocked",
        }
    }
}

/// Grid rows per work unit for blocked execution.
#[cfg(feature = "parallel")]
pub(crate) fn rows_per_block(
    dims: GridDims,
    threads: NonZeroUsize,
    block_rows: Option<NonZeroUsize>,
) -> usize {
    block_rows.map_or_else(
        || MIN_BLOCK_ROWS.max(dims.min_extent() / threads.get()),
        NonZeroUsize::get,
    )
}

/// Builds the dedicated worker pool of one blocked call.
#[cfg(feature = "parallel")]
pub(crate) fn worker_pool(threads: NonZeroUsize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.get())
        .thread_name(|index| format!("voxcut-worker-{index}"))
        .build()
        .map_err(|err| SegmentationError::ThreadPool {
            message: Arc::from(err.to_string()),
        })
}

/// Number of hardware threads, detected once per process.
#[must_use]
pub fn hardware_threads() -> NonZeroUsize {
    static THREADS: OnceLock<NonZeroUsize> = OnceLock::new();
    *THREADS.get_or_init(|| NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN))
}

/// Cloneable flag that asks a running segmentation to stop.
///
/// The max-flow loop and the alpha-expansion move loop poll the flag; a
/// cancelled call returns [`SegmentationError::Cancelled`] without touching
/// the label sink.
///
/// # Examples
/// ```
/// use voxcut_core::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
/// assert!(!token.is_cancelled());
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of every call observing this token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns `true` once [`Self::cancel`] has been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
