//! Builder utilities for configuring a [`Segmenter`].
//!
//! Every knob has a default, and [`SegmenterBuilder::build`] validates the
//! combination once so segmentation calls only check per-call inputs.

use crate::{
    Result,
    distance::VoxelSpacing,
    error::SegmentationError,
    execution::{CancellationToken, ExecutionMode},
    grid::Connectivity,
    segmenter::Segmenter,
};

/// Terminal capacity used when none is configured.
pub const DEFAULT_TERMINAL_CAPACITY: f64 = 1e6;

/// Configures and constructs [`Segmenter`] instances.
///
/// # Examples
/// ```
/// use voxcut_core::{Connectivity, ExecutionMode, SegmenterBuilder, VoxelSpacing};
///
/// let segmenter = SegmenterBuilder::new()
///     .with_connectivity(Connectivity::TwentySix)
///     .with_spacing(VoxelSpacing::new(0.5, 0.5, 2.0)?)
///     .with_execution(ExecutionMode::Serial)
///     .build()?;
/// assert_eq!(segmenter.connectivity(), Connectivity::TwentySix);
/// assert_eq!(segmenter.terminal_capacity(), 1e6);
/// # Ok::<(), voxcut_core::SegmentationError>(())
/// ```
#[derive(Clone, Debug)]
pub struct SegmenterBuilder {
    pub(crate) connectivity: Connectivity,
    pub(crate) terminal_capacity: f64,
    pub(crate) spacing: VoxelSpacing,
    pub(crate) normalized_distances: bool,
    pub(crate) execution: ExecutionMode,
    pub(crate) max_cycles: Option<usize>,
    pub(crate) cancellation: Option<CancellationToken>,
}

impl Default for SegmenterBuilder {
    fn default() -> Self {
        Self {
            connectivity: Connectivity::Six,
            terminal_capacity: DEFAULT_TERMINAL_CAPACITY,
            spacing: VoxelSpacing::isotropic(),
            normalized_distances: true,
            execution: ExecutionMode::Auto,
            max_cycles: None,
            cancellation: None,
        }
    }
}

impl SegmenterBuilder {
    /// Creates a builder populated with default parameters.
    ///
    /// # Examples
    /// ```
    /// use voxcut_core::{Connectivity, ExecutionMode, SegmenterBuilder};
    ///
    /// let builder = SegmenterBuilder::new();
    /// assert_eq!(builder.connectivity(), Connectivity::Six);
    /// assert_eq!(builder.execution(), ExecutionMode::Auto);
    /// assert!(builder.normalized_distances());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the neighbourhood of the grid graph.
    #[must_use]
    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// Returns the configured neighbourhood.
    #[must_use]
    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// Overrides the capacity tying seeds to their terminal.
    ///
    /// The value must dominate every neighbour capacity for seeds to be hard
    /// constraints.
    #[must_use]
    pub fn with_terminal_capacity(mut self, capacity: f64) -> Self {
        self.terminal_capacity = capacity;
        self
    }

    /// Returns the configured terminal capacity.
    #[must_use]
    pub fn terminal_capacity(&self) -> f64 {
        self.terminal_capacity
    }

    /// Sets the physical voxel size used to weight neighbour edges.
    #[must_use]
    pub fn with_spacing(mut self, spacing: VoxelSpacing) -> Self {
        self.spacing = spacing;
        self
    }

    /// Returns the configured voxel spacing.
    #[must_use]
    pub fn spacing(&self) -> VoxelSpacing {
        self.spacing
    }

    /// Chooses whether distances are scaled so the space diagonal is one.
    #[must_use]
    pub fn with_normalized_distances(mut self, normalized: bool) -> Self {
        self.normalized_distances = normalized;
        self
    }

    /// Returns whether distances are normalised.
    #[must_use]
    pub fn normalized_distances(&self) -> bool {
        self.normalized_distances
    }

    /// Selects serial, blocked or automatic scheduling.
    ///
    /// # Examples
    /// ```
    /// use std::num::NonZeroUsize;
    /// use voxcut_core::{Connectivity, ExecutionMode, SegmentationError, SegmenterBuilder};
    ///
    /// let threads = NonZeroUsize::new(2).expect("two is non-zero");
    /// let err = SegmenterBuilder::new()
    ///     .with_connectivity(Connectivity::TwentySix)
    ///     .with_execution(ExecutionMode::blocked(threads))
    ///     .build()
    ///     .expect_err("blocked execution needs a six-connected grid");
    /// assert!(matches!(err, SegmentationError::ExecutionUnavailable { .. }));
    /// ```
    #[must_use]
    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    /// Returns the configured execution mode.
    #[must_use]
    pub fn execution(&self) -> ExecutionMode {
        self.execution
    }

    /// Bounds the number of alpha-expansion passes; `None` runs until
    /// convergence.
    #[must_use]
    pub fn with_max_cycles(mut self, cycles: Option<usize>) -> Self {
        self.max_cycles = cycles;
        self
    }

    /// Returns the configured pass bound.
    #[must_use]
    pub fn max_cycles(&self) -> Option<usize> {
        self.max_cycles
    }

    /// Attaches a token that cancels every call made by the built segmenter.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Validates the configuration and constructs a [`Segmenter`].
    ///
    /// # Errors
    /// Returns [`SegmentationError::InvalidTerminalCapacity`] for a
    /// non-finite or non-positive capacity,
    /// [`SegmentationError::InvalidMaxCycles`] for a zero pass bound, and
    /// [`SegmentationError::ExecutionUnavailable`] when the execution mode
    /// cannot run the configured neighbourhood in this build.
    pub fn build(self) -> Result<Segmenter> {
        if !(self.terminal_capacity.is_finite() && self.terminal_capacity > 0.0) {
            return Err(SegmentationError::InvalidTerminalCapacity {
                got: self.terminal_capacity,
            });
        }
        if self.max_cycles == Some(0) {
            return Err(SegmentationError::InvalidMaxCycles { got: 0 });
        }
        let plan = self.execution.resolve(self.connectivity)?;
        Ok(Segmenter::new(self, plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case::zero(0.0)]
    #[case::negative(-5.0)]
    #[case::nan(f64::NAN)]
    #[case::infinite(f64::INFINITY)]
    fn rejects_unusable_terminal_capacity(#[case] capacity: f64) {
        let err = SegmenterBuilder::new()
            .with_terminal_capacity(capacity)
            .build()
            .expect_err("capacity must be rejected");
        assert!(matches!(err, SegmentationError::InvalidTerminalCapacity { .. }));
    }

    #[test]
    fn rejects_zero_max_cycles() {
        let err = SegmenterBuilder::new()
            .with_max_cycles(Some(0))
            .build()
            .expect_err("zero passes must be rejected");
        assert_eq!(err, SegmentationError::InvalidMaxCycles { got: 0 });
    }

    #[test]
    fn defaults_build() {
        let segmenter = SegmenterBuilder::new().build().expect("defaults are valid");
        assert_eq!(segmenter.connectivity(), Connectivity::Six);
        assert_eq!(segmenter.terminal_capacity(), DEFAULT_TERMINAL_CAPACITY);
        assert_eq!(segmenter.max_cycles(), None);
        assert!(segmenter.normalized_distances());
    }

    #[test]
    fn serial_twenty_six_builds() {
        let segmenter = SegmenterBuilder::new()
            .with_connectivity(Connectivity::TwentySix)
            .with_execution(ExecutionMode::Serial)
            .with_max_cycles(Some(3))
            .build()
            .expect("serial 26-connected is valid");
        assert_eq!(segmenter.execution(), ExecutionMode::Serial);
        assert_eq!(segmenter.max_cycles(), Some(3));
    }
}
