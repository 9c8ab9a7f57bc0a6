//! Summaries returned by successful segmentation calls.
//!
//! The labeling itself is delivered through the caller's
//! [`LabelSink`](crate::LabelSink); these types only report what was written.

/// Outcome of [`Segmenter::segment_binary`](crate::Segmenter::segment_binary).
///
/// # Examples
/// ```
/// use voxcut_core::{CallbackSource, GridDims, LabelVolume, SegmenterBuilder, Voxel};
///
/// let dims = GridDims::new(4, 1, 1)?;
/// let seeds = [1, 0, 0, 2];
/// let source = CallbackSource::new(|voxel: Voxel| seeds[voxel.x], |_, _| 1.0);
/// let mut volume = LabelVolume::new(dims);
/// let summary = SegmenterBuilder::new()
///     .build()?
///     .segment_binary(dims, &source, 1, &mut volume)?;
/// assert_eq!(summary.foreground_voxels() + summary.background_voxels(), 4);
/// assert_eq!(summary.foreground_label(), 1);
/// # Ok::<(), voxcut_core::SegmentationError>(())
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BinarySegmentation {
    foreground_label: i64,
    foreground_voxels: usize,
    background_voxels: usize,
    max_flow: f64,
}

impl BinarySegmentation {
    pub(crate) fn from_labels(foreground_label: i64, labels: &[i64], max_flow: f64) -> Self {
        let foreground_voxels = labels
            .iter()
            .filter(|&&label| label == foreground_label)
            .count();
        Self {
            foreground_label,
            foreground_voxels,
            background_voxels: labels.len() - foreground_voxels,
            max_flow,
        }
    }

    /// Seed value written for foreground voxels.
    #[must_use]
    #[rustfmt::skip]
    pub const fn foreground_label(&self) -> i64 { self.foreground_label }

    /// Number of voxels labelled foreground.
    #[must_use]
    #[rustfmt::skip]
    pub const fn foreground_voxels(&self) -> usize { self.foreground_voxels }

    /// Number of voxels labelled `0`.
    #[must_use]
    #[rustfmt::skip]
    pub const fn background_voxels(&self) -> usize { self.background_voxels }

    /// Value of the maximum flow, equal to the capacity of the minimum cut.
    #[must_use]
    #[rustfmt::skip]
    pub const fn max_flow(&self) -> f64 { self.max_flow }
}

/// Outcome of
/// [`Segmenter::segment_multilabel`](crate::Segmenter::segment_multilabel).
#[derive(Clone, Debug, PartialEq)]
pub struct MultiLabelSegmentation {
    label_voxels: Vec<(i64, usize)>,
    initial_energy: f64,
    energy: f64,
    cycles: usize,
    converged: bool,
}

impl MultiLabelSegmentation {
    pub(crate) fn new(
        observed: &[i64],
        labels: &[i64],
        initial_energy: f64,
        energy: f64,
        cycles: usize,
        converged: bool,
    ) -> Self {
        let label_voxels = observed
            .iter()
            .map(|&seed| (seed, labels.iter().filter(|&&label| label == seed).count()))
            .collect();
        Self {
            label_voxels,
            initial_energy,
            energy,
            cycles,
            converged,
        }
    }

    /// Observed seed labels with the number of voxels assigned to each, in
    /// dense index order.
    #[must_use]
    pub fn label_voxels(&self) -> &[(i64, usize)] {
        &self.label_voxels
    }

    /// Number of voxels assigned `label`, or `0` when it was not observed.
    #[must_use]
    pub fn voxels_for(&self, label: i64) -> usize {
        self.label_voxels
            .iter()
            .find(|(seed, _)| *seed == label)
            .map_or(0, |&(_, count)| count)
    }

    /// Energy of the per-voxel data-cost argmin the run started from.
    #[must_use]
    #[rustfmt::skip]
    pub const fn initial_energy(&self) -> f64 { self.initial_energy }

    /// Energy of the delivered labeling.
    #[must_use]
    #[rustfmt::skip]
    pub const fn energy(&self) -> f64 { self.energy }

    /// Number of passes over all labels.
    #[must_use]
    #[rustfmt::skip]
    pub const fn cycles(&self) -> usize { self.cycles }

    /// `false` when the run stopped at the configured pass bound while the
    /// energy was still decreasing.
    #[must_use]
    #[rustfmt::skip]
    pub const fn converged(&self) -> bool { self.converged }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_counts_partition_the_volume() {
        let summary = BinarySegmentation::from_labels(3, &[3, 0, 3, 0, 0], 2.5);
        assert_eq!(summary.foreground_voxels(), 2);
        assert_eq!(summary.background_voxels(), 3);
        assert_eq!(summary.max_flow(), 2.5);
    }

    #[test]
    fn multilabel_counts_follow_dense_order() {
        let summary = MultiLabelSegmentation::new(&[9, 2], &[2, 2, 9, 2], 10.0, 4.0, 2, true);
        assert_eq!(summary.label_voxels(), &[(9, 1), (2, 3)]);
        assert_eq!(summary.voxels_for(2), 3);
        assert_eq!(summary.voxels_for(5), 0);
    }
}
