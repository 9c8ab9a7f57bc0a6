//! Two-phase delivery of a labeling to the caller's sink.
//!
//! Every voxel's output label is resolved into a buffer first. Only when the
//! whole volume resolved does the sink see any writes, once per voxel in
//! row-major order, so a failed call never leaves a half-written result.

use crate::{
    error::{Result, SegmentationError},
    grid::GridDims,
    labels::LabelIndexMaps,
    maxflow::{GridMaxFlowSolver, Segment},
    source::LabelSink,
};

/// Output labels for every voxel of a grid, not yet delivered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ResolvedLabels {
    dims: GridDims,
    labels: Vec<i64>,
}

impl ResolvedLabels {
    fn allocate(dims: GridDims) -> Result<Vec<i64>> {
        let mut labels = Vec::new();
        labels
            .try_reserve_exact(dims.voxel_count())
            .map_err(|_| SegmentationError::GridTooLarge {
                x: dims.x(),
                y: dims.y(),
                z: dims.z(),
            })?;
        Ok(labels)
    }

    /// Sink-side voxels become `foreground`, all others `0`.
    pub(crate) fn binary<G>(dims: GridDims, graph: &G, foreground: i64) -> Result<Self>
    where
        G: GridMaxFlowSolver + ?Sized,
    {
        let mut labels = Self::allocate(dims)?;
        labels.extend((0..dims.voxel_count()).map(|node| match graph.segment(node) {
            Segment::Sink => foreground,
            Segment::Source => 0,
        }));
        Ok(Self { dims, labels })
    }

    /// Maps dense label indices back to the seed labels they stand for.
    pub(crate) fn multilabel(
        dims: GridDims,
        labeling: &[usize],
        maps: &LabelIndexMaps,
    ) -> Result<Self> {
        let mut labels = Self::allocate(dims)?;
        for &index in labeling.iter().take(dims.voxel_count()) {
            let label = maps
                .label_at(index)
                .ok_or(SegmentationError::UnresolvedLabel {
                    index,
                    labels: maps.len(),
                })?;
            labels.push(label);
        }
        if labels.len() != dims.voxel_count() {
            return Err(SegmentationError::UnresolvedLabel {
                index: labels.len(),
                labels: maps.len(),
            });
        }
        Ok(Self { dims, labels })
    }

    #[rustfmt::skip]
    pub(crate) fn labels(&self) -> &[i64] { &self.labels }

    /// Pushes every label to `sink` in row-major order.
    pub(crate) fn deliver<K>(&self, sink: &mut K)
    where
        K: LabelSink + ?Sized,
    {
        for (voxel, &label) in self.dims.voxels().zip(&self.labels) {
            sink.set_label(voxel, label);
        }
    }
}
