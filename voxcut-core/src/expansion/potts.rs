//! Potts smoothness term weighted by image affinity and voxel distance.

use crate::{
    distance::VoxelDistances,
    grid::GridDims,
    source::VoxelSource,
};

use super::PairwiseCost;

/// Potts model: `0` for equal labels, `image_weight / distance` otherwise.
///
/// The neighbour offset is recovered from the linear index delta of the two
/// nodes, so the cost can be evaluated lazily from node ids alone.
///
/// # Examples
/// ```
/// use voxcut_core::{
///     CallbackSource, GridDims, PairwiseCost, PottsCost, VoxelDistances, VoxelSpacing,
/// };
///
/// let dims = GridDims::new(2, 1, 1)?;
/// let source = CallbackSource::new(|_| 0, |_, _| 3.0);
/// let distances = VoxelDistances::from_spacing(VoxelSpacing::new(2.0, 1.0, 1.0)?, false);
/// let potts = PottsCost::new(dims, distances, &source);
/// assert_eq!(potts.cost(0, 1, 0, 0), 0.0);
/// assert_eq!(potts.cost(0, 1, 0, 1), 1.5);
/// # Ok::<(), voxcut_core::SegmentationError>(())
/// ```
#[derive(Debug)]
pub struct PottsCost<'a, S: ?Sized> {
    dims: GridDims,
    distances: VoxelDistances,
    source: &'a S,
}

impl<'a, S: VoxelSource + ?Sized> PottsCost<'a, S> {
    /// Creates a Potts term over `dims` reading affinities from `source`.
    #[must_use]
    pub const fn new(dims: GridDims, distances: VoxelDistances, source: &'a S) -> Self {
        Self {
            dims,
            distances,
            source,
        }
    }
}

impl<S: VoxelSource + ?Sized> PairwiseCost for PottsCost<'_, S> {
    fn cost(
        &self,
        node: usize,
        neighbour: usize,
        node_label: usize,
        neighbour_label: usize,
    ) -> f64 {
        if node_label == neighbour_label {
            return 0.0;
        }
        let (low, high) = (node.min(neighbour), node.max(neighbour));
        let Some(offset) = self.dims.offset_between(low, high) else {
            return 0.0;
        };
        let (Some(weight), Some(distance)) = (
            self.source.image_weight_between(self.dims, low, high),
            self.distances.for_offset(offset),
        ) else {
            return 0.0;
        };
        weight / distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    use crate::{
        distance::VoxelSpacing,
        grid::{Offset, Voxel},
        source::CallbackSource,
    };

    #[rstest]
    #[case::axis(1, 1.0)]
    #[case::face_diagonal(1 + 3, 2f64.sqrt())]
    #[case::space_diagonal(1 + 3 + 9, 3f64.sqrt())]
    fn divides_weight_by_neighbour_distance(#[case] neighbour: usize, #[case] distance: f64) {
        let dims = GridDims::new(3, 3, 3).expect("dims are valid");
        let source = CallbackSource::new(|_| 0, |_, _| 2.0);
        let distances = VoxelDistances::from_spacing(VoxelSpacing::isotropic(), false);
        let potts = PottsCost::new(dims, distances, &source);
        let cost = potts.cost(0, neighbour, 1, 0);
        assert!((cost - 2.0 / distance).abs() < 1e-12, "cost {cost}");
    }

    #[test]
    fn is_symmetric_in_node_order() {
        let dims = GridDims::new(3, 3, 1).expect("dims are valid");
        let source = CallbackSource::new(
            |_| 0,
            |voxel: Voxel, offset: Offset| {
                if offset.dy == 1 && voxel.x == 1 {
                    6.0
                } else {
                    1.0
                }
            },
        );
        let distances = VoxelDistances::from_spacing(VoxelSpacing::isotropic(), true);
        let axis = distances
            .for_offset(Offset::new(0, 1, 0))
            .expect("axis offsets have a distance");
        let potts = PottsCost::new(dims, distances, &source);
        assert_eq!(potts.cost(1, 4, 0, 2), potts.cost(4, 1, 2, 0));
        assert_eq!(potts.cost(4, 1, 2, 0), 6.0 / axis);
    }

    #[test]
    fn non_neighbours_cost_nothing() {
        let dims = GridDims::new(4, 1, 1).expect("dims are valid");
        let source = CallbackSource::new(|_| 0, |_, _| 1.0);
        let distances = VoxelDistances::from_spacing(VoxelSpacing::isotropic(), true);
        let potts = PottsCost::new(dims, distances, &source);
        assert_eq!(potts.cost(0, 2, 0, 1), 0.0);
        assert_eq!(potts.cost(3, 4, 0, 1), 0.0);
    }
}
