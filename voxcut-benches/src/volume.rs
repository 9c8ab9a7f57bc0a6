//! Phantom volumes with precomputed neighbour affinities.
//!
//! Benchmarks should time the engine rather than the affinity function, so
//! every forward-edge weight is evaluated once up front and looked up on
//! each call.

use voxcut_core::{
    Connectivity, GraphError, GridDims, GridGraph, GridMaxFlowSolver, Offset, Voxel,
    VoxelDistances, VoxelSpacing, VoxelSource,
};
use voxcut_providers_phantom::{Phantom, PhantomBuilder};

use crate::error::BenchSetupError;

const NOISE: f64 = 0.05;
const SIGMA: f64 = 0.1;

/// Seed volume with a cached affinity per forward edge.
#[derive(Clone, Debug)]
pub struct BenchVolume {
    dims: GridDims,
    connectivity: Connectivity,
    seeds: Vec<i64>,
    truth: Vec<i64>,
    weights: Vec<f64>,
}

#[expect(
    clippy::cast_precision_loss,
    reason = "Benchmark extents are small integers."
)]
fn quarter(extent: usize) -> f64 {
    extent as f64 / 4.0
}

impl BenchVolume {
    /// Cubic phantom with one centred sphere labelled `1` and background
    /// seeds labelled `2`.
    ///
    /// # Errors
    /// Returns [`BenchSetupError`] when `extent` is zero.
    pub fn sphere(
        extent: usize,
        connectivity: Connectivity,
        rng_seed: u64,
    ) -> Result<Self, BenchSetupError> {
        let phantom = PhantomBuilder::centred_sphere([extent; 3], quarter(extent))
            .with_noise(NOISE)
            .with_rng_seed(rng_seed)
            .build()?;
        Self::from_phantom(&phantom, connectivity)
    }

    /// Box twice as long in `x` holding two spheres labelled `1` and `2`
    /// with background seeds labelled `3`.
    ///
    /// # Errors
    /// Returns [`BenchSetupError`] when `extent` is zero.
    pub fn sphere_pair(
        extent: usize,
        connectivity: Connectivity,
        rng_seed: u64,
    ) -> Result<Self, BenchSetupError> {
        let phantom = PhantomBuilder::sphere_pair(
            [extent.saturating_mul(2), extent, extent],
            quarter(extent),
        )
        .with_noise(NOISE)
        .with_rng_seed(rng_seed)
        .build()?;
        Self::from_phantom(&phantom, connectivity)
    }

    fn from_phantom(
        phantom: &Phantom,
        connectivity: Connectivity,
    ) -> Result<Self, BenchSetupError> {
        let [x, y, z] = phantom.dims();
        let dims = GridDims::new(x, y, z)?;
        let forward = connectivity.forward_offsets();
        let mut weights = Vec::with_capacity(dims.voxel_count().saturating_mul(forward.len()));
        for voxel in dims.voxels() {
            let node = dims.index(voxel);
            weights.extend(forward.iter().map(|&offset| {
                dims.neighbor(voxel, offset).map_or(0.0, |neighbour| {
                    phantom.affinity(node, dims.index(neighbour), SIGMA)
                })
            }));
        }
        Ok(Self {
            dims,
            connectivity,
            seeds: phantom.seeds().to_vec(),
            truth: phantom.truth().to_vec(),
            weights,
        })
    }

    /// Grid covered by the volume.
    #[must_use]
    #[rustfmt::skip]
    pub const fn dims(&self) -> GridDims { self.dims }

    /// Neighbourhood the weights were cached for.
    #[must_use]
    #[rustfmt::skip]
    pub const fn connectivity(&self) -> Connectivity { self.connectivity }

    /// Ground-truth labels of the phantom.
    #[must_use]
    #[rustfmt::skip]
    pub fn truth(&self) -> &[i64] { &self.truth }

    fn forward_weight(&self, node: usize, offset: Offset) -> Option<f64> {
        let forward = self.connectivity.forward_offsets();
        let position = forward.iter().position(|&candidate| candidate == offset)?;
        self.weights.get(node * forward.len() + position).copied()
    }

    /// Installs the binary graph for `foreground` directly, bypassing the
    /// segmenter, so solver benchmarks time max-flow alone.
    ///
    /// # Errors
    /// Returns [`GraphError`] when the graph rejects a capacity.
    pub fn install(
        &self,
        graph: &mut GridGraph,
        foreground: i64,
        terminal_capacity: f64,
    ) -> Result<(), GraphError> {
        let distances = VoxelDistances::from_spacing(VoxelSpacing::isotropic(), true);
        for voxel in self.dims.voxels() {
            let node = self.dims.index(voxel);
            match self.seeds[node] {
                seed if seed == foreground => {
                    graph.set_terminal_capacity(node, 0.0, terminal_capacity)?;
                }
                seed if seed > 0 => graph.set_terminal_capacity(node, terminal_capacity, 0.0)?,
                _ => {}
            }
            for &offset in self.connectivity.forward_offsets() {
                if self.dims.neighbor(voxel, offset).is_none() {
                    continue;
                }
                let weight = self.forward_weight(node, offset).unwrap_or(0.0);
                let capacity = weight / distances.for_offset(offset).unwrap_or(1.0);
                graph.set_neighbor_capacity(node, offset, capacity, capacity)?;
            }
        }
        Ok(())
    }
}

impl VoxelSource for BenchVolume {
    fn seed(&self, voxel: Voxel) -> i64 {
        self.seeds[self.dims.index(voxel)]
    }

    fn image_weight(&self, voxel: Voxel, offset: Offset) -> f64 {
        let node = self.dims.index(voxel);
        self.forward_weight(node, offset)
            .or_else(|| {
                let neighbour = self.dims.neighbor(voxel, offset)?;
                self.forward_weight(self.dims.index(neighbour), offset.reversed())
            })
            .unwrap_or(0.0)
    }

    fn name(&self) -> &str {
        "bench-volume"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;
    use voxcut_core::{ExecutionMode, LabelVolume, SegmenterBuilder};

    #[rstest]
    #[case::six(Connectivity::Six)]
    #[case::twenty_six(Connectivity::TwentySix)]
    fn cached_weights_are_symmetric(#[case] connectivity: Connectivity) {
        let volume = BenchVolume::sphere(6, connectivity, 1).expect("volume builds");
        let dims = volume.dims();
        for voxel in dims.voxels() {
            for &offset in connectivity.forward_offsets() {
                let Some(neighbour) = dims.neighbor(voxel, offset) else {
                    continue;
                };
                assert_eq!(
                    volume.image_weight(voxel, offset),
                    volume.image_weight(neighbour, offset.reversed())
                );
            }
        }
    }

    #[test]
    fn direct_install_matches_segmenter_flow() {
        let volume = BenchVolume::sphere(8, Connectivity::Six, 4).expect("volume builds");
        let mut graph = GridGraph::new(volume.dims(), Connectivity::Six).expect("graph fits");
        volume.install(&mut graph, 1, 1e6).expect("capacities install");
        let direct = graph.compute_max_flow(None).expect("solve succeeds");

        let mut labels = LabelVolume::new(volume.dims());
        let summary = SegmenterBuilder::new()
            .with_execution(ExecutionMode::Serial)
            .build()
            .expect("defaults are valid")
            .segment_binary(volume.dims(), &volume, 1, &mut labels)
            .expect("segmentation succeeds");
        assert!((summary.max_flow() - direct).abs() <= 1e-9 * direct.max(1.0));
    }
}
