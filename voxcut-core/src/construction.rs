//! Graph construction from seeds, image affinities and voxel distances.
//!
//! Terminal links come from seed membership and neighbour links from
//! `image_weight / distance`. The serial path drives the incremental
//! [`GridMaxFlowSolver`] setters; the blocked path writes the flat capacity
//! buffers of a [`GridGraph`] directly, one row block per work item.

#[cfg(feature = "parallel")]
use tracing::debug;
use tracing::warn;

use crate::{
    distance::VoxelDistances,
    error::{Result, SegmentationError},
    grid::{Connectivity, GridDims, Voxel},
    labels::LabelIndexMaps,
    maxflow::{GridGraph, GridMaxFlowSolver},
    source::VoxelSource,
};

/// Builds binary graphs and multi-label data costs for one call.
pub(crate) struct GridGraphBuilder<'a, S: ?Sized> {
    dims: GridDims,
    connectivity: Connectivity,
    terminal_capacity: f64,
    distances: Vec<f64>,
    source: &'a S,
}

/// Terminal link of a seeded voxel in the binary problem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Terminal {
    Foreground,
    Background,
    Free,
}

impl<'a, S> GridGraphBuilder<'a, S>
where
    S: VoxelSource + Sync + ?Sized,
{
    pub(crate) fn new(
        dims: GridDims,
        connectivity: Connectivity,
        terminal_capacity: f64,
        distances: &VoxelDistances,
        source: &'a S,
    ) -> Self {
        Self {
            dims,
            connectivity,
            terminal_capacity,
            distances: distances.forward(connectivity),
            source,
        }
    }

    fn terminal(&self, voxel: Voxel, foreground: i64) -> Terminal {
        match self.source.seed(voxel) {
            seed if seed == foreground => Terminal::Foreground,
            seed if seed > 0 => Terminal::Background,
            _ => Terminal::Free,
        }
    }

    /// Capacity of the edge from `voxel` along forward `direction`.
    fn edge_capacity(&self, voxel: Voxel, direction: usize) -> Result<f64> {
        let offset = self.connectivity.forward_offsets()[direction];
        let weight = self.source.image_weight(voxel, offset);
        if !(weight.is_finite() && weight >= 0.0) {
            warn!(%voxel, %offset, weight, "image weight rejected");
            return Err(SegmentationError::InvalidImageWeight {
                voxel,
                offset,
                weight,
            });
        }
        Ok(weight / self.distances[direction])
    }

    /// Fills `graph` through the incremental solver interface.
    pub(crate) fn fill_binary_serial(&self, graph: &mut GridGraph, foreground: i64) -> Result<()> {
        let dims = self.dims;
        let capacity = self.terminal_capacity;
        for voxel in dims.voxels() {
            let node = dims.index(voxel);
            match self.terminal(voxel, foreground) {
                Terminal::Foreground => graph.set_terminal_capacity(node, 0.0, capacity)?,
                Terminal::Background => graph.set_terminal_capacity(node, capacity, 0.0)?,
                Terminal::Free => {}
            }
            for (direction, &offset) in self.connectivity.forward_offsets().iter().enumerate() {
                if dims.neighbor(voxel, offset).is_none() {
                    continue;
                }
                let weight = self.edge_capacity(voxel, direction)?;
                graph.set_neighbor_capacity(node, offset, weight, weight)?;
            }
        }
        Ok(())
    }

    /// Fills `graph`'s capacity buffers on `pool`, `rows` grid rows per
    /// work item.
    #[cfg(feature = "parallel")]
    pub(crate) fn fill_binary_blocked(
        &self,
        graph: &mut GridGraph,
        foreground: i64,
        pool: &rayon::ThreadPool,
        rows: usize,
    ) -> Result<()> {
        let block_nodes = rows.max(1).saturating_mul(self.dims.x());
        debug!(
            block_nodes,
            threads = pool.current_num_threads(),
            "filling capacities in blocks"
        );
        graph
            .capacity_buffers()
            .fill_blocked(pool, block_nodes, |node, terminal, arcs| {
                self.fill_node(node, foreground, terminal, arcs)
            })
    }

    #[cfg(feature = "parallel")]
    fn fill_node(
        &self,
        node: usize,
        foreground: i64,
        terminal: &mut f64,
        arcs: &mut [f64],
    ) -> Result<()> {
        let voxel = self.dims.voxel(node);
        *terminal = match self.terminal(voxel, foreground) {
            Terminal::Foreground => -self.terminal_capacity,
            Terminal::Background => self.terminal_capacity,
            Terminal::Free => 0.0,
        };
        for (direction, &offset) in self.connectivity.forward_offsets().iter().enumerate() {
            if self.dims.neighbor(voxel, offset).is_none() {
                continue;
            }
            let weight = self.edge_capacity(voxel, direction)?;
            arcs[2 * direction] = weight;
            arcs[2 * direction + 1] = weight;
        }
        Ok(())
    }

    /// Flat node-major data costs: `0` where the seed equals the label and
    /// the terminal capacity everywhere else.
    pub(crate) fn data_costs(&self, labels: &LabelIndexMaps) -> Result<Vec<f64>> {
        let label_count = labels.len();
        let too_large = || SegmentationError::GridTooLarge {
            x: self.dims.x(),
            y: self.dims.y(),
            z: self.dims.z(),
        };
        let len = self
            .dims
            .voxel_count()
            .checked_mul(label_count)
            .ok_or_else(too_large)?;
        let mut costs = Vec::new();
        costs.try_reserve_exact(len).map_err(|_| too_large())?;
        for voxel in self.dims.voxels() {
            let seeded = labels.index_of(self.source.seed(voxel));
            costs.extend((0..label_count).map(|label| {
                if seeded == Some(label) {
                    0.0
                } else {
                    self.terminal_capacity
                }
            }));
        }
        Ok(costs)
    }

    /// Checks every neighbour affinity once before the smoothness terms are
    /// evaluated lazily.
    pub(crate) fn validate_weights(&self) -> Result<()> {
        for voxel in self.dims.voxels() {
            for (direction, &offset) in self.connectivity.forward_offsets().iter().enumerate() {
                if self.dims.neighbor(voxel, offset).is_some() {
                    self.edge_capacity(voxel, direction)?;
                }
            }
        }
        Ok(())
    }
}
