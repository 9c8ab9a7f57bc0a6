//! Residual storage for a voxel grid graph.

use crate::{
    execution::CancellationToken,
    grid::{Connectivity, GridDims, Offset},
};

use super::{
    GraphError, GraphResult, GridMaxFlowSolver, Segment,
    bk::{self, SearchTrees},
    check_capacity,
    topology::{GridTopology, filled},
};

/// Max-flow graph with one node per voxel of a [`GridDims`].
///
/// # Examples
/// ```
/// use voxcut_core::{Connectivity, GridDims, GridGraph, GridMaxFlowSolver, Offset, Segment};
///
/// let dims = GridDims::new(2, 1, 1)?;
/// let mut graph = GridGraph::new(dims, Connectivity::Six)?;
/// graph.set_terminal_capacity(0, 5.0, 0.0)?;
/// graph.set_terminal_capacity(1, 0.0, 5.0)?;
/// graph.set_neighbor_capacity(0, Offset::new(1, 0, 0), 2.0, 2.0)?;
/// assert_eq!(graph.compute_max_flow(None)?, 2.0);
/// assert_eq!(graph.segment(0), Segment::Source);
/// assert_eq!(graph.segment(1), Segment::Sink);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug)]
pub struct GridGraph {
    topology: GridTopology,
    residual: Vec<f64>,
    terminal: Vec<f64>,
    flow: f64,
    trees: Option<SearchTrees>,
}

/// Mutable view of a graph's capacity buffers for bulk construction.
///
/// Node `p` owns `residual[2 * F * p..2 * F * (p + 1)]`: entry `2d` is the
/// capacity towards its forward neighbour along direction `d` and `2d + 1`
/// the capacity back. `terminal[p]` is the net terminal capacity, positive
/// towards the source and negative towards the sink.
#[cfg(feature = "parallel")]
pub(crate) struct CapacityBuffers<'g> {
    pub(crate) terminal: &'g mut [f64],
    pub(crate) residual: &'g mut [f64],
    pub(crate) arcs_per_node: usize,
}

#[cfg(feature = "parallel")]
impl CapacityBuffers<'_> {
    /// Runs `fill(node, terminal, arcs)` for every node on `pool`, handing
    /// each work item `block_nodes` consecutive nodes.
    pub(crate) fn fill_blocked<E, F>(
        self,
        pool: &rayon::ThreadPool,
        block_nodes: usize,
        fill: F,
    ) -> Result<(), E>
    where
        E: Send,
        F: Fn(usize, &mut f64, &mut [f64]) -> Result<(), E> + Sync,
    {
        use rayon::prelude::*;

        let Self {
            terminal,
            residual,
            arcs_per_node,
        } = self;
        let block_nodes = block_nodes.max(1);
        let arcs_per_block = block_nodes.saturating_mul(arcs_per_node);
        let fill_node = &fill;
        pool.install(move || {
            terminal
                .par_chunks_mut(block_nodes)
                .zip(residual.par_chunks_mut(arcs_per_block))
                .enumerate()
                .try_for_each(|(block, (block_terminals, block_arcs))| {
                    let first = block * block_nodes;
                    block_terminals
                        .iter_mut()
                        .zip(block_arcs.chunks_mut(arcs_per_node))
                        .enumerate()
                        .try_for_each(|(local, (slot, arcs))| fill_node(first + local, slot, arcs))
                })
        })
    }
}

impl GridGraph {
    /// Allocates a graph with all capacities zero.
    ///
    /// # Errors
    /// Returns [`GraphError::AllocationFailed`] when the arc storage cannot be
    /// reserved.
    pub fn new(dims: GridDims, connectivity: Connectivity) -> GraphResult<Self> {
        let topology = GridTopology::new(dims, connectivity)?;
        let residual = filled(topology.arc_count(), 0.0)?;
        let terminal = filled(topology.node_count(), 0.0)?;
        Ok(Self {
            topology,
            residual,
            terminal,
            flow: 0.0,
            trees: None,
        })
    }

    /// Grid the graph is laid over.
    #[must_use]
    pub const fn dims(&self) -> GridDims {
        self.topology.dims()
    }

    /// Neighbourhood of the graph.
    #[must_use]
    pub const fn connectivity(&self) -> Connectivity {
        self.topology.connectivity()
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.topology.node_count()
    }

    /// Flow pushed so far, including the flow implied by nodes connected to
    /// both terminals.
    #[must_use]
    pub const fn flow(&self) -> f64 {
        self.flow
    }

    /// Clears every capacity and the previous solution, keeping the storage.
    pub(crate) fn reset(&mut self) {
        self.residual.fill(0.0);
        self.terminal.fill(0.0);
        self.flow = 0.0;
        self.trees = None;
    }

    #[cfg(feature = "parallel")]
    pub(crate) fn capacity_buffers(&mut self) -> CapacityBuffers<'_> {
        self.trees = None;
        CapacityBuffers {
            terminal: &mut self.terminal,
            residual: &mut self.residual,
            arcs_per_node: 2 * self.topology.directions(),
        }
    }

    fn check_node(&self, node: usize) -> GraphResult<()> {
        let nodes = self.node_count();
        if node < nodes {
            Ok(())
        } else {
            Err(GraphError::NodeOutOfRange { node, nodes })
        }
    }
}

impl GridMaxFlowSolver for GridGraph {
    fn set_terminal_capacity(&mut self, node: usize, source: f64, sink: f64) -> GraphResult<()> {
        self.check_node(node)?;
        let source = check_capacity(node, source)?;
        let sink = check_capacity(node, sink)?;
        self.terminal[node] += source - sink;
        self.flow += source.min(sink);
        self.trees = None;
        Ok(())
    }

    fn set_neighbor_capacity(
        &mut self,
        node: usize,
        offset: Offset,
        capacity: f64,
        reverse_capacity: f64,
    ) -> GraphResult<()> {
        let arc = self.topology.arc_towards(node, offset)?;
        let forward = check_capacity(node, capacity)?;
        let backward = check_capacity(node, reverse_capacity)?;
        self.residual[arc] = forward;
        self.residual[arc ^ 1] = backward;
        self.trees = None;
        Ok(())
    }

    fn compute_max_flow(&mut self, cancel: Option<&CancellationToken>) -> GraphResult<f64> {
        let (pushed, trees) = bk::solve(
            &self.topology,
            &mut self.residual,
            &mut self.terminal,
            cancel,
        )?;
        self.flow += pushed;
        self.trees = Some(trees);
        Ok(self.flow)
    }

    fn segment(&self, node: usize) -> Segment {
        self.trees
            .as_ref()
            .map_or(Segment::Source, |trees| trees.segment(node))
    }
}
