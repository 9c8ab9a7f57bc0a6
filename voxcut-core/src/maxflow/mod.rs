//! Minimum cut / maximum flow over voxel grid graphs.
//!
//! [`GridGraph`] stores one node per voxel and one residual pair per
//! undirected neighbour edge. Arcs are never stored in adjacency lists: the
//! arc id of the edge leaving node `p` along forward direction `d` is
//! `2 * (p * F + d)`, its reverse is the next id, and both endpoints are
//! recovered with stride arithmetic. The solver is a Boykov–Kolmogorov
//! augmenting-path kernel with two search trees and orphan adoption.

mod bk;
mod graph;
mod topology;

#[cfg(test)]
mod property;

use std::sync::Arc;

use thiserror::Error;

use crate::{
    error::{SegmentationError, define_error_codes},
    execution::CancellationToken,
    grid::{Connectivity, Offset},
};

pub use self::graph::GridGraph;

/// Side of the minimum cut a node ends up on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Reachable from the source in the residual graph, or in neither tree.
    Source,
    /// Connected to the sink in the residual graph.
    Sink,
}

/// Incremental interface to a max-flow solver laid over a voxel grid.
///
/// Capacities are installed node by node, the flow is computed once, and the
/// resulting cut is read back per node.
pub trait GridMaxFlowSolver {
    /// Installs terminal capacities for `node`.
    ///
    /// Intended to be called at most once per node; repeated calls add to the
    /// capacities already installed.
    ///
    /// # Errors
    /// Returns [`GraphError::NodeOutOfRange`] or
    /// [`GraphError::InvalidCapacity`].
    fn set_terminal_capacity(&mut self, node: usize, source: f64, sink: f64) -> GraphResult<()>;

    /// Installs the capacity of the edge from `node` to its neighbour at
    /// `offset`, and of the opposite direction.
    ///
    /// Replaces any capacity previously set on the same edge.
    ///
    /// # Errors
    /// Returns [`GraphError::OffsetNotInTopology`] when `offset` is not part
    /// of the graph's neighbourhood, [`GraphError::NeighborOutOfBounds`] when
    /// the neighbour falls outside the grid, and the errors of
    /// [`Self::set_terminal_capacity`].
    fn set_neighbor_capacity(
        &mut self,
        node: usize,
        offset: Offset,
        capacity: f64,
        reverse_capacity: f64,
    ) -> GraphResult<()>;

    /// Pushes the maximum flow and returns its value.
    ///
    /// # Errors
    /// Returns [`GraphError::Cancelled`] when `cancel` fires mid-solve and
    /// [`GraphError::AllocationFailed`] when search state cannot be allocated.
    fn compute_max_flow(&mut self, cancel: Option<&CancellationToken>) -> GraphResult<f64>;

    /// Side of the cut `node` lies on after [`Self::compute_max_flow`].
    ///
    /// Nodes outside the graph report [`Segment::Source`].
    fn segment(&self, node: usize) -> Segment;
}

/// Errors raised while building or solving a grid graph.
#[derive(Clone, Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum GraphError {
    /// A node id was outside `0..nodes`.
    #[error("node {node} is out of range for a graph of {nodes} nodes")]
    NodeOutOfRange {
        /// Offending node id.
        node: usize,
        /// Number of nodes in the graph.
        nodes: usize,
    },
    /// The offset is not a neighbour direction of the graph's topology.
    #[error("offset {offset} is not a {connectivity} neighbour")]
    OffsetNotInTopology {
        /// Offending offset.
        offset: Offset,
        /// Topology of the graph.
        connectivity: Connectivity,
    },
    /// The neighbour at `offset` lies outside the grid.
    #[error("neighbour of node {node} at {offset} lies outside the grid")]
    NeighborOutOfBounds {
        /// Node whose neighbour was requested.
        node: usize,
        /// Offset of the neighbour.
        offset: Offset,
    },
    /// Capacities must be finite and non-negative.
    #[error("capacity {capacity} at node {node} must be finite and non-negative")]
    InvalidCapacity {
        /// Node the capacity belongs to.
        node: usize,
        /// Rejected capacity.
        capacity: f64,
    },
    /// Graph storage could not be allocated.
    #[error("failed to allocate {elements} graph elements")]
    AllocationFailed {
        /// Number of elements requested.
        elements: usize,
    },
    /// The solve observed its cancellation token.
    #[error("max-flow computation was cancelled")]
    Cancelled,
}

define_error_codes! {
    /// Stable codes describing [`GraphError`] variants.
    enum GraphErrorCode for GraphError {
        /// A node id was out of range.
        NodeOutOfRange => NodeOutOfRange { .. } => "GRAPH_NODE_OUT_OF_RANGE",
        /// The offset is not part of the topology.
        OffsetNotInTopology => OffsetNotInTopology { .. } => "GRAPH_OFFSET_NOT_IN_TOPOLOGY",
        /// The neighbour lies outside the grid.
        NeighborOutOfBounds => NeighborOutOfBounds { .. } => "GRAPH_NEIGHBOR_OUT_OF_BOUNDS",
        /// A capacity was negative or not finite.
        InvalidCapacity => InvalidCapacity { .. } => "GRAPH_INVALID_CAPACITY",
        /// Graph storage could not be allocated.
        AllocationFailed => AllocationFailed { .. } => "GRAPH_ALLOCATION_FAILED",
        /// The solve was cancelled.
        Cancelled => Cancelled => "GRAPH_CANCELLED",
    }
}

/// Result alias for graph operations.
pub type GraphResult<T> = core::result::Result<T, GraphError>;

impl From<GraphError> for SegmentationError {
    fn from(error: GraphError) -> Self {
        match error {
            GraphError::Cancelled => Self::Cancelled,
            other => Self::Solver {
                code: Arc::from(other.code().as_str()),
                message: Arc::from(other.to_string()),
            },
        }
    }
}

/// Validates a capacity before it enters the residual graph.
pub(crate) fn check_capacity(node: usize, capacity: f64) -> GraphResult<f64> {
    if capacity.is_finite() && capacity >= 0.0 {
        Ok(capacity)
    } else {
        Err(GraphError::InvalidCapacity { node, capacity })
    }
}
