//! Multi-label segmentation by alpha-expansion.
//!
//! Each expansion move asks every voxel whether it should switch to a single
//! label `alpha` and answers with one binary min-cut on a [`GridGraph`]. Moves
//! are repeated over all labels until a whole pass fails to lower the energy
//!
//! ```text
//! E(l) = sum_p D_p(l_p) + sum_(p,q) V_pq(l_p, l_q)
//! ```
//!
//! The result is a local optimum within one expansion move of every labeling
//! reachable by a single move.
//!
//! [`GridGraph`]: crate::GridGraph

mod alpha;
mod potts;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use thiserror::Error;

use crate::{
    error::{SegmentationError, define_error_codes},
    maxflow::GraphError,
};

pub use self::{alpha::AlphaExpansion, potts::PottsCost};

/// Smoothness term between two neighbouring nodes.
///
/// Node ids are linear voxel indices and labels are dense label indices. The
/// solver always calls with `node < neighbour`.
pub trait PairwiseCost {
    /// Cost of labelling `node` with `node_label` and `neighbour` with
    /// `neighbour_label`.
    fn cost(&self, node: usize, neighbour: usize, node_label: usize, neighbour_label: usize)
    -> f64;
}

/// Iterative multi-label solver driven by repeated binary moves.
pub trait LabelExpansionSolver {
    /// Runs moves until convergence or the configured pass bound.
    ///
    /// # Errors
    /// Returns [`ExpansionError`] when a cost is unusable, a pairwise term is
    /// not a metric, the max-flow graph fails, or the run is cancelled.
    fn perform(&mut self) -> Result<ExpansionReport, ExpansionError>;

    /// Current dense label index of every node.
    fn labeling(&self) -> &[usize];
}

/// Summary of an expansion run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExpansionReport {
    /// Energy of the initial per-voxel argmin labeling.
    pub initial_energy: f64,
    /// Energy of the final labeling.
    pub energy: f64,
    /// Number of passes over all labels.
    pub cycles: usize,
    /// Number of moves that changed at least one voxel.
    pub accepted_moves: usize,
    /// `true` when the last pass produced no strict energy decrease.
    pub converged: bool,
}

/// Errors raised by [`AlphaExpansion`].
#[derive(Clone, Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum ExpansionError {
    /// The data-cost array does not hold one row of costs per node.
    #[error("data costs hold {got} entries, expected {expected}")]
    DataCostLayout {
        /// `nodes * labels`.
        expected: usize,
        /// Length supplied.
        got: usize,
    },
    /// At least one label is required.
    #[error("alpha-expansion needs at least one label")]
    NoLabels,
    /// Data costs must be finite and non-negative.
    #[error("data cost {cost} of label {label} at node {node} must be finite and non-negative")]
    InvalidDataCost {
        /// Node the cost belongs to.
        node: usize,
        /// Dense label index.
        label: usize,
        /// Rejected cost.
        cost: f64,
    },
    /// Pairwise costs must be finite and non-negative.
    #[error("pairwise cost {cost} between nodes {node} and {neighbour} must be finite and non-negative")]
    InvalidPairwiseCost {
        /// Lower node of the pair.
        node: usize,
        /// Higher node of the pair.
        neighbour: usize,
        /// Rejected cost.
        cost: f64,
    },
    /// The pairwise term violates `V(a, alpha) + V(alpha, b) >= V(a, b) + V(alpha, alpha)`.
    #[error("pairwise cost between nodes {node} and {neighbour} is not a metric for label {alpha} (short by {excess})")]
    NonMetricPairwise {
        /// Lower node of the pair.
        node: usize,
        /// Higher node of the pair.
        neighbour: usize,
        /// Expansion label of the failing move.
        alpha: usize,
        /// Amount by which the inequality fails.
        excess: f64,
    },
    /// The move graph could not be built or solved.
    #[error("expansion move failed: {0}")]
    Graph(#[source] GraphError),
    /// The run observed its cancellation token.
    #[error("alpha-expansion was cancelled")]
    Cancelled,
}

define_error_codes! {
    /// Stable codes describing [`ExpansionError`] variants.
    enum ExpansionErrorCode for ExpansionError {
        /// The data-cost array has the wrong length.
        DataCostLayout => DataCostLayout { .. } => "EXPANSION_DATA_COST_LAYOUT",
        /// No labels were supplied.
        NoLabels => NoLabels => "EXPANSION_NO_LABELS",
        /// A data cost was negative or not finite.
        InvalidDataCost => InvalidDataCost { .. } => "EXPANSION_INVALID_DATA_COST",
        /// A pairwise cost was negative or not finite.
        InvalidPairwiseCost => InvalidPairwiseCost { .. } => "EXPANSION_INVALID_PAIRWISE_COST",
        /// A pairwise term is not a metric.
        NonMetricPairwise => NonMetricPairwise { .. } => "EXPANSION_NON_METRIC_PAIRWISE",
        /// The move graph failed.
        Graph => Graph { .. } => "EXPANSION_GRAPH",
        /// The run was cancelled.
        Cancelled => Cancelled => "EXPANSION_CANCELLED",
    }
}

impl From<GraphError> for ExpansionError {
    fn from(error: GraphError) -> Self {
        match error {
            GraphError::Cancelled => Self::Cancelled,
            other => Self::Graph(other),
        }
    }
}

impl From<ExpansionError> for SegmentationError {
    fn from(error: ExpansionError) -> Self {
        match error {
            ExpansionError::Cancelled => Self::Cancelled,
            ExpansionError::Graph(inner) => inner.into(),
            other => Self::Solver {
                code: Arc::from(other.code().as_str()),
                message: Arc::from(other.to_string()),
            },
        }
    }
}
