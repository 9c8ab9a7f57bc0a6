//! Fixture types for max-flow property tests.

use crate::grid::{Connectivity, GridDims, Offset};

/// Capacity distribution for generated graphs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum CapacityProfile {
    /// Small integer capacities, so flows compare exactly.
    Integral,
    /// Continuous capacities in `[0, 10)`.
    Fractional,
    /// Mostly zero capacities, producing many free nodes and disconnected
    /// pieces.
    Sparse,
}

/// One edge of a generated graph, addressed from its lower-index endpoint.
#[derive(Clone, Copy, Debug)]
pub(super) struct FixtureEdge {
    pub node: usize,
    pub offset: Offset,
    pub capacity: f64,
    pub reverse_capacity: f64,
}

/// Generated graph together with the parameters that produced it.
#[derive(Clone, Debug)]
pub(super) struct FlowFixture {
    pub dims: GridDims,
    pub connectivity: Connectivity,
    /// `(source, sink)` capacity per node.
    pub terminals: Vec<(f64, f64)>,
    pub edges: Vec<FixtureEdge>,
    pub profile: CapacityProfile,
}
