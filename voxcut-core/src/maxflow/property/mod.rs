//! Property-based tests for the grid max-flow solver.
//!
//! Random grid graphs are solved by the Boykov–Kolmogorov kernel and by a
//! dense Edmonds–Karp oracle. The flow values must agree, and the cut read
//! back from [`super::GridGraph::segment`] must have exactly the capacity of
//! the flow.

mod oracle;
mod strategies;
mod types;
