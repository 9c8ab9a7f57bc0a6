//! Benchmark parameter types.

use std::fmt;

use voxcut_core::{Connectivity, ExecutionMode};

/// Parameters of one segmentation benchmark run.
#[derive(Clone, Copy, Debug)]
pub struct SegmentationBenchParams {
    /// Edge length of the cubic phantom.
    pub extent: usize,
    /// Neighbourhood of the graph.
    pub connectivity: Connectivity,
    /// Scheduling of graph construction.
    pub execution: ExecutionMode,
}

impl fmt::Display for SegmentationBenchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let execution = match self.execution {
            ExecutionMode::Auto => "auto".to_owned(),
            ExecutionMode::Serial => "serial".to_owned(),
            ExecutionMode::Blocked { threads, .. } => format!("blocked{threads}"),
        };
        write!(
            f,
            "n={}^3,c={},{execution}",
            self.extent,
            self.connectivity.as_u8()
        )
    }
}

/// Parameters of a solver-only max-flow run.
#[derive(Clone, Copy, Debug)]
pub struct MaxFlowBenchParams {
    /// Edge length of the cubic grid.
    pub extent: usize,
    /// Neighbourhood of the graph.
    pub connectivity: Connectivity,
}

impl fmt::Display for MaxFlowBenchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n={}^3,c={}", self.extent, self.connectivity.as_u8())
    }
}
