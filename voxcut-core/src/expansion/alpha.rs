//! Alpha-expansion moves over a grid graph.

use tracing::debug;

use crate::{
    execution::CancellationToken,
    grid::{Connectivity, GridDims, Offset},
    maxflow::{GridGraph, GridMaxFlowSolver, Segment},
};

use super::{ExpansionError, ExpansionReport, LabelExpansionSolver, PairwiseCost};

/// Energy decrease a pass must achieve to count as an improvement.
const IMPROVEMENT_EPSILON: f64 = 1e-9;

/// Relative slack allowed on the metric inequality before a move fails.
const METRIC_TOLERANCE: f64 = 1e-9;

/// Nodes summed per partial when evaluating energies.
const ENERGY_CHUNK: usize = 4096;

/// Dedicated pool and block size for blocked execution.
#[cfg(feature = "parallel")]
#[derive(Clone, Copy, Debug)]
struct Workers<'a> {
    pool: &'a rayon::ThreadPool,
    block_nodes: usize,
}

/// Alpha-expansion over flat data costs and a lazily evaluated smoothness
/// term.
///
/// `data_costs` is node-major: the cost of label `l` at node `p` lives at
/// `p * labels + l`.
///
/// # Examples
/// ```
/// use voxcut_core::{
///     AlphaExpansion, Connectivity, GridDims, LabelExpansionSolver, PairwiseCost,
/// };
///
/// struct Potts(f64);
///
/// impl PairwiseCost for Potts {
///     fn cost(&self, _: usize, _: usize, a: usize, b: usize) -> f64 {
///         if a == b { 0.0 } else { self.0 }
///     }
/// }
///
/// let dims = GridDims::new(3, 1, 1)?;
/// // Left voxel prefers label 0, right voxel prefers label 1, middle is free.
/// let costs = vec![0.0, 9.0, 1.0, 1.0, 9.0, 0.0];
/// let potts = Potts(0.5);
/// let mut solver = AlphaExpansion::new(dims, Connectivity::Six, 2, costs, &potts)?;
/// let report = solver.perform()?;
/// assert_eq!(solver.labeling()[0], 0);
/// assert_eq!(solver.labeling()[2], 1);
/// assert!((report.energy - 1.5).abs() < 1e-12);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct AlphaExpansion<'a, P: ?Sized> {
    dims: GridDims,
    connectivity: Connectivity,
    label_count: usize,
    data_costs: Vec<f64>,
    pairwise: &'a P,
    labeling: Vec<usize>,
    max_cycles: Option<usize>,
    cancel: Option<CancellationToken>,
    #[cfg(feature = "parallel")]
    workers: Option<Workers<'a>>,
}

impl<'a, P> AlphaExpansion<'a, P>
where
    P: PairwiseCost + Sync + ?Sized,
{
    /// Validates the data costs and seeds the labeling with the per-node
    /// argmin, preferring the lowest label index on ties.
    ///
    /// # Errors
    /// Returns [`ExpansionError::NoLabels`] when `label_count` is zero,
    /// [`ExpansionError::DataCostLayout`] when `data_costs` does not hold
    /// `nodes * label_count` entries, and [`ExpansionError::InvalidDataCost`]
    /// for negative or non-finite costs.
    pub fn new(
        dims: GridDims,
        connectivity: Connectivity,
        label_count: usize,
        data_costs: Vec<f64>,
        pairwise: &'a P,
    ) -> Result<Self, ExpansionError> {
        if label_count == 0 {
            return Err(ExpansionError::NoLabels);
        }
        let expected = dims.voxel_count().saturating_mul(label_count);
        if data_costs.len() != expected {
            return Err(ExpansionError::DataCostLayout {
                expected,
                got: data_costs.len(),
            });
        }
        if let Some((index, &cost)) = data_costs
            .iter()
            .enumerate()
            .find(|(_, cost)| !(cost.is_finite() && **cost >= 0.0))
        {
            return Err(ExpansionError::InvalidDataCost {
                node: index / label_count,
                label: index % label_count,
                cost,
            });
        }
        let labeling = data_costs
            .chunks_exact(label_count)
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f64::INFINITY), |best, (label, &cost)| {
                        if cost < best.1 { (label, cost) } else { best }
                    })
                    .0
            })
            .collect();
        Ok(Self {
            dims,
            connectivity,
            label_count,
            data_costs,
            pairwise,
            labeling,
            max_cycles: None,
            cancel: None,
            #[cfg(feature = "parallel")]
            workers: None,
        })
    }

    /// Stops after `cycles` passes over all labels even if the energy is
    /// still decreasing.
    #[must_use]
    pub fn with_max_cycles(mut self, cycles: Option<usize>) -> Self {
        self.max_cycles = cycles;
        self
    }

    /// Polls `token` between moves and inside every max-flow solve.
    #[must_use]
    pub fn with_cancellation(mut self, token: Option<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    /// Builds move capacities and evaluates energies on `pool`, `block_nodes`
    /// nodes per work item.
    #[cfg(feature = "parallel")]
    #[must_use]
    pub(crate) fn with_workers(mut self, pool: &'a rayon::ThreadPool, block_nodes: usize) -> Self {
        self.workers = Some(Workers {
            pool,
            block_nodes: block_nodes.max(1),
        });
        self
    }

    /// Number of dense labels.
    #[must_use]
    pub const fn label_count(&self) -> usize {
        self.label_count
    }

    /// Total energy of the current labeling.
    ///
    /// # Errors
    /// Returns [`ExpansionError::InvalidPairwiseCost`] when the smoothness
    /// term yields an unusable value.
    pub fn energy(&self) -> Result<f64, ExpansionError> {
        self.chunked_sum(self.dims.voxel_count(), |node| {
            let label = self.labeling[node];
            let mut total = self.data_cost(node, label);
            for &offset in self.connectivity.forward_offsets() {
                if let Some(neighbour) = self.neighbour(node, offset) {
                    total += self.pair(node, neighbour, label, self.labeling[neighbour])?;
                }
            }
            Ok(total)
        })
    }

    fn data_cost(&self, node: usize, label: usize) -> f64 {
        self.data_costs[node * self.label_count + label]
    }

    fn neighbour(&self, node: usize, offset: Offset) -> Option<usize> {
        self.dims
            .neighbor(self.dims.voxel(node), offset)
            .map(|voxel| self.dims.index(voxel))
    }

    /// Validated smoothness cost with the lower node first.
    fn pair(
        &self,
        node: usize,
        neighbour: usize,
        node_label: usize,
        neighbour_label: usize,
    ) -> Result<f64, ExpansionError> {
        let (low, high, low_label, high_label) = if node < neighbour {
            (node, neighbour, node_label, neighbour_label)
        } else {
            (neighbour, node, neighbour_label, node_label)
        };
        let cost = self.pairwise.cost(low, high, low_label, high_label);
        if cost.is_finite() && cost >= 0.0 {
            Ok(cost)
        } else {
            Err(ExpansionError::InvalidPairwiseCost {
                node: low,
                neighbour: high,
                cost,
            })
        }
    }

    /// Terminal and arc capacities of `node` in the move towards `alpha`.
    ///
    /// `x_p = 1` means switching to `alpha` and lands on the sink side. For
    /// an edge `(p, q)` with `A = V(l_p, l_q)`, `B = V(l_p, alpha)`,
    /// `C = V(alpha, l_q)` and `D = V(alpha, alpha)`, node `p` collects
    /// `C - A`, node `q` collects `D - C` and the arc `p -> q` carries
    /// `B + C - A - D`. Writes forward arc slots into `arcs` and returns the
    /// net terminal capacity, positive towards the source.
    fn node_capacities(
        &self,
        node: usize,
        alpha: usize,
        arcs: &mut [f64],
    ) -> Result<f64, ExpansionError> {
        let label = self.labeling[node];
        let mut unary = self.data_cost(node, alpha) - self.data_cost(node, label);
        for (direction, &offset) in self.connectivity.forward_offsets().iter().enumerate() {
            if let Some(neighbour) = self.neighbour(node, offset) {
                let other = self.labeling[neighbour];
                let a = self.pair(node, neighbour, label, other)?;
                let b = self.pair(node, neighbour, label, alpha)?;
                let c = self.pair(node, neighbour, alpha, other)?;
                let d = self.pair(node, neighbour, alpha, alpha)?;
                unary += c - a;
                arcs[2 * direction] = metric_capacity(node, neighbour, alpha, a, b, c, d)?;
                arcs[2 * direction + 1] = 0.0;
            }
            if let Some(previous) = self.neighbour(node, offset.reversed()) {
                let c = self.pair(previous, node, alpha, label)?;
                let d = self.pair(previous, node, alpha, alpha)?;
                unary += d - c;
            }
        }
        Ok(unary)
    }

    /// Installs the move towards `alpha` into `graph`.
    fn build_move(&self, graph: &mut GridGraph, alpha: usize) -> Result<(), ExpansionError> {
        graph.reset();
        #[cfg(feature = "parallel")]
        if let Some(workers) = self.workers {
            return graph.capacity_buffers().fill_blocked(
                workers.pool,
                workers.block_nodes,
                |node, terminal, arcs| {
                    *terminal = self.node_capacities(node, alpha, arcs)?;
                    Ok(())
                },
            );
        }
        let offsets = self.connectivity.forward_offsets();
        let mut arcs = vec![0.0; 2 * offsets.len()];
        for node in 0..self.dims.voxel_count() {
            arcs.fill(0.0);
            let unary = self.node_capacities(node, alpha, &mut arcs)?;
            graph.set_terminal_capacity(node, unary.max(0.0), (-unary).max(0.0))?;
            for (direction, &offset) in offsets.iter().enumerate() {
                if self.neighbour(node, offset).is_some() {
                    graph.set_neighbor_capacity(
                        node,
                        offset,
                        arcs[2 * direction],
                        arcs[2 * direction + 1],
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Energy change of switching every node in `moving` to `alpha`.
    ///
    /// Only terms touching a switched node change; an edge between two
    /// switched nodes is counted once, from its lower end.
    fn switch_delta(
        &self,
        switched: &[usize],
        moving: &[bool],
        alpha: usize,
    ) -> Result<f64, ExpansionError> {
        self.chunked_sum(switched.len(), |position| {
            let node = switched[position];
            let label = self.labeling[node];
            let mut delta = self.data_cost(node, alpha) - self.data_cost(node, label);
            for &forward in self.connectivity.forward_offsets() {
                for offset in [forward, forward.reversed()] {
                    let Some(neighbour) = self.neighbour(node, offset) else {
                        continue;
                    };
                    if moving[neighbour] && neighbour < node {
                        continue;
                    }
                    let other = self.labeling[neighbour];
                    let next = if moving[neighbour] { alpha } else { other };
                    delta += self.pair(node, neighbour, alpha, next)?
                        - self.pair(node, neighbour, label, other)?;
                }
            }
            Ok(delta)
        })
    }

    /// Sums `term(i)` over `0..len` in fixed chunks, so the rounding is the
    /// same whether chunks run serially or on the worker pool.
    fn chunked_sum<F>(&self, len: usize, term: F) -> Result<f64, ExpansionError>
    where
        F: Fn(usize) -> Result<f64, ExpansionError> + Sync,
    {
        let partial = |chunk: usize| -> Result<f64, ExpansionError> {
            let start = chunk * ENERGY_CHUNK;
            let end = len.min(start + ENERGY_CHUNK);
            (start..end).try_fold(0.0, |acc, index| Ok(acc + term(index)?))
        };
        let chunks = len.div_ceil(ENERGY_CHUNK);
        #[cfg(feature = "parallel")]
        if let Some(workers) = self.workers {
            use rayon::prelude::*;

            let partials = workers.pool.install(|| {
                (0..chunks)
                    .into_par_iter()
                    .map(partial)
                    .collect::<Result<Vec<f64>, _>>()
            })?;
            return Ok(partials.iter().sum());
        }
        let partials = (0..chunks).map(partial).collect::<Result<Vec<f64>, _>>()?;
        Ok(partials.iter().sum())
    }

    fn check_cancelled(&self) -> Result<(), ExpansionError> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(ExpansionError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Runs one expansion move and returns the applied energy change, or
    /// `None` when the move was rejected or changed nothing.
    fn expand(&mut self, graph: &mut GridGraph, alpha: usize) -> Result<Option<f64>, ExpansionError> {
        self.build_move(graph, alpha)?;
        graph.compute_max_flow(self.cancel.as_ref())?;
        let mut moving = vec![false; self.dims.voxel_count()];
        let mut switched = Vec::new();
        for (node, flag) in moving.iter_mut().enumerate() {
            if self.labeling[node] != alpha && graph.segment(node) == Segment::Sink {
                *flag = true;
                switched.push(node);
            }
        }
        if switched.is_empty() {
            return Ok(None);
        }
        let delta = self.switch_delta(&switched, &moving, alpha)?;
        if delta > 0.0 {
            return Ok(None);
        }
        for node in switched {
            self.labeling[node] = alpha;
        }
        Ok(Some(delta))
    }
}

/// Arc capacity `B + C - A - D`, failing when the term is not a metric.
fn metric_capacity(
    node: usize,
    neighbour: usize,
    alpha: usize,
    a: f64,
    b: f64,
    c: f64,
    d: f64,
) -> Result<f64, ExpansionError> {
    let capacity = b + c - a - d;
    if capacity >= 0.0 {
        return Ok(capacity);
    }
    let scale = (a + b + c + d).max(1.0);
    if -capacity <= METRIC_TOLERANCE * scale {
        Ok(0.0)
    } else {
        Err(ExpansionError::NonMetricPairwise {
            node,
            neighbour,
            alpha,
            excess: -capacity,
        })
    }
}

impl<P> LabelExpansionSolver for AlphaExpansion<'_, P>
where
    P: PairwiseCost + Sync + ?Sized,
{
    fn perform(&mut self) -> Result<ExpansionReport, ExpansionError> {
        let initial_energy = self.energy()?;
        let mut graph = GridGraph::new(self.dims, self.connectivity)?;
        let mut energy = initial_energy;
        let mut cycles = 0;
        let mut accepted_moves = 0;
        let mut converged = false;
        while self.max_cycles.is_none_or(|limit| cycles < limit) {
            cycles += 1;
            let mut improved = false;
            for alpha in 0..self.label_count {
                self.check_cancelled()?;
                if let Some(delta) = self.expand(&mut graph, alpha)? {
                    accepted_moves += 1;
                    energy += delta;
                    improved |= delta < -IMPROVEMENT_EPSILON;
                }
            }
            debug!(cycle = cycles, energy, accepted_moves, "expansion pass complete");
            if !improved {
                converged = true;
                break;
            }
        }
        Ok(ExpansionReport {
            initial_energy,
            energy: self.energy()?,
            cycles,
            accepted_moves,
            converged,
        })
    }

    fn labeling(&self) -> &[usize] {
        &self.labeling
    }
}
