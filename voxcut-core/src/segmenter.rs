//! Segmentation orchestration.
//!
//! Provides the [`Segmenter`] entry points. Each call validates its inputs,
//! builds a transient graph over the caller's grid, solves it, resolves the
//! whole labeling and only then writes it to the caller's sink.

use std::time::Instant;

use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use crate::execution::{rows_per_block, worker_pool};
use crate::{
    Result,
    builder::SegmenterBuilder,
    construction::GridGraphBuilder,
    distance::{VoxelDistances, VoxelSpacing},
    error::SegmentationError,
    execution::{CancellationToken, ExecutionMode, Plan},
    expansion::{AlphaExpansion, LabelExpansionSolver, PottsCost},
    grid::{Connectivity, GridDims},
    labels::LabelIndexMaps,
    maxflow::{GridGraph, GridMaxFlowSolver},
    result::{BinarySegmentation, MultiLabelSegmentation},
    source::{LabelSink, VoxelSource},
    writeback::ResolvedLabels,
};

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1e3
}

/// Entry point for seeded binary and multi-label segmentation.
///
/// A segmenter is immutable configuration; every call allocates and drops
/// its own graph, so one instance can serve any number of volumes.
///
/// # Examples
/// ```
/// use voxcut_core::{CallbackSource, GridDims, LabelVolume, SegmenterBuilder, Voxel};
///
/// // Two seeds at either end of a 6-voxel line, with a weak edge in the middle.
/// let dims = GridDims::new(6, 1, 1)?;
/// let seeds = [1, 0, 0, 0, 0, 2];
/// let source = CallbackSource::new(
///     |voxel: Voxel| seeds[voxel.x],
///     |voxel: Voxel, _| if voxel.x == 2 { 0.1 } else { 1.0 },
/// );
/// let mut volume = LabelVolume::new(dims);
/// let segmenter = SegmenterBuilder::new().build()?;
/// segmenter.segment_binary(dims, &source, 1, &mut volume)?;
/// assert_eq!(volume.as_slice(), &[1, 1, 1, 0, 0, 0]);
///
/// let mut labels = LabelVolume::new(dims);
/// let summary = segmenter.segment_multilabel(dims, &source, &mut labels)?;
/// assert_eq!(labels.as_slice(), &[1, 1, 1, 2, 2, 2]);
/// assert_eq!(summary.voxels_for(2), 3);
/// # Ok::<(), voxcut_core::SegmentationError>(())
/// ```
#[derive(Clone, Debug)]
pub struct Segmenter {
    connectivity: Connectivity,
    terminal_capacity: f64,
    spacing: VoxelSpacing,
    normalized_distances: bool,
    distances: VoxelDistances,
    execution: ExecutionMode,
    plan: Plan,
    max_cycles: Option<usize>,
    cancellation: Option<CancellationToken>,
}

impl Segmenter {
    pub(crate) fn new(config: SegmenterBuilder, plan: Plan) -> Self {
        let SegmenterBuilder {
            connectivity,
            terminal_capacity,
            spacing,
            normalized_distances,
            execution,
            max_cycles,
            cancellation,
        } = config;
        Self {
            connectivity,
            terminal_capacity,
            spacing,
            normalized_distances,
            distances: VoxelDistances::from_spacing(spacing, normalized_distances),
            execution,
            plan,
            max_cycles,
            cancellation,
        }
    }

    /// Neighbourhood of every graph this segmenter builds.
    #[must_use]
    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// Capacity tying seeds to their terminal.
    #[must_use]
    pub fn terminal_capacity(&self) -> f64 {
        self.terminal_capacity
    }

    /// Physical voxel size.
    #[must_use]
    pub fn spacing(&self) -> VoxelSpacing {
        self.spacing
    }

    /// Whether neighbour distances are normalised to the space diagonal.
    #[must_use]
    pub fn normalized_distances(&self) -> bool {
        self.normalized_distances
    }

    /// Neighbour distances derived from the spacing.
    #[must_use]
    pub fn distances(&self) -> VoxelDistances {
        self.distances
    }

    /// Execution mode requested at build time.
    #[must_use]
    pub fn execution(&self) -> ExecutionMode {
        self.execution
    }

    /// Alpha-expansion pass bound.
    #[must_use]
    pub fn max_cycles(&self) -> Option<usize> {
        self.max_cycles
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancellation {
            Some(token) if token.is_cancelled() => {
                warn!("segmentation cancelled");
                Err(SegmentationError::Cancelled)
            }
            _ => Ok(()),
        }
    }

    /// Separates the `foreground` seed class from every other positive seed
    /// with one global minimum cut.
    ///
    /// Foreground voxels receive `foreground`, all others `0`. Voxels seeded
    /// `foreground` or another positive label keep their side of the cut as
    /// long as the terminal capacity dominates the neighbour capacities.
    ///
    /// # Errors
    /// Returns [`SegmentationError::InvalidForegroundLabel`] when
    /// `foreground` is not positive,
    /// [`SegmentationError::InvalidImageWeight`] for unusable affinities,
    /// [`SegmentationError::Cancelled`] when the cancellation token fires, and
    /// [`SegmentationError::Solver`] when the graph cannot be allocated or
    /// solved. On any error `sink` is never called.
    #[instrument(
        name = "core.segment_binary",
        err,
        skip(self, source, sink),
        fields(
            dims = %dims,
            voxels = dims.voxel_count(),
            connectivity = %self.connectivity,
            execution = self.plan.label(),
            source = %source.name(),
            foreground = foreground,
        ),
    )]
    pub fn segment_binary<S, K>(
        &self,
        dims: GridDims,
        source: &S,
        foreground: i64,
        sink: &mut K,
    ) -> Result<BinarySegmentation>
    where
        S: VoxelSource + Sync + ?Sized,
        K: LabelSink + ?Sized,
    {
        if foreground <= 0 {
            warn!(foreground, "foreground label must be positive");
            return Err(SegmentationError::InvalidForegroundLabel { got: foreground });
        }
        self.check_cancelled()?;

        let started = Instant::now();
        let mut graph = GridGraph::new(dims, self.connectivity)?;
        info!(nodes = graph.node_count(), "grid graph allocated");

        let builder = GridGraphBuilder::new(
            dims,
            self.connectivity,
            self.terminal_capacity,
            &self.distances,
            source,
        );
        match self.plan {
            Plan::Serial => builder.fill_binary_serial(&mut graph, foreground)?,
            #[cfg(feature = "parallel")]
            Plan::Blocked {
                threads,
                block_rows,
            } => {
                let pool = worker_pool(threads)?;
                let rows = rows_per_block(dims, threads, block_rows);
                builder.fill_binary_blocked(&mut graph, foreground, &pool, rows)?;
            }
        }
        info!(elapsed_ms = elapsed_ms(started), "capacities filled");

        let solve_started = Instant::now();
        let max_flow = graph.compute_max_flow(self.cancellation.as_ref())?;
        info!(
            max_flow,
            elapsed_ms = elapsed_ms(solve_started),
            "max-flow computed"
        );

        let resolved = ResolvedLabels::binary(dims, &graph, foreground)?;
        self.check_cancelled()?;
        resolved.deliver(sink);
        let summary = BinarySegmentation::from_labels(foreground, resolved.labels(), max_flow);
        info!(
            foreground_voxels = summary.foreground_voxels(),
            background_voxels = summary.background_voxels(),
            elapsed_ms = elapsed_ms(started),
            "binary labels written"
        );
        Ok(summary)
    }

    /// Labels every voxel with one of the observed seed labels by
    /// alpha-expansion over a Potts smoothness term.
    ///
    /// # Errors
    /// Returns [`SegmentationError::NoSeedLabels`] when the seed volume holds
    /// nothing but background, [`SegmentationError::InvalidImageWeight`] for
    /// unusable affinities, [`SegmentationError::Cancelled`] when the
    /// cancellation token fires, and [`SegmentationError::Solver`] when an
    /// expansion move fails. On any error `sink` is never called.
    #[instrument(
        name = "core.segment_multilabel",
        err,
        skip(self, source, sink),
        fields(
            dims = %dims,
            voxels = dims.voxel_count(),
            connectivity = %self.connectivity,
            execution = self.plan.label(),
            source = %source.name(),
        ),
    )]
    pub fn segment_multilabel<S, K>(
        &self,
        dims: GridDims,
        source: &S,
        sink: &mut K,
    ) -> Result<MultiLabelSegmentation>
    where
        S: VoxelSource + Sync + ?Sized,
        K: LabelSink + ?Sized,
    {
        self.check_cancelled()?;
        let started = Instant::now();

        let maps = LabelIndexMaps::scan(dims, |voxel| source.seed(voxel), true);
        if maps.is_empty() {
            warn!("seed volume holds no labels");
            return Err(SegmentationError::NoSeedLabels);
        }
        info!(labels = maps.len(), "seed labels indexed");

        let builder = GridGraphBuilder::new(
            dims,
            self.connectivity,
            self.terminal_capacity,
            &self.distances,
            source,
        );
        builder.validate_weights()?;
        let costs = builder.data_costs(&maps)?;
        let potts = PottsCost::new(dims, self.distances, source);

        #[cfg(feature = "parallel")]
        let workers = match self.plan {
            Plan::Serial => None,
            Plan::Blocked {
                threads,
                block_rows,
            } => Some((
                worker_pool(threads)?,
                rows_per_block(dims, threads, block_rows).saturating_mul(dims.x()),
            )),
        };

        let mut solver = AlphaExpansion::new(dims, self.connectivity, maps.len(), costs, &potts)?
            .with_max_cycles(self.max_cycles)
            .with_cancellation(self.cancellation.clone());
        #[cfg(feature = "parallel")]
        if let Some((pool, block_nodes)) = &workers {
            solver = solver.with_workers(pool, *block_nodes);
        }

        let report = solver.perform()?;
        info!(
            initial_energy = report.initial_energy,
            energy = report.energy,
            cycles = report.cycles,
            accepted_moves = report.accepted_moves,
            converged = report.converged,
            elapsed_ms = elapsed_ms(started),
            "alpha-expansion finished"
        );

        let resolved = ResolvedLabels::multilabel(dims, solver.labeling(), &maps)?;
        self.check_cancelled()?;
        resolved.deliver(sink);
        info!(elapsed_ms = elapsed_ms(started), "multi-label labels written");
        Ok(MultiLabelSegmentation::new(
            maps.labels(),
            resolved.labels(),
            report.initial_energy,
            report.energy,
            report.cycles,
            report.converged,
        ))
    }
}
