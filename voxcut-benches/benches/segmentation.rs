//! Segmentation benchmarks.
//!
//! Times the three stages a caller pays for: a full binary segmentation
//! (graph construction plus max-flow) under each execution mode, the
//! max-flow solve alone on a pre-installed graph, and multi-label
//! alpha-expansion.
#![expect(
    missing_docs,
    reason = "Criterion macros generate items without doc comments"
)]

use std::num::NonZeroUsize;

use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};

use voxcut_benches::{
    error::BenchSetupError,
    params::{MaxFlowBenchParams, SegmentationBenchParams},
    volume::BenchVolume,
};
use voxcut_core::{
    Connectivity, DEFAULT_TERMINAL_CAPACITY, ExecutionMode, GridGraph, GridMaxFlowSolver,
    LabelVolume, SegmenterBuilder,
};

/// Seed used for all phantom noise in this benchmark.
const SEED: u64 = 42;

/// Cube edge lengths to benchmark.
const EXTENTS: &[usize] = &[16, 32, 48];

/// Worker count for blocked runs.
const THREADS: usize = 4;

fn execution_modes(connectivity: Connectivity) -> Vec<ExecutionMode> {
    let mut modes = vec![ExecutionMode::Serial];
    if connectivity == Connectivity::Six
        && let Some(threads) = NonZeroUsize::new(THREADS)
    {
        modes.push(ExecutionMode::blocked(threads));
    }
    modes
}

fn binary_segmentation_impl(c: &mut Criterion) -> Result<(), BenchSetupError> {
    let mut group = c.benchmark_group("binary_segmentation");
    group.sample_size(10);

    for &extent in EXTENTS {
        for connectivity in [Connectivity::Six, Connectivity::TwentySix] {
            let volume = BenchVolume::sphere(extent, connectivity, SEED)?;
            for execution in execution_modes(connectivity) {
                let segmenter = SegmenterBuilder::new()
                    .with_connectivity(connectivity)
                    .with_execution(execution)
                    .build()?;
                let params = SegmentationBenchParams {
                    extent,
                    connectivity,
                    execution,
                };
                group.bench_with_input(BenchmarkId::from_parameter(params), &volume, |b, input| {
                    b.iter_batched_ref(
                        || LabelVolume::new(input.dims()),
                        |labels| segmenter.segment_binary(input.dims(), input, 1, labels),
                        BatchSize::LargeInput,
                    );
                });
            }
        }
    }

    group.finish();
    Ok(())
}

fn max_flow_impl(c: &mut Criterion) -> Result<(), BenchSetupError> {
    let mut group = c.benchmark_group("max_flow");
    group.sample_size(10);

    for &extent in EXTENTS {
        for connectivity in [Connectivity::Six, Connectivity::TwentySix] {
            let volume = BenchVolume::sphere(extent, connectivity, SEED)?;
            let mut template = GridGraph::new(volume.dims(), connectivity)?;
            volume.install(&mut template, 1, DEFAULT_TERMINAL_CAPACITY)?;
            let params = MaxFlowBenchParams {
                extent,
                connectivity,
            };
            group.bench_with_input(BenchmarkId::from_parameter(params), &template, |b, graph| {
                b.iter_batched_ref(
                    || graph.clone(),
                    |solver| solver.compute_max_flow(None),
                    BatchSize::LargeInput,
                );
            });
        }
    }

    group.finish();
    Ok(())
}

fn alpha_expansion_impl(c: &mut Criterion) -> Result<(), BenchSetupError> {
    let mut group = c.benchmark_group("alpha_expansion");
    group.sample_size(10);

    for &extent in &EXTENTS[..2] {
        let connectivity = Connectivity::Six;
        let volume = BenchVolume::sphere_pair(extent, connectivity, SEED)?;
        for execution in execution_modes(connectivity) {
            let segmenter = SegmenterBuilder::new()
                .with_connectivity(connectivity)
                .with_execution(execution)
                .build()?;
            let params = SegmentationBenchParams {
                extent,
                connectivity,
                execution,
            };
            group.bench_with_input(BenchmarkId::from_parameter(params), &volume, |b, input| {
                b.iter_batched_ref(
                    || LabelVolume::new(input.dims()),
                    |labels| segmenter.segment_multilabel(input.dims(), input, labels),
                    BatchSize::LargeInput,
                );
            });
        }
    }

    group.finish();
    Ok(())
}

fn binary_segmentation(c: &mut Criterion) {
    if let Err(err) = binary_segmentation_impl(c) {
        panic!("binary_segmentation benchmark setup failed: {err}");
    }
}

fn max_flow(c: &mut Criterion) {
    if let Err(err) = max_flow_impl(c) {
        panic!("max_flow benchmark setup failed: {err}");
    }
}

fn alpha_expansion(c: &mut Criterion) {
    if let Err(err) = alpha_expansion_impl(c) {
        panic!("alpha_expansion benchmark setup failed: {err}");
    }
}

criterion_group!(benches, binary_segmentation, max_flow, alpha_expansion);
criterion_main!(benches);
