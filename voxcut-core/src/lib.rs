//! Voxcut core library.
//!
//! Seeded segmentation of 3D voxel grids by minimum cut. A sparse set of
//! seed voxels is grown into a dense labeling either by one binary min-cut
//! ([`Segmenter::segment_binary`]) or by alpha-expansion over all observed
//! seed labels ([`Segmenter::segment_multilabel`]). Voxel data stays with the
//! caller and crosses the boundary through [`VoxelSource`] and [`LabelSink`].
#![cfg_attr(docsrs, feature(doc_cfg))]

mod builder;
mod construction;
mod distance;
mod error;
mod execution;
mod expansion;
mod grid;
mod labels;
mod maxflow;
mod result;
mod segmenter;
mod source;
#[cfg(test)]
mod test_utils;
mod writeback;

pub use crate::{
    builder::{DEFAULT_TERMINAL_CAPACITY, SegmenterBuilder},
    distance::{VoxelDistances, VoxelSpacing},
    error::{Result, SegmentationError, SegmentationErrorCode},
    execution::{CancellationToken, ExecutionMode, hardware_threads},
    expansion::{
        AlphaExpansion, ExpansionError, ExpansionErrorCode, ExpansionReport,
        LabelExpansionSolver, PairwiseCost, PottsCost,
    },
    grid::{Connectivity, DistanceClass, GridDims, Offset, Voxel},
    labels::LabelIndexMaps,
    maxflow::{GraphError, GraphErrorCode, GraphResult, GridGraph, GridMaxFlowSolver, Segment},
    result::{BinarySegmentation, MultiLabelSegmentation},
    segmenter::Segmenter,
    source::{CallbackSource, LabelSink, LabelVolume, VoxelSource},
};
