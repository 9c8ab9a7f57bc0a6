//! Shared fixtures for the `voxcut-core` integration tests.

use std::collections::VecDeque;
use std::fmt;

use proptest::test_runner::Config as ProptestConfig;
use voxcut_core::{
    Connectivity, GridDims, LabelSink, Offset, Voxel, VoxelDistances, VoxelSource,
};
use voxcut_test_support::ci::property_test_profile::ProptestRunProfile;

type WeightFn = dyn Fn(Voxel, Offset) -> f64 + Send + Sync;

/// Seed buffer plus a weight closure.
pub struct Fixture {
    pub dims: GridDims,
    pub seeds: Vec<i64>,
    weight: Box<WeightFn>,
}

impl Fixture {
    pub fn new(
        dims: GridDims,
        seeds: Vec<i64>,
        weight: impl Fn(Voxel, Offset) -> f64 + Send + Sync + 'static,
    ) -> Self {
        assert_eq!(seeds.len(), dims.voxel_count(), "one seed per voxel");
        Self {
            dims,
            seeds,
            weight: Box::new(weight),
        }
    }

    /// Unit weights everywhere.
    pub fn uniform(dims: GridDims, seeds: Vec<i64>) -> Self {
        Self::new(dims, seeds, |_, _| 1.0)
    }

    pub fn with_seed(mut self, voxel: Voxel, label: i64) -> Self {
        let index = self.dims.index(voxel);
        self.seeds[index] = label;
        self
    }
}

impl fmt::Debug for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fixture")
            .field("dims", &self.dims)
            .field("seeds", &self.seeds)
            .finish_non_exhaustive()
    }
}

impl VoxelSource for Fixture {
    fn seed(&self, voxel: Voxel) -> i64 {
        self.seeds[self.dims.index(voxel)]
    }

    fn image_weight(&self, voxel: Voxel, offset: Offset) -> f64 {
        (self.weight)(voxel, offset)
    }

    fn name(&self) -> &str {
        "fixture"
    }
}

/// Sink that records every write in order.
#[derive(Default)]
pub struct RecordingSink {
    pub writes: Vec<(Voxel, i64)>,
}

impl LabelSink for RecordingSink {
    fn set_label(&mut self, voxel: Voxel, label: i64) {
        self.writes.push((voxel, label));
    }
}

pub fn dims(x: usize, y: usize, z: usize) -> GridDims {
    GridDims::new(x, y, z).expect("test dims are valid")
}

pub fn proptest_config(default_cases: u32) -> ProptestConfig {
    let profile = ProptestRunProfile::load(default_cases, false);
    ProptestConfig {
        cases: profile.cases(),
        fork: profile.fork(),
        ..ProptestConfig::default()
    }
}

/// Max-flow value of the binary graph for `source`, computed with a dense
/// Edmonds–Karp on an explicit adjacency matrix.
pub fn reference_max_flow<S: VoxelSource>(
    dims: GridDims,
    connectivity: Connectivity,
    distances: &VoxelDistances,
    source: &S,
    foreground: i64,
    terminal_capacity: f64,
) -> f64 {
    let voxels = dims.voxel_count();
    let (s, t) = (voxels, voxels + 1);
    let mut capacity = vec![vec![0.0_f64; voxels + 2]; voxels + 2];
    for voxel in dims.voxels() {
        let node = dims.index(voxel);
        match source.seed(voxel) {
            seed if seed == foreground => capacity[node][t] += terminal_capacity,
            seed if seed > 0 => capacity[s][node] += terminal_capacity,
            _ => {}
        }
        for &offset in connectivity.forward_offsets() {
            let Some(neighbour) = dims.neighbor(voxel, offset) else {
                continue;
            };
            let distance = distances.for_offset(offset).expect("neighbour offset");
            let value = source.image_weight(voxel, offset) / distance;
            let other = dims.index(neighbour);
            capacity[node][other] += value;
            capacity[other][node] += value;
        }
    }

    let mut flow = 0.0;
    while let Some(path) = augmenting_path(&capacity, s, t) {
        let bottleneck = path
            .windows(2)
            .map(|pair| capacity[pair[0]][pair[1]])
            .fold(f64::INFINITY, f64::min);
        for pair in path.windows(2) {
            capacity[pair[0]][pair[1]] -= bottleneck;
            capacity[pair[1]][pair[0]] += bottleneck;
        }
        flow += bottleneck;
    }
    flow
}

fn augmenting_path(capacity: &[Vec<f64>], s: usize, t: usize) -> Option<Vec<usize>> {
    let mut parent = vec![usize::MAX; capacity.len()];
    parent[s] = s;
    let mut queue = VecDeque::from([s]);
    while let Some(node) = queue.pop_front() {
        for (next, &residual) in capacity[node].iter().enumerate() {
            if residual > 1e-12 && parent[next] == usize::MAX {
                parent[next] = node;
                if next == t {
                    let mut path = vec![t];
                    let mut at = t;
                    while at != s {
                        at = parent[at];
                        path.push(at);
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }
    }
    None
}

pub fn assert_close(actual: f64, expected: f64) {
    let tolerance = 1e-9 * expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected}, got {actual}"
    );
}
