//! Strategy builders for max-flow property tests.

use proptest::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::grid::{Connectivity, GridDims};

use super::types::{CapacityProfile, FixtureEdge, FlowFixture};

/// Largest extent along any axis; keeps the dense oracle cheap.
const MAX_EXTENT: usize = 4;

/// Generates fixtures across every capacity profile and both topologies.
pub(super) fn flow_fixture_strategy() -> impl Strategy<Value = FlowFixture> {
    (
        prop_oneof![
            Just(CapacityProfile::Integral),
            Just(CapacityProfile::Fractional),
            Just(CapacityProfile::Sparse),
        ],
        any::<u64>(),
    )
        .prop_map(|(profile, seed)| {
            let mut rng = SmallRng::seed_from_u64(seed);
            generate_fixture(profile, &mut rng)
        })
}

/// Generates a fixture for an explicit profile.
pub(super) fn generate_fixture(profile: CapacityProfile, rng: &mut SmallRng) -> FlowFixture {
    let dims = GridDims::new(
        rng.gen_range(1..=MAX_EXTENT),
        rng.gen_range(1..=MAX_EXTENT),
        rng.gen_range(1..=MAX_EXTENT),
    )
    .expect("generated extents are positive");
    let connectivity = if rng.gen_bool(0.5) {
        Connectivity::Six
    } else {
        Connectivity::TwentySix
    };

    let terminals = (0..dims.voxel_count())
        .map(|_| {
            let to_source = if rng.gen_bool(0.3) {
                capacity(profile, rng).max(0.5)
            } else {
                0.0
            };
            let to_sink = if rng.gen_bool(0.3) {
                capacity(profile, rng).max(0.5)
            } else {
                0.0
            };
            (to_source, to_sink)
        })
        .collect();

    let mut edges = Vec::new();
    for voxel in dims.voxels() {
        for &offset in connectivity.forward_offsets() {
            if dims.neighbor(voxel, offset).is_some() {
                edges.push(FixtureEdge {
                    node: dims.index(voxel),
                    offset,
                    capacity: capacity(profile, rng),
                    reverse_capacity: capacity(profile, rng),
                });
            }
        }
    }

    FlowFixture {
        dims,
        connectivity,
        terminals,
        edges,
        profile,
    }
}

fn capacity(profile: CapacityProfile, rng: &mut SmallRng) -> f64 {
    match profile {
        CapacityProfile::Integral => f64::from(rng.gen_range(0_u8..=10)),
        CapacityProfile::Fractional => rng.gen_range(0.0..10.0),
        CapacityProfile::Sparse if rng.gen_bool(0.7) => 0.0,
        CapacityProfile::Sparse => f64::from(rng.gen_range(1_u8..=5)),
    }
}
