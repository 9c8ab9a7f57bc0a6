//! Unit and property tests for alpha-expansion.

use std::collections::HashMap;

use proptest::prelude::*;
use proptest::test_runner::{TestCaseError, TestCaseResult};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rstest::rstest;

use crate::{
    error::SegmentationError,
    execution::CancellationToken,
    grid::{Connectivity, GridDims},
    maxflow::GraphError,
    test_utils::suite_proptest_config,
};

use super::{AlphaExpansion, ExpansionError, LabelExpansionSolver, PairwiseCost};

/// Potts term with an explicit weight per undirected edge.
#[derive(Clone, Debug, Default)]
struct EdgePotts {
    weights: HashMap<(usize, usize), f64>,
    fallback: f64,
}

impl PairwiseCost for EdgePotts {
    fn cost(&self, node: usize, neighbour: usize, a: usize, b: usize) -> f64 {
        if a == b {
            return 0.0;
        }
        self.weights
            .get(&(node, neighbour))
            .copied()
            .unwrap_or(self.fallback)
    }
}

/// Arbitrary label-pair table shared by every edge.
struct Table(Vec<Vec<f64>>);

impl PairwiseCost for Table {
    fn cost(&self, _: usize, _: usize, a: usize, b: usize) -> f64 {
        self.0[a][b]
    }
}

fn uniform(weight: f64) -> EdgePotts {
    EdgePotts {
        weights: HashMap::new(),
        fallback: weight,
    }
}

fn line(n: usize) -> GridDims {
    GridDims::new(n, 1, 1).expect("line dims are valid")
}

/// Full energy of an arbitrary labeling.
fn brute_energy(
    dims: GridDims,
    connectivity: Connectivity,
    labels: usize,
    costs: &[f64],
    pairwise: &dyn PairwiseCost,
    labeling: &[usize],
) -> f64 {
    let mut total = 0.0;
    for voxel in dims.voxels() {
        let node = dims.index(voxel);
        total += costs[node * labels + labeling[node]];
        for &offset in connectivity.forward_offsets() {
            if let Some(next) = dims.neighbor(voxel, offset) {
                let neighbour = dims.index(next);
                total += pairwise.cost(node, neighbour, labeling[node], labeling[neighbour]);
            }
        }
    }
    total
}

#[test]
fn rejects_zero_labels() {
    let err = AlphaExpansion::new(line(2), Connectivity::Six, 0, Vec::new(), &uniform(1.0))
        .err()
        .expect("zero labels must be rejected");
    assert_eq!(err, ExpansionError::NoLabels);
}

#[test]
fn rejects_mismatched_cost_layout() {
    let err = AlphaExpansion::new(line(3), Connectivity::Six, 2, vec![0.0; 5], &uniform(1.0))
        .err()
        .expect("short cost array must be rejected");
    assert_eq!(
        err,
        ExpansionError::DataCostLayout {
            expected: 6,
            got: 5
        }
    );
}

#[rstest]
#[case::negative(-1.0)]
#[case::nan(f64::NAN)]
#[case::infinite(f64::INFINITY)]
fn rejects_unusable_data_costs(#[case] cost: f64) {
    let mut costs = vec![0.0; 6];
    costs[3] = cost;
    let err = AlphaExpansion::new(line(3), Connectivity::Six, 2, costs, &uniform(1.0))
        .err()
        .expect("invalid data cost must be rejected");
    assert!(matches!(
        err,
        ExpansionError::InvalidDataCost {
            node: 1,
            label: 1,
            ..
        }
    ));
}

#[test]
fn initial_labeling_prefers_lowest_index_on_ties() {
    let costs = vec![2.0, 1.0, 1.0, 3.0, 3.0, 3.0];
    let pairwise = uniform(0.0);
    let solver = AlphaExpansion::new(line(2), Connectivity::Six, 3, costs, &pairwise)
        .expect("costs are valid");
    assert_eq!(solver.labeling(), &[1, 0]);
}

#[test]
fn smoothing_flips_a_weakly_held_voxel() {
    // The middle voxel slightly prefers label 1 but both neighbours are 0.
    let costs = vec![0.0, 50.0, 1.0, 0.5, 0.0, 50.0];
    let pairwise = uniform(2.0);
    let mut solver = AlphaExpansion::new(line(3), Connectivity::Six, 2, costs, &pairwise)
        .expect("costs are valid");
    assert_eq!(solver.labeling(), &[0, 1, 0]);
    let report = solver.perform().expect("expansion succeeds");
    assert_eq!(solver.labeling(), &[0, 0, 0]);
    assert_eq!(report.initial_energy, 4.5);
    assert_eq!(report.energy, 1.0);
    assert!(report.converged);
    assert_eq!(report.accepted_moves, 1);
}

#[test]
fn single_label_converges_immediately() {
    let pairwise = uniform(1.0);
    let mut solver = AlphaExpansion::new(line(4), Connectivity::Six, 1, vec![1.0; 4], &pairwise)
        .expect("costs are valid");
    let report = solver.perform().expect("expansion succeeds");
    assert_eq!(report.cycles, 1);
    assert_eq!(report.accepted_moves, 0);
    assert_eq!(report.energy, 4.0);
    assert_eq!(solver.labeling(), &[0, 0, 0, 0]);
}

#[test]
fn max_cycles_bounds_the_passes() {
    let costs = vec![0.0, 50.0, 1.0, 0.5, 0.0, 50.0];
    let pairwise = uniform(2.0);
    let mut solver = AlphaExpansion::new(line(3), Connectivity::Six, 2, costs, &pairwise)
        .expect("costs are valid")
        .with_max_cycles(Some(1));
    let report = solver.perform().expect("expansion succeeds");
    assert_eq!(report.cycles, 1);
    assert!(!report.converged);
}

#[test]
fn non_metric_pairwise_is_rejected() {
    let table = Table(vec![
        vec![0.0, 1.0, 5.0],
        vec![1.0, 0.0, 1.0],
        vec![5.0, 1.0, 0.0],
    ]);
    let costs = vec![0.0, 9.0, 9.0, 9.0, 9.0, 0.0];
    let mut solver = AlphaExpansion::new(line(2), Connectivity::Six, 3, costs, &table)
        .expect("costs are valid");
    let err = solver.perform().expect_err("non-metric term must fail");
    assert!(matches!(
        err,
        ExpansionError::NonMetricPairwise {
            node: 0,
            neighbour: 1,
            alpha: 1,
            ..
        }
    ));
    assert_eq!(err.code().as_str(), "EXPANSION_NON_METRIC_PAIRWISE");
}

#[test]
fn unusable_pairwise_cost_is_rejected() {
    let costs = vec![0.0, 1.0, 1.0, 0.0];
    let pairwise = uniform(f64::NAN);
    let mut solver = AlphaExpansion::new(line(2), Connectivity::Six, 2, costs, &pairwise)
        .expect("data costs are valid");
    let err = solver.perform().expect_err("NaN smoothness must fail");
    assert!(matches!(err, ExpansionError::InvalidPairwiseCost { node: 0, neighbour: 1, .. }));
}

#[test]
fn cancelled_token_stops_before_the_first_move() {
    let token = CancellationToken::new();
    token.cancel();
    let costs = vec![0.0, 1.0, 1.0, 0.0];
    let pairwise = uniform(1.0);
    let mut solver = AlphaExpansion::new(line(2), Connectivity::Six, 2, costs, &pairwise)
        .expect("costs are valid")
        .with_cancellation(Some(token));
    let before = solver.labeling().to_vec();
    assert_eq!(solver.perform(), Err(ExpansionError::Cancelled));
    assert_eq!(solver.labeling(), before.as_slice());
}

#[rstest]
#[case::cancelled(ExpansionError::Cancelled, None)]
#[case::graph_cancelled(ExpansionError::Graph(GraphError::Cancelled), None)]
#[case::no_labels(ExpansionError::NoLabels, Some("EXPANSION_NO_LABELS"))]
#[case::graph(
    ExpansionError::Graph(GraphError::AllocationFailed { elements: 8 }),
    Some("GRAPH_ALLOCATION_FAILED")
)]
fn maps_into_segmentation_errors(#[case] error: ExpansionError, #[case] code: Option<&str>) {
    let mapped = SegmentationError::from(error);
    match code {
        None => assert_eq!(mapped, SegmentationError::Cancelled),
        Some(expected) => assert!(matches!(
            mapped,
            SegmentationError::Solver { code: ref got, .. } if &**got == expected
        )),
    }
}

/// Random Potts problem of at most eight voxels, small enough to enumerate.
#[derive(Clone, Debug)]
struct ExpansionFixture {
    dims: GridDims,
    connectivity: Connectivity,
    labels: usize,
    costs: Vec<f64>,
    pairwise: EdgePotts,
}

fn generate_fixture(rng: &mut SmallRng) -> ExpansionFixture {
    let dims = GridDims::new(rng.gen_range(1..=2), rng.gen_range(1..=2), rng.gen_range(1..=2))
        .expect("generated extents are positive");
    let connectivity = if rng.gen_bool(0.5) {
        Connectivity::Six
    } else {
        Connectivity::TwentySix
    };
    let labels = rng.gen_range(1..=3);
    let costs = (0..dims.voxel_count() * labels)
        .map(|_| f64::from(rng.gen_range(0_u8..=8)))
        .collect();
    let mut weights = HashMap::new();
    for voxel in dims.voxels() {
        for &offset in connectivity.forward_offsets() {
            if let Some(next) = dims.neighbor(voxel, offset) {
                weights.insert(
                    (dims.index(voxel), dims.index(next)),
                    f64::from(rng.gen_range(0_u8..=6)) * 0.5,
                );
            }
        }
    }
    ExpansionFixture {
        dims,
        connectivity,
        labels,
        costs,
        pairwise: EdgePotts {
            weights,
            fallback: 0.0,
        },
    }
}

fn expansion_fixture_strategy() -> impl Strategy<Value = ExpansionFixture> {
    any::<u64>().prop_map(|seed| {
        let mut rng = SmallRng::seed_from_u64(seed);
        generate_fixture(&mut rng)
    })
}

fn run_fixture(fixture: &ExpansionFixture) -> Result<(Vec<usize>, f64, f64), TestCaseError> {
    let mut solver = AlphaExpansion::new(
        fixture.dims,
        fixture.connectivity,
        fixture.labels,
        fixture.costs.clone(),
        &fixture.pairwise,
    )
    .map_err(|err| TestCaseError::fail(format!("construction failed: {err}")))?;
    let report = solver
        .perform()
        .map_err(|err| TestCaseError::fail(format!("expansion failed: {err}")))?;
    Ok((solver.labeling().to_vec(), report.initial_energy, report.energy))
}

/// Energy never rises, matches a direct evaluation, and no single expansion
/// move can lower it further.
fn run_local_optimum_property(fixture: &ExpansionFixture) -> TestCaseResult {
    let (labeling, initial, energy) = run_fixture(fixture)?;
    let energy_of = |candidate: &[usize]| {
        brute_energy(
            fixture.dims,
            fixture.connectivity,
            fixture.labels,
            &fixture.costs,
            &fixture.pairwise,
            candidate,
        )
    };
    prop_assert!(energy <= initial + 1e-9, "energy rose from {} to {}", initial, energy);
    prop_assert!((energy - energy_of(&labeling)).abs() < 1e-9);

    let nodes = labeling.len();
    for alpha in 0..fixture.labels {
        for mask in 0_u32..(1 << nodes) {
            let candidate: Vec<usize> = labeling
                .iter()
                .enumerate()
                .map(|(node, &label)| if mask & (1 << node) != 0 { alpha } else { label })
                .collect();
            let moved = energy_of(&candidate);
            prop_assert!(
                moved >= energy - 1e-9,
                "move to {} with mask {:#b} lowers energy {} to {}",
                alpha,
                mask,
                energy,
                moved
            );
        }
    }
    Ok(())
}

/// Potts expansion stays within twice the global optimum.
fn run_bounded_ratio_property(fixture: &ExpansionFixture) -> TestCaseResult {
    let (_, _, energy) = run_fixture(fixture)?;
    let nodes = fixture.dims.voxel_count();
    let mut best = f64::INFINITY;
    let mut candidate = vec![0; nodes];
    loop {
        best = best.min(brute_energy(
            fixture.dims,
            fixture.connectivity,
            fixture.labels,
            &fixture.costs,
            &fixture.pairwise,
            &candidate,
        ));
        let Some(position) = candidate.iter().position(|&label| label + 1 < fixture.labels) else {
            break;
        };
        candidate[position] += 1;
        for label in &mut candidate[..position] {
            *label = 0;
        }
    }
    prop_assert!(
        energy <= 2.0 * best + 1e-9,
        "expansion energy {} exceeds twice the optimum {}",
        energy,
        best
    );
    Ok(())
}

proptest! {
    #![proptest_config(suite_proptest_config(64))]

    #[test]
    fn expansion_reaches_a_local_optimum(fixture in expansion_fixture_strategy()) {
        run_local_optimum_property(&fixture)?;
    }

    #[test]
    fn expansion_is_within_twice_the_optimum(fixture in expansion_fixture_strategy()) {
        run_bounded_ratio_property(&fixture)?;
    }
}

#[rstest]
#[case::seed_7(7)]
#[case::seed_42(42)]
#[case::seed_2024(2024)]
fn local_optimum_rstest(#[case] seed: u64) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let fixture = generate_fixture(&mut rng);
    run_local_optimum_property(&fixture).expect("local optimum must hold");
    run_bounded_ratio_property(&fixture).expect("ratio bound must hold");
}

#[cfg(feature = "parallel")]
#[rstest]
#[case::one_row(1)]
#[case::three_rows(3)]
fn blocked_moves_match_serial(#[case] rows: usize) {
    let mut rng = SmallRng::seed_from_u64(99);
    let dims = GridDims::new(6, 5, 4).expect("dims are valid");
    let labels = 4;
    let costs: Vec<f64> = (0..dims.voxel_count() * labels)
        .map(|_| f64::from(rng.gen_range(0_u8..=20)))
        .collect();
    let pairwise = uniform(3.0);

    let mut serial = AlphaExpansion::new(dims, Connectivity::Six, labels, costs.clone(), &pairwise)
        .expect("costs are valid");
    let serial_report = serial.perform().expect("serial expansion succeeds");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(3)
        .build()
        .expect("pool builds");
    let mut blocked = AlphaExpansion::new(dims, Connectivity::Six, labels, costs, &pairwise)
        .expect("costs are valid")
        .with_workers(&pool, rows * dims.x());
    let blocked_report = blocked.perform().expect("blocked expansion succeeds");

    assert_eq!(serial.labeling(), blocked.labeling());
    assert_eq!(serial_report, blocked_report);
}
