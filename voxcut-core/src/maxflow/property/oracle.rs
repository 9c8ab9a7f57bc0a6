//! Dense Edmonds–Karp oracle for max-flow property verification.
//!
//! Builds an explicit `(n + 2) × (n + 2)` capacity matrix with the source at
//! index `n` and the sink at `n + 1`, then augments along shortest paths
//! until none remain. Slow but obviously correct for the tiny grids the
//! property suite generates.

use std::collections::VecDeque;

use super::types::FlowFixture;

/// Residual below which an arc counts as saturated.
const EPSILON: f64 = 1e-12;

/// Maximum flow of the fixture's graph.
pub(super) fn edmonds_karp(fixture: &FlowFixture) -> f64 {
    let nodes = fixture.dims.voxel_count();
    let size = nodes + 2;
    let source = nodes;
    let sink = nodes + 1;
    let mut capacity = vec![vec![0.0_f64; size]; size];

    for (node, &(to_source, to_sink)) in fixture.terminals.iter().enumerate() {
        capacity[source][node] += to_source;
        capacity[node][sink] += to_sink;
    }
    for edge in &fixture.edges {
        let Some(neighbour) = fixture
            .dims
            .neighbor(fixture.dims.voxel(edge.node), edge.offset)
        else {
            continue;
        };
        let other = fixture.dims.index(neighbour);
        capacity[edge.node][other] += edge.capacity;
        capacity[other][edge.node] += edge.reverse_capacity;
    }

    let mut flow = 0.0;
    while let Some(parent) = shortest_path(&capacity, source, sink) {
        let mut bottleneck = f64::INFINITY;
        let mut node = sink;
        while node != source {
            let prev = parent[node];
            bottleneck = bottleneck.min(capacity[prev][node]);
            node = prev;
        }
        node = sink;
        while node != source {
            let prev = parent[node];
            capacity[prev][node] -= bottleneck;
            capacity[node][prev] += bottleneck;
            node = prev;
        }
        flow += bottleneck;
    }
    flow
}

fn shortest_path(capacity: &[Vec<f64>], source: usize, sink: usize) -> Option<Vec<usize>> {
    let size = capacity.len();
    let mut parent = vec![usize::MAX; size];
    parent[source] = source;
    let mut queue = VecDeque::from([source]);
    while let Some(node) = queue.pop_front() {
        for next in 0..size {
            if parent[next] == usize::MAX && capacity[node][next] > EPSILON {
                parent[next] = node;
                if next == sink {
                    return Some(parent);
                }
                queue.push_back(next);
            }
        }
    }
    None
}

/// Capacity of the cut where `sink_side[p]` marks nodes on the sink side.
pub(super) fn cut_capacity(fixture: &FlowFixture, sink_side: &[bool]) -> f64 {
    let mut total = 0.0;
    for (node, &(to_source, to_sink)) in fixture.terminals.iter().enumerate() {
        total += if sink_side[node] { to_source } else { to_sink };
    }
    for edge in &fixture.edges {
        let Some(neighbour) = fixture
            .dims
            .neighbor(fixture.dims.voxel(edge.node), edge.offset)
        else {
            continue;
        };
        let other = fixture.dims.index(neighbour);
        match (sink_side[edge.node], sink_side[other]) {
            (false, true) => total += edge.capacity,
            (true, false) => total += edge.reverse_capacity,
            _ => {}
        }
    }
    total
}
