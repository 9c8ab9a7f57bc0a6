//! Boykov–Kolmogorov augmenting-path kernel.
//!
//! Two search trees grow from the terminals through non-saturated arcs. When
//! they touch, the connecting path is augmented by its bottleneck, saturated
//! tree arcs turn their children into orphans, and orphans either adopt a new
//! parent from the same tree or become free. Distance and timestamp labels on
//! each node keep adoption close to the terminals.

use std::collections::VecDeque;

use crate::execution::CancellationToken;

use super::{GraphError, GraphResult, Segment, topology::GridTopology, topology::filled};

/// Parent marker for nodes in neither tree.
const NONE: usize = usize::MAX;
/// Parent marker for tree roots attached directly to a terminal.
const TERMINAL: usize = usize::MAX - 1;
/// Parent marker for nodes whose parent arc was just saturated.
const ORPHAN: usize = usize::MAX - 2;

/// Main-loop iterations between cancellation polls.
const CANCEL_POLL: u64 = 4096;

/// Tree membership left behind by a solve.
#[derive(Clone, Debug)]
pub(crate) struct SearchTrees {
    parent: Vec<usize>,
    sink_tree: Vec<bool>,
    stamp: Vec<u64>,
    dist: Vec<u32>,
    queued: Vec<bool>,
}

impl SearchTrees {
    fn new(nodes: usize) -> GraphResult<Self> {
        Ok(Self {
            parent: filled(nodes, NONE)?,
            sink_tree: filled(nodes, false)?,
            stamp: filled(nodes, 0)?,
            dist: filled(nodes, 0)?,
            queued: filled(nodes, false)?,
        })
    }

    /// Side of the cut for `node`; free nodes join the source side.
    pub(crate) fn segment(&self, node: usize) -> Segment {
        match (self.parent.get(node), self.sink_tree.get(node)) {
            (Some(&parent), Some(true)) if parent != NONE => Segment::Sink,
            _ => Segment::Source,
        }
    }
}

/// Runs the kernel to completion and returns the flow it pushed together with
/// the final search trees.
///
/// `terminal[p]` holds the net terminal residual of node `p`: positive values
/// are source capacity, negative values sink capacity.
pub(crate) fn solve(
    topology: &GridTopology,
    residual: &mut [f64],
    terminal: &mut [f64],
    cancel: Option<&CancellationToken>,
) -> GraphResult<(f64, SearchTrees)> {
    let mut kernel = Kernel::new(topology, residual, terminal)?;
    kernel.run(cancel)?;
    Ok((kernel.flow, kernel.trees))
}

struct Kernel<'g> {
    topology: &'g GridTopology,
    residual: &'g mut [f64],
    terminal: &'g mut [f64],
    trees: SearchTrees,
    active: VecDeque<usize>,
    orphans: VecDeque<usize>,
    time: u64,
    flow: f64,
}

impl<'g> Kernel<'g> {
    fn new(
        topology: &'g GridTopology,
        residual: &'g mut [f64],
        terminal: &'g mut [f64],
    ) -> GraphResult<Self> {
        let nodes = topology.node_count();
        let mut kernel = Self {
            topology,
            residual,
            terminal,
            trees: SearchTrees::new(nodes)?,
            active: VecDeque::new(),
            orphans: VecDeque::new(),
            time: 0,
            flow: 0.0,
        };
        for node in 0..nodes {
            let capacity = kernel.terminal[node];
            let sink = if capacity > 0.0 {
                false
            } else if capacity < 0.0 {
                true
            } else {
                continue;
            };
            kernel.trees.parent[node] = TERMINAL;
            kernel.trees.sink_tree[node] = sink;
            kernel.trees.dist[node] = 1;
            kernel.activate(node);
        }
        Ok(kernel)
    }

    fn run(&mut self, cancel: Option<&CancellationToken>) -> GraphResult<()> {
        let mut current: Option<usize> = None;
        let mut iterations: u64 = 0;
        loop {
            if iterations.is_multiple_of(CANCEL_POLL)
                && cancel.is_some_and(CancellationToken::is_cancelled)
            {
                return Err(GraphError::Cancelled);
            }
            iterations += 1;

            let retained = current.take().filter(|&node| {
                self.trees.queued[node] = false;
                self.trees.parent[node] != NONE
            });
            let Some(node) = retained.or_else(|| self.next_active()) else {
                break;
            };

            let meeting = if self.trees.sink_tree[node] {
                self.grow_sink(node)
            } else {
                self.grow_source(node)
            };
            self.time += 1;

            if let Some(arc) = meeting {
                // Keep expanding from the same node; it may still touch the
                // other tree through another arc.
                self.trees.queued[node] = true;
                current = Some(node);
                self.augment(arc);
                self.adopt();
            }
        }
        Ok(())
    }

    fn activate(&mut self, node: usize) {
        if !self.trees.queued[node] {
            self.trees.queued[node] = true;
            self.active.push_back(node);
        }
    }

    fn next_active(&mut self) -> Option<usize> {
        loop {
            let node = self.active.pop_front()?;
            self.trees.queued[node] = false;
            if self.trees.parent[node] != NONE {
                return Some(node);
            }
        }
    }

    fn attach(&mut self, child: usize, parent_arc: usize, from: usize) {
        self.trees.parent[child] = parent_arc;
        self.trees.stamp[child] = self.trees.stamp[from];
        self.trees.dist[child] = self.trees.dist[from].saturating_add(1);
    }

    fn shorter_through(&self, child: usize, from: usize) -> bool {
        self.trees.stamp[child] <= self.trees.stamp[from]
            && self.trees.dist[child] > self.trees.dist[from]
    }

    /// Expands the source tree from `node`, returning the arc that reaches the
    /// sink tree.
    fn grow_source(&mut self, node: usize) -> Option<usize> {
        let topology = self.topology;
        for (arc, head) in topology.arcs(node) {
            if self.residual[arc] <= 0.0 {
                continue;
            }
            if self.trees.parent[head] == NONE {
                self.trees.sink_tree[head] = false;
                self.attach(head, arc ^ 1, node);
                self.activate(head);
            } else if self.trees.sink_tree[head] {
                return Some(arc);
            } else if self.shorter_through(head, node) {
                self.attach(head, arc ^ 1, node);
            }
        }
        None
    }

    /// Expands the sink tree from `node`, returning the source-to-sink arc
    /// that reaches the source tree.
    fn grow_sink(&mut self, node: usize) -> Option<usize> {
        let topology = self.topology;
        for (arc, head) in topology.arcs(node) {
            let inbound = arc ^ 1;
            if self.residual[inbound] <= 0.0 {
                continue;
            }
            if self.trees.parent[head] == NONE {
                self.trees.sink_tree[head] = true;
                self.attach(head, inbound, node);
                self.activate(head);
            } else if !self.trees.sink_tree[head] {
                return Some(inbound);
            } else if self.shorter_through(head, node) {
                self.attach(head, inbound, node);
            }
        }
        None
    }

    fn make_orphan_front(&mut self, node: usize) {
        self.trees.parent[node] = ORPHAN;
        self.orphans.push_front(node);
    }

    fn make_orphan_rear(&mut self, node: usize) {
        self.trees.parent[node] = ORPHAN;
        self.orphans.push_back(node);
    }

    /// Pushes the bottleneck along source root → `middle` → sink root.
    fn augment(&mut self, middle: usize) {
        let topology = self.topology;
        let source_end = topology.head(middle ^ 1);
        let sink_end = topology.head(middle);

        let mut bottleneck = self.residual[middle];
        let mut node = source_end;
        loop {
            let arc = self.trees.parent[node];
            if arc == TERMINAL {
                break;
            }
            bottleneck = bottleneck.min(self.residual[arc ^ 1]);
            node = topology.head(arc);
        }
        bottleneck = bottleneck.min(self.terminal[node]);
        node = sink_end;
        loop {
            let arc = self.trees.parent[node];
            if arc == TERMINAL {
                break;
            }
            bottleneck = bottleneck.min(self.residual[arc]);
            node = topology.head(arc);
        }
        bottleneck = bottleneck.min(-self.terminal[node]);

        self.residual[middle ^ 1] += bottleneck;
        self.residual[middle] -= bottleneck;

        node = source_end;
        loop {
            let arc = self.trees.parent[node];
            if arc == TERMINAL {
                break;
            }
            self.residual[arc] += bottleneck;
            self.residual[arc ^ 1] -= bottleneck;
            if self.residual[arc ^ 1] <= 0.0 {
                self.make_orphan_front(node);
            }
            node = topology.head(arc);
        }
        self.terminal[node] -= bottleneck;
        if self.terminal[node] <= 0.0 {
            self.make_orphan_front(node);
        }

        node = sink_end;
        loop {
            let arc = self.trees.parent[node];
            if arc == TERMINAL {
                break;
            }
            self.residual[arc ^ 1] += bottleneck;
            self.residual[arc] -= bottleneck;
            if self.residual[arc] <= 0.0 {
                self.make_orphan_front(node);
            }
            node = topology.head(arc);
        }
        self.terminal[node] += bottleneck;
        if self.terminal[node] >= 0.0 {
            self.make_orphan_front(node);
        }

        self.flow += bottleneck;
    }

    fn adopt(&mut self) {
        while let Some(orphan) = self.orphans.pop_front() {
            let sink = self.trees.sink_tree[orphan];
            self.process_orphan(orphan, sink);
        }
    }

    /// Whether flow can move between `node` and its neighbour along `arc`
    /// in the direction the tree carries it.
    fn tree_arc_open(&self, arc: usize, sink: bool) -> bool {
        if sink {
            self.residual[arc] > 0.0
        } else {
            self.residual[arc ^ 1] > 0.0
        }
    }

    fn process_orphan(&mut self, orphan: usize, sink: bool) {
        let topology = self.topology;
        let mut best = NONE;
        let mut best_dist = u32::MAX;
        for (arc, head) in topology.arcs(orphan) {
            if !self.tree_arc_open(arc, sink)
                || self.trees.sink_tree[head] != sink
                || self.trees.parent[head] == NONE
            {
                continue;
            }
            if let Some(dist) = self.origin_distance(head)
                && dist < best_dist
            {
                best = arc;
                best_dist = dist;
            }
        }

        if best != NONE {
            self.trees.parent[orphan] = best;
            self.trees.stamp[orphan] = self.time;
            self.trees.dist[orphan] = best_dist.saturating_add(1);
            return;
        }

        self.trees.parent[orphan] = NONE;
        for (arc, head) in topology.arcs(orphan) {
            let parent = self.trees.parent[head];
            if self.trees.sink_tree[head] != sink || parent == NONE {
                continue;
            }
            if self.tree_arc_open(arc, sink) {
                self.activate(head);
            }
            if parent != TERMINAL && parent != ORPHAN && topology.head(parent) == orphan {
                self.make_orphan_rear(head);
            }
        }
    }

    /// Distance from `start` to its terminal, or `None` when the path runs
    /// through an orphan. Nodes on a valid path are stamped with the current
    /// time so later queries stop early.
    fn origin_distance(&mut self, start: usize) -> Option<u32> {
        let topology = self.topology;
        let mut dist: u32 = 0;
        let mut node = start;
        loop {
            if self.trees.stamp[node] == self.time {
                dist = dist.saturating_add(self.trees.dist[node]);
                break;
            }
            let arc = self.trees.parent[node];
            dist = dist.saturating_add(1);
            if arc == TERMINAL {
                self.trees.stamp[node] = self.time;
                self.trees.dist[node] = 1;
                break;
            }
            if arc == ORPHAN {
                return None;
            }
            node = topology.head(arc);
        }

        let mut remaining = dist;
        node = start;
        while self.trees.stamp[node] != self.time {
            self.trees.stamp[node] = self.time;
            self.trees.dist[node] = remaining;
            remaining = remaining.saturating_sub(1);
            node = topology.head(self.trees.parent[node]);
        }
        Some(dist)
    }
}
