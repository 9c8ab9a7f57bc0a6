//! Arc layout shared by the grid graph and its solver kernel.

use crate::grid::{Connectivity, GridDims, Offset};

use super::{GraphError, GraphResult};

/// Stride arithmetic for the arcs of a grid graph.
///
/// Each node owns `F` forward edges (one per forward offset of the
/// connectivity). Edge `e = p * F + d` joins `p` and `p + delta[d]`; arc
/// `2e` points forward and arc `2e + 1` backward, so an arc's sister is
/// `arc ^ 1`. A per-node bit mask records which forward (bit `d`) and
/// backward (bit `F + d`) neighbours lie inside the grid.
#[derive(Clone, Debug)]
pub(crate) struct GridTopology {
    dims: GridDims,
    connectivity: Connectivity,
    directions: usize,
    arcs: usize,
    deltas: Vec<usize>,
    masks: Vec<u32>,
}

impl GridTopology {
    pub(crate) fn new(dims: GridDims, connectivity: Connectivity) -> GraphResult<Self> {
        let offsets = connectivity.forward_offsets();
        let directions = offsets.len();
        let nodes = dims.voxel_count();
        let arcs = nodes
            .checked_mul(directions)
            .and_then(|edges| edges.checked_mul(2))
            .ok_or(GraphError::AllocationFailed { elements: usize::MAX })?;

        let deltas = offsets
            .iter()
            .map(|&offset| usize::try_from(dims.linear_delta(offset)).unwrap_or(0))
            .collect();

        let mut masks = filled(nodes, 0_u32)?;
        for (mask, voxel) in masks.iter_mut().zip(dims.voxels()) {
            for (direction, &offset) in offsets.iter().enumerate() {
                if dims.neighbor(voxel, offset).is_some() {
                    *mask |= 1 << direction;
                }
                if dims.neighbor(voxel, offset.reversed()).is_some() {
                    *mask |= 1 << (directions + direction);
                }
            }
        }

        Ok(Self {
            dims,
            connectivity,
            directions,
            arcs,
            deltas,
            masks,
        })
    }

    #[rustfmt::skip]
    pub(crate) const fn dims(&self) -> GridDims { self.dims }

    #[rustfmt::skip]
    pub(crate) const fn connectivity(&self) -> Connectivity { self.connectivity }

    #[cfg(feature = "parallel")]
    #[rustfmt::skip]
    pub(crate) const fn directions(&self) -> usize { self.directions }

    #[rustfmt::skip]
    pub(crate) const fn arc_count(&self) -> usize { self.arcs }

    #[rustfmt::skip]
    pub(crate) fn node_count(&self) -> usize { self.masks.len() }

    /// Arc from `node` to `node + delta[direction]`.
    pub(crate) const fn forward_arc(&self, node: usize, direction: usize) -> usize {
        2 * (node * self.directions + direction)
    }

    /// Node the arc points at.
    pub(crate) fn head(&self, arc: usize) -> usize {
        let edge = arc >> 1;
        let tail = edge / self.directions;
        if arc & 1 == 0 {
            tail + self.deltas[edge % self.directions]
        } else {
            tail
        }
    }

    /// Arc leaving `node` towards its neighbour at `offset`.
    pub(crate) fn arc_towards(&self, node: usize, offset: Offset) -> GraphResult<usize> {
        let nodes = self.node_count();
        if node >= nodes {
            return Err(GraphError::NodeOutOfRange { node, nodes });
        }
        let (direction, reversed) =
            self.connectivity
                .direction_of(offset)
                .ok_or(GraphError::OffsetNotInTopology {
                    offset,
                    connectivity: self.connectivity,
                })?;
        let bit = if reversed {
            self.directions + direction
        } else {
            direction
        };
        if self.masks[node] & (1 << bit) == 0 {
            return Err(GraphError::NeighborOutOfBounds { node, offset });
        }
        if reversed {
            let tail = node - self.deltas[direction];
            Ok(self.forward_arc(tail, direction) + 1)
        } else {
            Ok(self.forward_arc(node, direction))
        }
    }

    /// Every arc leaving `node`, paired with its head.
    pub(crate) fn arcs(&self, node: usize) -> Arcs<'_> {
        Arcs {
            topology: self,
            node,
            remaining: self.masks.get(node).copied().unwrap_or(0),
        }
    }
}

/// Iterator over the outgoing arcs of one node.
pub(crate) struct Arcs<'a> {
    topology: &'a GridTopology,
    node: usize,
    remaining: u32,
}

impl Iterator for Arcs<'_> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let bit = self.remaining.trailing_zeros() as usize;
        self.remaining &= self.remaining - 1;
        let topology = self.topology;
        if bit < topology.directions {
            let head = self.node + topology.deltas[bit];
            Some((topology.forward_arc(self.node, bit), head))
        } else {
            let direction = bit - topology.directions;
            let head = self.node - topology.deltas[direction];
            Some((topology.forward_arc(head, direction) + 1, head))
        }
    }
}

/// Allocates a vector of `len` copies of `value`, reporting failure instead
/// of aborting.
pub(crate) fn filled<T: Clone>(len: usize, value: T) -> GraphResult<Vec<T>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| GraphError::AllocationFailed { elements: len })?;
    buffer.resize(len, value);
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    fn topology(x: usize, y: usize, z: usize, connectivity: Connectivity) -> GridTopology {
        let dims = GridDims::new(x, y, z).expect("dims are valid");
        GridTopology::new(dims, connectivity).expect("topology fits in memory")
    }

    #[rstest]
    #[case::six(Connectivity::Six)]
    #[case::twenty_six(Connectivity::TwentySix)]
    fn arcs_are_sister_consistent(#[case] connectivity: Connectivity) {
        let topo = topology(3, 4, 2, connectivity);
        for node in 0..topo.node_count() {
            for (arc, head) in topo.arcs(node) {
                assert_eq!(topo.head(arc), head);
                assert_eq!(topo.head(arc ^ 1), node, "sister of {arc} must point back");
                assert!(arc < topo.arc_count());
            }
        }
    }

    #[rstest]
    #[case::six(Connectivity::Six)]
    #[case::twenty_six(Connectivity::TwentySix)]
    fn arc_count_matches_incident_offsets(#[case] connectivity: Connectivity) {
        let topo = topology(4, 3, 3, connectivity);
        let dims = topo.dims();
        for voxel in dims.voxels() {
            let node = dims.index(voxel);
            assert_eq!(
                topo.arcs(node).count(),
                dims.incident_offsets(voxel, connectivity)
            );
        }
    }

    #[test]
    fn arc_towards_resolves_both_directions() {
        let topo = topology(3, 3, 3, Connectivity::TwentySix);
        let dims = topo.dims();
        let centre = dims.index(crate::grid::Voxel::new(1, 1, 1));
        let offset = Offset::new(-1, 1, 1);
        let arc = topo.arc_towards(centre, offset).expect("neighbour exists");
        let neighbour = dims
            .neighbor(dims.voxel(centre), offset)
            .expect("neighbour exists");
        assert_eq!(topo.head(arc), dims.index(neighbour));
        let back = topo
            .arc_towards(dims.index(neighbour), offset.reversed())
            .expect("neighbour exists");
        assert_eq!(back, arc ^ 1);
    }

    #[test]
    fn arc_towards_rejects_unknown_offsets() {
        let topo = topology(3, 3, 3, Connectivity::Six);
        assert_eq!(
            topo.arc_towards(0, Offset::new(1, 1, 0)),
            Err(GraphError::OffsetNotInTopology {
                offset: Offset::new(1, 1, 0),
                connectivity: Connectivity::Six,
            })
        );
        assert_eq!(
            topo.arc_towards(0, Offset::new(-1, 0, 0)),
            Err(GraphError::NeighborOutOfBounds {
                node: 0,
                offset: Offset::new(-1, 0, 0),
            })
        );
        assert_eq!(
            topo.arc_towards(27, Offset::new(1, 0, 0)),
            Err(GraphError::NodeOutOfRange { node: 27, nodes: 27 })
        );
    }
}
