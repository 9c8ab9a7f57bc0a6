//! Voxel grid topology.
//!
//! Every graph in the crate is laid over a dense `Dx × Dy × Dz` grid using
//! row-major linear indices (`x` fastest, then `y`, then `z`), so neighbour
//! lookups are plain stride arithmetic over `{1, Dx, Dx * Dy}`.
//!
//! Undirected neighbour edges are enumerated through the "forward" half of a
//! neighbourhood: offsets whose linear delta is positive. Visiting every voxel
//! with every in-bounds forward offset touches each undirected edge exactly
//! once.

use std::fmt;

use crate::error::{Result, SegmentationError};

/// A voxel coordinate inside a [`GridDims`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Voxel {
    /// Column index.
    pub x: usize,
    /// Row index.
    pub y: usize,
    /// Slice index.
    pub z: usize,
}

impl Voxel {
    /// Creates a voxel coordinate.
    #[must_use]
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }
}

/// Relative position of a neighbour, each component in `{-1, 0, 1}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Offset {
    /// Step along X.
    pub dx: isize,
    /// Step along Y.
    pub dy: isize,
    /// Step along Z.
    pub dz: isize,
}

impl Offset {
    /// Creates an offset.
    #[must_use]
    pub const fn new(dx: isize, dy: isize, dz: isize) -> Self {
        Self { dx, dy, dz }
    }

    /// Returns the offset pointing the other way.
    #[must_use]
    pub const fn reversed(self) -> Self {
        Self::new(-self.dx, -self.dy, -self.dz)
    }

    /// Classifies the offset by the axes it moves along.
    ///
    /// Returns `None` for the zero offset and for offsets with a component
    /// outside `{-1, 0, 1}`.
    ///
    /// # Examples
    /// ```
    /// use voxcut_core::{DistanceClass, Offset};
    ///
    /// assert_eq!(Offset::new(-1, 0, 1).class(), Some(DistanceClass::Xz));
    /// assert_eq!(Offset::new(0, 0, 0).class(), None);
    /// ```
    #[must_use]
    pub const fn class(self) -> Option<DistanceClass> {
        if self.dx.abs() > 1 || self.dy.abs() > 1 || self.dz.abs() > 1 {
            return None;
        }
        match (self.dx != 0, self.dy != 0, self.dz != 0) {
            (false, false, false) => None,
            (true, false, false) => Some(DistanceClass::X),
            (false, true, false) => Some(DistanceClass::Y),
            (false, false, true) => Some(DistanceClass::Z),
            (true, true, false) => Some(DistanceClass::Xy),
            (true, false, true) => Some(DistanceClass::Xz),
            (false, true, true) => Some(DistanceClass::Yz),
            (true, true, true) => Some(DistanceClass::Xyz),
        }
    }
}

/// The seven geometrically distinct neighbour directions of a voxel grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DistanceClass {
    /// Face neighbour along X.
    X,
    /// Face neighbour along Y.
    Y,
    /// Face neighbour along Z.
    Z,
    /// Edge diagonal in the XY plane.
    Xy,
    /// Edge diagonal in the XZ plane.
    Xz,
    /// Edge diagonal in the YZ plane.
    Yz,
    /// Space diagonal.
    Xyz,
}

const SIX_FORWARD: [Offset; 3] = [
    Offset::new(1, 0, 0),
    Offset::new(0, 1, 0),
    Offset::new(0, 0, 1),
];

const TWENTY_SIX_FORWARD: [Offset; 13] = [
    Offset::new(1, 0, 0),
    Offset::new(0, 1, 0),
    Offset::new(0, 0, 1),
    Offset::new(1, 1, 0),
    Offset::new(-1, 1, 0),
    Offset::new(1, 0, 1),
    Offset::new(-1, 0, 1),
    Offset::new(0, 1, 1),
    Offset::new(0, -1, 1),
    Offset::new(1, 1, 1),
    Offset::new(-1, 1, 1),
    Offset::new(1, -1, 1),
    Offset::new(-1, -1, 1),
];

/// Neighbourhood topology of the grid graph.
///
/// # Examples
/// ```
/// use voxcut_core::Connectivity;
///
/// let topology = Connectivity::try_from(26)?;
/// assert_eq!(topology, Connectivity::TwentySix);
/// assert_eq!(topology.forward_offsets().len(), 13);
/// assert!(Connectivity::try_from(18).is_err());
/// # Ok::<(), voxcut_core::SegmentationError>(())
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Connectivity {
    /// Face neighbours only.
    #[default]
    Six,
    /// Face, edge and vertex neighbours.
    TwentySix,
}

impl Connectivity {
    /// Returns the positive half of the neighbourhood.
    #[must_use]
    pub const fn forward_offsets(self) -> &'static [Offset] {
        match self {
            Self::Six => &SIX_FORWARD,
            Self::TwentySix => &TWENTY_SIX_FORWARD,
        }
    }

    /// Number of neighbours of an interior voxel.
    #[must_use]
    pub const fn neighbour_count(self) -> usize {
        match self {
            Self::Six => 6,
            Self::TwentySix => 26,
        }
    }

    /// Numeric form used on the command line and in logs.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Six => 6,
            Self::TwentySix => 26,
        }
    }

    /// Locates `offset` in the forward half, reporting whether it had to be
    /// reversed to get there.
    pub(crate) fn direction_of(self, offset: Offset) -> Option<(usize, bool)> {
        let forward = self.forward_offsets();
        if let Some(direction) = forward.iter().position(|&candidate| candidate == offset) {
            return Some((direction, false));
        }
        let reversed = offset.reversed();
        forward
            .iter()
            .position(|&candidate| candidate == reversed)
            .map(|direction| (direction, true))
    }
}

impl TryFrom<u8> for Connectivity {
    type Error = SegmentationError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            6 => Ok(Self::Six),
            26 => Ok(Self::TwentySix),
            requested => Err(SegmentationError::UnsupportedConnectivity { requested }),
        }
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-connected", self.as_u8())
    }
}

/// Extent of a voxel grid.
///
/// # Examples
/// ```
/// use voxcut_core::{GridDims, Voxel};
///
/// let dims = GridDims::new(4, 3, 2)?;
/// assert_eq!(dims.voxel_count(), 24);
/// assert_eq!(dims.strides(), [1, 4, 12]);
/// let voxel = Voxel::new(3, 2, 1);
/// assert_eq!(dims.index(voxel), 23);
/// assert_eq!(dims.voxel(23), voxel);
/// # Ok::<(), voxcut_core::SegmentationError>(())
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridDims {
    x: usize,
    y: usize,
    z: usize,
    voxel_count: usize,
}

impl GridDims {
    /// Validates and creates grid dimensions.
    ///
    /// # Errors
    /// Returns [`SegmentationError::InvalidDimensions`] when any extent is zero
    /// and [`SegmentationError::GridTooLarge`] when the voxel count overflows
    /// `usize`.
    pub fn new(x: usize, y: usize, z: usize) -> Result<Self> {
        if x == 0 || y == 0 || z == 0 {
            return Err(SegmentationError::InvalidDimensions { x, y, z });
        }
        let voxel_count = x
            .checked_mul(y)
            .and_then(|plane| plane.checked_mul(z))
            .ok_or(SegmentationError::GridTooLarge { x, y, z })?;
        Ok(Self {
            x,
            y,
            z,
            voxel_count,
        })
    }

    /// Extent along X.
    #[must_use]
    #[rustfmt::skip]
    pub const fn x(&self) -> usize { self.x }

    /// Extent along Y.
    #[must_use]
    #[rustfmt::skip]
    pub const fn y(&self) -> usize { self.y }

    /// Extent along Z.
    #[must_use]
    #[rustfmt::skip]
    pub const fn z(&self) -> usize { self.z }

    /// Total number of voxels.
    #[must_use]
    #[rustfmt::skip]
    pub const fn voxel_count(&self) -> usize { self.voxel_count }

    /// Smallest of the three extents.
    #[must_use]
    pub fn min_extent(&self) -> usize {
        self.x.min(self.y).min(self.z)
    }

    /// Linear index strides along X, Y and Z.
    #[must_use]
    pub const fn strides(&self) -> [usize; 3] {
        [1, self.x, self.x * self.y]
    }

    /// Returns whether `voxel` lies inside the grid.
    #[must_use]
    pub const fn contains(&self, voxel: Voxel) -> bool {
        voxel.x < self.x && voxel.y < self.y && voxel.z < self.z
    }

    /// Row-major linear index of `voxel`.
    #[must_use]
    pub const fn index(&self, voxel: Voxel) -> usize {
        voxel.z * self.x * self.y + voxel.y * self.x + voxel.x
    }

    /// Inverse of [`Self::index`].
    #[must_use]
    pub const fn voxel(&self, index: usize) -> Voxel {
        let plane = self.x * self.y;
        let z = index / plane;
        let within = index % plane;
        Voxel::new(within % self.x, within / self.x, z)
    }

    /// Returns the neighbour of `voxel` at `offset`, if it is inside the grid.
    #[must_use]
    pub fn neighbor(&self, voxel: Voxel, offset: Offset) -> Option<Voxel> {
        let x = voxel.x.checked_add_signed(offset.dx)?;
        let y = voxel.y.checked_add_signed(offset.dy)?;
        let z = voxel.z.checked_add_signed(offset.dz)?;
        let candidate = Voxel::new(x, y, z);
        self.contains(candidate).then_some(candidate)
    }

    /// Recovers the neighbour offset from `a` to `b` given their linear
    /// indices.
    ///
    /// Returns `None` when either index is outside the grid or the voxels are
    /// not 26-neighbours.
    ///
    /// # Examples
    /// ```
    /// use voxcut_core::{GridDims, Offset};
    ///
    /// let dims = GridDims::new(4, 4, 4)?;
    /// assert_eq!(dims.offset_between(5, 5 + 1 + 16), Some(Offset::new(1, 0, 1)));
    /// assert_eq!(dims.offset_between(0, 3), None);
    /// # Ok::<(), voxcut_core::SegmentationError>(())
    /// ```
    #[must_use]
    pub fn offset_between(&self, a: usize, b: usize) -> Option<Offset> {
        if a >= self.voxel_count || b >= self.voxel_count || a == b {
            return None;
        }
        let from = self.voxel(a);
        let to = self.voxel(b);
        let step = |lhs: usize, rhs: usize| -> Option<isize> {
            match rhs.abs_diff(lhs) {
                0 => Some(0),
                1 if rhs > lhs => Some(1),
                1 => Some(-1),
                _ => None,
            }
        };
        Some(Offset::new(
            step(from.x, to.x)?,
            step(from.y, to.y)?,
            step(from.z, to.z)?,
        ))
    }

    /// Counts the in-bounds neighbours of `voxel` under `connectivity`.
    #[must_use]
    pub fn incident_offsets(&self, voxel: Voxel, connectivity: Connectivity) -> usize {
        connectivity
            .forward_offsets()
            .iter()
            .flat_map(|&offset| [offset, offset.reversed()])
            .filter(|&offset| self.neighbor(voxel, offset).is_some())
            .count()
    }

    /// Iterates every voxel in row-major order (`x` fastest).
    pub fn voxels(&self) -> impl Iterator<Item = Voxel> + use<> {
        let Self { x, y, z, .. } = *self;
        (0..z).flat_map(move |vz| {
            (0..y).flat_map(move |vy| (0..x).map(move |vx| Voxel::new(vx, vy, vz)))
        })
    }

    /// Signed linear index delta of `offset`.
    pub(crate) fn linear_delta(&self, offset: Offset) -> isize {
        let [_, row, plane] = self.strides();
        let row = isize::try_from(row).unwrap_or(isize::MAX);
        let plane = isize::try_from(plane).unwrap_or(isize::MAX);
        offset
            .dx
            .saturating_add(offset.dy.saturating_mul(row))
            .saturating_add(offset.dz.saturating_mul(plane))
    }
}
