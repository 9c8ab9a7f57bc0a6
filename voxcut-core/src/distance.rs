//! Physical neighbour distances derived from voxel spacing.
//!
//! Neighbour capacities are divided by the centre-to-centre distance of the
//! two voxels, so anisotropic scans do not bias the cut towards the finely
//! sampled axis.

use crate::{
    error::{Result, SegmentationError},
    grid::{Connectivity, DistanceClass, Offset},
};

/// Physical size of one voxel along each axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoxelSpacing {
    x: f64,
    y: f64,
    z: f64,
}

impl VoxelSpacing {
    /// Validates and creates a spacing.
    ///
    /// # Errors
    /// Returns [`SegmentationError::InvalidSpacing`] when a component is not
    /// finite or not strictly positive.
    pub fn new(x: f64, y: f64, z: f64) -> Result<Self> {
        let valid = |value: f64| value.is_finite() && value > 0.0;
        if !(valid(x) && valid(y) && valid(z)) {
            return Err(SegmentationError::InvalidSpacing { x, y, z });
        }
        Ok(Self { x, y, z })
    }

    /// Unit spacing on every axis.
    #[must_use]
    pub const fn isotropic() -> Self {
        Self {
            x: 1.0,
            y: 1.0,
            z: 1.0,
        }
    }

    /// Spacing components as `[x, y, z]`.
    #[must_use]
    pub const fn components(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl Default for VoxelSpacing {
    fn default() -> Self {
        Self::isotropic()
    }
}

/// Centre-to-centre distances for the seven neighbour classes.
///
/// # Examples
/// ```
/// use voxcut_core::{DistanceClass, VoxelDistances, VoxelSpacing};
///
/// let distances = VoxelDistances::from_spacing(VoxelSpacing::isotropic(), true);
/// assert!((distances.for_class(DistanceClass::Xyz) - 1.0).abs() < 1e-12);
/// assert!((distances.for_class(DistanceClass::X) - 1.0 / 3f64.sqrt()).abs() < 1e-12);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoxelDistances {
    x: f64,
    y: f64,
    z: f64,
    xy: f64,
    xz: f64,
    yz: f64,
    xyz: f64,
}

impl VoxelDistances {
    /// Derives neighbour distances from a validated spacing.
    ///
    /// With `normalized` set, every distance is divided by the space-diagonal
    /// length so the longest neighbour distance is exactly one.
    #[must_use]
    pub fn from_spacing(spacing: VoxelSpacing, normalized: bool) -> Self {
        let VoxelSpacing { x, y, z } = spacing;
        let raw = Self {
            x,
            y,
            z,
            xy: x.hypot(y),
            xz: x.hypot(z),
            yz: y.hypot(z),
            xyz: (x * x + y * y + z * z).sqrt(),
        };
        if !normalized {
            return raw;
        }
        let scale = raw.xyz;
        Self {
            x: raw.x / scale,
            y: raw.y / scale,
            z: raw.z / scale,
            xy: raw.xy / scale,
            xz: raw.xz / scale,
            yz: raw.yz / scale,
            xyz: 1.0,
        }
    }

    /// Distance for a neighbour class.
    #[must_use]
    pub const fn for_class(&self, class: DistanceClass) -> f64 {
        match class {
            DistanceClass::X => self.x,
            DistanceClass::Y => self.y,
            DistanceClass::Z => self.z,
            DistanceClass::Xy => self.xy,
            DistanceClass::Xz => self.xz,
            DistanceClass::Yz => self.yz,
            DistanceClass::Xyz => self.xyz,
        }
    }

    /// Distance to the neighbour at `offset`.
    ///
    /// Returns `None` for offsets that do not name a 26-neighbour.
    #[must_use]
    pub fn for_offset(&self, offset: Offset) -> Option<f64> {
        offset.class().map(|class| self.for_class(class))
    }

    /// Distances along each forward offset of `connectivity`, in offset order.
    pub(crate) fn forward(&self, connectivity: Connectivity) -> Vec<f64> {
        connectivity
            .forward_offsets()
            .iter()
            .filter_map(|&offset| self.for_offset(offset))
            .collect()
    }

    /// All seven distances in `X, Y, Z, XY, XZ, YZ, XYZ` order.
    #[must_use]
    pub const fn as_array(&self) -> [f64; 7] {
        [
            self.x, self.y, self.z, self.xy, self.xz, self.yz, self.xyz,
        ]
    }
}
