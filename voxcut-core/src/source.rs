//! Boundary between caller-owned voxel data and the segmentation engine.
//!
//! The engine never owns image data. Seeds and neighbour affinities are read
//! through a [`VoxelSource`] for the duration of one call, and the final
//! labeling is pushed back through a [`LabelSink`].

use crate::grid::{GridDims, Offset, Voxel};

/// Read access to a seed volume and its neighbour affinities.
///
/// # Examples
/// ```
/// use voxcut_core::{GridDims, Offset, Voxel, VoxelSource};
///
/// struct Flat;
///
/// impl VoxelSource for Flat {
///     fn seed(&self, voxel: Voxel) -> i64 { i64::from(voxel.x == 0) }
///     fn image_weight(&self, _: Voxel, _: Offset) -> f64 { 0.5 }
/// }
///
/// let dims = GridDims::new(3, 1, 1)?;
/// assert_eq!(Flat.seed(Voxel::new(0, 0, 0)), 1);
/// assert_eq!(Flat.image_weight_between(dims, 0, 1), Some(0.5));
/// assert_eq!(Flat.image_weight_between(dims, 0, 2), None);
/// # Ok::<(), voxcut_core::SegmentationError>(())
/// ```
pub trait VoxelSource {
    /// Seed label at `voxel`; `0` means unlabeled.
    fn seed(&self, voxel: Voxel) -> i64;

    /// Affinity between `voxel` and its neighbour at `offset`.
    ///
    /// Called only for in-bounds neighbour pairs. Implementations must be
    /// symmetric and return finite non-negative values; anything else aborts
    /// the segmentation with
    /// [`SegmentationError::InvalidImageWeight`](crate::SegmentationError::InvalidImageWeight).
    fn image_weight(&self, voxel: Voxel, offset: Offset) -> f64;

    /// Affinity between two voxels given by linear index.
    ///
    /// Returns `None` when the indices are outside `dims` or the voxels are
    /// not 26-neighbours.
    fn image_weight_between(&self, dims: GridDims, a: usize, b: usize) -> Option<f64> {
        let offset = dims.offset_between(a, b)?;
        Some(self.image_weight(dims.voxel(a), offset))
    }

    /// Human-readable name used in log fields.
    fn name(&self) -> &str {
        "voxel-source"
    }
}

/// [`VoxelSource`] assembled from a seed closure and a weight closure.
///
/// # Examples
/// ```
/// use voxcut_core::{CallbackSource, Offset, Voxel, VoxelSource};
///
/// let source = CallbackSource::new(|voxel: Voxel| if voxel.z > 0 { 2 } else { 0 }, |_, _| 1.0);
/// assert_eq!(source.seed(Voxel::new(0, 0, 2)), 2);
/// assert_eq!(source.image_weight(Voxel::default(), Offset::new(1, 0, 0)), 1.0);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct CallbackSource<S, W> {
    seed: S,
    weight: W,
}

impl<S, W> CallbackSource<S, W>
where
    S: Fn(Voxel) -> i64,
    W: Fn(Voxel, Offset) -> f64,
{
    /// Wraps the two accessors.
    #[must_use]
    pub const fn new(seed: S, weight: W) -> Self {
        Self { seed, weight }
    }
}

impl<S, W> VoxelSource for CallbackSource<S, W>
where
    S: Fn(Voxel) -> i64,
    W: Fn(Voxel, Offset) -> f64,
{
    fn seed(&self, voxel: Voxel) -> i64 {
        (self.seed)(voxel)
    }

    fn image_weight(&self, voxel: Voxel, offset: Offset) -> f64 {
        (self.weight)(voxel, offset)
    }

    fn name(&self) -> &str {
        "callback"
    }
}

/// Receiver for the final labeling.
///
/// The engine calls [`LabelSink::set_label`] exactly once per voxel, in
/// row-major order, and only after the whole labeling has been resolved.
pub trait LabelSink {
    /// Stores the label chosen for `voxel`.
    fn set_label(&mut self, voxel: Voxel, label: i64);
}

impl<F> LabelSink for F
where
    F: FnMut(Voxel, i64),
{
    fn set_label(&mut self, voxel: Voxel, label: i64) {
        self(voxel, label);
    }
}

/// Dense in-memory labeling, usable as a [`LabelSink`].
///
/// # Examples
/// ```
/// use voxcut_core::{GridDims, LabelSink, LabelVolume, Voxel};
///
/// let dims = GridDims::new(2, 2, 1)?;
/// let mut volume = LabelVolume::new(dims);
/// volume.set_label(Voxel::new(1, 1, 0), 7);
/// assert_eq!(volume.get(Voxel::new(1, 1, 0)), Some(7));
/// assert_eq!(volume.as_slice(), &[0, 0, 0, 7]);
/// # Ok::<(), voxcut_core::SegmentationError>(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelVolume {
    dims: GridDims,
    labels: Vec<i64>,
}

impl LabelVolume {
    /// Creates a volume filled with `0`.
    #[must_use]
    pub fn new(dims: GridDims) -> Self {
        Self {
            dims,
            labels: vec![0; dims.voxel_count()],
        }
    }

    /// Grid the volume covers.
    #[must_use]
    pub const fn dims(&self) -> GridDims {
        self.dims
    }

    /// Label at `voxel`, or `None` outside the grid.
    #[must_use]
    pub fn get(&self, voxel: Voxel) -> Option<i64> {
        if !self.dims.contains(voxel) {
            return None;
        }
        self.labels.get(self.dims.index(voxel)).copied()
    }

    /// Labels in row-major order.
    #[must_use]
    pub fn as_slice(&self) -> &[i64] {
        &self.labels
    }

    /// Consumes the volume, returning the row-major labels.
    #[must_use]
    pub fn into_vec(self) -> Vec<i64> {
        self.labels
    }
}

impl LabelSink for LabelVolume {
    fn set_label(&mut self, voxel: Voxel, label: i64) {
        if !self.dims.contains(voxel) {
            return;
        }
        let index = self.dims.index(voxel);
        if let Some(slot) = self.labels.get_mut(index) {
            *slot = label;
        }
    }
}
