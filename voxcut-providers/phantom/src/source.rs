//! Adapter serving a [`Phantom`] to the segmenter.

use voxcut_core::{GridDims, Offset, Voxel, VoxelSource};

use crate::{errors::PhantomError, generation::Phantom};

/// Phantom seeds with Gaussian intensity affinities between neighbours.
///
/// # Examples
/// ```
/// use voxcut_core::{LabelVolume, SegmenterBuilder};
/// use voxcut_providers_phantom::{PhantomBuilder, PhantomSource, dice};
///
/// let phantom = PhantomBuilder::centred_sphere([9, 9, 9], 3.0).build()?;
/// let source = PhantomSource::new(phantom, 0.1)?;
/// let mut labels = LabelVolume::new(source.dims());
/// SegmenterBuilder::new()
///     .build()?
///     .segment_binary(source.dims(), &source, 1, &mut labels)?;
/// assert!(dice(labels.as_slice(), source.phantom().truth(), 1) > 0.9);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug)]
pub struct PhantomSource {
    phantom: Phantom,
    dims: GridDims,
    sigma: f64,
}

impl PhantomSource {
    /// Wraps `phantom`, using `sigma` as the affinity bandwidth.
    ///
    /// # Errors
    /// Returns [`PhantomError::InvalidSigma`] when `sigma` is not finite and
    /// positive, and [`PhantomError::Grid`] when the phantom extents do not
    /// form a valid grid.
    pub fn new(phantom: Phantom, sigma: f64) -> Result<Self, PhantomError> {
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(PhantomError::InvalidSigma { sigma });
        }
        let [x, y, z] = phantom.dims();
        let dims = GridDims::new(x, y, z)?;
        Ok(Self {
            phantom,
            dims,
            sigma,
        })
    }

    /// Grid covered by the phantom.
    #[must_use]
    #[rustfmt::skip]
    pub const fn dims(&self) -> GridDims { self.dims }

    /// Underlying phantom buffers.
    #[must_use]
    #[rustfmt::skip]
    pub const fn phantom(&self) -> &Phantom { &self.phantom }

    /// Affinity bandwidth.
    #[must_use]
    #[rustfmt::skip]
    pub const fn sigma(&self) -> f64 { self.sigma }
}

impl VoxelSource for PhantomSource {
    fn seed(&self, voxel: Voxel) -> i64 {
        self.phantom.seed_at(voxel.x, voxel.y, voxel.z)
    }

    fn image_weight(&self, voxel: Voxel, offset: Offset) -> f64 {
        self.dims.neighbor(voxel, offset).map_or(0.0, |neighbour| {
            self.phantom.affinity(
                self.dims.index(voxel),
                self.dims.index(neighbour),
                self.sigma,
            )
        })
    }

    fn name(&self) -> &str {
        "phantom"
    }
}
