//! Rasterisation of sphere phantoms into row-major buffers (`x` fastest).

use rand::{Rng, SeedableRng, rngs::SmallRng};

use crate::errors::PhantomError;

/// Solid sphere painted into a phantom.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sphere {
    /// Centre in voxel coordinates.
    pub centre: [f64; 3],
    /// Radius in voxels.
    pub radius: f64,
    /// Ground-truth and seed label; must be positive.
    pub label: i64,
    /// Noise-free intensity inside the sphere.
    pub intensity: f64,
}

impl Sphere {
    fn distance_to(&self, point: [f64; 3]) -> f64 {
        let [cx, cy, cz] = self.centre;
        let [px, py, pz] = point;
        ((px - cx).powi(2) + (py - cy).powi(2) + (pz - cz).powi(2)).sqrt()
    }
}

/// Gaussian affinity `exp(-(a - b)^2 / (2 sigma^2))`.
///
/// Always in `[0, 1]`; a non-positive or non-finite `sigma` yields `1.0`
/// for equal intensities and `0.0` otherwise.
///
/// # Examples
/// ```
/// use voxcut_providers_phantom::gaussian_affinity;
///
/// assert_eq!(gaussian_affinity(0.3, 0.3, 0.1), 1.0);
/// assert!(gaussian_affinity(0.0, 1.0, 0.1) < 1e-10);
/// ```
#[must_use]
pub fn gaussian_affinity(a: f64, b: f64, sigma: f64) -> f64 {
    let delta = a - b;
    if !(sigma.is_finite() && sigma > 0.0) {
        return if delta == 0.0 { 1.0 } else { 0.0 };
    }
    (-(delta * delta) / (2.0 * sigma * sigma)).exp()
}

/// Describes a phantom before it is rasterised.
///
/// # Examples
/// ```
/// use voxcut_providers_phantom::PhantomBuilder;
///
/// let phantom = PhantomBuilder::centred_sphere([9, 9, 9], 3.0).build()?;
/// assert_eq!(phantom.voxel_count(), 729);
/// assert_eq!(phantom.seed_at(4, 4, 4), 1);
/// assert_eq!(phantom.seed_at(0, 0, 0), 2);
/// assert_eq!(phantom.truth_at(4, 4, 4), 1);
/// # Ok::<(), voxcut_providers_phantom::PhantomError>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct PhantomBuilder {
    dims: [usize; 3],
    background_intensity: f64,
    background_label: Option<i64>,
    noise: f64,
    seed_fraction: f64,
    rng_seed: u64,
    spheres: Vec<Sphere>,
}

impl PhantomBuilder {
    /// Empty phantom with zero background, no noise and no background seeds.
    #[must_use]
    pub const fn new(dims: [usize; 3]) -> Self {
        Self {
            dims,
            background_intensity: 0.0,
            background_label: None,
            noise: 0.0,
            seed_fraction: 0.3,
            rng_seed: 0,
            spheres: Vec::new(),
        }
    }

    /// One bright sphere labelled `1` at the grid centre, with the grid's
    /// outer faces seeded as background label `2`.
    #[must_use]
    pub fn centred_sphere(dims: [usize; 3], radius: f64) -> Self {
        Self::new(dims)
            .with_sphere(Sphere {
                centre: centre_of(dims),
                radius,
                label: 1,
                intensity: 1.0,
            })
            .with_background_seed(2)
    }

    /// Two spheres labelled `1` and `2` at a quarter and three quarters of
    /// the x extent, with distinct intensities, and background seeds
    /// labelled `3`.
    #[must_use]
    pub fn sphere_pair(dims: [usize; 3], radius: f64) -> Self {
        let [cx, cy, cz] = centre_of(dims);
        let quarter = cx / 2.0;
        Self::new(dims)
            .with_sphere(Sphere {
                centre: [quarter, cy, cz],
                radius,
                label: 1,
                intensity: 1.0,
            })
            .with_sphere(Sphere {
                centre: [cx + quarter, cy, cz],
                radius,
                label: 2,
                intensity: 0.5,
            })
            .with_background_seed(3)
    }

    /// Paints `sphere`; later spheres win where they overlap.
    #[must_use]
    pub fn with_sphere(mut self, sphere: Sphere) -> Self {
        self.spheres.push(sphere);
        self
    }

    /// Intensity outside every sphere.
    #[must_use]
    pub const fn with_background_intensity(mut self, intensity: f64) -> Self {
        self.background_intensity = intensity;
        self
    }

    /// Seeds background voxels on the outer faces of the grid with `label`.
    #[must_use]
    pub const fn with_background_seed(mut self, label: i64) -> Self {
        self.background_label = Some(label);
        self
    }

    /// Adds uniform noise in `[-amplitude, amplitude]` to every voxel.
    #[must_use]
    pub const fn with_noise(mut self, amplitude: f64) -> Self {
        self.noise = amplitude;
        self
    }

    /// Fraction of each radius, around the centre, that is seeded.
    #[must_use]
    pub const fn with_seed_fraction(mut self, fraction: f64) -> Self {
        self.seed_fraction = fraction;
        self
    }

    /// Seeds the noise generator.
    #[must_use]
    pub const fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = seed;
        self
    }

    fn validate(&self) -> Result<usize, PhantomError> {
        let [x, y, z] = self.dims;
        if x == 0 || y == 0 || z == 0 {
            return Err(PhantomError::ZeroExtent { x, y, z });
        }
        let count = x
            .checked_mul(y)
            .and_then(|plane| plane.checked_mul(z))
            .ok_or(PhantomError::TooLarge)?;
        if !(self.noise.is_finite() && self.noise >= 0.0) {
            return Err(PhantomError::InvalidNoise { noise: self.noise });
        }
        if !(self.seed_fraction > 0.0 && self.seed_fraction <= 1.0) {
            return Err(PhantomError::InvalidSeedFraction {
                fraction: self.seed_fraction,
            });
        }
        if let Some(label) = self.background_label.filter(|&label| label <= 0) {
            return Err(PhantomError::InvalidLabel { label });
        }
        for sphere in &self.spheres {
            if sphere.label <= 0 {
                return Err(PhantomError::InvalidLabel {
                    label: sphere.label,
                });
            }
            if !(sphere.radius.is_finite() && sphere.radius > 0.0) {
                return Err(PhantomError::InvalidRadius {
                    label: sphere.label,
                    radius: sphere.radius,
                });
            }
        }
        Ok(count)
    }

    /// Rasterises the description.
    ///
    /// # Errors
    /// Returns [`PhantomError`] when an extent is zero, the voxel count
    /// overflows, or a sphere, label, noise or seed-fraction value is
    /// unusable.
    pub fn build(self) -> Result<Phantom, PhantomError> {
        let count = self.validate()?;
        let [dx, dy, dz] = self.dims;
        let mut rng = SmallRng::seed_from_u64(self.rng_seed);
        let mut intensities = Vec::with_capacity(count);
        let mut truth = Vec::with_capacity(count);
        let mut seeds = Vec::with_capacity(count);

        for z in 0..dz {
            for y in 0..dy {
                for x in 0..dx {
                    let point = coordinates(x, y, z);
                    let inside = self
                        .spheres
                        .iter()
                        .rev()
                        .map(|sphere| (sphere, sphere.distance_to(point)))
                        .find(|(sphere, distance)| *distance <= sphere.radius);
                    let noise = if self.noise > 0.0 {
                        rng.gen_range(-self.noise..=self.noise)
                    } else {
                        0.0
                    };
                    let on_face =
                        x == 0 || y == 0 || z == 0 || x + 1 == dx || y + 1 == dy || z + 1 == dz;
                    match inside {
                        Some((sphere, distance)) => {
                            intensities.push(sphere.intensity + noise);
                            truth.push(sphere.label);
                            let in_core = distance <= sphere.radius * self.seed_fraction;
                            seeds.push(if in_core { sphere.label } else { 0 });
                        }
                        None => {
                            intensities.push(self.background_intensity + noise);
                            truth.push(self.background_label.unwrap_or(0));
                            seeds.push(self.background_label.filter(|_| on_face).unwrap_or(0));
                        }
                    }
                }
            }
        }

        let mut phantom = Phantom {
            dims: self.dims,
            intensities,
            truth,
            seeds,
        };
        for sphere in &self.spheres {
            if let Some(index) = phantom.nearest_index(sphere.centre)
                && phantom.truth[index] == sphere.label
            {
                phantom.seeds[index] = sphere.label;
            }
        }
        Ok(phantom)
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "Phantom extents are far below 2^52."
)]
fn coordinates(x: usize, y: usize, z: usize) -> [f64; 3] {
    [x as f64, y as f64, z as f64]
}

fn centre_of([x, y, z]: [usize; 3]) -> [f64; 3] {
    let [fx, fy, fz] = coordinates(x, y, z);
    [(fx - 1.0) / 2.0, (fy - 1.0) / 2.0, (fz - 1.0) / 2.0]
}

/// Rasterised phantom.
#[derive(Clone, Debug, PartialEq)]
pub struct Phantom {
    dims: [usize; 3],
    intensities: Vec<f64>,
    truth: Vec<i64>,
    seeds: Vec<i64>,
}

impl Phantom {
    /// Extents `[x, y, z]`.
    #[must_use]
    #[rustfmt::skip]
    pub const fn dims(&self) -> [usize; 3] { self.dims }

    /// Number of voxels.
    #[must_use]
    pub fn voxel_count(&self) -> usize {
        self.intensities.len()
    }

    /// Row-major index of `(x, y, z)`, or `None` outside the grid.
    #[must_use]
    pub fn index(&self, x: usize, y: usize, z: usize) -> Option<usize> {
        let [dx, dy, dz] = self.dims;
        (x < dx && y < dy && z < dz).then(|| (z * dy + y) * dx + x)
    }

    /// Noisy intensities.
    #[must_use]
    #[rustfmt::skip]
    pub fn intensities(&self) -> &[f64] { &self.intensities }

    /// Labels a perfect segmentation would produce; `0` marks background
    /// when no background label was configured.
    #[must_use]
    #[rustfmt::skip]
    pub fn truth(&self) -> &[i64] { &self.truth }

    /// Sparse seed volume; `0` marks unlabeled voxels.
    #[must_use]
    #[rustfmt::skip]
    pub fn seeds(&self) -> &[i64] { &self.seeds }

    /// Seed at `(x, y, z)`, `0` outside the grid.
    #[must_use]
    pub fn seed_at(&self, x: usize, y: usize, z: usize) -> i64 {
        self.index(x, y, z).map_or(0, |index| self.seeds[index])
    }

    /// Ground-truth label at `(x, y, z)`, `0` outside the grid.
    #[must_use]
    pub fn truth_at(&self, x: usize, y: usize, z: usize) -> i64 {
        self.index(x, y, z).map_or(0, |index| self.truth[index])
    }

    /// Number of seeded voxels.
    #[must_use]
    pub fn seeded_voxels(&self) -> usize {
        self.seeds.iter().filter(|&&seed| seed != 0).count()
    }

    /// Gaussian affinity between voxels `a` and `b` by linear index; `0.0`
    /// when either index is outside the grid.
    #[must_use]
    pub fn affinity(&self, a: usize, b: usize, sigma: f64) -> f64 {
        match (self.intensities.get(a), self.intensities.get(b)) {
            (Some(&first), Some(&second)) => gaussian_affinity(first, second, sigma),
            _ => 0.0,
        }
    }

    fn nearest_index(&self, point: [f64; 3]) -> Option<usize> {
        let [dx, dy, dz] = self.dims;
        let [x, y, z] = point;
        self.index(
            nearest_coordinate(x, dx)?,
            nearest_coordinate(y, dy)?,
            nearest_coordinate(z, dz)?,
        )
    }
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    reason = "The rounded value is range-checked against the extent first."
)]
fn nearest_coordinate(value: f64, extent: usize) -> Option<usize> {
    let rounded = value.round();
    (rounded >= 0.0 && rounded < extent as f64).then_some(rounded as usize)
}
