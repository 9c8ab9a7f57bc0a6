//! Dense indexing of the seed labels observed in a volume.

use std::collections::{HashMap, hash_map::Entry};

use crate::grid::{GridDims, Voxel};

/// Bijection between observed seed labels and dense indices `0..L`.
///
/// Indices are assigned in first-encounter order of a row-major scan, so the
/// mapping is a pure function of the seed volume.
///
/// # Examples
/// ```
/// use voxcut_core::{GridDims, LabelIndexMaps};
///
/// let dims = GridDims::new(5, 1, 1)?;
/// let seeds = [0, 0, 5, 5, 9];
/// let maps = LabelIndexMaps::scan(dims, |voxel| seeds[voxel.x], true);
/// assert_eq!(maps.labels(), &[5, 9]);
/// assert_eq!(maps.index_of(9), Some(1));
/// assert_eq!(maps.label_at(0), Some(5));
/// # Ok::<(), voxcut_core::SegmentationError>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelIndexMaps {
    labels: Vec<i64>,
    indices: HashMap<i64, usize>,
}

impl LabelIndexMaps {
    /// Scans every voxel of `dims` and records each distinct seed label.
    ///
    /// When `ignore_background` is set, the unlabeled value `0` is skipped.
    pub fn scan<F>(dims: GridDims, mut seed: F, ignore_background: bool) -> Self
    where
        F: FnMut(Voxel) -> i64,
    {
        let mut maps = Self::default();
        for voxel in dims.voxels() {
            let label = seed(voxel);
            if ignore_background && label == 0 {
                continue;
            }
            maps.insert(label);
        }
        maps
    }

    fn insert(&mut self, label: i64) {
        if let Entry::Vacant(slot) = self.indices.entry(label) {
            slot.insert(self.labels.len());
            self.labels.push(label);
        }
    }

    /// Number of distinct labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns `true` when no label was observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Dense index of `label`, if it was observed.
    #[must_use]
    pub fn index_of(&self, label: i64) -> Option<usize> {
        self.indices.get(&label).copied()
    }

    /// Label stored at dense `index`.
    #[must_use]
    pub fn label_at(&self, index: usize) -> Option<i64> {
        self.labels.get(index).copied()
    }

    /// Observed labels ordered by dense index.
    #[must_use]
    pub fn labels(&self) -> &[i64] {
        &self.labels
    }
}
