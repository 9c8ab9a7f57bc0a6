//! Overlap scores against a phantom's ground truth.

/// Dice overlap of `label` between a segmentation and a reference.
///
/// Returns `1.0` when neither buffer contains `label`.
///
/// # Examples
/// ```
/// use voxcut_providers_phantom::dice;
///
/// assert_eq!(dice(&[1, 1, 0, 0], &[1, 0, 0, 0], 1), 2.0 / 3.0);
/// assert_eq!(dice(&[0, 0], &[0, 0], 5), 1.0);
/// ```
#[must_use]
#[expect(
    clippy::cast_precision_loss,
    reason = "Voxel counts stay well within f64 precision."
)]
pub fn dice(segmentation: &[i64], reference: &[i64], label: i64) -> f64 {
    let mut both = 0_usize;
    let mut total = 0_usize;
    for (&got, &want) in segmentation.iter().zip(reference) {
        total += usize::from(got == label) + usize::from(want == label);
        both += usize::from(got == label && want == label);
    }
    if total == 0 {
        1.0
    } else {
        (2 * both) as f64 / total as f64
    }
}
