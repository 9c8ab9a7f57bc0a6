use rstest::rstest;

use super::{PhantomBuilder, dice};

#[test]
fn centred_sphere_layout() {
    let phantom = PhantomBuilder::centred_sphere([7, 7, 7], 2.5)
        .build()
        .expect("valid phantom");
    assert_eq!(phantom.truth_at(3, 3, 3), 1);
    assert_eq!(phantom.truth_at(0, 3, 3), 2);
    assert_eq!(phantom.seed_at(3, 3, 3), 1);
    assert_eq!(phantom.seed_at(1, 3, 3), 0);
    assert_eq!(phantom.seed_at(6, 6, 6), 2);
    assert_eq!(phantom.intensities()[phantom.index(3, 3, 3).expect("inside")], 1.0);
    let face_seeds = phantom.seeds().iter().filter(|&&seed| seed == 2).count();
    assert_eq!(face_seeds, 7 * 7 * 7 - 5 * 5 * 5);
}

#[test]
fn pair_seeds_both_spheres() {
    let phantom = PhantomBuilder::sphere_pair([16, 8, 8], 2.0)
        .build()
        .expect("valid phantom");
    for label in 1..=3 {
        assert!(phantom.seeds().contains(&label), "label {label} unseeded");
    }
}

#[test]
fn noise_is_reproducible_and_bounded() {
    let build = |seed| {
        PhantomBuilder::centred_sphere([6, 5, 4], 2.0)
            .with_noise(0.1)
            .with_rng_seed(seed)
            .build()
            .expect("valid phantom")
    };
    assert_eq!(build(9), build(9));
    assert_ne!(build(9), build(10));
    let clean = PhantomBuilder::centred_sphere([6, 5, 4], 2.0)
        .build()
        .expect("valid phantom");
    for (noisy, exact) in build(9).intensities().iter().zip(clean.intensities()) {
        assert!((noisy - exact).abs() <= 0.1);
    }
}

#[rstest]
#[case::zero_extent(PhantomBuilder::new([0, 2, 2]))]
#[case::bad_radius(PhantomBuilder::centred_sphere([4, 4, 4], f64::NAN))]
#[case::bad_noise(PhantomBuilder::new([2, 2, 2]).with_noise(-1.0))]
#[case::bad_fraction(PhantomBuilder::new([2, 2, 2]).with_seed_fraction(0.0))]
#[case::bad_label(PhantomBuilder::new([2, 2, 2]).with_background_seed(0))]
fn rejects_unusable_descriptions(#[case] builder: PhantomBuilder) {
    assert!(builder.build().is_err());
}

#[test]
fn affinity_is_symmetric_and_bounded() {
    let phantom = PhantomBuilder::centred_sphere([5, 5, 5], 1.5)
        .with_noise(0.2)
        .build()
        .expect("valid phantom");
    let a = phantom.index(2, 2, 2).expect("inside");
    let b = phantom.index(3, 2, 2).expect("inside");
    let forward = phantom.affinity(a, b, 0.1);
    assert_eq!(forward, phantom.affinity(b, a, 0.1));
    assert!((0.0..=1.0).contains(&forward));
    assert_eq!(phantom.affinity(a, 10_000, 0.1), 0.0);
}

#[rstest]
#[case::partial(&[1, 1, 0, 0], &[1, 0, 0, 0], 1, 2.0 / 3.0)]
#[case::absent(&[0, 0], &[0, 0], 5, 1.0)]
#[case::disjoint(&[2, 0], &[0, 2], 2, 0.0)]
fn dice_scores_overlap(
    #[case] segmentation: &[i64],
    #[case] reference: &[i64],
    #[case] label: i64,
    #[case] expected: f64,
) {
    assert_eq!(dice(segmentation, reference, label), expected);
}
