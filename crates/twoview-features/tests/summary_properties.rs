use rand::seq::SliceRandom;
use rand::{rngs::StdRng, Rng, SeedableRng};
use twoview_features::{CorrespondenceSummary, SummaryParams, FEATURE_LEN};
use twoview_geometry::Correspondence;

fn random_correspondences(rng: &mut StdRng, n: usize) -> Vec<Correspondence> {
    (0..n)
        .map(|_| {
            let x0 = rng.random_range(0.0..640.0);
            let y0 = rng.random_range(0.0..480.0);
            Correspondence::new(
                x0,
                y0,
                x0 + rng.random_range(-40.0..40.0),
                y0 + rng.random_range(-40.0..40.0),
            )
        })
        .collect()
}

#[test]
fn features_do_not_depend_on_order() {
    let mut rng = StdRng::seed_from_u64(0);
    let params = SummaryParams::default();
    for n in [1, 2, 17, 250] {
        let mut correspondences = random_correspondences(&mut rng, n);
        let reference = CorrespondenceSummary::compute(&correspondences).features(&params);
        for _ in 0..5 {
            correspondences.shuffle(&mut rng);
            let features = CorrespondenceSummary::compute(&correspondences).features(&params);
            for (a, b) in reference.iter().zip(features.iter()) {
                assert_eq!(a.to_bits(), b.to_bits());
            }
        }
    }
}

#[test]
fn direction_bins_have_unit_norm() {
    let mut rng = StdRng::seed_from_u64(1);
    let params = SummaryParams::default();
    for n in [1, 3, 100] {
        let features = CorrespondenceSummary::compute(&random_correspondences(&mut rng, n))
            .features(&params);
        assert_eq!(features.len(), FEATURE_LEN);
        let norm = features[15..].iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
    }
}

#[test]
fn bin_counts_add_up() {
    let mut rng = StdRng::seed_from_u64(2);
    let correspondences = random_correspondences(&mut rng, 64);
    let summary = CorrespondenceSummary::compute(&correspondences);
    assert_eq!(summary.bins.iter().sum::<usize>(), 64);
    assert_eq!(summary.count, 64);
}
