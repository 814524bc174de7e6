use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use mzpeaks::peak::MZPoint;

use mzisogroup::{
    Feature, FeatureList, IsotopeGrouper, IsotopeGrouperBuilder, IsotopePattern,
    IsotopePatternStatus, MobilityTolerance, MzTolerance, ProcessingState, RepresentativeIsotope,
    RtTolerance,
};

fn scenario_features(third_rt: f32) -> Vec<Feature> {
    vec![
        Feature::new(1, 100.0, 5.00, 1000.0),
        Feature::new(2, 101.0033, 5.01, 300.0),
        Feature::new(3, 102.0066, third_rt, 90.0),
    ]
}

fn builder() -> IsotopeGrouperBuilder {
    let mut builder = IsotopeGrouperBuilder::new();
    builder
        .max_charge(1)
        .mz_tolerance(MzTolerance::new(0.003, 0.0))
        .rt_tolerance(RtTolerance(0.05))
        .representative(RepresentativeIsotope::MostIntense);
    builder
}

fn run(builder: &IsotopeGrouperBuilder, features: Vec<Feature>) -> FeatureList {
    let list = FeatureList::new("features", "sample.mzML", features);
    let mut grouper: IsotopeGrouper = builder.build().unwrap();
    let result = grouper.run(&list).unwrap().unwrap();
    assert_eq!(grouper.state(), ProcessingState::Done);
    result.feature_list
}

/// A mixture of isolated features and charge 1, 2 and 3 patterns spread over RT
fn mixture() -> Vec<Feature> {
    let mut features = Vec::new();
    let mut id = 0;
    for (k, (base_mz, charge)) in [(200.0, 1), (350.0, 2), (480.0, 3), (610.0, 1), (745.0, 2)]
        .into_iter()
        .enumerate()
    {
        let rt = 2.0 + k as f32;
        let heights = [1000.0, 600.0, 250.0, 80.0];
        for (order, height) in heights.iter().enumerate() {
            id += 1;
            let mz = base_mz + order as f64 * 1.003355 / charge as f64;
            features.push(Feature::new(id, mz, rt, *height));
        }
        id += 1;
        features.push(Feature::new(id, base_mz + 37.1, rt, 500.0));
    }
    features
}

#[test_log::test]
fn test_scenario_all_merge() {
    let out = run(&builder(), scenario_features(4.99));
    assert_eq!(out.len(), 1);
    let rep = &out.features[0];
    assert_eq!(rep.id, 1);
    assert_eq!(rep.mz, 100.0);
    assert_eq!(rep.charge, 1);
    let pattern = rep.isotope_pattern.as_ref().unwrap();
    assert_eq!(pattern.len(), 3);
    assert_eq!(pattern.charge, 1);
    assert_eq!(pattern.status, IsotopePatternStatus::Detected);
    let mzs: Vec<f64> = pattern.iter().map(|p| p.mz).collect();
    assert_eq!(mzs, vec![100.0, 101.0033, 102.0066]);
}

#[test_log::test]
fn test_scenario_rt_outlier_untouched() {
    let out = run(&builder(), scenario_features(5.50));
    assert_eq!(out.len(), 2);
    let rep = out.get_by_id(1).unwrap();
    assert_eq!(rep.isotope_pattern.as_ref().map(|p| p.len()), Some(2));
    let third = out.get_by_id(3).unwrap();
    assert_eq!(third, &Feature::new(3, 102.0066, 5.50, 90.0));
    assert!(out.get_by_id(2).is_none());
}

#[test]
fn test_untouched_are_unchanged() {
    let features = mixture();
    let mut b = builder();
    b.max_charge(3);
    let out = run(&b, features.clone());
    let isolated: Vec<&Feature> = features.iter().filter(|f| f.id % 5 == 0).collect();
    assert_eq!(isolated.len(), 5);
    for f in isolated {
        assert_eq!(out.get_by_id(f.id), Some(f));
    }
}

#[test]
fn test_groups_are_exclusive() {
    let mut features = mixture();
    // a near-duplicate at the first isotope of the first group
    features.push(Feature::new(100, 201.0040, 2.0, 550.0));
    let mut b = builder();
    b.max_charge(3);
    let out = run(&b, features);

    let mut seen = HashSet::new();
    let mut n_groups = 0;
    for f in out.iter() {
        if let Some(pattern) = f.isotope_pattern.as_ref() {
            n_groups += 1;
            for p in pattern.iter() {
                assert!(
                    seen.insert(p.mz.to_bits()),
                    "{} is in more than one pattern",
                    p.mz
                );
            }
        }
    }
    assert_eq!(n_groups, 5);
    let first = out.get_by_id(1).unwrap();
    assert_eq!(first.isotope_pattern.as_ref().map(|p| p.len()), Some(5));
}

#[test]
fn test_charges_assigned() {
    let mut b = builder();
    b.max_charge(4);
    let out = run(&b, mixture());
    let charges: Vec<(u32, i32)> = out
        .iter()
        .filter(|f| f.has_isotope_pattern())
        .map(|f| (f.id, f.charge))
        .collect();
    assert_eq!(charges, vec![(1, 1), (6, 2), (11, 3), (16, 1), (21, 2)]);
}

#[test]
fn test_monotonic_shape_toggle() {
    // the most intense feature is the second isotope
    let features = vec![
        Feature::new(1, 500.0, 8.0, 700.0),
        Feature::new(2, 501.003355, 8.0, 1000.0),
        Feature::new(3, 502.00671, 8.0, 400.0),
    ];

    let out = run(&builder(), features.clone());
    for f in out.iter() {
        if let Some(pattern) = f.isotope_pattern.as_ref() {
            assert!(pattern.iter().all(|p| p.mz >= f.mz));
        }
    }
    assert_eq!(out.len(), 2);
    assert!(out.get_by_id(1).unwrap().isotope_pattern.is_none());

    let mut b = builder();
    b.monotonic_shape(false);
    let out = run(&b, features);
    assert_eq!(out.len(), 1);
    let rep = &out.features[0];
    assert_eq!(rep.id, 2);
    let pattern = rep.isotope_pattern.as_ref().unwrap();
    assert_eq!(pattern.lowest_mz(), Some(500.0));
    assert!(pattern.lowest_mz().unwrap() < rep.mz);
}

#[test]
fn test_tie_prefers_lower_charge() {
    // spacing consistent with both charge 1 and charge 2
    let features = vec![
        Feature::new(1, 300.0, 6.0, 1000.0),
        Feature::new(2, 300.5016775, 6.0, 200.0),
        Feature::new(3, 301.003355, 6.0, 500.0),
        Feature::new(4, 302.00671, 6.0, 150.0),
    ];
    let mut b = builder();
    b.max_charge(2);
    let out = run(&b, features);
    let rep = out.get_by_id(1).unwrap();
    assert_eq!(rep.charge, 1);
    let mzs: Vec<f64> = rep
        .isotope_pattern
        .as_ref()
        .unwrap()
        .iter()
        .map(|p| p.mz)
        .collect();
    assert_eq!(mzs, vec![300.0, 301.003355, 302.00671]);
    assert!(out.get_by_id(2).is_some());
}

#[test]
fn test_ms2_retention() {
    let mut features = scenario_features(5.0);
    features[1] = features[1].clone().with_ms2(true);

    let mut b = builder();
    b.keep_ms2_members(true);
    let out = run(&b, features.clone());
    assert_eq!(out.len(), 2);
    let kept = out.get_by_id(2).unwrap();
    assert!(kept.isotope_pattern.is_none());
    assert_eq!(kept.charge, 0);
    assert_eq!(kept, &features[1]);

    b.keep_ms2_members(false);
    let out = run(&b, features);
    assert_eq!(out.len(), 1);
    assert!(out.get_by_id(2).is_none());
}

#[test_log::test]
fn test_existing_pattern_protected() {
    let original = IsotopePattern::new(
        vec![MZPoint::new(100.0, 1000.0), MZPoint::new(101.0034, 280.0)],
        1,
        IsotopePatternStatus::Predicted,
        "C5H10O2".to_string(),
    );
    let mut features = scenario_features(5.0);
    features[0] = features[0].clone().with_isotope_pattern(original.clone());
    let out = run(&builder(), features);
    assert_eq!(out.len(), 1);
    let rep = &out.features[0];
    assert_eq!(rep.id, 1);
    assert_eq!(rep.isotope_pattern.as_ref(), Some(&original));
}

#[test]
fn test_patterned_feature_absorbed_by_other_seed() {
    let earlier = IsotopePattern::new(
        vec![MZPoint::new(101.0033, 300.0)],
        2,
        IsotopePatternStatus::Predicted,
        "from an earlier stage".to_string(),
    );
    let mut features = scenario_features(5.0);
    features[1] = features[1].clone().with_isotope_pattern(earlier);
    let out = run(&builder(), features);
    let ids: Vec<u32> = out.iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![1]);
    let rep = &out.features[0];
    assert_eq!(rep.charge, 1);
    let pattern = rep.isotope_pattern.as_ref().unwrap();
    assert_eq!(pattern.status, IsotopePatternStatus::Detected);
    assert_eq!(pattern.len(), 3);
}

#[test]
fn test_mobility_separates() {
    let features = vec![
        Feature::new(1, 400.0, 5.0, 1000.0).with_mobility(0.80),
        Feature::new(2, 401.003355, 5.0, 300.0).with_mobility(0.95),
        Feature::new(3, 800.0, 5.0, 900.0).with_mobility(1.10),
        Feature::new(4, 801.003355, 5.0, 250.0).with_mobility(1.104),
    ];
    let mut b = builder();
    b.mobility_tolerance(Some(MobilityTolerance(0.008)));
    let out = run(&b, features.clone());
    assert_eq!(out.len(), 3);
    assert!(out.get_by_id(2).is_some());
    assert!(out.get_by_id(4).is_none());

    b.mobility_tolerance(None);
    let out = run(&b, features);
    assert_eq!(out.len(), 2);
}

#[test]
fn test_output_sorted_by_rt() {
    let mut b = builder();
    b.max_charge(3);
    let out = run(&b, mixture());
    assert!(out
        .features
        .windows(2)
        .all(|w| (w[0].rt, w[0].mz) <= (w[1].rt, w[1].mz)));
}

#[test]
fn test_cancel_discards() {
    let flag = Arc::new(AtomicBool::new(true));
    let list = FeatureList::new("features", "sample.mzML", mixture());
    let mut grouper = builder().build().unwrap().with_cancellation(flag.clone());
    assert!(grouper.run(&list).unwrap().is_none());
    assert_eq!(grouper.state(), ProcessingState::Cancelled);

    flag.store(false, std::sync::atomic::Ordering::Release);
    assert!(grouper.run(&list).unwrap().is_some());
    assert_eq!(grouper.state(), ProcessingState::Done);
}
