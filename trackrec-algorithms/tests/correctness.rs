#![allow(clippy::uninlined_format_args, clippy::cast_precision_loss)]
use rand::rngs::StdRng;
use rand::SeedableRng;
use trackrec_algorithms::{
    extract_events, extract_tracks, DbscanClustering, DbscanConfig, ExtractionAlgorithm,
    ExtractionParams, PointLabel, RansacConfig, RansacEngine, SamplerConfig, SamplingMethod,
};
use trackrec_core::{Hit, Point3};

/// Two parallel tracks along X: y = 0 and y = 20, both at z = 0.
fn two_tracks(points_per_track: u32) -> Vec<Hit> {
    let mut hits = Vec::new();
    for i in 0..points_per_track {
        hits.push(Hit::new(Point3::new(f64::from(i), 0.0, 0.0), 10.0, 0));
    }
    for i in 0..points_per_track {
        hits.push(Hit::new(Point3::new(f64::from(i), 20.0, 0.0), 10.0, 1));
    }
    hits
}

fn ransac_config() -> RansacConfig {
    RansacConfig::default()
        .with_iterations(200)
        .with_min_pattern_points(10)
        .with_distance_threshold(2.0)
}

fn assert_along_x(direction: Point3) {
    let cos = direction.unit().dot(&Point3::new(1.0, 0.0, 0.0)).abs();
    assert!(cos > 0.9999, "direction {:?} is not along X", direction);
}

#[test]
fn test_ransac_recovers_two_tracks() {
    let hits = two_tracks(30);
    let engine = RansacEngine::new(ransac_config());
    let mut rng = StdRng::seed_from_u64(1234);
    let extraction = engine.run(&hits, &mut rng).unwrap();

    assert_eq!(extraction.clusters.len(), 2);
    assert!(extraction.noise.is_empty());
    for cluster in &extraction.clusters {
        assert_eq!(cluster.len(), 30);
        assert!(cluster.line.is_fitted());
        assert_along_x(cluster.line.direction());
        let y = cluster.hits[0].pos.y;
        assert!(cluster.iter().all(|h| (h.pos.y - y).abs() < f64::EPSILON));
    }
}

#[test]
fn test_ransac_every_sampler_recovers_two_tracks() {
    let hits = two_tracks(30);
    for method in [
        SamplingMethod::Uniform,
        SamplingMethod::Gaussian,
        SamplingMethod::Charge,
        SamplingMethod::WeightedGaussian,
    ] {
        let config = ransac_config()
            .with_sampler(SamplerConfig::default().with_method(method).with_sigma(15.0));
        let mut rng = StdRng::seed_from_u64(99);
        let extraction = RansacEngine::new(config).run(&hits, &mut rng).unwrap();
        assert_eq!(extraction.clusters.len(), 2, "{:?}", method);
        assert!(extraction.noise.is_empty(), "{:?}", method);
    }
}

#[test]
fn test_ransac_extracts_contiguous_runs_only() {
    // One track split by a far-away hit in the middle of the sequence.
    let mut hits: Vec<Hit> = (0..10).map(|i| Hit::at(f64::from(i), 0.0, 0.0, 1.0)).collect();
    hits.push(Hit::at(5.0, 80.0, 40.0, 1.0));
    hits.extend((10..20).map(|i| Hit::at(f64::from(i), 0.0, 0.0, 1.0)));

    let config = RansacConfig::default()
        .with_iterations(100)
        .with_min_pattern_points(5)
        .with_distance_threshold(1.0);
    let mut rng = StdRng::seed_from_u64(5);
    let extraction = RansacEngine::new(config).run(&hits, &mut rng).unwrap();

    assert_eq!(extraction.clusters.len(), 2);
    assert_eq!(extraction.clusters[0].len(), 10);
    assert_eq!(extraction.clusters[1].len(), 10);
    assert_eq!(extraction.noise.len(), 1);
    assert!((extraction.noise[0].pos.y - 80.0).abs() < f64::EPSILON);
}

#[test]
fn test_ransac_charge_threshold_reaches_refit() {
    let mut hits = two_tracks(30);
    // A low-charge hit close to track A but off its axis.
    hits.insert(15, Hit::at(15.0, 1.5, 0.0, 0.1));
    let config = ransac_config().with_charge_threshold(1.0);
    let mut rng = StdRng::seed_from_u64(8);
    let extraction = RansacEngine::new(config).run(&hits, &mut rng).unwrap();

    let track_a = extraction
        .clusters
        .iter()
        .find(|c| c.len() == 31)
        .expect("track A keeps the low-charge hit");
    assert!(track_a.line.quality() < 1e-9);
    assert!(track_a.line.point().y.abs() < 1e-9);
}

#[test]
fn test_ransac_failed_refit_leaves_cluster_unfitted() {
    // Every hit falls below the charge threshold, so the refit has no points.
    let hits: Vec<Hit> = (0..30).map(|i| Hit::at(f64::from(i), 0.0, 0.0, 10.0)).collect();
    let config = ransac_config().with_charge_threshold(100.0);
    let mut rng = StdRng::seed_from_u64(3);
    let extraction = RansacEngine::new(config).run(&hits, &mut rng).unwrap();

    assert_eq!(extraction.clusters.len(), 1);
    let cluster = &extraction.clusters[0];
    assert_eq!(cluster.len(), 30);
    assert!(!cluster.line.is_fitted());
    assert!(cluster.line.quality().is_nan());
}

#[test]
fn test_dbscan_separates_two_tracks() {
    let hits = two_tracks(30);
    let algo = DbscanClustering::new(DbscanConfig {
        epsilon: 1.5,
        min_points: 2,
        min_cluster_size: 1,
    });
    let mut state = algo.create_state();
    let extraction = algo.cluster(&hits, &mut state);

    assert_eq!(extraction.clusters.len(), 2);
    assert!(extraction.noise.is_empty());
    for cluster in &extraction.clusters {
        assert_eq!(cluster.len(), 30);
        let id = cluster.hits[0].id;
        assert!(cluster.iter().all(|h| h.id == id), "cross-assigned hits");
        assert_along_x(cluster.line.direction());
    }

    let labels = state.labels();
    assert!(labels[..30].iter().all(|l| *l == labels[0]));
    assert!(labels[30..].iter().all(|l| *l == labels[30]));
    assert_ne!(labels[0], labels[30]);
    assert!(labels.iter().all(|l| matches!(l, PointLabel::Cluster(_))));
}

#[test]
fn test_dispatch_and_parallel_batch() {
    let events = vec![two_tracks(30), two_tracks(25), two_tracks(3)];
    let params = ExtractionParams::default().with_ransac(ransac_config());

    let results = extract_events(&events, &params, 17);
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().clusters.len(), 2);
    assert_eq!(results[1].as_ref().unwrap().clusters.len(), 2);
    assert!(results[2].is_err());

    // Same seed, same answer.
    let again = extract_events(&events, &params, 17);
    assert_eq!(
        again[0].as_ref().unwrap().clusters[0].hits,
        results[0].as_ref().unwrap().clusters[0].hits
    );

    let dbscan = ExtractionParams::default()
        .with_algorithm(ExtractionAlgorithm::Dbscan)
        .with_dbscan(DbscanConfig {
            epsilon: 1.5,
            min_points: 2,
            min_cluster_size: 1,
        });
    let mut rng = StdRng::seed_from_u64(0);
    let event = extract_tracks(&events[2], &dbscan, &mut rng).unwrap().into_event();
    assert_eq!(event.len(), 2);
    assert_eq!(event.clusters[1].id, 1);
}
