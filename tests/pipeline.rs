// End-to-end behaviour of one lane: ordering, assembly and pairing together

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use track_pairing::config::EngineConfig;
use track_pairing::lane::Lane;
use track_pairing::pairing::Emitted;
use track_pairing::point::Point;

fn t(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn pt(key: &str, secs: i64, lat: f64, lon: f64) -> Point {
    Point::new(key, t(secs), lat, lon)
}

fn run(config: &EngineConfig, points: Vec<Point>) -> (Emitted, Lane) {
    let mut lane = Lane::new("test", config);
    let mut out = Emitted::default();
    for p in points {
        out.extend(lane.accept(p).unwrap());
    }
    out.extend(lane.flush());
    (out, lane)
}

#[test]
fn test_two_nearby_aircraft_make_one_pair() {
    let (out, lane) = run(
        &EngineConfig::default(),
        vec![pt("A", 0, 0.0, 0.0), pt("B", 2, 0.0, 0.0)],
    );

    assert_eq!(out.tracks.len(), 2);
    assert_eq!(out.pairs.len(), 1);
    assert_eq!(out.pairs[0].keys(), ("A", "B"));

    let stats = lane.stats();
    assert_eq!(stats.finder.close_pairs, 1);
    assert_eq!(stats.open_tracks, 0);
    assert_eq!(stats.open_pairs, 0);
}

#[test]
fn test_gap_splits_track() {
    let (out, _) = run(
        &EngineConfig::default(),
        vec![pt("X", 0, 0.0, 0.0), pt("X", 50, 0.0, 0.0)],
    );

    assert_eq!(out.tracks.len(), 2);
    assert!(out.tracks.iter().all(|trk| trk.len() == 1));
    assert!(out.pairs.is_empty());
}

#[test]
fn test_continuous_stream_is_one_track() {
    let points: Vec<_> = (0..30).map(|i| pt("A", i * 10, 0.0, i as f64 * 0.01)).collect();
    let (out, _) = run(&EngineConfig::default(), points.clone());

    assert_eq!(out.tracks.len(), 1);
    assert_eq!(out.tracks[0].points(), points.as_slice());
}

#[test]
fn test_max_age_forces_split() {
    let mut config = EngineConfig::default();
    config.assembler.max_track_age = Duration::from_secs(60);
    let points = (0..=10).map(|i| pt("A", i * 10, 0.0, 0.0)).collect();
    let (out, lane) = run(&config, points);

    assert_eq!(out.tracks.len(), 2);
    assert_eq!(out.tracks[0].len(), 7);
    assert_eq!(out.tracks[1].len(), 4);
    assert_eq!(lane.stats().assembler.age_splits, 1);
}

#[test]
fn test_same_key_never_pairs_with_itself() {
    let points = (0..10).map(|i| pt("A", i, 0.0, 0.0)).collect();
    let (out, _) = run(&EngineConfig::default(), points);

    assert_eq!(out.tracks.len(), 1);
    assert!(out.pairs.is_empty());
}

#[test]
fn test_reused_key_does_not_steal_pair() {
    let mut points = Vec::new();
    for i in 0..=10 {
        points.push(pt("A", i * 10, 0.0, 0.0));
    }
    // the real B flies with A, then the code is reused far away
    for i in 0..=2 {
        points.push(pt("B", i * 10, 0.0, 0.01));
    }
    points.push(pt("B", 70, 10.0, 10.0));
    points.push(pt("B", 80, 10.0, 10.0));
    points.sort();

    let (out, _) = run(&EngineConfig::default(), points);

    assert_eq!(out.tracks.len(), 3);
    assert_eq!(out.pairs.len(), 1);
    let pair = &out.pairs[0];
    assert_eq!(pair.keys(), ("A", "B"));
    assert_eq!(pair.second().start_time(), t(0));
    assert_eq!(pair.second().len(), 3);
}

#[test]
fn test_key_reused_inside_pairing_window() {
    let mut points: Vec<_> = (0..=60).map(|i| pt("A", i * 2, 0.0, 0.0)).collect();
    for s in [1, 3, 5, 7, 9] {
        points.push(pt("B", s, 0.0, 0.001));
    }
    // same code, unrelated aircraft, before B's last point leaves the window
    for s in (10..=30).step_by(2) {
        points.push(pt("B", s, 10.0, 10.0));
    }
    points.sort();

    let (out, lane) = run(&EngineConfig::default(), points);

    assert_eq!(out.tracks.len(), 3);
    assert_eq!(out.pairs.len(), 1);
    let pair = &out.pairs[0];
    assert_eq!(pair.keys(), ("A", "B"));
    assert_eq!(pair.second().start_time(), t(1));
    assert!(pair.second().points().iter().all(|p| p.position.lat == 0.0));
    assert_eq!(lane.stats().open_pairs, 0);
}

#[test]
fn test_jittered_parallel_flights() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut arrivals: Vec<(f64, Point)> = Vec::new();
    for i in 0..100 {
        let a = pt("A", i * 4, 0.0, i as f64 * 0.01);
        let b = pt("B", i * 4 + 1, 0.008, i as f64 * 0.01);
        for p in [a, b] {
            let arrival = p.time.timestamp() as f64 + rng.gen_range(0.0..3.0);
            arrivals.push((arrival, p));
        }
    }
    arrivals.sort_by(|x, y| x.0.total_cmp(&y.0));

    let (out, lane) = run(
        &EngineConfig::default(),
        arrivals.into_iter().map(|(_, p)| p).collect(),
    );

    let stats = lane.stats();
    assert_eq!(stats.late_points, 0);
    assert_eq!(stats.assembler.points_accepted, 200);
    assert_eq!(out.tracks.len(), 2);
    assert_eq!(out.pairs.len(), 1);

    let approach = out.pairs[0].closest_point_approach().unwrap();
    assert!(approach < 1.0, "closest approach {approach}");
}

#[test]
fn test_invalid_geometry_is_assembled_but_not_paired() {
    let (out, _) = run(
        &EngineConfig::default(),
        vec![
            pt("A", 0, 0.0, 0.0),
            pt("B", 1, f64::NAN, f64::NAN),
            pt("A", 2, 0.0, 0.0),
            pt("B", 3, f64::NAN, f64::NAN),
        ],
    );

    assert_eq!(out.tracks.len(), 2);
    assert!(out.pairs.is_empty());
}
