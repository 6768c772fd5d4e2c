// Closed tracks and track pairs
//
// A Track is the immutable output of the assembler: one identity key, one or
// more points in time order. A TrackPair joins two tracks that came close.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::point::{elapsed, Point};

/// Time-ordered sequence of points sharing one identity key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Track {
    key: String,
    points: Vec<Point>,
}

impl Track {
    /// Build a track from points, checking that it is non-empty, single-keyed
    /// and time-ordered.
    pub fn from_points(points: Vec<Point>) -> Result<Self> {
        let key = match points.first() {
            Some(p) => p.key.clone(),
            None => return Err(PipelineError::EmptyTrack),
        };
        if let Some(p) = points.iter().find(|p| p.key != key) {
            return Err(PipelineError::MixedKeys {
                expected: key,
                found: p.key.clone(),
            });
        }
        if points.windows(2).any(|w| w[1].time < w[0].time) {
            return Err(PipelineError::UnsortedTrack { key });
        }
        Ok(Track { key, points })
    }

    /// The assembler only ever hands over non-empty, ordered, single-key runs.
    pub(crate) fn from_assembled(key: String, points: Vec<Point>) -> Self {
        debug_assert!(!points.is_empty());
        Track { key, points }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false for a constructed track
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> &Point {
        &self.points[0]
    }

    pub fn last(&self) -> &Point {
        &self.points[self.points.len() - 1]
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.first().time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.last().time
    }

    pub fn duration(&self) -> Duration {
        elapsed(self.start_time(), self.end_time())
    }

    /// Interval during which both tracks exist, if any
    pub fn time_overlap(&self, other: &Track) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = self.start_time().max(other.start_time());
        let end = self.end_time().min(other.end_time());
        (start <= end).then_some((start, end))
    }

    /// Is this exact point part of the track?
    pub fn contains(&self, point: &Point) -> bool {
        let from = self.points.partition_point(|p| p.time < point.time);
        self.points[from..]
            .iter()
            .take_while(|p| p.time == point.time)
            .any(|p| p == point)
    }

    /// The point whose time is closest to `time` (earlier point wins ties)
    pub fn nearest_in_time(&self, time: DateTime<Utc>) -> &Point {
        let idx = self.points.partition_point(|p| p.time < time);
        if idx == 0 {
            return self.first();
        }
        if idx == self.points.len() {
            return self.last();
        }
        let before = &self.points[idx - 1];
        let after = &self.points[idx];
        if elapsed(before.time, time) <= elapsed(time, after.time) {
            before
        } else {
            after
        }
    }
}

/// Two closed tracks judged close enough to warrant further analysis.
///
/// The track with the lexicographically smaller key is always `first`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackPair {
    first: Arc<Track>,
    second: Arc<Track>,
}

impl TrackPair {
    /// Pair two tracks; `None` when both carry the same identity key.
    pub fn new(a: Arc<Track>, b: Arc<Track>) -> Option<Self> {
        match a.key().cmp(b.key()) {
            std::cmp::Ordering::Less => Some(TrackPair { first: a, second: b }),
            std::cmp::Ordering::Greater => Some(TrackPair { first: b, second: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn first(&self) -> &Arc<Track> {
        &self.first
    }

    pub fn second(&self) -> &Arc<Track> {
        &self.second
    }

    pub fn keys(&self) -> (&str, &str) {
        (self.first.key(), self.second.key())
    }

    pub fn time_overlap(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.first.time_overlap(&self.second)
    }

    /// Smallest horizontal separation (NM) between time-aligned points of
    /// the two tracks.
    ///
    /// Each point of either track inside the overlap interval is matched to the
    /// nearest-in-time point of the other track. `None` when the tracks do not
    /// overlap in time or no aligned pair has valid geometry.
    pub fn closest_point_approach(&self) -> Option<f64> {
        let (start, end) = self.time_overlap()?;

        let aligned = |a: &Track, b: &Track| {
            a.points()
                .iter()
                .filter(|p| p.time >= start && p.time <= end)
                .map(|p| p.distance_nm(b.nearest_in_time(p.time)))
                .filter(|d| d.is_finite())
                .collect::<Vec<_>>()
        };

        aligned(&self.first, &self.second)
            .into_iter()
            .chain(aligned(&self.second, &self.first))
            .min_by(f64::total_cmp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::test_support::*;

    fn track(points: Vec<Point>) -> Arc<Track> {
        Arc::new(Track::from_points(points).unwrap())
    }

    #[test]
    fn test_from_points_validation() {
        assert_eq!(Track::from_points(vec![]), Err(PipelineError::EmptyTrack));

        let mixed = Track::from_points(vec![pt("A", 0, 0.0, 0.0), pt("B", 1, 0.0, 0.0)]);
        assert!(matches!(mixed, Err(PipelineError::MixedKeys { .. })));

        let unsorted = Track::from_points(vec![pt("A", 5, 0.0, 0.0), pt("A", 1, 0.0, 0.0)]);
        assert!(matches!(unsorted, Err(PipelineError::UnsortedTrack { .. })));
    }

    #[test]
    fn test_track_accessors() {
        let trk = track(vec![
            pt("A", 10, 0.0, 0.0),
            pt("A", 20, 0.0, 0.01),
            pt("A", 40, 0.0, 0.02),
        ]);
        assert_eq!(trk.key(), "A");
        assert_eq!(trk.len(), 3);
        assert!(!trk.is_empty());
        assert_eq!(trk.start_time(), t(10));
        assert_eq!(trk.duration(), Duration::from_secs(30));
        assert!(trk.contains(&pt("A", 20, 0.0, 0.01)));
        assert!(!trk.contains(&pt("A", 20, 0.0, 0.5)));
    }

    #[test]
    fn test_nearest_in_time() {
        let trk = track(vec![
            pt("A", 10, 0.0, 0.0),
            pt("A", 20, 0.0, 1.0),
            pt("A", 40, 0.0, 2.0),
        ]);
        assert_eq!(trk.nearest_in_time(t(0)).position.lon, 0.0);
        assert_eq!(trk.nearest_in_time(t(14)).position.lon, 0.0);
        assert_eq!(trk.nearest_in_time(t(15)).position.lon, 0.0);
        assert_eq!(trk.nearest_in_time(t(16)).position.lon, 1.0);
        assert_eq!(trk.nearest_in_time(t(99)).position.lon, 2.0);
    }

    #[test]
    fn test_pair_is_canonical() {
        let a = track(vec![pt("A", 0, 0.0, 0.0)]);
        let b = track(vec![pt("B", 0, 0.0, 0.0)]);

        let p1 = TrackPair::new(a.clone(), b.clone()).unwrap();
        let p2 = TrackPair::new(b, a.clone()).unwrap();
        assert_eq!(p1, p2);
        assert_eq!(p1.keys(), ("A", "B"));

        assert!(TrackPair::new(a.clone(), a).is_none());
    }

    #[test]
    fn test_time_overlap() {
        let a = track(vec![pt("A", 0, 0.0, 0.0), pt("A", 30, 0.0, 0.0)]);
        let b = track(vec![pt("B", 20, 0.0, 0.0), pt("B", 60, 0.0, 0.0)]);
        let c = track(vec![pt("C", 61, 0.0, 0.0)]);

        let (start, end) = a.time_overlap(&b).unwrap();
        assert_eq!(start, t(20));
        assert_eq!(end, t(30));
        assert!(a.time_overlap(&c).is_none());
    }

    #[test]
    fn test_closest_point_approach() {
        // B converges on A's path, closest at t=20
        let a = track(vec![
            pt("A", 0, 0.0, 0.0),
            pt("A", 10, 0.0, 0.0),
            pt("A", 20, 0.0, 0.0),
        ]);
        let b = track(vec![
            pt("B", 0, 0.1, 0.0),
            pt("B", 10, 0.05, 0.0),
            pt("B", 20, 1.0 / 60.0, 0.0),
        ]);
        let pair = TrackPair::new(a, b).unwrap();
        let cpa = pair.closest_point_approach().unwrap();
        assert!((cpa - 1.0).abs() < 0.01, "cpa {}", cpa);
    }

    #[test]
    fn test_closest_point_approach_without_overlap() {
        let a = track(vec![pt("A", 0, 0.0, 0.0)]);
        let b = track(vec![pt("B", 10, 0.0, 0.0)]);
        assert!(TrackPair::new(a, b).unwrap().closest_point_approach().is_none());
    }
}
