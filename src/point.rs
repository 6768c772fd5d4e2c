// Position reports
//
// A Point is one time-stamped position report for one identity key. Points are
// immutable and totally ordered so they can live in sorted containers.

use std::cmp::Ordering;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geodesy;

/// Latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LatLong {
    pub lat: f64,
    pub lon: f64,
}

impl LatLong {
    pub fn new(lat: f64, lon: f64) -> Self {
        LatLong { lat, lon }
    }

    /// True when both coordinates are finite and inside their legal ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Great-circle distance in nautical miles
    pub fn distance_nm(&self, other: &LatLong) -> f64 {
        geodesy::greatcircle_nm(self.lat, self.lon, other.lat, other.lon)
    }

    /// Great-circle distance in feet
    pub fn distance_ft(&self, other: &LatLong) -> f64 {
        geodesy::greatcircle_ft(self.lat, self.lon, other.lat, other.lon)
    }

    fn total_cmp(&self, other: &LatLong) -> Ordering {
        self.lat
            .total_cmp(&other.lat)
            .then_with(|| self.lon.total_cmp(&other.lon))
    }
}

/// A single time-stamped position report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    /// Time of the report
    pub time: DateTime<Utc>,
    /// Identity key (e.g. beacon code or callsign) believed to name one aircraft
    pub key: String,
    /// Horizontal position
    pub position: LatLong,
    /// Altitude in feet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude_ft: Option<f64>,
    /// Ground speed in knots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_kts: Option<f64>,
    /// Course over ground in degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_deg: Option<f64>,
}

impl Point {
    /// Create a point with no altitude, speed or course.
    pub fn new(key: impl Into<String>, time: DateTime<Utc>, lat: f64, lon: f64) -> Self {
        Point {
            time,
            key: key.into(),
            position: LatLong::new(lat, lon),
            altitude_ft: None,
            speed_kts: None,
            course_deg: None,
        }
    }

    pub fn with_altitude(mut self, altitude_ft: f64) -> Self {
        self.altitude_ft = Some(altitude_ft);
        self
    }

    pub fn with_velocity(mut self, speed_kts: f64, course_deg: f64) -> Self {
        self.speed_kts = Some(speed_kts);
        self.course_deg = Some(course_deg);
        self
    }

    /// Does this point carry a usable horizontal position?
    pub fn has_valid_geometry(&self) -> bool {
        self.position.is_valid()
    }

    /// Horizontal distance to another point in nautical miles (NaN when either
    /// position is unusable)
    pub fn distance_nm(&self, other: &Point) -> f64 {
        self.position.distance_nm(&other.position)
    }

    /// Horizontal distance to another point in feet
    pub fn distance_ft(&self, other: &Point) -> f64 {
        self.position.distance_ft(&other.position)
    }

    /// Time from `earlier` to this point. Zero when `earlier` is not earlier.
    pub fn elapsed_since(&self, earlier: &Point) -> Duration {
        elapsed(earlier.time, self.time)
    }
}

/// Non-negative duration between two instants; zero when `to` precedes `from`.
pub fn elapsed(from: DateTime<Utc>, to: DateTime<Utc>) -> Duration {
    (to - from).to_std().unwrap_or(Duration::ZERO)
}

/// Signed seconds from `from` to `to`.
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    delta.num_milliseconds() as f64 / 1000.0
}

fn option_cmp(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.total_cmp(&y),
    }
}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.position.total_cmp(&other.position))
            .then_with(|| option_cmp(self.altitude_ft, other.altitude_ft))
            .then_with(|| self.key.cmp(&other.key))
            .then_with(|| option_cmp(self.speed_kts, other.speed_kts))
            .then_with(|| option_cmp(self.course_deg, other.course_deg))
    }
}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Point {}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_ordering_by_time_first() {
        let a = pt("ZZZ", 0, 10.0, 10.0);
        let b = pt("AAA", 1, 0.0, 0.0);
        assert!(a < b);
    }

    #[test]
    fn test_ordering_tie_breaks() {
        let a = pt("A", 5, 1.0, 2.0);
        let b = pt("A", 5, 1.0, 3.0);
        assert!(a < b);

        let low = pt("A", 5, 1.0, 2.0).with_altitude(1000.0);
        let high = pt("A", 5, 1.0, 2.0).with_altitude(2000.0);
        assert!(low < high);
        assert!(a < low); // missing altitude sorts first

        let k1 = pt("A", 5, 1.0, 2.0);
        let k2 = pt("B", 5, 1.0, 2.0);
        assert!(k1 < k2);
        assert_eq!(k1, pt("A", 5, 1.0, 2.0));
    }

    #[test]
    fn test_nan_positions_are_still_ordered() {
        let a = pt("A", 5, f64::NAN, 2.0);
        assert_eq!(a.cmp(&a.clone()), Ordering::Equal);
        assert!(!a.has_valid_geometry());
    }

    #[test]
    fn test_geometry_validation() {
        assert!(LatLong::new(45.0, -120.0).is_valid());
        assert!(!LatLong::new(91.0, 0.0).is_valid());
        assert!(!LatLong::new(0.0, 181.0).is_valid());
        assert!(!LatLong::new(f64::INFINITY, 0.0).is_valid());
    }

    #[test]
    fn test_elapsed() {
        let a = pt("A", 10, 0.0, 0.0);
        let b = pt("A", 25, 0.0, 0.0);
        assert_eq!(b.elapsed_since(&a), Duration::from_secs(15));
        assert_eq!(a.elapsed_since(&b), Duration::ZERO);
        assert_eq!(seconds_between(a.time, b.time), 15.0);
        assert_eq!(seconds_between(b.time, a.time), -15.0);
    }

    #[test]
    fn test_json_shape() {
        let p = pt("N123", 0, 38.0, -77.0).with_altitude(3500.0);
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"key\":\"N123\""));
        assert!(json.contains("\"altitude_ft\":3500.0"));
        assert!(!json.contains("speed_kts"));

        let back: Point = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
