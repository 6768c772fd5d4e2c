// Space-time distance between two points

use crate::config::PairingConfig;
use crate::point::{seconds_between, Point};

/// Weighted sum of elapsed seconds and horizontal feet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpaceTimeMetric {
    pub time_coef: f64,
    pub distance_coef: f64,
}

impl SpaceTimeMetric {
    pub fn new(time_coef: f64, distance_coef: f64) -> Self {
        SpaceTimeMetric {
            time_coef,
            distance_coef,
        }
    }

    pub fn from_config(config: &PairingConfig) -> Self {
        Self::new(config.time_coef, config.distance_coef)
    }

    /// Combined distance; NaN when either point lacks usable geometry
    pub fn distance_between(&self, a: &Point, b: &Point) -> f64 {
        let secs = seconds_between(a.time, b.time).abs();
        self.time_coef * secs + self.distance_coef * a.distance_ft(b)
    }
}
