// Point-pair finder
//
// Sliding space-time join over a time-ordered point stream. Each new point is
// compared with every point of a different key still inside the window.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::metric::SpaceTimeMetric;
use crate::config::PairingConfig;
use crate::error::{PipelineError, Result};
use crate::point::{elapsed, Point};

/// Two points from (nominally) different aircraft that came close
#[derive(Debug, Clone, PartialEq)]
pub struct ClosePair {
    /// The point already in the window
    pub earlier: Point,
    /// The point that triggered the match
    pub later: Point,
    /// Space-time distance between them
    pub distance: f64,
}

impl ClosePair {
    pub fn is_self_pair(&self) -> bool {
        self.earlier.key == self.later.key
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FinderStats {
    pub points_accepted: u64,
    pub comparisons: u64,
    pub close_pairs: u64,
}

/// Sliding-window close pair detector
#[derive(Debug)]
pub struct PointPairFinder {
    window: Duration,
    metric: SpaceTimeMetric,
    threshold: f64,
    points: VecDeque<Point>,
    latest: Option<DateTime<Utc>>,
    stats: FinderStats,
}

impl PointPairFinder {
    pub fn new(config: &PairingConfig) -> Self {
        PointPairFinder {
            window: config.window,
            metric: SpaceTimeMetric::from_config(config),
            threshold: config.threshold(),
            points: VecDeque::new(),
            latest: None,
            stats: FinderStats::default(),
        }
    }

    /// Add a point and return every close pair it forms with the window.
    pub fn accept(&mut self, point: Point) -> Result<Vec<ClosePair>> {
        if let Some(latest) = self.latest {
            if point.time < latest {
                return Err(PipelineError::OutOfOrder {
                    key: point.key,
                    time: point.time,
                    latest,
                });
            }
        }
        self.latest = Some(point.time);
        self.stats.points_accepted += 1;

        while let Some(oldest) = self.points.front() {
            if elapsed(oldest.time, point.time) <= self.window {
                break;
            }
            self.points.pop_front();
        }

        let mut pairs = Vec::new();
        for other in self.points.iter().filter(|p| p.key != point.key) {
            self.stats.comparisons += 1;
            let distance = self.metric.distance_between(other, &point);
            // NaN never passes
            if distance < self.threshold {
                pairs.push(ClosePair {
                    earlier: other.clone(),
                    later: point.clone(),
                    distance,
                });
            }
        }
        self.stats.close_pairs += pairs.len() as u64;

        self.points.push_back(point);
        Ok(pairs)
    }

    /// Forget every windowed point; ordering state is kept.
    pub fn clear_window(&mut self) {
        self.points.clear();
    }

    pub fn window_len(&self) -> usize {
        self.points.len()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn stats(&self) -> FinderStats {
        self.stats
    }
}
