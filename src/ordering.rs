// Time-ordering buffer
//
// Smooths a nearly time-ordered point stream. Points are held in a min-heap
// until the newest point seen is more than `max_lag` later, then released in
// time order.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::config::BufferConfig;
use crate::point::{elapsed, Point};

/// Bounded-lag reordering buffer
#[derive(Debug)]
pub struct TimeOrderingBuffer {
    max_lag: Duration,
    heap: BinaryHeap<Reverse<Point>>,
    /// Newest time accepted so far
    newest: Option<DateTime<Utc>>,
    /// Highest time released so far
    released: Option<DateTime<Utc>>,
    late_points: u64,
}

impl TimeOrderingBuffer {
    pub fn new(config: &BufferConfig) -> Self {
        TimeOrderingBuffer {
            max_lag: config.max_lag,
            heap: BinaryHeap::new(),
            newest: None,
            released: None,
            late_points: 0,
        }
    }

    /// Buffer a point, returning every point that is now old enough to release.
    ///
    /// A point older than something already released cannot be put in order any
    /// more; it is handed straight back so the next stage can decide what to do.
    pub fn accept(&mut self, point: Point) -> Vec<Point> {
        if let Some(released) = self.released {
            if point.time < released {
                self.late_points += 1;
                warn!(
                    "Late point for {} at {} (already released up to {})",
                    point.key, point.time, released
                );
                return vec![point];
            }
        }

        let time = point.time;
        self.newest = Some(self.newest.map_or(time, |n| n.max(time)));
        self.heap.push(Reverse(point));

        let mut ready = Vec::new();
        if let Some(newest) = self.newest {
            while let Some(Reverse(oldest)) = self.heap.peek() {
                if elapsed(oldest.time, newest) <= self.max_lag {
                    break;
                }
                if let Some(Reverse(p)) = self.heap.pop() {
                    self.mark_released(p.time);
                    ready.push(p);
                }
            }
        }
        ready
    }

    /// Release everything still buffered, in time order.
    pub fn flush(&mut self) -> Vec<Point> {
        let mut ready = Vec::with_capacity(self.heap.len());
        while let Some(Reverse(p)) = self.heap.pop() {
            self.mark_released(p.time);
            ready.push(p);
        }
        ready
    }

    /// Number of points currently held
    pub fn buffered_len(&self) -> usize {
        self.heap.len()
    }

    /// Points that arrived too late to be ordered
    pub fn late_points(&self) -> u64 {
        self.late_points
    }

    fn mark_released(&mut self, time: DateTime<Utc>) {
        self.released = Some(self.released.map_or(time, |r| r.max(time)));
    }
}
