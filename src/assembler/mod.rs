// Track assembly
//
// Groups time-ordered points into per-key tracks. Identity keys get reused by
// unrelated aircraft, so a point only extends the open track for its key when
// it is close in space and time and the track is not too old; otherwise the
// open track is closed and a new one started.

pub mod access_order;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::config::AssemblerConfig;
use crate::error::{PipelineError, Result};
use crate::point::{elapsed, Point};
use crate::track::Track;

pub use access_order::AccessOrderedMap;

/// Why an open track was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Next point jumped further than `max_distance_nm`
    Distance,
    /// Next point came later than `max_point_gap`
    Gap,
    /// Next point would stretch the track past `max_track_age`
    Age,
    /// No update for longer than `max_point_gap`
    Stale,
    /// End of stream
    Flush,
}

/// Counters for the assembler lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AssemblerStats {
    pub points_accepted: u64,
    pub tracks_emitted: u64,
    pub distance_splits: u64,
    pub gap_splits: u64,
    pub age_splits: u64,
    pub stale_closures: u64,
    pub flush_closures: u64,
}

impl AssemblerStats {
    fn record(&mut self, reason: CloseReason) {
        self.tracks_emitted += 1;
        match reason {
            CloseReason::Distance => self.distance_splits += 1,
            CloseReason::Gap => self.gap_splits += 1,
            CloseReason::Age => self.age_splits += 1,
            CloseReason::Stale => self.stale_closures += 1,
            CloseReason::Flush => self.flush_closures += 1,
        }
    }
}

/// Points gathered so far for one open track
#[derive(Debug)]
struct TrackUnderConstruction {
    points: Vec<Point>,
}

impl TrackUnderConstruction {
    fn new(seed: Point) -> Self {
        TrackUnderConstruction { points: vec![seed] }
    }

    fn first(&self) -> &Point {
        &self.points[0]
    }

    fn last(&self) -> &Point {
        &self.points[self.points.len() - 1]
    }

    fn last_time(&self) -> DateTime<Utc> {
        self.last().time
    }

    /// Reason the point cannot extend this track, if any.
    ///
    /// The distance gate only applies when both ends carry usable geometry.
    fn rejects(&self, point: &Point, config: &AssemblerConfig) -> Option<CloseReason> {
        let last = self.last();
        if point.elapsed_since(last) > config.max_point_gap {
            return Some(CloseReason::Gap);
        }
        if point.elapsed_since(self.first()) > config.max_track_age {
            return Some(CloseReason::Age);
        }
        if point.has_valid_geometry()
            && last.has_valid_geometry()
            && point.distance_nm(last) > config.max_distance_nm
        {
            return Some(CloseReason::Distance);
        }
        None
    }

    fn into_track(self, key: String) -> Track {
        Track::from_assembled(key, self.points)
    }
}

/// Keyed state machine turning a time-ordered point stream into tracks
#[derive(Debug)]
pub struct TrackAssembler {
    config: AssemblerConfig,
    open: AccessOrderedMap<String, TrackUnderConstruction>,
    latest: Option<DateTime<Utc>>,
    stats: AssemblerStats,
}

impl TrackAssembler {
    pub fn new(config: AssemblerConfig) -> Self {
        TrackAssembler {
            config,
            open: AccessOrderedMap::new(),
            latest: None,
            stats: AssemblerStats::default(),
        }
    }

    /// Add a point, returning every track that closed as a result.
    ///
    /// Points must arrive in non-decreasing time order; an earlier point is
    /// rejected without touching any state.
    pub fn accept(&mut self, point: Point) -> Result<Vec<Track>> {
        if let Some(latest) = self.latest {
            if point.time < latest {
                return Err(PipelineError::OutOfOrder {
                    key: point.key,
                    time: point.time,
                    latest,
                });
            }
        }
        let now = point.time;
        self.latest = Some(now);
        self.stats.points_accepted += 1;

        let mut closed = Vec::new();
        let key = point.key.clone();
        let verdict = self
            .open
            .get(key.as_str())
            .map(|tuc| tuc.rejects(&point, &self.config));

        match verdict {
            None => {
                self.open.insert(key, TrackUnderConstruction::new(point));
            }
            Some(None) => {
                if let Some(tuc) = self.open.get_mut(key.as_str()) {
                    tuc.points.push(point);
                }
                self.open.touch(key.as_str());
            }
            Some(Some(reason)) => {
                if let Some(tuc) = self.open.remove(key.as_str()) {
                    closed.push(self.close(key.clone(), tuc, reason));
                }
                self.open.insert(key, TrackUnderConstruction::new(point));
            }
        }

        self.close_stale(now, &mut closed);
        Ok(closed)
    }

    /// Close every open track, least recently updated first.
    pub fn flush(&mut self) -> Vec<Track> {
        let mut closed = Vec::with_capacity(self.open.len());
        while let Some((key, tuc)) = self.open.pop_front() {
            closed.push(self.close(key, tuc, CloseReason::Flush));
        }
        closed
    }

    pub fn open_track_count(&self) -> usize {
        self.open.len()
    }

    /// Latest point time accepted so far
    pub fn latest_time(&self) -> Option<DateTime<Utc>> {
        self.latest
    }

    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Close tracks that have not been updated within `max_point_gap` of `now`.
    /// The front of the access order is the stalest track, so the scan stops
    /// at the first fresh one.
    fn close_stale(&mut self, now: DateTime<Utc>, closed: &mut Vec<Track>) {
        while let Some((_, tuc)) = self.open.front() {
            if elapsed(tuc.last_time(), now) <= self.config.max_point_gap {
                break;
            }
            if let Some((key, tuc)) = self.open.pop_front() {
                closed.push(self.close(key, tuc, CloseReason::Stale));
            }
        }
    }

    fn close(&mut self, key: String, tuc: TrackUnderConstruction, reason: CloseReason) -> Track {
        self.stats.record(reason);
        debug!(
            "Closing track {} ({:?}, {} points)",
            key,
            reason,
            tuc.points.len()
        );
        tuc.into_track(key)
    }
}
