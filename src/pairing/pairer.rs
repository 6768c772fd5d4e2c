// Track pairer
//
// Wires the assembler and the point-pair finder together. A close pair opens
// an empty slot for its two keys; each closed track first promotes matching
// empty slots (moving them out of the empty set, so a later close pair for the
// same keys can open a fresh slot), then completes slots already waiting for
// its key. Recently closed tracks are kept for one pairing window so a close
// pair reaching back into a closed track binds to that track instead of the
// key's next one.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use super::finder::{ClosePair, FinderStats, PointPairFinder};
use super::open_pair::{KeyPair, OpenTrackPair, SlotState};
use super::predicate::{self, PairPredicate};
use crate::assembler::{AssemblerStats, TrackAssembler};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::point::{elapsed, Point};
use crate::track::{Track, TrackPair};

/// Tracks and pairs produced by one call
#[derive(Debug, Default, Clone)]
pub struct Emitted {
    pub tracks: Vec<Arc<Track>>,
    pub pairs: Vec<TrackPair>,
}

impl Emitted {
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty() && self.pairs.is_empty()
    }

    pub fn extend(&mut self, other: Emitted) {
        self.tracks.extend(other.tracks);
        self.pairs.extend(other.pairs);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PairerStats {
    pub close_pair_events: u64,
    pub self_pairs: u64,
    pub rejected: u64,
    pub duplicates: u64,
    pub opened: u64,
    pub promoted: u64,
    pub completed: u64,
}

/// Assembler + point-pair finder + open pair bookkeeping
pub struct TrackPairer {
    assembler: TrackAssembler,
    finder: PointPairFinder,
    predicate: Box<dyn PairPredicate>,
    /// Slots with no track yet, at most one per key pair
    empty: HashSet<KeyPair>,
    /// Key → empty slots mentioning it
    empty_by_key: HashMap<String, HashSet<KeyPair>>,
    /// One-track slots, indexed by the key they are still waiting for
    awaiting: HashMap<String, Vec<OpenTrackPair>>,
    /// Closed tracks whose points may still be in the finder window, with
    /// the time they closed
    recent: VecDeque<(DateTime<Utc>, Arc<Track>)>,
    window: Duration,
    stats: PairerStats,
}

impl TrackPairer {
    /// Pairer using the eligibility predicate implied by the configuration
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_predicate(config, predicate::from_config(&config.pairing))
    }

    pub fn with_predicate(config: &EngineConfig, predicate: Box<dyn PairPredicate>) -> Self {
        TrackPairer {
            assembler: TrackAssembler::new(config.assembler.clone()),
            finder: PointPairFinder::new(&config.pairing),
            predicate,
            empty: HashSet::new(),
            empty_by_key: HashMap::new(),
            awaiting: HashMap::new(),
            recent: VecDeque::new(),
            window: config.pairing.window,
            stats: PairerStats::default(),
        }
    }

    /// Feed one time-ordered point through the assembler and the finder.
    pub fn accept(&mut self, point: Point) -> Result<Emitted> {
        // Both stages hold the same high-water mark, so if the assembler takes
        // the point the finder will too.
        let now = point.time;
        let closed = self.assembler.accept(point.clone())?;
        let close_pairs = self.finder.accept(point)?;

        while let Some((closed_at, _)) = self.recent.front() {
            if elapsed(*closed_at, now) <= self.window {
                break;
            }
            self.recent.pop_front();
        }

        // Tracks closed by this point were built before it arrived; handle them
        // before the point's own close pairs so those bind to its new track.
        let mut out = Emitted::default();
        for track in closed {
            let track = Arc::new(track);
            self.recent.push_back((now, Arc::clone(&track)));
            self.on_track(track, &mut out);
        }
        for pair in &close_pairs {
            self.on_close_pair(pair);
        }
        Ok(out)
    }

    /// Close every open track and resolve what can be resolved.
    pub fn flush(&mut self) -> Emitted {
        let mut out = Emitted::default();
        for track in self.assembler.flush() {
            self.on_track(Arc::new(track), &mut out);
        }
        // Window points belong to tracks that are now closed
        self.finder.clear_window();
        self.recent.clear();

        let unresolved = self.open_pair_count();
        if unresolved > 0 {
            debug!("{} open track pairs left unresolved after flush", unresolved);
        }
        out
    }

    /// Register a close pair. Self-pairs, ineligible pairs and key pairs that
    /// already have an empty slot are ignored.
    ///
    /// The later point is the one just accepted, so it always sits in an open
    /// track. The earlier point may belong to a track that already closed; the
    /// slot then starts out holding that track.
    pub fn on_close_pair(&mut self, pair: &ClosePair) {
        self.stats.close_pair_events += 1;

        let keys = match KeyPair::new(&pair.earlier.key, &pair.later.key) {
            Some(keys) => keys,
            None => {
                self.stats.self_pairs += 1;
                return;
            }
        };
        if !self.predicate.accepts(&pair.earlier, &pair.later) {
            self.stats.rejected += 1;
            return;
        }
        if let Some(closed) = self.closed_track_of(&pair.earlier) {
            self.open_with_closed(keys, closed);
            return;
        }
        if self.empty.contains(&keys) {
            self.stats.duplicates += 1;
            return;
        }

        debug!("Opening track pair {}", keys);
        for key in [keys.first(), keys.second()] {
            self.empty_by_key
                .entry(key.to_string())
                .or_default()
                .insert(keys.clone());
        }
        self.empty.insert(keys);
        self.stats.opened += 1;
    }

    fn closed_track_of(&self, point: &Point) -> Option<Arc<Track>> {
        self.recent
            .iter()
            .rev()
            .find(|(_, trk)| trk.key() == point.key && trk.contains(point))
            .map(|(_, trk)| Arc::clone(trk))
    }

    /// Park a slot already holding `closed` until the other key's open track
    /// closes, unless such a slot exists.
    fn open_with_closed(&mut self, keys: KeyPair, closed: Arc<Track>) {
        let missing = match keys.other(closed.key()) {
            Some(key) => key.to_string(),
            None => return,
        };
        let waiting = self.awaiting.entry(missing).or_default();
        let known = waiting.iter().any(|slot| {
            slot.keys() == &keys
                && matches!(slot.state(), SlotState::OneTrack(trk) if Arc::ptr_eq(trk, &closed))
        });
        if known {
            self.stats.duplicates += 1;
            return;
        }

        match OpenTrackPair::new(keys).offer(closed) {
            Ok(slot) => {
                debug!("Opening track pair {} on closed track", slot.keys());
                self.stats.opened += 1;
                self.stats.promoted += 1;
                waiting.push(slot);
            }
            Err((slot, _)) => warn!("Empty slot {} refused closed track", slot.keys()),
        }
    }

    fn on_track(&mut self, track: Arc<Track>, out: &mut Emitted) {
        let key = track.key().to_string();

        // 1. promote empty slots naming this key
        let mut promoted = Vec::new();
        for keys in self.empty_by_key.remove(&key).unwrap_or_default() {
            self.empty.remove(&keys);
            if let Some(other) = keys.other(&key) {
                let other = other.to_string();
                if let Some(set) = self.empty_by_key.get_mut(&other) {
                    set.remove(&keys);
                    if set.is_empty() {
                        self.empty_by_key.remove(&other);
                    }
                }
            }
            match OpenTrackPair::new(keys).offer(Arc::clone(&track)) {
                Ok(slot) => promoted.push(slot),
                Err((slot, _)) => warn!("Empty slot {} refused track {}", slot.keys(), key),
            }
        }

        // 2. complete slots that were waiting for this key
        for slot in self.awaiting.remove(&key).unwrap_or_default() {
            match slot.offer(Arc::clone(&track)) {
                Ok(slot) => {
                    if let Some(pair) = slot.into_track_pair() {
                        debug!("Track pair {} complete", slot_label(&pair));
                        self.stats.completed += 1;
                        out.pairs.push(pair);
                    }
                }
                Err((slot, _)) => warn!("Waiting slot {} refused track {}", slot.keys(), key),
            }
        }

        // 3. park the newly promoted slots until their other track closes
        for slot in promoted {
            if let Some(missing) = slot.missing_key() {
                self.stats.promoted += 1;
                self.awaiting.entry(missing.to_string()).or_default().push(slot);
            }
        }

        out.tracks.push(track);
    }

    /// Slots not yet completed (empty or one-track)
    pub fn open_pair_count(&self) -> usize {
        self.empty.len() + self.awaiting.values().map(Vec::len).sum::<usize>()
    }

    pub fn empty_slot_count(&self) -> usize {
        self.empty.len()
    }

    pub fn open_track_count(&self) -> usize {
        self.assembler.open_track_count()
    }

    pub fn window_len(&self) -> usize {
        self.finder.window_len()
    }

    pub fn stats(&self) -> PairerStats {
        self.stats
    }

    pub fn assembler_stats(&self) -> AssemblerStats {
        self.assembler.stats()
    }

    pub fn finder_stats(&self) -> FinderStats {
        self.finder.stats()
    }
}

fn slot_label(pair: &TrackPair) -> String {
    let (a, b) = pair.keys();
    format!("{}/{}", a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairing::predicate::AcceptAll;
    use crate::point::test_support::*;

    fn pairer() -> TrackPairer {
        TrackPairer::new(&EngineConfig::default())
    }

    fn run(pairer: &mut TrackPairer, points: Vec<Point>) -> Emitted {
        let mut out = Emitted::default();
        for p in points {
            out.extend(pairer.accept(p).unwrap());
        }
        out.extend(pairer.flush());
        out
    }

    #[test]
    fn test_two_nearby_points_make_one_pair() {
        let mut p = pairer();
        let out = run(&mut p, vec![pt("A", 0, 0.0, 0.0), pt("B", 2, 0.0, 0.0)]);

        assert_eq!(out.tracks.len(), 2);
        assert_eq!(out.pairs.len(), 1);
        assert_eq!(out.pairs[0].keys(), ("A", "B"));
        assert_eq!(p.open_pair_count(), 0);
        assert_eq!(p.stats().opened, 1);
        assert_eq!(p.stats().promoted, 1);
        assert_eq!(p.stats().completed, 1);
    }

    #[test]
    fn test_far_apart_streams_do_not_pair() {
        let mut p = pairer();
        let out = run(
            &mut p,
            (0..10)
                .flat_map(|i| vec![pt("A", i * 4, 0.0, 0.0), pt("B", i * 4 + 1, 1.0, 1.0)])
                .collect(),
        );
        assert_eq!(out.tracks.len(), 2);
        assert!(out.pairs.is_empty());
    }

    #[test]
    fn test_repeated_close_pairs_are_idempotent() {
        let mut p = pairer();
        let points = (0..10)
            .flat_map(|i| vec![pt("A", i * 4, 0.0, 0.0), pt("B", i * 4 + 1, 0.0, 0.001)])
            .collect();
        let out = run(&mut p, points);

        assert_eq!(out.pairs.len(), 1);
        assert_eq!(p.stats().opened, 1);
        assert!(p.stats().duplicates > 0);
    }

    #[test]
    fn test_self_pair_is_ignored() {
        let mut p = pairer();
        let a0 = pt("A", 0, 0.0, 0.0);
        let a1 = pt("A", 1, 0.0, 0.0);
        p.on_close_pair(&ClosePair {
            earlier: a0,
            later: a1,
            distance: 1.0,
        });
        assert_eq!(p.stats().self_pairs, 1);
        assert_eq!(p.open_pair_count(), 0);

        let out = p.flush();
        assert!(out.pairs.is_empty());
    }

    #[test]
    fn test_predicate_rejects_pair() {
        let config = EngineConfig::default();
        let never = |_: &Point, _: &Point| false;
        let mut p = TrackPairer::with_predicate(&config, Box::new(never));
        let out = run(&mut p, vec![pt("A", 0, 0.0, 0.0), pt("B", 2, 0.0, 0.0)]);
        assert!(out.pairs.is_empty());
        assert_eq!(p.stats().rejected, 1);
    }

    #[test]
    fn test_invalid_geometry_is_gated_not_fatal() {
        let mut p = pairer();
        let out = run(
            &mut p,
            vec![pt("A", 0, f64::NAN, 0.0), pt("B", 2, 0.0, 0.0)],
        );
        assert_eq!(out.tracks.len(), 2);
        assert!(out.pairs.is_empty());
    }

    #[test]
    fn test_reused_key_does_not_steal_the_slot() {
        let mut p = TrackPairer::with_predicate(&EngineConfig::default(), Box::new(AcceptAll));
        let mut out = Emitted::default();

        // Long-lived A flies along the equator for 3 minutes
        // Short-lived B passes close to A at t=10, then goes quiet
        // B's code is reused 60 NM away at t=70 for a brief track
        let mut points = Vec::new();
        for s in (0..=180).step_by(10) {
            points.push(pt("A", s, 0.0, s as f64 * 0.001));
        }
        points.push(pt("B", 10, 0.0, 0.011));
        points.push(pt("B", 20, 0.0, 0.02));
        points.push(pt("B", 70, 1.0, 1.0));
        points.push(pt("B", 80, 1.0, 1.001));
        points.sort();

        for point in points {
            out.extend(p.accept(point).unwrap());
        }

        // Both B tracks have gone stale and closed; A is still open
        assert_eq!(out.tracks.len(), 2);
        assert!(out.pairs.is_empty());
        out.extend(p.flush());

        assert_eq!(out.pairs.len(), 1);
        let pair = &out.pairs[0];
        assert_eq!(pair.keys(), ("A", "B"));
        assert_eq!(pair.second().start_time(), t(10));
        assert_eq!(pair.second().len(), 2);
        assert_eq!(pair.first().len(), 19);
        assert_eq!(p.open_pair_count(), 0);
    }

    #[test]
    fn test_key_reused_while_old_points_in_window() {
        let mut p = pairer();

        // B flies beside A until t=9, then its code reappears 800 NM away at
        // t=10 while B's old points are still in the pairing window
        let mut points: Vec<_> = (0..=60).map(|i| pt("A", i * 2, 0.0, 0.0)).collect();
        for s in [1, 3, 5, 7, 9] {
            points.push(pt("B", s, 0.0, 0.001));
        }
        for s in (10..=30).step_by(2) {
            points.push(pt("B", s, 10.0, 10.0));
        }
        points.sort();

        let out = run(&mut p, points);

        assert_eq!(out.tracks.len(), 3);
        assert_eq!(out.pairs.len(), 1);
        let pair = &out.pairs[0];
        assert_eq!(pair.keys(), ("A", "B"));
        assert_eq!(pair.second().start_time(), t(1));
        assert_eq!(pair.second().len(), 5);
        assert!(pair.closest_point_approach().unwrap() < 0.1);
        assert_eq!(p.stats().opened, 1);
        assert!(p.stats().duplicates > 0);
        assert_eq!(p.open_pair_count(), 0);
    }

    #[test]
    fn test_close_pair_into_closed_track_binds_to_that_track() {
        let mut p = pairer();
        let points = vec![
            pt("A", 0, 0.0, 0.0),
            pt("B", 1, 0.0, 0.001),
            // B jumps away, closing its first track
            pt("B", 2, 5.0, 5.0),
            // A jumps away too, completing the first pair
            pt("A", 4, 20.0, 20.0),
            // a new A track passes B's old position
            pt("A", 6, 0.0, 0.0005),
        ];

        let out = run(&mut p, points);

        assert_eq!(out.tracks.len(), 5);
        assert_eq!(out.pairs.len(), 2);
        for pair in &out.pairs {
            assert_eq!(pair.second().start_time(), t(1));
        }
        assert_eq!(out.pairs[0].first().start_time(), t(0));
        assert_eq!(out.pairs[1].first().start_time(), t(6));
    }

    #[test]
    fn test_same_keys_can_reopen_after_promotion() {
        let mut p = TrackPairer::with_predicate(&EngineConfig::default(), Box::new(AcceptAll));
        let mut out = Emitted::default();

        // B meets A, then B closes on a gap while A continues
        let mut points = vec![pt("A", 0, 0.0, 0.0), pt("B", 1, 0.0, 0.0)];
        for s in (10..=120).step_by(10) {
            points.push(pt("A", s, 0.0, 0.0));
        }
        // a second, unrelated B meets the same A later
        points.push(pt("B", 100, 0.0, 0.0));
        points.sort();

        for point in points {
            out.extend(p.accept(point).unwrap());
        }
        out.extend(p.flush());

        assert_eq!(p.stats().opened, 2);
        assert_eq!(out.pairs.len(), 2);
        let b_starts: Vec<_> = out.pairs.iter().map(|pair| pair.second().start_time()).collect();
        assert!(b_starts.contains(&t(1)));
        assert!(b_starts.contains(&t(100)));
        // both pairs hold the same long A track
        assert!(Arc::ptr_eq(out.pairs[0].first(), out.pairs[1].first()));
    }

    #[test]
    fn test_out_of_order_surfaces_without_side_effects() {
        let mut p = pairer();
        p.accept(pt("A", 10, 0.0, 0.0)).unwrap();
        assert!(p.accept(pt("B", 5, 0.0, 0.0)).is_err());
        assert_eq!(p.window_len(), 1);
        assert_eq!(p.open_track_count(), 1);
    }
}
