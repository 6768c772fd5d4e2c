// One processing lane
//
// A lane owns exactly one buffer→assembler/finder→pairer chain for one data
// partition. All mutation takes `&mut self`, so a lane can only be driven by
// whoever owns it; the async layer gives each lane to a single task.

use serde::Serialize;
use tracing::warn;

use crate::assembler::AssemblerStats;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::ordering::TimeOrderingBuffer;
use crate::pairing::{Emitted, FinderStats, PairerStats, TrackPairer};
use crate::point::Point;

/// Snapshot of a lane's counters and current state sizes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LaneStats {
    pub name: String,
    pub late_points: u64,
    pub rejected_points: u64,
    pub flushes: u64,
    pub buffered: usize,
    pub open_tracks: usize,
    pub open_pairs: usize,
    pub empty_slots: usize,
    pub window: usize,
    pub assembler: AssemblerStats,
    pub finder: FinderStats,
    pub pairer: PairerStats,
}

pub struct Lane {
    name: String,
    buffer: TimeOrderingBuffer,
    pairer: TrackPairer,
    rejected_points: u64,
    flushes: u64,
}

impl Lane {
    pub fn new(name: impl Into<String>, config: &EngineConfig) -> Self {
        Lane {
            name: name.into(),
            buffer: TimeOrderingBuffer::new(&config.buffer),
            pairer: TrackPairer::new(config),
            rejected_points: 0,
            flushes: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Push one point through the chain.
    ///
    /// Fails with `OutOfOrder` when the buffer had to force out a point older
    /// than what the assembler has already seen. The buffer hands such a point
    /// back on its own, so no other output is lost with the error.
    pub fn accept(&mut self, point: Point) -> Result<Emitted> {
        let mut out = Emitted::default();
        for ready in self.buffer.accept(point) {
            match self.pairer.accept(ready) {
                Ok(emitted) => out.extend(emitted),
                Err(e) => {
                    self.rejected_points += 1;
                    return Err(e);
                }
            }
        }
        Ok(out)
    }

    /// Drain the buffer and close every open track.
    pub fn flush(&mut self) -> Emitted {
        self.flushes += 1;
        let mut out = Emitted::default();
        for ready in self.buffer.flush() {
            match self.pairer.accept(ready) {
                Ok(emitted) => out.extend(emitted),
                Err(e) => {
                    self.rejected_points += 1;
                    warn!("Lane {}: dropping point during flush: {}", self.name, e);
                }
            }
        }
        out.extend(self.pairer.flush());
        out
    }

    pub fn stats(&self) -> LaneStats {
        LaneStats {
            name: self.name.clone(),
            late_points: self.buffer.late_points(),
            rejected_points: self.rejected_points,
            flushes: self.flushes,
            buffered: self.buffer.buffered_len(),
            open_tracks: self.pairer.open_track_count(),
            open_pairs: self.pairer.open_pair_count(),
            empty_slots: self.pairer.empty_slot_count(),
            window: self.pairer.window_len(),
            assembler: self.pairer.assembler_stats(),
            finder: self.pairer.finder_stats(),
            pairer: self.pairer.stats(),
        }
    }
}
