// Output sinks for closed tracks and track pairs

use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::point::Point;
use crate::track::{Track, TrackPair};

/// Something a lane produced, tagged with the lane's name
#[derive(Debug, Clone)]
pub enum LaneEvent {
    Track { lane: String, track: Arc<Track> },
    Pair { lane: String, pair: TrackPair },
}

/// Trait for output handlers
pub trait OutputHandler: Send {
    /// Handle a closed track
    fn handle_track(&mut self, lane: &str, track: &Track);

    /// Handle a completed track pair
    fn handle_pair(&mut self, lane: &str, pair: &TrackPair);

    /// Called once after the last event
    fn finish(&mut self) {}
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Record<'a> {
    Track {
        lane: &'a str,
        key: &'a str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        points: &'a [Point],
    },
    Pair {
        lane: &'a str,
        first: &'a str,
        second: &'a str,
        first_start: DateTime<Utc>,
        second_start: DateTime<Utc>,
        #[serde(skip_serializing_if = "Option::is_none")]
        closest_approach_nm: Option<f64>,
    },
}

/// One JSON object per line
pub struct JsonLinesOutput<W: Write + Send> {
    writer: W,
    include_tracks: bool,
}

impl<W: Write + Send> JsonLinesOutput<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesOutput {
            writer,
            include_tracks: true,
        }
    }

    /// Only write pairs
    pub fn pairs_only(writer: W) -> Self {
        JsonLinesOutput {
            writer,
            include_tracks: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_record(&mut self, record: &Record<'_>) {
        let res = serde_json::to_writer(&mut self.writer, record)
            .map_err(std::io::Error::from)
            .and_then(|_| self.writer.write_all(b"\n"));
        if let Err(e) = res {
            error!("Failed to write JSON output: {}", e);
        }
    }
}

impl<W: Write + Send> OutputHandler for JsonLinesOutput<W> {
    fn handle_track(&mut self, lane: &str, track: &Track) {
        if !self.include_tracks {
            return;
        }
        self.write_record(&Record::Track {
            lane,
            key: track.key(),
            start: track.start_time(),
            end: track.end_time(),
            points: track.points(),
        });
    }

    fn handle_pair(&mut self, lane: &str, pair: &TrackPair) {
        let (first, second) = pair.keys();
        self.write_record(&Record::Pair {
            lane,
            first,
            second,
            first_start: pair.first().start_time(),
            second_start: pair.second().start_time(),
            closest_approach_nm: pair.closest_point_approach(),
        });
    }

    fn finish(&mut self) {
        if let Err(e) = self.writer.flush() {
            error!("Failed to flush JSON output: {}", e);
        }
    }
}

/// Logs every pair and a summary at the end
#[derive(Debug, Default)]
pub struct LogOutput {
    tracks: u64,
    pairs: u64,
}

impl LogOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputHandler for LogOutput {
    fn handle_track(&mut self, lane: &str, track: &Track) {
        self.tracks += 1;
        debug!(
            "[{}] track {} closed: {} points over {}s",
            lane,
            track.key(),
            track.len(),
            track.duration().as_secs()
        );
    }

    fn handle_pair(&mut self, lane: &str, pair: &TrackPair) {
        self.pairs += 1;
        let (a, b) = pair.keys();
        match pair.closest_point_approach() {
            Some(nm) => info!("[{}] pair {}/{} closest approach {:.2} NM", lane, a, b, nm),
            None => info!("[{}] pair {}/{}", lane, a, b),
        }
    }

    fn finish(&mut self) {
        info!("Output finished: {} tracks, {} pairs", self.tracks, self.pairs);
    }
}

/// Totals seen by `drive_outputs`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutputCounts {
    pub tracks: u64,
    pub pairs: u64,
}

/// Feed every lane event to every handler until all senders are dropped.
pub async fn drive_outputs(
    mut rx: mpsc::Receiver<LaneEvent>,
    mut outputs: Vec<Box<dyn OutputHandler>>,
) -> OutputCounts {
    let mut counts = OutputCounts::default();
    while let Some(event) = rx.recv().await {
        match &event {
            LaneEvent::Track { lane, track } => {
                counts.tracks += 1;
                for out in outputs.iter_mut() {
                    out.handle_track(lane, track);
                }
            }
            LaneEvent::Pair { lane, pair } => {
                counts.pairs += 1;
                for out in outputs.iter_mut() {
                    out.handle_pair(lane, pair);
                }
            }
        }
    }
    for out in outputs.iter_mut() {
        out.finish();
    }
    counts
}
