// Coordinator - routes points to per-facility lanes and collects their output
//
// Each lane is owned by exactly one tokio task fed through a bounded queue.
// Lane output is forwarded to a single output task driving the sinks.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::EngineConfig;
use crate::error::{PipelineError, Result};
use crate::lane::{Lane, LaneStats};
use crate::output::{drive_outputs, LaneEvent, OutputCounts, OutputHandler};
use crate::pairing::Emitted;
use crate::point::Point;

/// Capacity of the channel between lanes and the output task
const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Sending side of one running lane
pub struct LaneHandle {
    name: String,
    tx: mpsc::Sender<Point>,
    flush: Arc<Notify>,
    join: JoinHandle<LaneStats>,
}

impl LaneHandle {
    /// Move `lane` onto its own task.
    pub fn spawn(lane: Lane, capacity: usize, events: mpsc::Sender<LaneEvent>) -> Self {
        let name = lane.name().to_string();
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let flush = Arc::new(Notify::new());
        let span = info_span!("lane", name = %name);
        let join = tokio::spawn(run_lane(lane, rx, flush.clone(), events).instrument(span));
        LaneHandle {
            name,
            tx,
            flush,
            join,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a point without waiting.
    ///
    /// A full queue rejects the point and asks the lane to flush before its
    /// next accept.
    pub fn offer(&self, point: Point) -> Result<()> {
        match self.tx.try_send(point) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.flush.notify_one();
                debug!("Lane {} queue full, flush requested", self.name);
                Err(PipelineError::QueueFull {
                    lane: self.name.clone(),
                })
            }
            Err(TrySendError::Closed(_)) => Err(PipelineError::LaneClosed {
                lane: self.name.clone(),
            }),
        }
    }

    /// Queue a point, waiting for room.
    pub async fn submit(&self, point: Point) -> Result<()> {
        self.tx
            .send(point)
            .await
            .map_err(|_| PipelineError::LaneClosed {
                lane: self.name.clone(),
            })
    }

    /// Close the queue and wait for the lane's final flush.
    pub async fn close(self) -> LaneStats {
        let LaneHandle { name, tx, join, .. } = self;
        drop(tx);
        match join.await {
            Ok(stats) => stats,
            Err(e) => {
                error!("Lane {} task failed: {}", name, e);
                LaneStats {
                    name,
                    ..LaneStats::default()
                }
            }
        }
    }
}

async fn run_lane(
    mut lane: Lane,
    mut rx: mpsc::Receiver<Point>,
    flush: Arc<Notify>,
    events: mpsc::Sender<LaneEvent>,
) -> LaneStats {
    debug!("Lane started");
    loop {
        tokio::select! {
            biased;
            _ = flush.notified() => {
                let out = lane.flush();
                debug!("Forced flush: {} tracks, {} pairs", out.tracks.len(), out.pairs.len());
                forward(&events, lane.name(), out).await;
            }
            point = rx.recv() => match point {
                Some(point) => match lane.accept(point) {
                    Ok(out) => forward(&events, lane.name(), out).await,
                    Err(e) => warn!("Dropping point: {}", e),
                },
                None => break,
            },
        }
    }

    let out = lane.flush();
    forward(&events, lane.name(), out).await;
    let stats = lane.stats();
    info!(
        "Lane finished: {} points, {} tracks, {} pairs, {} late",
        stats.assembler.points_accepted,
        stats.assembler.tracks_emitted,
        stats.pairer.completed,
        stats.late_points
    );
    stats
}

async fn forward(events: &mpsc::Sender<LaneEvent>, lane: &str, out: Emitted) {
    let tracks = out.tracks.into_iter().map(|track| LaneEvent::Track {
        lane: lane.to_string(),
        track,
    });
    let pairs = out.pairs.into_iter().map(|pair| LaneEvent::Pair {
        lane: lane.to_string(),
        pair,
    });
    for event in tracks.chain(pairs) {
        if events.send(event).await.is_err() {
            debug!("Output task gone, discarding lane output");
            return;
        }
    }
}

/// Final statistics returned by `Coordinator::shutdown`
#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    pub lanes: HashMap<String, LaneStats>,
    pub outputs: OutputCounts,
}

/// Top-level object connecting the input to lanes and lanes to outputs
pub struct Coordinator {
    config: EngineConfig,
    capacity: usize,
    lanes: HashMap<String, LaneHandle>,
    events_tx: mpsc::Sender<LaneEvent>,
    output_task: JoinHandle<OutputCounts>,
}

impl Coordinator {
    /// Start the output task. Must be called inside a tokio runtime.
    pub fn new(config: EngineConfig, capacity: usize, outputs: Vec<Box<dyn OutputHandler>>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let output_task = tokio::spawn(drive_outputs(events_rx, outputs));
        Coordinator {
            config,
            capacity,
            lanes: HashMap::new(),
            events_tx,
            output_task,
        }
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    fn lane(&mut self, name: &str) -> &LaneHandle {
        if !self.lanes.contains_key(name) {
            info!("New lane {}", name);
            let lane = Lane::new(name, &self.config);
            let handle = LaneHandle::spawn(lane, self.capacity, self.events_tx.clone());
            self.lanes.insert(name.to_string(), handle);
        }
        &self.lanes[name]
    }

    /// Route a point to its lane without waiting.
    pub fn offer(&mut self, lane: &str, point: Point) -> Result<()> {
        self.lane(lane).offer(point)
    }

    /// Route a point to its lane, waiting for queue room.
    pub async fn submit(&mut self, lane: &str, point: Point) -> Result<()> {
        self.lane(lane).submit(point).await
    }

    /// Close every lane, wait for their final flushes and for the outputs
    /// to drain.
    pub async fn shutdown(self) -> Summary {
        let Coordinator {
            lanes,
            events_tx,
            output_task,
            ..
        } = self;

        let mut summary = Summary::default();
        for (name, handle) in lanes {
            let stats = handle.close().await;
            summary.lanes.insert(name, stats);
        }

        drop(events_tx);
        summary.outputs = match output_task.await {
            Ok(counts) => counts,
            Err(e) => {
                error!("Output task failed: {}", e);
                OutputCounts::default()
            }
        };
        summary
    }
}
