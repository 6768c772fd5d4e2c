// Track Pairing - Main Entry Point
// Reads JSON-lines position reports, writes closed tracks and pairs as JSON lines

use std::io::BufWriter;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, info, warn};

use track_pairing::config::Config;
use track_pairing::coordinator::Coordinator;
use track_pairing::ingest::parse_line;
use track_pairing::output::{JsonLinesOutput, LogOutput, OutputHandler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    let engine = config.engine_config();
    engine.validate()?;
    if config.queue_capacity == 0 {
        return Err("--queue-capacity must be greater than zero".into());
    }
    info!("Starting track pairing");
    debug!("Engine config: {}", serde_json::to_string(&engine)?);
    info!("Pairing threshold: {:.1}", engine.pairing.threshold());

    let stdout = BufWriter::new(std::io::stdout());
    let json = if config.pairs_only {
        JsonLinesOutput::pairs_only(stdout)
    } else {
        JsonLinesOutput::new(stdout)
    };
    let outputs: Vec<Box<dyn OutputHandler>> = vec![Box::new(json), Box::new(LogOutput::new())];
    let mut coordinator = Coordinator::new(engine, config.queue_capacity, outputs);

    let input: Box<dyn AsyncRead + Unpin + Send> = match &config.input {
        Some(path) => {
            info!("Reading points from {}", path);
            Box::new(tokio::fs::File::open(path).await?)
        }
        None => {
            info!("Reading points from stdin");
            Box::new(tokio::io::stdin())
        }
    };

    let mut lines = BufReader::new(input).lines();
    let mut line_no = 0u64;
    let mut skipped = 0u64;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        match parse_line(&line) {
            Ok(Some((lane, point))) => {
                if let Err(e) = coordinator.submit(&lane, point).await {
                    warn!("Line {}: {}", line_no, e);
                    skipped += 1;
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Line {}: {}", line_no, e);
                skipped += 1;
            }
        }
    }

    info!("Input finished after {} lines ({} skipped), shutting down...", line_no, skipped);
    let summary = coordinator.shutdown().await;

    let mut names: Vec<_> = summary.lanes.keys().collect();
    names.sort();
    for name in names {
        let stats = &summary.lanes[name];
        info!(
            "Lane {}: {} points, {} tracks, {} close pairs, {} track pairs, {} late, {} rejected",
            name,
            stats.assembler.points_accepted,
            stats.assembler.tracks_emitted,
            stats.finder.close_pairs,
            stats.pairer.completed,
            stats.late_points,
            stats.rejected_points
        );
    }
    info!(
        "Done: {} lanes, {} tracks, {} pairs",
        summary.lanes.len(),
        summary.outputs.tracks,
        summary.outputs.pairs
    );

    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) {
    use tracing_subscriber::fmt::format::FmtSpan;

    // stdout carries the JSON output
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .with_span_events(if verbose {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        });

    if verbose {
        subscriber.with_max_level(tracing::Level::DEBUG).init();
        info!("Verbose logging enabled (DEBUG level)");
    } else {
        subscriber.with_max_level(tracing::Level::INFO).init();
    }
}
