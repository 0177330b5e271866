// src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use palm_anchor::data::{default_output_dir, DataExporter, SessionRecorder};
use palm_anchor::runtime::{LoopTiming, Pipeline};
use palm_anchor::{CameraFacing, HandTracker, ReplaySource, TrackerConfig};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "palm_anchor", about = "Replay recorded hand landmarks through the palm anchor tracker")]
struct Args {
    /// JSON-lines file of recorded detector output
    replay: PathBuf,
    /// Tracker config (JSON); defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Treat the recording as coming from a rear (unmirrored) camera
    #[arg(long)]
    rear: bool,
    #[arg(long, default_value_t = 60.0)]
    display_hz: f64,
    #[arg(long, default_value_t = 30.0)]
    detect_hz: f64,
    /// Where session folders are written
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long)]
    no_export: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => TrackerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TrackerConfig::default(),
    };
    if args.rear {
        config.camera.facing = CameraFacing::Rear;
    }

    let tracker = Arc::new(Mutex::new(HandTracker::new(config)?));
    let source = ReplaySource::open(&args.replay)?;
    let recorder = Arc::new(Mutex::new(SessionRecorder::new()));

    info!("Replaying {}", args.replay.display());
    let mut pipeline = Pipeline::start(
        Arc::clone(&tracker),
        Box::new(source),
        recorder.clone(),
        LoopTiming {
            display_hz: args.display_hz,
            detection_hz: args.detect_hz,
        },
    );
    pipeline.run_until_exhausted().await?;

    let snapshot = pipeline.snapshot();
    let metrics = tracker
        .lock()
        .map_err(|_| anyhow::anyhow!("Tracker lock poisoned"))?
        .metrics()
        .clone();
    let records = recorder
        .lock()
        .map_err(|_| anyhow::anyhow!("Recorder lock poisoned"))?
        .take_records();

    println!(
        "Processed {} detections ({} stale, {} rejected) over {} display frames",
        metrics.detections,
        metrics.stale_frames,
        metrics.rejected_sets,
        records.len()
    );
    println!(
        "Final pose: visible={} position=({:.3}, {:.3}, {:.3}) scale={:.3}",
        snapshot.visible,
        snapshot.pose.position.x,
        snapshot.pose.position.y,
        snapshot.pose.position.z,
        snapshot.pose.uniform_scale()
    );

    if !args.no_export {
        let output_dir = args.output.unwrap_or_else(default_output_dir);
        let exporter = DataExporter::new(output_dir, None);
        let csv_path = exporter.export_csv(&records)?;
        let summary_path = exporter.export_summary(&records, &metrics)?;
        println!("Pose trace: {}", csv_path.display());
        println!("Summary:    {}", summary_path.display());
    }

    Ok(())
}
