// src/data.rs - Session recording and export of the smoothed pose trace
use crate::runtime::TargetSink;
use crate::tracking::{PerformanceMetrics, TrackerSnapshot};
use anyhow::{Context, Result};
use chrono::Local;
use csv::Writer;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PoseRecord {
    pub tick: u64,
    pub elapsed_ms: f64,
    pub visible: bool,
    pub position_x: f64,
    pub position_y: f64,
    pub position_z: f64,
    pub scale: f64,
    pub quat_i: f64,
    pub quat_j: f64,
    pub quat_k: f64,
    pub quat_w: f64,
}

impl PoseRecord {
    pub fn from_snapshot(tick: u64, elapsed_ms: f64, snapshot: &TrackerSnapshot) -> Self {
        let pose = &snapshot.pose;
        let q = pose.orientation.quaternion();
        Self {
            tick,
            elapsed_ms,
            visible: snapshot.visible,
            position_x: pose.position.x,
            position_y: pose.position.y,
            position_z: pose.position.z,
            scale: pose.uniform_scale(),
            quat_i: q.i,
            quat_j: q.j,
            quat_k: q.k,
            quat_w: q.w,
        }
    }
}

/// Sink that keeps every presented frame for later export.
pub struct SessionRecorder {
    started: Instant,
    records: Vec<PoseRecord>,
}

impl SessionRecorder {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            records: Vec::new(),
        }
    }

    pub fn records(&self) -> &[PoseRecord] {
        &self.records
    }

    pub fn take_records(&mut self) -> Vec<PoseRecord> {
        std::mem::take(&mut self.records)
    }
}

impl Default for SessionRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetSink for SessionRecorder {
    fn present(&mut self, snapshot: &TrackerSnapshot) {
        let tick = self.records.len() as u64;
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        self.records.push(PoseRecord::from_snapshot(tick, elapsed_ms, snapshot));
    }
}

#[derive(Debug, Serialize)]
pub struct SessionSummary<'a> {
    pub session: &'a str,
    pub frames: usize,
    pub visible_frames: usize,
    pub visible_fraction: f64,
    pub metrics: &'a PerformanceMetrics,
}

/// `<documents>/PalmAnchor`, or `./output` when there is no documents dir.
pub fn default_output_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.document_dir().map(|p| p.join("PalmAnchor")))
        .unwrap_or_else(|| PathBuf::from("./output"))
}

pub struct DataExporter {
    output_dir: PathBuf,
    session_name: String,
}

impl DataExporter {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let output_dir = output_dir.as_ref().to_path_buf();
        let session_name = session_name.unwrap_or_else(|| {
            let stamped = format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"));
            if output_dir.join(&stamped).exists() {
                format!("{}_{}", stamped, uuid::Uuid::new_v4().simple())
            } else {
                stamped
            }
        });

        Self {
            output_dir,
            session_name,
        }
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn session_dir(&self) -> PathBuf {
        self.output_dir.join(&self.session_name)
    }

    pub fn export_csv(&self, records: &[PoseRecord]) -> Result<PathBuf> {
        let csv_path = self.session_dir().join("pose_trace.csv");
        if let Some(parent) = csv_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let file = File::create(&csv_path)
            .with_context(|| format!("Failed to create {}", csv_path.display()))?;
        let mut writer = Writer::from_writer(file);
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;

        Ok(csv_path)
    }

    pub fn export_summary(
        &self,
        records: &[PoseRecord],
        metrics: &PerformanceMetrics,
    ) -> Result<PathBuf> {
        let summary_path = self.session_dir().join("summary.json");
        if let Some(parent) = summary_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let visible_frames = records.iter().filter(|r| r.visible).count();
        let summary = SessionSummary {
            session: &self.session_name,
            frames: records.len(),
            visible_frames,
            visible_fraction: if records.is_empty() {
                0.0
            } else {
                visible_frames as f64 / records.len() as f64
            },
            metrics,
        };

        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(&summary_path, json)
            .with_context(|| format!("Failed to write {}", summary_path.display()))?;

        Ok(summary_path)
    }
}
