// src/source.rs - Landmark sources: the detector seam and a JSON-lines replay
use crate::landmarks::Landmark;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

/// Latest detector output. `hand` holds the first hand's raw points, or
/// `None` when no hand was found.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionFrame {
    /// Timestamp of the video frame the detector ran on
    pub timestamp_ms: f64,
    pub hand: Option<Vec<Landmark>>,
}

impl DetectionFrame {
    pub fn empty(timestamp_ms: f64) -> Self {
        Self {
            timestamp_ms,
            hand: None,
        }
    }

    pub fn with_hand(timestamp_ms: f64, points: Vec<Landmark>) -> Self {
        Self {
            timestamp_ms,
            hand: Some(points),
        }
    }
}

/// Anything that can be polled for the latest detection.
///
/// `Ok(None)` means the source is finished. An `Err` is a failed call and
/// counts as "no hand" for that cycle only.
pub trait LandmarkSource: Send {
    fn next_frame(&mut self) -> Result<Option<DetectionFrame>>;
}

#[derive(Debug, Deserialize)]
struct ReplayRecord {
    timestamp_ms: f64,
    #[serde(default)]
    landmarks: Option<Vec<[f64; 3]>>,
}

/// Replays recorded detector output, one JSON object per line:
/// `{"timestamp_ms": 16.7, "landmarks": [[x, y, z], ...]}` or `"landmarks": null`.
pub struct ReplaySource {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl ReplaySource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .with_context(|| format!("Failed to open replay file {}", path.display()))?;

        Ok(Self {
            path,
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LandmarkSource for ReplaySource {
    fn next_frame(&mut self) -> Result<Option<DetectionFrame>> {
        loop {
            let Some(line) = self.lines.next() else {
                return Ok(None);
            };
            self.line_no += 1;
            let line = line.with_context(|| format!("Failed to read {}", self.path.display()))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let record: ReplayRecord = serde_json::from_str(line).with_context(|| {
                format!("Invalid replay record at {}:{}", self.path.display(), self.line_no)
            })?;

            let hand = record
                .landmarks
                .map(|points| points.into_iter().map(Landmark::from).collect());

            return Ok(Some(DetectionFrame {
                timestamp_ms: record.timestamp_ms,
                hand,
            }));
        }
    }
}

/// In-memory source, mostly for tests and demos.
pub struct ScriptedSource {
    frames: std::vec::IntoIter<Result<DetectionFrame, String>>,
}

impl ScriptedSource {
    pub fn new(frames: Vec<DetectionFrame>) -> Self {
        Self {
            frames: frames.into_iter().map(Ok).collect::<Vec<_>>().into_iter(),
        }
    }

    /// Like `new`, but `Err` entries make that call fail.
    pub fn with_failures(frames: Vec<Result<DetectionFrame, String>>) -> Self {
        Self {
            frames: frames.into_iter(),
        }
    }
}

impl LandmarkSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<DetectionFrame>> {
        match self.frames.next() {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(msg)) => Err(anyhow::anyhow!(msg)),
            None => Ok(None),
        }
    }
}
