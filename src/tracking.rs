// src/tracking.rs - Single-hand anchor tracker: presence, pose, projection, smoothing
use crate::config::{CameraFacing, TrackerConfig};
use crate::error::ConfigError;
use crate::landmarks::LandmarkSet;
use crate::pose::{PoseExtractor, RawPose};
use crate::presence::PresenceGate;
use crate::projection::ViewportProjector;
use crate::smoothing::{PoseTarget, SmoothedPose, TemporalSmoother};
use crate::source::DetectionFrame;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{debug, info, trace};

const METRICS_WINDOW: usize = 30;

/// What the renderer reads once per display frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerSnapshot {
    pub visible: bool,
    pub pose: SmoothedPose,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetrics {
    pub detection_rate_hz: f64,
    pub avg_detection_interval_ms: f64,
    pub detections: u64,
    pub stale_frames: u64,
    pub rejected_sets: u64,
    pub source_errors: u64,
    pub display_ticks: u64,
    #[serde(skip)]
    intervals: VecDeque<f64>,
    #[serde(skip)]
    last_detection_ms: Option<f64>,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            detection_rate_hz: 0.0,
            avg_detection_interval_ms: 0.0,
            detections: 0,
            stale_frames: 0,
            rejected_sets: 0,
            source_errors: 0,
            display_ticks: 0,
            intervals: VecDeque::with_capacity(METRICS_WINDOW),
            last_detection_ms: None,
        }
    }

    fn record_detection(&mut self, now_ms: f64) {
        self.detections += 1;

        if let Some(last) = self.last_detection_ms {
            self.intervals.push_front(now_ms - last);
            if self.intervals.len() > METRICS_WINDOW {
                self.intervals.pop_back();
            }

            self.avg_detection_interval_ms =
                self.intervals.iter().sum::<f64>() / self.intervals.len() as f64;
            self.detection_rate_hz = if self.avg_detection_interval_ms > 0.0 {
                1000.0 / self.avg_detection_interval_ms
            } else {
                0.0
            };
        }
        self.last_detection_ms = Some(now_ms);
    }
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

pub struct HandTracker {
    config: TrackerConfig,
    gate: PresenceGate,
    extractor: PoseExtractor,
    projector: ViewportProjector,
    smoother: TemporalSmoother,
    last_raw: Option<RawPose>,
    last_frame_ms: Option<f64>,
    metrics: PerformanceMetrics,
}

impl HandTracker {
    pub fn new(config: TrackerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            "Hand tracker ready (facing {:?}, aspect {:.3}, fov {}°)",
            config.camera.facing, config.camera.aspect, config.camera.fov_deg
        );

        Ok(Self {
            gate: PresenceGate::new(config.hysteresis_ms),
            extractor: PoseExtractor::new(&config),
            projector: ViewportProjector::new(&config.camera),
            smoother: TemporalSmoother::from_config(&config),
            last_raw: None,
            last_frame_ms: None,
            metrics: PerformanceMetrics::new(),
            config,
        })
    }

    /// Detection callback. Returns the debounced visibility.
    ///
    /// A frame whose timestamp has not advanced is skipped without touching
    /// any state. A landmark set that cannot produce a pose still counts as
    /// a detected hand for presence; the smoother keeps its last target.
    pub fn on_detection(&mut self, frame: &DetectionFrame, now_ms: f64) -> bool {
        if let Some(last) = self.last_frame_ms {
            if frame.timestamp_ms <= last {
                self.metrics.stale_frames += 1;
                trace!("Stale frame {:.1} ms, skipping", frame.timestamp_ms);
                return self.gate.is_visible();
            }
        }
        self.last_frame_ms = Some(frame.timestamp_ms);
        self.metrics.record_detection(now_ms);

        let visible = self.gate.update(frame.hand.is_some(), now_ms);

        if let Some(points) = &frame.hand {
            let raw = LandmarkSet::from_points(points).and_then(|set| self.extractor.extract(&set));
            match raw {
                Ok(raw) => {
                    let target = PoseTarget {
                        position: self.projector.project(&raw.anchor),
                        scale: raw.scale,
                        orientation: raw.orientation,
                    };
                    trace!("Raw pose {:?} -> world {:?}", raw.forward_source, target.position);
                    self.smoother.set_target(target);
                    self.last_raw = Some(raw);
                }
                Err(e) => {
                    self.metrics.rejected_sets += 1;
                    debug!("Skipping landmark set at {:.1} ms: {}", frame.timestamp_ms, e);
                }
            }
        }

        visible
    }

    /// A failed detector call is "no hand" for this cycle.
    pub fn on_source_error(&mut self, now_ms: f64) -> bool {
        self.metrics.source_errors += 1;
        self.gate.update(false, now_ms)
    }

    /// Display callback: one smoothing step, then the state to draw.
    pub fn on_display_tick(&mut self) -> TrackerSnapshot {
        self.metrics.display_ticks += 1;
        let pose = self.smoother.tick(None);
        TrackerSnapshot {
            visible: self.gate.is_visible(),
            pose,
        }
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            visible: self.gate.is_visible(),
            pose: self.smoother.current(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.gate.is_visible()
    }

    pub fn last_raw(&self) -> Option<&RawPose> {
        self.last_raw.as_ref()
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Camera switch: mirroring changes and every piece of tracking state
    /// starts over.
    pub fn set_facing(&mut self, facing: CameraFacing) {
        info!("Switching camera to {:?}", facing);
        self.config.camera.facing = facing;
        self.extractor.set_mirrored(facing.is_mirrored());
        self.projector.set_mirrored(facing.is_mirrored());
        self.reset();
    }

    pub fn set_aspect(&mut self, aspect: f64) -> Result<(), ConfigError> {
        if !(aspect.is_finite() && aspect > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "camera.aspect",
                value: aspect,
            });
        }
        info!("Viewport aspect now {:.3}", aspect);
        self.config.camera.aspect = aspect;
        self.extractor.set_aspect(aspect);
        self.projector.set_aspect(aspect);
        self.reset();
        Ok(())
    }

    pub fn reset(&mut self) {
        self.gate.reset();
        self.extractor.reset();
        self.smoother.reset();
        self.last_raw = None;
        self.last_frame_ms = None;
    }
}
