// src/lib.rs
//! Hand-anchored overlay placement.
//!
//! Turns per-frame hand landmarks into a debounced visibility flag and a
//! smoothed position, isotropic scale and yaw-only orientation for an object
//! drawn on the user's palm.

pub mod config;
pub mod data;
pub mod error;
pub mod landmarks;
pub mod pose;
pub mod presence;
pub mod projection;
pub mod runtime;
pub mod smoothing;
pub mod source;
pub mod tracking;

pub use config::{CameraConfig, CameraFacing, TrackerConfig};
pub use error::{ConfigError, PoseError};
pub use landmarks::{Landmark, LandmarkSet};
pub use pose::{ForwardSource, PoseExtractor, RawPose};
pub use presence::{PresenceGate, PresenceState};
pub use projection::ViewportProjector;
pub use runtime::{LoopTiming, Pipeline, TargetSink};
pub use smoothing::{PoseTarget, SmoothedPose, TemporalSmoother};
pub use source::{DetectionFrame, LandmarkSource, ReplaySource};
pub use tracking::{HandTracker, PerformanceMetrics, TrackerSnapshot};
