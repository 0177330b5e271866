// src/smoothing.rs - Per-display-frame exponential smoothing of the overlay pose
use crate::config::TrackerConfig;
use nalgebra::{UnitQuaternion, Vector3};
use tracing::warn;

/// Pose the renderer draws. Lives for the whole session and simply stops
/// moving while the hand is lost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothedPose {
    pub position: Vector3<f64>,
    /// Isotropic: all three components are kept equal
    pub scale: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl Default for SmoothedPose {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            scale: Vector3::repeat(1.0),
            orientation: UnitQuaternion::identity(),
        }
    }
}

impl SmoothedPose {
    pub fn uniform_scale(&self) -> f64 {
        self.scale.x
    }

    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.scale.iter().all(|v| v.is_finite())
            && self.orientation.coords.iter().all(|v| v.is_finite())
    }
}

/// Latest raw sample in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseTarget {
    pub position: Vector3<f64>,
    pub scale: f64,
    pub orientation: UnitQuaternion<f64>,
}

impl PoseTarget {
    fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.scale.is_finite()
            && self.orientation.coords.iter().all(|v| v.is_finite())
    }
}

pub struct TemporalSmoother {
    current: SmoothedPose,
    target: Option<PoseTarget>,
    position_blend: f64,
    scale_blend: f64,
    orientation_blend: f64,
}

impl TemporalSmoother {
    pub fn new(position_blend: f64, scale_blend: f64, orientation_blend: f64) -> Self {
        Self {
            current: SmoothedPose::default(),
            target: None,
            position_blend,
            scale_blend,
            orientation_blend,
        }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(
            config.position_blend,
            config.scale_blend,
            config.orientation_blend,
        )
    }

    /// Records the sample the next ticks blend toward. Non-finite samples
    /// are dropped and the previous target is kept.
    pub fn set_target(&mut self, target: PoseTarget) -> bool {
        if !target.is_finite() {
            warn!("Dropping non-finite pose sample: {:?}", target);
            return false;
        }
        self.target = Some(target);
        true
    }

    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }

    /// Advances one display frame, optionally taking a fresh sample first.
    /// Without any sample ever received the pose stays at its default.
    pub fn tick(&mut self, sample: Option<PoseTarget>) -> SmoothedPose {
        if let Some(sample) = sample {
            self.set_target(sample);
        }

        let Some(target) = self.target else {
            return self.current;
        };

        let position = self.current.position.lerp(&target.position, self.position_blend);
        let scale = lerp(self.current.uniform_scale(), target.scale, self.scale_blend);
        let orientation = slerp_toward(&self.current.orientation, &target.orientation, self.orientation_blend);

        self.current = SmoothedPose {
            position,
            scale: Vector3::repeat(scale),
            orientation,
        };
        self.current
    }

    pub fn current(&self) -> SmoothedPose {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = SmoothedPose::default();
        self.target = None;
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Spherical step toward `to`, renormalized so drift never accumulates.
fn slerp_toward(
    from: &UnitQuaternion<f64>,
    to: &UnitQuaternion<f64>,
    t: f64,
) -> UnitQuaternion<f64> {
    let stepped = from
        .try_slerp(to, t, 1e-9)
        .unwrap_or_else(|| from.nlerp(to, t));
    UnitQuaternion::new_normalize(stepped.into_inner())
}
