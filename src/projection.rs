// src/projection.rs - Normalized image anchor to renderer world space
use crate::config::CameraConfig;
use nalgebra::{Point3, Vector3};

#[derive(Debug, Clone)]
pub struct ViewportProjector {
    mirrored: bool,
    distance: f64,
    fov_rad: f64,
    aspect: f64,
    placement_depth: f64,
}

impl ViewportProjector {
    pub fn new(camera: &CameraConfig) -> Self {
        Self {
            mirrored: camera.facing.is_mirrored(),
            distance: camera.distance,
            fov_rad: camera.fov_deg.to_radians(),
            aspect: camera.aspect,
            placement_depth: camera.placement_depth,
        }
    }

    pub fn set_mirrored(&mut self, mirrored: bool) {
        self.mirrored = mirrored;
    }

    pub fn set_aspect(&mut self, aspect: f64) {
        self.aspect = aspect;
    }

    /// World-space width and height visible at the camera's distance.
    pub fn visible_extent(&self) -> (f64, f64) {
        let height = 2.0 * self.distance * (self.fov_rad / 2.0).tan();
        (height * self.aspect, height)
    }

    /// Depth comes from the scale signal, so the anchor's z is ignored.
    pub fn project(&self, anchor: &Point3<f64>) -> Vector3<f64> {
        let x3 = if self.mirrored {
            (1.0 - anchor.x) * 2.0 - 1.0
        } else {
            anchor.x * 2.0 - 1.0
        };
        // +1 lifts the anchor: the wrist sits low in the frame
        let y3 = -(anchor.y * 2.0 - 1.0) + 1.0;

        let (width, height) = self.visible_extent();
        Vector3::new(x3 * width / 2.0, y3 * height / 2.0, self.placement_depth)
    }
}
