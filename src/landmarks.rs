// src/landmarks.rs - Hand landmark types as delivered by the detector
use crate::error::PoseError;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

pub const HAND_LANDMARK_COUNT: usize = 21;

// MediaPipe hand landmark indices
pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// One detected point. `x`/`y` are normalized to the image, `z` is depth
/// relative to the wrist in roughly the same units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn to_point(self) -> Point3<f64> {
        Point3::new(self.x, self.y, self.z)
    }

    pub fn to_vector(self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

impl From<[f64; 3]> for Landmark {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// The 21 landmarks of a single hand from one detector call.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: [Landmark; HAND_LANDMARK_COUNT],
}

impl LandmarkSet {
    /// Takes the first 21 points; anything past that is ignored.
    pub fn from_points(points: &[Landmark]) -> Result<Self, PoseError> {
        if points.len() < HAND_LANDMARK_COUNT {
            return Err(PoseError::Malformed { found: points.len() });
        }

        let mut set = [Landmark::default(); HAND_LANDMARK_COUNT];
        for (i, lm) in points.iter().take(HAND_LANDMARK_COUNT).enumerate() {
            if !lm.is_finite() {
                return Err(PoseError::NonFinite { index: i });
            }
            set[i] = *lm;
        }

        Ok(Self { points: set })
    }

    /// Flat `[x0, y0, z0, x1, ...]` layout, as detector bridges usually hand it over.
    pub fn from_flat(flat: &[f64]) -> Result<Self, PoseError> {
        let points: Vec<Landmark> = flat
            .chunks_exact(3)
            .map(|c| Landmark::new(c[0], c[1], c[2]))
            .collect();
        Self::from_points(&points)
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index)
    }

    pub fn points(&self) -> &[Landmark; HAND_LANDMARK_COUNT] {
        &self.points
    }

    pub fn wrist(&self) -> Landmark {
        self.points[WRIST]
    }

    pub fn index_mcp(&self) -> Landmark {
        self.points[INDEX_MCP]
    }

    pub fn middle_mcp(&self) -> Landmark {
        self.points[MIDDLE_MCP]
    }

    pub fn pinky_mcp(&self) -> Landmark {
        self.points[PINKY_MCP]
    }
}

impl TryFrom<Vec<[f64; 3]>> for LandmarkSet {
    type Error = PoseError;

    fn try_from(raw: Vec<[f64; 3]>) -> Result<Self, Self::Error> {
        let points: Vec<Landmark> = raw.into_iter().map(Landmark::from).collect();
        Self::from_points(&points)
    }
}
