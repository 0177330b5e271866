// src/pose.rs - Raw anchor, size and yaw-only orientation from one landmark set
use crate::config::TrackerConfig;
use crate::error::PoseError;
use crate::landmarks::{Landmark, LandmarkSet};
use nalgebra::{Point3, Rotation3, UnitQuaternion, Vector3};

/// Shortest vector length we are willing to normalize.
const NORMALIZE_EPS: f64 = 1e-9;

/// Which vector ended up defining the object's forward axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardSource {
    /// Horizontal part of the knuckle-to-wrist direction
    HandDirection,
    /// Hand points nearly straight up/down, horizontal part of the palm normal
    PalmNormal,
    /// Nothing usable this call, previous valid orientation kept
    Retained,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawPose {
    /// Normalized image coordinates, not mirrored
    pub anchor: Point3<f64>,
    pub scale: f64,
    pub orientation: UnitQuaternion<f64>,
    pub forward_source: ForwardSource,
}

pub struct PoseExtractor {
    anchor_blend: f64,
    scale_multiplier: f64,
    vertical_threshold: f64,
    mirrored: bool,
    aspect: f64,
    last_orientation: Option<UnitQuaternion<f64>>,
}

impl PoseExtractor {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            anchor_blend: config.anchor_blend,
            scale_multiplier: config.scale_multiplier,
            vertical_threshold: config.vertical_threshold,
            mirrored: config.camera.facing.is_mirrored(),
            aspect: config.camera.aspect,
            last_orientation: None,
        }
    }

    pub fn set_mirrored(&mut self, mirrored: bool) {
        self.mirrored = mirrored;
    }

    pub fn set_aspect(&mut self, aspect: f64) {
        self.aspect = aspect;
    }

    pub fn reset(&mut self) {
        self.last_orientation = None;
    }

    pub fn extract(&mut self, set: &LandmarkSet) -> Result<RawPose, PoseError> {
        let wrist = set.wrist();
        let middle = set.middle_mcp();
        let index = set.index_mcp();
        let pinky = set.pinky_mcp();

        // scale and finger direction both hang off this segment
        let w = wrist.to_vector();
        if (middle.to_vector() - w).norm() < NORMALIZE_EPS {
            return Err(PoseError::Degenerate);
        }

        let anchor = Point3::from(w.lerp(&middle.to_vector(), self.anchor_blend));
        let scale = hand_size(&wrist, &middle) * self.scale_multiplier;

        let (forward_source, orientation) = self.orientation(&wrist, &middle, &index, &pinky);

        Ok(RawPose {
            anchor,
            scale,
            orientation,
            forward_source,
        })
    }

    fn orientation(
        &mut self,
        wrist: &Landmark,
        middle: &Landmark,
        index: &Landmark,
        pinky: &Landmark,
    ) -> (ForwardSource, UnitQuaternion<f64>) {
        let w = self.view_vector(wrist);
        let m = self.view_vector(middle);
        let i = self.view_vector(index);
        let p = self.view_vector(pinky);

        let finger_direction = (m - w).try_normalize(NORMALIZE_EPS);
        let palm_across = (p - i).try_normalize(NORMALIZE_EPS);
        let toward_user = w - m;

        let chosen = choose_forward(
            &toward_user,
            finger_direction.as_ref(),
            palm_across.as_ref(),
            self.vertical_threshold,
        )
        .and_then(|(source, forward)| orientation_basis(&forward).map(|basis| (source, basis)))
        .map(|(source, basis)| (source, quaternion_from_basis(&basis)))
        .filter(|(_, q)| q.coords.iter().all(|v| v.is_finite()));

        match chosen {
            Some((source, q)) => {
                self.last_orientation = Some(q);
                (source, q)
            }
            None => (
                ForwardSource::Retained,
                self.last_orientation.unwrap_or_else(UnitQuaternion::identity),
            ),
        }
    }

    /// Mirrors x for selfie cameras, flips depth, and corrects x/z for a
    /// non-square viewport before any angle math.
    fn view_vector(&self, lm: &Landmark) -> Vector3<f64> {
        let x = if self.mirrored { 1.0 - lm.x } else { lm.x };
        Vector3::new(x * self.aspect, lm.y, -lm.z * self.aspect)
    }
}

/// Wrist to middle knuckle distance in raw landmark units.
pub fn hand_size(wrist: &Landmark, middle: &Landmark) -> f64 {
    (middle.to_vector() - wrist.to_vector()).norm()
}

/// Palm normal canonicalized to face the camera (non-negative depth).
fn palm_normal(palm_across: &Vector3<f64>, finger_direction: &Vector3<f64>) -> Option<Vector3<f64>> {
    let n = palm_across.cross(finger_direction).try_normalize(NORMALIZE_EPS)?;
    Some(if n.z < 0.0 { -n } else { n })
}

fn horizontal(v: &Vector3<f64>) -> Vector3<f64> {
    Vector3::new(v.x, 0.0, v.z)
}

/// Forward-axis decision table:
///
/// | condition                                         | result        |
/// |---------------------------------------------------|---------------|
/// | finger direction or palm axis is zero-length      | `None`        |
/// | horizontal(toward_user)² >= `vertical_threshold`  | HandDirection |
/// | palm normal has a usable horizontal component     | PalmNormal    |
/// | otherwise                                         | `None`        |
///
/// `None` means the caller keeps its previous orientation.
pub fn choose_forward(
    toward_user: &Vector3<f64>,
    finger_direction: Option<&Vector3<f64>>,
    palm_across: Option<&Vector3<f64>>,
    vertical_threshold: f64,
) -> Option<(ForwardSource, Vector3<f64>)> {
    let (finger, across) = finger_direction.zip(palm_across)?;

    let flat = horizontal(toward_user);
    if flat.norm_squared() >= vertical_threshold {
        if let Some(forward) = flat.try_normalize(NORMALIZE_EPS) {
            return Some((ForwardSource::HandDirection, forward));
        }
    }

    palm_normal(across, finger)
        .and_then(|n| horizontal(&n).try_normalize(NORMALIZE_EPS))
        .map(|forward| (ForwardSource::PalmNormal, forward))
}

/// Builds `[X, Y, Z]` with Y locked to world up and Z as close to `forward`
/// as orthogonality allows.
pub fn orientation_basis(forward: &Vector3<f64>) -> Option<[Vector3<f64>; 3]> {
    let z = forward.try_normalize(NORMALIZE_EPS)?;
    let y = Vector3::y();
    let x = y.cross(&z).try_normalize(NORMALIZE_EPS)?;
    let z = x.cross(&y).try_normalize(NORMALIZE_EPS)?;
    Some([x, y, z])
}

pub fn quaternion_from_basis(basis: &[Vector3<f64>; 3]) -> UnitQuaternion<f64> {
    let rotation = Rotation3::from_basis_unchecked(basis);
    UnitQuaternion::from_rotation_matrix(&rotation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CameraFacing;
    use crate::landmarks::{HAND_LANDMARK_COUNT, INDEX_MCP, MIDDLE_MCP, PINKY_MCP, WRIST};

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    fn approx_eq_vec(a: &Vector3<f64>, b: &Vector3<f64>, eps: f64) -> bool {
        (a - b).norm() < eps
    }

    fn hand(wrist: [f64; 3], middle: [f64; 3], index: [f64; 3], pinky: [f64; 3]) -> LandmarkSet {
        let mut points = [Landmark::default(); HAND_LANDMARK_COUNT];
        points[WRIST] = wrist.into();
        points[MIDDLE_MCP] = middle.into();
        points[INDEX_MCP] = index.into();
        points[PINKY_MCP] = pinky.into();
        LandmarkSet::from_points(&points).unwrap()
    }

    fn extractor(facing: CameraFacing, aspect: f64) -> PoseExtractor {
        let mut config = TrackerConfig::default();
        config.camera.facing = facing;
        config.camera.aspect = aspect;
        PoseExtractor::new(&config)
    }

    fn upright_hand() -> LandmarkSet {
        hand(
            [0.5, 0.5, 0.0],
            [0.5, 0.4, 0.05],
            [0.45, 0.42, 0.05],
            [0.55, 0.42, 0.05],
        )
    }

    #[test]
    fn test_upright_hand_uses_palm_normal() {
        let mut ex = extractor(CameraFacing::Rear, 1.0);
        let pose = ex.extract(&upright_hand()).unwrap();

        assert_eq!(pose.forward_source, ForwardSource::PalmNormal);
        assert!(approx_eq(pose.scale, 0.0125_f64.sqrt() * 12.0, 1e-9));
        assert!(approx_eq(pose.scale, 1.3416, 1e-3));

        let forward = pose.orientation * Vector3::z();
        assert!(approx_eq_vec(&forward, &Vector3::z(), 1e-9));
        let up = pose.orientation * Vector3::y();
        assert!(approx_eq_vec(&up, &Vector3::y(), 1e-9));
    }

    #[test]
    fn test_horizontal_hand_uses_hand_direction() {
        let mut ex = extractor(CameraFacing::Rear, 1.0);
        // fingers point toward +x, so toward-user is -x
        let set = hand(
            [0.3, 0.5, 0.0],
            [0.5, 0.5, 0.0],
            [0.48, 0.45, 0.0],
            [0.48, 0.55, 0.0],
        );
        let pose = ex.extract(&set).unwrap();

        assert_eq!(pose.forward_source, ForwardSource::HandDirection);
        let forward = pose.orientation * Vector3::z();
        assert!(approx_eq_vec(&forward, &-Vector3::x(), 1e-9));
    }

    #[test]
    fn test_mirroring_flips_yaw() {
        let set = hand(
            [0.3, 0.5, 0.0],
            [0.5, 0.5, 0.0],
            [0.48, 0.45, 0.0],
            [0.48, 0.55, 0.0],
        );
        let rear = extractor(CameraFacing::Rear, 1.0).extract(&set).unwrap();
        let front = extractor(CameraFacing::Front, 1.0).extract(&set).unwrap();

        let f_rear = rear.orientation * Vector3::z();
        let f_front = front.orientation * Vector3::z();
        assert!(approx_eq(f_rear.x, -f_front.x, 1e-9));
        assert!(approx_eq(f_rear.z, f_front.z, 1e-9));
        // position stays unmirrored, the projector owns that
        assert_eq!(rear.anchor, front.anchor);
    }

    #[test]
    fn test_anchor_blend() {
        let mut config = TrackerConfig::default();
        config.anchor_blend = 0.5;
        let mut ex = PoseExtractor::new(&config);
        let pose = ex.extract(&upright_hand()).unwrap();
        assert!(approx_eq(pose.anchor.x, 0.5, 1e-12));
        assert!(approx_eq(pose.anchor.y, 0.45, 1e-12));
        assert!(approx_eq(pose.anchor.z, 0.025, 1e-12));

        let mut wrist_only = extractor(CameraFacing::Front, 1.0);
        let pose = wrist_only.extract(&upright_hand()).unwrap();
        assert_eq!(pose.anchor, Point3::new(0.5, 0.5, 0.0));
    }

    #[test]
    fn test_basis_is_orthonormal() {
        let mut ex = extractor(CameraFacing::Front, 16.0 / 9.0);
        let mut seed = 0x2545_f491_u64;
        let mut next = move || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 11) as f64 / (1u64 << 53) as f64
        };

        for _ in 0..200 {
            let mut p = || [next(), next(), next() * 0.2 - 0.1];
            let set = hand(p(), p(), p(), p());
            let pose = ex.extract(&set).unwrap();
            let rot = pose.orientation.to_rotation_matrix();
            let m = rot.matrix();
            for a in 0..3 {
                assert!(approx_eq(m.column(a).norm(), 1.0, 1e-9));
                for b in (a + 1)..3 {
                    assert!(approx_eq(m.column(a).dot(&m.column(b)), 0.0, 1e-9));
                }
            }
            assert!(approx_eq(pose.orientation.quaternion().norm(), 1.0, 1e-9));
        }
    }

    #[test]
    fn test_orientation_basis_direct() {
        let basis = orientation_basis(&Vector3::new(0.3, 0.0, -0.7)).unwrap();
        for a in 0..3 {
            assert!(approx_eq(basis[a].norm(), 1.0, 1e-12));
            for b in (a + 1)..3 {
                assert!(approx_eq(basis[a].dot(&basis[b]), 0.0, 1e-12));
            }
        }
        assert_eq!(basis[1], Vector3::y());
        assert!(orientation_basis(&Vector3::zeros()).is_none());
    }

    #[test]
    fn test_choose_forward_table() {
        let across = Vector3::x();
        let finger = -Vector3::y();
        let sideways = Vector3::new(0.2, 0.0, 0.0);
        let upright = Vector3::new(0.0, 0.1, 0.05);
        let straight_up = Vector3::new(0.0, 0.1, 0.0);

        let (src, _) = choose_forward(&sideways, Some(&finger), Some(&across), 0.01).unwrap();
        assert_eq!(src, ForwardSource::HandDirection);

        let (src, f) = choose_forward(&upright, Some(&finger), Some(&across), 0.01).unwrap();
        assert_eq!(src, ForwardSource::PalmNormal);
        assert!(approx_eq_vec(&f, &Vector3::z(), 1e-12));

        // a zero-length input wins over any forward branch
        assert!(choose_forward(&sideways, Some(&finger), None, 0.01).is_none());
        assert!(choose_forward(&sideways, None, Some(&across), 0.01).is_none());

        // palm normal points straight up, no horizontal part
        let into_screen = Vector3::z();
        assert!(choose_forward(&straight_up, Some(&into_screen), Some(&across), 0.01).is_none());
        // palm axis parallel to the fingers, cross product collapses
        assert!(choose_forward(&straight_up, Some(&across), Some(&across), 0.01).is_none());
    }

    #[test]
    fn test_retains_previous_orientation() {
        let mut ex = extractor(CameraFacing::Rear, 1.0);
        let first = ex
            .extract(&hand(
                [0.3, 0.5, 0.0],
                [0.5, 0.5, 0.0],
                [0.48, 0.45, 0.0],
                [0.48, 0.55, 0.0],
            ))
            .unwrap();

        // vertical hand with index == pinky: no palm axis, no usable forward
        let pose = ex
            .extract(&hand(
                [0.5, 0.5, 0.0],
                [0.5, 0.4, 0.0],
                [0.5, 0.42, 0.0],
                [0.5, 0.42, 0.0],
            ))
            .unwrap();
        assert_eq!(pose.forward_source, ForwardSource::Retained);
        assert_eq!(pose.orientation, first.orientation);
    }

    #[test]
    fn test_horizontal_hand_without_palm_axis_retains() {
        let mut ex = extractor(CameraFacing::Rear, 1.0);
        let first = ex.extract(&upright_hand()).unwrap();

        // pointing sideways, but index == pinky
        let pose = ex
            .extract(&hand(
                [0.3, 0.5, 0.0],
                [0.5, 0.5, 0.0],
                [0.48, 0.5, 0.0],
                [0.48, 0.5, 0.0],
            ))
            .unwrap();
        assert_eq!(pose.forward_source, ForwardSource::Retained);
        assert_eq!(pose.orientation, first.orientation);
        assert!(pose.scale > 0.0);
    }

    #[test]
    fn test_retained_before_any_is_identity() {
        let mut ex = extractor(CameraFacing::Rear, 1.0);
        let pose = ex
            .extract(&hand(
                [0.5, 0.5, 0.0],
                [0.5, 0.4, 0.0],
                [0.5, 0.42, 0.0],
                [0.5, 0.42, 0.0],
            ))
            .unwrap();
        assert_eq!(pose.forward_source, ForwardSource::Retained);
        assert_eq!(pose.orientation, UnitQuaternion::identity());
    }

    #[test]
    fn test_wrist_on_middle_knuckle_is_degenerate() {
        let mut ex = extractor(CameraFacing::Rear, 1.0);
        let before = ex.extract(&upright_hand()).unwrap();

        let set = hand(
            [0.2, 0.8, 0.0],
            [0.2, 0.8, 0.0],
            [0.15, 0.72, 0.0],
            [0.25, 0.72, 0.0],
        );
        assert_eq!(ex.extract(&set), Err(PoseError::Degenerate));
        assert_eq!(ex.last_orientation, Some(before.orientation));
    }

    #[test]
    fn test_overflowing_landmarks_keep_orientation_finite() {
        let mut ex = extractor(CameraFacing::Front, 16.0 / 9.0);
        let before = ex.extract(&upright_hand()).unwrap();

        // finite on input, infinite once scaled by the aspect ratio
        let pose = ex
            .extract(&hand(
                [1e308, 0.5, 0.0],
                [-1e308, 0.4, 0.0],
                [0.45, 0.42, 0.0],
                [0.55, 0.42, 0.0],
            ))
            .unwrap();
        assert_eq!(pose.forward_source, ForwardSource::Retained);
        assert_eq!(pose.orientation, before.orientation);
        assert_eq!(ex.last_orientation, Some(before.orientation));
    }

    #[test]
    fn test_all_coincident_is_degenerate() {
        let mut ex = extractor(CameraFacing::Front, 1.0);
        let before = ex.extract(&upright_hand()).unwrap();

        let p = [0.4, 0.4, 0.0];
        assert_eq!(ex.extract(&hand(p, p, p, p)), Err(PoseError::Degenerate));
        assert_eq!(ex.last_orientation, Some(before.orientation));
    }

    #[test]
    fn test_scale_non_negative() {
        let mut ex = extractor(CameraFacing::Front, 1.0);
        let pose = ex
            .extract(&hand(
                [0.9, 0.1, 0.3],
                [0.1, 0.9, -0.3],
                [0.2, 0.2, 0.0],
                [0.8, 0.8, 0.0],
            ))
            .unwrap();
        assert!(pose.scale > 0.0);
        assert!(pose.scale.is_finite());
    }

    #[test]
    fn test_reset_forgets_orientation() {
        let mut ex = extractor(CameraFacing::Front, 1.0);
        ex.extract(&upright_hand()).unwrap();
        ex.reset();
        assert!(ex.last_orientation.is_none());
    }
}
