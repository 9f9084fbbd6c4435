//! Planar joint geometry for pose signals
//!
//! Pure functions over keypoint coordinates. Confidence filtering is the
//! caller's concern; these are defined for all finite inputs.

use crate::pose::Keypoint;

/// Interior angle at vertex `b` formed by rays `b -> a` and `b -> c`, in degrees
///
/// The result is always in [0, 180]: 180 for a straight joint, 0 when the
/// outer points coincide.
pub fn angle_at(a: Keypoint, b: Keypoint, c: Keypoint) -> f32 {
    let radians = (c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x);
    let magnitude = radians.to_degrees().abs();

    if magnitude > 180.0 {
        360.0 - magnitude
    } else {
        magnitude
    }
}

/// Vertical displacement of the shoulder/hip midpoint relative to the knee
///
/// Positive when the trunk midpoint sits below the knee in image
/// coordinates (y grows downward), which is how pushup and situp depth is
/// measured.
pub fn trunk_drop(shoulder: Keypoint, hip: Keypoint, knee: Keypoint) -> f32 {
    (shoulder.y + hip.y) / 2.0 - knee.y
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kp(x: f32, y: f32) -> Keypoint {
        Keypoint::new(x, y, 1.0)
    }

    #[test]
    fn test_right_angle() {
        let angle = angle_at(kp(1.0, 0.0), kp(0.0, 0.0), kp(0.0, 1.0));
        assert!((angle - 90.0).abs() < 1e-3);
    }

    #[test]
    fn test_collinear_opposite_sides_is_straight() {
        let angle = angle_at(kp(-1.0, 0.0), kp(0.0, 0.0), kp(1.0, 0.0));
        assert!((angle - 180.0).abs() < 1e-3);
    }

    #[test]
    fn test_coincident_outer_points_is_zero() {
        let angle = angle_at(kp(1.0, 1.0), kp(0.0, 0.0), kp(1.0, 1.0));
        assert!(angle.abs() < 1e-3);
    }

    #[test]
    fn test_symmetric_under_endpoint_swap() {
        let (a, b, c) = (kp(3.0, 1.0), kp(0.5, -0.5), kp(-2.0, 4.0));
        assert!((angle_at(a, b, c) - angle_at(c, b, a)).abs() < 1e-3);
    }

    #[test]
    fn test_range_stays_in_bounds() {
        // Sweep one ray around the vertex; every result must land in [0, 180]
        for i in 0..72 {
            let theta = (i as f32) * 5.0_f32.to_radians();
            let a = kp(theta.cos(), theta.sin());
            let angle = angle_at(a, kp(0.0, 0.0), kp(1.0, 0.0));
            assert!(
                (0.0..=180.0).contains(&angle),
                "angle {} out of range at step {}",
                angle,
                i
            );
        }
    }

    #[test]
    fn test_reflex_configurations_fold_back() {
        // 270 degrees of raw sweep must report as 90
        let angle = angle_at(kp(0.0, -1.0), kp(0.0, 0.0), kp(-1.0, 0.0));
        assert!((angle - 90.0).abs() < 1e-3);
    }

    #[test]
    fn test_trunk_drop_midpoint() {
        let drop = trunk_drop(kp(0.0, 120.0), kp(0.0, 100.0), kp(0.0, 100.0));
        assert!((drop - 10.0).abs() < 1e-3);

        let negative = trunk_drop(kp(0.0, 80.0), kp(0.0, 80.0), kp(0.0, 100.0));
        assert!((negative + 20.0).abs() < 1e-3);
    }
}
