use crate::error::FrameError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Number of keypoints in a single-person COCO pose result
pub const KEYPOINT_COUNT: usize = 17;

/// One detected anatomical joint position with a confidence score
///
/// Coordinates are in the capture frame's pixel space. `score` is the
/// detector's confidence in [0, 1]; an absent joint is reported as a
/// low-confidence keypoint, never omitted from the frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, score: f32) -> Self {
        Self { x, y, score }
    }

    /// Check whether the keypoint clears the given confidence threshold
    pub fn is_confident(&self, min_score: f32) -> bool {
        self.score > min_score
    }

    /// Check whether both coordinates are finite numbers
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// COCO keypoint indices in the fixed single-person anatomical layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CocoJoint {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl CocoJoint {
    /// Index of this joint in a `KeypointFrame`
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Anatomical name, e.g. "left_shoulder"
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEye => "left_eye",
            Self::RightEye => "right_eye",
            Self::LeftEar => "left_ear",
            Self::RightEar => "right_ear",
            Self::LeftShoulder => "left_shoulder",
            Self::RightShoulder => "right_shoulder",
            Self::LeftElbow => "left_elbow",
            Self::RightElbow => "right_elbow",
            Self::LeftWrist => "left_wrist",
            Self::RightWrist => "right_wrist",
            Self::LeftHip => "left_hip",
            Self::RightHip => "right_hip",
            Self::LeftKnee => "left_knee",
            Self::RightKnee => "right_knee",
            Self::LeftAnkle => "left_ankle",
            Self::RightAnkle => "right_ankle",
        }
    }
}

/// One pose-estimation result for one video frame
///
/// Holds exactly [`KEYPOINT_COUNT`] keypoints in the fixed COCO order.
/// The keypoint vector is shared so frames clone cheaply through the
/// ring buffer.
#[derive(Debug, Clone)]
pub struct KeypointFrame {
    /// Unique frame identifier
    pub id: u64,
    /// Timestamp when the source frame was captured
    pub timestamp: SystemTime,
    keypoints: Arc<Vec<Keypoint>>,
}

impl KeypointFrame {
    /// Create a new frame, rejecting any keypoint cardinality other than 17
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        keypoints: Vec<Keypoint>,
    ) -> Result<Self, FrameError> {
        if keypoints.len() != KEYPOINT_COUNT {
            return Err(FrameError::InvalidKeypointCount {
                expected: KEYPOINT_COUNT,
                actual: keypoints.len(),
            });
        }

        Ok(Self {
            id,
            timestamp,
            keypoints: Arc::new(keypoints),
        })
    }

    /// Get the keypoint for a named joint
    pub fn joint(&self, joint: CocoJoint) -> Keypoint {
        self.keypoints[joint.index()]
    }

    /// Get a keypoint by raw index
    pub fn get(&self, index: usize) -> Option<&Keypoint> {
        self.keypoints.get(index)
    }

    /// All keypoints in anatomical order
    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Number of keypoints (always [`KEYPOINT_COUNT`] post-construction)
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    /// Frame age in milliseconds
    pub fn age_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.timestamp)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filler_keypoints() -> Vec<Keypoint> {
        (0..KEYPOINT_COUNT)
            .map(|i| Keypoint::new(i as f32, i as f32 * 2.0, 0.9))
            .collect()
    }

    #[test]
    fn test_frame_creation() {
        let frame = KeypointFrame::new(1, SystemTime::now(), filler_keypoints()).unwrap();
        assert_eq!(frame.id, 1);
        assert_eq!(frame.len(), KEYPOINT_COUNT);
    }

    #[test]
    fn test_frame_rejects_wrong_cardinality() {
        let err = KeypointFrame::new(1, SystemTime::now(), vec![Keypoint::new(0.0, 0.0, 1.0); 5])
            .unwrap_err();
        assert_eq!(
            err,
            FrameError::InvalidKeypointCount {
                expected: KEYPOINT_COUNT,
                actual: 5
            }
        );
    }

    #[test]
    fn test_joint_lookup_uses_fixed_indices() {
        let frame = KeypointFrame::new(1, SystemTime::now(), filler_keypoints()).unwrap();
        assert_eq!(frame.joint(CocoJoint::LeftShoulder).x, 5.0);
        assert_eq!(frame.joint(CocoJoint::LeftHip).x, 11.0);
        assert_eq!(frame.joint(CocoJoint::RightAnkle).x, 16.0);
    }

    #[test]
    fn test_joint_names() {
        assert_eq!(CocoJoint::Nose.name(), "nose");
        assert_eq!(CocoJoint::LeftKnee.name(), "left_knee");
        assert_eq!(CocoJoint::RightAnkle.index(), 16);
    }

    #[test]
    fn test_confidence_threshold() {
        let confident = Keypoint::new(10.0, 20.0, 0.8);
        let uncertain = Keypoint::new(10.0, 20.0, 0.3);
        assert!(confident.is_confident(0.3));
        // Exactly at the threshold does not count as usable
        assert!(!uncertain.is_confident(0.3));
    }

    #[test]
    fn test_finite_check() {
        assert!(Keypoint::new(1.0, 2.0, 0.5).is_finite());
        assert!(!Keypoint::new(f32::NAN, 2.0, 0.5).is_finite());
        assert!(!Keypoint::new(1.0, f32::INFINITY, 0.5).is_finite());
    }
}
