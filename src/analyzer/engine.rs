use crate::config::AnalyzerConfig;
use crate::error::{AnalyzerError, FrameError, Result};
use crate::geometry;
use crate::pose::{Keypoint, KeypointFrame, KEYPOINT_COUNT};
use crate::profile::{ProfileRegistry, SignalKind};
use crate::analyzer::state_machine::RepetitionState;

use std::sync::Arc;
use tracing::{debug, trace};

/// Outcome of evaluating one frame against one exercise session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameEvaluation {
    /// Successor repetition state (equal to the input state when nothing fired)
    pub state: RepetitionState,
    /// The scalar signal derived from the frame
    pub signal: f32,
    /// True exactly when a repetition completed on this frame
    pub rep_completed: bool,
    /// True when the exercise id was unknown and the default profile was used
    pub used_default_profile: bool,
    /// True when a required joint fell below the confidence threshold
    pub low_confidence: bool,
}

/// Per-frame repetition counting engine
///
/// Stateless across frames: the caller owns the [`RepetitionState`] and
/// passes it through each evaluation, so independent sessions and batch
/// replays need no shared state.
pub struct RepAnalyzer {
    config: AnalyzerConfig,
    profiles: Arc<ProfileRegistry>,
}

impl RepAnalyzer {
    pub fn new(config: AnalyzerConfig, profiles: Arc<ProfileRegistry>) -> Self {
        debug!(
            "Creating rep analyzer (min score: {}, confidence gating: {})",
            config.min_keypoint_score, config.require_confident_joints
        );
        Self { config, profiles }
    }

    /// Evaluate a single frame for the given exercise
    ///
    /// Rejected frames (wrong cardinality, non-finite required joints)
    /// leave the passed-in state untouched; the caller keeps its previous
    /// state and simply skips the frame.
    pub fn evaluate_frame(
        &self,
        frame: &KeypointFrame,
        exercise_id: &str,
        state: RepetitionState,
    ) -> Result<FrameEvaluation> {
        if frame.len() != KEYPOINT_COUNT {
            return Err(FrameError::InvalidKeypointCount {
                expected: KEYPOINT_COUNT,
                actual: frame.len(),
            }
            .into());
        }

        let lookup = self.profiles.lookup(exercise_id);
        let profile = &lookup.profile;

        let joints: [Keypoint; 3] = [
            frame.joint(profile.signal_joints[0]),
            frame.joint(profile.signal_joints[1]),
            frame.joint(profile.signal_joints[2]),
        ];

        for (keypoint, joint) in joints.iter().zip(profile.signal_joints.iter()) {
            if !keypoint.is_finite() {
                return Err(AnalyzerError::DegenerateGeometry {
                    joint: joint.index(),
                }
                .into());
            }
        }

        let signal = match profile.signal_kind {
            SignalKind::Angle => geometry::angle_at(joints[0], joints[1], joints[2]),
            SignalKind::VerticalDisplacement => {
                geometry::trunk_drop(joints[0], joints[1], joints[2])
            }
        };

        let low_confidence = joints
            .iter()
            .any(|kp| !kp.is_confident(self.config.min_keypoint_score));

        if low_confidence && self.config.require_confident_joints {
            trace!(
                "Frame {} skipped for counting: required joint below score {}",
                frame.id,
                self.config.min_keypoint_score
            );
            return Ok(FrameEvaluation {
                state,
                signal,
                rep_completed: false,
                used_default_profile: lookup.is_fallback,
                low_confidence,
            });
        }

        let (next_state, rep_completed) =
            state.advance(signal, profile.threshold_up, profile.threshold_down);

        trace!(
            "Frame {} evaluated: signal {:.2}, direction {:?}, count {}",
            frame.id,
            signal,
            next_state.direction,
            next_state.count
        );

        Ok(FrameEvaluation {
            state: next_state,
            signal,
            rep_completed,
            used_default_profile: lookup.is_fallback,
            low_confidence,
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn profiles(&self) -> &ProfileRegistry {
        &self.profiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::state_machine::Direction;
    use crate::pose::CocoJoint;
    use std::time::SystemTime;

    fn analyzer() -> RepAnalyzer {
        RepAnalyzer::new(
            AnalyzerConfig::default(),
            Arc::new(ProfileRegistry::with_builtins()),
        )
    }

    fn gating_analyzer() -> RepAnalyzer {
        let config = AnalyzerConfig {
            require_confident_joints: true,
            ..AnalyzerConfig::default()
        };
        RepAnalyzer::new(config, Arc::new(ProfileRegistry::with_builtins()))
    }

    /// Build a frame with the given joints overridden; all other keypoints
    /// sit at the origin with high confidence.
    fn frame_with(id: u64, joints: &[(CocoJoint, f32, f32, f32)]) -> KeypointFrame {
        let mut keypoints = vec![Keypoint::new(0.0, 0.0, 0.9); KEYPOINT_COUNT];
        for &(joint, x, y, score) in joints {
            keypoints[joint.index()] = Keypoint::new(x, y, score);
        }
        KeypointFrame::new(id, SystemTime::now(), keypoints).unwrap()
    }

    /// Squat frame with the hip-knee-ankle angle set to `degrees`
    fn squat_frame(id: u64, degrees: f32) -> KeypointFrame {
        let theta = degrees.to_radians();
        frame_with(
            id,
            &[
                (CocoJoint::LeftKnee, 0.0, 0.0, 0.9),
                (CocoJoint::LeftAnkle, 100.0, 0.0, 0.9),
                (CocoJoint::LeftHip, 100.0 * theta.cos(), 100.0 * theta.sin(), 0.9),
            ],
        )
    }

    /// Pushup frame with the configured trunk drop relative to the knee
    fn pushup_frame(id: u64, drop: f32) -> KeypointFrame {
        let knee_y = 100.0;
        frame_with(
            id,
            &[
                (CocoJoint::LeftShoulder, 0.0, knee_y + drop, 0.9),
                (CocoJoint::LeftHip, 50.0, knee_y + drop, 0.9),
                (CocoJoint::LeftKnee, 100.0, knee_y, 0.9),
            ],
        )
    }

    #[test]
    fn test_squat_sequence_counts_one_rep() {
        let analyzer = analyzer();
        let mut state = RepetitionState::new();

        let angles = [60.0, 175.0, 175.0, 60.0];
        let mut transitions = Vec::new();

        for (i, &angle) in angles.iter().enumerate() {
            let eval = analyzer
                .evaluate_frame(&squat_frame(i as u64, angle), "squats", state)
                .unwrap();
            transitions.push((eval.state.direction, eval.rep_completed));
            state = eval.state;
        }

        assert_eq!(transitions[0], (Direction::Down, false));
        assert_eq!(transitions[1], (Direction::Up, false));
        assert_eq!(transitions[2], (Direction::Up, false));
        assert_eq!(transitions[3], (Direction::Down, true));
        assert_eq!(state.count, 1);
    }

    #[test]
    fn test_pushup_sequence_counts_one_rep() {
        let analyzer = analyzer();
        let mut state = RepetitionState::new();

        for (i, &drop) in [10.0, 60.0, 60.0, -30.0].iter().enumerate() {
            let eval = analyzer
                .evaluate_frame(&pushup_frame(i as u64, drop), "pushups", state)
                .unwrap();
            state = eval.state;
        }

        assert_eq!(state.count, 1);
        assert_eq!(state.direction, Direction::Down);
    }

    #[test]
    fn test_displacement_signal_value() {
        let analyzer = analyzer();
        let eval = analyzer
            .evaluate_frame(&pushup_frame(1, 35.0), "situps", RepetitionState::new())
            .unwrap();
        assert!((eval.signal - 35.0).abs() < 1e-3);
    }

    #[test]
    fn test_unknown_exercise_uses_default_profile() {
        let analyzer = analyzer();
        let eval = analyzer
            .evaluate_frame(
                &squat_frame(1, 175.0),
                "jumping-jacks",
                RepetitionState::new(),
            )
            .unwrap();

        assert!(eval.used_default_profile);
        // Default profile behaves like squats: 175 degrees crosses the up threshold
        assert_eq!(eval.state.direction, Direction::Up);
    }

    #[test]
    fn test_non_finite_joint_rejected_without_state_change() {
        let analyzer = analyzer();
        let state = RepetitionState {
            direction: Direction::Up,
            count: 3,
        };

        let frame = frame_with(
            1,
            &[(CocoJoint::LeftKnee, f32::NAN, 0.0, 0.9)],
        );

        let err = analyzer.evaluate_frame(&frame, "squats", state).unwrap_err();
        match err {
            crate::error::RepcamError::Analyzer(AnalyzerError::DegenerateGeometry { joint }) => {
                assert_eq!(joint, CocoJoint::LeftKnee.index());
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_low_confidence_counts_by_default() {
        // Reference behavior: counting does not gate on confidence
        let analyzer = analyzer();
        let mut frame = vec![Keypoint::new(0.0, 0.0, 0.9); KEYPOINT_COUNT];
        frame[CocoJoint::LeftKnee.index()] = Keypoint::new(0.0, 0.0, 0.1);
        frame[CocoJoint::LeftAnkle.index()] = Keypoint::new(100.0, 0.0, 0.1);
        frame[CocoJoint::LeftHip.index()] = Keypoint::new(-100.0, 0.0, 0.1);
        let frame = KeypointFrame::new(1, SystemTime::now(), frame).unwrap();

        let eval = analyzer
            .evaluate_frame(&frame, "squats", RepetitionState::new())
            .unwrap();

        assert!(eval.low_confidence);
        assert_eq!(eval.state.direction, Direction::Up);
    }

    #[test]
    fn test_low_confidence_skips_when_gating_enabled() {
        let analyzer = gating_analyzer();
        let mut keypoints = vec![Keypoint::new(0.0, 0.0, 0.9); KEYPOINT_COUNT];
        keypoints[CocoJoint::LeftKnee.index()] = Keypoint::new(0.0, 0.0, 0.1);
        keypoints[CocoJoint::LeftAnkle.index()] = Keypoint::new(100.0, 0.0, 0.9);
        keypoints[CocoJoint::LeftHip.index()] = Keypoint::new(-100.0, 0.0, 0.9);
        let frame = KeypointFrame::new(1, SystemTime::now(), keypoints).unwrap();

        let state = RepetitionState::new();
        let eval = analyzer.evaluate_frame(&frame, "squats", state).unwrap();

        assert!(eval.low_confidence);
        assert!(!eval.rep_completed);
        assert_eq!(eval.state, state);
    }
}
