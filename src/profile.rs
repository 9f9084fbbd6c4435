//! Exercise profiles: which joints to watch and which thresholds count a rep
//!
//! Profiles are process-wide, read-only configuration after startup. Unknown
//! exercise identifiers resolve to the default (squats-shaped) profile with
//! an explicit fallback marker so callers can surface the condition instead
//! of silently misclassifying.

use crate::pose::CocoJoint;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Exercise identifier used when an unknown id falls back
pub const DEFAULT_EXERCISE_ID: &str = "squats";

/// Kind of scalar signal derived from a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    /// Interior angle at the middle joint of the triple, in degrees
    Angle,
    /// Shoulder/hip midpoint Y minus knee Y, in pixels
    VerticalDisplacement,
}

/// Threshold configuration for one exercise
///
/// For `Angle` the joint triple is (outer, vertex, outer); for
/// `VerticalDisplacement` it is (shoulder, hip, knee).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseProfile {
    pub id: String,
    pub signal_joints: [CocoJoint; 3],
    pub threshold_up: f32,
    pub threshold_down: f32,
    pub signal_kind: SignalKind,
}

impl ExerciseProfile {
    fn squats() -> Self {
        Self {
            id: "squats".to_string(),
            signal_joints: [CocoJoint::LeftHip, CocoJoint::LeftKnee, CocoJoint::LeftAnkle],
            threshold_up: 170.0,
            threshold_down: 100.0,
            signal_kind: SignalKind::Angle,
        }
    }

    fn bicep_curls() -> Self {
        Self {
            id: "bicep-curls".to_string(),
            signal_joints: [
                CocoJoint::LeftShoulder,
                CocoJoint::LeftElbow,
                CocoJoint::LeftWrist,
            ],
            threshold_up: 170.0,
            threshold_down: 30.0,
            signal_kind: SignalKind::Angle,
        }
    }

    fn pushups() -> Self {
        Self {
            id: "pushups".to_string(),
            signal_joints: [CocoJoint::LeftShoulder, CocoJoint::LeftHip, CocoJoint::LeftKnee],
            threshold_up: 50.0,
            threshold_down: -20.0,
            signal_kind: SignalKind::VerticalDisplacement,
        }
    }

    fn situps() -> Self {
        Self {
            id: "situps".to_string(),
            signal_joints: [CocoJoint::LeftShoulder, CocoJoint::LeftHip, CocoJoint::LeftKnee],
            threshold_up: 50.0,
            threshold_down: -20.0,
            signal_kind: SignalKind::VerticalDisplacement,
        }
    }
}

/// Result of a profile lookup
#[derive(Debug, Clone)]
pub struct ProfileLookup {
    pub profile: ExerciseProfile,
    /// True when the requested id was unknown and the default profile was used
    pub is_fallback: bool,
}

/// Registry of exercise profiles
///
/// Seeded with the built-in table; additional profiles may be registered
/// during startup. Lookups never fail: unknown ids produce the default
/// profile flagged as a fallback.
pub struct ProfileRegistry {
    profiles: RwLock<HashMap<String, ExerciseProfile>>,
}

impl ProfileRegistry {
    /// Create a registry containing the built-in profiles
    pub fn with_builtins() -> Self {
        let mut profiles = HashMap::new();
        for profile in [
            ExerciseProfile::squats(),
            ExerciseProfile::bicep_curls(),
            ExerciseProfile::pushups(),
            ExerciseProfile::situps(),
        ] {
            profiles.insert(profile.id.clone(), profile);
        }

        Self {
            profiles: RwLock::new(profiles),
        }
    }

    /// Register a custom profile, replacing any existing entry with the same id
    pub fn register(&self, profile: ExerciseProfile) {
        let mut profiles = self.profiles.write();
        if profiles.insert(profile.id.clone(), profile.clone()).is_some() {
            warn!("Replaced existing exercise profile '{}'", profile.id);
        } else {
            debug!("Registered exercise profile '{}'", profile.id);
        }
    }

    /// Look up the profile for an exercise id
    pub fn lookup(&self, exercise_id: &str) -> ProfileLookup {
        let profiles = self.profiles.read();

        if let Some(profile) = profiles.get(exercise_id) {
            return ProfileLookup {
                profile: profile.clone(),
                is_fallback: false,
            };
        }

        let default = profiles
            .get(DEFAULT_EXERCISE_ID)
            .cloned()
            .unwrap_or_else(ExerciseProfile::squats);

        ProfileLookup {
            profile: default,
            is_fallback: true,
        }
    }

    /// Identifiers of all registered profiles
    pub fn exercise_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.profiles.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
