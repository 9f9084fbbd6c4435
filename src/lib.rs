pub mod analyzer;
pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod geometry;
pub mod pose;
pub mod profile;
pub mod ring_buffer;
pub mod session;
pub mod source;
pub mod storage;

pub use analyzer::{
    Direction, FrameEvaluation, RepAnalysisMetrics, RepAnalyzer, RepAnalyzerOrchestrator,
    RepetitionState,
};
pub use app::{ComponentState, RepcamOrchestrator, ShutdownReason};
pub use config::RepcamConfig;
pub use error::{RepcamError, Result};
pub use events::{EventBus, EventFilter, EventReceiver, RepcamEvent};
pub use pose::{CocoJoint, Keypoint, KeypointFrame, KEYPOINT_COUNT};
pub use profile::{ExerciseProfile, ProfileLookup, ProfileRegistry, SignalKind};
pub use ring_buffer::{FrameRingBuffer, FrameRingBufferStatsSnapshot};
pub use session::{SessionManager, WorkoutSession};
pub use source::{PoseSource, ScriptedPoseSource};
pub use storage::{StorageStats, WorkoutRecord, WorkoutStorage, HISTORY_KEY};
