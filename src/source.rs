use crate::config::SourceConfig;
use crate::error::{FrameError, RepcamError, Result};
use crate::events::{EventBus, RepcamEvent};
use crate::pose::{Keypoint, KeypointFrame, KEYPOINT_COUNT};
use crate::profile::{ExerciseProfile, SignalKind};
use crate::ring_buffer::FrameRingBuffer;

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tracing::{debug, error, info, trace, warn};

/// Seam for the external pose-estimation model
///
/// Implementations produce [`KeypointFrame`]s into the ring buffer at their
/// own cadence. The analysis loop never talks to the model directly.
#[async_trait]
pub trait PoseSource: Send + Sync {
    /// Start producing frames into the given ring buffer
    async fn start(&self, ring_buffer: Arc<FrameRingBuffer>) -> Result<()>;

    /// Stop producing frames
    async fn stop(&self) -> Result<()>;

    /// Whether the source is currently producing frames
    fn is_running(&self) -> bool;

    /// Total frames produced so far
    fn frames_produced(&self) -> u64;
}

/// Pose source that replays a prerecorded keypoint script
///
/// Stands in for a live pose model: frames are emitted at the configured
/// rate, each stamped with a fresh id and capture time. Used by the CLI
/// replay mode, the built-in demo, and tests.
pub struct ScriptedPoseSource {
    config: SourceConfig,
    script: Arc<Vec<Vec<Keypoint>>>,
    event_bus: Arc<EventBus>,
    frame_counter: Arc<AtomicU64>,
    is_running: Arc<AtomicBool>,
    source_task: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl ScriptedPoseSource {
    /// Create a scripted source, rejecting frames with the wrong cardinality
    pub fn new(
        config: SourceConfig,
        script: Vec<Vec<Keypoint>>,
        event_bus: Arc<EventBus>,
    ) -> Result<Self> {
        for (i, keypoints) in script.iter().enumerate() {
            if keypoints.len() != KEYPOINT_COUNT {
                warn!(
                    "Scripted frame {} has {} keypoints, expected {}",
                    i,
                    keypoints.len(),
                    KEYPOINT_COUNT
                );
                return Err(FrameError::InvalidKeypointCount {
                    expected: KEYPOINT_COUNT,
                    actual: keypoints.len(),
                }
                .into());
            }
        }

        info!(
            "Created scripted pose source with {} frames at {} fps",
            script.len(),
            config.fps
        );

        Ok(Self {
            config,
            script: Arc::new(script),
            event_bus,
            frame_counter: Arc::new(AtomicU64::new(0)),
            is_running: Arc::new(AtomicBool::new(false)),
            source_task: Arc::new(Mutex::new(None)),
        })
    }

    /// Load a script from a JSON file (a list of 17-keypoint lists)
    pub async fn from_json_file<P: AsRef<Path>>(
        path: P,
        config: SourceConfig,
        event_bus: Arc<EventBus>,
    ) -> Result<Self> {
        let script = load_script(path).await?;
        Self::new(config, script, event_bus)
    }

    /// Number of frames in the loaded script
    pub fn script_len(&self) -> usize {
        self.script.len()
    }
}

#[async_trait]
impl PoseSource for ScriptedPoseSource {
    async fn start(&self, ring_buffer: Arc<FrameRingBuffer>) -> Result<()> {
        if self.is_running.load(Ordering::Relaxed) {
            warn!("Scripted pose source is already running");
            return Ok(());
        }

        if self.script.is_empty() {
            return Err(RepcamError::component(
                "scripted_pose_source",
                "replay script contains no frames",
            ));
        }

        info!("Starting scripted pose source");
        self.is_running.store(true, Ordering::Relaxed);

        let _ = self
            .event_bus
            .publish(RepcamEvent::SourceStatusChanged {
                connected: true,
                timestamp: SystemTime::now(),
            })
            .await;

        let config = self.config.clone();
        let script = Arc::clone(&self.script);
        let event_bus = Arc::clone(&self.event_bus);
        let frame_counter = Arc::clone(&self.frame_counter);
        let is_running = Arc::clone(&self.is_running);
        let source_task = Arc::clone(&self.source_task);

        let task = tokio::spawn(async move {
            let frame_interval = Duration::from_millis(1000 / config.fps.max(1) as u64);
            let mut interval_timer = tokio::time::interval(frame_interval);
            let mut cursor = 0usize;

            info!("Scripted pose loop started ({} frames)", script.len());

            while is_running.load(Ordering::Relaxed) {
                interval_timer.tick().await;

                if !is_running.load(Ordering::Relaxed) {
                    break;
                }

                if cursor >= script.len() {
                    if config.loop_replay {
                        cursor = 0;
                    } else {
                        info!("Replay script exhausted, stopping pose source");
                        break;
                    }
                }

                let frame_id = frame_counter.fetch_add(1, Ordering::Relaxed);
                let timestamp = SystemTime::now();

                let frame =
                    match KeypointFrame::new(frame_id, timestamp, script[cursor].clone()) {
                        Ok(frame) => frame,
                        Err(e) => {
                            error!("Scripted frame {} rejected: {}", cursor, e);
                            cursor += 1;
                            continue;
                        }
                    };

                trace!("Emitting scripted frame {} (cursor {})", frame_id, cursor);
                ring_buffer.push_frame(frame).await;

                let _ = event_bus
                    .publish(RepcamEvent::FrameReady {
                        frame_id,
                        timestamp,
                    })
                    .await;

                cursor += 1;
            }

            is_running.store(false, Ordering::Relaxed);
            let _ = event_bus
                .publish(RepcamEvent::SourceStatusChanged {
                    connected: false,
                    timestamp: SystemTime::now(),
                })
                .await;

            info!("Scripted pose loop stopped");
        });

        *source_task.lock().await = Some(task);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if !self.is_running.load(Ordering::Relaxed) {
            debug!("Scripted pose source is not running");
            return Ok(());
        }

        info!("Stopping scripted pose source");
        self.is_running.store(false, Ordering::Relaxed);

        if let Some(task) = self.source_task.lock().await.take() {
            match tokio::time::timeout(Duration::from_secs(3), task).await {
                Ok(Ok(())) => {
                    info!("Scripted pose task completed successfully");
                }
                Ok(Err(e)) => {
                    error!("Error waiting for scripted pose task: {}", e);
                }
                Err(_) => {
                    warn!("Scripted pose task did not complete within timeout");
                }
            }
        }

        Ok(())
    }

    fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    fn frames_produced(&self) -> u64 {
        self.frame_counter.load(Ordering::Relaxed)
    }
}

/// Load a keypoint replay script from a JSON file
pub async fn load_script<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<Keypoint>>> {
    let path = path.as_ref();
    info!("Loading keypoint replay from {}", path.display());

    let contents = tokio::fs::read_to_string(path).await?;
    let script: Vec<Vec<Keypoint>> = serde_json::from_str(&contents)?;
    Ok(script)
}

/// Build one scripted frame whose profile signal evaluates to `signal`
///
/// The three profile joints are laid out geometrically to hit the target
/// value; all other keypoints are low-confidence placeholders, the way an
/// occluded joint comes back from a real pose model.
pub fn scripted_keypoints(profile: &ExerciseProfile, signal: f32) -> Vec<Keypoint> {
    let mut keypoints = vec![Keypoint::new(0.0, 0.0, 0.1); KEYPOINT_COUNT];

    match profile.signal_kind {
        SignalKind::Angle => {
            let (vx, vy) = (320.0, 240.0);
            let theta = signal.to_radians();
            keypoints[profile.signal_joints[1].index()] = Keypoint::new(vx, vy, 0.95);
            keypoints[profile.signal_joints[2].index()] = Keypoint::new(vx + 100.0, vy, 0.95);
            keypoints[profile.signal_joints[0].index()] = Keypoint::new(
                vx + 100.0 * theta.cos(),
                vy + 100.0 * theta.sin(),
                0.95,
            );
        }
        SignalKind::VerticalDisplacement => {
            let knee_y = 300.0;
            keypoints[profile.signal_joints[0].index()] =
                Keypoint::new(260.0, knee_y + signal, 0.95);
            keypoints[profile.signal_joints[1].index()] =
                Keypoint::new(320.0, knee_y + signal, 0.95);
            keypoints[profile.signal_joints[2].index()] = Keypoint::new(380.0, knee_y, 0.95);
        }
    }

    keypoints
}

/// Generate a demo replay script of full repetition cycles for a profile
pub fn demo_script(profile: &ExerciseProfile, cycles: usize) -> Vec<Vec<Keypoint>> {
    let high = profile.threshold_up + 5.0;
    let low = profile.threshold_down - 5.0;
    let mid = (profile.threshold_up + profile.threshold_down) / 2.0;

    let mut script = Vec::new();
    for _ in 0..cycles {
        for &signal in &[mid, high, high, mid, low, low] {
            script.push(scripted_keypoints(profile, signal));
        }
    }
    script
}
