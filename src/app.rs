use crate::analyzer::{RepAnalysisMetrics, RepAnalyzer, RepAnalyzerOrchestrator};
use crate::config::RepcamConfig;
use crate::error::Result;
use crate::events::{EventBus, RepcamEvent};
use crate::profile::ProfileRegistry;
use crate::ring_buffer::FrameRingBuffer;
use crate::session::SessionManager;
use crate::source::PoseSource;
use crate::storage::{WorkoutRecord, WorkoutStorage};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::signal;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Component lifecycle states
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// System shutdown reason
#[derive(Debug, Clone)]
pub enum ShutdownReason {
    Signal(String),
    Error(String),
    UserRequest,
    SourceExhausted,
}

/// Main application coordinator that wires all system components
///
/// Owns the event bus, ring buffer, pose source, analysis loop, session
/// manager, and workout storage, and drives their lifecycle:
/// initialize -> start -> run (until signal or source exhaustion) -> stop.
pub struct RepcamOrchestrator {
    config: RepcamConfig,
    event_bus: Arc<EventBus>,
    ring_buffer: Arc<FrameRingBuffer>,
    source: Arc<dyn PoseSource>,
    analyzer_orchestrator: RepAnalyzerOrchestrator,
    sessions: Arc<RwLock<SessionManager>>,
    storage: Arc<WorkoutStorage>,
    component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    cancellation_token: CancellationToken,
}

impl RepcamOrchestrator {
    /// Create an orchestrator that replays the given keypoint script
    pub fn from_script(config: RepcamConfig, script: Vec<Vec<crate::pose::Keypoint>>) -> Result<Self> {
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let source: Arc<dyn PoseSource> = Arc::new(crate::source::ScriptedPoseSource::new(
            config.source.clone(),
            script,
            Arc::clone(&event_bus),
        )?);
        Self::with_source(config, event_bus, source)
    }

    /// Create an orchestrator around an externally constructed pose source
    ///
    /// The source must publish on the same event bus it is given here.
    pub fn with_source(
        config: RepcamConfig,
        event_bus: Arc<EventBus>,
        source: Arc<dyn PoseSource>,
    ) -> Result<Self> {
        let ring_buffer = Arc::new(FrameRingBuffer::new(config.system.ring_buffer_capacity));

        let profiles = Arc::new(ProfileRegistry::with_builtins());
        let analyzer = Arc::new(RepAnalyzer::new(config.analyzer.clone(), profiles));

        let sessions = Arc::new(RwLock::new(SessionManager::new(
            config.session.clone(),
            Arc::clone(&event_bus),
        )));

        let analyzer_orchestrator = RepAnalyzerOrchestrator::new(
            analyzer,
            Arc::clone(&sessions),
            Arc::clone(&ring_buffer),
            Arc::clone(&event_bus),
        );

        let storage = Arc::new(WorkoutStorage::new(config.storage.clone()));

        Ok(Self {
            config,
            event_bus,
            ring_buffer,
            source,
            analyzer_orchestrator,
            sessions,
            storage,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Initialize all components without starting them
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing repcam components");

        self.set_component_state("storage", ComponentState::Starting)
            .await;
        self.storage.start().await?;

        if self.config.system.trim_old {
            let removed = self
                .storage
                .cleanup_old(self.config.system.retention_days)
                .await?;
            if removed > 0 {
                info!("Startup cleanup removed {} old workout records", removed);
            }
        }
        self.set_component_state("storage", ComponentState::Running)
            .await;

        self.set_component_state("pose_source", ComponentState::Stopped)
            .await;
        self.set_component_state("rep_analyzer", ComponentState::Stopped)
            .await;

        info!("Repcam components initialized");
        Ok(())
    }

    /// Start the pose source, analysis loop, and default session
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting repcam system");

        self.set_component_state("pose_source", ComponentState::Starting)
            .await;
        self.source.start(Arc::clone(&self.ring_buffer)).await?;
        self.set_component_state("pose_source", ComponentState::Running)
            .await;

        self.set_component_state("rep_analyzer", ComponentState::Starting)
            .await;
        self.analyzer_orchestrator.start().await?;
        self.set_component_state("rep_analyzer", ComponentState::Running)
            .await;

        {
            let mut sessions = self.sessions.write().await;
            sessions.start_default_session().await?;
        }

        info!("Repcam system started");
        Ok(())
    }

    /// Run until a shutdown signal arrives or the pose source is exhausted
    ///
    /// Returns the process exit code.
    pub async fn run(&mut self) -> Result<i32> {
        info!("Repcam system running");

        let mut source_poll = tokio::time::interval(Duration::from_millis(250));
        let reason;

        loop {
            tokio::select! {
                result = signal::ctrl_c() => {
                    match result {
                        Ok(()) => {
                            reason = ShutdownReason::Signal("SIGINT".to_string());
                        }
                        Err(e) => {
                            error!("Failed to listen for shutdown signal: {}", e);
                            reason = ShutdownReason::Error(e.to_string());
                        }
                    }
                    break;
                }
                _ = self.cancellation_token.cancelled() => {
                    reason = ShutdownReason::UserRequest;
                    break;
                }
                _ = source_poll.tick() => {
                    if !self.source.is_running() {
                        info!("Pose source finished, shutting down");
                        // Let the analysis loop drain the final frame
                        tokio::time::sleep(Duration::from_millis(300)).await;
                        reason = ShutdownReason::SourceExhausted;
                        break;
                    }
                }
            }
        }

        let _ = self
            .event_bus
            .publish(RepcamEvent::ShutdownRequested {
                timestamp: SystemTime::now(),
                reason: format!("{:?}", reason),
            })
            .await;

        self.stop().await?;

        let exit_code = match reason {
            ShutdownReason::Error(_) => 1,
            _ => 0,
        };
        Ok(exit_code)
    }

    /// Stop all components and log the active session if configured
    pub async fn stop(&mut self) -> Result<()> {
        info!("Stopping repcam system");

        self.set_component_state("pose_source", ComponentState::Stopping)
            .await;
        if let Err(e) = self.source.stop().await {
            error!("Error stopping pose source: {}", e);
            self.set_component_state("pose_source", ComponentState::Failed)
                .await;
        } else {
            self.set_component_state("pose_source", ComponentState::Stopped)
                .await;
        }

        self.set_component_state("rep_analyzer", ComponentState::Stopping)
            .await;
        if let Err(e) = self.analyzer_orchestrator.stop().await {
            error!("Error stopping rep analyzer: {}", e);
            self.set_component_state("rep_analyzer", ComponentState::Failed)
                .await;
        } else {
            self.set_component_state("rep_analyzer", ComponentState::Stopped)
                .await;
        }

        if self.config.session.log_on_shutdown {
            match self.log_active_workout().await {
                Ok(Some(record)) => {
                    info!("Logged final workout: {}", record.summary());
                }
                Ok(None) => {
                    debug!("No reps to log on shutdown");
                }
                Err(e) => {
                    warn!("Failed to log workout on shutdown: {}", e);
                }
            }
        }

        self.set_component_state("storage", ComponentState::Stopped)
            .await;

        info!("Repcam system stopped");
        Ok(())
    }

    /// Log the active session's reps to the history store
    ///
    /// This is the "log workout" action from session control: the record is
    /// appended under the fixed history key and the session's repetition
    /// state resets for the next set. Returns `None` when the session has
    /// no reps to log.
    pub async fn log_active_workout(&self) -> Result<Option<WorkoutRecord>> {
        let mut sessions = self.sessions.write().await;

        let Some(session) = sessions.active() else {
            debug!("No active session to log");
            return Ok(None);
        };

        if session.state.count == 0 {
            return Ok(None);
        }

        let record = sessions.log_workout().await?;
        drop(sessions);

        self.storage.append(record.clone()).await?;
        Ok(Some(record))
    }

    /// Request an orderly shutdown from outside the run loop
    pub fn request_shutdown(&self) {
        self.cancellation_token.cancel();
    }

    /// Get the state of a named component
    pub async fn component_state(&self, component: &str) -> Option<ComponentState> {
        self.component_states.lock().await.get(component).cloned()
    }

    async fn set_component_state(&self, component: &str, state: ComponentState) {
        debug!("Component '{}' -> {:?}", component, state);
        self.component_states
            .lock()
            .await
            .insert(component.to_string(), state);
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn sessions(&self) -> Arc<RwLock<SessionManager>> {
        Arc::clone(&self.sessions)
    }

    pub fn storage(&self) -> Arc<WorkoutStorage> {
        Arc::clone(&self.storage)
    }

    pub fn analysis_metrics(&self) -> RepAnalysisMetrics {
        self.analyzer_orchestrator.metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RepcamConfig, SourceConfig};
    use crate::profile::ProfileRegistry;
    use crate::source::demo_script;
    use tempfile::TempDir;

    fn test_config(storage_dir: &TempDir) -> RepcamConfig {
        let mut config = RepcamConfig::default();
        config.source = SourceConfig {
            fps: 100,
            loop_replay: false,
        };
        config.analyzer.fps = 200;
        config.storage.path = storage_dir.path().to_string_lossy().to_string();
        config
    }

    #[tokio::test]
    async fn test_pipeline_counts_and_logs_reps() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let registry = ProfileRegistry::with_builtins();
        let profile = registry.lookup("squats").profile;
        let script = demo_script(&profile, 2);

        let mut orchestrator = RepcamOrchestrator::from_script(config, script).unwrap();
        orchestrator.initialize().await.unwrap();
        orchestrator.start().await.unwrap();

        let exit_code = orchestrator.run().await.unwrap();
        assert_eq!(exit_code, 0);

        let records = orchestrator.storage().records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].exercise_id, "squats");
        assert_eq!(records[0].reps, 2);

        let metrics = orchestrator.analysis_metrics();
        assert_eq!(metrics.reps_counted, 2);
    }

    #[tokio::test]
    async fn test_initialize_without_start() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let registry = ProfileRegistry::with_builtins();
        let profile = registry.lookup("pushups").profile;

        let mut orchestrator =
            RepcamOrchestrator::from_script(config, demo_script(&profile, 1)).unwrap();
        orchestrator.initialize().await.unwrap();

        assert_eq!(
            orchestrator.component_state("storage").await,
            Some(ComponentState::Running)
        );
        assert_eq!(
            orchestrator.component_state("rep_analyzer").await,
            Some(ComponentState::Stopped)
        );
    }

    #[tokio::test]
    async fn test_log_active_workout_without_reps_is_noop() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let registry = ProfileRegistry::with_builtins();
        let profile = registry.lookup("squats").profile;

        let mut orchestrator =
            RepcamOrchestrator::from_script(config, demo_script(&profile, 1)).unwrap();
        orchestrator.initialize().await.unwrap();

        orchestrator
            .sessions()
            .write()
            .await
            .start_session("squats")
            .await
            .unwrap();

        let logged = orchestrator.log_active_workout().await.unwrap();
        assert!(logged.is_none());
        assert!(orchestrator.storage().records().await.is_empty());
    }
}
