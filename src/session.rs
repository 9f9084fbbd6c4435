use crate::analyzer::state_machine::RepetitionState;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::events::{EventBus, RepcamEvent};
use crate::storage::WorkoutRecord;

use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};
use uuid::Uuid;

/// One active exercise session
///
/// Owns the only [`RepetitionState`] instance for its lifetime; the state
/// is mutated by the analysis loop and reset when the session is logged.
#[derive(Debug, Clone)]
pub struct WorkoutSession {
    pub id: String,
    pub exercise_id: String,
    pub state: RepetitionState,
    pub started_at: SystemTime,
    /// Set once the unknown-exercise fallback has been surfaced
    pub fallback_warned: bool,
}

/// Session lifecycle: start, per-frame state updates, log, end
pub struct SessionManager {
    config: SessionConfig,
    event_bus: Arc<EventBus>,
    active: Option<WorkoutSession>,
}

impl SessionManager {
    pub fn new(config: SessionConfig, event_bus: Arc<EventBus>) -> Self {
        Self {
            config,
            event_bus,
            active: None,
        }
    }

    /// Start a new session for the given exercise
    ///
    /// Fails if a session is already active; sessions must be logged or
    /// ended before the next one starts.
    pub async fn start_session(&mut self, exercise_id: &str) -> Result<String> {
        if let Some(session) = &self.active {
            return Err(SessionError::SessionAlreadyActive {
                exercise_id: session.exercise_id.clone(),
            }
            .into());
        }

        let session = WorkoutSession {
            id: Uuid::new_v4().to_string(),
            exercise_id: exercise_id.to_string(),
            state: RepetitionState::new(),
            started_at: SystemTime::now(),
            fallback_warned: false,
        };

        info!(
            "Started workout session {} for '{}'",
            session.id, session.exercise_id
        );

        let event = RepcamEvent::SessionStarted {
            session_id: session.id.clone(),
            exercise_id: session.exercise_id.clone(),
            timestamp: session.started_at,
        };

        let id = session.id.clone();
        self.active = Some(session);
        let _ = self.event_bus.publish(event).await;

        Ok(id)
    }

    /// Start a session for the configured default exercise
    pub async fn start_default_session(&mut self) -> Result<String> {
        let exercise_id = self.config.default_exercise.clone();
        self.start_session(&exercise_id).await
    }

    /// The currently active session, if any
    pub fn active(&self) -> Option<&WorkoutSession> {
        self.active.as_ref()
    }

    /// Replace the active session's repetition state
    pub fn update_state(&mut self, state: RepetitionState) -> Result<()> {
        let session = self.active.as_mut().ok_or(SessionError::NoActiveSession)?;
        session.state = state;
        Ok(())
    }

    /// Record that the unknown-exercise fallback was surfaced for this session
    pub fn mark_fallback_warned(&mut self) {
        if let Some(session) = self.active.as_mut() {
            session.fallback_warned = true;
        }
    }

    /// Log the active session's reps and reset its state for the next set
    ///
    /// The session stays active so the user can keep exercising; only the
    /// repetition state resets to direction-down, zero reps.
    pub async fn log_workout(&mut self) -> Result<WorkoutRecord> {
        let session = self.active.as_mut().ok_or(SessionError::NoActiveSession)?;

        let record = WorkoutRecord::new(session.exercise_id.clone(), session.state.count);
        let reps = session.state.count;
        session.state = RepetitionState::new();

        info!("Workout logged! Ready for next set.");

        let _ = self
            .event_bus
            .publish(RepcamEvent::SessionLogged {
                session_id: session.id.clone(),
                exercise_id: session.exercise_id.clone(),
                reps,
                timestamp: SystemTime::now(),
            })
            .await;

        Ok(record)
    }

    /// End the active session, returning it for inspection
    pub fn end_session(&mut self) -> Option<WorkoutSession> {
        let session = self.active.take();
        if let Some(ref session) = session {
            debug!("Ended workout session {}", session.id);
        }
        session
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::state_machine::Direction;

    fn manager() -> SessionManager {
        SessionManager::new(
            SessionConfig {
                default_exercise: "squats".to_string(),
                log_on_shutdown: true,
            },
            Arc::new(EventBus::new(16)),
        )
    }

    #[tokio::test]
    async fn test_start_session_initializes_state() {
        let mut manager = manager();
        manager.start_session("bicep-curls").await.unwrap();

        let session = manager.active().unwrap();
        assert_eq!(session.exercise_id, "bicep-curls");
        assert_eq!(session.state, RepetitionState::new());
        assert!(!session.fallback_warned);
    }

    #[tokio::test]
    async fn test_double_start_is_rejected() {
        let mut manager = manager();
        manager.start_session("squats").await.unwrap();

        let err = manager.start_session("pushups").await.unwrap_err();
        match err {
            crate::error::RepcamError::Session(SessionError::SessionAlreadyActive {
                exercise_id,
            }) => assert_eq!(exercise_id, "squats"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_log_workout_resets_state_and_keeps_session() {
        let mut manager = manager();
        manager.start_session("squats").await.unwrap();
        manager
            .update_state(RepetitionState {
                direction: Direction::Up,
                count: 7,
            })
            .unwrap();

        let record = manager.log_workout().await.unwrap();
        assert_eq!(record.exercise_id, "squats");
        assert_eq!(record.reps, 7);

        let session = manager.active().expect("session should stay active");
        assert_eq!(session.state, RepetitionState::new());
    }

    #[tokio::test]
    async fn test_log_without_session_fails() {
        let mut manager = manager();
        let err = manager.log_workout().await.unwrap_err();
        match err {
            crate::error::RepcamError::Session(SessionError::NoActiveSession) => {}
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_session_events_published() {
        let event_bus = Arc::new(EventBus::new(16));
        let mut receiver = event_bus.subscribe();
        let mut manager = SessionManager::new(
            SessionConfig {
                default_exercise: "situps".to_string(),
                log_on_shutdown: false,
            },
            Arc::clone(&event_bus),
        );

        manager.start_default_session().await.unwrap();
        manager.log_workout().await.unwrap();

        match receiver.recv().await.unwrap() {
            RepcamEvent::SessionStarted { exercise_id, .. } => {
                assert_eq!(exercise_id, "situps")
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match receiver.recv().await.unwrap() {
            RepcamEvent::SessionLogged { reps, .. } => assert_eq!(reps, 0),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_end_session() {
        let mut manager = manager();
        manager.start_session("squats").await.unwrap();
        assert!(manager.end_session().is_some());
        assert!(manager.active().is_none());
        assert!(manager.end_session().is_none());
    }
}
