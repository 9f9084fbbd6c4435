use crate::analyzer::state_machine::Direction;
use crate::error::EventBusError;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events that can occur in the repcam system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RepcamEvent {
    /// A new keypoint frame is ready in the ring buffer
    FrameReady {
        frame_id: u64,
        timestamp: SystemTime,
    },
    /// The active session changed movement direction without completing a rep
    DirectionChanged {
        exercise_id: String,
        direction: Direction,
        signal: f32,
        timestamp: SystemTime,
    },
    /// A repetition completed on this frame
    RepCounted {
        exercise_id: String,
        count: u32,
        signal: f32,
        timestamp: SystemTime,
    },
    /// An unrecognized exercise id fell back to the default profile
    UnknownExercise {
        exercise_id: String,
        timestamp: SystemTime,
    },
    /// A workout session started
    SessionStarted {
        session_id: String,
        exercise_id: String,
        timestamp: SystemTime,
    },
    /// A workout session was logged to the history store
    SessionLogged {
        session_id: String,
        exercise_id: String,
        reps: u32,
        timestamp: SystemTime,
    },
    /// Pose source connection status changed
    SourceStatusChanged {
        connected: bool,
        timestamp: SystemTime,
    },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
    /// System shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl RepcamEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> SystemTime {
        match self {
            RepcamEvent::FrameReady { timestamp, .. } => *timestamp,
            RepcamEvent::DirectionChanged { timestamp, .. } => *timestamp,
            RepcamEvent::RepCounted { timestamp, .. } => *timestamp,
            RepcamEvent::UnknownExercise { timestamp, .. } => *timestamp,
            RepcamEvent::SessionStarted { timestamp, .. } => *timestamp,
            RepcamEvent::SessionLogged { timestamp, .. } => *timestamp,
            RepcamEvent::SourceStatusChanged { timestamp, .. } => *timestamp,
            RepcamEvent::SystemError { .. } => SystemTime::now(),
            RepcamEvent::ShutdownRequested { timestamp, .. } => *timestamp,
        }
    }

    /// Get a human-readable description of the event
    ///
    /// For `RepCounted` this is the feedback line shown to the user.
    pub fn description(&self) -> String {
        match self {
            RepcamEvent::FrameReady { frame_id, .. } => {
                format!("Frame {} ready", frame_id)
            }
            RepcamEvent::DirectionChanged {
                exercise_id,
                direction,
                signal,
                ..
            } => {
                format!(
                    "{}: moving {:?} (signal {:.2})",
                    exercise_id, direction, signal
                )
            }
            RepcamEvent::RepCounted { count, .. } => {
                format!("Rep counted! Total: {}", count)
            }
            RepcamEvent::UnknownExercise { exercise_id, .. } => {
                format!(
                    "Unknown exercise '{}', using default profile",
                    exercise_id
                )
            }
            RepcamEvent::SessionStarted { exercise_id, .. } => {
                format!("Session started: {}", exercise_id)
            }
            RepcamEvent::SessionLogged {
                exercise_id, reps, ..
            } => {
                format!("Session logged: {} ({} reps)", exercise_id, reps)
            }
            RepcamEvent::SourceStatusChanged { connected, .. } => {
                format!(
                    "Pose source {}",
                    if *connected {
                        "connected"
                    } else {
                        "disconnected"
                    }
                )
            }
            RepcamEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            RepcamEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            RepcamEvent::FrameReady { .. } => "frame_ready",
            RepcamEvent::DirectionChanged { .. } => "direction_changed",
            RepcamEvent::RepCounted { .. } => "rep_counted",
            RepcamEvent::UnknownExercise { .. } => "unknown_exercise",
            RepcamEvent::SessionStarted { .. } => "session_started",
            RepcamEvent::SessionLogged { .. } => "session_logged",
            RepcamEvent::SourceStatusChanged { .. } => "source_status_changed",
            RepcamEvent::SystemError { .. } => "system_error",
            RepcamEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Async event bus for component coordination using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<RepcamEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<RepcamEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub async fn publish(&self, event: RepcamEvent) -> Result<usize, EventBusError> {
        if self.debug_logging {
            debug!("Publishing event: {}", event.description());
        }

        match &event {
            RepcamEvent::RepCounted { count, signal, .. } => {
                info!("Rep counted! Total: {} (signal {:.2})", count, signal);
            }
            RepcamEvent::UnknownExercise { exercise_id, .. } => {
                warn!(
                    "Unknown exercise '{}', falling back to default profile",
                    exercise_id
                );
            }
            RepcamEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            RepcamEvent::SourceStatusChanged { connected, .. } => {
                if *connected {
                    info!("Pose source connected");
                } else {
                    warn!("Pose source disconnected");
                }
            }
            RepcamEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => {
                if self.debug_logging {
                    debug!("Event: {}", event.description());
                }
            }
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            debug_logging: self.debug_logging,
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Custom filter function
    Custom(fn(&RepcamEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &RepcamEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<RepcamEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(
        receiver: broadcast::Receiver<RepcamEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<RepcamEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::PublishFailed {
                        details: format!("Receiver lagged behind by {} events", n),
                    });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<RepcamEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => {
                    return Ok(None);
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::PublishFailed {
                        details: format!("Receiver lagged behind by {} events", n),
                    });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let event = RepcamEvent::RepCounted {
            exercise_id: "squats".to_string(),
            count: 4,
            signal: 62.5,
            timestamp: SystemTime::now(),
        };

        let subscriber_count = event_bus.publish(event).await.unwrap();
        assert_eq!(subscriber_count, 1);

        let received = receiver.recv().await.unwrap();
        match received {
            RepcamEvent::RepCounted { count, .. } => assert_eq!(count, 4),
            _ => panic!("Unexpected event type"),
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus
            .publish(RepcamEvent::FrameReady {
                frame_id: 1,
                timestamp: SystemTime::now(),
            })
            .await
            .unwrap();

        let _ = timeout(Duration::from_millis(100), receiver1.recv())
            .await
            .unwrap()
            .unwrap();
        let _ = timeout(Duration::from_millis(100), receiver2.recv())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_event_filter() {
        let filter = EventFilter::EventTypes(vec!["rep_counted", "session_logged"]);

        let rep_event = RepcamEvent::RepCounted {
            exercise_id: "pushups".to_string(),
            count: 1,
            signal: -25.0,
            timestamp: SystemTime::now(),
        };

        let frame_event = RepcamEvent::FrameReady {
            frame_id: 1,
            timestamp: SystemTime::now(),
        };

        assert!(filter.matches(&rep_event));
        assert!(!filter.matches(&frame_event));
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let receiver = event_bus.subscribe();
        let filter = EventFilter::EventTypes(vec!["rep_counted"]);
        let mut filtered_receiver = EventReceiver::new(receiver, filter, "test".to_string());

        event_bus
            .publish(RepcamEvent::FrameReady {
                frame_id: 1,
                timestamp: SystemTime::now(),
            })
            .await
            .unwrap();

        event_bus
            .publish(RepcamEvent::RepCounted {
                exercise_id: "squats".to_string(),
                count: 2,
                signal: 61.0,
                timestamp: SystemTime::now(),
            })
            .await
            .unwrap();

        let received = timeout(Duration::from_millis(100), filtered_receiver.recv())
            .await
            .unwrap()
            .unwrap();
        match received {
            RepcamEvent::RepCounted { count, .. } => assert_eq!(count, 2),
            _ => panic!("Unexpected event type"),
        }
    }

    #[test]
    fn test_rep_counted_feedback_line() {
        let event = RepcamEvent::RepCounted {
            exercise_id: "bicep-curls".to_string(),
            count: 7,
            signal: 25.0,
            timestamp: SystemTime::now(),
        };

        assert_eq!(event.event_type(), "rep_counted");
        assert_eq!(event.description(), "Rep counted! Total: 7");
    }

    #[test]
    fn test_unknown_exercise_event_is_observable() {
        let event = RepcamEvent::UnknownExercise {
            exercise_id: "jumping-jacks".to_string(),
            timestamp: SystemTime::now(),
        };

        assert_eq!(event.event_type(), "unknown_exercise");
        assert!(event.description().contains("jumping-jacks"));
    }
}
