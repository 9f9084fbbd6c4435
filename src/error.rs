use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepcamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl RepcamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Errors produced when constructing or validating keypoint frames
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid keypoint count: expected {expected}, got {actual}")]
    InvalidKeypointCount { expected: usize, actual: usize },
}

/// Errors produced by per-frame repetition analysis
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyzerError {
    #[error("non-finite coordinates for keypoint {joint}")]
    DegenerateGeometry { joint: usize },
}

/// Errors produced by the event bus
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    #[error("failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("event channel closed")]
    ChannelClosed,
}

/// Errors produced by session lifecycle management
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("no active workout session")]
    NoActiveSession,

    #[error("a session for '{exercise_id}' is already active")]
    SessionAlreadyActive { exercise_id: String },
}

/// Errors produced by workout history storage
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("workout history at {path} is corrupted: {details}")]
    HistoryCorrupted { path: String, details: String },

    #[error("failed to persist workout history: {details}")]
    PersistFailed { details: String },
}

pub type Result<T> = std::result::Result<T, RepcamError>;
