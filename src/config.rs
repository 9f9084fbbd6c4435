use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RepcamConfig {
    pub source: SourceConfig,
    pub analyzer: AnalyzerConfig,
    pub session: SessionConfig,
    pub storage: StorageConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceConfig {
    /// Frames per second delivered by the pose source
    #[serde(default = "default_source_fps")]
    pub fps: u32,

    /// Restart a scripted replay from the beginning when it ends
    #[serde(default = "default_loop_replay")]
    pub loop_replay: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AnalyzerConfig {
    /// Maximum FPS for repetition analysis
    #[serde(default = "default_analyzer_fps")]
    pub fps: u32,

    /// Confidence threshold below which a keypoint is considered unusable
    #[serde(default = "default_min_keypoint_score")]
    pub min_keypoint_score: f32,

    /// Skip counting transitions on frames where a required joint falls
    /// below the confidence threshold (off by default, matching the
    /// behavior of counting from unfiltered joints)
    #[serde(default = "default_require_confident_joints")]
    pub require_confident_joints: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fps: default_analyzer_fps(),
            min_keypoint_score: default_min_keypoint_score(),
            require_confident_joints: default_require_confident_joints(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    /// Exercise selected when none is supplied by session control
    #[serde(default = "default_exercise")]
    pub default_exercise: String,

    /// Log the active session's reps to the history store on shutdown
    #[serde(default = "default_log_on_shutdown")]
    pub log_on_shutdown: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Base path for the workout history store
    #[serde(default = "default_storage_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Enable automatic cleanup of old workout records
    #[serde(default = "default_trim_old")]
    pub trim_old: bool,

    /// Retention period in days for workout records
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Ring buffer capacity (number of frames)
    #[serde(default = "default_ring_buffer_capacity")]
    pub ring_buffer_capacity: usize,

    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl RepcamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("repcam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("source.fps", default_source_fps())?
            .set_default("source.loop_replay", default_loop_replay())?
            .set_default("analyzer.fps", default_analyzer_fps())?
            .set_default(
                "analyzer.min_keypoint_score",
                default_min_keypoint_score() as f64,
            )?
            .set_default(
                "analyzer.require_confident_joints",
                default_require_confident_joints(),
            )?
            .set_default("session.default_exercise", default_exercise())?
            .set_default("session.log_on_shutdown", default_log_on_shutdown())?
            .set_default("storage.path", default_storage_path())?
            .set_default("system.trim_old", default_trim_old())?
            .set_default("system.retention_days", default_retention_days())?
            .set_default(
                "system.ring_buffer_capacity",
                default_ring_buffer_capacity() as i64,
            )?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with REPCAM_ prefix
            .add_source(Environment::with_prefix("REPCAM").separator("_"))
            .build()?;

        let config: RepcamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Render the configuration as TOML, e.g. for `--print-config`
    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.fps == 0 {
            return Err(ConfigError::Message(
                "Source fps must be greater than 0".to_string(),
            ));
        }

        if self.analyzer.fps == 0 {
            return Err(ConfigError::Message(
                "Analyzer fps must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.analyzer.min_keypoint_score) {
            return Err(ConfigError::Message(
                "Analyzer min_keypoint_score must be within [0, 1]".to_string(),
            ));
        }

        if self.session.default_exercise.is_empty() {
            return Err(ConfigError::Message(
                "Session default_exercise must not be empty".to_string(),
            ));
        }

        if self.system.trim_old && self.system.retention_days == 0 {
            return Err(ConfigError::Message(
                "Retention days must be greater than 0 when trim_old is enabled".to_string(),
            ));
        }

        if self.system.ring_buffer_capacity == 0 {
            return Err(ConfigError::Message(
                "Ring buffer capacity must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for RepcamConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig {
                fps: default_source_fps(),
                loop_replay: default_loop_replay(),
            },
            analyzer: AnalyzerConfig::default(),
            session: SessionConfig {
                default_exercise: default_exercise(),
                log_on_shutdown: default_log_on_shutdown(),
            },
            storage: StorageConfig {
                path: default_storage_path(),
            },
            system: SystemConfig {
                trim_old: default_trim_old(),
                retention_days: default_retention_days(),
                ring_buffer_capacity: default_ring_buffer_capacity(),
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_source_fps() -> u32 {
    30
}
fn default_loop_replay() -> bool {
    false
}

fn default_analyzer_fps() -> u32 {
    15
}
fn default_min_keypoint_score() -> f32 {
    0.3
}
fn default_require_confident_joints() -> bool {
    false
}

fn default_exercise() -> String {
    "squats".to_string()
}
fn default_log_on_shutdown() -> bool {
    true
}

fn default_storage_path() -> String {
    "./workouts".to_string()
}

fn default_trim_old() -> bool {
    false
}
fn default_retention_days() -> u32 {
    365
}
fn default_ring_buffer_capacity() -> usize {
    120
}
fn default_event_bus_capacity() -> usize {
    100
}
