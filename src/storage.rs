use crate::config::StorageConfig;
use crate::error::{Result, StorageError};

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Fixed key under which the ordered workout history is stored
pub const HISTORY_KEY: &str = "workouts";

/// One logged workout set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutRecord {
    pub exercise_id: String,
    pub reps: u32,
    pub timestamp: DateTime<Local>,
    pub date: NaiveDate,
}

impl WorkoutRecord {
    /// Create a record stamped with the current local time
    pub fn new<S: Into<String>>(exercise_id: S, reps: u32) -> Self {
        let now = Local::now();
        Self {
            exercise_id: exercise_id.into(),
            reps,
            timestamp: now,
            date: now.date_naive(),
        }
    }

    /// Exercise identifier rendered for display ("bicep-curls" -> "Bicep Curls")
    pub fn display_name(&self) -> String {
        format_exercise_name(&self.exercise_id)
    }

    /// History line for rendering, e.g. "2026-08-08 17:03:12 - Squats: 12 reps"
    pub fn summary(&self) -> String {
        format!(
            "{} - {}: {} reps",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.display_name(),
            self.reps
        )
    }
}

/// Render an exercise id for display by splitting on `-` and capitalizing
pub fn format_exercise_name(exercise_id: &str) -> String {
    exercise_id
        .split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Statistics about the workout history
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub total_workouts: usize,
    pub total_reps: u64,
    pub workouts_by_exercise: HashMap<String, usize>,
    pub oldest_workout: Option<DateTime<Local>>,
    pub newest_workout: Option<DateTime<Local>>,
}

/// Durable, append-ordered workout history store
///
/// Records live as a single JSON list under the fixed [`HISTORY_KEY`]
/// inside the configured storage path. Appends rewrite the file through a
/// temp-file rename so a crash mid-write never corrupts the history.
pub struct WorkoutStorage {
    config: StorageConfig,
    history: Arc<RwLock<Vec<WorkoutRecord>>>,
}

impl WorkoutStorage {
    /// Create a new workout storage backed by the configured path
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            history: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Path of the history file
    pub fn history_path(&self) -> PathBuf {
        PathBuf::from(&self.config.path).join(format!("{}.json", HISTORY_KEY))
    }

    /// Create the storage directory and load any existing history
    pub async fn start(&self) -> Result<()> {
        info!("Starting workout storage at {}", self.config.path);

        let base = PathBuf::from(&self.config.path);
        if !base.exists() {
            fs::create_dir_all(&base).await?;
            info!("Created workout storage directory: {}", base.display());
        }

        let path = self.history_path();
        if path.exists() {
            let contents = fs::read_to_string(&path).await?;
            let records: Vec<WorkoutRecord> =
                serde_json::from_str(&contents).map_err(|e| StorageError::HistoryCorrupted {
                    path: path.display().to_string(),
                    details: e.to_string(),
                })?;

            info!("Loaded {} workout records from history", records.len());
            *self.history.write().await = records;
        } else {
            debug!("No existing workout history at {}", path.display());
        }

        Ok(())
    }

    /// Append a record to the history and persist the updated list
    pub async fn append(&self, record: WorkoutRecord) -> Result<()> {
        debug!(
            "Appending workout record: {} x{}",
            record.exercise_id, record.reps
        );

        let mut history = self.history.write().await;
        history.push(record);
        self.persist(&history).await?;

        Ok(())
    }

    /// All records in append order
    pub async fn records(&self) -> Vec<WorkoutRecord> {
        self.history.read().await.clone()
    }

    /// Summary statistics over the stored history
    pub async fn stats(&self) -> StorageStats {
        let history = self.history.read().await;

        let mut workouts_by_exercise: HashMap<String, usize> = HashMap::new();
        for record in history.iter() {
            *workouts_by_exercise
                .entry(record.exercise_id.clone())
                .or_insert(0) += 1;
        }

        StorageStats {
            total_workouts: history.len(),
            total_reps: history.iter().map(|r| r.reps as u64).sum(),
            workouts_by_exercise,
            oldest_workout: history.iter().map(|r| r.timestamp).min(),
            newest_workout: history.iter().map(|r| r.timestamp).max(),
        }
    }

    /// Remove records older than the retention period
    ///
    /// Returns the number of records removed.
    pub async fn cleanup_old(&self, retention_days: u32) -> Result<usize> {
        let cutoff = Local::now() - ChronoDuration::days(retention_days as i64);

        let mut history = self.history.write().await;
        let before = history.len();
        history.retain(|record| record.timestamp >= cutoff);
        let removed = before - history.len();

        if removed > 0 {
            warn!(
                "Removed {} workout records older than {} days",
                removed, retention_days
            );
            self.persist(&history).await?;
        }

        Ok(removed)
    }

    async fn persist(&self, history: &[WorkoutRecord]) -> Result<()> {
        let path = self.history_path();
        let tmp_path = path.with_extension("json.tmp");

        let payload = serde_json::to_string_pretty(history)?;
        fs::write(&tmp_path, payload)
            .await
            .map_err(|e| StorageError::PersistFailed {
                details: format!("write {}: {}", tmp_path.display(), e),
            })?;
        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| StorageError::PersistFailed {
                details: format!("rename to {}: {}", path.display(), e),
            })?;

        debug!("Persisted {} workout records", history.len());
        Ok(())
    }
}
