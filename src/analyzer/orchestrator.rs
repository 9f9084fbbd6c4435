use crate::analyzer::engine::RepAnalyzer;
use crate::error::Result;
use crate::events::{EventBus, RepcamEvent};
use crate::ring_buffer::FrameRingBuffer;
use crate::session::SessionManager;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Metrics about the repetition analysis loop
#[derive(Debug, Clone, Default)]
pub struct RepAnalysisMetrics {
    pub frames_analyzed: u64,
    pub reps_counted: u64,
}

/// Connects the rep analyzer to the ring buffer, session state, and events
///
/// Pull-based: the loop polls the ring buffer for the latest frame at the
/// configured analysis rate and evaluates it synchronously against the
/// active session. Frames are never queued; a slow analysis cycle simply
/// skips to the newest frame.
pub struct RepAnalyzerOrchestrator {
    analyzer: Arc<RepAnalyzer>,
    sessions: Arc<RwLock<SessionManager>>,
    ring_buffer: Arc<FrameRingBuffer>,
    event_bus: Arc<EventBus>,
    analysis_task: Option<JoinHandle<()>>,
    is_running: Arc<RwLock<bool>>,
    frames_analyzed: Arc<AtomicU64>,
    reps_counted: Arc<AtomicU64>,
}

impl RepAnalyzerOrchestrator {
    /// Create a new analysis orchestrator
    pub fn new(
        analyzer: Arc<RepAnalyzer>,
        sessions: Arc<RwLock<SessionManager>>,
        ring_buffer: Arc<FrameRingBuffer>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        info!("Creating rep analyzer orchestrator");

        Self {
            analyzer,
            sessions,
            ring_buffer,
            event_bus,
            analysis_task: None,
            is_running: Arc::new(RwLock::new(false)),
            frames_analyzed: Arc::new(AtomicU64::new(0)),
            reps_counted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start the analysis loop
    pub async fn start(&mut self) -> Result<()> {
        let mut is_running = self.is_running.write().await;
        if *is_running {
            warn!("Rep analyzer orchestrator is already running");
            return Ok(());
        }

        info!("Starting rep analyzer orchestrator");

        let analyzer = Arc::clone(&self.analyzer);
        let sessions = Arc::clone(&self.sessions);
        let ring_buffer = Arc::clone(&self.ring_buffer);
        let event_bus = Arc::clone(&self.event_bus);
        let is_running_clone = Arc::clone(&self.is_running);
        let frames_analyzed = Arc::clone(&self.frames_analyzed);
        let reps_counted = Arc::clone(&self.reps_counted);

        let analysis_task = tokio::spawn(async move {
            info!("Rep analysis task started");

            let frame_interval =
                Duration::from_millis(1000 / analyzer.config().fps.max(1) as u64);
            let mut last_analysis_time = tokio::time::Instant::now() - frame_interval;
            let mut last_frame_id: Option<u64> = None;

            loop {
                {
                    let running = is_running_clone.read().await;
                    if !*running {
                        info!("Rep analysis task stopping");
                        break;
                    }
                }

                if last_analysis_time.elapsed() >= frame_interval {
                    if let Some(frame) = ring_buffer.latest_frame().await {
                        if let Some(last_id) = last_frame_id {
                            if frame.id < last_id {
                                warn!(
                                    "Detected frame ID reset ({} -> {}), resetting analysis cursor",
                                    last_id, frame.id
                                );
                                last_frame_id = None;
                            }
                        }

                        if last_frame_id.map_or(true, |last_id| frame.id > last_id) {
                            last_frame_id = Some(frame.id);
                            last_analysis_time = tokio::time::Instant::now();

                            trace!(
                                "Analyzing frame {} (age {}ms)",
                                frame.id,
                                frame.age_ms()
                            );

                            let mut sessions_guard = sessions.write().await;
                            let Some(session) = sessions_guard.active() else {
                                debug!("No active session, skipping frame {}", frame.id);
                                continue;
                            };

                            let exercise_id = session.exercise_id.clone();
                            let prior_state = session.state;
                            let fallback_warned = session.fallback_warned;

                            match analyzer.evaluate_frame(&frame, &exercise_id, prior_state) {
                                Ok(eval) => {
                                    frames_analyzed.fetch_add(1, Ordering::Relaxed);

                                    if eval.used_default_profile && !fallback_warned {
                                        sessions_guard.mark_fallback_warned();
                                        let _ = event_bus
                                            .publish(RepcamEvent::UnknownExercise {
                                                exercise_id: exercise_id.clone(),
                                                timestamp: frame.timestamp,
                                            })
                                            .await;
                                    }

                                    if let Err(e) = sessions_guard.update_state(eval.state) {
                                        error!("Failed to update session state: {}", e);
                                        continue;
                                    }
                                    drop(sessions_guard);

                                    if eval.rep_completed {
                                        reps_counted.fetch_add(1, Ordering::Relaxed);
                                        let _ = event_bus
                                            .publish(RepcamEvent::RepCounted {
                                                exercise_id,
                                                count: eval.state.count,
                                                signal: eval.signal,
                                                timestamp: frame.timestamp,
                                            })
                                            .await;
                                    } else if eval.state.direction != prior_state.direction {
                                        let _ = event_bus
                                            .publish(RepcamEvent::DirectionChanged {
                                                exercise_id,
                                                direction: eval.state.direction,
                                                signal: eval.signal,
                                                timestamp: frame.timestamp,
                                            })
                                            .await;
                                    }
                                }
                                Err(e) => {
                                    drop(sessions_guard);
                                    error!(
                                        "Rep analysis error for frame {}: {}",
                                        frame.id, e
                                    );

                                    let _ = event_bus
                                        .publish(RepcamEvent::SystemError {
                                            component: "rep_analyzer_orchestrator".to_string(),
                                            error: e.to_string(),
                                        })
                                        .await;
                                }
                            }
                        } else {
                            trace!("Frame {} already analyzed, skipping", frame.id);
                        }
                    } else {
                        trace!("No frames available for rep analysis");
                    }
                }

                tokio::time::sleep(Duration::from_millis(2)).await;
            }

            info!("Rep analysis task ended");
        });

        self.analysis_task = Some(analysis_task);
        *is_running = true;

        Ok(())
    }

    /// Stop the analysis loop
    pub async fn stop(&mut self) -> Result<()> {
        let mut is_running = self.is_running.write().await;
        if !*is_running {
            warn!("Rep analyzer orchestrator is not running");
            return Ok(());
        }

        info!("Stopping rep analyzer orchestrator");
        *is_running = false;
        drop(is_running);

        if let Some(task) = self.analysis_task.take() {
            if let Err(e) = task.await {
                error!("Error stopping rep analysis task: {}", e);
            }
        }

        info!("Rep analyzer orchestrator stopped");
        Ok(())
    }

    /// Get the underlying analyzer
    pub fn analyzer(&self) -> Arc<RepAnalyzer> {
        Arc::clone(&self.analyzer)
    }

    /// Get metrics about the analysis loop
    pub fn metrics(&self) -> RepAnalysisMetrics {
        RepAnalysisMetrics {
            frames_analyzed: self.frames_analyzed.load(Ordering::Relaxed),
            reps_counted: self.reps_counted.load(Ordering::Relaxed),
        }
    }
}
