//! Two-state hysteresis loop shared by every exercise kind
//!
//! The loop has exactly one counting edge: a rep completes on the
//! `Up -> Down` transition, never on `Down -> Up`. Signals between the two
//! thresholds leave the state untouched, which is what prevents rapid
//! re-triggering around a single threshold.

use serde::{Deserialize, Serialize};

/// Movement direction within a repetition cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    Up,
    #[default]
    Down,
}

/// Per-session repetition state
///
/// Owned by exactly one evaluation loop; mutated only through
/// [`RepetitionState::advance`] and reset when the session is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepetitionState {
    pub direction: Direction,
    pub count: u32,
}

impl RepetitionState {
    /// Fresh session state: direction down, zero reps
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one signal sample against the active thresholds
    ///
    /// Returns the successor state and whether a repetition completed on
    /// this exact sample. A non-finite signal compares false against both
    /// guards and therefore never transitions.
    #[must_use]
    pub fn advance(self, signal: f32, threshold_up: f32, threshold_down: f32) -> (Self, bool) {
        match self.direction {
            Direction::Down if signal > threshold_up => (
                Self {
                    direction: Direction::Up,
                    count: self.count,
                },
                false,
            ),
            Direction::Up if signal < threshold_down => (
                Self {
                    direction: Direction::Down,
                    count: self.count + 1,
                },
                true,
            ),
            _ => (self, false),
        }
    }
}
