pub mod engine;
pub mod orchestrator;
pub mod state_machine;

pub use engine::{FrameEvaluation, RepAnalyzer};
pub use orchestrator::{RepAnalysisMetrics, RepAnalyzerOrchestrator};
pub use state_machine::{Direction, RepetitionState};
