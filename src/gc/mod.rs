pub mod advisor;
pub mod detector;
pub mod pause;

pub use advisor::{AdvisorThresholds, Recommendation, Severity, TuningAdvisor};
pub use detector::{GcCounters, GcEventDetector};
pub use pause::{GcStatistics, PauseAnalyzer};
