/// Monitoring engine module - handles execution of monitoring checks
///
/// This module is responsible for:
/// - Picking the monitors that are due
/// - Probing their endpoints
/// - Recording check history and driving the incident lifecycle
pub mod history;
pub mod incidents;
pub mod prober;
pub mod scheduler;
pub mod selector;
pub mod types;

pub use history::HistoryRecorder;
pub use incidents::IncidentManager;
pub use prober::HttpProber;
pub use scheduler::{CycleSummary, Scheduler};
