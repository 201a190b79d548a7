//! Bidirectional trust synchronization
//!
//! Publish: trust store → ledger (trust scores).
//! Harvest: ledger → trust store (abuse reports).

pub mod harvester;
pub mod publisher;
pub mod scheduler;
pub mod stats;
pub mod types;
pub mod watermark;

pub use harvester::AbuseReportHarvester;
pub use publisher::TrustScorePublisher;
pub use scheduler::LoopSettings;
pub use scheduler::SyncJob;
pub use scheduler::SyncScheduler;
pub use stats::StatsSnapshot;
pub use stats::SyncStats;
pub use types::*;
pub use watermark::WatermarkTracker;
