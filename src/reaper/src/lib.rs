//! fleetd reaper
//!
//! Reconciliation and resource-reclamation loop for the app fleet. Detects
//! drift between the persistent app ledger and the orchestrator's live
//! inventory, then removes stale ledger records inside one transaction so
//! their exclusive resources (unit id, hostname, ports) become reusable.

pub mod config;
pub mod detector;
pub mod orchestrator;
pub mod reclaimer;
pub mod stats;

// Re-export commonly used types
pub use config::{CleanupConfig, ERROR_RETENTION_FLOOR, INTERVAL_FLOOR};
pub use detector::{detect, DriftReport};
pub use orchestrator::{CleanupOrchestrator, CycleReport, TriggerOutcome};
pub use reclaimer::{ReclaimError, ReclaimOutcome, Reclaimer};
pub use stats::{CleanupStats, CleanupStatsReport, MAX_RECENT_ERRORS};
