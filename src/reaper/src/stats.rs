//! Process-lifetime cleanup statistics.
//!
//! Owned by the orchestrator (one explicitly constructed instance, guarded
//! by its lock), mutated only after each cycle and read by the stats
//! endpoint. Not persisted: counters reset to zero on restart, the ledger
//! stays the only durable store.

use crate::config::CleanupConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Bound on the recent-error list; the oldest entry is evicted first.
pub const MAX_RECENT_ERRORS: usize = 10;

/// Terminal state of the most recent cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LastOutcome {
    /// Cycle ran to completion (possibly removing nothing).
    Completed,
    /// Inventory was unavailable; zero mutation.
    Aborted,
    /// Delete transaction failed; zero mutation.
    Failed,
}

/// Cumulative statistics for the reconciliation loop.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupStats {
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<LastOutcome>,
    /// True when the last completed cycle was a dry-run projection.
    pub last_run_simulated: bool,
    pub cycles_completed: u64,
    pub cycles_skipped: u64,
    pub ghosts_removed: u64,
    pub stale_errors_removed: u64,
    pub apps_removed: u64,
    pub resources_freed: u64,
    /// Most recent cycle errors, newest last, bounded.
    pub recent_errors: VecDeque<String>,
    /// Informational notes from configuration clamping.
    pub config_notes: Vec<String>,
}

impl CleanupStats {
    /// Record a completed cycle. Real (non-simulated) completions clear the
    /// error list; counts accumulate either way, flagged via
    /// `last_run_simulated`.
    pub fn record_completed(
        &mut self,
        now: DateTime<Utc>,
        ghosts: u64,
        stale_only: u64,
        removed: u64,
        resources_freed: u64,
        simulated: bool,
    ) {
        self.last_run_at = Some(now);
        self.last_outcome = Some(LastOutcome::Completed);
        self.last_run_simulated = simulated;
        self.cycles_completed += 1;
        self.ghosts_removed += ghosts;
        self.stale_errors_removed += stale_only;
        self.apps_removed += removed;
        self.resources_freed += resources_freed;
        if !simulated {
            self.recent_errors.clear();
        }
    }

    /// Record an aborted cycle (inventory unavailable). Counts unchanged.
    pub fn record_aborted(&mut self, now: DateTime<Utc>, error: String) {
        self.last_run_at = Some(now);
        self.last_outcome = Some(LastOutcome::Aborted);
        self.push_error(error);
    }

    /// Record a failed cycle (transaction failure). Counts unchanged.
    pub fn record_failed(&mut self, now: DateTime<Utc>, error: String) {
        self.last_run_at = Some(now);
        self.last_outcome = Some(LastOutcome::Failed);
        self.push_error(error);
    }

    /// Record a trigger rejected because a cycle was already in flight.
    pub fn record_skipped(&mut self) {
        self.cycles_skipped += 1;
    }

    fn push_error(&mut self, error: String) {
        if self.recent_errors.len() == MAX_RECENT_ERRORS {
            self.recent_errors.pop_front();
        }
        self.recent_errors.push_back(error);
    }
}

/// Stats plus the effective configuration, as served by the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupStatsReport {
    pub enabled: bool,
    #[serde(flatten)]
    pub stats: CleanupStats,
    /// Effective (post-clamping) configuration.
    pub config: CleanupConfig,
}
