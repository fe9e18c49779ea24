//! Reconciliation cycle orchestration.
//!
//! One orchestrator instance owns the scheduling loop, the single-flight
//! guard, the statistics and the stats/trigger contract. Scheduled ticks and
//! manual triggers funnel through the same entry point; at most one cycle
//! runs at a time and a cycle always reaches a terminal state (completed,
//! aborted or failed) before the guard is released.
//!
//! ## Safety Guarantees
//!
//! - An unavailable inventory aborts the cycle with zero mutation; it is
//!   never treated as an empty inventory.
//! - Deletion is all-or-nothing per cycle via the reclaimer's transaction.
//! - Both external calls (inventory query, delete transaction) run under a
//!   bounded timeout; a timeout counts as unavailability/failure.
//! - Cycle failures are recorded in stats and never propagate to the host.

use crate::config::CleanupConfig;
use crate::detector::{self, DriftReport};
use crate::reclaimer::{Reclaimer, ReclaimOutcome};
use crate::stats::{CleanupStats, CleanupStatsReport};
use chrono::Utc;
use common::inventory::InventoryGateway;
use common::ledger::Ledger;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Terminal report of one reconciliation cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CycleReport {
    /// The cycle ran to completion; counts are projections when `simulated`.
    Completed {
        simulated: bool,
        ghosts: u64,
        stale_errors: u64,
        removed: u64,
        resources_freed: u64,
    },
    /// Inventory unavailable; nothing was deleted.
    Aborted { error: String },
    /// Delete transaction failed; nothing was deleted.
    Failed { error: String },
}

/// Outcome of a trigger request (scheduled tick or manual).
#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    Ran { report: CycleReport },
    SkippedInProgress,
    Disabled,
}

impl TriggerOutcome {
    /// Stable wire label for the trigger endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerOutcome::Ran { .. } => "ran",
            TriggerOutcome::SkippedInProgress => "skipped:in-progress",
            TriggerOutcome::Disabled => "disabled",
        }
    }
}

/// Owns the reconciliation loop state: effective config, stats and the
/// single-flight guard.
pub struct CleanupOrchestrator {
    ledger: Ledger,
    gateway: Arc<dyn InventoryGateway>,
    reclaimer: Reclaimer,
    config: CleanupConfig,
    stats: std::sync::Mutex<CleanupStats>,
    // Held for the full duration of one cycle; try_lock failure means a
    // cycle is in flight and the request is rejected, never queued.
    cycle_guard: tokio::sync::Mutex<()>,
}

impl CleanupOrchestrator {
    /// Build an orchestrator from the raw operator configuration.
    ///
    /// Out-of-bounds values are clamped to their floors here; each clamp is
    /// logged at WARN and kept as an informational note in stats.
    pub fn new(
        ledger: Ledger,
        gateway: Arc<dyn InventoryGateway>,
        raw: common::config::CleanupConfig,
    ) -> Self {
        let (config, notes) = CleanupConfig::from(raw).normalize();
        for note in &notes {
            warn!(note = %note, "Cleanup configuration clamped");
        }

        let stats = CleanupStats {
            config_notes: notes,
            ..CleanupStats::default()
        };

        Self {
            reclaimer: Reclaimer::new(ledger.clone()),
            ledger,
            gateway,
            config,
            stats: std::sync::Mutex::new(stats),
            cycle_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Effective (post-clamping) configuration.
    pub fn config(&self) -> &CleanupConfig {
        &self.config
    }

    /// Request one reconciliation cycle.
    ///
    /// The single entry point for both the interval ticker and the manual
    /// trigger endpoint. Returns `Disabled` without any state transition
    /// when the loop is switched off, `SkippedInProgress` when another cycle
    /// holds the guard, and `Ran` with the cycle's terminal report otherwise.
    pub async fn trigger(&self) -> TriggerOutcome {
        if !self.config.enabled {
            info!("Cleanup trigger ignored: reconciliation is disabled");
            return TriggerOutcome::Disabled;
        }

        let Ok(_guard) = self.cycle_guard.try_lock() else {
            info!("Cleanup trigger skipped: a cycle is already in progress");
            self.stats_mut().record_skipped();
            return TriggerOutcome::SkippedInProgress;
        };

        let report = self.run_cycle().await;
        TriggerOutcome::Ran { report }
    }

    /// Run one cycle to a terminal state. Caller holds the cycle guard.
    async fn run_cycle(&self) -> CycleReport {
        info!(dry_run = self.config.dry_run, "Starting reconciliation cycle");

        // Inventory snapshot first, under a bounded timeout. On any failure
        // the cycle aborts conservatively; guessing at the inventory would
        // make every live record look like a ghost.
        let inventory = match tokio::time::timeout(
            self.config.query_timeout,
            self.gateway.list_existing_unit_ids(),
        )
        .await
        {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => return self.abort_cycle(e.to_string()),
            Err(_) => {
                return self.abort_cycle(format!(
                    "inventory query timed out after {:?}",
                    self.config.query_timeout
                ));
            }
        };

        // The ledger snapshot is taken after the inventory snapshot; the
        // grace period absorbs the race window between the two.
        let records = match self.ledger.list_apps().await {
            Ok(records) => records,
            Err(e) => return self.fail_cycle(format!("failed to load ledger snapshot: {e}")),
        };

        let now = Utc::now();
        let report = detector::detect(&records, &inventory, now, &self.config);

        info!(
            ledger_records = records.len(),
            inventory_units = inventory.len(),
            ghosts = report.ghosts.len(),
            stale_errors = report.stale.len(),
            "Drift detection complete"
        );

        self.log_candidates(&report);

        let deletion_set = report.deletion_set();
        let ghosts = report.ghosts.len() as u64;
        let stale_only = report.stale_only_count() as u64;

        let outcome = match tokio::time::timeout(
            self.config.query_timeout,
            self.reclaimer.apply(&deletion_set, self.config.dry_run),
        )
        .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => return self.fail_cycle(e.to_string()),
            Err(_) => {
                return self.fail_cycle(format!(
                    "delete transaction timed out after {:?}",
                    self.config.query_timeout
                ));
            }
        };

        self.complete_cycle(ghosts, stale_only, outcome)
    }

    fn log_candidates(&self, report: &DriftReport) {
        let tag = if self.config.dry_run { "[DRY-RUN] " } else { "" };
        for record in &report.ghosts {
            info!(
                app_id = %record.id,
                unit_id = %record.unit_id,
                hostname = %record.hostname,
                status = %record.status,
                "{tag}Ghost record eligible for removal"
            );
        }
        for record in &report.stale {
            info!(
                app_id = %record.id,
                unit_id = %record.unit_id,
                updated_at = %record.updated_at,
                "{tag}Stale error record eligible for removal"
            );
        }
    }

    fn complete_cycle(&self, ghosts: u64, stale_only: u64, outcome: ReclaimOutcome) -> CycleReport {
        self.stats_mut().record_completed(
            Utc::now(),
            ghosts,
            stale_only,
            outcome.removed,
            outcome.resources_freed,
            outcome.simulated,
        );

        info!(
            simulated = outcome.simulated,
            removed = outcome.removed,
            resources_freed = outcome.resources_freed,
            "Reconciliation cycle completed"
        );

        CycleReport::Completed {
            simulated: outcome.simulated,
            ghosts,
            stale_errors: stale_only,
            removed: outcome.removed,
            resources_freed: outcome.resources_freed,
        }
    }

    fn abort_cycle(&self, error: String) -> CycleReport {
        warn!(error = %error, "Reconciliation cycle aborted: inventory unavailable");
        self.stats_mut().record_aborted(Utc::now(), error.clone());
        CycleReport::Aborted { error }
    }

    fn fail_cycle(&self, error: String) -> CycleReport {
        warn!(error = %error, "Reconciliation cycle failed: no deletions applied");
        self.stats_mut().record_failed(Utc::now(), error.clone());
        CycleReport::Failed { error }
    }

    /// Snapshot of the stats plus the effective configuration.
    pub fn stats_snapshot(&self) -> CleanupStatsReport {
        CleanupStatsReport {
            enabled: self.config.enabled,
            stats: self.stats_mut().clone(),
            config: self.config.clone(),
        }
    }

    fn stats_mut(&self) -> std::sync::MutexGuard<'_, CleanupStats> {
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Spawn the recurring scheduler that drives automatic cycles.
    ///
    /// Each tick goes through [`Self::trigger`], so a tick that lands while
    /// a manual cycle is still running is skipped, not queued.
    pub fn spawn_scheduler(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(orchestrator.config.interval);
            loop {
                ticker.tick().await;
                match orchestrator.trigger().await {
                    TriggerOutcome::Ran { report } => {
                        tracing::debug!(?report, "Scheduled reconciliation cycle finished");
                    }
                    TriggerOutcome::SkippedInProgress => {
                        info!("Scheduled cycle skipped: previous cycle still running");
                    }
                    TriggerOutcome::Disabled => return,
                }
            }
        })
    }
}
