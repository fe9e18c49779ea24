//! Applies a computed deletion set to the ledger, or simulates it.
//!
//! Reclamation is all-or-nothing per cycle: either every record in the set
//! is deleted in one transaction, or none are. Partial cleanup is never
//! committed, so a failed cycle leaves the ledger exactly as the snapshot
//! saw it and the next cycle retries from fresh state.

use common::ledger::Ledger;
use common::model::AppRecord;
use thiserror::Error;
use uuid::Uuid;

/// Outcome of one reclamation, real or simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReclaimOutcome {
    /// Records removed (or that would be removed under dry-run).
    pub removed: u64,
    /// Exclusive resources released: 4 per record (unit id, hostname, two
    /// ports). Reported for observability; freeing is implicit in deletion.
    pub resources_freed: u64,
    /// True when no mutation was performed (dry-run).
    pub simulated: bool,
}

#[derive(Debug, Error)]
pub enum ReclaimError {
    /// The delete transaction failed or rolled back; nothing was removed.
    #[error("ledger delete transaction failed: {0}")]
    Transaction(#[from] sqlx::Error),
}

/// Applies deletion sets against the app ledger.
pub struct Reclaimer {
    ledger: Ledger,
}

impl Reclaimer {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    /// Delete every record in `deletion_set` in one transaction, or report
    /// the counts that would result without touching the store (dry-run).
    pub async fn apply(
        &self,
        deletion_set: &[Uuid],
        dry_run: bool,
    ) -> Result<ReclaimOutcome, ReclaimError> {
        if deletion_set.is_empty() {
            return Ok(ReclaimOutcome {
                removed: 0,
                resources_freed: 0,
                simulated: dry_run,
            });
        }

        if dry_run {
            let removed = deletion_set.len() as u64;
            tracing::info!(
                candidates = removed,
                resources = removed * AppRecord::EXCLUSIVE_RESOURCES,
                "[DRY-RUN] Would delete app records"
            );
            return Ok(ReclaimOutcome {
                removed,
                resources_freed: removed * AppRecord::EXCLUSIVE_RESOURCES,
                simulated: true,
            });
        }

        let removed = self.ledger.delete_apps(deletion_set).await?;

        tracing::info!(
            removed,
            resources_freed = removed * AppRecord::EXCLUSIVE_RESOURCES,
            "Deleted app records"
        );

        Ok(ReclaimOutcome {
            removed,
            resources_freed: removed * AppRecord::EXCLUSIVE_RESOURCES,
            simulated: false,
        })
    }
}
