//! Drift detection between the app ledger and the orchestrator inventory.
//!
//! Detection is a pure function over two snapshots and a supplied `now`:
//! given identical inputs it produces identical output, with no hidden clock
//! reads. All safety decisions (grace period, retention boundary, status
//! policy) live here so they can be unit tested deterministically.

use crate::config::CleanupConfig;
use chrono::{DateTime, Utc};
use common::model::{AppRecord, AppStatus};
use std::collections::HashSet;
use std::time::Duration;
use uuid::Uuid;

/// Result of one drift computation.
///
/// A record may appear in both sets (an old error record whose unit is also
/// gone); [`DriftReport::deletion_set`] de-duplicates, and the count helpers
/// never double-count such records.
#[derive(Debug, Clone, Default)]
pub struct DriftReport {
    /// Records referencing compute units absent from the inventory.
    pub ghosts: Vec<AppRecord>,
    /// Error-status records older than the configured retention.
    pub stale: Vec<AppRecord>,
}

impl DriftReport {
    /// De-duplicated union of both sets, ghosts first.
    pub fn deletion_set(&self) -> Vec<Uuid> {
        let mut seen = HashSet::new();
        let mut ids = vec![];
        for record in self.ghosts.iter().chain(self.stale.iter()) {
            if seen.insert(record.id) {
                ids.push(record.id);
            }
        }
        ids
    }

    /// Stale records not already counted as ghosts.
    pub fn stale_only_count(&self) -> usize {
        let ghost_ids: HashSet<Uuid> = self.ghosts.iter().map(|r| r.id).collect();
        self.stale
            .iter()
            .filter(|r| !ghost_ids.contains(&r.id))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.ghosts.is_empty() && self.stale.is_empty()
    }
}

/// Compute the sets of ghost and stale-error records.
///
/// Ghosts are records in running, deploying or error status (plus stopped
/// when `include_stopped` is set) whose `unit_id` is absent from the
/// inventory — except deploying records younger than the grace period, which
/// may simply not be visible in the inventory yet. Stale records are
/// error-status records whose last update is at least `error_retention` old
/// (boundary inclusive).
pub fn detect(
    records: &[AppRecord],
    inventory: &HashSet<String>,
    now: DateTime<Utc>,
    config: &CleanupConfig,
) -> DriftReport {
    let mut report = DriftReport::default();

    for record in records {
        if config.ghost_cleanup_enabled && is_ghost(record, inventory, now, config) {
            report.ghosts.push(record.clone());
        }

        if record.status == AppStatus::Error
            && age(now, record.updated_at) >= config.error_retention
        {
            report.stale.push(record.clone());
        }
    }

    report
}

fn is_ghost(
    record: &AppRecord,
    inventory: &HashSet<String>,
    now: DateTime<Utc>,
    config: &CleanupConfig,
) -> bool {
    let eligible = match record.status {
        AppStatus::Running | AppStatus::Deploying | AppStatus::Error => true,
        AppStatus::Stopped => config.include_stopped,
        AppStatus::Pending | AppStatus::Deleting => false,
    };
    if !eligible {
        return false;
    }

    if inventory.contains(&record.unit_id) {
        return false;
    }

    // A deploying record inside the grace period may not have surfaced in
    // the inventory yet; never race its own creation.
    if record.status == AppStatus::Deploying && age(now, record.created_at) < config.grace_period {
        return false;
    }

    true
}

/// Age of a timestamp relative to `now`; timestamps in the future count as
/// age zero, which keeps them protected by grace/retention windows.
fn age(now: DateTime<Utc>, ts: DateTime<Utc>) -> Duration {
    (now - ts).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn config() -> CleanupConfig {
        let (config, _) = CleanupConfig {
            enabled: true,
            error_retention: Duration::from_secs(24 * 3600),
            grace_period: Duration::from_secs(300),
            ..CleanupConfig::default()
        }
        .normalize();
        config
    }

    fn record(
        unit: u32,
        status: AppStatus,
        created_ago: ChronoDuration,
        updated_ago: ChronoDuration,
        now: DateTime<Utc>,
    ) -> AppRecord {
        AppRecord {
            id: Uuid::new_v4(),
            unit_id: unit.to_string(),
            hostname: format!("app-{unit}.fleet.local"),
            public_port: 30000 + unit as i32,
            internal_port: 8000 + unit as i32,
            status,
            created_at: now - created_ago,
            updated_at: now - updated_ago,
        }
    }

    fn inventory(units: &[u32]) -> HashSet<String> {
        units.iter().map(|u| u.to_string()).collect()
    }

    #[test]
    fn test_running_record_with_missing_unit_is_ghost() {
        let now = Utc::now();
        let records = vec![record(
            1,
            AppStatus::Running,
            ChronoDuration::hours(2),
            ChronoDuration::hours(2),
            now,
        )];

        let report = detect(&records, &inventory(&[]), now, &config());
        assert_eq!(report.ghosts.len(), 1);
        assert!(report.stale.is_empty());
    }

    #[test]
    fn test_present_unit_is_never_ghost() {
        let now = Utc::now();
        let records = vec![record(
            1,
            AppStatus::Running,
            ChronoDuration::hours(2),
            ChronoDuration::hours(2),
            now,
        )];

        let report = detect(&records, &inventory(&[1]), now, &config());
        assert!(report.is_empty());
    }

    #[test]
    fn test_grace_period_protects_fresh_deploying_record() {
        let now = Utc::now();
        let records = vec![record(
            1,
            AppStatus::Deploying,
            ChronoDuration::minutes(1),
            ChronoDuration::minutes(1),
            now,
        )];

        let report = detect(&records, &inventory(&[]), now, &config());
        assert!(report.ghosts.is_empty());
    }

    #[test]
    fn test_deploying_record_past_grace_period_is_ghost() {
        let now = Utc::now();
        let records = vec![record(
            1,
            AppStatus::Deploying,
            ChronoDuration::minutes(10),
            ChronoDuration::minutes(10),
            now,
        )];

        let report = detect(&records, &inventory(&[]), now, &config());
        assert_eq!(report.ghosts.len(), 1);
    }

    #[test]
    fn test_pending_and_deleting_are_never_ghosts() {
        let now = Utc::now();
        let records = vec![
            record(
                1,
                AppStatus::Pending,
                ChronoDuration::hours(5),
                ChronoDuration::hours(5),
                now,
            ),
            record(
                2,
                AppStatus::Deleting,
                ChronoDuration::hours(5),
                ChronoDuration::hours(5),
                now,
            ),
        ];

        let report = detect(&records, &inventory(&[]), now, &config());
        assert!(report.is_empty());
    }

    #[test]
    fn test_stopped_ghosting_is_policy_gated() {
        let now = Utc::now();
        let records = vec![record(
            1,
            AppStatus::Stopped,
            ChronoDuration::hours(5),
            ChronoDuration::hours(5),
            now,
        )];

        let report = detect(&records, &inventory(&[]), now, &config());
        assert!(report.ghosts.is_empty(), "stopped excluded by default");

        let include_stopped = CleanupConfig {
            include_stopped: true,
            ..config()
        };
        let report = detect(&records, &inventory(&[]), now, &include_stopped);
        assert_eq!(report.ghosts.len(), 1);
    }

    #[test]
    fn test_ghost_cleanup_can_be_disabled_independently() {
        let now = Utc::now();
        let records = vec![
            record(
                1,
                AppStatus::Running,
                ChronoDuration::hours(5),
                ChronoDuration::hours(5),
                now,
            ),
            record(
                2,
                AppStatus::Error,
                ChronoDuration::hours(30),
                ChronoDuration::hours(30),
                now,
            ),
        ];

        let retention_only = CleanupConfig {
            ghost_cleanup_enabled: false,
            ..config()
        };
        let report = detect(&records, &inventory(&[]), now, &retention_only);
        assert!(report.ghosts.is_empty());
        assert_eq!(report.stale.len(), 1, "retention cleanup still applies");
    }

    #[test]
    fn test_retention_boundary_is_inclusive() {
        let now = Utc::now();
        let exactly = record(
            1,
            AppStatus::Error,
            ChronoDuration::hours(24),
            ChronoDuration::hours(24),
            now,
        );
        let one_second_less = record(
            2,
            AppStatus::Error,
            ChronoDuration::hours(24),
            ChronoDuration::hours(24) - ChronoDuration::seconds(1),
            now,
        );

        let report = detect(
            &[exactly.clone(), one_second_less],
            &inventory(&[1, 2]),
            now,
            &config(),
        );
        assert_eq!(report.stale.len(), 1);
        assert_eq!(report.stale[0].id, exactly.id);
    }

    #[test]
    fn test_record_in_both_sets_is_counted_once() {
        let now = Utc::now();
        // Error status, missing from inventory, and older than retention
        let records = vec![record(
            1,
            AppStatus::Error,
            ChronoDuration::hours(48),
            ChronoDuration::hours(48),
            now,
        )];

        let report = detect(&records, &inventory(&[]), now, &config());
        assert_eq!(report.ghosts.len(), 1);
        assert_eq!(report.stale.len(), 1);
        assert_eq!(report.deletion_set().len(), 1);
        assert_eq!(report.stale_only_count(), 0);
    }

    #[test]
    fn test_future_timestamps_stay_protected() {
        let now = Utc::now();
        let records = vec![record(
            1,
            AppStatus::Deploying,
            ChronoDuration::minutes(-5),
            ChronoDuration::minutes(-5),
            now,
        )];

        let report = detect(&records, &inventory(&[]), now, &config());
        assert!(report.is_empty());
    }

    // Four-record fleet: a healthy unit, an old error whose unit is gone, a
    // deployment still inside the grace window, and a fresh error.
    #[test]
    fn test_mixed_fleet_scenario() {
        let now = Utc::now();
        let cfg = config();

        let healthy = record(
            101,
            AppStatus::Running,
            ChronoDuration::hours(10),
            ChronoDuration::hours(10),
            now,
        );
        let old_error = record(
            102,
            AppStatus::Error,
            ChronoDuration::hours(25),
            ChronoDuration::hours(25),
            now,
        );
        let deploying = record(
            103,
            AppStatus::Deploying,
            ChronoDuration::minutes(1),
            ChronoDuration::minutes(1),
            now,
        );
        let fresh_error = record(
            104,
            AppStatus::Error,
            ChronoDuration::hours(1),
            ChronoDuration::hours(1),
            now,
        );

        let records = vec![
            healthy.clone(),
            old_error.clone(),
            deploying.clone(),
            fresh_error.clone(),
        ];
        let report = detect(&records, &inventory(&[101]), now, &cfg);

        // 102 and 104 reference missing units in error status; 103 is inside
        // the grace window; 101 is present in the inventory.
        let ghost_ids: Vec<Uuid> = report.ghosts.iter().map(|r| r.id).collect();
        assert_eq!(ghost_ids, vec![old_error.id, fresh_error.id]);

        // Only 102 exceeds the 24h retention.
        assert_eq!(report.stale.len(), 1);
        assert_eq!(report.stale[0].id, old_error.id);

        let deletion_set = report.deletion_set();
        assert_eq!(deletion_set, vec![old_error.id, fresh_error.id]);
        assert_eq!(report.stale_only_count(), 0);

        // Survivors after applying the set would be 101 and 103.
        let survivors: Vec<Uuid> = records
            .iter()
            .filter(|r| !deletion_set.contains(&r.id))
            .map(|r| r.id)
            .collect();
        assert_eq!(survivors, vec![healthy.id, deploying.id]);

        // Two removals free eight exclusive resources.
        assert_eq!(
            deletion_set.len() as u64 * AppRecord::EXCLUSIVE_RESOURCES,
            8
        );
    }

    #[test]
    fn test_detect_is_deterministic() {
        let now = Utc::now();
        let records = vec![
            record(
                1,
                AppStatus::Running,
                ChronoDuration::hours(3),
                ChronoDuration::hours(3),
                now,
            ),
            record(
                2,
                AppStatus::Error,
                ChronoDuration::hours(30),
                ChronoDuration::hours(30),
                now,
            ),
        ];
        let inv = inventory(&[2]);
        let cfg = config();

        let first = detect(&records, &inv, now, &cfg);
        let second = detect(&records, &inv, now, &cfg);
        assert_eq!(first.deletion_set(), second.deletion_set());
        assert_eq!(first.ghosts.len(), second.ghosts.len());
        assert_eq!(first.stale.len(), second.stale.len());
    }
}
