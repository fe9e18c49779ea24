//! Reconciliation configuration with enforced minimum bounds.

use serde::Serialize;
use std::time::Duration;

/// Floor for `error_retention`; values below are raised, never rejected.
pub const ERROR_RETENTION_FLOOR: Duration = Duration::from_secs(3600);

/// Floor for `interval` between automatic cycles.
pub const INTERVAL_FLOOR: Duration = Duration::from_secs(300);

/// Effective reconciliation configuration.
///
/// Built from [`common::config::CleanupConfig`] via [`CleanupConfig::normalize`],
/// after which it is immutable for the process lifetime. Out-of-bounds values
/// are clamped to their floors with an informational note, not an error.
#[derive(Clone, Debug, Serialize)]
pub struct CleanupConfig {
    pub enabled: bool,
    pub ghost_cleanup_enabled: bool,
    #[serde(with = "humantime_serde")]
    pub error_retention: Duration,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    pub dry_run: bool,
    #[serde(with = "humantime_serde")]
    pub grace_period: Duration,
    pub include_stopped: bool,
    #[serde(with = "humantime_serde")]
    pub query_timeout: Duration,
}

impl From<common::config::CleanupConfig> for CleanupConfig {
    fn from(config: common::config::CleanupConfig) -> Self {
        Self {
            enabled: config.enabled,
            ghost_cleanup_enabled: config.ghost_cleanup_enabled,
            error_retention: config.error_retention,
            interval: config.interval,
            dry_run: config.dry_run,
            grace_period: config.grace_period,
            include_stopped: config.include_stopped,
            query_timeout: config.query_timeout,
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self::from(common::config::CleanupConfig::default())
    }
}

impl CleanupConfig {
    /// Raise out-of-bounds values to their floors.
    ///
    /// Returns the effective configuration and one note per clamped value.
    /// The notes are surfaced through the stats interface and logged at WARN
    /// by the orchestrator; they are never treated as errors.
    pub fn normalize(mut self) -> (Self, Vec<String>) {
        let mut notes = vec![];

        if self.error_retention < ERROR_RETENTION_FLOOR {
            notes.push(format!(
                "error_retention {:?} below floor {:?}, raised to floor",
                self.error_retention, ERROR_RETENTION_FLOOR
            ));
            self.error_retention = ERROR_RETENTION_FLOOR;
        }

        if self.interval < INTERVAL_FLOOR {
            notes.push(format!(
                "interval {:?} below floor {:?}, raised to floor",
                self.interval, INTERVAL_FLOOR
            ));
            self.interval = INTERVAL_FLOOR;
        }

        (self, notes)
    }
}
