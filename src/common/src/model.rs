//! Shared data model for provisioned compute units.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a provisioned (or attempted) compute unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppStatus {
    Pending,
    Deploying,
    Running,
    Error,
    Stopped,
    Deleting,
}

impl AppStatus {
    /// Database text encoding of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            AppStatus::Pending => "pending",
            AppStatus::Deploying => "deploying",
            AppStatus::Running => "running",
            AppStatus::Error => "error",
            AppStatus::Stopped => "stopped",
            AppStatus::Deleting => "deleting",
        }
    }
}

impl std::fmt::Display for AppStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AppStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AppStatus::Pending),
            "deploying" => Ok(AppStatus::Deploying),
            "running" => Ok(AppStatus::Running),
            "error" => Ok(AppStatus::Error),
            "stopped" => Ok(AppStatus::Stopped),
            "deleting" => Ok(AppStatus::Deleting),
            other => Err(format!("unknown app status: {other}")),
        }
    }
}

/// One ledger row per provisioned compute unit.
///
/// `unit_id`, `hostname`, `public_port` and `internal_port` are the unit's
/// exclusive resources: each is globally unique across live records (enforced
/// by UNIQUE constraints in the ledger). Deleting a record releases all four
/// for reuse; there is no separate free-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRecord {
    /// Ledger-assigned identity, immutable.
    pub id: Uuid,
    /// External compute-unit identifier in the orchestrator.
    pub unit_id: String,
    pub hostname: String,
    pub public_port: i32,
    pub internal_port: i32,
    pub status: AppStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AppRecord {
    /// Number of exclusive resources released when this record is deleted
    /// (unit id, hostname, two ports).
    pub const EXCLUSIVE_RESOURCES: u64 = 4;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            AppStatus::Pending,
            AppStatus::Deploying,
            AppStatus::Running,
            AppStatus::Error,
            AppStatus::Stopped,
            AppStatus::Deleting,
        ] {
            let parsed = AppStatus::from_str(status.as_str()).unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!(AppStatus::from_str("exploded").is_err());
    }

    #[test]
    fn test_status_serde_encoding_matches_db_encoding() {
        let json = serde_json::to_string(&AppStatus::Deploying).unwrap();
        assert_eq!(json, "\"deploying\"");
    }
}
