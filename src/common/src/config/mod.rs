use std::time::Duration;

use serde::{Deserialize, Serialize};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use once_cell::sync::OnceCell;

pub static CONFIG: OnceCell<Configuration> = OnceCell::new();

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Data source name for the app ledger (PostgreSQL or SQLite DSN)
    pub dsn: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dsn: String::from("sqlite://.data/fleetd.db"),
        }
    }
}

impl DatabaseConfig {
    /// Create an in-memory ledger configuration for tests
    pub fn in_memory() -> Self {
        Self {
            dsn: String::from("sqlite::memory:"),
        }
    }
}

/// Configuration for the external orchestrator's inventory API
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Base URL of the orchestrator API (e.g. http://orchestrator:8800)
    pub base_url: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("http://127.0.0.1:8800"),
        }
    }
}

/// Raw reconciliation/cleanup configuration as supplied by the operator.
///
/// Values are parsed here and clamped to their floors by the reaper; a value
/// below its floor is raised, never rejected.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Master switch for the reconciliation loop.
    ///
    /// Default: false (must be explicitly enabled for safety)
    ///
    /// Env: FLEETD__CLEANUP__ENABLED
    #[serde(default)]
    pub enabled: bool,

    /// Independently gates ghost detection, allowing retention-only cleanup.
    ///
    /// Default: true
    ///
    /// Env: FLEETD__CLEANUP__GHOST_CLEANUP_ENABLED
    #[serde(default = "default_ghost_cleanup_enabled")]
    pub ghost_cleanup_enabled: bool,

    /// Minimum age before an error-status record becomes eligible for
    /// removal. Floor: 1 hour.
    ///
    /// Default: 24h
    ///
    /// Env: FLEETD__CLEANUP__ERROR_RETENTION
    #[serde(default = "default_error_retention", with = "humantime_serde")]
    pub error_retention: Duration,

    /// Time between automatic reconciliation cycles. Floor: 5 minutes.
    ///
    /// Default: 1h
    ///
    /// Env: FLEETD__CLEANUP__INTERVAL
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Compute and report the deletion set without mutating the ledger.
    ///
    /// Default: true (safe default for initial deployment)
    ///
    /// Env: FLEETD__CLEANUP__DRY_RUN
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,

    /// Records in deploying status younger than this are never treated as
    /// ghosts, so an in-flight creation is not raced.
    ///
    /// Default: 10m (one provisioning timeout)
    ///
    /// Env: FLEETD__CLEANUP__GRACE_PERIOD
    #[serde(default = "default_grace_period", with = "humantime_serde")]
    pub grace_period: Duration,

    /// Treat stopped records with a missing unit as ghosts.
    ///
    /// Default: false
    ///
    /// Env: FLEETD__CLEANUP__INCLUDE_STOPPED
    #[serde(default)]
    pub include_stopped: bool,

    /// Bound on the inventory query and the delete transaction; a slow
    /// external system must not wedge the scheduler.
    ///
    /// Default: 30s
    ///
    /// Env: FLEETD__CLEANUP__QUERY_TIMEOUT
    #[serde(default = "default_query_timeout", with = "humantime_serde")]
    pub query_timeout: Duration,
}

// Default value functions for serde
fn default_ghost_cleanup_enabled() -> bool {
    true
}

fn default_error_retention() -> Duration {
    Duration::from_secs(24 * 3600)
}

fn default_interval() -> Duration {
    Duration::from_secs(3600)
}

fn default_dry_run() -> bool {
    true
}

fn default_grace_period() -> Duration {
    Duration::from_secs(600)
}

fn default_query_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ghost_cleanup_enabled: default_ghost_cleanup_enabled(),
            error_retention: default_error_retention(),
            interval: default_interval(),
            dry_run: default_dry_run(),
            grace_period: default_grace_period(),
            include_stopped: false,
            query_timeout: default_query_timeout(),
        }
    }
}

/// Configuration for the HTTP API surface
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Listen address for the HTTP router
    pub listen: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: String::from("0.0.0.0:3100"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Configuration {
    /// App ledger configuration
    pub database: DatabaseConfig,
    /// External orchestrator inventory API
    pub orchestrator: OrchestratorConfig,
    /// Reconciliation/cleanup loop configuration
    pub cleanup: CleanupConfig,
    /// HTTP API configuration
    pub api: ApiConfig,
}

impl Configuration {
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file("fleetd.toml"))
            .merge(Env::prefixed("FLEETD__").split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }

    pub fn load_from_path(path: &std::path::Path) -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("FLEETD__").split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }
}
