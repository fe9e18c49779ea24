//! Persistent app ledger backed by PostgreSQL or SQLite.
//!
//! The ledger is the single durable record of the fleet. Uniqueness of the
//! four exclusive resources (unit id, hostname, both ports) is enforced here
//! with UNIQUE constraints; stale records therefore block future provisioning
//! until they are deleted, which is the reclamation core's whole job.

use crate::model::{AppRecord, AppStatus};
use chrono::{DateTime, Utc};
use sqlx::{query, PgPool, Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

/// Ledger provides access to the app database (PostgreSQL or SQLite).
#[derive(Clone)]
pub enum Ledger {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl Ledger {
    /// Create a new Ledger client and initialize schema.
    pub async fn new(dsn: &str) -> Result<Self, sqlx::Error> {
        log::info!("Connecting to app ledger with DSN: {dsn}");

        let ledger = if dsn.starts_with("sqlite:") {
            // Add mode=rwc to create the database file if it doesn't exist
            let dsn_with_create = if dsn.contains('?') {
                if dsn.contains("mode=") {
                    dsn.to_string()
                } else {
                    format!("{dsn}&mode=rwc")
                }
            } else {
                format!("{dsn}?mode=rwc")
            };

            let pool = SqlitePool::connect(&dsn_with_create).await.map_err(|e| {
                log::error!("Failed to connect to SQLite ledger with DSN '{dsn_with_create}': {e}");
                e
            })?;
            Ledger::Sqlite(pool)
        } else {
            let pool = PgPool::connect(dsn).await.map_err(|e| {
                log::error!("Failed to connect to PostgreSQL ledger with DSN '{dsn}': {e}");
                e
            })?;
            Ledger::Postgres(pool)
        };

        ledger.init().await.map_err(|e| {
            log::error!("Failed to initialize ledger schema: {e}");
            e
        })?;
        log::info!("Ledger schema initialized successfully");
        Ok(ledger)
    }

    /// Create an in-memory SQLite ledger for tests and local runs.
    pub async fn new_in_memory() -> Result<Self, sqlx::Error> {
        Self::new("sqlite::memory:").await
    }

    /// Initialize the apps table if it does not exist.
    async fn init(&self) -> Result<(), sqlx::Error> {
        match self {
            Ledger::Sqlite(pool) => {
                let create_apps = r#"
                CREATE TABLE IF NOT EXISTS apps (
                    id TEXT PRIMARY KEY,
                    unit_id TEXT NOT NULL UNIQUE,
                    hostname TEXT NOT NULL UNIQUE,
                    public_port INTEGER NOT NULL UNIQUE,
                    internal_port INTEGER NOT NULL UNIQUE,
                    status TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )"#;
                query(create_apps).execute(pool).await?;
            }
            Ledger::Postgres(pool) => {
                let create_apps = r#"
                CREATE TABLE IF NOT EXISTS apps (
                    id UUID PRIMARY KEY,
                    unit_id TEXT NOT NULL UNIQUE,
                    hostname TEXT NOT NULL UNIQUE,
                    public_port INT NOT NULL UNIQUE,
                    internal_port INT NOT NULL UNIQUE,
                    status TEXT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL
                )"#;
                query(create_apps).execute(pool).await?;
            }
        }

        Ok(())
    }

    /// Insert a new app record.
    ///
    /// Used by the provisioning pipeline and by tests to seed ledgers.
    /// Uniqueness violations on any exclusive resource surface as database
    /// errors from the store.
    pub async fn insert_app(&self, record: &AppRecord) -> Result<(), sqlx::Error> {
        match self {
            Ledger::Sqlite(pool) => {
                let stmt = r#"
                INSERT INTO apps (id, unit_id, hostname, public_port, internal_port, status, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#;
                query(stmt)
                    .bind(record.id.to_string())
                    .bind(&record.unit_id)
                    .bind(&record.hostname)
                    .bind(record.public_port)
                    .bind(record.internal_port)
                    .bind(record.status.as_str())
                    .bind(record.created_at.to_rfc3339())
                    .bind(record.updated_at.to_rfc3339())
                    .execute(pool)
                    .await?;
            }
            Ledger::Postgres(pool) => {
                let stmt = r#"
                INSERT INTO apps (id, unit_id, hostname, public_port, internal_port, status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#;
                query(stmt)
                    .bind(record.id)
                    .bind(&record.unit_id)
                    .bind(&record.hostname)
                    .bind(record.public_port)
                    .bind(record.internal_port)
                    .bind(record.status.as_str())
                    .bind(record.created_at)
                    .bind(record.updated_at)
                    .execute(pool)
                    .await?;
            }
        }
        Ok(())
    }

    /// List all app records (one ledger snapshot).
    pub async fn list_apps(&self) -> Result<Vec<AppRecord>, sqlx::Error> {
        const SELECT: &str = "SELECT id, unit_id, hostname, public_port, internal_port, status, created_at, updated_at FROM apps";

        match self {
            Ledger::Sqlite(pool) => {
                let rows = query(SELECT).fetch_all(pool).await?;
                let mut apps = Vec::with_capacity(rows.len());
                for row in rows {
                    let id_str: String = row.get("id");
                    let id = Uuid::parse_str(&id_str)
                        .map_err(|_| sqlx::Error::Decode("Invalid UUID format".into()))?;

                    let status_str: String = row.get("status");
                    let status = AppStatus::from_str(&status_str)
                        .map_err(|_| sqlx::Error::Decode("Invalid app status".into()))?;

                    let created_at = parse_rfc3339(row.get("created_at"))?;
                    let updated_at = parse_rfc3339(row.get("updated_at"))?;

                    apps.push(AppRecord {
                        id,
                        unit_id: row.get("unit_id"),
                        hostname: row.get("hostname"),
                        public_port: row.get("public_port"),
                        internal_port: row.get("internal_port"),
                        status,
                        created_at,
                        updated_at,
                    });
                }
                Ok(apps)
            }
            Ledger::Postgres(pool) => {
                let rows = query(SELECT).fetch_all(pool).await?;
                let mut apps = Vec::with_capacity(rows.len());
                for row in rows {
                    let status_str: String = row.get("status");
                    let status = AppStatus::from_str(&status_str)
                        .map_err(|_| sqlx::Error::Decode("Invalid app status".into()))?;

                    apps.push(AppRecord {
                        id: row.get("id"),
                        unit_id: row.get("unit_id"),
                        hostname: row.get("hostname"),
                        public_port: row.get("public_port"),
                        internal_port: row.get("internal_port"),
                        status,
                        created_at: row.get("created_at"),
                        updated_at: row.get("updated_at"),
                    });
                }
                Ok(apps)
            }
        }
    }

    /// Delete the given app records in one transaction, all-or-nothing.
    ///
    /// Every id must still match a row at delete time; if any id misses
    /// (e.g. the record was removed concurrently) the whole transaction is
    /// rolled back and `RowNotFound` is returned, so a half-reconciled
    /// ledger is never committed. Returns the number of rows deleted.
    pub async fn delete_apps(&self, ids: &[Uuid]) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }

        match self {
            Ledger::Sqlite(pool) => {
                let mut tx = pool.begin().await?;
                let mut deleted = 0u64;
                for id in ids {
                    let result = query("DELETE FROM apps WHERE id = ?")
                        .bind(id.to_string())
                        .execute(&mut *tx)
                        .await?;
                    if result.rows_affected() == 0 {
                        tx.rollback().await?;
                        return Err(sqlx::Error::RowNotFound);
                    }
                    deleted += result.rows_affected();
                }
                tx.commit().await?;
                Ok(deleted)
            }
            Ledger::Postgres(pool) => {
                let mut tx = pool.begin().await?;
                let mut deleted = 0u64;
                for id in ids {
                    let result = query("DELETE FROM apps WHERE id = $1")
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                    if result.rows_affected() == 0 {
                        tx.rollback().await?;
                        return Err(sqlx::Error::RowNotFound);
                    }
                    deleted += result.rows_affected();
                }
                tx.commit().await?;
                Ok(deleted)
            }
        }
    }

    /// Count app records currently in the ledger.
    pub async fn count_apps(&self) -> Result<i64, sqlx::Error> {
        match self {
            Ledger::Sqlite(pool) => {
                let row = query("SELECT COUNT(*) AS n FROM apps")
                    .fetch_one(pool)
                    .await?;
                Ok(row.get("n"))
            }
            Ledger::Postgres(pool) => {
                let row = query("SELECT COUNT(*) AS n FROM apps")
                    .fetch_one(pool)
                    .await?;
                Ok(row.get("n"))
            }
        }
    }
}

fn parse_rfc3339(value: String) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(&value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| sqlx::Error::Decode("Invalid timestamp format".into()))
}
