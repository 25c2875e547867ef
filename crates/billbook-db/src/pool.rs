//! # Database Handle
//!
//! Opens the SQLite store behind the ledger and hands out repositories.
//!
//! ```text
//! DbConfig ──► connect_options() ──► SqlitePool ──► migrations ──► Database
//!                                                                  │
//!                    products() / lots() / sales()  ◄──────────────┤
//!                    pool().begin()  (SaleCoordinator)  ◄──────────┘
//! ```
//!
//! File databases run in WAL mode: readers never block the writer, and a
//! second writer waits up to `busy_timeout` before its statement fails with
//! a busy error (surfaced as a retryable `DbError::Conflict`).
//!
//! In-memory databases are private to their pool and must use exactly one
//! connection, so every statement and transaction is serialized.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::ConfigError;
use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::lot::LotRepository;
use crate::repository::product::ProductRepository;
use crate::repository::sale::SaleRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Where the ledger lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    Memory,
}

/// Pool and SQLite settings.
///
/// ## Example
/// ```rust
/// use billbook_db::DbConfig;
/// use std::time::Duration;
///
/// let config = DbConfig::new("/var/lib/billbook/ledger.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_secs(2));
/// assert_eq!(config.max_connections, 8);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub location: DbLocation,

    /// Default: 5 (always 1 in memory)
    pub max_connections: u32,

    /// Default: 1
    pub min_connections: u32,

    /// How long to wait for a free connection. Default: 30 seconds
    pub connect_timeout: Duration,

    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// How long a writer waits on a locked database. Default: 5 seconds
    pub busy_timeout: Duration,

    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// A file database, created on first connect.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            location: DbLocation::File(path.into()),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// A fresh, isolated in-memory database (tests).
    pub fn in_memory() -> Self {
        DbConfig {
            location: DbLocation::Memory,
            max_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            busy_timeout: Duration::from_secs(1),
            ..DbConfig::new(":memory:")
        }
    }

    /// Reads `BILLBOOK_DB_PATH` (default `./billbook.db`, `:memory:` allowed),
    /// `BILLBOOK_DB_MAX_CONNECTIONS` and `BILLBOOK_DB_BUSY_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match lookup("BILLBOOK_DB_PATH").as_deref().map(str::trim) {
            Some("") => return Err(ConfigError::InvalidValue("BILLBOOK_DB_PATH".to_string())),
            Some(":memory:") => DbConfig::in_memory(),
            Some(path) => DbConfig::new(path),
            None => DbConfig::new("./billbook.db"),
        };

        if let Some(raw) = lookup("BILLBOOK_DB_MAX_CONNECTIONS") {
            let max: u32 = raw
                .trim()
                .parse()
                .ok()
                .filter(|max| *max > 0)
                .ok_or_else(|| ConfigError::InvalidValue("BILLBOOK_DB_MAX_CONNECTIONS".to_string()))?;
            config = config.max_connections(max);
        }

        if let Some(raw) = lookup("BILLBOOK_DB_BUSY_TIMEOUT_MS") {
            let millis: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("BILLBOOK_DB_BUSY_TIMEOUT_MS".to_string()))?;
            config = config.busy_timeout(Duration::from_millis(millis));
        }

        Ok(config)
    }

    /// Ignored for in-memory databases.
    pub fn max_connections(mut self, max: u32) -> Self {
        if self.location != DbLocation::Memory {
            self.max_connections = max;
        }
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = match &self.location {
            DbLocation::Memory => SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|err| DbError::Connection(err.to_string()))?,
            DbLocation::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal),
        };

        Ok(options.foreign_keys(true).busy_timeout(self.busy_timeout))
    }

    /// In-memory pools never reap or retire their connection: closing it
    /// would discard the database.
    fn pool_options(&self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.connect_timeout);

        match self.location {
            DbLocation::Memory => options.idle_timeout(None).max_lifetime(None),
            DbLocation::File(_) => options.idle_timeout(Some(self.idle_timeout)),
        }
    }

    fn describe(&self) -> String {
        match &self.location {
            DbLocation::File(path) => path.display().to_string(),
            DbLocation::Memory => ":memory:".to_string(),
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Shared handle to the ledger store. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and, unless disabled, applies pending migrations.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        let location = config.describe();
        info!(location = %location, "Opening ledger database");

        let pool = config
            .pool_options()
            .connect_with(config.connect_options()?)
            .await
            .map_err(|err| DbError::Connection(format!("{location}: {err}")))?;

        debug!(
            max_connections = config.max_connections,
            busy_timeout_ms = config.busy_timeout.as_millis() as u64,
            "Pool ready"
        );

        let db = Database { pool };
        if config.run_migrations {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    /// Applies pending migrations. Safe to call repeatedly.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    pub fn lots(&self) -> LotRepository {
        LotRepository::new(self.pool.clone())
    }

    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
    }

    /// Round-trips a trivial statement.
    pub async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        info!("Closing ledger database");
        self.pool.close().await;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
