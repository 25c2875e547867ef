//! # Database Error Types
//!
//! Errors raised at the storage and commit boundary.
//!
//! ## Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ValidationError ──► CoreError ─────────────┐                           │
//! │                                             ▼                           │
//! │  sqlx::Error ──► classify ──────────────► DbError ──► caller            │
//! │                    │                        ▲                           │
//! │                    └─ busy / locked ──► Conflict ◄── lost lot CAS       │
//! │                                                                         │
//! │  SaleCoordinator retries Conflict and surfaces everything else.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use billbook_core::{CoreError, ValidationError};
use sqlx::error::DatabaseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index rejected the write, e.g. a product code reused within
    /// one organisation.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A concurrent writer got there first: a lot's revision moved between
    /// read and write, or SQLite stayed busy past `busy_timeout`.
    ///
    /// The whole commit may be retried.
    #[error("Concurrency conflict: {detail}")]
    Conflict { detail: String },

    /// A ledger, catalog or validation rule failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A stored value could not be decoded (malformed decimal or JSON).
    #[error("Corrupt {field} value '{value}'")]
    CorruptValue { field: String, value: String },

    #[error("Could not open database: {0}")]
    Connection(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Statement failed: {0}")]
    Statement(String),

    /// The detached COMMIT task panicked or was cancelled.
    #[error("Commit task failed: {0}")]
    CommitTask(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Unexpected database error: {0}")]
    Unexpected(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        DbError::Conflict {
            detail: detail.into(),
        }
    }

    pub fn corrupt(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::CorruptValue {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Only concurrency conflicts are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Conflict { .. })
    }

    /// True when the failure means stored ledger data is inconsistent.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, DbError::Core(err) if err.is_invariant_violation())
    }
}

/// SQLITE_BUSY, SQLITE_BUSY_SNAPSHOT, SQLITE_LOCKED, SQLITE_LOCKED_SHAREDCACHE.
const LOCK_CONTENTION_CODES: [&str; 4] = ["5", "517", "6", "262"];

const UNIQUE_PREFIX: &str = "UNIQUE constraint failed: ";

/// Sorts a driver-reported failure into a `DbError` category.
fn classify(err: &dyn DatabaseError) -> DbError {
    let message = err.message();
    let contended = err
        .code()
        .is_some_and(|code| LOCK_CONTENTION_CODES.contains(&code.as_ref()))
        || message.contains("database is locked")
        || message.contains("database table is locked");

    if contended {
        return DbError::conflict(message);
    }

    if let Some(columns) = message.strip_prefix(UNIQUE_PREFIX) {
        return DbError::UniqueViolation {
            field: columns.to_string(),
            value: "unknown".to_string(),
        };
    }

    if message.contains("FOREIGN KEY constraint failed") {
        return DbError::ForeignKeyViolation {
            message: message.to_string(),
        };
    }

    DbError::Statement(message.to_string())
}

/// ```text
/// RowNotFound   → NotFound
/// Database(..)  → Conflict | UniqueViolation | ForeignKeyViolation | Statement
/// PoolTimedOut  → PoolExhausted
/// PoolClosed    → Connection
/// other         → Unexpected
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) => classify(&*db_err),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::Connection("pool is closed".to_string()),
            other => DbError::Unexpected(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(err.to_string())
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Core(CoreError::Validation(err))
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::corrupt("json", err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
