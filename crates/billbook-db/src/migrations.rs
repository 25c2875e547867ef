//! # Schema Migrations
//!
//! The ledger schema lives in `migrations/sqlite/` at the workspace root and
//! is embedded at compile time by `sqlx::migrate!`.
//!
//! Add a new `NNN_description.sql` file for every schema change; applied
//! files are checksummed and must never be edited.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// How far a database is behind the embedded schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStatus {
    pub embedded: usize,
    pub applied: usize,
}

impl MigrationStatus {
    pub fn is_current(&self) -> bool {
        self.applied >= self.embedded
    }
}

/// Applies every pending migration in version order.
pub async fn run(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    info!(embedded = MIGRATOR.migrations.len(), "Ledger schema up to date");
    Ok(())
}

/// Compares applied migrations against the embedded set.
pub async fn status(pool: &SqlitePool) -> DbResult<MigrationStatus> {
    let tracked: Option<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_optional(pool)
    .await?;

    let applied: i64 = match tracked {
        Some(_) => {
            sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
                .fetch_one(pool)
                .await?
        }
        None => 0,
    };

    Ok(MigrationStatus {
        embedded: MIGRATOR.migrations.len(),
        applied: applied as usize,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_status_before_and_after() {
        let db = Database::new(DbConfig::in_memory().run_migrations(false))
            .await
            .unwrap();

        let before = status(db.pool()).await.unwrap();
        assert_eq!(before.applied, 0);
        assert!(!before.is_current());

        db.run_migrations().await.unwrap();
        db.run_migrations().await.unwrap();

        let after = status(db.pool()).await.unwrap();
        assert!(after.is_current());
        assert_eq!(after.applied, after.embedded);
    }
}
