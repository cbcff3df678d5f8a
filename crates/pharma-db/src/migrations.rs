//! # Schema Migrations
//!
//! The SQL files under `migrations/sqlite/` are compiled into the binary and
//! applied in filename order when a [`Database`](crate::Database) opens.
//!
//! ```text
//! 001_initial_schema.sql   medicines, medicine_batches, medicine_audit,
//!                          bills, bill_items, counters (bill_number = 0)
//! ```
//!
//! Applied files are recorded in `_sqlx_migrations` with their checksum;
//! editing one after release breaks every existing store, so changes go in a
//! new `NNN_description.sql`.
//!
//! These are unrelated to snapshot upgrades in `pharma_core::snapshot`,
//! which rewrite backup documents rather than the live schema.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every migration not yet recorded. Each runs in its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let (total, applied) = migration_status(pool).await?;
    debug!(total, applied, "Schema migration status");

    MIGRATOR.run(pool).await?;

    if applied < total {
        info!(applied = total - applied, "Schema migrations applied");
    }
    Ok(())
}

/// `(embedded, applied)` migration counts.
///
/// A fresh file has no bookkeeping table yet and reports zero applied.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let embedded = MIGRATOR.iter().count();

    let has_table: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_optional(pool)
    .await?;

    let applied: i64 = match has_table {
        Some(_) => {
            sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
                .fetch_one(pool)
                .await?
        }
        None => 0,
    };

    Ok((embedded, applied.max(0) as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_fresh_store_is_fully_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (embedded, applied) = migration_status(db.pool()).await.unwrap();
        assert_eq!(embedded, applied);

        // Re-running is a no-op
        db.run_migrations().await.unwrap();
        assert_eq!(migration_status(db.pool()).await.unwrap(), (embedded, applied));
    }

    #[tokio::test]
    async fn test_unmigrated_store_reports_pending() {
        let db = Database::new(DbConfig::in_memory().migrate_on_open(false))
            .await
            .unwrap();
        let (embedded, applied) = migration_status(db.pool()).await.unwrap();
        assert!(embedded >= 1);
        assert_eq!(applied, 0);
    }

    #[tokio::test]
    async fn test_bill_counter_is_seeded() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let value: i64 = sqlx::query_scalar("SELECT value FROM counters WHERE key = 'bill_number'")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(value, 0);
    }
}
