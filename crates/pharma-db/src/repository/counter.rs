//! # Counter Repository
//!
//! Durable named sequences. The bill number is the only one today.
//!
//! `next_in` runs on the caller's transaction: if the bill insert rolls
//! back, so does the increment, and the sequence stays gapless.

use std::collections::BTreeMap;

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct CounterRepository {
    pool: SqlitePool,
}

impl CounterRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CounterRepository { pool }
    }

    /// Current value, 0 if the counter was never used.
    pub async fn get(&self, key: &str) -> DbResult<i64> {
        let value: Option<i64> = sqlx::query_scalar("SELECT value FROM counters WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.unwrap_or(0))
    }

    pub async fn all(&self) -> DbResult<BTreeMap<String, i64>> {
        let mut conn = self.pool.acquire().await?;
        all_in(&mut conn).await
    }
}

/// Increments `key` and returns the new value.
pub(crate) async fn next_in(conn: &mut SqliteConnection, key: &str) -> DbResult<i64> {
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO counters (key, value) VALUES (?1, 1)
        ON CONFLICT (key) DO UPDATE SET value = value + 1
        RETURNING value
        "#,
    )
    .bind(key)
    .fetch_one(&mut *conn)
    .await?;

    debug!(key, value, "Counter advanced");
    Ok(value)
}

/// Raises `key` to at least `value`. Never lowers it.
pub(crate) async fn raise_to_in(conn: &mut SqliteConnection, key: &str, value: i64) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO counters (key, value) VALUES (?1, ?2)
        ON CONFLICT (key) DO UPDATE SET value = MAX(value, excluded.value)
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn all_in(conn: &mut SqliteConnection) -> DbResult<BTreeMap<String, i64>> {
    let rows: Vec<(String, i64)> = sqlx::query_as("SELECT key, value FROM counters ORDER BY key")
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use pharma_core::BILL_COUNTER_KEY;

    #[tokio::test]
    async fn test_next_is_sequential_and_rollback_safe() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        assert_eq!(next_in(&mut tx, BILL_COUNTER_KEY).await.unwrap(), 1);
        tx.commit().await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        assert_eq!(next_in(&mut tx, BILL_COUNTER_KEY).await.unwrap(), 2);
        tx.rollback().await.unwrap();

        assert_eq!(db.counters().get(BILL_COUNTER_KEY).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_raise_never_lowers() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        raise_to_in(&mut conn, "bill_number", 10).await.unwrap();
        raise_to_in(&mut conn, "bill_number", 4).await.unwrap();
        raise_to_in(&mut conn, "other", 3).await.unwrap();
        drop(conn);

        let all = db.counters().all().await.unwrap();
        assert_eq!(all["bill_number"], 10);
        assert_eq!(all["other"], 3);
    }
}
