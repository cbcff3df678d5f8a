//! # Database Handle
//!
//! Opens the SQLite pool and hands out repositories.
//!
//! ```text
//! PharmaConfig::load()
//!      │  db_config()
//!      ▼
//! DbConfig ──► Database::new ──► SqlitePool (WAL, foreign keys on)
//!                    │                 │
//!                    │                 └── migrations (if enabled)
//!                    ▼
//!      medicines() · bills() · counters() · backup()
//!                    │
//!                    └── GuardedLedger::new(&db, gate) for gated writes
//! ```
//!
//! WAL lets the inventory list and bill history read while a checkout
//! transaction is writing. Cascading deletes of batches, audit rows and
//! bill items depend on `foreign_keys`, which SQLite leaves off unless asked.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::backup::BackupRepository;
use crate::repository::bill::BillRepository;
use crate::repository::counter::CounterRepository;
use crate::repository::medicine::MedicineRepository;

const IN_MEMORY: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// How to open the ledger database.
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/pharma/pharmacy.db")
///     .max_connections(4)
///     .restore_chunk_size(25);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, created on first open. `:memory:` for a throwaway store.
    pub path: PathBuf,

    pub max_connections: u32,

    /// Connections kept open while idle.
    pub min_connections: u32,

    /// How long a caller waits for a free connection before failing.
    pub acquire_timeout: Duration,

    pub idle_timeout: Duration,

    /// How long a write waits for another writer's lock before failing.
    pub busy_timeout: Duration,

    /// Apply pending schema migrations when the pool opens.
    pub migrate_on_open: bool,

    /// Medicines per transaction during import.
    pub import_chunk_size: usize,

    /// Records per transaction during snapshot restore.
    pub restore_chunk_size: usize,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            path: path.into(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(10),
            migrate_on_open: true,
            import_chunk_size: 100,
            restore_chunk_size: 50,
        }
    }

    /// A private store that lives as long as the pool. Used by tests.
    ///
    /// Every `:memory:` connection is its own database, so the pool is held
    /// to a single connection.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            ..DbConfig::new(IN_MEMORY)
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn migrate_on_open(mut self, migrate: bool) -> Self {
        self.migrate_on_open = migrate;
        self
    }

    /// Clamped to at least 1.
    pub fn import_chunk_size(mut self, size: usize) -> Self {
        self.import_chunk_size = size.max(1);
        self
    }

    /// Clamped to at least 1.
    pub fn restore_chunk_size(mut self, size: usize) -> Self {
        self.restore_chunk_size = size.max(1);
        self
    }

    fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == IN_MEMORY
    }
}

// =============================================================================
// Database
// =============================================================================

/// Open ledger database. Clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    import_chunk_size: usize,
    restore_chunk_size: usize,
}

impl Database {
    /// Opens (creating if needed) the database and applies migrations.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.path.display(), "Opening ledger database");

        let url = format!("sqlite://{}?mode=rwc", config.path.display());
        let mut options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout)
            .create_if_missing(true);

        // WAL needs a file; the in-memory store keeps SQLite's default journal.
        if !config.is_in_memory() {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }
        debug!(in_memory = config.is_in_memory(), "Connect options ready");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let db = Database {
            pool,
            import_chunk_size: config.import_chunk_size.max(1),
            restore_chunk_size: config.restore_chunk_size.max(1),
        };

        if config.migrate_on_open {
            db.run_migrations().await?;
        }

        info!(max_connections = config.max_connections, "Ledger database ready");
        Ok(db)
    }

    /// Applies pending schema migrations. Safe to call repeatedly.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn medicines(&self) -> MedicineRepository {
        MedicineRepository::new(self.pool.clone(), self.import_chunk_size)
    }

    /// The transactional bill ledger.
    pub fn bills(&self) -> BillRepository {
        BillRepository::new(self.pool.clone())
    }

    pub fn counters(&self) -> CounterRepository {
        CounterRepository::new(self.pool.clone())
    }

    /// Snapshot export/restore and CSV.
    pub fn backup(&self) -> BackupRepository {
        BackupRepository::new(self.pool.clone(), self.restore_chunk_size)
    }

    /// Closes the pool; later repository calls fail.
    pub async fn close(&self) {
        info!("Closing ledger database");
        self.pool.close().await;
    }

    /// True when a trivial query succeeds.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
