//! # Storage Errors
//!
//! ```text
//! sqlx::Error ─────────────┐
//! MigrateError ────────────┤
//! serde_json::Error ───────┼──► DbError ──► host application
//! ConfigError ─────────────┤
//! CoreError (stock, gate) ─┘        └── is_insufficient_stock() / is_guard_rejection() / is_not_found()
//! ```
//!
//! A domain error raised inside a ledger transaction aborts the whole
//! operation; the transaction rolls back when it is dropped.

use pharma_core::CoreError;
use sqlx::error::ErrorKind;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A second medicine with an existing id, or a duplicate bill number.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A CHECK constraint fired (negative stock, discount outside 0-100).
    /// The ledger checks these first, so reaching the database is a bug.
    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    /// File missing and not creatable, permissions, disk full.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A JSON column (audit change list) could not be encoded or decoded.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A business rule rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// The write gate blocked the operation.
    pub fn is_guard_rejection(&self) -> bool {
        matches!(self, DbError::Core(CoreError::GuardRejected { .. }))
    }

    /// A sale or edit asked for more stock than exists.
    pub fn is_insufficient_stock(&self) -> bool {
        matches!(self, DbError::Core(CoreError::InsufficientStock { .. }))
    }

    /// Missing medicine, bill or batch.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DbError::NotFound { .. } | DbError::Core(CoreError::NotFound { .. })
        )
    }
}

/// ```text
/// RowNotFound                 → NotFound
/// Database(UniqueViolation)   → UniqueViolation { field: "<table>.<column>" }
/// Database(ForeignKey...)     → ForeignKeyViolation
/// Database(CheckViolation)    → ConstraintViolation
/// PoolTimedOut                → PoolExhausted
/// PoolClosed                  → ConnectionFailed
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.kind() {
                    ErrorKind::UniqueViolation => DbError::UniqueViolation {
                        // SQLite: "UNIQUE constraint failed: bills.bill_number"
                        field: message
                            .rsplit(": ")
                            .next()
                            .unwrap_or("unknown")
                            .to_string(),
                        value: "unknown".to_string(),
                    },
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { message },
                    ErrorKind::CheckViolation | ErrorKind::NotNullViolation => {
                        DbError::ConstraintViolation(message)
                    }
                    _ => DbError::QueryFailed(message),
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),

            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
