//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          Domain Error (CoreError)          │
//! │       │                                    │                            │
//! │       ▼                                    ▼                            │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError (depot-api) ← code + message for callers                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use depot_core::{CoreError, ValidationError};
use thiserror::Error;

/// SQLite primary result codes that mean "another writer got there first".
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Database operation errors.
///
/// These errors wrap sqlx errors and domain errors raised while a
/// transaction is open, so a single type crosses the repository boundary.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - Unknown location, product, variant or transfer id
    /// - A variant that belongs to a different product
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A transition was attempted from the wrong state.
    #[error("{entity} {id} is {current}, cannot {action}")]
    InvalidState {
        entity: String,
        id: String,
        current: String,
        action: String,
    },

    /// Applying the movement would take a location below zero.
    #[error(
        "Insufficient stock for product {product_id} at location {location_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        location_id: String,
        product_id: String,
        variant_id: Option<String>,
        available: i64,
        requested: i64,
    },

    /// Input rejected before or during the write.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The store reported a lock or snapshot conflict. Safe to retry.
    ///
    /// ## When This Occurs
    /// - SQLITE_BUSY / SQLITE_LOCKED (including BUSY_SNAPSHOT under WAL)
    /// - Two writers upgrading read transactions at the same time
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Duplicate location code or SKU
    /// - Duplicate transfer number
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether the caller may simply try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::ConcurrencyConflict(_) | DbError::PoolExhausted)
    }
}

/// Returns true for SQLite BUSY/LOCKED and their extended codes.
fn is_lock_conflict(code: Option<&str>, message: &str) -> bool {
    let primary = code
        .and_then(|c| c.parse::<i32>().ok())
        .map(|c| c & 0xff);

    matches!(primary, Some(SQLITE_BUSY) | Some(SQLITE_LOCKED))
        || message.contains("database is locked")
        || message.contains("database table is locked")
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → BUSY/LOCKED → ConcurrencyConflict
///                               otherwise analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                let code = db_err.code();

                if is_lock_conflict(code.as_deref(), msg) {
                    return DbError::ConcurrencyConflict(msg.to_string());
                }

                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Domain errors raised inside a transaction keep their category.
impl From<CoreError> for DbError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { entity, id } => DbError::NotFound { entity, id },
            CoreError::InvalidState {
                entity,
                id,
                current,
                action,
            } => DbError::InvalidState {
                entity,
                id,
                current,
                action,
            },
            CoreError::InsufficientStock {
                location_id,
                product_id,
                variant_id,
                available,
                requested,
            } => DbError::InsufficientStock {
                location_id,
                product_id,
                variant_id,
                available,
                requested,
            },
            CoreError::Validation(v) => DbError::Validation(v),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
