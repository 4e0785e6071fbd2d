//! # depot-db: Database Layer for Depot
//!
//! This crate owns every write to inventory state. It uses SQLite for
//! storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Depot Data Flow                                │
//! │                                                                         │
//! │  depot-api command (receive_transfer)                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     depot-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ Transfer ──┐  │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ Stock ─────┤  │    │ 001_init.sql │  │   │
//! │  │   │ Transactions  │    │ Ledger ◄───┘  │    │              │  │   │
//! │  │   │               │    │ Aggregate     │    │              │  │   │
//! │  │   │               │    │ Catalog       │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   location_stock · stock_movements · stock_transfers           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Ledger, registry, transfer, aggregate and catalog repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use depot_db::{Database, DbConfig};
//! use depot_core::{MovementType, NewMovement};
//!
//! let db = Database::new(DbConfig::new("path/to/depot.db")).await?;
//!
//! let movement = NewMovement::new(product_id, MovementType::In, 24, "user-1")
//!     .at_location(warehouse_id);
//! db.ledger().record_movement(&movement).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::aggregate::AggregateRepository;
pub use repository::catalog::CatalogRepository;
pub use repository::ledger::{LedgerRepository, MovementPager};
pub use repository::stock::StockRepository;
pub use repository::transfer::TransferRepository;
