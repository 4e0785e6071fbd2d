//! # depot-core: Pure Business Logic for Depot
//!
//! This crate contains the inventory rules of the Depot ledger as pure
//! functions and plain data types. It has zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Depot Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Callers (IPC, REST, CLI)                        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               depot-api (commands + envelope)                   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ depot-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌────────────┐  ┌───────────┐                 │   │
//! │  │   │   types   │  │  transfer  │  │ validation│                 │   │
//! │  │   │ Movement  │  │ state      │  │   rules   │                 │   │
//! │  │   │ Transfer  │  │ machine    │  │  checks   │                 │   │
//! │  │   └───────────┘  └────────────┘  └───────────┘                 │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    depot-db (Database Layer)                    │   │
//! │  │        SQLite, transactions, ledger, registry, transfers        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (LocationStock, StockMovement, StockTransfer, ...)
//! - [`transfer`] - Transfer state machine and quantity resolution
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use depot_core::{MovementType, TransferStatus};
//! use depot_core::transfer::TransferAction;
//!
//! // `out` movements always decrease stock
//! assert_eq!(MovementType::Out.signed_effect(5).unwrap(), -5);
//!
//! // Only pending transfers can be approved
//! let next = TransferStatus::Pending.apply(TransferAction::Approve).unwrap();
//! assert_eq!(next, TransferStatus::InTransit);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod transfer;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Prefix used for human-readable transfer numbers (`TRF-20260131-0001`).
pub const DEFAULT_TRANSFER_PREFIX: &str = "TRF";

/// Maximum number of line items in a single transfer request.
pub const MAX_TRANSFER_ITEMS: usize = 500;

/// Maximum magnitude of a single stock movement.
///
/// Guards against fat-finger entries (typing 100000 instead of 100).
pub const MAX_MOVEMENT_QUANTITY: i64 = 1_000_000;

/// Page size used when a caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Upper bound for any single page of results.
pub const MAX_PAGE_SIZE: u32 = 500;
