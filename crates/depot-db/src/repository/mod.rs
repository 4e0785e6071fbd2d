//! # Repository Module
//!
//! Database repository implementations for Depot.
//!
//! ## Who Writes What
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Write Paths                                          │
//! │                                                                         │
//! │  TransferRepository::receive ──┐                                       │
//! │  StockRepository::adjust ──────┼──► ledger::record_in_tx(conn, ...)    │
//! │  LedgerRepository::record ─────┘         │                             │
//! │                                          ├── INSERT stock_movements    │
//! │                                          └── UPDATE location_stock     │
//! │                                                                         │
//! │  Only the ledger changes location_stock.quantity. Everything that      │
//! │  moves stock passes through it on an already-open transaction.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`](catalog::CatalogRepository) - Locations, products, variants
//! - [`LedgerRepository`](ledger::LedgerRepository) - Movement recording and queries
//! - [`StockRepository`](stock::StockRepository) - Per-location registry
//! - [`TransferRepository`](transfer::TransferRepository) - Transfer workflow
//! - [`AggregateRepository`](aggregate::AggregateRepository) - Cross-location totals

pub mod aggregate;
pub mod catalog;
pub mod ledger;
pub mod stock;
pub mod transfer;

/// Escapes `%`, `_` and `\` so user text can be embedded in a LIKE pattern.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
