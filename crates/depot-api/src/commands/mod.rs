//! # Depot Commands
//!
//! Every operation exposed to callers.
//!
//! ## Command Organization
//! ```text
//! commands/
//! ├── mod.rs       ◄─── You are here (shared DTOs + response helper)
//! ├── movement.rs  ◄─── record_movement, list_movements
//! ├── stock.rs     ◄─── location stock, thresholds, reservations, aggregates
//! └── transfer.rs  ◄─── create / approve / receive / cancel / get / list
//! ```
//!
//! ## How Commands Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  caller ── request DTO (camelCase JSON) ──┐                            │
//! │                                           ▼                            │
//! │  pub async fn approve_transfer(state: &DepotState, request)            │
//! │       │                                                                 │
//! │       ├── private fn: Result<TransferDto, ApiError>   (uses `?`)       │
//! │       │                                                                 │
//! │       └── respond(): logs outcome, wraps in ApiResponse                │
//! │                                           │                            │
//! │  caller ◄── { success, data?, error? } ───┘                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod movement;
pub mod stock;
pub mod transfer;

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResponse};
use depot_core::Page;

/// A page of results for callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDto<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: u32,
    pub offset: u32,
    pub has_more: bool,
}

impl<T, U: Into<T>> From<Page<U>> for PageDto<T> {
    fn from(page: Page<U>) -> Self {
        let has_more = page.has_more();
        PageDto {
            items: page.items.into_iter().map(Into::into).collect(),
            total: page.total,
            limit: page.limit,
            offset: page.offset,
            has_more,
        }
    }
}

/// Logs the outcome of a command and wraps it in the envelope.
pub(crate) fn respond<T>(
    command: &'static str,
    started: Instant,
    result: Result<T, ApiError>,
) -> ApiResponse<T> {
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    match &result {
        Ok(_) => debug!(command, elapsed_ms, "Command complete"),
        Err(e) => warn!(command, code = ?e.code, message = %e.message, elapsed_ms, "Command failed"),
    }

    result.into()
}
