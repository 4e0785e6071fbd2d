//! # Stock Commands
//!
//! Per-location stock (the registry), reorder thresholds, reservations and
//! cross-location totals.
//!
//! ## Quantities
//! ```text
//! quantity           on hand, changed only through the ledger
//! reservedQuantity   held for pending orders
//! available          quantity − reservedQuantity
//! ```

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{respond, PageDto};
use crate::error::{ApiError, ApiResponse};
use crate::state::DepotState;
use depot_core::{
    AggregateFilter, AggregateStock, LocationQuantity, LocationStock, LocationStockListing,
    StockListFilter,
};

// =============================================================================
// DTOs
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationStockDto {
    pub location_id: String,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub quantity: i64,
    pub reserved_quantity: i64,
    pub available: i64,
    pub min_stock: i64,
    pub max_stock: Option<i64>,
    pub is_low_stock: bool,
    pub last_updated: DateTime<Utc>,
}

impl From<LocationStock> for LocationStockDto {
    fn from(s: LocationStock) -> Self {
        LocationStockDto {
            available: s.available(),
            is_low_stock: s.is_low_stock(),
            location_id: s.location_id,
            product_id: s.product_id,
            variant_id: s.variant_id,
            quantity: s.quantity,
            reserved_quantity: s.reserved_quantity,
            min_stock: s.min_stock,
            max_stock: s.max_stock,
            last_updated: s.last_updated,
        }
    }
}

/// A registry row with catalog names, for stock screens.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockListingDto {
    pub location_id: String,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub sku: String,
    pub product_name: String,
    pub variant_sku: Option<String>,
    pub variant_name: Option<String>,
    pub quantity: i64,
    pub reserved_quantity: i64,
    pub available: i64,
    pub min_stock: i64,
    pub max_stock: Option<i64>,
    pub is_low_stock: bool,
    pub last_updated: DateTime<Utc>,
}

impl From<LocationStockListing> for StockListingDto {
    fn from(s: LocationStockListing) -> Self {
        StockListingDto {
            available: s.quantity - s.reserved_quantity,
            is_low_stock: s.quantity <= s.min_stock,
            location_id: s.location_id,
            product_id: s.product_id,
            variant_id: s.variant_id,
            sku: s.sku,
            product_name: s.product_name,
            variant_sku: s.variant_sku,
            variant_name: s.variant_name,
            quantity: s.quantity,
            reserved_quantity: s.reserved_quantity,
            min_stock: s.min_stock,
            max_stock: s.max_stock,
            last_updated: s.last_updated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStockDto {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub quantity: i64,
    pub reserved_quantity: i64,
    pub available: i64,
    pub location_count: i64,
}

impl From<AggregateStock> for AggregateStockDto {
    fn from(a: AggregateStock) -> Self {
        AggregateStockDto {
            available: a.available(),
            product_id: a.product_id,
            variant_id: a.variant_id,
            quantity: a.quantity,
            reserved_quantity: a.reserved_quantity,
            location_count: a.location_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationQuantityDto {
    pub location_id: String,
    pub location_name: String,
    pub quantity: i64,
    pub reserved_quantity: i64,
    pub available: i64,
}

impl From<LocationQuantity> for LocationQuantityDto {
    fn from(q: LocationQuantity) -> Self {
        LocationQuantityDto {
            available: q.quantity - q.reserved_quantity,
            location_id: q.location_id,
            location_name: q.location_name,
            quantity: q.quantity,
            reserved_quantity: q.reserved_quantity,
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Identifies one (location, product, variant) tuple.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockTupleRequest {
    pub location_id: String,
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLocationStockRequest {
    pub location_id: String,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub low_stock_only: bool,
    #[serde(default)]
    pub non_zero_only: bool,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustStockRequest {
    pub location_id: String,
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    /// Signed correction, never zero.
    pub delta: i64,
    pub actor_id: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetThresholdsRequest {
    pub location_id: String,
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub min_stock: i64,
    #[serde(default)]
    pub max_stock: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    pub location_id: String,
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStockRequest {
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    /// Fold every variant of the product into one total.
    #[serde(default)]
    pub include_variants: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListAggregateStockRequest {
    pub product_id: Option<String>,
    pub location_id: Option<String>,
    pub non_zero_only: bool,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

// =============================================================================
// Registry
// =============================================================================

/// Stock of one product/variant at one location. Untouched tuples read as zero.
pub async fn get_location_stock(
    state: &DepotState,
    request: StockTupleRequest,
) -> ApiResponse<LocationStockDto> {
    let started = Instant::now();
    debug!(?request, "get_location_stock command");

    let result = state
        .db()
        .stock()
        .get_or_init(&request.location_id, &request.product_id, request.variant_id.as_deref())
        .await
        .map(LocationStockDto::from)
        .map_err(ApiError::from);

    respond("get_location_stock", started, result)
}

/// A location's stock with catalog names, ordered by SKU.
pub async fn list_location_stock(
    state: &DepotState,
    request: ListLocationStockRequest,
) -> ApiResponse<PageDto<StockListingDto>> {
    let started = Instant::now();
    debug!(?request, "list_location_stock command");

    let pagination = state.page(request.limit, request.offset);
    let filter = StockListFilter {
        product_id: request.product_id,
        search: request.search,
        low_stock_only: request.low_stock_only,
        non_zero_only: request.non_zero_only,
    };

    let result = state
        .db()
        .stock()
        .list(&request.location_id, &filter, pagination)
        .await
        .map(PageDto::from)
        .map_err(ApiError::from);

    respond("list_location_stock", started, result)
}

/// Applies a signed correction through the ledger.
pub async fn adjust_stock(
    state: &DepotState,
    request: AdjustStockRequest,
) -> ApiResponse<LocationStockDto> {
    let started = Instant::now();
    debug!(?request, "adjust_stock command");

    respond("adjust_stock", started, adjust(state, request).await)
}

async fn adjust(state: &DepotState, request: AdjustStockRequest) -> Result<LocationStockDto, ApiError> {
    let stock = state.db().stock();
    let variant_id = request.variant_id.as_deref();

    stock
        .adjust(
            &request.location_id,
            &request.product_id,
            variant_id,
            request.delta,
            &request.actor_id,
            request.notes.as_deref(),
        )
        .await?;

    let row = stock
        .get(&request.location_id, &request.product_id, variant_id)
        .await?
        .ok_or_else(|| ApiError::not_found("LocationStock", &request.location_id))?;

    Ok(row.into())
}

/// Sets the reorder threshold and optional capacity.
pub async fn set_stock_thresholds(
    state: &DepotState,
    request: SetThresholdsRequest,
) -> ApiResponse<LocationStockDto> {
    let started = Instant::now();
    debug!(?request, "set_stock_thresholds command");

    let result = state
        .db()
        .stock()
        .set_thresholds(
            &request.location_id,
            &request.product_id,
            request.variant_id.as_deref(),
            request.min_stock,
            request.max_stock,
        )
        .await
        .map(LocationStockDto::from)
        .map_err(ApiError::from);

    respond("set_stock_thresholds", started, result)
}

/// Holds units for a pending order.
pub async fn reserve_stock(
    state: &DepotState,
    request: ReservationRequest,
) -> ApiResponse<LocationStockDto> {
    let started = Instant::now();
    debug!(?request, "reserve_stock command");

    let result = state
        .db()
        .stock()
        .reserve(
            &request.location_id,
            &request.product_id,
            request.variant_id.as_deref(),
            request.quantity,
        )
        .await
        .map(LocationStockDto::from)
        .map_err(ApiError::from);

    respond("reserve_stock", started, result)
}

/// Returns reserved units to available stock.
pub async fn release_stock(
    state: &DepotState,
    request: ReservationRequest,
) -> ApiResponse<LocationStockDto> {
    let started = Instant::now();
    debug!(?request, "release_stock command");

    let result = state
        .db()
        .stock()
        .release(
            &request.location_id,
            &request.product_id,
            request.variant_id.as_deref(),
            request.quantity,
        )
        .await
        .map(LocationStockDto::from)
        .map_err(ApiError::from);

    respond("release_stock", started, result)
}

// =============================================================================
// Aggregates
// =============================================================================

/// Total across all locations.
pub async fn get_aggregate_stock(
    state: &DepotState,
    request: AggregateStockRequest,
) -> ApiResponse<AggregateStockDto> {
    let started = Instant::now();
    debug!(?request, "get_aggregate_stock command");

    let aggregates = state.db().aggregates();
    let result = if request.include_variants {
        aggregates.product_total_all_variants(&request.product_id).await
    } else {
        aggregates
            .product_total(&request.product_id, request.variant_id.as_deref())
            .await
    };

    respond(
        "get_aggregate_stock",
        started,
        result.map(AggregateStockDto::from).map_err(ApiError::from),
    )
}

/// One row per location holding the product/variant.
pub async fn get_stock_breakdown(
    state: &DepotState,
    request: AggregateStockRequest,
) -> ApiResponse<Vec<LocationQuantityDto>> {
    let started = Instant::now();
    debug!(?request, "get_stock_breakdown command");

    let result = state
        .db()
        .aggregates()
        .breakdown(&request.product_id, request.variant_id.as_deref())
        .await
        .map(|rows| rows.into_iter().map(LocationQuantityDto::from).collect())
        .map_err(ApiError::from);

    respond("get_stock_breakdown", started, result)
}

/// Totals per product/variant.
pub async fn list_aggregate_stock(
    state: &DepotState,
    request: ListAggregateStockRequest,
) -> ApiResponse<PageDto<AggregateStockDto>> {
    let started = Instant::now();
    debug!(?request, "list_aggregate_stock command");

    let pagination = state.page(request.limit, request.offset);
    let filter = AggregateFilter {
        product_id: request.product_id,
        location_id: request.location_id,
        non_zero_only: request.non_zero_only,
    };

    let result = state
        .db()
        .aggregates()
        .totals(&filter, pagination)
        .await
        .map(PageDto::from)
        .map_err(ApiError::from);

    respond("list_aggregate_stock", started, result)
}
