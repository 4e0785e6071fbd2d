//! # Transfer Commands
//!
//! The request → approve → receive lifecycle for moving stock between
//! locations.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_transfer ──► PENDING ──approve_transfer──► IN_TRANSIT          │
//! │                         │                              │               │
//! │                  cancel_transfer               receive_transfer        │
//! │                         │                              │               │
//! │                         ▼                              ▼               │
//! │                     CANCELLED                      RECEIVED            │
//! │                                               (stock moves here)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{respond, PageDto};
use crate::error::{ApiError, ApiResponse};
use crate::state::DepotState;
use depot_core::{
    ItemQuantity, NewTransfer, NewTransferItem, StockTransfer, StockTransferItem, TransferDetail,
    TransferFilter, TransferStatus,
};

// =============================================================================
// DTOs
// =============================================================================

/// Transfer header, as returned by listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSummaryDto {
    pub id: String,
    pub transfer_number: String,
    pub from_location_id: String,
    pub to_location_id: String,
    pub status: TransferStatus,
    pub requested_by: String,
    pub approved_by: Option<String>,
    pub received_by: Option<String>,
    pub cancelled_by: Option<String>,
    pub request_date: DateTime<Utc>,
    pub approval_date: Option<DateTime<Utc>>,
    pub receive_date: Option<DateTime<Utc>>,
    pub cancel_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl From<StockTransfer> for TransferSummaryDto {
    fn from(t: StockTransfer) -> Self {
        TransferSummaryDto {
            id: t.id,
            transfer_number: t.transfer_number,
            from_location_id: t.from_location_id,
            to_location_id: t.to_location_id,
            status: t.status,
            requested_by: t.requested_by,
            approved_by: t.approved_by,
            received_by: t.received_by,
            cancelled_by: t.cancelled_by,
            request_date: t.request_date,
            approval_date: t.approval_date,
            receive_date: t.receive_date,
            cancel_date: t.cancel_date,
            notes: t.notes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferItemDto {
    pub id: String,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub requested_quantity: i64,
    pub approved_quantity: Option<i64>,
    pub received_quantity: Option<i64>,
}

impl From<StockTransferItem> for TransferItemDto {
    fn from(i: StockTransferItem) -> Self {
        TransferItemDto {
            id: i.id,
            product_id: i.product_id,
            variant_id: i.variant_id,
            requested_quantity: i.requested_quantity,
            approved_quantity: i.approved_quantity,
            received_quantity: i.received_quantity,
        }
    }
}

/// Transfer header with its items.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferDto {
    #[serde(flatten)]
    pub transfer: TransferSummaryDto,
    pub items: Vec<TransferItemDto>,
}

impl From<TransferDetail> for TransferDto {
    fn from(detail: TransferDetail) -> Self {
        TransferDto {
            transfer: detail.transfer.into(),
            items: detail.items.into_iter().map(TransferItemDto::from).collect(),
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferItemRequest {
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub requested_quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransferRequest {
    pub from_location_id: String,
    pub to_location_id: String,
    pub items: Vec<TransferItemRequest>,
    pub requested_by: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A per-item quantity for approve or receive, keyed by product and variant.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemQuantityRequest {
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveTransferRequest {
    pub transfer_id: String,
    pub approved_by: String,
    /// Omitted items are approved as requested.
    #[serde(default)]
    pub items: Option<Vec<ItemQuantityRequest>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveTransferRequest {
    pub transfer_id: String,
    pub received_by: String,
    /// Omitted items are received as approved.
    #[serde(default)]
    pub items: Option<Vec<ItemQuantityRequest>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelTransferRequest {
    pub transfer_id: String,
    #[serde(default)]
    pub cancelled_by: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListTransfersRequest {
    pub status: Option<TransferStatus>,
    /// Either side of the transfer.
    pub location_id: Option<String>,
    pub from_location_id: Option<String>,
    pub to_location_id: Option<String>,
    pub requested_by: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

fn overrides(items: Option<Vec<ItemQuantityRequest>>) -> Option<Vec<ItemQuantity>> {
    items.map(|items| {
        items
            .into_iter()
            .map(|i| ItemQuantity {
                product_id: i.product_id,
                variant_id: i.variant_id,
                quantity: i.quantity,
            })
            .collect()
    })
}

// =============================================================================
// Commands
// =============================================================================

/// Creates a pending transfer. No stock moves.
///
/// ## Errors
/// - `VALIDATION_ERROR` - same locations, no items, duplicate items,
///   non-positive quantities, inactive location
/// - `NOT_FOUND` - unknown location, product or variant
pub async fn create_transfer(
    state: &DepotState,
    request: CreateTransferRequest,
) -> ApiResponse<TransferDto> {
    let started = Instant::now();
    debug!(
        from = %request.from_location_id,
        to = %request.to_location_id,
        items = request.items.len(),
        "create_transfer command"
    );

    let new_transfer = NewTransfer {
        from_location_id: request.from_location_id,
        to_location_id: request.to_location_id,
        items: request
            .items
            .into_iter()
            .map(|i| NewTransferItem {
                product_id: i.product_id,
                variant_id: i.variant_id,
                requested_quantity: i.requested_quantity,
            })
            .collect(),
        requested_by: request.requested_by,
        notes: request.notes,
    };

    let result = state
        .db()
        .transfers()
        .create(&new_transfer)
        .await
        .map(TransferDto::from)
        .map_err(ApiError::from);

    respond("create_transfer", started, result)
}

/// Approves a pending transfer. No stock moves.
pub async fn approve_transfer(
    state: &DepotState,
    request: ApproveTransferRequest,
) -> ApiResponse<TransferDto> {
    let started = Instant::now();
    debug!(transfer_id = %request.transfer_id, "approve_transfer command");

    let items = overrides(request.items);
    let result = state
        .db()
        .transfers()
        .approve(&request.transfer_id, &request.approved_by, items.as_deref())
        .await
        .map(TransferDto::from)
        .map_err(ApiError::from);

    respond("approve_transfer", started, result)
}

/// Receives an in-transit transfer, moving the stock in one transaction.
///
/// ## Errors
/// - `INVALID_STATE` - not in transit (including a second receive)
/// - `INSUFFICIENT_STOCK` - the source cannot cover an item; nothing moved
pub async fn receive_transfer(
    state: &DepotState,
    request: ReceiveTransferRequest,
) -> ApiResponse<TransferDto> {
    let started = Instant::now();
    debug!(transfer_id = %request.transfer_id, "receive_transfer command");

    let items = overrides(request.items);
    let result = state
        .db()
        .transfers()
        .receive(&request.transfer_id, &request.received_by, items.as_deref())
        .await
        .map(TransferDto::from)
        .map_err(ApiError::from);

    respond("receive_transfer", started, result)
}

/// Cancels a pending transfer.
pub async fn cancel_transfer(
    state: &DepotState,
    request: CancelTransferRequest,
) -> ApiResponse<TransferDto> {
    let started = Instant::now();
    debug!(transfer_id = %request.transfer_id, "cancel_transfer command");

    let result = state
        .db()
        .transfers()
        .cancel(&request.transfer_id, request.cancelled_by.as_deref())
        .await
        .map(TransferDto::from)
        .map_err(ApiError::from);

    respond("cancel_transfer", started, result)
}

pub async fn get_transfer(state: &DepotState, transfer_id: String) -> ApiResponse<TransferDto> {
    let started = Instant::now();
    debug!(transfer_id = %transfer_id, "get_transfer command");

    let result = state
        .db()
        .transfers()
        .get(&transfer_id)
        .await
        .map(TransferDto::from)
        .map_err(ApiError::from);

    respond("get_transfer", started, result)
}

/// Transfer headers, newest first.
pub async fn list_transfers(
    state: &DepotState,
    request: ListTransfersRequest,
) -> ApiResponse<PageDto<TransferSummaryDto>> {
    let started = Instant::now();
    debug!(?request, "list_transfers command");

    let pagination = state.page(request.limit, request.offset);
    let filter = TransferFilter {
        status: request.status,
        location_id: request.location_id,
        from_location_id: request.from_location_id,
        to_location_id: request.to_location_id,
        requested_by: request.requested_by,
        from: request.from,
        to: request.to,
    };

    let result = state
        .db()
        .transfers()
        .list(&filter, pagination)
        .await
        .map(PageDto::from)
        .map_err(ApiError::from);

    respond("list_transfers", started, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{shop, Shop};
    use crate::error::ErrorCode;
    use serde_json::json;

    async fn create(shop: &Shop, quantity: i64) -> TransferDto {
        create_transfer(
            &shop.state,
            CreateTransferRequest {
                from_location_id: shop.a.clone(),
                to_location_id: shop.b.clone(),
                items: vec![TransferItemRequest {
                    product_id: shop.product.clone(),
                    variant_id: None,
                    requested_quantity: quantity,
                }],
                requested_by: "clerk".to_string(),
                notes: Some("weekly restock".to_string()),
            },
        )
        .await
        .into_result()
        .unwrap()
    }

    #[tokio::test]
    async fn test_lifecycle_through_commands() {
        let shop = shop().await;
        let created = create(&shop, 10).await;
        assert_eq!(created.transfer.status, TransferStatus::Pending);

        let approved = approve_transfer(
            &shop.state,
            ApproveTransferRequest {
                transfer_id: created.transfer.id.clone(),
                approved_by: "manager".to_string(),
                items: None,
            },
        )
        .await
        .into_result()
        .unwrap();
        assert_eq!(approved.items[0].approved_quantity, Some(10));

        let request: ReceiveTransferRequest = serde_json::from_value(json!({
            "transferId": created.transfer.id,
            "receivedBy": "receiver",
            "items": [{ "productId": shop.product, "quantity": 8 }]
        }))
        .unwrap();
        let received = receive_transfer(&shop.state, request).await.into_result().unwrap();
        assert_eq!(received.transfer.status, TransferStatus::Received);
        assert_eq!(received.items[0].received_quantity, Some(8));

        let again = receive_transfer(
            &shop.state,
            ReceiveTransferRequest {
                transfer_id: created.transfer.id.clone(),
                received_by: "receiver".to_string(),
                items: None,
            },
        )
        .await;
        assert!(!again.success);
        assert_eq!(again.error.unwrap().code, ErrorCode::InvalidState);

        let aggregates = shop.state.db().aggregates();
        assert_eq!(aggregates.location_total(&shop.a, &shop.product, None).await.unwrap(), 12);
        assert_eq!(aggregates.location_total(&shop.b, &shop.product, None).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_same_location_is_validation_error() {
        let shop = shop().await;

        let response = create_transfer(
            &shop.state,
            CreateTransferRequest {
                from_location_id: shop.a.clone(),
                to_location_id: shop.a.clone(),
                items: vec![TransferItemRequest {
                    product_id: shop.product.clone(),
                    variant_id: None,
                    requested_quantity: 1,
                }],
                requested_by: "clerk".to_string(),
                notes: None,
            },
        )
        .await;
        assert_eq!(response.error.unwrap().code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_cancel_and_list() {
        let shop = shop().await;
        let first = create(&shop, 1).await;
        create(&shop, 2).await;

        let cancelled = cancel_transfer(
            &shop.state,
            CancelTransferRequest {
                transfer_id: first.transfer.id.clone(),
                cancelled_by: Some("clerk".to_string()),
            },
        )
        .await
        .into_result()
        .unwrap();
        assert_eq!(cancelled.transfer.status, TransferStatus::Cancelled);

        let page = list_transfers(
            &shop.state,
            ListTransfersRequest {
                status: Some(TransferStatus::Pending),
                ..Default::default()
            },
        )
        .await
        .into_result()
        .unwrap();
        assert_eq!(page.total, 1);

        let missing = get_transfer(&shop.state, "nope".to_string()).await;
        assert_eq!(missing.error.unwrap().code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_transfer_json_shape() {
        let shop = shop().await;
        let created = create(&shop, 3).await;

        let value = serde_json::to_value(
            get_transfer(&shop.state, created.transfer.id.clone()).await,
        )
        .unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(value["data"]["status"], "pending");
        assert_eq!(value["data"]["transferNumber"], json!(created.transfer.transfer_number));
        assert_eq!(value["data"]["items"][0]["requestedQuantity"], 3);
        assert!(value.get("error").is_none());
    }
}
