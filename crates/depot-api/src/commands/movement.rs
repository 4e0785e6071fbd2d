//! # Movement Commands
//!
//! Manual ledger entries (receipts, sales, returns, corrections) and the
//! movement history query.
//!
//! Transfer movements are never recorded here; they are written in pairs by
//! `receive_transfer`.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{respond, PageDto};
use crate::error::{ApiError, ApiResponse};
use crate::state::DepotState;
use depot_core::{MovementFilter, MovementType, NewMovement, ReferenceType, StockMovement};

/// A ledger entry for callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementDto {
    pub id: String,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub location_id: Option<String>,
    pub movement_type: MovementType,
    /// Signed effect on the location's quantity.
    pub quantity: i64,
    pub reference_type: Option<ReferenceType>,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
    pub actor_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<StockMovement> for MovementDto {
    fn from(m: StockMovement) -> Self {
        MovementDto {
            id: m.id,
            product_id: m.product_id,
            variant_id: m.variant_id,
            location_id: m.location_id,
            movement_type: m.movement_type,
            quantity: m.quantity,
            reference_type: m.reference_type,
            reference_id: m.reference_id,
            notes: m.notes,
            actor_id: m.actor_id,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMovementRequest {
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    /// Omitted means the default location.
    #[serde(default)]
    pub location_id: Option<String>,
    pub movement_type: MovementType,
    /// Positive magnitude for in/out/return; signed for adjustment.
    pub quantity: i64,
    #[serde(default)]
    pub reference_type: Option<ReferenceType>,
    #[serde(default)]
    pub reference_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub actor_id: String,
}

impl RecordMovementRequest {
    fn into_new_movement(self) -> Result<NewMovement, ApiError> {
        let mut movement =
            NewMovement::new(self.product_id, self.movement_type, self.quantity, self.actor_id)
                .for_variant(self.variant_id);
        movement.location_id = self.location_id;
        movement.notes = self.notes;

        match (self.reference_type, self.reference_id) {
            (Some(reference_type), Some(reference_id)) => {
                movement = movement.with_reference(reference_type, reference_id);
            }
            (Some(reference_type), None) => {
                movement.reference = Some(depot_core::MovementReference {
                    reference_type,
                    reference_id: None,
                });
            }
            (None, Some(_)) => {
                return Err(ApiError::validation("referenceId requires referenceType"));
            }
            (None, None) => {}
        }

        Ok(movement)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListMovementsRequest {
    pub product_id: Option<String>,
    pub variant_id: Option<String>,
    pub location_id: Option<String>,
    pub movement_type: Option<MovementType>,
    pub reference_type: Option<ReferenceType>,
    pub reference_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Records one movement and updates the location's quantity with it.
///
/// ## Errors
/// - `VALIDATION_ERROR` - zero quantity, negative magnitude, `transfer` type
/// - `NOT_FOUND` - unknown product, variant or location
/// - `INSUFFICIENT_STOCK` - the location would go below zero
pub async fn record_movement(
    state: &DepotState,
    request: RecordMovementRequest,
) -> ApiResponse<MovementDto> {
    let started = Instant::now();
    debug!(
        product_id = %request.product_id,
        movement_type = %request.movement_type,
        quantity = request.quantity,
        "record_movement command"
    );

    respond("record_movement", started, record(state, request).await)
}

async fn record(state: &DepotState, request: RecordMovementRequest) -> Result<MovementDto, ApiError> {
    let movement = request.into_new_movement()?;
    let recorded = state.db().ledger().record_movement(&movement).await?;
    Ok(recorded.into())
}

/// Movement history, newest first.
pub async fn list_movements(
    state: &DepotState,
    request: ListMovementsRequest,
) -> ApiResponse<PageDto<MovementDto>> {
    let started = Instant::now();
    debug!(?request, "list_movements command");

    let pagination = state.page(request.limit, request.offset);
    let filter = MovementFilter {
        product_id: request.product_id,
        variant_id: request.variant_id,
        location_id: request.location_id,
        movement_type: request.movement_type,
        reference_type: request.reference_type,
        reference_id: request.reference_id,
        from: request.from,
        to: request.to,
    };

    let result = state
        .db()
        .ledger()
        .query(&filter, pagination)
        .await
        .map(PageDto::from)
        .map_err(ApiError::from);

    respond("list_movements", started, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::shop;
    use crate::error::ErrorCode;

    fn request(product_id: &str, movement_type: MovementType, quantity: i64) -> RecordMovementRequest {
        RecordMovementRequest {
            product_id: product_id.to_string(),
            variant_id: None,
            location_id: None,
            movement_type,
            quantity,
            reference_type: None,
            reference_id: None,
            notes: None,
            actor_id: "cashier".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sale_lands_on_default_location() {
        let shop = shop().await;

        let mut sale = request(&shop.product, MovementType::Out, 3);
        sale.reference_type = Some(ReferenceType::Sale);
        sale.reference_id = Some("sale-1".to_string());

        let response = record_movement(&shop.state, sale).await;
        assert!(response.success);
        let movement = response.data.unwrap();
        assert_eq!(movement.quantity, -3);
        assert_eq!(movement.location_id.as_deref(), Some(shop.a.as_str()));

        let page = list_movements(
            &shop.state,
            ListMovementsRequest {
                reference_type: Some(ReferenceType::Sale),
                ..Default::default()
            },
        )
        .await
        .into_result()
        .unwrap();
        assert_eq!(page.total, 1);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_oversell_reports_insufficient_stock() {
        let shop = shop().await;

        let response = record_movement(&shop.state, request(&shop.product, MovementType::Out, 21)).await;
        assert!(!response.success);
        assert_eq!(response.error.unwrap().code, ErrorCode::InsufficientStock);
    }

    #[tokio::test]
    async fn test_transfer_type_rejected() {
        let shop = shop().await;

        let response =
            record_movement(&shop.state, request(&shop.product, MovementType::Transfer, 1)).await;
        assert_eq!(response.error.unwrap().code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_request_json_is_camel_case() {
        let shop = shop().await;

        let json = serde_json::json!({
            "productId": shop.product,
            "locationId": shop.b,
            "movementType": "in",
            "quantity": 4,
            "referenceType": "purchase",
            "referenceId": "po-7",
            "actorId": "receiver"
        });
        let request: RecordMovementRequest = serde_json::from_value(json).unwrap();

        let movement = record_movement(&shop.state, request).await.into_result().unwrap();
        let value = serde_json::to_value(&movement).unwrap();
        assert_eq!(value["movementType"], "in");
        assert_eq!(value["referenceId"], "po-7");
        assert_eq!(value["locationId"], serde_json::json!(shop.b));
    }
}
