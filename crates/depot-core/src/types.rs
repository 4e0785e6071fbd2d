//! # Domain Types
//!
//! Core domain types used throughout Depot.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  LocationStock  │   │  StockMovement  │   │  StockTransfer  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  location_id    │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  product_id     │   │  movement_type  │   │  transfer_number│       │
//! │  │  variant_id?    │   │  quantity (±)   │   │  status         │       │
//! │  │  quantity       │   │  reference?     │   │  from → to      │       │
//! │  └─────────────────┘   └─────────────────┘   └────────┬────────┘       │
//! │                                                       │ 1..n            │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌────────▼────────┐       │
//! │  │  MovementType   │   │ TransferStatus  │   │ StockTransfer-  │       │
//! │  │  In / Out       │   │ Pending         │   │ Item            │       │
//! │  │  Transfer       │   │ InTransit       │   │ requested ≥     │       │
//! │  │  Adjustment     │   │ Received        │   │ approved ≥      │       │
//! │  │  Return         │   │ Cancelled       │   │ received        │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Signed Quantities
//! A stored movement's `quantity` is the signed effect on the location's
//! stock. The registry quantity for a (location, product, variant) tuple is
//! therefore exactly `SUM(quantity)` over its movements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::validation::ValidationResult;
use crate::{DEFAULT_PAGE_SIZE, MAX_MOVEMENT_QUANTITY, MAX_PAGE_SIZE};

// =============================================================================
// Catalog & Location Directory
// =============================================================================

/// A storage location (store, warehouse, back room).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Location {
    pub id: String,
    /// Short business code, e.g. "WH-01".
    pub code: String,
    pub name: String,
    /// Whether stock at this location may go below zero.
    pub allow_negative_stock: bool,
    /// Movements recorded without a location land here.
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A catalog product. Stock lives in [`LocationStock`], never here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A sellable variant of a product (size, colour, pack).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductVariant {
    pub id: String,
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLocation {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub allow_negative_stock: bool,
    #[serde(default)]
    pub is_default: bool,
}

impl NewLocation {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        NewLocation {
            code: code.into(),
            name: name.into(),
            allow_negative_stock: false,
            is_default: false,
        }
    }
}

/// Input for registering a product (and optionally its variants later).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
}

/// Input for registering a product variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVariant {
    pub product_id: String,
    pub sku: String,
    pub name: String,
}

// =============================================================================
// Stock Key
// =============================================================================

/// Identifies a stock line: a product, optionally narrowed to a variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: String,
    pub variant_id: Option<String>,
}

impl StockKey {
    pub fn new(product_id: impl Into<String>, variant_id: Option<String>) -> Self {
        StockKey {
            product_id: product_id.into(),
            variant_id,
        }
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant_id {
            Some(variant) => write!(f, "{}/{}", self.product_id, variant),
            None => write!(f, "{}", self.product_id),
        }
    }
}

// =============================================================================
// Location Stock
// =============================================================================

/// Per-location quantity record for a product/variant.
///
/// Created lazily (all zeros) the first time a tuple is touched and never
/// deleted, only zeroed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LocationStock {
    pub location_id: String,
    pub product_id: String,
    pub variant_id: Option<String>,
    /// On-hand quantity. Mutated only by the ledger.
    pub quantity: i64,
    /// Units held for pending orders; not available for sale or transfer.
    pub reserved_quantity: i64,
    /// Reorder threshold.
    pub min_stock: i64,
    /// Optional shelf capacity.
    pub max_stock: Option<i64>,
    pub last_updated: DateTime<Utc>,
}

impl LocationStock {
    /// Units that are on hand and not reserved.
    #[inline]
    pub fn available(&self) -> i64 {
        self.quantity - self.reserved_quantity
    }

    /// At or below the reorder threshold.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_stock
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id.clone(), self.variant_id.clone())
    }
}

/// A registry row joined with catalog metadata for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LocationStockListing {
    pub location_id: String,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub sku: String,
    pub product_name: String,
    pub variant_sku: Option<String>,
    pub variant_name: Option<String>,
    pub quantity: i64,
    pub reserved_quantity: i64,
    pub min_stock: i64,
    pub max_stock: Option<i64>,
    pub last_updated: DateTime<Utc>,
}

/// Filters for listing a location's stock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockListFilter {
    pub product_id: Option<String>,
    /// Case-insensitive match on product/variant sku or name.
    pub search: Option<String>,
    /// Only rows at or below their reorder threshold.
    #[serde(default)]
    pub low_stock_only: bool,
    /// Hide rows whose quantity is zero.
    #[serde(default)]
    pub non_zero_only: bool,
}

// =============================================================================
// Aggregates
// =============================================================================

/// Cross-location total for a product/variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AggregateStock {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub quantity: i64,
    pub reserved_quantity: i64,
    pub location_count: i64,
}

impl AggregateStock {
    #[inline]
    pub fn available(&self) -> i64 {
        self.quantity - self.reserved_quantity
    }
}

/// One location's share of a product's stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LocationQuantity {
    pub location_id: String,
    pub location_name: String,
    pub quantity: i64,
    pub reserved_quantity: i64,
}

/// Filters for cross-location totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateFilter {
    pub product_id: Option<String>,
    /// Restrict the sum to a single location.
    pub location_id: Option<String>,
    /// Hide products whose total is zero.
    #[serde(default)]
    pub non_zero_only: bool,
}

/// Registry quantity versus ledger sum for one tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Reconciliation {
    pub location_id: String,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub registry_quantity: i64,
    pub ledger_quantity: i64,
}

impl Reconciliation {
    #[inline]
    pub fn is_balanced(&self) -> bool {
        self.registry_quantity == self.ledger_quantity
    }
}

// =============================================================================
// Movement Type
// =============================================================================

/// Kind of stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Goods received (purchase, opening stock). Increases stock.
    In,
    /// Goods leaving (sale, write-off). Decreases stock.
    Out,
    /// One leg of an inter-location transfer. Caller supplies the sign.
    Transfer,
    /// Stock count correction. Caller supplies the sign.
    Adjustment,
    /// Customer return. Increases stock.
    Return,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "in",
            MovementType::Out => "out",
            MovementType::Transfer => "transfer",
            MovementType::Adjustment => "adjustment",
            MovementType::Return => "return",
        }
    }

    /// Converts a caller-supplied quantity into the signed effect on stock.
    ///
    /// ## Sign Convention
    /// ```text
    /// In, Return      → +quantity   (quantity must be > 0)
    /// Out             → -quantity   (quantity must be > 0)
    /// Transfer,
    /// Adjustment      → quantity as given (any non-zero value)
    /// ```
    pub fn signed_effect(&self, quantity: i64) -> ValidationResult<i64> {
        if quantity == 0 {
            return Err(ValidationError::MustNotBeZero {
                field: "quantity".to_string(),
            });
        }

        if quantity.unsigned_abs() > MAX_MOVEMENT_QUANTITY.unsigned_abs() {
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: -MAX_MOVEMENT_QUANTITY,
                max: MAX_MOVEMENT_QUANTITY,
            });
        }

        match self {
            MovementType::In | MovementType::Return | MovementType::Out if quantity < 0 => {
                Err(ValidationError::MustBePositive {
                    field: format!("{} quantity", self.as_str()),
                })
            }
            MovementType::In | MovementType::Return => Ok(quantity),
            MovementType::Out => Ok(-quantity),
            MovementType::Transfer | MovementType::Adjustment => Ok(quantity),
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Reference Type
// =============================================================================

/// The business event that caused a movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    Sale,
    Purchase,
    Transfer,
    Adjustment,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::Sale => "sale",
            ReferenceType::Purchase => "purchase",
            ReferenceType::Transfer => "transfer",
            ReferenceType::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Back-link from a movement to its cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementReference {
    pub reference_type: ReferenceType,
    pub reference_id: Option<String>,
}

impl MovementReference {
    pub fn new(reference_type: ReferenceType, reference_id: impl Into<String>) -> Self {
        MovementReference {
            reference_type,
            reference_id: Some(reference_id.into()),
        }
    }
}

// =============================================================================
// Stock Movement
// =============================================================================

/// An immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub location_id: Option<String>,
    pub movement_type: MovementType,
    /// Signed effect on the location's quantity. Never zero.
    pub quantity: i64,
    pub reference_type: Option<ReferenceType>,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
    pub actor_id: String,
    pub created_at: DateTime<Utc>,
}

/// Input for recording a movement.
///
/// ## Example
/// ```rust
/// use depot_core::{MovementType, NewMovement, ReferenceType};
///
/// let movement = NewMovement::new("prod-1", MovementType::In, 24, "user-7")
///     .at_location("loc-a")
///     .with_reference(ReferenceType::Purchase, "po-1001");
/// assert_eq!(movement.location_id.as_deref(), Some("loc-a"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovement {
    pub product_id: String,
    pub variant_id: Option<String>,
    /// `None` means the default location.
    pub location_id: Option<String>,
    pub movement_type: MovementType,
    /// Magnitude for in/out/return, signed effect for transfer/adjustment.
    pub quantity: i64,
    pub reference: Option<MovementReference>,
    pub notes: Option<String>,
    pub actor_id: String,
}

impl NewMovement {
    pub fn new(
        product_id: impl Into<String>,
        movement_type: MovementType,
        quantity: i64,
        actor_id: impl Into<String>,
    ) -> Self {
        NewMovement {
            product_id: product_id.into(),
            variant_id: None,
            location_id: None,
            movement_type,
            quantity,
            reference: None,
            notes: None,
            actor_id: actor_id.into(),
        }
    }

    pub fn at_location(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = Some(location_id.into());
        self
    }

    pub fn for_variant(mut self, variant_id: Option<String>) -> Self {
        self.variant_id = variant_id;
        self
    }

    pub fn with_reference(
        mut self,
        reference_type: ReferenceType,
        reference_id: impl Into<String>,
    ) -> Self {
        self.reference = Some(MovementReference::new(reference_type, reference_id));
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Filters for querying the ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovementFilter {
    pub product_id: Option<String>,
    pub variant_id: Option<String>,
    pub location_id: Option<String>,
    pub movement_type: Option<MovementType>,
    pub reference_type: Option<ReferenceType>,
    pub reference_id: Option<String>,
    /// Inclusive lower bound on `created_at`.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub to: Option<DateTime<Utc>>,
}

// =============================================================================
// Transfer Status
// =============================================================================

/// Lifecycle state of a stock transfer.
///
/// ```text
/// Pending ──approve──► InTransit ──receive──► Received
///    │
///    └──cancel──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    InTransit,
    Received,
    Cancelled,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::InTransit => "in_transit",
            TransferStatus::Received => "received",
            TransferStatus::Cancelled => "cancelled",
        }
    }

    /// Received and Cancelled transfers are immutable.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Received | TransferStatus::Cancelled)
    }
}

impl Default for TransferStatus {
    fn default() -> Self {
        TransferStatus::Pending
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Stock Transfer
// =============================================================================

/// A request to move stock between two locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockTransfer {
    pub id: String,
    pub from_location_id: String,
    pub to_location_id: String,
    /// Human-readable, unique: `TRF-20260131-0001`.
    pub transfer_number: String,
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

/// A line of a transfer.
///
/// Quantities only shrink as the transfer advances:
/// `received ≤ approved ≤ requested`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockTransferItem {
    pub id: String,
    pub transfer_id: String,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub requested_quantity: i64,
    pub approved_quantity: Option<i64>,
    pub received_quantity: Option<i64>,
}

impl StockTransferItem {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id.clone(), self.variant_id.clone())
    }

    /// The quantity cleared for shipping (falls back to the request).
    #[inline]
    pub fn shippable_quantity(&self) -> i64 {
        self.approved_quantity.unwrap_or(self.requested_quantity)
    }
}

/// A transfer header together with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferDetail {
    pub transfer: StockTransfer,
    pub items: Vec<StockTransferItem>,
}

/// Input for creating a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransfer {
    pub from_location_id: String,
    pub to_location_id: String,
    pub items: Vec<NewTransferItem>,
    pub requested_by: String,
    pub notes: Option<String>,
}

/// One requested line of a new transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransferItem {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub requested_quantity: i64,
}

impl NewTransferItem {
    pub fn new(product_id: impl Into<String>, requested_quantity: i64) -> Self {
        NewTransferItem {
            product_id: product_id.into(),
            variant_id: None,
            requested_quantity,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id.clone(), self.variant_id.clone())
    }
}

/// A per-item quantity override for approve or receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuantity {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub quantity: i64,
}

impl ItemQuantity {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        ItemQuantity {
            product_id: product_id.into(),
            variant_id: None,
            quantity,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id.clone(), self.variant_id.clone())
    }
}

/// Filters for listing transfers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferFilter {
    pub status: Option<TransferStatus>,
    /// Matches transfers where this location is either side.
    pub location_id: Option<String>,
    pub from_location_id: Option<String>,
    pub to_location_id: Option<String>,
    pub requested_by: Option<String>,
    /// Inclusive lower bound on `request_date`.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `request_date`.
    pub to: Option<DateTime<Utc>>,
}

// =============================================================================
// Pagination
// =============================================================================

/// Limit/offset window for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Pagination {
    pub fn new(limit: u32, offset: u32) -> Self {
        Pagination { limit, offset }
    }

    /// Clamps the limit into `1..=MAX_PAGE_SIZE`.
    pub fn normalized(self) -> Self {
        Pagination {
            limit: self.limit.clamp(1, MAX_PAGE_SIZE),
            offset: self.offset,
        }
    }

    /// The window immediately after this one.
    pub fn next(self) -> Self {
        Pagination {
            limit: self.limit,
            offset: self.offset.saturating_add(self.limit),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

/// One page of results plus the total match count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: u32,
    pub offset: u32,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        (self.offset as i64) + (self.items.len() as i64) < self.total
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_effect_directional_types() {
        assert_eq!(MovementType::In.signed_effect(10).unwrap(), 10);
        assert_eq!(MovementType::Return.signed_effect(2).unwrap(), 2);
        assert_eq!(MovementType::Out.signed_effect(4).unwrap(), -4);

        assert!(MovementType::In.signed_effect(-3).is_err());
        assert!(MovementType::Out.signed_effect(-3).is_err());
    }

    #[test]
    fn test_signed_effect_explicit_types() {
        assert_eq!(MovementType::Adjustment.signed_effect(-7).unwrap(), -7);
        assert_eq!(MovementType::Transfer.signed_effect(7).unwrap(), 7);
    }

    #[test]
    fn test_signed_effect_rejects_zero_and_huge() {
        assert_eq!(
            MovementType::Adjustment.signed_effect(0),
            Err(ValidationError::MustNotBeZero {
                field: "quantity".to_string()
            })
        );
        assert!(MovementType::In
            .signed_effect(MAX_MOVEMENT_QUANTITY + 1)
            .is_err());
    }

    #[test]
    fn test_signed_effect_extreme_values_are_out_of_range() {
        for quantity in [i64::MIN, i64::MAX, -MAX_MOVEMENT_QUANTITY - 1] {
            assert!(matches!(
                MovementType::Adjustment.signed_effect(quantity),
                Err(ValidationError::OutOfRange { .. })
            ));
        }
        assert!(matches!(
            MovementType::Out.signed_effect(i64::MIN),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert_eq!(
            MovementType::Adjustment.signed_effect(-MAX_MOVEMENT_QUANTITY),
            Ok(-MAX_MOVEMENT_QUANTITY)
        );
    }

    #[test]
    fn test_enum_serialization() {
        assert_eq!(
            serde_json::to_string(&TransferStatus::InTransit).unwrap(),
            "\"in_transit\""
        );
        assert_eq!(
            serde_json::to_string(&MovementType::Return).unwrap(),
            "\"return\""
        );
    }

    #[test]
    fn test_location_stock_available() {
        let stock = LocationStock {
            location_id: "a".to_string(),
            product_id: "p".to_string(),
            variant_id: None,
            quantity: 10,
            reserved_quantity: 3,
            min_stock: 10,
            max_stock: None,
            last_updated: Utc::now(),
        };
        assert_eq!(stock.available(), 7);
        assert!(stock.is_low_stock());
    }

    #[test]
    fn test_stock_key_display() {
        assert_eq!(StockKey::new("p1", None).to_string(), "p1");
        assert_eq!(
            StockKey::new("p1", Some("v2".to_string())).to_string(),
            "p1/v2"
        );
    }

    #[test]
    fn test_pagination() {
        let page = Pagination::new(0, 0).normalized();
        assert_eq!(page.limit, 1);
        let page = Pagination::new(10_000, 5).normalized();
        assert_eq!(page.limit, crate::MAX_PAGE_SIZE);
        assert_eq!(Pagination::new(20, 40).next().offset, 60);
    }

    #[test]
    fn test_page_has_more() {
        let page = Page {
            items: vec![1, 2],
            total: 5,
            limit: 2,
            offset: 2,
        };
        assert!(page.has_more());

        let last = Page {
            items: vec![5],
            total: 5,
            limit: 2,
            offset: 4,
        };
        assert!(!last.has_more());
    }
}
