//! # Validation Module
//!
//! Input validation for Depot operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (out of scope)                                        │
//! │  └── Form checks, immediate feedback                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Ids, actors, quantities                                           │
//! │  └── Transfer request shape (locations differ, no duplicate lines)     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: depot-db                                                     │
//! │  ├── Existence checks (products, variants, locations)                  │
//! │  ├── Negative-stock guard                                              │
//! │  └── CHECK / UNIQUE / FOREIGN KEY constraints                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::types::{NewLocation, NewMovement, NewProduct, NewTransfer, NewVariant};
use crate::{MAX_MOVEMENT_QUANTITY, MAX_TRANSFER_ITEMS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_ID_LEN: usize = 64;
const MAX_NOTES_LEN: usize = 1000;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an entity id or actor id.
///
/// ## Rules
/// - Must not be empty or whitespace
/// - At most 64 characters
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if id.len() > MAX_ID_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_ID_LEN,
        });
    }

    Ok(())
}

/// Validates an optional id (variant ids).
pub fn validate_optional_id(field: &str, id: Option<&str>) -> ValidationResult<()> {
    match id {
        Some(id) => validate_id(field, id),
        None => Ok(()),
    }
}

/// Validates free-form notes.
pub fn validate_notes(notes: Option<&str>) -> ValidationResult<()> {
    if let Some(notes) = notes {
        if notes.len() > MAX_NOTES_LEN {
            return Err(ValidationError::TooLong {
                field: "notes".to_string(),
                max: MAX_NOTES_LEN,
            });
        }
    }

    Ok(())
}

/// Validates a SKU or location code.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, numbers, hyphens and underscores only
///
/// ## Example
/// ```rust
/// use depot_core::validation::validate_code;
///
/// assert!(validate_code("sku", "COKE-330").is_ok());
/// assert!(validate_code("sku", "").is_err());
/// assert!(validate_code("code", "WH 01").is_err());
/// ```
pub fn validate_code(field: &str, code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if code.len() > 50 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 50,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (product, variant or location).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity that must be strictly positive.
pub fn validate_positive_quantity(field: &str, qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    if qty > MAX_MOVEMENT_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_MOVEMENT_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a signed stock delta (adjustments).
pub fn validate_delta(delta: i64) -> ValidationResult<()> {
    if delta == 0 {
        return Err(ValidationError::MustNotBeZero {
            field: "delta".to_string(),
        });
    }

    if delta.unsigned_abs() > MAX_MOVEMENT_QUANTITY.unsigned_abs() {
        return Err(ValidationError::OutOfRange {
            field: "delta".to_string(),
            min: -MAX_MOVEMENT_QUANTITY,
            max: MAX_MOVEMENT_QUANTITY,
        });
    }

    Ok(())
}

/// Validates reorder thresholds.
///
/// ## Rules
/// - `min_stock >= 0`
/// - `max_stock >= min_stock` when present
pub fn validate_thresholds(min_stock: i64, max_stock: Option<i64>) -> ValidationResult<()> {
    if min_stock < 0 {
        return Err(ValidationError::OutOfRange {
            field: "min_stock".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    if let Some(max) = max_stock {
        if max < min_stock {
            return Err(ValidationError::OutOfRange {
                field: "max_stock".to_string(),
                min: min_stock,
                max: i64::MAX,
            });
        }
    }

    Ok(())
}

// =============================================================================
// Request Validators
// =============================================================================

/// Validates a location registration.
pub fn validate_new_location(location: &NewLocation) -> ValidationResult<()> {
    validate_code("code", &location.code)?;
    validate_name("name", &location.name)
}

/// Validates a product registration.
pub fn validate_new_product(product: &NewProduct) -> ValidationResult<()> {
    validate_code("sku", &product.sku)?;
    validate_name("name", &product.name)
}

/// Validates a variant registration.
pub fn validate_new_variant(variant: &NewVariant) -> ValidationResult<()> {
    validate_id("product_id", &variant.product_id)?;
    validate_code("sku", &variant.sku)?;
    validate_name("name", &variant.name)
}

/// Validates the shape of a movement before it reaches the ledger.
///
/// Returns the signed effect the movement will have on stock.
pub fn validate_new_movement(movement: &NewMovement) -> ValidationResult<i64> {
    validate_id("product_id", &movement.product_id)?;
    validate_optional_id("variant_id", movement.variant_id.as_deref())?;
    validate_optional_id("location_id", movement.location_id.as_deref())?;
    validate_id("actor_id", &movement.actor_id)?;
    validate_notes(movement.notes.as_deref())?;

    if let Some(reference) = &movement.reference {
        validate_optional_id("reference_id", reference.reference_id.as_deref())?;
    }

    movement.movement_type.signed_effect(movement.quantity)
}

/// Validates a transfer request.
///
/// ## Rules
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  create_transfer(A → B, items)                                          │
/// │       │                                                                 │
/// │       ├── A == B?                  → Rule("to_location_id")             │
/// │       ├── items empty?             → Required("items")                  │
/// │       ├── too many items?          → OutOfRange("items")                │
/// │       ├── requested_quantity <= 0? → MustBePositive                     │
/// │       ├── same (product, variant)  → Duplicate("item")                  │
/// │       │   listed twice?                                                 │
/// │       └── OK → existence checks in depot-db                             │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_new_transfer(request: &NewTransfer) -> ValidationResult<()> {
    validate_id("from_location_id", &request.from_location_id)?;
    validate_id("to_location_id", &request.to_location_id)?;
    validate_id("requested_by", &request.requested_by)?;
    validate_notes(request.notes.as_deref())?;

    if request.from_location_id == request.to_location_id {
        return Err(ValidationError::rule(
            "to_location_id",
            "source and destination locations must differ",
        ));
    }

    if request.items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if request.items.len() > MAX_TRANSFER_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_TRANSFER_ITEMS as i64,
        });
    }

    let mut seen = HashSet::with_capacity(request.items.len());
    for item in &request.items {
        validate_id("product_id", &item.product_id)?;
        validate_optional_id("variant_id", item.variant_id.as_deref())?;
        validate_positive_quantity("requested_quantity", item.requested_quantity)?;

        let key = item.key();
        if !seen.insert(key.clone()) {
            return Err(ValidationError::Duplicate {
                field: "item".to_string(),
                value: key.to_string(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MovementType, NewTransferItem};

    #[test]
    fn test_delta_bounds() {
        assert!(validate_delta(-MAX_MOVEMENT_QUANTITY).is_ok());
        assert!(matches!(validate_delta(i64::MIN), Err(ValidationError::OutOfRange { .. })));
        assert!(matches!(validate_delta(i64::MAX), Err(ValidationError::OutOfRange { .. })));
        assert!(matches!(validate_delta(0), Err(ValidationError::MustNotBeZero { .. })));
    }

    fn transfer(items: Vec<NewTransferItem>) -> NewTransfer {
        NewTransfer {
            from_location_id: "loc-a".to_string(),
            to_location_id: "loc-b".to_string(),
            items,
            requested_by: "user-1".to_string(),
            notes: None,
        }
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("id", "abc").is_ok());
        assert!(validate_id("id", "").is_err());
        assert!(validate_id("id", "   ").is_err());
        assert!(validate_id("id", &"x".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_code() {
        assert!(validate_code("sku", "COKE-330").is_ok());
        assert!(validate_code("sku", "product_1").is_ok());
        assert!(validate_code("sku", "has space").is_err());
        assert!(validate_code("sku", &"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_thresholds() {
        assert!(validate_thresholds(0, None).is_ok());
        assert!(validate_thresholds(5, Some(5)).is_ok());
        assert!(validate_thresholds(-1, None).is_err());
        assert!(validate_thresholds(10, Some(4)).is_err());
    }

    #[test]
    fn test_validate_delta() {
        assert!(validate_delta(-3).is_ok());
        assert!(validate_delta(0).is_err());
    }

    #[test]
    fn test_valid_transfer() {
        let request = transfer(vec![
            NewTransferItem::new("p1", 10),
            NewTransferItem {
                product_id: "p1".to_string(),
                variant_id: Some("v1".to_string()),
                requested_quantity: 2,
            },
        ]);
        assert!(validate_new_transfer(&request).is_ok());
    }

    #[test]
    fn test_transfer_same_location_rejected() {
        let mut request = transfer(vec![NewTransferItem::new("p1", 10)]);
        request.to_location_id = "loc-a".to_string();
        let err = validate_new_transfer(&request).unwrap_err();
        assert!(matches!(err, ValidationError::Rule { .. }));
    }

    #[test]
    fn test_transfer_empty_items_rejected() {
        let err = validate_new_transfer(&transfer(vec![])).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Required {
                field: "items".to_string()
            }
        );
    }

    #[test]
    fn test_transfer_duplicate_items_rejected() {
        let request = transfer(vec![
            NewTransferItem::new("p1", 10),
            NewTransferItem::new("p1", 3),
        ]);
        let err = validate_new_transfer(&request).unwrap_err();
        assert!(matches!(err, ValidationError::Duplicate { .. }));
    }

    #[test]
    fn test_transfer_non_positive_quantity_rejected() {
        let request = transfer(vec![NewTransferItem::new("p1", 0)]);
        assert!(validate_new_transfer(&request).is_err());
    }

    #[test]
    fn test_validate_new_movement_returns_effect() {
        let movement = NewMovement::new("p1", MovementType::Out, 3, "user-1");
        assert_eq!(validate_new_movement(&movement).unwrap(), -3);

        let anonymous = NewMovement::new("p1", MovementType::In, 3, "");
        assert!(validate_new_movement(&anonymous).is_err());
    }
}
