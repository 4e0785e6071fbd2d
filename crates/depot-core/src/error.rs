//! # Error Types
//!
//! Domain-specific error types for depot-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  depot-core errors (this file)                                         │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  depot-db errors (separate crate)                                      │
//! │  └── DbError          - Storage failures + CoreError                   │
//! │                                                                         │
//! │  depot-api errors                                                      │
//! │  └── ApiError         - What callers see (code + message)              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Caller       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced entity does not exist.
    ///
    /// ## When This Occurs
    /// - Unknown product, variant or location id
    /// - Unknown transfer id
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A transition was attempted from a state that does not permit it.
    ///
    /// ## When This Occurs
    /// - Approving a transfer that is already in transit
    /// - Receiving a transfer twice
    /// - Cancelling a transfer that has shipped
    #[error("{entity} {id} is {current}, cannot {action}")]
    InvalidState {
        entity: String,
        id: String,
        current: String,
        action: String,
    },

    /// The adjustment would take a location below zero.
    ///
    /// ## When This Occurs
    /// ```text
    /// Location A holds 3 × COKE-330, allow_negative_stock = false
    ///      │
    ///      ▼
    /// out movement of 5
    ///      │
    ///      ▼
    /// InsufficientStock { available: 3, requested: 5 }
    /// ```
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

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an InvalidState error.
    pub fn invalid_state(
        entity: impl Into<String>,
        id: impl Into<String>,
        current: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        CoreError::InvalidState {
            entity: entity.into(),
            id: id.into(),
            current: current.into(),
            action: action.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before anything touches the database.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be zero.
    #[error("{field} must not be zero")]
    MustNotBeZero { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value within a single request.
    #[error("{field} '{value}' appears more than once")]
    Duplicate { field: String, value: String },

    /// A business rule rejected the input.
    #[error("{field}: {reason}")]
    Rule { field: String, reason: String },
}

impl ValidationError {
    /// Creates a Rule error.
    pub fn rule(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::Rule {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            location_id: "loc-a".to_string(),
            product_id: "prod-1".to_string(),
            variant_id: None,
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product prod-1 at location loc-a: available 3, requested 5"
        );
    }

    #[test]
    fn test_invalid_state_message() {
        let err = CoreError::invalid_state("Transfer", "t-1", "received", "receive");
        assert_eq!(err.to_string(), "Transfer t-1 is received, cannot receive");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "actor_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
