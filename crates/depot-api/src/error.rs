//! # API Error Type
//!
//! Unified error type and result envelope for depot commands.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Depot                                  │
//! │                                                                         │
//! │  Command Function                                                       │
//! │  Result<T, ApiError>                                                    │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  DbError::InsufficientStock ──────────► INSUFFICIENT_STOCK             │
//! │  DbError::InvalidState      ──────────► INVALID_STATE                  │
//! │  DbError::QueryFailed(..)   ─ logged ─► DATABASE_ERROR (generic text)  │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ApiResponse { success, data?, error? }                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Infrastructure details are logged with `tracing::error!` and never
//! returned to the caller.

use serde::Serialize;
use tracing::error;

use depot_core::{CoreError, ValidationError};
use depot_db::DbError;

/// Error returned from depot commands.
///
/// ## Serialization
/// ```json
/// {
///   "code": "INVALID_STATE",
///   "message": "Transfer 9f1c... is received, cannot receive"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed input or violated business rule (400)
    ValidationError,

    /// Unknown product, variant, location or transfer (404)
    NotFound,

    /// Transition attempted from the wrong state (409)
    InvalidState,

    /// Stock would go negative where the location forbids it (422)
    InsufficientStock,

    /// Lock or snapshot conflict; the caller may retry (409)
    ConcurrencyConflict,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal error (500)
    Internal,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            err @ DbError::InvalidState { .. } => {
                ApiError::new(ErrorCode::InvalidState, err.to_string())
            }
            err @ DbError::InsufficientStock { .. } => {
                ApiError::new(ErrorCode::InsufficientStock, err.to_string())
            }
            DbError::Validation(e) => ApiError::from(e),
            DbError::ConcurrencyConflict(e) => {
                tracing::warn!("Concurrency conflict: {}", e);
                ApiError::new(
                    ErrorCode::ConcurrencyConflict,
                    "The record was modified concurrently, please retry",
                )
            }
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::ValidationError,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { message } => {
                error!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::ValidationError, "Invalid reference")
            }
            DbError::ConnectionFailed(e) => {
                error!("Database connection failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                error!("Database migration failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                error!("Transaction failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database transaction failed")
            }
            DbError::PoolExhausted => {
                error!("Database pool exhausted");
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Internal(e) => {
                error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::Internal, "Internal error")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            err @ CoreError::InvalidState { .. } => {
                ApiError::new(ErrorCode::InvalidState, err.to_string())
            }
            err @ CoreError::InsufficientStock { .. } => {
                ApiError::new(ErrorCode::InsufficientStock, err.to_string())
            }
            CoreError::Validation(e) => ApiError::from(e),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// =============================================================================
// Result Envelope
// =============================================================================

/// Uniform result wrapper returned by every command.
///
/// ```json
/// { "success": true, "data": { ... } }
/// { "success": false, "error": { "code": "NOT_FOUND", "message": "..." } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: ApiError) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error),
        }
    }

    /// Converts back into a `Result` for Rust callers.
    pub fn into_result(self) -> Result<T, ApiError> {
        match (self.data, self.error) {
            (Some(data), None) => Ok(data),
            (_, Some(error)) => Err(error),
            (None, None) => Err(ApiError::internal("Response carried neither data nor error")),
        }
    }
}

impl<T, E: Into<ApiError>> From<Result<T, E>> for ApiResponse<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => ApiResponse::ok(data),
            Err(e) => ApiResponse::err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_success_shape() {
        let response = ApiResponse::ok(vec![1, 2]);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "success": true, "data": [1, 2] })
        );
    }

    #[test]
    fn test_envelope_error_shape() {
        let response: ApiResponse<()> = ApiResponse::err(ApiError::not_found("Transfer", "t-1"));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "success": false,
                "error": { "code": "NOT_FOUND", "message": "Transfer not found: t-1" }
            })
        );
    }

    #[test]
    fn test_db_error_codes() {
        let cases = [
            (DbError::not_found("Location", "x"), ErrorCode::NotFound),
            (
                DbError::InvalidState {
                    entity: "Transfer".into(),
                    id: "t".into(),
                    current: "received".into(),
                    action: "receive".into(),
                },
                ErrorCode::InvalidState,
            ),
            (
                DbError::InsufficientStock {
                    location_id: "a".into(),
                    product_id: "p".into(),
                    variant_id: None,
                    available: 1,
                    requested: 2,
                },
                ErrorCode::InsufficientStock,
            ),
            (
                DbError::ConcurrencyConflict("database is locked".into()),
                ErrorCode::ConcurrencyConflict,
            ),
            (
                DbError::Validation(ValidationError::Required { field: "items".into() }),
                ErrorCode::ValidationError,
            ),
            (DbError::duplicate("code", "WH"), ErrorCode::ValidationError),
            (DbError::QueryFailed("syntax error".into()), ErrorCode::DatabaseError),
        ];

        for (err, code) in cases {
            assert_eq!(ApiError::from(err).code, code);
        }
    }

    #[test]
    fn test_infrastructure_details_hidden() {
        let err = ApiError::from(DbError::QueryFailed("no such table: secrets".into()));
        assert!(!err.message.contains("secrets"));
    }

    #[test]
    fn test_from_result() {
        let ok: ApiResponse<i32> = Ok::<_, DbError>(3).into();
        assert!(ok.success);
        assert_eq!(ok.into_result().unwrap(), 3);

        let failed: ApiResponse<i32> = Err(DbError::not_found("Product", "p")).into();
        assert!(!failed.success);
        assert_eq!(failed.into_result().unwrap_err().code, ErrorCode::NotFound);
    }
}
