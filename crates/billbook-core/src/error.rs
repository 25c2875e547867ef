//! # Error Types
//!
//! Domain-specific error types for billbook-core.
//!
//! `ValidationError` covers malformed input and converts into `CoreError`,
//! which covers ledger and catalog rule failures. The storage crate wraps
//! both in its own `DbError`.
//!
//! ## Retry Policy
//! None of these errors are retried. `InsufficientStock` is a business
//! outcome the caller can act on (partial fulfilment, backorder).
//! `InvariantViolation` means a bug or corrupted ledger data and must never be
//! silently corrected.

use thiserror::Error;

use crate::quantity::Quantity;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// A referenced product code does not exist in the organisation.
    #[error("Product not found: {product_code}")]
    ProductNotFound { product_code: String },

    /// Purchase lots ran out before the requested quantity was satisfied.
    ///
    /// ## User Workflow
    /// ```text
    /// Commit sale (RICE × 12)
    ///      │
    ///      ▼
    /// Lots for RICE: 5 + 5 remaining
    ///      │
    ///      ▼
    /// InsufficientStock { product_code: "RICE", short_by: 2 }
    ///      │
    ///      ▼
    /// Nothing is consumed; caller offers partial fulfilment
    /// ```
    #[error("Insufficient stock for {product_code}: short by {short_by}")]
    InsufficientStock {
        product_code: String,
        short_by: Quantity,
    },

    /// A ledger rule that must always hold was broken.
    ///
    /// ## When This Occurs
    /// - Releasing more into a lot than it originally received
    /// - Lot sums disagree with recorded sale consumptions
    #[error("Ledger invariant violated: {detail}")]
    InvariantViolation { detail: String },

    /// A purchase lot id is unknown to the ledger.
    #[error("Purchase lot not found: {0}")]
    LotNotFound(String),

    /// Sale not found.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Sale is not in a state that allows the requested operation.
    #[error("Sale {sale_id} is {current_status}, cannot perform operation")]
    InvalidSaleStatus {
        sale_id: String,
        current_status: String,
    },

    /// A commit attempt tried to move between phases out of order.
    #[error("Invalid commit transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a ProductNotFound error.
    pub fn product_not_found(product_code: impl Into<String>) -> Self {
        CoreError::ProductNotFound {
            product_code: product_code.into(),
        }
    }

    /// Creates an InvariantViolation error.
    pub fn invariant(detail: impl Into<String>) -> Self {
        CoreError::InvariantViolation {
            detail: detail.into(),
        }
    }

    /// True for failures that indicate corrupted ledger state.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, CoreError::InvariantViolation { .. })
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before any ledger work runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: String,
        min: String,
        max: String,
    },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, bad characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., duplicate unit name on a product).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
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
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product_code: "RICE-5KG".to_string(),
            short_by: Quantity::from(2),
        };
        assert_eq!(err.to_string(), "Insufficient stock for RICE-5KG: short by 2");

        let err = CoreError::product_not_found("SOAP");
        assert_eq!(err.to_string(), "Product not found: SOAP");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "code".to_string(),
        };
        assert_eq!(err.to_string(), "code is required");

        let err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must be positive");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "code".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }

    #[test]
    fn test_invariant_flag() {
        assert!(CoreError::invariant("over release").is_invariant_violation());
        assert!(!CoreError::SaleNotFound("x".into()).is_invariant_violation());
    }
}
