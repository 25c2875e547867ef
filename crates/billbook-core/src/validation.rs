//! # Validation Module
//!
//! Business-rule validation for inputs entering the ledger.
//!
//! Checks here are the ones a caller can fix by changing the request: blank
//! codes, zero or oversized quantities, negative discounts, tax rates outside
//! 0..=100 and oversized bills. Upper bounds on quantities, amounts and
//! conversions keep every line and bill total inside `Decimal` range. Ledger
//! rules (enough stock, matching revisions, lot bounds) live in `ledger` and
//! in the lot repository; SQLite enforces uniqueness.
//!
//! ## Usage
//! ```rust
//! use billbook_core::validation::{validate_product_code, validate_quantity};
//! use billbook_core::Quantity;
//!
//! validate_product_code("RICE-5KG").unwrap();
//! validate_quantity(Quantity::from(3)).unwrap();
//! ```

use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::money::Money;
use crate::quantity::Quantity;
use crate::types::TaxRate;
use crate::{MAX_AMOUNT, MAX_CONVERSION, MAX_QUANTITY, MAX_SALE_LINES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product code.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, numbers, hyphens, underscores and dots only
///
/// ## Example
/// ```rust
/// use billbook_core::validation::validate_product_code;
///
/// assert!(validate_product_code("SOAP.100G").is_ok());
/// assert!(validate_product_code("").is_err());
/// assert!(validate_product_code("has space").is_err());
/// ```
pub fn validate_product_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if code.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: 50,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers, hyphens, underscores and dots"
                .to_string(),
        });
    }

    Ok(())
}

/// Validates a product name (1..=200 characters).
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a unit name ("box", "kg").
pub fn validate_unit_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "unit".to_string(),
        });
    }

    if name.len() > 30 {
        return Err(ValidationError::TooLong {
            field: "unit".to_string(),
            max: 30,
        });
    }

    Ok(())
}

/// Validates that unit names on one product are distinct, ignoring case.
pub fn validate_unique_units<'a>(names: impl IntoIterator<Item = &'a str>) -> ValidationResult<()> {
    let mut seen: Vec<String> = Vec::new();
    for name in names {
        validate_unit_name(name)?;
        let key = name.trim().to_lowercase();
        if seen.contains(&key) {
            return Err(ValidationError::Duplicate {
                field: "unit".to_string(),
                value: name.trim().to_string(),
            });
        }
        seen.push(key);
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a requested quantity.
///
/// ## Rules
/// - Must be strictly positive. Fractions are allowed (0.5 kg).
/// - At most MAX_QUANTITY
pub fn validate_quantity(quantity: Quantity) -> ValidationResult<()> {
    if !quantity.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if quantity.value() > Decimal::from(MAX_QUANTITY) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: "0".to_string(),
            max: MAX_QUANTITY.to_string(),
        });
    }

    Ok(())
}

/// Validates a discount amount. Zero is allowed.
pub fn validate_discount(discount: Money) -> ValidationResult<()> {
    validate_non_negative_money("discount_amount", discount)
}

/// Validates a price-like amount (rate, mrp, cost). Zero is allowed, and
/// the upper bound is MAX_AMOUNT.
pub fn validate_non_negative_money(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    if amount.amount() > Decimal::from(MAX_AMOUNT) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: "0".to_string(),
            max: MAX_AMOUNT.to_string(),
        });
    }

    Ok(())
}

/// Validates a GST component rate.
///
/// ## Rules
/// - Between 0 and 100 percent inclusive
pub fn validate_tax_rate(field: &str, rate: TaxRate) -> ValidationResult<()> {
    let pct = rate.percentage();
    if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: "0".to_string(),
            max: "100".to_string(),
        });
    }

    Ok(())
}

/// Validates a unit conversion factor: strictly positive, at most
/// MAX_CONVERSION.
pub fn validate_conversion(conversion: Decimal) -> ValidationResult<()> {
    if conversion <= Decimal::ZERO {
        return Err(ValidationError::MustBePositive {
            field: "conversion".to_string(),
        });
    }

    if conversion > Decimal::from(MAX_CONVERSION) {
        return Err(ValidationError::OutOfRange {
            field: "conversion".to_string(),
            min: "0".to_string(),
            max: MAX_CONVERSION.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of lines in one bill.
///
/// ## Rules
/// - At least one line
/// - At most MAX_SALE_LINES
pub fn validate_line_count(lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        });
    }

    if lines > MAX_SALE_LINES {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: "1".to_string(),
            max: MAX_SALE_LINES.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates an identifier in UUID format (organisation ids, sale ids).
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
