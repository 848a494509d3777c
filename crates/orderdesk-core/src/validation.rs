//! # Validation Module
//!
//! Input validation utilities for OrderDesk.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request layer (outside this workspace)                       │
//! │  ├── Deserialization, required fields                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Coordinator entry (Rust)                                     │
//! │  └── THIS MODULE: checked before any transaction is opened             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (PostgreSQL)                                        │
//! │  ├── CHECK (quantity >= 0), CHECK (quantity > 0)                       │
//! │  ├── UNIQUE (location_id, product_id), UNIQUE receipt_number           │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::{MAX_ITEM_QUANTITY, MAX_ORDER_LINES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an external identifier such as a location code or barcode.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 100 characters
/// - No inner whitespace
///
/// ## Returns
/// The trimmed value.
fn validate_code(field: &str, value: &str) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > 100 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 100,
        });
    }

    if value.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }

    Ok(value.to_string())
}

/// Validates a location code.
///
/// ## Example
/// ```rust
/// use orderdesk_core::validation::validate_location_code;
///
/// assert_eq!(validate_location_code(" POS1 ").unwrap(), "POS1");
/// assert!(validate_location_code("").is_err());
/// ```
pub fn validate_location_code(code: &str) -> ValidationResult<String> {
    validate_code("location_code", code)
}

/// Validates a product barcode.
///
/// ## Example
/// ```rust
/// use orderdesk_core::validation::validate_barcode;
///
/// assert!(validate_barcode("4600000000017").is_ok());
/// assert!(validate_barcode("46 00").is_err());
/// ```
pub fn validate_barcode(barcode: &str) -> ValidationResult<String> {
    validate_code("barcode", barcode)
}

/// Validates an order id.
pub fn validate_order_id(id: &str) -> ValidationResult<String> {
    validate_code("order_id", id)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free items)
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of lines in an order request.
///
/// ## Rules
/// - At least one line
/// - Must not exceed MAX_ORDER_LINES (100)
pub fn validate_line_count(lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if lines > MAX_ORDER_LINES {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_ORDER_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_codes() {
        assert_eq!(validate_location_code("POS1").unwrap(), "POS1");
        assert_eq!(validate_barcode("  4600000000017\n").unwrap(), "4600000000017");

        assert!(matches!(
            validate_location_code("   "),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_barcode("12 34"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(matches!(
            validate_barcode(&"9".repeat(101)),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_price_cents() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(1099).is_ok());
        assert!(validate_price_cents(-100).is_err());
    }

    #[test]
    fn test_validate_line_count() {
        assert!(validate_line_count(1).is_ok());
        assert!(validate_line_count(MAX_ORDER_LINES).is_ok());
        assert!(validate_line_count(0).is_err());
        assert!(validate_line_count(MAX_ORDER_LINES + 1).is_err());
    }
}
