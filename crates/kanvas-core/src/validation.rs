//! # Validation Module
//!
//! Input validation for Kanvas operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Dashboard form                                               │
//! │  ├── packages + pcs inputs normalised to atomic units                  │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (before any transaction starts)                  │
//! │  ├── Field checks: required, lengths, non-negative amounts             │
//! │  └── Batch checks: duplicates, zero-quantity lines, batch size         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Engine (inside the transaction)                              │
//! │  ├── Stock, daily cap, outstanding units                               │
//! │  └── SQLite CHECK / FOREIGN KEY constraints                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{ManifestLineInput, OrderLineInput, ReturnLineInput};
use crate::{MAX_AMOUNT, MAX_LINES, MAX_LINE_UNITS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required free-text field (names, destinations, actor ids).
///
/// ## Rules
/// - Must not be blank
/// - At most 200 characters
///
/// ```rust
/// use kanvas_core::validation::validate_text;
///
/// assert!(validate_text("destination", "Pasar Minggu").is_ok());
/// assert!(validate_text("destination", "   ").is_err());
/// ```
pub fn validate_text(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > 200 {
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

/// Validates an atomic-unit quantity: `0..=MAX_LINE_UNITS`.
pub fn validate_units(field: &str, units: i64) -> ValidationResult<()> {
    if units < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }

    if units > MAX_LINE_UNITS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_LINE_UNITS,
        });
    }

    Ok(())
}

/// Validates a money amount in the smallest currency unit: `0..=MAX_AMOUNT`.
pub fn validate_amount(field: &str, amount: i64) -> ValidationResult<()> {
    if amount < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }

    if amount > MAX_AMOUNT {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT,
        });
    }

    Ok(())
}

fn validate_line_count(len: usize) -> ValidationResult<()> {
    if len > MAX_LINES {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 0,
            max: MAX_LINES as i64,
        });
    }

    Ok(())
}

fn ensure_unique<'a>(ids: impl Iterator<Item = &'a str>) -> CoreResult<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(CoreError::DuplicateLine {
                product_id: id.to_string(),
            });
        }
    }
    Ok(())
}

// =============================================================================
// Batch Validators
// =============================================================================

/// Validates a requested manifest.
///
/// ## Rules
/// - One line per product
/// - Every line strictly positive; a zero line must be dropped instead
pub fn validate_manifest_lines(lines: &[ManifestLineInput]) -> CoreResult<()> {
    validate_line_count(lines.len())?;
    ensure_unique(lines.iter().map(|l| l.product_id.as_str()))?;

    for line in lines {
        validate_text("product_id", &line.product_id)?;
        validate_units("total_units", line.total_units)?;
        if line.total_units == 0 {
            return Err(CoreError::LineQuantityZero {
                product_id: line.product_id.clone(),
            });
        }
    }

    Ok(())
}

/// Validates a returned-goods batch.
///
/// The same product may appear once per condition (e.g. 20 GOOD + 5 DAMAGED).
pub fn validate_return_lines(lines: &[ReturnLineInput]) -> CoreResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        }
        .into());
    }
    validate_line_count(lines.len())?;

    let mut seen = HashSet::new();
    for line in lines {
        validate_text("product_id", &line.product_id)?;
        validate_units("returned_units", line.returned_units)?;
        if line.returned_units == 0 {
            return Err(CoreError::LineQuantityZero {
                product_id: line.product_id.clone(),
            });
        }
        if !seen.insert((line.product_id.as_str(), line.condition)) {
            return Err(CoreError::DuplicateLine {
                product_id: line.product_id.clone(),
            });
        }
    }

    Ok(())
}

/// Validates order lines for a pending (cart) order.
///
/// Zero quantities are tolerated while the order is still being edited.
pub fn validate_order_lines(lines: &[OrderLineInput]) -> CoreResult<()> {
    validate_line_count(lines.len())?;
    ensure_unique(lines.iter().map(|l| l.product_id.as_str()))?;

    for line in lines {
        validate_text("product_id", &line.product_id)?;
        validate_units("quantity_units", line.quantity_units)?;
        validate_amount("unit_package_price", line.unit_package_price)?;
        validate_amount("discount_per_package", line.discount_per_package)?;
    }

    Ok(())
}

/// Validates the final lines submitted for approval.
///
/// ## Rules
/// - Everything [`validate_order_lines`] checks
/// - At least one line
/// - No zero-quantity line
pub fn validate_final_order_lines(lines: &[OrderLineInput]) -> CoreResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        }
        .into());
    }

    validate_order_lines(lines)?;

    if let Some(zero) = lines.iter().find(|l| l.quantity_units == 0) {
        return Err(CoreError::LineQuantityZero {
            product_id: zero.product_id.clone(),
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
    use crate::types::ReturnCondition;

    #[test]
    fn test_validate_text() {
        assert!(validate_text("name", "Gudang Timur").is_ok());
        assert!(validate_text("name", "").is_err());
        assert!(validate_text("name", &"A".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_units() {
        assert!(validate_units("qty", 0).is_ok());
        assert!(validate_units("qty", MAX_LINE_UNITS).is_ok());
        assert!(validate_units("qty", -1).is_err());
        assert!(validate_units("qty", MAX_LINE_UNITS + 1).is_err());
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount("price", 0).is_ok());
        assert!(validate_amount("price", MAX_AMOUNT).is_ok());
        assert!(matches!(validate_amount("price", -1), Err(ValidationError::Negative { .. })));
        assert!(matches!(
            validate_amount("price", MAX_AMOUNT + 1),
            Err(ValidationError::OutOfRange { max: MAX_AMOUNT, .. })
        ));
    }

    #[test]
    fn test_oversized_price_rejected_on_order_lines() {
        let lines = [OrderLineInput::new("p1", 12, i64::MAX)];
        assert!(matches!(
            validate_order_lines(&lines),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));

        let lines = [OrderLineInput::new("p1", 12, 10_000).with_discount(MAX_AMOUNT + 1)];
        assert!(validate_final_order_lines(&lines).is_err());
    }

    #[test]
    fn test_manifest_zero_line_rejected() {
        let lines = vec![ManifestLineInput::new("a", 10), ManifestLineInput::new("b", 0)];
        assert!(matches!(
            validate_manifest_lines(&lines).unwrap_err(),
            CoreError::LineQuantityZero { product_id } if product_id == "b"
        ));
    }

    #[test]
    fn test_manifest_duplicate_rejected() {
        let lines = vec![ManifestLineInput::new("a", 10), ManifestLineInput::new("a", 5)];
        assert!(matches!(
            validate_manifest_lines(&lines).unwrap_err(),
            CoreError::DuplicateLine { .. }
        ));
    }

    #[test]
    fn test_returns_allow_one_line_per_condition() {
        let lines = vec![
            ReturnLineInput::new("a", 20, ReturnCondition::Good),
            ReturnLineInput::new("a", 5, ReturnCondition::Damaged),
        ];
        assert!(validate_return_lines(&lines).is_ok());

        let dup = vec![
            ReturnLineInput::new("a", 20, ReturnCondition::Good),
            ReturnLineInput::new("a", 5, ReturnCondition::Good),
        ];
        assert!(validate_return_lines(&dup).is_err());
        assert!(validate_return_lines(&[]).is_err());
    }

    #[test]
    fn test_final_order_lines() {
        let ok = vec![OrderLineInput::new("a", 12, 50_000)];
        assert!(validate_final_order_lines(&ok).is_ok());

        let zero = vec![OrderLineInput::new("a", 0, 50_000)];
        assert!(validate_order_lines(&zero).is_ok());
        assert!(matches!(
            validate_final_order_lines(&zero).unwrap_err(),
            CoreError::LineQuantityZero { .. }
        ));

        let negative_price = vec![OrderLineInput::new("a", 1, -5)];
        assert!(validate_order_lines(&negative_price).is_err());
    }
}
