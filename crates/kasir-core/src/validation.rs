//! # Validation Module
//!
//! Input validation for cart, ledger and settlement operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI                                                            │
//! │  └── Basic format checks, immediate feedback                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: kasir-core                                                    │
//! │  └── THIS MODULE: quantities, amounts, selections, rates                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                        │
//! │  └── NOT NULL / UNIQUE / CHECK constraints                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every validator is side-effect free, so callers run them all before
//! touching state.

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::money::{Money, Rate, BPS_SCALE};
use crate::types::{Discount, DiscountKind, ModifierGroup};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name (held cart, customer).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 100 characters
///
/// ## Returns
/// The trimmed name.
pub fn validate_name(field: &str, name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 100,
        });
    }

    Ok(name.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Cart: Add Item                                                         │
/// │                                                                         │
/// │  Cashier types quantity: 5                                              │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(5) ← THIS FUNCTION                                   │
/// │       │                                                                 │
/// │       ├── qty <= 0?  → Error: "quantity must be positive"               │
/// │       ├── qty > 999? → Error: "quantity must be between 1 and 999"      │
/// │       └── OK → proceed                                                  │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
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

/// Validates a payment amount. Zero and negative payments are rejected.
pub fn validate_payment_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a rate in basis points (0% to 100%).
pub fn validate_rate(field: &str, rate: Rate) -> ValidationResult<()> {
    if !rate.is_valid_percentage() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: BPS_SCALE as i64,
        });
    }

    Ok(())
}

/// Validates a discount before it reaches the pricing engine, which
/// assumes non-negative values.
pub fn validate_discount(discount: &Discount) -> ValidationResult<()> {
    match discount.kind {
        DiscountKind::Percentage(rate) => validate_rate("discount", rate),
        DiscountKind::Amount(value) if value.is_negative() => {
            Err(ValidationError::MustNotBeNegative {
                field: "discount".to_string(),
            })
        }
        DiscountKind::Amount(_) => Ok(()),
    }
}

/// Validates a manual stock delta.
pub fn validate_stock_delta(delta: i64) -> ValidationResult<()> {
    if delta == 0 {
        return Err(ValidationError::MustNotBeZero {
            field: "stock delta".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates cart size before adding a new line.
///
/// ## Rules
/// - Must not exceed MAX_CART_ITEMS (100)
pub fn validate_cart_size(current_lines: usize) -> ValidationResult<()> {
    if current_lines >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart lines".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

/// Validates modifier selections against every group of a product.
///
/// `selected` holds `(group_id, option_id)` pairs. Each group must receive
/// between `min_selection` and `max_selection` options, and every pair must
/// name a real group and option.
pub fn validate_modifier_selection(
    groups: &[ModifierGroup],
    selected: &[(String, String)],
) -> ValidationResult<()> {
    let mut seen = HashSet::new();
    for (group_id, option_id) in selected {
        let group = groups
            .iter()
            .find(|g| &g.id == group_id)
            .ok_or_else(|| ValidationError::UnknownOption {
                field: "modifier group".to_string(),
                value: group_id.clone(),
            })?;
        if !group.options.iter().any(|o| &o.id == option_id) {
            return Err(ValidationError::UnknownOption {
                field: "modifier option".to_string(),
                value: option_id.clone(),
            });
        }
        if !seen.insert((group_id, option_id)) {
            return Err(ValidationError::UnknownOption {
                field: "duplicate modifier option".to_string(),
                value: option_id.clone(),
            });
        }
    }

    for group in groups {
        let got = selected.iter().filter(|(g, _)| g == &group.id).count() as u32;
        if got < group.min_selection || got > group.max_selection {
            return Err(ValidationError::SelectionCount {
                group: group.name.clone(),
                min: group.min_selection,
                max: group.max_selection,
                got,
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
