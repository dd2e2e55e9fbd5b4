//! # Error Types
//!
//! Domain-specific error types for kasir-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kasir-core errors (this file)                                          │
//! │  ├── ValidationError  - Input validation failures                       │
//! │  ├── LoyaltyError     - Redemption rejected                             │
//! │  ├── CoreError        - Cart / registry / ledger / settlement rules     │
//! │  └── CommitError      - Checkout rejected before any mutation           │
//! │                                                                         │
//! │  kasir-db errors (separate crate)                                       │
//! │  └── DbError          - Database operation failures                     │
//! │                                                                         │
//! │  kasir-terminal errors                                                  │
//! │  └── TerminalError    - What the UI layer sees                          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → TerminalError → UI                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (ids, amounts)
//! 3. Errors are enum variants, never String
//! 4. A returned error means nothing was mutated

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by cart, held-cart, ledger and
/// settlement operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product id is not in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Product cannot be added right now.
    ///
    /// ## User Workflow
    /// ```text
    /// Tap "Nasi Goreng"
    ///      │
    ///      ▼
    /// check_availability → ingredients depleted
    ///      │
    ///      ▼
    /// ProductUnavailable { reason: "ingredients depleted" }
    ///      │
    ///      ▼
    /// UI greys out the tile
    /// ```
    #[error("{product} is unavailable: {reason}")]
    ProductUnavailable { product: String, reason: String },

    /// Cart line id does not exist.
    #[error("Cart line not found: {0}")]
    LineNotFound(String),

    /// Reward lines are fixed at quantity 1 and carry no extra discount.
    ///
    /// ## When This Occurs
    /// - Changing the quantity of a redeemed reward
    /// - Attaching a line discount to a reward
    #[error("Reward line {0} cannot be edited")]
    RewardLineLocked(String),

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} lines")]
    CartTooLarge { max: usize },

    /// Item quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Holding an empty cart.
    #[error("Cannot hold an empty cart")]
    EmptyCart,

    /// Held cart id is unknown.
    #[error("Held cart not found: {0}")]
    HeldCartNotFound(String),

    /// Held cart was retired by a commit and cannot be re-entered.
    #[error("Held cart {0} was already committed")]
    HeldCartRetired(String),

    /// Transaction id is not in the log.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    /// Refunding twice, or paying into a refunded transaction.
    #[error("Transaction {0} is already refunded")]
    AlreadyRefunded(String),

    /// Stock adjustment against an unknown product or raw material.
    #[error("Stock target not found: {0}")]
    StockTargetNotFound(String),

    /// Discount definition is inactive or outside its validity window.
    #[error("Discount {0} is not currently valid")]
    DiscountNotActive(String),

    /// Reward id is not configured.
    #[error("Reward not found: {0}")]
    RewardNotFound(String),

    /// Customer id is unknown.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error(transparent)]
    Loyalty(#[from] LoyaltyError),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
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

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Value must not be zero.
    #[error("{field} must not be zero")]
    MustNotBeZero { field: String },

    /// Add-on, variant or modifier id does not belong to the product.
    #[error("{field} '{value}' is not offered for this product")]
    UnknownOption { field: String, value: String },

    /// Modifier group selection count outside `[min, max]`.
    #[error("{group} needs between {min} and {max} selections, got {got}")]
    SelectionCount {
        group: String,
        min: u32,
        max: u32,
        got: u32,
    },
}

// =============================================================================
// Loyalty Error
// =============================================================================

/// Redemption failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoyaltyError {
    /// Customer balance below the reward cost.
    ///
    /// ## When This Occurs
    /// - Redeeming at apply-time with a low balance
    /// - Re-validation at commit after another redemption spent the points
    #[error("Insufficient points: required {required}, available {available}")]
    InsufficientPoints { required: i64, available: i64 },

    /// A free-product reward points at a product that no longer exists.
    #[error("Reward product not found: {0}")]
    RewardProductMissing(String),

    /// Rewards can only be redeemed against a registered customer.
    #[error("A customer must be selected to redeem a reward")]
    RewardWithoutCustomer,

    /// The sale names a different customer than the one the reward was
    /// redeemed for.
    #[error("Reward was redeemed for customer {reward_customer}, not {customer}")]
    RewardCustomerMismatch {
        reward_customer: String,
        customer: String,
    },
}

// =============================================================================
// Commit Error
// =============================================================================

/// Checkout rejections. Every variant is produced during validation,
/// before the ledger, customers or the transaction log are touched.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("No operator is signed in")]
    NoOperator,

    /// Unpaid or partial sale with neither a registered customer nor a name.
    ///
    /// ## User Workflow
    /// ```text
    /// Total 55,000, paid 30,000
    ///      │
    ///      ▼
    /// status = partial → debt needs an owner
    ///      │
    ///      ▼
    /// MissingCustomerIdentity → UI asks for a name
    /// ```
    #[error("Customer name or member is required for unpaid or partial sales")]
    MissingCustomerIdentity,

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Insufficient points: required {required}, available {available}")]
    InsufficientPoints { required: i64, available: i64 },

    /// Strict stock mode and the depletion plan would go negative.
    #[error("Insufficient stock: {}", format_shortfalls(.0))]
    InsufficientStock(Vec<StockShortfall>),

    #[error("Invalid payment: {reason}")]
    InvalidPayment { reason: String },

    #[error(transparent)]
    Loyalty(LoyaltyError),
}

impl From<LoyaltyError> for CommitError {
    fn from(err: LoyaltyError) -> Self {
        match err {
            LoyaltyError::InsufficientPoints {
                required,
                available,
            } => CommitError::InsufficientPoints {
                required,
                available,
            },
            other => CommitError::Loyalty(other),
        }
    }
}

/// One stock target that a sale would drive below zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockShortfall {
    pub target_id: String,
    pub name: String,
    pub available: i64,
    pub required: i64,
}

fn format_shortfalls(items: &[StockShortfall]) -> String {
    items
        .iter()
        .map(|s| format!("{} (available {}, required {})", s.name, s.available, s.required))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Payment-related helper used by settlement.
pub(crate) fn invalid_payment(amount: Money) -> CommitError {
    CommitError::InvalidPayment {
        reason: format!("amount {amount} must be positive"),
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result of a checkout attempt.
pub type CommitResult<T> = Result<T, CommitError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::QuantityTooLarge {
            requested: 1000,
            max: 999,
        };
        assert_eq!(
            err.to_string(),
            "Quantity 1000 exceeds maximum allowed (999)"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "name".to_string(),
        };
        assert_eq!(err.to_string(), "name is required");

        let err = ValidationError::SelectionCount {
            group: "Sugar level".to_string(),
            min: 1,
            max: 1,
            got: 0,
        };
        assert_eq!(
            err.to_string(),
            "Sugar level needs between 1 and 1 selections, got 0"
        );
    }

    #[test]
    fn test_conversions() {
        let core_err: CoreError = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }
        .into();
        assert!(matches!(core_err, CoreError::Validation(_)));

        let commit_err: CommitError = LoyaltyError::InsufficientPoints {
            required: 100,
            available: 40,
        }
        .into();
        assert!(matches!(
            commit_err,
            CommitError::InsufficientPoints {
                required: 100,
                available: 40
            }
        ));
    }

    #[test]
    fn test_shortfall_message() {
        let err = CommitError::InsufficientStock(vec![StockShortfall {
            target_id: "rm-1".to_string(),
            name: "Gula".to_string(),
            available: 5,
            required: 10,
        }]);
        assert_eq!(
            err.to_string(),
            "Insufficient stock: Gula (available 5, required 10)"
        );
    }
}
