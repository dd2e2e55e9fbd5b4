//! # Domain Types
//!
//! Core domain types used throughout Kasir.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog (read-only here)      Working order         Committed          │
//! │  ┌─────────────────┐           ┌──────────────┐      ┌──────────────┐   │
//! │  │ Product         │  copy at  │ CartItem     │ snap │ Transaction  │   │
//! │  │  recipe ────────┼──add─────►│  recipe snap ├─────►│  lines+cost  │   │
//! │  │  addons/variants│           │  discount    │      │  payments    │   │
//! │  │ RawMaterial     │           │ HeldCart     │      │  status      │   │
//! │  └─────────────────┘           └──────────────┘      └──────────────┘   │
//! │                                                                         │
//! │  Loyalty: Customer, PointRule, Reward     Audit: StockAdjustment        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every entity carries a string `id` (UUID v4 for records created here).
//! Cart lines get their own `line_id` so two lines of the same product
//! (different add-ons) stay distinct.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, Rate};

// =============================================================================
// Catalog
// =============================================================================

/// A product available for sale. Owned by the catalog; the core only reads it
/// (stock is written through the ledger).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    /// Unique identifier.
    pub id: String,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    /// Base unit price.
    pub price: Money,

    /// Purchase cost (for margin reporting).
    #[serde(default)]
    pub cost_price: Option<Money>,

    /// Category names; a product may sit in several.
    #[serde(default)]
    pub categories: Vec<String>,

    /// Simple-stock tracking for this product.
    #[serde(default)]
    pub track_stock: bool,

    /// Current stock level (absent until first counted).
    #[serde(default)]
    pub stock: Option<i64>,

    /// Components consumed per unit sold.
    #[serde(default)]
    pub recipe: Vec<RecipeItem>,

    #[serde(default)]
    pub addons: Vec<Addon>,

    #[serde(default)]
    pub variants: Vec<Variant>,

    #[serde(default)]
    pub modifier_groups: Vec<ModifierGroup>,

    /// Overrides the global tax rate for lines of this product.
    #[serde(default)]
    pub tax_rate: Option<Rate>,

    #[serde(default)]
    pub barcode: Option<String>,
}

impl Product {
    /// Stock level, treating "never counted" as zero.
    #[inline]
    pub fn stock_level(&self) -> i64 {
        self.stock.unwrap_or(0)
    }

    /// True when adding this product needs a selection step, so every add
    /// creates its own line.
    pub fn requires_selection(&self) -> bool {
        !self.addons.is_empty() || !self.variants.is_empty() || !self.modifier_groups.is_empty()
    }

    pub fn has_recipe(&self) -> bool {
        !self.recipe.is_empty()
    }
}

/// Optional extra priced on top of the unit price (e.g. "extra shot").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Addon {
    pub id: String,
    pub name: String,
    pub price: Money,
    #[serde(default)]
    pub cost: Option<Money>,
}

/// Alternative size/flavour that replaces the unit price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Variant {
    pub id: String,
    pub name: String,
    pub price: Money,
    #[serde(default)]
    pub cost: Option<Money>,
}

/// A group of options with a selection count constraint
/// (e.g. "Sugar level", exactly one).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ModifierGroup {
    pub id: String,
    pub name: String,
    pub min_selection: u32,
    pub max_selection: u32,
    pub options: Vec<ModifierOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ModifierOption {
    pub id: String,
    pub name: String,
    pub price: Money,
    #[serde(default)]
    pub cost: Option<Money>,
}

/// A component consumed per unit sold.
///
/// Quantities are integer base units (grams, millilitres, pieces).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecipeItem {
    RawMaterial { raw_material_id: String, quantity: i64 },
    /// A bundled product (e.g. a drink inside a combo).
    Product { product_id: String, quantity: i64 },
}

impl RecipeItem {
    pub fn quantity(&self) -> i64 {
        match self {
            RecipeItem::RawMaterial { quantity, .. } | RecipeItem::Product { quantity, .. } => {
                *quantity
            }
        }
    }

    /// The stock target this component draws from.
    pub fn target(&self) -> StockTarget {
        match self {
            RecipeItem::RawMaterial {
                raw_material_id, ..
            } => StockTarget::RawMaterial(raw_material_id.clone()),
            RecipeItem::Product { product_id, .. } => StockTarget::Product(product_id.clone()),
        }
    }
}

/// An ingredient. Stock is mutated only through the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RawMaterial {
    pub id: String,
    pub name: String,
    pub stock: i64,
    /// Display unit ("gram", "ml", "pcs").
    pub unit: String,
    pub cost_per_unit: Money,
}

// =============================================================================
// Discounts
// =============================================================================

/// Percentage or fixed amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DiscountKind {
    Percentage(Rate),
    Amount(Money),
}

/// An ad hoc discount attached to one line or to the whole cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Discount {
    pub kind: DiscountKind,
    #[serde(default)]
    pub name: Option<String>,
    /// Set when created from a [`DiscountDefinition`].
    #[serde(default)]
    pub definition_id: Option<String>,
}

impl Discount {
    pub fn percentage(rate: Rate) -> Self {
        Discount {
            kind: DiscountKind::Percentage(rate),
            name: None,
            definition_id: None,
        }
    }

    pub fn amount(value: Money) -> Self {
        Discount {
            kind: DiscountKind::Amount(value),
            name: None,
            definition_id: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A named, schedulable discount template owned by settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountDefinition {
    pub id: String,
    pub name: String,
    pub kind: DiscountKind,
    #[ts(as = "Option<String>")]
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl DiscountDefinition {
    /// True when active and `now` lies inside the validity window.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.valid_from.map_or(true, |from| now >= from)
            && self.valid_until.map_or(true, |until| now <= until)
    }
}

// =============================================================================
// Cart Lines
// =============================================================================

/// One chosen modifier option, remembered with its group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SelectedModifier {
    pub group_id: String,
    pub group_name: String,
    pub option: ModifierOption,
}

/// A line in the working order.
///
/// Pricing fields are copied from the product at add-time; later catalog
/// edits do not reprice a line already in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartItem {
    /// Identity of this line within the cart.
    pub line_id: String,

    /// Catalog product; `None` for discount-reward lines.
    pub product_id: Option<String>,

    pub name: String,

    /// Unit price (variant price when a variant was picked). Negative for
    /// discount rewards.
    pub unit_price: Money,

    /// Cost captured at add-time (variant cost or product cost).
    pub cost_price: Option<Money>,

    pub categories: Vec<String>,

    /// Product tax override.
    pub tax_rate: Option<Rate>,

    pub quantity: i64,

    pub addons: Vec<Addon>,

    pub variant: Option<Variant>,

    pub modifiers: Vec<SelectedModifier>,

    pub discount: Option<Discount>,

    pub is_reward: bool,

    pub reward_id: Option<String>,

    /// Recipe snapshot used for refund restoration.
    pub recipe: Vec<RecipeItem>,

    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    /// Sum of add-on and modifier prices for one unit.
    pub fn extras_price(&self) -> Money {
        let addons: Money = self.addons.iter().map(|a| a.price).sum();
        let modifiers: Money = self.modifiers.iter().map(|m| m.option.price).sum();
        addons + modifiers
    }

    /// Sum of add-on and modifier costs for one unit.
    pub fn extras_cost(&self) -> Money {
        let addons: Money = self.addons.iter().filter_map(|a| a.cost).sum();
        let modifiers: Money = self.modifiers.iter().filter_map(|m| m.option.cost).sum();
        addons + modifiers
    }

    /// `(unit price + extras) × quantity`.
    pub fn gross(&self) -> Money {
        (self.unit_price + self.extras_price()).multiply_quantity(self.quantity)
    }

    /// True when the line carries any add-on, variant or modifier.
    pub fn is_configured(&self) -> bool {
        !self.addons.is_empty() || self.variant.is_some() || !self.modifiers.is_empty()
    }

    /// A reward line whose price is exactly zero (free promotional item).
    pub fn is_free_reward(&self) -> bool {
        self.is_reward && self.unit_price.is_zero()
    }
}

/// Order type, table and guest count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderMetadata {
    pub order_type: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub guest_count: Option<u32>,
}

impl Default for OrderMetadata {
    fn default() -> Self {
        OrderMetadata {
            order_type: DEFAULT_ORDER_TYPE.to_string(),
            table: None,
            guest_count: None,
        }
    }
}

/// Order type of a fresh cart.
pub const DEFAULT_ORDER_TYPE: &str = "dine-in";

/// A suspended order tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct HeldCart {
    pub id: String,
    pub name: String,
    pub items: Vec<CartItem>,
    pub metadata: OrderMetadata,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Loyalty
// =============================================================================

/// A loyalty member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub member_code: String,
    pub name: String,
    #[serde(default)]
    pub contact: Option<String>,
    /// Point balance, never negative.
    pub points: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// What an item-based rule matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RuleTarget {
    Product(String),
    Category(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PointRuleKind {
    /// `floor(spend / threshold) × points`.
    Spend { threshold: Money, points: i64 },
    /// `quantity × points_per_item` over matching lines.
    Item { target: RuleTarget, points_per_item: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PointRule {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub kind: PointRuleKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewardKind {
    DiscountAmount { value: Money },
    FreeProduct { product_id: String },
}

/// A redeemable reward. Immutable once referenced by a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Reward {
    pub id: String,
    pub name: String,
    pub points_cost: i64,
    pub kind: RewardKind,
}

/// The reward currently applied to the cart and its synthetic line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AppliedReward {
    pub reward: Reward,
    pub customer_id: String,
    pub line_id: String,
}

/// Reward record on a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RedeemedReward {
    pub reward_id: String,
    pub points_spent: i64,
    pub description: String,
}

// =============================================================================
// Operator
// =============================================================================

/// Signed-in cashier attached to every committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Operator {
    pub id: String,
    pub name: String,
}

// =============================================================================
// Stock Audit
// =============================================================================

/// A product or raw material whose stock the ledger moves.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum StockTarget {
    Product(String),
    RawMaterial(String),
}

impl StockTarget {
    pub fn id(&self) -> &str {
        match self {
            StockTarget::Product(id) | StockTarget::RawMaterial(id) => id,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            StockTarget::Product(_) => "product",
            StockTarget::RawMaterial(_) => "raw_material",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    Sale,
    Refund,
    Manual,
    PhysicalCount,
}

/// Append-only audit record for one stock change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockAdjustment {
    pub id: String,
    pub target: StockTarget,
    pub target_name: String,
    pub delta: i64,
    pub resulting_stock: i64,
    pub kind: AdjustmentKind,
    pub reason: String,
    pub actor: Operator,
    /// Transaction id for sale/refund adjustments.
    pub reference_id: Option<String>,
    /// Stock ended below zero (only possible when strict mode is off).
    pub went_negative: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Payments
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    /// QRIS, card or transfer.
    NonCash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub method: PaymentMethod,
    pub amount: Money,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Payment as entered at the till, before it gets an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentInput {
    pub method: PaymentMethod,
    pub amount: Money,
}

impl PaymentInput {
    pub fn cash(amount: Money) -> Self {
        PaymentInput {
            method: PaymentMethod::Cash,
            amount,
        }
    }

    pub fn non_cash(amount: Money) -> Self {
        PaymentInput {
            method: PaymentMethod::NonCash,
            amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Partial,
    Unpaid,
    Refunded,
}

impl PaymentStatus {
    /// Status from the amount paid against the total. Integer money means
    /// no rounding slack is needed.
    pub fn from_amounts(paid: Money, total: Money) -> Self {
        if paid >= total {
            PaymentStatus::Paid
        } else if paid.is_positive() {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Unpaid
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A committed line with its captured unit cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionLine {
    pub item: CartItem,
    /// Cost per unit at commit time, add-ons included.
    pub unit_cost: Money,
}

/// An immutable sale record.
///
/// Only `payments`, `amount_paid` and `payment_status` change after creation
/// (installments and refund).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Transaction {
    pub id: String,
    /// Human-readable `YYYYMMDD-<terminal>-<seq>`.
    pub receipt_number: String,
    pub items: Vec<TransactionLine>,
    pub subtotal: Money,
    pub item_discount_total: Money,
    /// Cart-level discount as applied.
    pub cart_discount: Option<Discount>,
    pub cart_discount_total: Money,
    pub tax: Money,
    pub service_charge: Money,
    pub total: Money,
    pub amount_paid: Money,
    pub payments: Vec<Payment>,
    pub payment_status: PaymentStatus,
    pub metadata: OrderMetadata,
    pub operator: Operator,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_contact: Option<String>,
    pub points_earned: i64,
    pub reward_redeemed: Option<RedeemedReward>,
    /// Some tracked stock went negative on this sale.
    pub oversold: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Amount still owed.
    pub fn balance_due(&self) -> Money {
        (self.total - self.amount_paid).non_negative()
    }
}

// =============================================================================
// Configuration Types
// =============================================================================

/// Tax and service-charge settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxConfig {
    pub tax_rate: Rate,
    pub service_charge_rate: Rate,
}

/// Inventory mode flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryConfig {
    /// Master switch; off means everything is always available.
    pub enabled: bool,
    /// Recipe-based depletion of raw materials.
    pub track_ingredients: bool,
    /// Reject sales that would drive stock negative.
    pub strict_stock: bool,
}

// =============================================================================
// Unit Tests
// =============================================================================
