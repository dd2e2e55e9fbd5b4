//! # Transaction Commit
//!
//! Turns the working cart plus a payment breakdown into an immutable
//! [`Transaction`], depleting stock and moving loyalty points in the same
//! state transition.
//!
//! ## Validate, Then Apply
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  VALIDATE (read-only)                      APPLY (cannot fail)          │
//! │  ─────────────────────                     ─────────────────            │
//! │  1. cart not empty, operator present       7. receipt number            │
//! │  2. payments positive                      8. stock ledger (Sale)       │
//! │  3. totals → payment status                9. customer points           │
//! │  4. debt has an owner                     10. retire held cart          │
//! │  5. points re-validated                   11. append to the log         │
//! │  6. cost snapshot + depletion plan        12. clear the cart            │
//! │     strict mode → shortfalls                                            │
//! │                                                                         │
//! │  Any Err from 1-6 leaves every collection untouched.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{invalid_payment, CommitError, CommitResult, LoyaltyError};
use crate::inventory::Inventory;
use crate::loyalty::{apply_points_delta, settle_points, PointsDelta};
use crate::money::Money;
use crate::state::{CommitReceipt, TerminalState};
use crate::types::{
    AdjustmentKind, CartItem, InventoryConfig, Operator, Payment, PaymentInput, PaymentStatus,
    RecipeItem, RedeemedReward, TaxConfig, Transaction, TransactionLine,
};

/// Reason text on sale adjustments.
pub const SALE_REASON: &str = "sale";

/// What the cashier entered at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommitRequest {
    pub payments: Vec<PaymentInput>,
    /// Registered member. Defaults to the customer the applied reward was
    /// redeemed for, and must be that customer when set.
    #[serde(default)]
    pub customer_id: Option<String>,
    /// Walk-in name for credit sales without a member.
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_contact: Option<String>,
}

/// Session settings a commit runs under.
#[derive(Debug, Clone, Copy)]
pub struct CommitContext<'a> {
    pub operator: Option<&'a Operator>,
    pub tax: &'a TaxConfig,
    pub inventory: &'a InventoryConfig,
    pub loyalty_enabled: bool,
    pub terminal_code: &'a str,
    pub now: DateTime<Utc>,
}

impl TerminalState {
    /// Commits the working cart.
    ///
    /// Under-payment is not an error: the sale is recorded as `partial` or
    /// `unpaid` provided someone owns the debt.
    pub fn commit(&mut self, request: &CommitRequest, ctx: &CommitContext<'_>) -> CommitResult<CommitReceipt> {
        // ---------------------------------------------------------------------
        // Validate
        // ---------------------------------------------------------------------
        if self.cart.is_empty() {
            return Err(CommitError::EmptyCart);
        }
        let operator = ctx.operator.ok_or(CommitError::NoOperator)?;

        if let Some(bad) = request.payments.iter().find(|p| !p.amount.is_positive()) {
            return Err(invalid_payment(bad.amount));
        }

        let totals = self.cart.totals(ctx.tax);
        let amount_paid: Money = request.payments.iter().map(|p| p.amount).sum();
        let payment_status = PaymentStatus::from_amounts(amount_paid, totals.final_total);

        let applied = self.cart.applied_reward();
        if let (Some(requested), Some(applied)) = (request.customer_id.as_deref(), applied) {
            if requested != applied.customer_id {
                return Err(LoyaltyError::RewardCustomerMismatch {
                    reward_customer: applied.customer_id.clone(),
                    customer: requested.to_string(),
                }
                .into());
            }
        }
        let customer_id = request
            .customer_id
            .as_deref()
            .or(applied.map(|a| a.customer_id.as_str()));
        let customer = match customer_id {
            Some(id) => Some(
                self.customers
                    .get(id)
                    .ok_or_else(|| CommitError::CustomerNotFound(id.to_string()))?,
            ),
            None => None,
        };
        let walk_in_name = request
            .customer_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        if payment_status != PaymentStatus::Paid && customer.is_none() && walk_in_name.is_none() {
            return Err(CommitError::MissingCustomerIdentity);
        }

        // Loyalty off: no points move in either direction.
        let redeemed = applied.map(|a| &a.reward);
        let points = match customer {
            Some(_) if !ctx.loyalty_enabled => PointsDelta::default(),
            Some(customer) => settle_points(self.cart.items(), &self.point_rules, redeemed, customer)?,
            None if redeemed.is_some() => return Err(LoyaltyError::RewardWithoutCustomer.into()),
            None => PointsDelta::default(),
        };

        let inventory = self.ledger.inventory();
        let lines: Vec<TransactionLine> = self
            .cart
            .items()
            .iter()
            .map(|item| TransactionLine {
                unit_cost: unit_cost(item, inventory, ctx.inventory),
                item: item.clone(),
            })
            .collect();

        let plan = self.ledger.plan_sale_depletion(self.cart.items(), ctx.inventory);
        if ctx.inventory.strict_stock {
            let shortfalls = self.ledger.shortfalls(&plan);
            if !shortfalls.is_empty() {
                return Err(CommitError::InsufficientStock(shortfalls));
            }
        }

        let (customer_name, customer_contact) = match customer {
            Some(c) => (Some(c.name.clone()), c.contact.clone()),
            None => (
                walk_in_name.map(str::to_string),
                request.customer_contact.clone(),
            ),
        };
        let customer_id = customer.map(|c| c.id.clone());
        let reward_redeemed = redeemed.map(|r| RedeemedReward {
            reward_id: r.id.clone(),
            points_spent: points.redeemed,
            description: r.name.clone(),
        });

        // ---------------------------------------------------------------------
        // Apply
        // ---------------------------------------------------------------------
        let id = Uuid::new_v4().to_string();
        let receipt_number = self.receipts.next(ctx.terminal_code, ctx.now);

        let adjustments = self.ledger.apply_plan(
            &plan,
            AdjustmentKind::Sale,
            SALE_REASON,
            operator,
            Some(id.as_str()),
            ctx.now,
        );
        let oversold = adjustments.iter().any(|a| a.went_negative);

        let customer = customer_id.as_ref().and_then(|cid| {
            let customer = self.customers.get_mut(cid)?;
            apply_points_delta(customer, points.net());
            Some(customer.clone())
        });

        let retired_held_cart = self.held.retire_active();

        let payments = request
            .payments
            .iter()
            .map(|p| Payment {
                id: Uuid::new_v4().to_string(),
                method: p.method,
                amount: p.amount,
                created_at: ctx.now,
            })
            .collect();

        let transaction = Transaction {
            id,
            receipt_number,
            items: lines,
            subtotal: totals.subtotal,
            item_discount_total: totals.item_discount_total,
            cart_discount: self.cart.discount().cloned(),
            cart_discount_total: totals.cart_discount_total,
            tax: totals.tax,
            service_charge: totals.service_charge,
            total: totals.final_total,
            amount_paid,
            payments,
            payment_status,
            metadata: self.cart.metadata().clone(),
            operator: operator.clone(),
            customer_id,
            customer_name,
            customer_contact,
            points_earned: points.earned,
            reward_redeemed,
            oversold,
            created_at: ctx.now,
            updated_at: ctx.now,
        };

        self.transactions.append(transaction.clone());
        self.cart.clear();

        Ok(CommitReceipt {
            transaction,
            adjustments,
            customer,
            retired_held_cart,
        })
    }
}

// =============================================================================
// Cost Snapshot
// =============================================================================

/// Unit cost of a line at commit time, extras included.
///
/// Recipe products (ingredient tracking on) cost the sum of their
/// components; everything else uses the captured or catalog cost.
pub fn unit_cost(item: &CartItem, inventory: &Inventory, config: &InventoryConfig) -> Money {
    let product = item.product_id.as_deref().and_then(|id| inventory.product(id));
    let recipe: &[RecipeItem] = if !item.recipe.is_empty() {
        &item.recipe
    } else {
        product.map_or(&[][..], |p| p.recipe.as_slice())
    };

    let base = if config.enabled && config.track_ingredients && !recipe.is_empty() {
        recipe_cost(recipe, inventory)
    } else {
        item.cost_price
            .or_else(|| product.and_then(|p| p.cost_price))
            .unwrap_or_default()
    };
    base + item.extras_cost()
}

fn recipe_cost(recipe: &[RecipeItem], inventory: &Inventory) -> Money {
    recipe
        .iter()
        .map(|component| match component {
            RecipeItem::RawMaterial {
                raw_material_id,
                quantity,
            } => inventory
                .raw_material(raw_material_id)
                .map_or(Money::zero(), |m| m.cost_per_unit * *quantity),
            RecipeItem::Product {
                product_id,
                quantity,
            } => inventory
                .product(product_id)
                .and_then(|p| p.cost_price)
                .map_or(Money::zero(), |cost| cost * *quantity),
        })
        .sum()
}

// =============================================================================
// Unit Tests
// =============================================================================
