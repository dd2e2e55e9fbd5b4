//! # Loyalty Engine
//!
//! Point accrual from point rules and reward redemption against a
//! customer's balance.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apply reward ──► redeem() ──► synthetic reward line in the cart        │
//! │                     │                                                   │
//! │                     └── balance < cost? → InsufficientPoints            │
//! │                                                                         │
//! │  commit ──► settle_points() ──► re-check balance, earned - cost         │
//! │                                                                         │
//! │  refund ──► refund_points_delta() ──► -earned + cost (clamped at 0)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::LoyaltyError;
use crate::inventory::Inventory;
use crate::money::Money;
use crate::types::{
    CartItem, Customer, PointRule, PointRuleKind, Reward, RewardKind, RuleTarget, Transaction,
};

/// Points earned and spent on one sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointsDelta {
    pub earned: i64,
    pub redeemed: i64,
}

impl PointsDelta {
    /// Net change to the customer's balance.
    pub fn net(&self) -> i64 {
        self.earned - self.redeemed
    }
}

// =============================================================================
// Accrual
// =============================================================================

/// Gross spend over non-reward lines, before any discount.
pub fn spend_total(lines: &[CartItem]) -> Money {
    lines.iter().filter(|l| !l.is_reward).map(CartItem::gross).sum()
}

/// Points earned by `lines` under `rules`. Rules stack additively; reward
/// lines never earn.
///
/// ## Example
/// ```text
/// Rule A: 1 point per 10,000 spent     spend 45,000 → 4
/// Rule B: 2 points per "Kopi" item     2 × Kopi      → 4
///                                                  total 8
/// ```
pub fn earned_points(lines: &[CartItem], rules: &[PointRule]) -> i64 {
    let spend = spend_total(lines);
    rules
        .iter()
        .map(|rule| match &rule.kind {
            PointRuleKind::Spend { threshold, points } => {
                if threshold.is_positive() && spend.is_positive() {
                    (spend.minor() / threshold.minor()) * points
                } else {
                    0
                }
            }
            PointRuleKind::Item {
                target,
                points_per_item,
            } => lines
                .iter()
                .filter(|l| !l.is_reward && matches_target(l, target))
                .map(|l| l.quantity * points_per_item)
                .sum(),
        })
        .sum()
}

fn matches_target(line: &CartItem, target: &RuleTarget) -> bool {
    match target {
        RuleTarget::Product(id) => line.product_id.as_deref() == Some(id.as_str()),
        RuleTarget::Category(name) => line.categories.iter().any(|c| c == name),
    }
}

// =============================================================================
// Redemption
// =============================================================================

fn ensure_balance(reward: &Reward, customer: &Customer) -> Result<(), LoyaltyError> {
    if customer.points < reward.points_cost {
        return Err(LoyaltyError::InsufficientPoints {
            required: reward.points_cost,
            available: customer.points,
        });
    }
    Ok(())
}

/// Validates a redemption and builds its synthetic reward line.
///
/// A discount reward becomes a line priced at minus its value. A free-product
/// reward becomes a copy of the product priced at zero.
pub fn redeem(
    reward: &Reward,
    customer: &Customer,
    inventory: &Inventory,
    now: DateTime<Utc>,
) -> Result<CartItem, LoyaltyError> {
    ensure_balance(reward, customer)?;

    let line_id = Uuid::new_v4().to_string();
    let item = match &reward.kind {
        RewardKind::DiscountAmount { value } => CartItem {
            line_id,
            product_id: None,
            name: format!("Reward: {}", reward.name),
            unit_price: -*value,
            cost_price: None,
            categories: vec![],
            tax_rate: None,
            quantity: 1,
            addons: vec![],
            variant: None,
            modifiers: vec![],
            discount: None,
            is_reward: true,
            reward_id: Some(reward.id.clone()),
            recipe: vec![],
            added_at: now,
        },
        RewardKind::FreeProduct { product_id } => {
            let product = inventory
                .product(product_id)
                .ok_or_else(|| LoyaltyError::RewardProductMissing(product_id.clone()))?;
            CartItem {
                line_id,
                product_id: Some(product.id.clone()),
                name: format!("{} (Reward)", product.name),
                unit_price: Money::zero(),
                cost_price: product.cost_price,
                categories: product.categories.clone(),
                tax_rate: product.tax_rate,
                quantity: 1,
                addons: vec![],
                variant: None,
                modifiers: vec![],
                discount: None,
                is_reward: true,
                reward_id: Some(reward.id.clone()),
                recipe: product.recipe.clone(),
                added_at: now,
            }
        }
    };
    Ok(item)
}

/// Computes the commit-time point delta, re-validating any redemption
/// against the customer's current balance.
pub fn settle_points(
    lines: &[CartItem],
    rules: &[PointRule],
    redeemed: Option<&Reward>,
    customer: &Customer,
) -> Result<PointsDelta, LoyaltyError> {
    let redeemed_cost = match redeemed {
        Some(reward) => {
            ensure_balance(reward, customer)?;
            reward.points_cost
        }
        None => 0,
    };
    Ok(PointsDelta {
        earned: earned_points(lines, rules),
        redeemed: redeemed_cost,
    })
}

/// Balance change that undoes a transaction's loyalty effect.
pub fn refund_points_delta(transaction: &Transaction) -> i64 {
    let spent = transaction
        .reward_redeemed
        .as_ref()
        .map_or(0, |r| r.points_spent);
    spent - transaction.points_earned
}

/// Applies a delta, keeping the balance at or above zero.
pub fn apply_points_delta(customer: &mut Customer, delta: i64) {
    customer.points = (customer.points + delta).max(0);
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{customer, product};

    fn line(product_id: &str, categories: &[&str], price: i64, qty: i64) -> CartItem {
        CartItem {
            line_id: Uuid::new_v4().to_string(),
            product_id: Some(product_id.to_string()),
            name: product_id.to_string(),
            unit_price: Money::from_minor(price),
            cost_price: None,
            categories: categories.iter().map(|c| c.to_string()).collect(),
            tax_rate: None,
            quantity: qty,
            addons: vec![],
            variant: None,
            modifiers: vec![],
            discount: None,
            is_reward: false,
            reward_id: None,
            recipe: vec![],
            added_at: Utc::now(),
        }
    }

    fn spend_rule(threshold: i64, points: i64) -> PointRule {
        PointRule {
            id: "r-spend".to_string(),
            description: String::new(),
            kind: PointRuleKind::Spend {
                threshold: Money::from_minor(threshold),
                points,
            },
        }
    }

    fn discount_reward(cost: i64, value: i64) -> Reward {
        Reward {
            id: "rw-disc".to_string(),
            name: "Potongan 10rb".to_string(),
            points_cost: cost,
            kind: RewardKind::DiscountAmount {
                value: Money::from_minor(value),
            },
        }
    }

    #[test]
    fn test_rules_stack() {
        let lines = vec![
            line("kopi", &["Kopi"], 15_000, 2),
            line("roti", &["Makanan"], 15_000, 1),
        ];
        let rules = vec![
            spend_rule(10_000, 1),
            PointRule {
                id: "r-cat".to_string(),
                description: String::new(),
                kind: PointRuleKind::Item {
                    target: RuleTarget::Category("Kopi".to_string()),
                    points_per_item: 2,
                },
            },
            PointRule {
                id: "r-prod".to_string(),
                description: String::new(),
                kind: PointRuleKind::Item {
                    target: RuleTarget::Product("roti".to_string()),
                    points_per_item: 5,
                },
            },
        ];

        // 45,000 / 10,000 = 4, + 2×2, + 1×5
        assert_eq!(earned_points(&lines, &rules), 13);
    }

    #[test]
    fn test_reward_lines_do_not_earn() {
        let mut reward_line = line("kopi", &["Kopi"], 0, 1);
        reward_line.is_reward = true;
        let lines = vec![line("kopi", &["Kopi"], 9_000, 1), reward_line];
        assert_eq!(earned_points(&lines, &[spend_rule(10_000, 1)]), 0);
    }

    #[test]
    fn test_zero_threshold_ignored() {
        let lines = vec![line("kopi", &[], 50_000, 1)];
        assert_eq!(earned_points(&lines, &[spend_rule(0, 10)]), 0);
    }

    #[test]
    fn test_redeem_discount_reward() {
        let reward = discount_reward(100, 10_000);
        let item = redeem(&reward, &customer("c1", 150), &Inventory::default(), Utc::now()).unwrap();
        assert!(item.is_reward);
        assert_eq!(item.unit_price.minor(), -10_000);
        assert_eq!(item.quantity, 1);
        assert_eq!(item.reward_id.as_deref(), Some("rw-disc"));
    }

    #[test]
    fn test_redeem_free_product() {
        let inventory = Inventory::new(vec![product("kopi", "Kopi Susu", 18_000)], vec![]);
        let reward = Reward {
            id: "rw-free".to_string(),
            name: "Kopi Gratis".to_string(),
            points_cost: 50,
            kind: RewardKind::FreeProduct {
                product_id: "kopi".to_string(),
            },
        };
        let item = redeem(&reward, &customer("c1", 50), &inventory, Utc::now()).unwrap();
        assert_eq!(item.name, "Kopi Susu (Reward)");
        assert!(item.is_free_reward());
        assert_eq!(item.product_id.as_deref(), Some("kopi"));

        let missing = redeem(&reward, &customer("c1", 50), &Inventory::default(), Utc::now());
        assert_eq!(
            missing.unwrap_err(),
            LoyaltyError::RewardProductMissing("kopi".to_string())
        );
    }

    #[test]
    fn test_insufficient_points() {
        let err = redeem(
            &discount_reward(100, 10_000),
            &customer("c1", 99),
            &Inventory::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            LoyaltyError::InsufficientPoints {
                required: 100,
                available: 99
            }
        );
    }

    #[test]
    fn test_settle_revalidates_balance() {
        let reward = discount_reward(100, 10_000);
        let lines = vec![line("kopi", &[], 30_000, 1)];
        let rules = vec![spend_rule(10_000, 1)];

        let delta = settle_points(&lines, &rules, Some(&reward), &customer("c1", 120)).unwrap();
        assert_eq!(delta.net(), 3 - 100);

        // Balance dropped after the reward was applied.
        assert!(settle_points(&lines, &rules, Some(&reward), &customer("c1", 20)).is_err());
    }

    #[test]
    fn test_apply_points_delta_clamps() {
        let mut c = customer("c1", 10);
        apply_points_delta(&mut c, -25);
        assert_eq!(c.points, 0);
    }
}
