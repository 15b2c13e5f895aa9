//! # Split Calculation Engine
//!
//! Turns items, rabbits, assignments and tax/tip rates into what each rabbit
//! owes. Pure and deterministic: safe to re-run on every render.
//!
//! ## Two Independent Totals
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PER RABBIT  ("what each person should pay")                            │
//! │                                                                         │
//! │    subtotal(p) = round( Σ price(i) / k(i) )    k(i) = assignees of i     │
//! │    tax(p)      = round( subtotal(p) × tax% )                            │
//! │    tip(p)      = round( subtotal(p) × tip% )                            │
//! │    total(p)    = subtotal(p) + tax(p) + tip(p)                          │
//! │                                                                         │
//! │  GRAND TOTAL  ("what the receipt says")                                 │
//! │                                                                         │
//! │    items_subtotal = Σ price(i)              (assigned or not)           │
//! │    grand_total    = items_subtotal + round(… × tax%) + round(… × tip%)   │
//! │                                                                         │
//! │  Σ total(p) may differ from grand_total by a few units. Both numbers    │
//! │  are reported as computed; the difference is never redistributed.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Assignment, Item, Rabbit, TabSnapshot};

// =============================================================================
// Output Types
// =============================================================================

/// One item's contribution to a rabbit's subtotal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemShare {
    pub item_id: String,
    /// Number of rabbits splitting the item.
    pub split_count: u32,
    /// Unrounded share in smallest units (`price / split_count`).
    pub share: f64,
}

/// What one rabbit owes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RabbitBreakdown {
    pub rabbit_id: String,
    pub subtotal: Money,
    pub tax: Money,
    pub tip: Money,
    pub total: Money,
    /// Items this rabbit holds, in bill order.
    pub shares: Vec<ItemShare>,
}

/// Result of a split calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SplitSummary {
    /// One entry per rabbit, in the order rabbits were given.
    pub rabbits: Vec<RabbitBreakdown>,
    /// Sum of every item price, assigned or not.
    pub items_subtotal: Money,
    pub tax_amount: Money,
    pub tip_amount: Money,
    pub grand_total: Money,
    /// Items nobody is assigned to. They count toward the grand total only.
    pub unassigned_item_count: u32,
}

impl SplitSummary {
    /// Convenience wrapper over [`calculate_split`] for a whole snapshot.
    pub fn from_snapshot(snapshot: &TabSnapshot) -> Self {
        calculate_split(
            &snapshot.items,
            &snapshot.rabbits,
            &snapshot.assignments,
            snapshot.tab.tax_percent,
            snapshot.tab.tip_percent,
        )
    }

    pub fn breakdown_for(&self, rabbit_id: &str) -> Option<&RabbitBreakdown> {
        self.rabbits.iter().find(|r| r.rabbit_id == rabbit_id)
    }

    /// Sum of every rabbit's total.
    pub fn rabbits_total(&self) -> Money {
        self.rabbits.iter().map(|r| r.total).sum()
    }

    /// `Σ total(p) − grand_total`. Reported, never corrected.
    pub fn rounding_drift(&self) -> Money {
        self.rabbits_total() - self.grand_total
    }
}

// =============================================================================
// Calculation
// =============================================================================

/// Computes the per-rabbit breakdown and the grand totals.
///
/// Duplicate assignment edges count once. Edges that reference an item or
/// rabbit not in the inputs are ignored.
///
/// ## Example
/// ```rust
/// use rabbit_core::split::calculate_split;
/// use rabbit_core::types::{Assignment, Item, Rabbit, RabbitColor};
///
/// let burger = Item::new("tab", "Burger", 1000);
/// let fries = Item::new("tab", "Fries", 400);
/// let a = Rabbit::new("tab", "A", RabbitColor::Red);
/// let b = Rabbit::new("tab", "B", RabbitColor::Blue);
/// let edges = vec![
///     Assignment::new(&burger.id, &a.id),
///     Assignment::new(&fries.id, &a.id),
///     Assignment::new(&fries.id, &b.id),
/// ];
///
/// let split = calculate_split(&[burger, fries], &[a.clone(), b], &edges, 8.0, 20.0);
/// assert_eq!(split.breakdown_for(&a.id).unwrap().total.units(), 1536);
/// assert_eq!(split.grand_total.units(), 1792);
/// ```
pub fn calculate_split(
    items: &[Item],
    rabbits: &[Rabbit],
    assignments: &[Assignment],
    tax_percent: f64,
    tip_percent: f64,
) -> SplitSummary {
    let item_ids: HashSet<&str> = items.iter().map(|i| i.id.as_str()).collect();
    let rabbit_ids: HashSet<&str> = rabbits.iter().map(|r| r.id.as_str()).collect();

    let edges: HashSet<(&str, &str)> = assignments
        .iter()
        .map(|a| (a.item_id.as_str(), a.rabbit_id.as_str()))
        .filter(|(item, rabbit)| item_ids.contains(item) && rabbit_ids.contains(rabbit))
        .collect();

    let mut split_counts: HashMap<&str, u32> = HashMap::new();
    for (item, _) in &edges {
        *split_counts.entry(*item).or_insert(0) += 1;
    }

    let breakdowns = rabbits
        .iter()
        .map(|rabbit| {
            let shares: Vec<ItemShare> = items
                .iter()
                .filter(|item| edges.contains(&(item.id.as_str(), rabbit.id.as_str())))
                .map(|item| {
                    let split_count = split_counts.get(item.id.as_str()).copied().unwrap_or(1);
                    ItemShare {
                        item_id: item.id.clone(),
                        split_count,
                        share: item.price_cents as f64 / split_count as f64,
                    }
                })
                .collect();

            // Round once, after summing the real-valued shares.
            let subtotal = Money::from_real(shares.iter().map(|s| s.share).sum());
            let tax = subtotal.percent_of(tax_percent);
            let tip = subtotal.percent_of(tip_percent);

            RabbitBreakdown {
                rabbit_id: rabbit.id.clone(),
                subtotal,
                tax,
                tip,
                total: subtotal + tax + tip,
                shares,
            }
        })
        .collect();

    let items_subtotal: Money = items.iter().map(Item::price).sum();
    let tax_amount = items_subtotal.percent_of(tax_percent);
    let tip_amount = items_subtotal.percent_of(tip_percent);

    let unassigned_item_count = items
        .iter()
        .filter(|item| !split_counts.contains_key(item.id.as_str()))
        .count() as u32;

    SplitSummary {
        rabbits: breakdowns,
        items_subtotal,
        tax_amount,
        tip_amount,
        grand_total: items_subtotal + tax_amount + tip_amount,
        unassigned_item_count,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
