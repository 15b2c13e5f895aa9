//! # Domain Types
//!
//! Core domain types shared by the split engine, the codec and the session.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Tab        │   │      Item       │   │     Rabbit      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  tab_id (FK)    │   │  tab_id (FK)    │       │
//! │  │  tax_percent    │   │  description    │   │  name           │       │
//! │  │  tip_percent    │   │  price_cents    │   │  color          │       │
//! │  │  currency_code  │   └────────┬────────┘   └────────┬────────┘       │
//! │  └─────────────────┘            │  Assignment (M:N)   │                │
//! │                                 └─────────────────────┘                │
//! │                                                                         │
//! │  SharedTabData = Tab + Items + Rabbits + Assignments + owner Profile    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Rabbit Color
// =============================================================================

/// Display colour of a rabbit (participant).
///
/// The position of each colour in [`PALETTE_V1`] is written into compact
/// share tokens, so the order is part of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RabbitColor {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
}

/// Version of the palette order below. Bump it (and keep decoding the old
/// order) if the palette ever changes.
pub const PALETTE_VERSION: u8 = 1;

/// Palette order for [`PALETTE_VERSION`] 1. Never reorder.
pub const PALETTE_V1: [RabbitColor; 6] = [
    RabbitColor::Red,
    RabbitColor::Orange,
    RabbitColor::Yellow,
    RabbitColor::Green,
    RabbitColor::Blue,
    RabbitColor::Purple,
];

impl RabbitColor {
    /// Position of this colour in the current palette.
    pub fn palette_index(&self) -> u8 {
        PALETTE_V1
            .iter()
            .position(|c| c == self)
            .map(|i| i as u8)
            .unwrap_or(0)
    }

    /// Colour at `index` in the current palette.
    pub fn from_palette_index(index: u8) -> Option<Self> {
        PALETTE_V1.get(index as usize).copied()
    }

    /// Picks a colour for a new rabbit.
    ///
    /// Returns the first palette colour nobody uses yet; once all six are
    /// taken, cycles through the palette by rabbit count.
    pub fn next_available(used: &[RabbitColor]) -> Self {
        PALETTE_V1
            .iter()
            .copied()
            .find(|c| !used.contains(c))
            .unwrap_or(PALETTE_V1[used.len() % PALETTE_V1.len()])
    }
}

impl Default for RabbitColor {
    fn default() -> Self {
        PALETTE_V1[0]
    }
}

impl std::fmt::Display for RabbitColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RabbitColor::Red => "red",
            RabbitColor::Orange => "orange",
            RabbitColor::Yellow => "yellow",
            RabbitColor::Green => "green",
            RabbitColor::Blue => "blue",
            RabbitColor::Purple => "purple",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Tab
// =============================================================================

/// A bill-splitting session owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Tab {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub name: String,

    /// Signed decimal percentage, not clamped (8.875 = 8.875%).
    pub tax_percent: f64,

    /// Signed decimal percentage, not clamped.
    pub tip_percent: f64,

    /// ISO 4217 code all item prices are expressed in.
    pub currency_code: String,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Tab {
    /// Creates an empty tab with a fresh id.
    pub fn new(name: impl Into<String>, currency_code: impl Into<String>) -> Self {
        let now = Utc::now();
        Tab {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            tax_percent: 0.0,
            tip_percent: 0.0,
            currency_code: currency_code.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Item
// =============================================================================

/// One priced line on the bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Item {
    pub id: String,
    pub tab_id: String,
    pub description: String,
    /// Price in the tab currency's smallest unit (raw value for
    /// zero-decimal currencies).
    pub price_cents: i64,
}

impl Item {
    /// Creates an item with a fresh id.
    pub fn new(tab_id: impl Into<String>, description: impl Into<String>, price_cents: i64) -> Self {
        Item {
            id: uuid::Uuid::new_v4().to_string(),
            tab_id: tab_id.into(),
            description: description.into(),
            price_cents,
        }
    }

    /// Returns the price as Money.
    pub fn price(&self) -> Money {
        Money::from_units(self.price_cents)
    }
}

// =============================================================================
// Rabbit (participant)
// =============================================================================

/// A person sharing the bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Rabbit {
    pub id: String,
    pub tab_id: String,
    pub name: String,
    pub color: RabbitColor,
    /// Linked payment profile, if the rabbit is a registered user.
    pub profile_id: Option<String>,
}

impl Rabbit {
    /// Creates a rabbit with a fresh id.
    pub fn new(tab_id: impl Into<String>, name: impl Into<String>, color: RabbitColor) -> Self {
        Rabbit {
            id: uuid::Uuid::new_v4().to_string(),
            tab_id: tab_id.into(),
            name: name.into(),
            color,
            profile_id: None,
        }
    }
}

// =============================================================================
// Assignment
// =============================================================================

/// "This rabbit owes a share of this item." Unique per pair.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Assignment {
    pub item_id: String,
    pub rabbit_id: String,
}

impl Assignment {
    pub fn new(item_id: impl Into<String>, rabbit_id: impl Into<String>) -> Self {
        Assignment {
            item_id: item_id.into(),
            rabbit_id: rabbit_id.into(),
        }
    }
}

// =============================================================================
// Profile
// =============================================================================

/// Payment identity of a rabbit or of the bill owner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Profile {
    pub display_name: Option<String>,
    pub venmo_username: Option<String>,
    pub cashapp_cashtag: Option<String>,
    pub paypal_username: Option<String>,
    pub currency_code: String,
}

// =============================================================================
// Snapshots
// =============================================================================

/// Full editable state of one tab, held in memory by an edit session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabSnapshot {
    pub tab: Tab,
    pub items: Vec<Item>,
    pub rabbits: Vec<Rabbit>,
    pub assignments: Vec<Assignment>,
}

/// Read-only denormalised bill used for sharing.
///
/// Produced either by the compact codec or by the remote share store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SharedTabData {
    pub tab: Tab,
    pub items: Vec<Item>,
    pub rabbits: Vec<Rabbit>,
    pub assignments: Vec<Assignment>,
    #[serde(rename = "ownerProfile")]
    pub owner_profile: Option<Profile>,
}

// =============================================================================
// Partial Updates
// =============================================================================

/// Field-level update of a tab. `None` leaves the field alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TabPatch {
    pub name: Option<String>,
    pub tax_percent: Option<f64>,
    pub tip_percent: Option<f64>,
    pub currency_code: Option<String>,
}

impl TabPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.tax_percent.is_none()
            && self.tip_percent.is_none()
            && self.currency_code.is_none()
    }

    /// Folds a later patch into this one; later values win per field.
    pub fn merge(&mut self, newer: TabPatch) {
        if newer.name.is_some() {
            self.name = newer.name;
        }
        if newer.tax_percent.is_some() {
            self.tax_percent = newer.tax_percent;
        }
        if newer.tip_percent.is_some() {
            self.tip_percent = newer.tip_percent;
        }
        if newer.currency_code.is_some() {
            self.currency_code = newer.currency_code;
        }
    }

    /// Number of fields this patch sets.
    pub fn field_count(&self) -> usize {
        [
            self.name.is_some(),
            self.tax_percent.is_some(),
            self.tip_percent.is_some(),
            self.currency_code.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }

    pub fn apply_to(&self, tab: &mut Tab) {
        if let Some(name) = &self.name {
            tab.name = name.clone();
        }
        if let Some(tax) = self.tax_percent {
            tab.tax_percent = tax;
        }
        if let Some(tip) = self.tip_percent {
            tab.tip_percent = tip;
        }
        if let Some(code) = &self.currency_code {
            tab.currency_code = code.clone();
        }
    }
}

/// Field-level update of an item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemPatch {
    pub description: Option<String>,
    pub price_cents: Option<i64>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.price_cents.is_none()
    }

    pub fn merge(&mut self, newer: ItemPatch) {
        if newer.description.is_some() {
            self.description = newer.description;
        }
        if newer.price_cents.is_some() {
            self.price_cents = newer.price_cents;
        }
    }

    pub fn apply_to(&self, item: &mut Item) {
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(price) = self.price_cents {
            item.price_cents = price;
        }
    }
}

/// Field-level update of a rabbit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RabbitPatch {
    pub name: Option<String>,
    pub color: Option<RabbitColor>,
}

impl RabbitPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.color.is_none()
    }

    pub fn merge(&mut self, newer: RabbitPatch) {
        if newer.name.is_some() {
            self.name = newer.name;
        }
        if newer.color.is_some() {
            self.color = newer.color;
        }
    }

    pub fn apply_to(&self, rabbit: &mut Rabbit) {
        if let Some(name) = &self.name {
            rabbit.name = name.clone();
        }
        if let Some(color) = self.color {
            rabbit.color = color;
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_order_is_stable() {
        assert_eq!(PALETTE_VERSION, 1);
        assert_eq!(RabbitColor::Red.palette_index(), 0);
        assert_eq!(RabbitColor::Purple.palette_index(), 5);
        for (i, color) in PALETTE_V1.iter().enumerate() {
            assert_eq!(RabbitColor::from_palette_index(i as u8), Some(*color));
        }
        assert_eq!(RabbitColor::from_palette_index(6), None);
    }

    #[test]
    fn test_next_available_color() {
        assert_eq!(RabbitColor::next_available(&[]), RabbitColor::Red);
        assert_eq!(
            RabbitColor::next_available(&[RabbitColor::Red, RabbitColor::Yellow]),
            RabbitColor::Orange
        );

        // All taken: cycle by count
        let mut used = PALETTE_V1.to_vec();
        assert_eq!(RabbitColor::next_available(&used), RabbitColor::Red);
        used.push(RabbitColor::Red);
        assert_eq!(RabbitColor::next_available(&used), RabbitColor::Orange);
    }

    #[test]
    fn test_tab_patch_merge_later_wins() {
        let mut patch = TabPatch {
            tax_percent: Some(8.0),
            name: Some("Lunch".into()),
            ..Default::default()
        };
        patch.merge(TabPatch {
            tax_percent: Some(9.5),
            tip_percent: Some(20.0),
            ..Default::default()
        });

        assert_eq!(patch.name.as_deref(), Some("Lunch"));
        assert_eq!(patch.tax_percent, Some(9.5));
        assert_eq!(patch.tip_percent, Some(20.0));
        assert_eq!(patch.field_count(), 3);

        let mut tab = Tab::new("Dinner", "USD");
        patch.apply_to(&mut tab);
        assert_eq!(tab.name, "Lunch");
        assert_eq!(tab.tax_percent, 9.5);
    }

    #[test]
    fn test_shared_tab_data_uses_owner_profile_key() {
        let data = SharedTabData {
            tab: Tab::new("Dinner", "USD"),
            items: vec![],
            rabbits: vec![],
            assignments: vec![],
            owner_profile: None,
        };
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("\"ownerProfile\":null"));
    }
}
