//! # Snapshot Mutations
//!
//! Optimistic edits applied to an in-memory [`TabSnapshot`].
//!
//! Every method validates first and only then mutates, so a failed call
//! leaves the snapshot untouched. Deleting an item or a rabbit cascades to
//! its assignments, mirroring the `ON DELETE CASCADE` of the store.

use chrono::Utc;

use crate::error::{CoreError, CoreResult};
use crate::types::{
    Assignment, Item, ItemPatch, Profile, Rabbit, RabbitColor, RabbitPatch, SharedTabData, Tab,
    TabPatch, TabSnapshot,
};
use crate::validation::{
    validate_currency_code, validate_description, validate_percent, validate_price_cents,
    validate_rabbit_name, validate_tab_name,
};

impl TabSnapshot {
    /// A snapshot of a tab with nothing on it yet.
    pub fn empty(tab: Tab) -> Self {
        TabSnapshot {
            tab,
            items: Vec::new(),
            rabbits: Vec::new(),
            assignments: Vec::new(),
        }
    }

    pub fn item(&self, item_id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn rabbit(&self, rabbit_id: &str) -> Option<&Rabbit> {
        self.rabbits.iter().find(|r| r.id == rabbit_id)
    }

    pub fn is_assigned(&self, item_id: &str, rabbit_id: &str) -> bool {
        self.assignments
            .iter()
            .any(|a| a.item_id == item_id && a.rabbit_id == rabbit_id)
    }

    /// Colours already taken by rabbits on this tab.
    pub fn used_colors(&self) -> Vec<RabbitColor> {
        self.rabbits.iter().map(|r| r.color).collect()
    }

    // =========================================================================
    // Tab
    // =========================================================================

    pub fn apply_tab_patch(&mut self, patch: &TabPatch) -> CoreResult<()> {
        if let Some(name) = &patch.name {
            validate_tab_name(name)?;
        }
        if let Some(tax) = patch.tax_percent {
            validate_percent("tax_percent", tax)?;
        }
        if let Some(tip) = patch.tip_percent {
            validate_percent("tip_percent", tip)?;
        }
        if let Some(code) = &patch.currency_code {
            validate_currency_code(code)?;
        }

        patch.apply_to(&mut self.tab);
        self.tab.updated_at = Utc::now();
        Ok(())
    }

    // =========================================================================
    // Items
    // =========================================================================

    pub fn add_item(&mut self, item: Item) -> CoreResult<()> {
        validate_description(&item.description)?;
        validate_price_cents(item.price_cents)?;
        if self.item(&item.id).is_some() {
            return Err(CoreError::DuplicateId(item.id));
        }
        self.items.push(item);
        Ok(())
    }

    pub fn update_item(&mut self, item_id: &str, patch: &ItemPatch) -> CoreResult<()> {
        if let Some(description) = &patch.description {
            validate_description(description)?;
        }
        if let Some(price) = patch.price_cents {
            validate_price_cents(price)?;
        }

        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| CoreError::ItemNotFound(item_id.to_string()))?;
        patch.apply_to(item);
        Ok(())
    }

    /// Removes an item and every assignment pointing at it.
    pub fn remove_item(&mut self, item_id: &str) -> CoreResult<Item> {
        let pos = self
            .items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| CoreError::ItemNotFound(item_id.to_string()))?;
        let item = self.items.remove(pos);
        self.assignments.retain(|a| a.item_id != item_id);
        Ok(item)
    }

    // =========================================================================
    // Rabbits
    // =========================================================================

    pub fn add_rabbit(&mut self, rabbit: Rabbit) -> CoreResult<()> {
        validate_rabbit_name(&rabbit.name)?;
        if self.rabbit(&rabbit.id).is_some() {
            return Err(CoreError::DuplicateId(rabbit.id));
        }
        self.rabbits.push(rabbit);
        Ok(())
    }

    pub fn update_rabbit(&mut self, rabbit_id: &str, patch: &RabbitPatch) -> CoreResult<()> {
        if let Some(name) = &patch.name {
            validate_rabbit_name(name)?;
        }

        let rabbit = self
            .rabbits
            .iter_mut()
            .find(|r| r.id == rabbit_id)
            .ok_or_else(|| CoreError::RabbitNotFound(rabbit_id.to_string()))?;
        patch.apply_to(rabbit);
        Ok(())
    }

    /// Removes a rabbit and every assignment it holds.
    pub fn remove_rabbit(&mut self, rabbit_id: &str) -> CoreResult<Rabbit> {
        let pos = self
            .rabbits
            .iter()
            .position(|r| r.id == rabbit_id)
            .ok_or_else(|| CoreError::RabbitNotFound(rabbit_id.to_string()))?;
        let rabbit = self.rabbits.remove(pos);
        self.assignments.retain(|a| a.rabbit_id != rabbit_id);
        Ok(rabbit)
    }

    // =========================================================================
    // Assignments
    // =========================================================================

    /// Flips an (item, rabbit) edge. Returns `true` if the pair is now assigned.
    pub fn toggle_assignment(&mut self, item_id: &str, rabbit_id: &str) -> CoreResult<bool> {
        if self.item(item_id).is_none() {
            return Err(CoreError::ItemNotFound(item_id.to_string()));
        }
        if self.rabbit(rabbit_id).is_none() {
            return Err(CoreError::RabbitNotFound(rabbit_id.to_string()));
        }

        if self.is_assigned(item_id, rabbit_id) {
            self.assignments
                .retain(|a| !(a.item_id == item_id && a.rabbit_id == rabbit_id));
            Ok(false)
        } else {
            self.assignments.push(Assignment::new(item_id, rabbit_id));
            Ok(true)
        }
    }

    // =========================================================================
    // Sharing
    // =========================================================================

    /// Freezes the snapshot into the shape used for sharing.
    pub fn to_shared(&self, owner_profile: Option<Profile>) -> SharedTabData {
        SharedTabData {
            tab: self.tab.clone(),
            items: self.items.clone(),
            rabbits: self.rabbits.clone(),
            assignments: self.assignments.clone(),
            owner_profile,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with_two_rabbits() -> (TabSnapshot, Item, Rabbit, Rabbit) {
        let tab = Tab::new("Dinner", "USD");
        let mut snap = TabSnapshot::empty(tab.clone());
        let item = Item::new(&tab.id, "Fries", 400);
        let a = Rabbit::new(&tab.id, "A", RabbitColor::Red);
        let b = Rabbit::new(&tab.id, "B", RabbitColor::Orange);
        snap.add_item(item.clone()).unwrap();
        snap.add_rabbit(a.clone()).unwrap();
        snap.add_rabbit(b.clone()).unwrap();
        (snap, item, a, b)
    }

    #[test]
    fn test_toggle_assignment_round_trip() {
        let (mut snap, item, a, _) = snapshot_with_two_rabbits();

        assert!(snap.toggle_assignment(&item.id, &a.id).unwrap());
        assert!(snap.is_assigned(&item.id, &a.id));
        assert!(!snap.toggle_assignment(&item.id, &a.id).unwrap());
        assert!(snap.assignments.is_empty());
    }

    #[test]
    fn test_toggle_unknown_ids_fails() {
        let (mut snap, item, a, _) = snapshot_with_two_rabbits();
        assert!(matches!(
            snap.toggle_assignment("nope", &a.id),
            Err(CoreError::ItemNotFound(_))
        ));
        assert!(matches!(
            snap.toggle_assignment(&item.id, "nope"),
            Err(CoreError::RabbitNotFound(_))
        ));
    }

    #[test]
    fn test_remove_item_cascades() {
        let (mut snap, item, a, b) = snapshot_with_two_rabbits();
        snap.toggle_assignment(&item.id, &a.id).unwrap();
        snap.toggle_assignment(&item.id, &b.id).unwrap();

        snap.remove_item(&item.id).unwrap();
        assert!(snap.items.is_empty());
        assert!(snap.assignments.is_empty());
    }

    #[test]
    fn test_remove_rabbit_cascades() {
        let (mut snap, item, a, b) = snapshot_with_two_rabbits();
        snap.toggle_assignment(&item.id, &a.id).unwrap();
        snap.toggle_assignment(&item.id, &b.id).unwrap();

        snap.remove_rabbit(&a.id).unwrap();
        assert_eq!(snap.rabbits.len(), 1);
        assert_eq!(snap.assignments, vec![Assignment::new(&item.id, &b.id)]);
    }

    #[test]
    fn test_invalid_edit_leaves_snapshot_untouched() {
        let (mut snap, item, _, _) = snapshot_with_two_rabbits();
        let before = snap.clone();

        let patch = ItemPatch {
            description: Some("Large fries".into()),
            price_cents: Some(-1),
        };
        assert!(snap.update_item(&item.id, &patch).is_err());
        assert_eq!(snap, before);

        let patch = TabPatch {
            tax_percent: Some(f64::NAN),
            ..Default::default()
        };
        assert!(snap.apply_tab_patch(&patch).is_err());
        assert_eq!(snap, before);
    }

    #[test]
    fn test_duplicate_item_id_rejected() {
        let (mut snap, item, _, _) = snapshot_with_two_rabbits();
        assert!(matches!(
            snap.add_item(item),
            Err(CoreError::DuplicateId(_))
        ));
    }
}
