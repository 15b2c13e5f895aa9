//! # Pending Ledger
//!
//! The not-yet-persisted edits of one tab, kept as buckets rather than as a
//! log so that edits which undo each other never reach the remote store.
//!
//! ## Buckets and Cancel-outs
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          PendingLedger                                  │
//! │                                                                         │
//! │  new_items ──────── delete ──► dropped (never sent)                    │
//! │  (remote item) ──── delete ──► deleted_item_ids                        │
//! │                                                                         │
//! │  new_rabbits ────── remove ──► dropped (never sent)                    │
//! │  (remote rabbit) ── remove ──► deleted_rabbit_ids                      │
//! │                                                                         │
//! │  toggle on ───► added_assignments   ◄─── toggle off cancels            │
//! │  toggle off ──► removed_assignments ◄─── toggle on cancels             │
//! │                                                                         │
//! │  tab_updates   one merged TabPatch, later fields win                   │
//! │  item_updates  merged ItemPatch per remote item                        │
//! │  rabbit_updates merged RabbitPatch per remote rabbit                   │
//! │                                                                         │
//! │  Deleting an item or rabbit prunes its pending edges and patches.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Carrying a failed batch
//!
//! A batch that failed to flush may still have partly landed. When it is
//! carried into the next flush with [`PendingLedger::absorb`], cancel-outs
//! against it keep the inverse operation instead of dropping both sides.
//! Every remote write is idempotent, so sending both is always safe.

use std::collections::BTreeMap;

use rabbit_core::{Assignment, Item, ItemPatch, Rabbit, RabbitPatch, TabPatch};

/// Edits recorded since the last successful flush.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingLedger {
    pub new_items: Vec<Item>,
    pub deleted_item_ids: Vec<String>,
    pub new_rabbits: Vec<Rabbit>,
    pub deleted_rabbit_ids: Vec<String>,
    pub added_assignments: Vec<Assignment>,
    pub removed_assignments: Vec<Assignment>,
    pub tab_updates: TabPatch,
    pub item_updates: BTreeMap<String, ItemPatch>,
    pub rabbit_updates: BTreeMap<String, RabbitPatch>,
}

impl PendingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when a flush of this ledger would not touch the store.
    pub fn is_empty(&self) -> bool {
        self.new_items.is_empty()
            && self.deleted_item_ids.is_empty()
            && self.new_rabbits.is_empty()
            && self.deleted_rabbit_ids.is_empty()
            && self.added_assignments.is_empty()
            && self.removed_assignments.is_empty()
            && self.tab_updates.is_empty()
            && self.item_updates.is_empty()
            && self.rabbit_updates.is_empty()
    }

    /// Number of rows (or patches) a flush would write.
    pub fn operation_count(&self) -> usize {
        self.new_items.len()
            + self.deleted_item_ids.len()
            + self.new_rabbits.len()
            + self.deleted_rabbit_ids.len()
            + self.added_assignments.len()
            + self.removed_assignments.len()
            + usize::from(!self.tab_updates.is_empty())
            + self.item_updates.len()
            + self.rabbit_updates.len()
    }

    // =========================================================================
    // Recording
    // =========================================================================

    pub fn record_tab_update(&mut self, patch: TabPatch) {
        self.tab_updates.merge(patch);
    }

    pub fn record_item_added(&mut self, item: Item) {
        self.new_items.push(item);
    }

    /// Folds the patch into a pending insert, or merges it for a remote item.
    pub fn record_item_updated(&mut self, item_id: &str, patch: ItemPatch) {
        if let Some(item) = self.new_items.iter_mut().find(|i| i.id == item_id) {
            patch.apply_to(item);
            return;
        }
        self.item_updates
            .entry(item_id.to_string())
            .or_default()
            .merge(patch);
    }

    pub fn record_item_deleted(&mut self, item_id: &str) {
        self.forget_item(item_id, false);
    }

    pub fn record_rabbit_added(&mut self, rabbit: Rabbit) {
        self.new_rabbits.push(rabbit);
    }

    pub fn record_rabbit_updated(&mut self, rabbit_id: &str, patch: RabbitPatch) {
        if let Some(rabbit) = self.new_rabbits.iter_mut().find(|r| r.id == rabbit_id) {
            patch.apply_to(rabbit);
            return;
        }
        self.rabbit_updates
            .entry(rabbit_id.to_string())
            .or_default()
            .merge(patch);
    }

    pub fn record_rabbit_removed(&mut self, rabbit_id: &str) {
        self.forget_rabbit(rabbit_id, false);
    }

    /// Records a flipped edge. `now_assigned` is the state after the flip.
    pub fn record_toggle(&mut self, edge: Assignment, now_assigned: bool) {
        self.flip_edge(edge, now_assigned, false);
    }

    // =========================================================================
    // Absorbing
    // =========================================================================

    /// Replays `newer` on top of this (older, failed) ledger.
    ///
    /// Same cancel-outs as recording, except that an insert from this ledger
    /// cancelled by `newer` leaves its inverse behind, since the insert may
    /// already have reached the store.
    pub fn absorb(&mut self, newer: PendingLedger) {
        self.tab_updates.merge(newer.tab_updates);

        self.new_rabbits.extend(newer.new_rabbits);
        self.new_items.extend(newer.new_items);

        for (id, patch) in newer.item_updates {
            self.record_item_updated(&id, patch);
        }
        for (id, patch) in newer.rabbit_updates {
            self.record_rabbit_updated(&id, patch);
        }

        for edge in newer.removed_assignments {
            self.flip_edge(edge, false, true);
        }
        for edge in newer.added_assignments {
            self.flip_edge(edge, true, true);
        }

        for id in newer.deleted_item_ids {
            self.forget_item(&id, true);
        }
        for id in newer.deleted_rabbit_ids {
            self.forget_rabbit(&id, true);
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn forget_item(&mut self, item_id: &str, may_have_landed: bool) {
        let was_new = remove_where(&mut self.new_items, |i| i.id == item_id);
        if (!was_new || may_have_landed) && !self.deleted_item_ids.iter().any(|id| id == item_id) {
            self.deleted_item_ids.push(item_id.to_string());
        }

        // The store cascades edge deletes for the item.
        self.added_assignments.retain(|a| a.item_id != item_id);
        self.removed_assignments.retain(|a| a.item_id != item_id);
        self.item_updates.remove(item_id);
    }

    fn forget_rabbit(&mut self, rabbit_id: &str, may_have_landed: bool) {
        let was_new = remove_where(&mut self.new_rabbits, |r| r.id == rabbit_id);
        if (!was_new || may_have_landed)
            && !self.deleted_rabbit_ids.iter().any(|id| id == rabbit_id)
        {
            self.deleted_rabbit_ids.push(rabbit_id.to_string());
        }

        self.added_assignments.retain(|a| a.rabbit_id != rabbit_id);
        self.removed_assignments.retain(|a| a.rabbit_id != rabbit_id);
        self.rabbit_updates.remove(rabbit_id);
    }

    fn flip_edge(&mut self, edge: Assignment, now_assigned: bool, may_have_landed: bool) {
        let (toward, away) = if now_assigned {
            (&mut self.added_assignments, &mut self.removed_assignments)
        } else {
            (&mut self.removed_assignments, &mut self.added_assignments)
        };

        let cancelled = remove_where(away, |a| *a == edge);
        if (!cancelled || may_have_landed) && !toward.contains(&edge) {
            toward.push(edge);
        }
    }
}

/// Removes the first element matching `pred`. Returns whether one was found.
fn remove_where<T>(items: &mut Vec<T>, pred: impl Fn(&T) -> bool) -> bool {
    match items.iter().position(pred) {
        Some(pos) => {
            items.remove(pos);
            true
        }
        None => false,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
