//! # Edit Session
//!
//! Synchronous state machine for one open tab: the optimistic snapshot,
//! the live pending ledger and the bookkeeping for the flush in flight.
//!
//! ## States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        EditSession States                               │
//! │                                                                         │
//! │   Loading ──loaded──► Ready{clean} ◄──────► Ready{dirty}                │
//! │                            ▲    edit / flush ok     │                   │
//! │                            │                        │ begin_flush       │
//! │                            │                        ▼                   │
//! │                            └──── complete_flush ── Flushing             │
//! │                                  (ok or failed)      │ edits keep       │
//! │                                                      │ landing in a     │
//! │                                                      │ fresh ledger     │
//! │   any state ──close──► Closed (unflushed edits are dropped)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Flush bookkeeping
//!
//! `begin_flush` takes the live ledger (plus any batch that failed before)
//! and hands it out as a [`FlushBatch`]. A copy stays here until
//! `complete_flush`: on failure it becomes the retry batch, which rides
//! along with the next flush. Nothing retries on its own; the next flush
//! needs a new edit or a manual save.
//!
//! Each change gets two attempts. If the resend of a retry batch fails
//! too, the old batch is dropped and only the edits that joined it stay
//! for the next save. A non-retryable error drops the whole batch at once.

use rabbit_core::{
    Assignment, Item, ItemPatch, Rabbit, RabbitColor, RabbitPatch, SplitSummary, TabPatch,
    TabSnapshot,
};
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::ledger::PendingLedger;

// =============================================================================
// Session State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the initial load.
    Loading,

    /// Snapshot loaded. `dirty` while any edit has not reached the store.
    Ready { dirty: bool },

    /// A flush is in flight.
    Flushing,

    /// Session closed; no further edits or flushes.
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Loading => write!(f, "loading"),
            SessionState::Ready { dirty: false } => write!(f, "ready (clean)"),
            SessionState::Ready { dirty: true } => write!(f, "ready (dirty)"),
            SessionState::Flushing => write!(f, "flushing"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// A ledger handed out for writing to the remote store.
#[derive(Debug, Clone)]
pub struct FlushBatch {
    pub id: u64,
    pub tab_id: String,
    pub ledger: PendingLedger,
}

/// Copy of the batch being written.
#[derive(Debug)]
struct InFlight {
    id: u64,
    ledger: PendingLedger,
    /// Edits made since the last flush, set only when `ledger` also
    /// carries a retry batch.
    fresh: Option<PendingLedger>,
}

// =============================================================================
// Edit Session
// =============================================================================

#[derive(Debug)]
pub struct EditSession {
    tab_id: String,
    snapshot: Option<TabSnapshot>,
    pending: PendingLedger,
    retry: Option<PendingLedger>,
    in_flight: Option<InFlight>,
    next_batch_id: u64,
    closed: bool,
}

impl EditSession {
    /// A session that has not loaded its tab yet.
    pub fn new(tab_id: impl Into<String>) -> Self {
        EditSession {
            tab_id: tab_id.into(),
            snapshot: None,
            pending: PendingLedger::new(),
            retry: None,
            in_flight: None,
            next_batch_id: 1,
            closed: false,
        }
    }

    /// A session that is ready to edit `snapshot`.
    pub fn from_snapshot(snapshot: TabSnapshot) -> Self {
        let mut session = Self::new(snapshot.tab.id.clone());
        session.snapshot = Some(snapshot);
        session
    }

    /// Finishes the initial load.
    pub fn loaded(&mut self, snapshot: TabSnapshot) {
        if self.closed {
            debug!(tab_id = %self.tab_id, "Discarding load for closed session");
            return;
        }
        info!(
            tab_id = %self.tab_id,
            items = snapshot.items.len(),
            rabbits = snapshot.rabbits.len(),
            "Tab loaded"
        );
        self.snapshot = Some(snapshot);
    }

    pub fn tab_id(&self) -> &str {
        &self.tab_id
    }

    pub fn state(&self) -> SessionState {
        if self.closed {
            SessionState::Closed
        } else if self.snapshot.is_none() {
            SessionState::Loading
        } else if self.in_flight.is_some() {
            SessionState::Flushing
        } else {
            SessionState::Ready {
                dirty: self.is_dirty(),
            }
        }
    }

    /// True while some edit is neither flushed nor in flight.
    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty() || self.retry.is_some()
    }

    pub fn is_flushing(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Read access to the optimistic snapshot.
    pub fn snapshot(&self) -> SyncResult<&TabSnapshot> {
        if self.closed {
            return Err(SyncError::SessionClosed);
        }
        self.snapshot.as_ref().ok_or(SyncError::NotReady)
    }

    /// Live ledger (edits made since the last flush started).
    pub fn pending(&self) -> &PendingLedger {
        &self.pending
    }

    /// Batch kept from a failed flush, if any.
    pub fn retry_batch(&self) -> Option<&PendingLedger> {
        self.retry.as_ref()
    }

    pub fn split(&self) -> SyncResult<SplitSummary> {
        Ok(SplitSummary::from_snapshot(self.snapshot()?))
    }

    fn snapshot_mut(&mut self) -> SyncResult<&mut TabSnapshot> {
        if self.closed {
            return Err(SyncError::SessionClosed);
        }
        self.snapshot.as_mut().ok_or(SyncError::NotReady)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    pub fn update_tab(&mut self, patch: TabPatch) -> SyncResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        self.snapshot_mut()?.apply_tab_patch(&patch)?;
        self.pending.record_tab_update(patch);
        Ok(())
    }

    pub fn add_item(&mut self, description: &str, price_cents: i64) -> SyncResult<Item> {
        let tab_id = self.tab_id.clone();
        let item = Item::new(tab_id, description.trim(), price_cents);
        self.snapshot_mut()?.add_item(item.clone())?;
        self.pending.record_item_added(item.clone());
        Ok(item)
    }

    pub fn update_item(&mut self, item_id: &str, mut patch: ItemPatch) -> SyncResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        patch.description = patch.description.map(|d| d.trim().to_string());
        self.snapshot_mut()?.update_item(item_id, &patch)?;
        self.pending.record_item_updated(item_id, patch);
        Ok(())
    }

    pub fn delete_item(&mut self, item_id: &str) -> SyncResult<Item> {
        let item = self.snapshot_mut()?.remove_item(item_id)?;
        self.pending.record_item_deleted(item_id);
        Ok(item)
    }

    /// Adds a rabbit, picking the first free palette colour when none is given.
    pub fn add_rabbit(&mut self, name: &str, color: Option<RabbitColor>) -> SyncResult<Rabbit> {
        let tab_id = self.tab_id.clone();
        let snapshot = self.snapshot_mut()?;
        let color = color.unwrap_or_else(|| RabbitColor::next_available(&snapshot.used_colors()));
        let rabbit = Rabbit::new(tab_id, name.trim(), color);
        snapshot.add_rabbit(rabbit.clone())?;
        self.pending.record_rabbit_added(rabbit.clone());
        Ok(rabbit)
    }

    pub fn update_rabbit(&mut self, rabbit_id: &str, mut patch: RabbitPatch) -> SyncResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        patch.name = patch.name.map(|n| n.trim().to_string());
        self.snapshot_mut()?.update_rabbit(rabbit_id, &patch)?;
        self.pending.record_rabbit_updated(rabbit_id, patch);
        Ok(())
    }

    pub fn remove_rabbit(&mut self, rabbit_id: &str) -> SyncResult<Rabbit> {
        let rabbit = self.snapshot_mut()?.remove_rabbit(rabbit_id)?;
        self.pending.record_rabbit_removed(rabbit_id);
        Ok(rabbit)
    }

    /// Flips an edge. Returns `true` if the pair is now assigned.
    pub fn toggle_assignment(&mut self, item_id: &str, rabbit_id: &str) -> SyncResult<bool> {
        let assigned = self.snapshot_mut()?.toggle_assignment(item_id, rabbit_id)?;
        self.pending
            .record_toggle(Assignment::new(item_id, rabbit_id), assigned);
        Ok(assigned)
    }

    // =========================================================================
    // Flushing
    // =========================================================================

    /// Takes everything unflushed as one batch.
    ///
    /// Returns `None` if a flush is already in flight, the session is not
    /// ready, or there is nothing to send.
    pub fn begin_flush(&mut self) -> Option<FlushBatch> {
        if self.closed || self.snapshot.is_none() || self.in_flight.is_some() {
            return None;
        }

        let live = std::mem::take(&mut self.pending);
        let (ledger, fresh) = match self.retry.take() {
            Some(mut failed) => {
                failed.absorb(live.clone());
                (failed, Some(live))
            }
            None => (live, None),
        };
        if ledger.is_empty() {
            return None;
        }

        let id = self.next_batch_id;
        self.next_batch_id += 1;
        debug!(
            tab_id = %self.tab_id,
            batch_id = id,
            operations = ledger.operation_count(),
            "Starting flush"
        );

        self.in_flight = Some(InFlight {
            id,
            ledger: ledger.clone(),
            fresh,
        });
        Some(FlushBatch {
            id,
            tab_id: self.tab_id.clone(),
            ledger,
        })
    }

    /// Records the outcome of the batch `batch_id`.
    ///
    /// A failed batch is kept and resent with the next flush. A failed
    /// resend drops the retried changes, and a non-retryable error drops the
    /// whole batch. The result of a flush that finishes after
    /// [`close`](Self::close) is discarded.
    pub fn complete_flush(&mut self, batch_id: u64, result: SyncResult<()>) -> SyncResult<()> {
        let InFlight { ledger, fresh, .. } = match self.in_flight.take() {
            Some(batch) if batch.id == batch_id => batch,
            other => {
                warn!(tab_id = %self.tab_id, batch_id, "Completion for unknown flush batch");
                self.in_flight = other;
                return Ok(());
            }
        };

        if self.closed {
            debug!(tab_id = %self.tab_id, batch_id, "Discarding flush result for closed session");
            return Ok(());
        }

        match result {
            Ok(()) => {
                info!(
                    tab_id = %self.tab_id,
                    batch_id,
                    operations = ledger.operation_count(),
                    dirty = self.is_dirty(),
                    "Flush complete"
                );
                Ok(())
            }
            Err(e) if !e.is_retryable() => {
                warn!(
                    tab_id = %self.tab_id,
                    batch_id,
                    dropped = ledger.operation_count(),
                    error = %e,
                    "Flush rejected; dropping changes"
                );
                Err(e)
            }
            Err(e) => match fresh {
                Some(fresh) => {
                    warn!(
                        tab_id = %self.tab_id,
                        batch_id,
                        dropped = ledger.operation_count().saturating_sub(fresh.operation_count()),
                        kept = fresh.operation_count(),
                        error = %e,
                        "Resend failed; dropping changes the store keeps rejecting"
                    );
                    if !fresh.is_empty() {
                        self.retry = Some(fresh);
                    }
                    Err(e)
                }
                None => {
                    warn!(
                        tab_id = %self.tab_id,
                        batch_id,
                        operations = ledger.operation_count(),
                        error = %e,
                        "Flush failed; keeping changes for the next save"
                    );
                    self.retry = Some(ledger);
                    Err(e)
                }
            },
        }
    }

    /// Closes the session. Returns how many unflushed operations were lost.
    pub fn close(&mut self) -> usize {
        if self.closed {
            return 0;
        }
        self.closed = true;

        let lost = self.pending.operation_count()
            + self.retry.as_ref().map_or(0, PendingLedger::operation_count);
        self.pending = PendingLedger::new();
        self.retry = None;

        if lost > 0 {
            warn!(tab_id = %self.tab_id, lost, "Session closed with unsaved changes");
        } else {
            info!(tab_id = %self.tab_id, "Session closed");
        }
        lost
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rabbit_core::Tab;

    fn ready_session() -> EditSession {
        let mut tab = Tab::new("Dinner", "USD");
        tab.id = "tab-1".into();
        EditSession::from_snapshot(TabSnapshot::empty(tab))
    }

    #[test]
    fn test_state_transitions() {
        let mut session = EditSession::new("tab-1");
        assert_eq!(session.state(), SessionState::Loading);
        assert!(matches!(session.add_item("Tea", 300), Err(SyncError::NotReady)));

        let mut tab = Tab::new("Dinner", "USD");
        tab.id = "tab-1".into();
        session.loaded(TabSnapshot::empty(tab));
        assert_eq!(session.state(), SessionState::Ready { dirty: false });

        session.add_item("Tea", 300).unwrap();
        assert_eq!(session.state(), SessionState::Ready { dirty: true });

        let batch = session.begin_flush().unwrap();
        assert_eq!(session.state(), SessionState::Flushing);

        session.complete_flush(batch.id, Ok(())).unwrap();
        assert_eq!(session.state(), SessionState::Ready { dirty: false });

        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(session.snapshot(), Err(SyncError::SessionClosed)));
    }

    #[test]
    fn test_edits_apply_optimistically() {
        let mut session = ready_session();
        let burger = session.add_item("  Burger ", 1000).unwrap();
        let a = session.add_rabbit("A", None).unwrap();
        let b = session.add_rabbit("B", None).unwrap();
        assert_eq!(burger.description, "Burger");
        assert_eq!(a.color, RabbitColor::Red);
        assert_eq!(b.color, RabbitColor::Orange);

        assert!(session.toggle_assignment(&burger.id, &a.id).unwrap());
        session
            .update_tab(TabPatch { tax_percent: Some(8.0), tip_percent: Some(20.0), ..Default::default() })
            .unwrap();

        let split = session.split().unwrap();
        assert_eq!(split.breakdown_for(&a.id).unwrap().total.units(), 1280);
        assert_eq!(split.breakdown_for(&b.id).unwrap().total.units(), 0);
    }

    #[test]
    fn test_rejected_edit_records_nothing() {
        let mut session = ready_session();
        assert!(matches!(session.add_item("Tea", -5), Err(SyncError::Rejected(_))));
        assert!(matches!(session.delete_item("missing"), Err(SyncError::Rejected(_))));
        assert!(session.pending().is_empty());
        assert!(session.snapshot().unwrap().items.is_empty());
    }

    #[test]
    fn test_add_then_delete_flushes_nothing() {
        let mut session = ready_session();
        let x = session.add_item("X", 100).unwrap();
        session.delete_item(&x.id).unwrap();

        assert_eq!(session.state(), SessionState::Ready { dirty: false });
        assert!(session.begin_flush().is_none());
    }

    #[test]
    fn test_edits_during_flush_go_to_fresh_ledger() {
        let mut session = ready_session();
        session.add_item("Tea", 300).unwrap();
        let batch = session.begin_flush().unwrap();
        assert_eq!(batch.ledger.new_items.len(), 1);

        session.add_item("Cake", 500).unwrap();
        assert!(session.begin_flush().is_none(), "one flush at a time");

        session.complete_flush(batch.id, Ok(())).unwrap();
        assert_eq!(session.state(), SessionState::Ready { dirty: true });

        let next = session.begin_flush().unwrap();
        assert_eq!(next.ledger.new_items.len(), 1);
        assert_eq!(next.ledger.new_items[0].description, "Cake");
    }

    #[test]
    fn test_failed_batch_rides_along_with_next_flush() {
        let mut session = ready_session();
        let tea = session.add_item("Tea", 300).unwrap();
        let batch = session.begin_flush().unwrap();

        let err = session
            .complete_flush(batch.id, Err(SyncError::Remote("offline".into())))
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(session.state(), SessionState::Ready { dirty: true });
        assert!(session.pending().is_empty());
        assert!(session.retry_batch().is_some());

        session
            .update_item(&tea.id, ItemPatch { price_cents: Some(350), ..Default::default() })
            .unwrap();
        let retry = session.begin_flush().unwrap();
        assert_eq!(retry.ledger.new_items.len(), 1);
        assert_eq!(retry.ledger.new_items[0].price_cents, 350);
        assert!(retry.ledger.item_updates.is_empty());
    }

    #[test]
    fn test_failed_resend_drops_only_the_retried_changes() {
        let mut session = ready_session();
        session.add_item("Tea", 300).unwrap();
        let first = session.begin_flush().unwrap();
        session
            .complete_flush(first.id, Err(SyncError::Remote("rejected".into())))
            .unwrap_err();

        let cake = session.add_item("Cake", 500).unwrap();
        let resend = session.begin_flush().unwrap();
        assert_eq!(resend.ledger.new_items.len(), 2);
        session
            .complete_flush(resend.id, Err(SyncError::Remote("rejected".into())))
            .unwrap_err();

        let kept = session.retry_batch().unwrap();
        assert_eq!(kept.new_items.len(), 1);
        assert_eq!(kept.new_items[0].id, cake.id);

        // Cake has now failed twice as well.
        let last = session.begin_flush().unwrap();
        session
            .complete_flush(last.id, Err(SyncError::Remote("rejected".into())))
            .unwrap_err();
        assert!(session.retry_batch().is_none());
        assert_eq!(session.state(), SessionState::Ready { dirty: false });
        assert!(session.begin_flush().is_none());
    }

    #[test]
    fn test_non_retryable_failure_drops_batch() {
        let mut session = ready_session();
        session.add_item("Tea", 300).unwrap();
        let batch = session.begin_flush().unwrap();

        let err = session
            .complete_flush(batch.id, Err(SyncError::TabNotFound("tab-1".into())))
            .unwrap_err();
        assert!(!err.is_retryable());
        assert!(session.retry_batch().is_none());
        assert_eq!(session.state(), SessionState::Ready { dirty: false });
    }

    #[test]
    fn test_close_discards_in_flight_result() {
        let mut session = ready_session();
        session.add_item("Tea", 300).unwrap();
        let batch = session.begin_flush().unwrap();
        session.add_item("Cake", 500).unwrap();

        assert_eq!(session.close(), 1);
        assert!(session
            .complete_flush(batch.id, Err(SyncError::Timeout(15)))
            .is_ok());
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.begin_flush().is_none());
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let mut session = ready_session();
        session.add_item("Tea", 300).unwrap();
        let batch = session.begin_flush().unwrap();

        session.complete_flush(batch.id + 7, Ok(())).unwrap();
        assert_eq!(session.state(), SessionState::Flushing);
    }
}
