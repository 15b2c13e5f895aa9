//! # Tab Agent
//!
//! Async owner of one [`EditSession`]. Serialises every edit through a
//! command queue, runs the debounce timer and keeps at most one flush in
//! flight.
//!
//! ## Agent Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        TabAgent Architecture                            │
//! │                                                                         │
//! │   TabAgentHandle (clone freely)                                        │
//! │        │  Command + oneshot reply                                      │
//! │        ▼                                                                │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                       TabAgent::run                              │  │
//! │  │                                                                  │  │
//! │  │   select! {                                                      │  │
//! │  │     command      → apply to EditSession, re-arm debounce         │  │
//! │  │     debounce     → request flush                                 │  │
//! │  │     flush done   → complete_flush, reply to savers, run queued   │  │
//! │  │   }                                                              │  │
//! │  └──────────────────────────────┬───────────────────────────────────┘  │
//! │                                 │ spawn (one at a time)                │
//! │                                 ▼                                       │
//! │                  timeout(apply_ledger(store, batch))                   │
//! │                                                                         │
//! │  Flush requests that arrive while one is in flight are coalesced into  │
//! │  a single follow-up flush.                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use rabbit_core::{
    Item, ItemPatch, Profile, Rabbit, RabbitColor, RabbitPatch, SharedTabData, SplitSummary,
    TabPatch, TabSnapshot,
};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::config::SessionSettings;
use crate::error::{SyncError, SyncResult};
use crate::ledger::PendingLedger;
use crate::remote::{apply_ledger, RemoteStore};
use crate::session::{EditSession, SessionState};

/// Capacity of the command queue.
const COMMAND_BUFFER: usize = 64;

type Reply<T> = oneshot::Sender<T>;

// =============================================================================
// Commands
// =============================================================================

enum Command {
    UpdateTab { patch: TabPatch, reply: Reply<SyncResult<()>> },
    AddItem { description: String, price_cents: i64, reply: Reply<SyncResult<Item>> },
    UpdateItem { item_id: String, patch: ItemPatch, reply: Reply<SyncResult<()>> },
    DeleteItem { item_id: String, reply: Reply<SyncResult<Item>> },
    AddRabbit { name: String, color: Option<RabbitColor>, reply: Reply<SyncResult<Rabbit>> },
    UpdateRabbit { rabbit_id: String, patch: RabbitPatch, reply: Reply<SyncResult<()>> },
    RemoveRabbit { rabbit_id: String, reply: Reply<SyncResult<Rabbit>> },
    ToggleAssignment { item_id: String, rabbit_id: String, reply: Reply<SyncResult<bool>> },
    Snapshot { reply: Reply<SyncResult<TabSnapshot>> },
    Split { reply: Reply<SyncResult<SplitSummary>> },
    Shared { reply: Reply<SyncResult<SharedTabData>> },
    State { reply: Reply<SessionState> },
    Pending { reply: Reply<PendingLedger> },
    Save { reply: Reply<SyncResult<()>> },
    Close { reply: Reply<usize> },
}

struct FlushDone {
    batch_id: u64,
    result: SyncResult<()>,
}

// =============================================================================
// Tab Agent
// =============================================================================

pub struct TabAgent {
    session: EditSession,
    store: Arc<dyn RemoteStore>,
    owner_profile: Option<Profile>,
    settings: SessionSettings,

    command_rx: mpsc::Receiver<Command>,
    done_tx: mpsc::Sender<FlushDone>,
    done_rx: mpsc::Receiver<FlushDone>,

    /// When the debounce timer fires, if armed.
    deadline: Option<Instant>,

    /// Savers waiting on the flush in flight.
    in_flight_waiters: Vec<Reply<SyncResult<()>>>,

    /// Set when a flush was requested while another was in flight.
    flush_queued: bool,
    queued_waiters: Vec<Reply<SyncResult<()>>>,
}

impl TabAgent {
    /// Loads `tab_id` from the store and spawns an agent for it.
    ///
    /// The load is the only read the session ever makes; all later reads
    /// are served from memory.
    pub async fn open(
        store: Arc<dyn RemoteStore>,
        tab_id: &str,
        settings: SessionSettings,
    ) -> SyncResult<TabAgentHandle> {
        let mut session = EditSession::new(tab_id);

        let snapshot = tokio::time::timeout(settings.flush_timeout(), store.load_tab(tab_id))
            .await
            .map_err(|_| SyncError::Timeout(settings.flush_timeout_secs))??;
        session.loaded(snapshot);

        let owner_profile = match store.load_owner_profile(tab_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(tab_id, error = %e, "Could not load owner profile");
                None
            }
        };

        let (agent, handle) = Self::new(session, store, owner_profile, settings);
        tokio::spawn(agent.run());
        Ok(handle)
    }

    /// Creates an agent around an already loaded session.
    pub fn new(
        session: EditSession,
        store: Arc<dyn RemoteStore>,
        owner_profile: Option<Profile>,
        settings: SessionSettings,
    ) -> (Self, TabAgentHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (done_tx, done_rx) = mpsc::channel(1);

        let handle = TabAgentHandle {
            tab_id: Arc::from(session.tab_id()),
            commands: command_tx,
        };
        let agent = TabAgent {
            session,
            store,
            owner_profile,
            settings,
            command_rx,
            done_tx,
            done_rx,
            deadline: None,
            in_flight_waiters: Vec::new(),
            flush_queued: false,
            queued_waiters: Vec::new(),
        };
        (agent, handle)
    }

    /// Runs the agent loop until closed or every handle is dropped.
    pub async fn run(mut self) {
        info!(tab_id = %self.session.tab_id(), "Tab agent starting");

        loop {
            let deadline = self.deadline;
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command) {
                            break;
                        }
                    }
                    None => {
                        self.shutdown();
                        break;
                    }
                },

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.deadline = None;
                    debug!(tab_id = %self.session.tab_id(), "Debounce elapsed");
                    self.request_flush(None);
                }

                Some(done) = self.done_rx.recv() => self.finish_flush(done),
            }
        }

        info!(tab_id = %self.session.tab_id(), "Tab agent stopped");
    }

    /// Applies one command. Returns true once the agent should stop.
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::UpdateTab { patch, reply } => {
                let result = self.session.update_tab(patch);
                self.after_edit(result.is_ok());
                let _ = reply.send(result);
            }
            Command::AddItem { description, price_cents, reply } => {
                let result = self.session.add_item(&description, price_cents);
                self.after_edit(result.is_ok());
                let _ = reply.send(result);
            }
            Command::UpdateItem { item_id, patch, reply } => {
                let result = self.session.update_item(&item_id, patch);
                self.after_edit(result.is_ok());
                let _ = reply.send(result);
            }
            Command::DeleteItem { item_id, reply } => {
                let result = self.session.delete_item(&item_id);
                self.after_edit(result.is_ok());
                let _ = reply.send(result);
            }
            Command::AddRabbit { name, color, reply } => {
                let result = self.session.add_rabbit(&name, color);
                self.after_edit(result.is_ok());
                let _ = reply.send(result);
            }
            Command::UpdateRabbit { rabbit_id, patch, reply } => {
                let result = self.session.update_rabbit(&rabbit_id, patch);
                self.after_edit(result.is_ok());
                let _ = reply.send(result);
            }
            Command::RemoveRabbit { rabbit_id, reply } => {
                let result = self.session.remove_rabbit(&rabbit_id);
                self.after_edit(result.is_ok());
                let _ = reply.send(result);
            }
            Command::ToggleAssignment { item_id, rabbit_id, reply } => {
                let result = self.session.toggle_assignment(&item_id, &rabbit_id);
                self.after_edit(result.is_ok());
                let _ = reply.send(result);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.session.snapshot().cloned());
            }
            Command::Split { reply } => {
                let _ = reply.send(self.session.split());
            }
            Command::Shared { reply } => {
                let shared = self
                    .session
                    .snapshot()
                    .map(|s| s.to_shared(self.owner_profile.clone()));
                let _ = reply.send(shared);
            }
            Command::State { reply } => {
                let _ = reply.send(self.session.state());
            }
            Command::Pending { reply } => {
                let _ = reply.send(self.session.pending().clone());
            }
            Command::Save { reply } => {
                self.deadline = None;
                self.request_flush(Some(reply));
            }
            Command::Close { reply } => {
                let _ = reply.send(self.shutdown());
                return true;
            }
        }
        false
    }

    /// Re-arms the debounce timer after a successful edit.
    fn after_edit(&mut self, applied: bool) {
        if applied {
            self.deadline = Some(Instant::now() + self.settings.debounce());
        }
    }

    // =========================================================================
    // Flushing
    // =========================================================================

    fn request_flush(&mut self, waiter: Option<Reply<SyncResult<()>>>) {
        if self.session.is_flushing() {
            debug!(tab_id = %self.session.tab_id(), "Flush in flight, queueing another");
            self.flush_queued = true;
            self.queued_waiters.extend(waiter);
            return;
        }
        self.start_flush(waiter.into_iter().collect());
    }

    fn start_flush(&mut self, waiters: Vec<Reply<SyncResult<()>>>) {
        let Some(batch) = self.session.begin_flush() else {
            for waiter in waiters {
                let _ = waiter.send(Ok(()));
            }
            return;
        };
        self.in_flight_waiters = waiters;

        let store = self.store.clone();
        let done_tx = self.done_tx.clone();
        let timeout = self.settings.flush_timeout();
        let timeout_secs = self.settings.flush_timeout_secs;

        tokio::spawn(async move {
            let result = tokio::time::timeout(
                timeout,
                apply_ledger(store.as_ref(), &batch.tab_id, &batch.ledger),
            )
            .await
            .unwrap_or(Err(SyncError::Timeout(timeout_secs)));

            if done_tx
                .send(FlushDone { batch_id: batch.id, result })
                .await
                .is_err()
            {
                debug!(tab_id = %batch.tab_id, batch_id = batch.id, "Agent gone, flush result dropped");
            }
        });
    }

    fn finish_flush(&mut self, done: FlushDone) {
        let outcome = self.session.complete_flush(done.batch_id, done.result);
        let failure = outcome.err().map(|e| e.to_string());

        for waiter in std::mem::take(&mut self.in_flight_waiters) {
            let reply = match &failure {
                None => Ok(()),
                Some(message) => Err(SyncError::FlushFailed(message.clone())),
            };
            let _ = waiter.send(reply);
        }

        if self.flush_queued {
            self.flush_queued = false;
            let queued = std::mem::take(&mut self.queued_waiters);
            self.start_flush(queued);
        }
    }

    /// Cancels the timer, closes the session and fails every pending save.
    fn shutdown(&mut self) -> usize {
        self.deadline = None;
        self.flush_queued = false;

        let waiters = std::mem::take(&mut self.in_flight_waiters)
            .into_iter()
            .chain(std::mem::take(&mut self.queued_waiters));
        for waiter in waiters {
            let _ = waiter.send(Err(SyncError::SessionClosed));
        }

        self.session.close()
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Cheap, cloneable handle to a running [`TabAgent`].
#[derive(Clone)]
pub struct TabAgentHandle {
    tab_id: Arc<str>,
    commands: mpsc::Sender<Command>,
}

impl TabAgentHandle {
    pub fn tab_id(&self) -> &str {
        &self.tab_id
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> SyncResult<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| SyncError::SessionClosed)?;
        rx.await.map_err(|_| SyncError::SessionClosed)
    }

    pub async fn update_tab(&self, patch: TabPatch) -> SyncResult<()> {
        self.request(|reply| Command::UpdateTab { patch, reply }).await?
    }

    pub async fn add_item(&self, description: impl Into<String>, price_cents: i64) -> SyncResult<Item> {
        let description = description.into();
        self.request(|reply| Command::AddItem { description, price_cents, reply })
            .await?
    }

    pub async fn update_item(&self, item_id: &str, patch: ItemPatch) -> SyncResult<()> {
        let item_id = item_id.to_string();
        self.request(|reply| Command::UpdateItem { item_id, patch, reply })
            .await?
    }

    pub async fn delete_item(&self, item_id: &str) -> SyncResult<Item> {
        let item_id = item_id.to_string();
        self.request(|reply| Command::DeleteItem { item_id, reply }).await?
    }

    pub async fn add_rabbit(
        &self,
        name: impl Into<String>,
        color: Option<RabbitColor>,
    ) -> SyncResult<Rabbit> {
        let name = name.into();
        self.request(|reply| Command::AddRabbit { name, color, reply })
            .await?
    }

    pub async fn update_rabbit(&self, rabbit_id: &str, patch: RabbitPatch) -> SyncResult<()> {
        let rabbit_id = rabbit_id.to_string();
        self.request(|reply| Command::UpdateRabbit { rabbit_id, patch, reply })
            .await?
    }

    pub async fn remove_rabbit(&self, rabbit_id: &str) -> SyncResult<Rabbit> {
        let rabbit_id = rabbit_id.to_string();
        self.request(|reply| Command::RemoveRabbit { rabbit_id, reply })
            .await?
    }

    /// Flips an edge. Returns `true` if the pair is now assigned.
    pub async fn toggle_assignment(&self, item_id: &str, rabbit_id: &str) -> SyncResult<bool> {
        let item_id = item_id.to_string();
        let rabbit_id = rabbit_id.to_string();
        self.request(|reply| Command::ToggleAssignment { item_id, rabbit_id, reply })
            .await?
    }

    pub async fn snapshot(&self) -> SyncResult<TabSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await?
    }

    pub async fn split(&self) -> SyncResult<SplitSummary> {
        self.request(|reply| Command::Split { reply }).await?
    }

    /// Current bill plus the owner's payment profile, ready to share.
    pub async fn shared_data(&self) -> SyncResult<SharedTabData> {
        self.request(|reply| Command::Shared { reply }).await?
    }

    pub async fn state(&self) -> SyncResult<SessionState> {
        self.request(|reply| Command::State { reply }).await
    }

    /// Edits recorded since the last flush started.
    pub async fn pending(&self) -> SyncResult<PendingLedger> {
        self.request(|reply| Command::Pending { reply }).await
    }

    /// Flushes now, cancelling the debounce timer. Resolves when the flush
    /// that carries every edit made so far has finished.
    pub async fn save(&self) -> SyncResult<()> {
        self.request(|reply| Command::Save { reply }).await?
    }

    /// Closes the session. Returns how many unsaved operations were dropped.
    pub async fn close(&self) -> SyncResult<usize> {
        self.request(|reply| Command::Close { reply }).await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryStore, RemoteOp};
    use rabbit_core::{Assignment, Tab};
    use std::time::Duration;

    fn settings() -> SessionSettings {
        SessionSettings {
            debounce_ms: 1000,
            flush_timeout_secs: 15,
        }
    }

    async fn open_empty(store: &Arc<MemoryStore>) -> TabAgentHandle {
        let tab = Tab::new("Dinner", "USD");
        let tab_id = tab.id.clone();
        store.insert_tab(TabSnapshot::empty(tab)).await;
        TabAgent::open(store.clone(), &tab_id, settings()).await.unwrap()
    }

    fn insert_item_ops(ops: &[RemoteOp]) -> Vec<Vec<String>> {
        ops.iter()
            .filter_map(|op| match op {
                RemoteOp::InsertItems(ids) => Some(ids.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_missing_tab_fails() {
        let store = Arc::new(MemoryStore::new());
        let result = TabAgent::open(store, "missing", settings()).await;
        assert!(matches!(result, Err(SyncError::TabNotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_resets_on_each_edit() {
        let store = Arc::new(MemoryStore::new());
        let handle = open_empty(&store).await;

        let tea = handle.add_item("Tea", 300).await.unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        let cake = handle.add_item("Cake", 500).await.unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(store.operations().await.is_empty());
        assert_eq!(handle.state().await.unwrap(), SessionState::Ready { dirty: true });

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(
            insert_item_ops(&store.operations().await),
            vec![vec![tea.id, cake.id]]
        );
        assert_eq!(handle.state().await.unwrap(), SessionState::Ready { dirty: false });
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_then_delete_sends_nothing() {
        let store = Arc::new(MemoryStore::new());
        let handle = open_empty(&store).await;

        let x = handle.add_item("X", 100).await.unwrap();
        handle.delete_item(&x.id).await.unwrap();
        handle.save().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        let ops = store.operations().await;
        assert!(ops.iter().all(|op| !op.mentions(&x.id)));
        assert!(ops.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_twice_sends_nothing() {
        let store = Arc::new(MemoryStore::new());
        let tab = Tab::new("Dinner", "USD");
        let mut snapshot = TabSnapshot::empty(tab.clone());
        let item = Item::new(&tab.id, "Fries", 400);
        let rabbit = Rabbit::new(&tab.id, "A", RabbitColor::Red);
        snapshot.items.push(item.clone());
        snapshot.rabbits.push(rabbit.clone());
        store.insert_tab(snapshot).await;

        let handle = TabAgent::open(store.clone(), &tab.id, settings()).await.unwrap();
        assert!(handle.toggle_assignment(&item.id, &rabbit.id).await.unwrap());
        assert!(!handle.toggle_assignment(&item.id, &rabbit.id).await.unwrap());

        assert!(handle.pending().await.unwrap().is_empty());
        assert!(handle.snapshot().await.unwrap().assignments.is_empty());
        handle.save().await.unwrap();
        assert!(store.operations().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_flush_is_kept_without_auto_retry() {
        let store = Arc::new(MemoryStore::new());
        let handle = open_empty(&store).await;

        store.fail_next(1).await;
        let tea = handle.add_item("Tea", 300).await.unwrap();
        let err = handle.save().await.unwrap_err();
        assert!(matches!(err, SyncError::FlushFailed(_)));
        assert_eq!(handle.state().await.unwrap(), SessionState::Ready { dirty: true });

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(store.operations().await.is_empty());

        handle.save().await.unwrap();
        assert_eq!(insert_item_ops(&store.operations().await), vec![vec![tea.id]]);
        assert_eq!(handle.state().await.unwrap(), SessionState::Ready { dirty: false });
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_edit_retries_failed_batch() {
        let store = Arc::new(MemoryStore::new());
        let handle = open_empty(&store).await;

        store.fail_next(1).await;
        let tea = handle.add_item("Tea", 300).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(handle.state().await.unwrap(), SessionState::Ready { dirty: true });

        let cake = handle.add_item("Cake", 500).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let stored = store.tab(handle.tab_id()).await.unwrap();
        let ids: Vec<_> = stored.items.iter().map(|i| i.id.clone()).collect();
        assert_eq!(ids, vec![tea.id, cake.id]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_edge_does_not_block_later_saves() {
        let store = Arc::new(MemoryStore::new());
        let tab = Tab::new("Dinner", "USD");
        let mut snapshot = TabSnapshot::empty(tab.clone());
        let item = Item::new(&tab.id, "Fries", 400);
        let rabbit = Rabbit::new(&tab.id, "A", RabbitColor::Red);
        snapshot.items.push(item.clone());
        snapshot.rabbits.push(rabbit.clone());
        store.insert_tab(snapshot).await;

        let handle = TabAgent::open(store.clone(), &tab.id, settings()).await.unwrap();
        // Another device deletes the item after this session loaded it.
        store.delete_items(&[item.id.clone()]).await.unwrap();

        assert!(handle.toggle_assignment(&item.id, &rabbit.id).await.unwrap());
        assert!(matches!(handle.save().await, Err(SyncError::FlushFailed(_))));
        assert_eq!(handle.state().await.unwrap(), SessionState::Ready { dirty: true });

        let cake = handle.add_item("Cake", 500).await.unwrap();
        assert!(matches!(handle.save().await, Err(SyncError::FlushFailed(_))));

        handle.save().await.unwrap();
        assert_eq!(handle.state().await.unwrap(), SessionState::Ready { dirty: false });

        let stored = store.tab(&tab.id).await.unwrap();
        assert!(stored.items.iter().any(|i| i.id == cake.id));
        assert!(stored.assignments.is_empty());

        handle.add_item("Pie", 300).await.unwrap();
        handle.save().await.unwrap();
        assert_eq!(store.tab(&tab.id).await.unwrap().items.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_during_flush_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let handle = open_empty(&store).await;
        store.set_latency(Duration::from_millis(500)).await;

        handle.add_item("Tea", 300).await.unwrap();
        let saver = handle.clone();
        let first = tokio::spawn(async move { saver.save().await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(handle.state().await.unwrap(), SessionState::Flushing);
        let cake = handle.add_item("Cake", 500).await.unwrap();
        assert_eq!(handle.pending().await.unwrap().new_items.len(), 1);

        first.await.unwrap().unwrap();
        assert_eq!(handle.state().await.unwrap(), SessionState::Ready { dirty: true });

        handle.save().await.unwrap();
        let stored = store.tab(handle.tab_id()).await.unwrap();
        assert!(stored.items.iter().any(|i| i.id == cake.id));
        assert_eq!(stored.items.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_timeout_is_a_failure() {
        let store = Arc::new(MemoryStore::new());
        let tab = Tab::new("Dinner", "USD");
        let tab_id = tab.id.clone();
        store.insert_tab(TabSnapshot::empty(tab)).await;
        let settings = SessionSettings {
            debounce_ms: 1000,
            flush_timeout_secs: 1,
        };
        let handle = TabAgent::open(store.clone(), &tab_id, settings).await.unwrap();

        store.set_latency(Duration::from_secs(5)).await;
        handle.add_item("Tea", 300).await.unwrap();
        let err = handle.save().await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert_eq!(handle.state().await.unwrap(), SessionState::Ready { dirty: true });
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_during_flush() {
        let store = Arc::new(MemoryStore::new());
        let handle = open_empty(&store).await;
        store.set_latency(Duration::from_millis(500)).await;

        let tea = handle.add_item("Tea", 300).await.unwrap();
        let saver = handle.clone();
        let save = tokio::spawn(async move { saver.save().await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        handle.add_item("Cake", 500).await.unwrap();
        assert_eq!(handle.close().await.unwrap(), 1);
        assert!(matches!(save.await.unwrap(), Err(SyncError::SessionClosed)));

        // The outstanding flush still lands; only its result is dropped.
        tokio::time::sleep(Duration::from_secs(1)).await;
        let stored = store.tab(handle.tab_id()).await.unwrap();
        assert_eq!(stored.items.len(), 1);
        assert_eq!(stored.items[0].id, tea.id);

        assert!(matches!(handle.state().await, Err(SyncError::SessionClosed)));
        assert!(matches!(handle.add_item("Pie", 1).await, Err(SyncError::SessionClosed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_requests_are_coalesced() {
        let store = Arc::new(MemoryStore::new());
        let handle = open_empty(&store).await;
        store.set_latency(Duration::from_millis(300)).await;

        let a = handle.add_item("A", 100).await.unwrap();
        let h1 = handle.clone();
        let s1 = tokio::spawn(async move { h1.save().await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let b = handle.add_item("B", 200).await.unwrap();
        let h2 = handle.clone();
        let s2 = tokio::spawn(async move { h2.save().await });
        let c = handle.add_item("C", 300).await.unwrap();
        let h3 = handle.clone();
        let s3 = tokio::spawn(async move { h3.save().await });

        s1.await.unwrap().unwrap();
        s2.await.unwrap().unwrap();
        s3.await.unwrap().unwrap();

        assert_eq!(store.max_concurrent(), 1);
        assert_eq!(
            insert_item_ops(&store.operations().await),
            vec![vec![a.id], vec![b.id, c.id]]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_data_carries_owner_profile() {
        let store = Arc::new(MemoryStore::new());
        let tab = Tab::new("Dinner", "USD");
        let tab_id = tab.id.clone();
        store.insert_tab(TabSnapshot::empty(tab)).await;
        store
            .set_owner_profile(
                &tab_id,
                Profile {
                    venmo_username: Some("ana".into()),
                    currency_code: "USD".into(),
                    ..Default::default()
                },
            )
            .await;

        let handle = TabAgent::open(store.clone(), &tab_id, settings()).await.unwrap();
        let item = handle.add_item("Burger", 1000).await.unwrap();
        let rabbit = handle.add_rabbit("A", None).await.unwrap();
        handle.toggle_assignment(&item.id, &rabbit.id).await.unwrap();

        let shared = handle.shared_data().await.unwrap();
        assert_eq!(shared.assignments, vec![Assignment::new(&item.id, &rabbit.id)]);
        assert_eq!(
            shared.owner_profile.and_then(|p| p.venmo_username).as_deref(),
            Some("ana")
        );
        assert_eq!(handle.split().await.unwrap().grand_total.units(), 1000);
    }
}
