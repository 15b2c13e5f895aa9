//! # Remote Store Adapters
//!
//! The seams between an edit session and the outside world: a relational
//! store for tabs and their rows, and a TTL key-value store for short share
//! links.
//!
//! ## Implementations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Remote Stores                                   │
//! │                                                                         │
//! │   trait RemoteStore                    trait ShareStore                 │
//! │   ├── rabbit_db::Database (SQLite)     ├── rabbit_db::Database          │
//! │   └── MemoryStore (tests, demo)        ├── RedisShareStore (SET EX)     │
//! │                                        └── MemoryStore                  │
//! │                                                                         │
//! │   Every write is idempotent: inserts are upserts, duplicate edges are  │
//! │   ignored, deleting a missing row is a no-op.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Flush Order
//! ```text
//! tab patch → insert rabbits → insert items → item/rabbit patches
//!           → delete removed edges → insert added edges
//!           → delete items → delete rabbits
//! ```
//! Parents are written before the edges that reference them, and deleted
//! after the edges that stop referencing them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rabbit_core::{
    Assignment, Item, ItemPatch, Profile, Rabbit, RabbitPatch, TabPatch, TabSnapshot,
};
use rabbit_db::Database;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::ledger::PendingLedger;

// =============================================================================
// Traits
// =============================================================================

/// Relational store holding tabs, items, rabbits and assignments.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Full current state of a tab. The only read an edit session makes.
    async fn load_tab(&self, tab_id: &str) -> SyncResult<TabSnapshot>;

    async fn load_owner_profile(&self, tab_id: &str) -> SyncResult<Option<Profile>>;

    async fn update_tab(&self, tab_id: &str, patch: &TabPatch) -> SyncResult<()>;

    async fn insert_items(&self, items: &[Item]) -> SyncResult<()>;

    async fn update_item(&self, item_id: &str, patch: &ItemPatch) -> SyncResult<()>;

    async fn delete_items(&self, item_ids: &[String]) -> SyncResult<()>;

    async fn insert_rabbits(&self, rabbits: &[Rabbit]) -> SyncResult<()>;

    async fn update_rabbit(&self, rabbit_id: &str, patch: &RabbitPatch) -> SyncResult<()>;

    async fn delete_rabbits(&self, rabbit_ids: &[String]) -> SyncResult<()>;

    async fn insert_assignments(&self, edges: &[Assignment]) -> SyncResult<()>;

    async fn delete_assignments(&self, edges: &[Assignment]) -> SyncResult<()>;
}

/// Key-value store with expiry, used for short share links.
#[async_trait]
pub trait ShareStore: Send + Sync {
    async fn set(&self, key: &str, blob: &str, ttl: Duration) -> SyncResult<()>;

    /// `None` for unknown and expired keys.
    async fn get(&self, key: &str) -> SyncResult<Option<String>>;
}

// =============================================================================
// Applying a Ledger
// =============================================================================

/// Writes one ledger to the store. Empty buckets make no calls.
pub async fn apply_ledger(
    store: &dyn RemoteStore,
    tab_id: &str,
    ledger: &PendingLedger,
) -> SyncResult<()> {
    if !ledger.tab_updates.is_empty() {
        store.update_tab(tab_id, &ledger.tab_updates).await?;
    }
    if !ledger.new_rabbits.is_empty() {
        store.insert_rabbits(&ledger.new_rabbits).await?;
    }
    if !ledger.new_items.is_empty() {
        store.insert_items(&ledger.new_items).await?;
    }
    for (item_id, patch) in &ledger.item_updates {
        store.update_item(item_id, patch).await?;
    }
    for (rabbit_id, patch) in &ledger.rabbit_updates {
        store.update_rabbit(rabbit_id, patch).await?;
    }
    if !ledger.removed_assignments.is_empty() {
        store.delete_assignments(&ledger.removed_assignments).await?;
    }
    if !ledger.added_assignments.is_empty() {
        store.insert_assignments(&ledger.added_assignments).await?;
    }
    if !ledger.deleted_item_ids.is_empty() {
        store.delete_items(&ledger.deleted_item_ids).await?;
    }
    if !ledger.deleted_rabbit_ids.is_empty() {
        store.delete_rabbits(&ledger.deleted_rabbit_ids).await?;
    }

    debug!(tab_id, operations = ledger.operation_count(), "Ledger applied");
    Ok(())
}

// =============================================================================
// SQLite Store
// =============================================================================

#[async_trait]
impl RemoteStore for Database {
    async fn load_tab(&self, tab_id: &str) -> SyncResult<TabSnapshot> {
        self.tabs()
            .load_snapshot(tab_id)
            .await?
            .ok_or_else(|| SyncError::TabNotFound(tab_id.to_string()))
    }

    async fn load_owner_profile(&self, tab_id: &str) -> SyncResult<Option<Profile>> {
        Ok(self.tabs().owner_profile(tab_id).await?)
    }

    async fn update_tab(&self, tab_id: &str, patch: &TabPatch) -> SyncResult<()> {
        Ok(self.tabs().apply_patch(tab_id, patch).await?)
    }

    async fn insert_items(&self, items: &[Item]) -> SyncResult<()> {
        Ok(self.items().insert_many(items).await?)
    }

    async fn update_item(&self, item_id: &str, patch: &ItemPatch) -> SyncResult<()> {
        if !self.items().update(item_id, patch).await? {
            debug!(item_id, "Item patch matched no row");
        }
        Ok(())
    }

    async fn delete_items(&self, item_ids: &[String]) -> SyncResult<()> {
        self.items().delete_many(item_ids).await?;
        Ok(())
    }

    async fn insert_rabbits(&self, rabbits: &[Rabbit]) -> SyncResult<()> {
        Ok(self.rabbits().insert_many(rabbits).await?)
    }

    async fn update_rabbit(&self, rabbit_id: &str, patch: &RabbitPatch) -> SyncResult<()> {
        if !self.rabbits().update(rabbit_id, patch).await? {
            debug!(rabbit_id, "Rabbit patch matched no row");
        }
        Ok(())
    }

    async fn delete_rabbits(&self, rabbit_ids: &[String]) -> SyncResult<()> {
        self.rabbits().delete_many(rabbit_ids).await?;
        Ok(())
    }

    async fn insert_assignments(&self, edges: &[Assignment]) -> SyncResult<()> {
        Ok(self.assignments().insert_many(edges).await?)
    }

    async fn delete_assignments(&self, edges: &[Assignment]) -> SyncResult<()> {
        self.assignments().delete_many(edges).await?;
        Ok(())
    }
}

#[async_trait]
impl ShareStore for Database {
    async fn set(&self, key: &str, blob: &str, ttl: Duration) -> SyncResult<()> {
        self.share_links()
            .put(key, blob, ttl)
            .await
            .map_err(|e| SyncError::ShareStore(e.to_string()))
    }

    async fn get(&self, key: &str) -> SyncResult<Option<String>> {
        self.share_links()
            .get(key)
            .await
            .map_err(|e| SyncError::ShareStore(e.to_string()))
    }
}

// =============================================================================
// Redis Share Store
// =============================================================================

/// Short links in Redis, one `SET key blob EX ttl` per link.
#[derive(Debug, Clone)]
pub struct RedisShareStore {
    client: redis::Client,
    prefix: String,
}

impl RedisShareStore {
    pub fn open(redis_url: &str) -> SyncResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(RedisShareStore {
            client,
            prefix: "bill:".to_string(),
        })
    }

    /// Round-trips a PING.
    pub async fn ping(&self) -> SyncResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn key(&self, token: &str) -> String {
        format!("{}{}", self.prefix, token)
    }
}

#[async_trait]
impl ShareStore for RedisShareStore {
    async fn set(&self, key: &str, blob: &str, ttl: Duration) -> SyncResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(self.key(key), blob, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> SyncResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let blob: Option<String> = conn.get(self.key(key)).await?;
        Ok(blob)
    }
}

// =============================================================================
// In-Memory Store
// =============================================================================

/// One successful write seen by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOp {
    UpdateTab { tab_id: String, patch: TabPatch },
    InsertItems(Vec<String>),
    UpdateItem(String),
    DeleteItems(Vec<String>),
    InsertRabbits(Vec<String>),
    UpdateRabbit(String),
    DeleteRabbits(Vec<String>),
    InsertAssignments(Vec<Assignment>),
    DeleteAssignments(Vec<Assignment>),
}

impl RemoteOp {
    /// True if this operation names `id` as an item, rabbit or edge end.
    pub fn mentions(&self, id: &str) -> bool {
        match self {
            RemoteOp::UpdateTab { tab_id, .. } => tab_id == id,
            RemoteOp::InsertItems(ids)
            | RemoteOp::DeleteItems(ids)
            | RemoteOp::InsertRabbits(ids)
            | RemoteOp::DeleteRabbits(ids) => ids.iter().any(|i| i == id),
            RemoteOp::UpdateItem(i) | RemoteOp::UpdateRabbit(i) => i == id,
            RemoteOp::InsertAssignments(edges) | RemoteOp::DeleteAssignments(edges) => edges
                .iter()
                .any(|e| e.item_id == id || e.rabbit_id == id),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    tabs: HashMap<String, TabSnapshot>,
    owners: HashMap<String, Profile>,
    shares: HashMap<String, (String, Instant)>,
    ops: Vec<RemoteOp>,
    fail_next: usize,
    offline: bool,
    latency: Duration,
}

impl MemoryState {
    fn check_available(&mut self) -> SyncResult<()> {
        if self.offline {
            return Err(SyncError::Remote("store is offline".into()));
        }
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(SyncError::Remote("injected failure".into()));
        }
        Ok(())
    }

    fn tab_mut(&mut self, tab_id: &str) -> SyncResult<&mut TabSnapshot> {
        self.tabs
            .get_mut(tab_id)
            .ok_or_else(|| SyncError::Remote(format!("foreign key violation: tab {}", tab_id)))
    }

    fn tab_of_item(&mut self, item_id: &str) -> Option<&mut TabSnapshot> {
        self.tabs.values_mut().find(|t| t.item(item_id).is_some())
    }

    fn tab_of_rabbit(&mut self, rabbit_id: &str) -> Option<&mut TabSnapshot> {
        self.tabs.values_mut().find(|t| t.rabbit(rabbit_id).is_some())
    }
}

/// In-memory [`RemoteStore`] and [`ShareStore`] that records every write.
///
/// Failures, latency and an offline switch can be injected. Behaves like
/// the SQLite store: upserts, cascading deletes, foreign key checks.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

struct ActiveCall<'a>(&'a AtomicUsize);

impl Drop for ActiveCall<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a tab.
    pub async fn insert_tab(&self, snapshot: TabSnapshot) {
        let mut state = self.state.lock().await;
        state.tabs.insert(snapshot.tab.id.clone(), snapshot);
    }

    pub async fn set_owner_profile(&self, tab_id: &str, profile: Profile) {
        self.state
            .lock()
            .await
            .owners
            .insert(tab_id.to_string(), profile);
    }

    /// Current stored state of a tab.
    pub async fn tab(&self, tab_id: &str) -> Option<TabSnapshot> {
        self.state.lock().await.tabs.get(tab_id).cloned()
    }

    /// Writes seen so far, oldest first.
    pub async fn operations(&self) -> Vec<RemoteOp> {
        self.state.lock().await.ops.clone()
    }

    /// Makes the next `n` calls fail.
    pub async fn fail_next(&self, n: usize) {
        self.state.lock().await.fail_next = n;
    }

    pub async fn set_offline(&self, offline: bool) {
        self.state.lock().await.offline = offline;
    }

    /// Delay added to every call.
    pub async fn set_latency(&self, latency: Duration) {
        self.state.lock().await.latency = latency;
    }

    /// Largest number of calls ever in progress at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    async fn call<T: Send>(
        &self,
        op: Option<RemoteOp>,
        f: impl FnOnce(&mut MemoryState) -> SyncResult<T> + Send,
    ) -> SyncResult<T> {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _active = ActiveCall(&self.active);
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        let latency = self.state.lock().await.latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock().await;
        state.check_available()?;
        let out = f(&mut state)?;
        if let Some(op) = op {
            state.ops.push(op);
        }
        Ok(out)
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn load_tab(&self, tab_id: &str) -> SyncResult<TabSnapshot> {
        self.call(None, |state| {
            state
                .tabs
                .get(tab_id)
                .cloned()
                .ok_or_else(|| SyncError::TabNotFound(tab_id.to_string()))
        })
        .await
    }

    async fn load_owner_profile(&self, tab_id: &str) -> SyncResult<Option<Profile>> {
        self.call(None, |state| Ok(state.owners.get(tab_id).cloned()))
            .await
    }

    async fn update_tab(&self, tab_id: &str, patch: &TabPatch) -> SyncResult<()> {
        let op = RemoteOp::UpdateTab {
            tab_id: tab_id.to_string(),
            patch: patch.clone(),
        };
        self.call(Some(op), |state| {
            let snapshot = state
                .tabs
                .get_mut(tab_id)
                .ok_or_else(|| SyncError::TabNotFound(tab_id.to_string()))?;
            patch.apply_to(&mut snapshot.tab);
            Ok(())
        })
        .await
    }

    async fn insert_items(&self, items: &[Item]) -> SyncResult<()> {
        let op = RemoteOp::InsertItems(items.iter().map(|i| i.id.clone()).collect());
        self.call(Some(op), |state| {
            for item in items {
                state.tab_mut(&item.tab_id)?;
            }
            for item in items {
                let snapshot = state.tab_mut(&item.tab_id)?;
                match snapshot.items.iter_mut().find(|i| i.id == item.id) {
                    Some(existing) => *existing = item.clone(),
                    None => snapshot.items.push(item.clone()),
                }
            }
            Ok(())
        })
        .await
    }

    async fn update_item(&self, item_id: &str, patch: &ItemPatch) -> SyncResult<()> {
        self.call(Some(RemoteOp::UpdateItem(item_id.to_string())), |state| {
            if let Some(snapshot) = state.tab_of_item(item_id) {
                if let Some(item) = snapshot.items.iter_mut().find(|i| i.id == item_id) {
                    patch.apply_to(item);
                }
            }
            Ok(())
        })
        .await
    }

    async fn delete_items(&self, item_ids: &[String]) -> SyncResult<()> {
        self.call(Some(RemoteOp::DeleteItems(item_ids.to_vec())), |state| {
            for snapshot in state.tabs.values_mut() {
                snapshot.items.retain(|i| !item_ids.contains(&i.id));
                snapshot.assignments.retain(|a| !item_ids.contains(&a.item_id));
            }
            Ok(())
        })
        .await
    }

    async fn insert_rabbits(&self, rabbits: &[Rabbit]) -> SyncResult<()> {
        let op = RemoteOp::InsertRabbits(rabbits.iter().map(|r| r.id.clone()).collect());
        self.call(Some(op), |state| {
            for rabbit in rabbits {
                state.tab_mut(&rabbit.tab_id)?;
            }
            for rabbit in rabbits {
                let snapshot = state.tab_mut(&rabbit.tab_id)?;
                match snapshot.rabbits.iter_mut().find(|r| r.id == rabbit.id) {
                    Some(existing) => *existing = rabbit.clone(),
                    None => snapshot.rabbits.push(rabbit.clone()),
                }
            }
            Ok(())
        })
        .await
    }

    async fn update_rabbit(&self, rabbit_id: &str, patch: &RabbitPatch) -> SyncResult<()> {
        self.call(Some(RemoteOp::UpdateRabbit(rabbit_id.to_string())), |state| {
            if let Some(snapshot) = state.tab_of_rabbit(rabbit_id) {
                if let Some(rabbit) = snapshot.rabbits.iter_mut().find(|r| r.id == rabbit_id) {
                    patch.apply_to(rabbit);
                }
            }
            Ok(())
        })
        .await
    }

    async fn delete_rabbits(&self, rabbit_ids: &[String]) -> SyncResult<()> {
        self.call(Some(RemoteOp::DeleteRabbits(rabbit_ids.to_vec())), |state| {
            for snapshot in state.tabs.values_mut() {
                snapshot.rabbits.retain(|r| !rabbit_ids.contains(&r.id));
                snapshot.assignments.retain(|a| !rabbit_ids.contains(&a.rabbit_id));
            }
            Ok(())
        })
        .await
    }

    async fn insert_assignments(&self, edges: &[Assignment]) -> SyncResult<()> {
        self.call(Some(RemoteOp::InsertAssignments(edges.to_vec())), |state| {
            for edge in edges {
                let known = state
                    .tabs
                    .values()
                    .any(|t| t.item(&edge.item_id).is_some() && t.rabbit(&edge.rabbit_id).is_some());
                if !known {
                    return Err(SyncError::Remote(format!(
                        "foreign key violation: assignment {}/{}",
                        edge.item_id, edge.rabbit_id
                    )));
                }
            }
            for edge in edges {
                if let Some(snapshot) = state.tab_of_item(&edge.item_id) {
                    if !snapshot.assignments.contains(edge) {
                        snapshot.assignments.push(edge.clone());
                    }
                }
            }
            Ok(())
        })
        .await
    }

    async fn delete_assignments(&self, edges: &[Assignment]) -> SyncResult<()> {
        self.call(Some(RemoteOp::DeleteAssignments(edges.to_vec())), |state| {
            for snapshot in state.tabs.values_mut() {
                snapshot.assignments.retain(|a| !edges.contains(a));
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ShareStore for MemoryStore {
    async fn set(&self, key: &str, blob: &str, ttl: Duration) -> SyncResult<()> {
        let expires_at = Instant::now() + ttl;
        self.call(None, |state| {
            state
                .shares
                .insert(key.to_string(), (blob.to_string(), expires_at));
            Ok(())
        })
        .await
    }

    async fn get(&self, key: &str) -> SyncResult<Option<String>> {
        let now = Instant::now();
        self.call(None, |state| {
            let expired = matches!(state.shares.get(key), Some((_, at)) if *at <= now);
            if expired {
                state.shares.remove(key);
            }
            Ok(state.shares.get(key).map(|(blob, _)| blob.clone()))
        })
        .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
