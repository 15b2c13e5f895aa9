//! # rabbit-sync: Local-First Edit Sessions for Rabbit Tab
//!
//! Lets a client edit a bill entirely in memory while the edits trickle
//! to the remote store in the background, and turns bills into share links.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Edit Session Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                TabAgent (one Tokio task per open tab)            │  │
//! │  │                                                                  │  │
//! │  │  command queue ──► EditSession ──► PendingLedger                 │  │
//! │  │  debounce timer                    (cancel-outs)                 │  │
//! │  │  one flush in flight, extra requests coalesced                   │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │ apply_ledger                            │
//! │                               ▼                                         │
//! │  ┌────────────────────────┐        ┌────────────────────────────────┐  │
//! │  │ RemoteStore            │        │ ShareService                   │  │
//! │  │  rabbit_db::Database   │        │  compact tokens (no server)    │  │
//! │  │  MemoryStore           │        │  short links via ShareStore:   │  │
//! │  └────────────────────────┘        │  SQLite, Redis, MemoryStore    │  │
//! │                                    └────────────────────────────────┘  │
//! │                                                                         │
//! │  Unflushed edits live only in memory. Closing a session drops them.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`agent`] - `TabAgent` actor and its cloneable handle
//! - [`session`] - Synchronous session state machine
//! - [`ledger`] - Pending ledger with cancel-outs
//! - [`remote`] - Store traits and adapters
//! - [`share`] - Share link creation and resolution
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rabbit_sync::{RabbitConfig, TabAgent};
//!
//! let config = RabbitConfig::load_or_default(None);
//! let handle = TabAgent::open(Arc::new(database), &tab_id, config.session.clone()).await?;
//!
//! let fries = handle.add_item("Fries", 400).await?;
//! let ana = handle.add_rabbit("Ana", None).await?;
//! handle.toggle_assignment(&fries.id, &ana.id).await?;
//!
//! // Flushes after one quiet second, or now:
//! handle.save().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod config;
pub mod error;
pub mod ledger;
pub mod remote;
pub mod session;
pub mod share;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{TabAgent, TabAgentHandle};
pub use config::{RabbitConfig, SessionSettings, ShareSettings, StoreSettings};
pub use error::{SyncError, SyncResult};
pub use ledger::PendingLedger;
pub use remote::{apply_ledger, MemoryStore, RedisShareStore, RemoteOp, RemoteStore, ShareStore};
pub use session::{EditSession, FlushBatch, SessionState};
pub use share::{generate_remote_token, ShareLink, ShareMode, ShareService};
