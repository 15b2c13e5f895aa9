//! # rabbit-db: SQLite Store for Rabbit Tab
//!
//! This crate provides the relational store behind an edit session, plus the
//! share-link table used for short links when no Redis is configured.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Rabbit Tab Data Flow                             │
//! │                                                                         │
//! │  TabAgent (rabbit-sync) ── load once, then flush pending ledgers        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     rabbit-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  tab, item,   │    │  (embedded)  │  │   │
//! │  │   │               │    │  rabbit, ...  │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│               │    │ 001_init.sql │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (platform data dir, see RabbitConfig)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rabbit_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/rabbit.db")).await?;
//! let snapshot = db.tabs().load_snapshot(&tab_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::assignment::AssignmentRepository;
pub use repository::item::ItemRepository;
pub use repository::profile::ProfileRepository;
pub use repository::rabbit::RabbitRepository;
pub use repository::share::ShareLinkRepository;
pub use repository::tab::TabRepository;
