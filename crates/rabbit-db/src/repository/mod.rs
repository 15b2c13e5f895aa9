//! # Repository Module
//!
//! Database repository implementations for Rabbit Tab.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories                                         │
//! │                                                                         │
//! │  rabbit-sync (flush / load)                                            │
//! │       │                                                                 │
//! │       │  db.items().insert_many(&new_items)                            │
//! │       ▼                                                                 │
//! │  TabRepository         tabs + full snapshot load                       │
//! │  ItemRepository        batched upsert / patch / delete                 │
//! │  RabbitRepository      batched upsert / patch / delete                 │
//! │  AssignmentRepository  edge insert / delete                            │
//! │  ProfileRepository     payment handles of the tab owner                │
//! │  ShareLinkRepository   token → JSON snapshot with expiry               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Inserts are upserts and deletes of missing rows are no-ops, so a batch
//! that failed halfway can be replayed as a whole.

pub mod assignment;
pub mod item;
pub mod profile;
pub mod rabbit;
pub mod share;
pub mod tab;
