//! # rabbit-core: Pure Business Logic for Rabbit Tab
//!
//! Everything that decides who owes what lives in this crate, as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Rabbit Tab Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    rabbit-cli (apps/cli)                        │   │
//! │  │        split ──► edit ──► share ──► open                        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   rabbit-sync: edit session, pending ledger, share links        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ rabbit-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   split   │  │   codec   │  │ currency  │  │   │
//! │  │   │ Tab Item  │  │ breakdown │  │  compact  │  │  format   │  │   │
//! │  │   │  Rabbit   │  │   drift   │  │  tokens   │  │  parse    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 rabbit-db (SQLite store)                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Tab, Item, Rabbit, Assignment, Profile and patches
//! - [`snapshot`] - Optimistic edits on an in-memory tab
//! - [`split`] - Per-rabbit breakdown with tax and tip
//! - [`codec`] - Compact share tokens
//! - [`currency`] - Zero-decimal rules, formatting and parsing
//! - [`money`] - Integer smallest-unit amounts
//! - [`receipt`] - Receipt scan normalisation
//! - [`validation`] - Input checks
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use rabbit_core::split::calculate_split;
//! use rabbit_core::types::{Assignment, Item, Rabbit, RabbitColor};
//!
//! let burger = Item::new("tab", "Burger", 1000);
//! let a = Rabbit::new("tab", "A", RabbitColor::Red);
//! let edges = vec![Assignment::new(&burger.id, &a.id)];
//!
//! let summary = calculate_split(&[burger], &[a], &edges, 8.0, 20.0);
//! assert_eq!(summary.rabbits[0].total.units(), 1280);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod codec;
pub mod currency;
pub mod error;
pub mod money;
pub mod receipt;
pub mod snapshot;
pub mod split;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use codec::{classify_token, decode_bill, encode_bill, ShareToken};
pub use error::{CoreError, CoreResult, DecodeError, EncodeError, ValidationError};
pub use money::Money;
pub use split::{calculate_split, RabbitBreakdown, SplitSummary};
pub use types::*;
