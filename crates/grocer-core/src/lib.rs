//! # grocer-core: Pure List Logic for Grocer
//!
//! This crate owns the ordering model of a collaborative weekly shopping
//! list. It has no I/O: no network, no timers, no logging.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Grocer Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    List Screen (mobile client)                  │   │
//! │  │     rows ──► edit / enter / delete / drag / check / categorize  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                grocer-sync (ListSession)                        │   │
//! │  │   resolve week list, debounced save, live updates, categorize   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ grocer-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   rank    │  │   store   │  │   types   │  │   week    │  │   │
//! │  │   │   Rank    │  │ Ordered-  │  │   Item    │  │ week_start│  │   │
//! │  │   │  between  │  │ ItemStore │  │ WeekList  │  │ week_label│  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO TIMERS • NO NETWORK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`rank`] - Fractional position tokens (`Rank`)
//! - [`store`] - The in-memory item collection and its mutations
//! - [`types`] - Domain types (Item, WeekList, Group, etc.)
//! - [`week`] - Week start normalization and labels
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Local Inserts**: Inserting or appending assigns a rank to the new
//!    row only; neighbours keep theirs
//! 2. **Order Is A View**: Items are stored in any order and sorted by rank
//!    for display
//! 3. **Never Drop Remote Data**: Items with missing ranks are repaired, not
//!    discarded
//!
//! ## Example Usage
//!
//! ```rust
//! use grocer_core::{ItemDraft, OrderedItemStore};
//!
//! let mut store = OrderedItemStore::new();
//! let milk = store.append(ItemDraft::item("Milk"));
//! store.append(ItemDraft::item("Eggs"));
//!
//! // Enter on "Milk" opens a new row right below it.
//! let focus = store.insert_after(&milk, ItemDraft::item("")).unwrap();
//! assert_eq!(store.sorted()[1].id, focus);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod rank;
pub mod store;
pub mod types;
pub mod week;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::RankError;
pub use rank::Rank;
pub use store::OrderedItemStore;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Quiet period before a burst of local edits is saved, in milliseconds.
///
/// Every local mutation restarts the window; only the last state is sent.
pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 300;
