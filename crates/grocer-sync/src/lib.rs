//! # grocer-sync: Synchronization Adapter for Grocer
//!
//! This crate keeps an [`OrderedItemStore`](grocer_core::OrderedItemStore)
//! in sync with the Grocer backend: it resolves the list for a week, saves
//! local edits after a quiet period, and applies changes pushed by other
//! clients.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Adapter Architecture                        │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      ListSession (one per open list)             │  │
//! │  │                                                                  │  │
//! │  │  open() resolves (group, week) ──► fetch / find / create         │  │
//! │  │  gestures mutate the store      ──► debounced full-list save     │  │
//! │  │  push updates                   ──► replace if content differs   │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │   Debouncer    │  │    ListApi     │  │    Subscription        │    │
//! │  │                │  │                │  │                        │    │
//! │  │ single pending │  │ HttpListApi    │  │ push events, torn      │    │
//! │  │ save, restarts │  │ InMemoryListApi│  │ down exactly once      │    │
//! │  │ on every edit  │  │                │  │                        │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`session`] - `ListSession`, the adapter itself
//! - [`api`] - `ListApi` trait, `Subscription`, `RemoteEvent`
//! - [`http`] - REST + WebSocket implementation
//! - [`memory`] - In-process implementation
//! - [`debounce`] - Single-slot cancellable scheduled task
//! - [`protocol`] - Request bodies and push frames
//! - [`config`] - Configuration (TOML + environment)
//! - [`logging`] - Tracing subscriber setup
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use grocer_core::ItemDraft;
//! use grocer_sync::{HttpListApi, ListSession, SyncConfig};
//!
//! let config = SyncConfig::load_or_default(None);
//! let api = Arc::new(HttpListApi::new(&config)?);
//!
//! let mut session =
//!     ListSession::open(api, &group_id, None, chrono::Utc::now(), &config.session).await?;
//! let milk = session.append(ItemDraft::item("Milk"));
//! session.insert_after(&milk, ItemDraft::item("Butter"));
//!
//! // Leaving the screen: sends the pending save and closes the push channel.
//! session.close().await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod api;
pub mod config;
pub mod debounce;
pub mod error;
pub mod http;
pub mod logging;
pub mod memory;
pub mod protocol;
pub mod session;

// =============================================================================
// Re-exports
// =============================================================================

pub use api::{ListApi, RemoteEvent, Subscription};
pub use config::{ApiSettings, SessionSettings, SyncConfig};
pub use debounce::Debouncer;
pub use error::{SyncError, SyncResult};
pub use http::HttpListApi;
pub use logging::{init_tracing, try_init_tracing};
pub use memory::InMemoryListApi;
pub use protocol::ListUpdate;
pub use session::{ListSession, RemoteChange, SessionState, SessionStatus};
