//! # List API
//!
//! The contract between a [`ListSession`](crate::session::ListSession) and
//! whatever stores lists: the Grocer REST backend ([`HttpListApi`]) or
//! process memory ([`InMemoryListApi`]).
//!
//! ## Push Channel
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Subscription Lifecycle                           │
//! │                                                                         │
//! │  subscribe() ──► Subscription ──► next_event() ──► Updated(ListUpdate)  │
//! │                       │                      └───► Error(reason)        │
//! │                       │                      └───► None (stream ended)  │
//! │                       │                                                 │
//! │                       └── unsubscribe() / drop ──► teardown runs once   │
//! │                                                                         │
//! │  A stream that ends stays ended. Reconnecting means calling            │
//! │  subscribe() again.                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`HttpListApi`]: crate::http::HttpListApi
//! [`InMemoryListApi`]: crate::memory::InMemoryListApi

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grocer_core::{Group, Item, RemoteItem, WeekList};
use tokio::sync::mpsc;

use crate::error::SyncResult;
use crate::protocol::ListUpdate;

/// Capacity of a subscription's event buffer.
pub const SUBSCRIPTION_BUFFER: usize = 32;

// =============================================================================
// Remote Events
// =============================================================================

/// Something the push channel delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEvent {
    /// Another client (or an echo of our own save) changed the list.
    Updated(ListUpdate),

    /// The channel failed. No further events follow.
    Error(String),
}

// =============================================================================
// Subscription
// =============================================================================

type Teardown = Box<dyn FnOnce() + Send + Sync + 'static>;

/// Live push channel for one list.
///
/// The teardown closure runs exactly once: on [`Subscription::unsubscribe`],
/// or on drop if `unsubscribe` was never called.
pub struct Subscription {
    events: mpsc::Receiver<RemoteEvent>,
    teardown: Option<Teardown>,
}

impl Subscription {
    /// Wraps a receiver and the action that closes the underlying channel.
    pub fn new<F>(events: mpsc::Receiver<RemoteEvent>, teardown: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Subscription {
            events,
            teardown: Some(Box::new(teardown)),
        }
    }

    /// Waits for the next event. `None` once the stream has ended.
    ///
    /// Cancel-safe: dropping the future loses no event.
    pub async fn next_event(&mut self) -> Option<RemoteEvent> {
        self.events.recv().await
    }

    /// Closes the channel.
    pub fn unsubscribe(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            self.events.close();
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("open", &self.teardown.is_some())
            .finish()
    }
}

// =============================================================================
// List API Trait
// =============================================================================

/// Backend operations a list session depends on.
///
/// All list operations are scoped to a group. Errors are returned as-is;
/// the session decides which ones are recoverable.
#[async_trait]
pub trait ListApi: Send + Sync {
    /// Fetches one list. `Ok(None)` if the backend does not know the id.
    async fn fetch_list(&self, group_id: &str, list_id: &str) -> SyncResult<Option<WeekList>>;

    /// Fetches every list of the group. Items may be omitted.
    async fn fetch_lists_for_group(&self, group_id: &str) -> SyncResult<Vec<WeekList>>;

    /// Creates an empty list for the week starting at `week_start`.
    async fn create_list(&self, group_id: &str, week_start: DateTime<Utc>)
        -> SyncResult<WeekList>;

    /// Replaces the stored items of a list.
    async fn save_list(&self, group_id: &str, list_id: &str, items: Vec<Item>) -> SyncResult<()>;

    /// Opens the push channel for a list.
    async fn subscribe(&self, group_id: &str, list_id: &str) -> SyncResult<Subscription>;

    /// Asks the backend to reorganize the list into sections.
    ///
    /// The result is authoritative, ranks included.
    async fn categorize(&self, group_id: &str, list_id: &str) -> SyncResult<Vec<RemoteItem>>;

    /// Groups visible to the current user.
    async fn fetch_groups(&self) -> SyncResult<Vec<Group>>;

    /// Creates a group.
    async fn create_group(&self, name: &str) -> SyncResult<Group>;
}
