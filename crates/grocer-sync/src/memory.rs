//! # In-Memory List API
//!
//! A [`ListApi`] backed by process memory. Used for offline use and as the
//! backend of the session tests.
//!
//! Saves are broadcast to every live subscriber of the list, including the
//! session that saved, just like the real backend echoes writes over the
//! WebSocket.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grocer_core::{Group, Item, RemoteItem, WeekList};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::api::{ListApi, RemoteEvent, Subscription, SUBSCRIPTION_BUFFER};
use crate::error::{SyncError, SyncResult};
use crate::protocol::ListUpdate;

/// Categorization function: current items in, reorganized items out.
pub type Categorizer =
    Arc<dyn Fn(&[RemoteItem]) -> Result<Vec<RemoteItem>, String> + Send + Sync + 'static>;

struct StoredList {
    group_id: String,
    list: WeekList,
}

#[derive(Default)]
struct State {
    lists: HashMap<String, StoredList>,
    groups: Vec<Group>,
    subscribers: HashMap<String, Vec<(u64, mpsc::Sender<RemoteEvent>)>>,
    next_subscriber: u64,
    fail_saves: bool,
    fail_fetches: bool,
    fail_lookups: bool,
    save_attempts: usize,
    save_count: usize,
}

impl State {
    fn list_mut(&mut self, group_id: &str, list_id: &str) -> SyncResult<&mut WeekList> {
        match self.lists.get_mut(list_id) {
            Some(stored) if stored.group_id == group_id => Ok(&mut stored.list),
            _ => Err(SyncError::ListNotFound(list_id.to_string())),
        }
    }

    fn broadcast(&mut self, list_id: &str, items: Vec<RemoteItem>) {
        let Some(subscribers) = self.subscribers.get_mut(list_id) else {
            return;
        };
        subscribers.retain(|(_, tx)| !tx.is_closed());
        for (id, tx) in subscribers.iter() {
            let event = RemoteEvent::Updated(ListUpdate::new(list_id, items.clone()));
            if tx.try_send(event).is_err() {
                debug!(list_id = %list_id, subscriber = id, "Subscriber lagging, update dropped");
            }
        }
    }
}

// =============================================================================
// In-Memory List API
// =============================================================================

/// Shared in-memory backend. Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryListApi {
    state: Arc<Mutex<State>>,
    categorizer: Option<Categorizer>,
}

impl InMemoryListApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the function used by [`ListApi::categorize`]. Without one,
    /// categorization returns the items unchanged.
    pub fn with_categorizer<F>(mut self, categorizer: F) -> Self
    where
        F: Fn(&[RemoteItem]) -> Result<Vec<RemoteItem>, String> + Send + Sync + 'static,
    {
        self.categorizer = Some(Arc::new(categorizer));
        self
    }

    fn lock(&self) -> SyncResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| SyncError::Internal("in-memory backend lock poisoned".into()))
    }

    // =========================================================================
    // Test Controls
    // =========================================================================

    /// Makes every following `save_list` fail with HTTP 500.
    pub fn fail_saves(&self, fail: bool) {
        if let Ok(mut state) = self.lock() {
            state.fail_saves = fail;
        }
    }

    /// Makes every following `fetch_list` fail with a connection error.
    pub fn fail_fetches(&self, fail: bool) {
        if let Ok(mut state) = self.lock() {
            state.fail_fetches = fail;
        }
    }

    /// Makes every following `fetch_lists_for_group` fail with a connection
    /// error.
    pub fn fail_lookups(&self, fail: bool) {
        if let Ok(mut state) = self.lock() {
            state.fail_lookups = fail;
        }
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.lock().map(|s| s.save_count).unwrap_or_default()
    }

    /// Number of save calls, failed ones included.
    pub fn save_attempts(&self) -> usize {
        self.lock().map(|s| s.save_attempts).unwrap_or_default()
    }

    /// Stores a list directly, replacing any list with the same id.
    pub fn insert_list(&self, group_id: &str, list: WeekList) {
        if let Ok(mut state) = self.lock() {
            state.lists.insert(
                list.id.clone(),
                StoredList {
                    group_id: group_id.to_string(),
                    list,
                },
            );
        }
    }

    /// Current stored items of a list.
    pub fn stored_items(&self, list_id: &str) -> Option<Vec<RemoteItem>> {
        let state = self.lock().ok()?;
        state
            .lists
            .get(list_id)
            .map(|stored| stored.list.items.clone().unwrap_or_default())
    }

    /// Every list of every group.
    pub fn list_count(&self) -> usize {
        self.lock().map(|s| s.lists.len()).unwrap_or_default()
    }

    /// Simulates a write from another client: stores the items and pushes
    /// them to every subscriber.
    pub fn push_remote_items(&self, list_id: &str, items: Vec<RemoteItem>) {
        if let Ok(mut state) = self.lock() {
            if let Some(stored) = state.lists.get_mut(list_id) {
                stored.list.items = Some(items.clone());
            }
            state.broadcast(list_id, items);
        }
    }

    /// Pushes a raw event to every subscriber of a list.
    pub fn push_event(&self, list_id: &str, event: RemoteEvent) {
        if let Ok(mut state) = self.lock() {
            if let Some(subscribers) = state.subscribers.get_mut(list_id) {
                for (_, tx) in subscribers.iter() {
                    let _ = tx.try_send(event.clone());
                }
            }
        }
    }

    /// Ends every subscription of a list, as a dropped socket would.
    pub fn disconnect(&self, list_id: &str) {
        if let Ok(mut state) = self.lock() {
            state.subscribers.remove(list_id);
        }
    }

    /// Live subscribers of a list.
    pub fn subscriber_count(&self, list_id: &str) -> usize {
        self.lock()
            .ok()
            .and_then(|s| s.subscribers.get(list_id).map(|subs| subs.len()))
            .unwrap_or_default()
    }
}

#[async_trait]
impl ListApi for InMemoryListApi {
    async fn fetch_list(&self, group_id: &str, list_id: &str) -> SyncResult<Option<WeekList>> {
        let mut state = self.lock()?;
        if state.fail_fetches {
            return Err(SyncError::ConnectionFailed("fetch disabled".into()));
        }
        match state.list_mut(group_id, list_id) {
            Ok(list) => Ok(Some(list.clone())),
            Err(_) => Ok(None),
        }
    }

    async fn fetch_lists_for_group(&self, group_id: &str) -> SyncResult<Vec<WeekList>> {
        let state = self.lock()?;
        if state.fail_lookups {
            return Err(SyncError::ConnectionFailed("lookup disabled".into()));
        }
        let mut lists: Vec<WeekList> = state
            .lists
            .values()
            .filter(|stored| stored.group_id == group_id)
            .map(|stored| WeekList {
                items: None,
                ..stored.list.clone()
            })
            .collect();
        lists.sort_by(|a, b| b.week_start.cmp(&a.week_start));
        Ok(lists)
    }

    async fn create_list(
        &self,
        group_id: &str,
        week_start: DateTime<Utc>,
    ) -> SyncResult<WeekList> {
        let list = WeekList {
            id: Uuid::new_v4().to_string(),
            week_start,
            items: Some(Vec::new()),
        };
        self.insert_list(group_id, list.clone());
        debug!(group_id = %group_id, list_id = %list.id, "Created list");
        Ok(list)
    }

    async fn save_list(&self, group_id: &str, list_id: &str, items: Vec<Item>) -> SyncResult<()> {
        let mut state = self.lock()?;
        state.save_attempts += 1;
        if state.fail_saves {
            return Err(SyncError::Http {
                status: 500,
                message: "save disabled".into(),
            });
        }

        let items: Vec<RemoteItem> = items.into_iter().map(RemoteItem::from).collect();
        state.list_mut(group_id, list_id)?.items = Some(items.clone());
        state.save_count += 1;
        state.broadcast(list_id, items);
        Ok(())
    }

    async fn subscribe(&self, group_id: &str, list_id: &str) -> SyncResult<Subscription> {
        let mut state = self.lock()?;
        state.list_mut(group_id, list_id)?;

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let subscriber = state.next_subscriber;
        state.next_subscriber += 1;
        state
            .subscribers
            .entry(list_id.to_string())
            .or_default()
            .push((subscriber, tx));

        let shared = Arc::clone(&self.state);
        let list_id = list_id.to_string();
        Ok(Subscription::new(rx, move || {
            if let Ok(mut state) = shared.lock() {
                if let Some(subscribers) = state.subscribers.get_mut(&list_id) {
                    subscribers.retain(|(id, _)| *id != subscriber);
                }
            }
        }))
    }

    async fn categorize(&self, group_id: &str, list_id: &str) -> SyncResult<Vec<RemoteItem>> {
        let mut state = self.lock()?;
        let list = state.list_mut(group_id, list_id)?;
        let current = list.items.clone().unwrap_or_default();

        let categorized = match &self.categorizer {
            Some(categorize) => categorize(&current).map_err(SyncError::Categorize)?,
            None => current,
        };
        list.items = Some(categorized.clone());
        Ok(categorized)
    }

    async fn fetch_groups(&self) -> SyncResult<Vec<Group>> {
        Ok(self.lock()?.groups.clone())
    }

    async fn create_group(&self, name: &str) -> SyncResult<Group> {
        let group = Group {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
        };
        self.lock()?.groups.push(group.clone());
        Ok(group)
    }
}
