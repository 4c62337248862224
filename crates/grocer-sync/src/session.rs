//! # List Session
//!
//! The synchronization adapter for one open list. Owns the
//! [`OrderedItemStore`], keeps it in sync with the backend, and forwards
//! user gestures into it.
//!
//! ## Session States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        ListSession Lifecycle                            │
//! │                                                                         │
//! │  ┌───────────┐  fetch by id ──► found ─────────────────┐               │
//! │  │ Resolving │       │                                  │               │
//! │  └───────────┘       └► missing/failed ──► list by week │               │
//! │                                  │                      │               │
//! │                           found ─┤                      ▼               │
//! │                                  └► none ──► create ─► ┌─────────┐      │
//! │                                                        │ Synced  │◄──┐  │
//! │                                                        └────┬────┘   │  │
//! │            local edit ──► debounced save ───────────────────┤        │  │
//! │                                                 save failed ▼  next  │  │
//! │                                                        ┌─────────┐ ok │  │
//! │                                                        │  Error  │───┘  │
//! │                                                        └─────────┘      │
//! │                                                                         │
//! │  PUSH UPDATES                                                          │
//! │  ────────────                                                          │
//! │  Updated(items) ──► repair ──► same as local?  yes ──► ignored          │
//! │                                              no  ──► replace all        │
//! │  Error / end    ──► logged, stream stays closed                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Conflict Policy
//! Last write wins for the whole item list. A push that arrives while a
//! local save is pending replaces the store and drops the pending save, so
//! the backend is never sent items the store no longer holds. A save that
//! has already started still completes.
//!
//! ## Errors
//! Only [`ListSession::categorize`] reports failure to the caller. Failed
//! saves and failed push channels are logged and recorded in
//! [`SessionStatus`]; the list stays editable and the next edit schedules a
//! fresh save.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use grocer_core::store::repair_remote_items;
use grocer_core::week::{same_day, week_start};
use grocer_core::{ItemDraft, OrderedItemStore, WeekList, DEFAULT_SECTION_TEXT};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::api::{ListApi, RemoteEvent, Subscription};
use crate::config::SessionSettings;
use crate::debounce::Debouncer;
use crate::error::{SyncError, SyncResult};
use crate::protocol::ListUpdate;

// =============================================================================
// Session Status
// =============================================================================

/// Synchronization state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Looking up or creating the list.
    #[default]
    Resolving,

    /// Last save (if any) succeeded.
    Synced,

    /// Last save failed. Local state is kept.
    Error,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Resolving => write!(f, "resolving"),
            SessionState::Synced => write!(f, "synced"),
            SessionState::Error => write!(f, "error"),
        }
    }
}

/// Snapshot of a session's sync status, for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,

    /// Resolved list id.
    pub list_id: Option<String>,

    /// Canonical week start of the list.
    pub week_start: Option<DateTime<Utc>>,

    /// A categorization call is in flight.
    pub categorizing: bool,

    /// Successful saves since the session opened.
    pub saves_sent: u64,

    pub last_saved_at: Option<DateTime<Utc>>,

    /// Last save or categorization error.
    pub last_error: Option<String>,
}

// =============================================================================
// Remote Change
// =============================================================================

/// What a push event did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteChange {
    /// The store was replaced with the pushed items.
    Replaced,

    /// The pushed items matched the store. Nothing changed.
    Unchanged,

    /// The push channel failed.
    Failed(String),
}

// =============================================================================
// List Session
// =============================================================================

/// One open list: store, debounced saves, push updates.
///
/// Must be used from within a tokio runtime. Call [`ListSession::close`]
/// when the list screen goes away; dropping the session also tears the push
/// channel down but discards an edit that is still waiting for its save.
pub struct ListSession {
    api: Arc<dyn ListApi>,
    group_id: String,
    list_id: String,
    week_start: DateTime<Utc>,
    store: OrderedItemStore,
    debouncer: Debouncer,
    subscription: Option<Subscription>,
    status: Arc<RwLock<SessionStatus>>,
    focus: Option<String>,
}

impl ListSession {
    /// Resolves the list for `(group_id, week)` and opens it.
    ///
    /// `list_id` is tried first when known. Otherwise, or when the backend
    /// does not have it, the group's lists are searched for one starting on
    /// the same day as `week_start(week)`, and a new list is created only if
    /// that search succeeds and finds none. A failed search or creation is
    /// an error.
    pub async fn open(
        api: Arc<dyn ListApi>,
        group_id: &str,
        list_id: Option<&str>,
        week: DateTime<Utc>,
        settings: &SessionSettings,
    ) -> SyncResult<Self> {
        let status = Arc::new(RwLock::new(SessionStatus::default()));
        let week_start = week_start(week);

        let list = resolve_list(api.as_ref(), group_id, list_id, week_start).await?;
        info!(
            group_id = %group_id,
            list_id = %list.id,
            week_start = %list.week_start,
            "List resolved"
        );

        let store = OrderedItemStore::from_remote(list.items.unwrap_or_default());
        let focus = store.initial_focus();

        let subscription = if settings.subscribe_on_open {
            match api.subscribe(group_id, &list.id).await {
                Ok(subscription) => Some(subscription),
                Err(e) => {
                    error!(group_id = %group_id, list_id = %list.id, error = %e, "Failed to subscribe to list updates");
                    None
                }
            }
        } else {
            None
        };

        {
            let mut status = status.write().await;
            status.state = SessionState::Synced;
            status.list_id = Some(list.id.clone());
            status.week_start = Some(list.week_start);
        }

        Ok(ListSession {
            api,
            group_id: group_id.to_string(),
            list_id: list.id,
            week_start: list.week_start,
            store,
            debouncer: Debouncer::new(settings.save_debounce()),
            subscription,
            status,
            focus,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Read-only view of the items.
    pub fn store(&self) -> &OrderedItemStore {
        &self.store
    }

    pub fn list_id(&self) -> &str {
        &self.list_id
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn week_start(&self) -> DateTime<Utc> {
        self.week_start
    }

    /// Row the UI should focus, if any.
    pub fn focus(&self) -> Option<&str> {
        self.focus.as_deref()
    }

    /// True while a push channel is open.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// True while a local edit is waiting for its save.
    pub fn has_pending_save(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Current sync status.
    pub async fn status(&self) -> SessionStatus {
        self.status.read().await.clone()
    }

    // =========================================================================
    // Local Edits
    // =========================================================================

    /// Applies a local edit and schedules a debounced save of the result.
    pub fn mutate<F, R>(&mut self, edit: F) -> R
    where
        F: FnOnce(&mut OrderedItemStore) -> R,
    {
        let result = edit(&mut self.store);
        self.schedule_save();
        result
    }

    /// Enter on a row: inserts `draft` right below `anchor_id` and focuses it.
    pub fn insert_after(&mut self, anchor_id: &str, draft: ItemDraft) -> Option<String> {
        let id = self.store.insert_after(anchor_id, draft)?;
        self.focus = Some(id.clone());
        self.schedule_save();
        Some(id)
    }

    /// "+ Item": appends `draft` at the end and focuses it.
    pub fn append(&mut self, draft: ItemDraft) -> String {
        let id = self.mutate(|store| store.append(draft));
        self.focus = Some(id.clone());
        id
    }

    /// "+ Section": appends a section header with the default text.
    pub fn append_section(&mut self) -> String {
        let id = self.mutate(|store| store.append_section(DEFAULT_SECTION_TEXT));
        self.focus = Some(id.clone());
        id
    }

    /// Deletes a row and moves focus to the suggested neighbour.
    pub fn delete(&mut self, id: &str) -> Option<String> {
        let focus = self.store.delete(id)?;
        self.focus = Some(focus.clone());
        self.schedule_save();
        Some(focus)
    }

    /// Drag end: `ordered_ids` is the new visible order.
    pub fn reorder<I, S>(&mut self, ordered_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.mutate(|store| store.move_and_rerank(ordered_ids));
    }

    pub fn toggle_checked(&mut self, id: &str) -> bool {
        let changed = self.store.toggle_checked(id);
        if changed {
            self.schedule_save();
        }
        changed
    }

    pub fn update_text(&mut self, id: &str, text: impl Into<String>) -> bool {
        let changed = self.store.update_text(id, text);
        if changed {
            self.schedule_save();
        }
        changed
    }

    fn schedule_save(&mut self) {
        if self.store.is_empty() {
            self.debouncer.cancel();
            return;
        }

        let items = self.store.snapshot();
        let api = Arc::clone(&self.api);
        let status = Arc::clone(&self.status);
        let group_id = self.group_id.clone();
        let list_id = self.list_id.clone();

        self.debouncer.schedule(async move {
            let count = items.len();
            match api.save_list(&group_id, &list_id, items).await {
                Ok(()) => {
                    debug!(group_id = %group_id, list_id = %list_id, count, "List saved");
                    let mut status = status.write().await;
                    status.state = SessionState::Synced;
                    status.saves_sent += 1;
                    status.last_saved_at = Some(Utc::now());
                    status.last_error = None;
                }
                Err(e) => {
                    error!(group_id = %group_id, list_id = %list_id, error = %e, "Failed to save list");
                    let mut status = status.write().await;
                    status.state = SessionState::Error;
                    status.last_error = Some(e.to_string());
                }
            }
        });
    }

    // =========================================================================
    // Remote Updates
    // =========================================================================

    /// Applies pushed items if they differ from the store.
    ///
    /// Returns true if the store was replaced. A replacement cancels any
    /// pending save, whose snapshot predates the push, and schedules none.
    pub fn apply_remote(&mut self, update: ListUpdate) -> bool {
        let incoming = repair_remote_items(update.items);
        if self.store.matches(&incoming) {
            debug!(list_id = %self.list_id, "Push matches local items, ignored");
            return false;
        }

        info!(list_id = %self.list_id, count = incoming.len(), "Applying remote items");
        if self.debouncer.cancel() {
            debug!(list_id = %self.list_id, "Pending save superseded by push");
        }
        self.store.replace_all(incoming);
        if self
            .focus
            .as_deref()
            .is_some_and(|id| self.store.get(id).is_none())
        {
            self.focus = None;
        }
        true
    }

    /// Waits for the next push event and applies it.
    ///
    /// Returns `None` when there is no open channel or the stream has ended.
    /// Cancel-safe.
    pub async fn next_remote_event(&mut self) -> Option<RemoteChange> {
        let event = self.subscription.as_mut()?.next_event().await;
        match event {
            Some(RemoteEvent::Updated(update)) => Some(if self.apply_remote(update) {
                RemoteChange::Replaced
            } else {
                RemoteChange::Unchanged
            }),
            Some(RemoteEvent::Error(reason)) => {
                error!(list_id = %self.list_id, error = %reason, "List update stream failed");
                Some(RemoteChange::Failed(reason))
            }
            None => {
                warn!(list_id = %self.list_id, "List update stream ended");
                None
            }
        }
    }

    // =========================================================================
    // Categorization
    // =========================================================================

    /// Asks the backend to reorganize the list into sections and replaces
    /// the store with the result.
    ///
    /// Any pending save is sent first so the backend categorizes the latest
    /// items. Focus is cleared. On failure the store is left untouched and
    /// the error is returned.
    pub async fn categorize(&mut self) -> SyncResult<()> {
        if let Some(handle) = self.debouncer.flush() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Pending save task did not complete");
            }
        }

        self.status.write().await.categorizing = true;
        info!(list_id = %self.list_id, "Categorizing list");

        let result = self.api.categorize(&self.group_id, &self.list_id).await;

        let mut status = self.status.write().await;
        status.categorizing = false;
        match result {
            Ok(items) => {
                self.store.replace_from_remote(items);
                self.focus = None;
                Ok(())
            }
            Err(e) => {
                error!(list_id = %self.list_id, error = %e, "Categorization failed");
                let err = match e {
                    SyncError::Categorize(_) => e,
                    other => SyncError::Categorize(other.to_string()),
                };
                status.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Sends any pending save, waits for it, and closes the push channel.
    pub async fn close(mut self) {
        if let Some(handle) = self.debouncer.flush() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Pending save task did not complete");
            }
        }
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        info!(list_id = %self.list_id, "List session closed");
    }
}

impl std::fmt::Debug for ListSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListSession")
            .field("group_id", &self.group_id)
            .field("list_id", &self.list_id)
            .field("items", &self.store.len())
            .field("debouncer", &self.debouncer)
            .field("subscription", &self.subscription)
            .finish()
    }
}

// =============================================================================
// Resolution
// =============================================================================

async fn resolve_list(
    api: &dyn ListApi,
    group_id: &str,
    list_id: Option<&str>,
    week_start: DateTime<Utc>,
) -> SyncResult<WeekList> {
    if let Some(list_id) = list_id {
        match api.fetch_list(group_id, list_id).await {
            Ok(Some(list)) => return Ok(list),
            Ok(None) => {
                warn!(group_id = %group_id, list_id = %list_id, "List not found, looking up by week")
            }
            Err(e) => {
                warn!(group_id = %group_id, list_id = %list_id, error = %e, "Fetching list failed, looking up by week")
            }
        }
    }

    // Never create after a failed lookup: one list per (group, week).
    let lists = api.fetch_lists_for_group(group_id).await.map_err(|e| {
        error!(group_id = %group_id, error = %e, "Listing group lists failed");
        e
    })?;

    if let Some(found) = lists
        .into_iter()
        .find(|list| same_day(list.week_start, week_start))
    {
        if found.items.is_some() {
            return Ok(found);
        }
        // Summaries may omit items.
        return Ok(api.fetch_list(group_id, &found.id).await?.unwrap_or(found));
    }

    info!(group_id = %group_id, week_start = %week_start, "Creating list for week");
    api.create_list(group_id, week_start).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryListApi;
    use chrono::TimeZone;
    use grocer_core::RemoteItem;

    fn wednesday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 6, 18, 45, 0).unwrap()
    }

    fn monday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap()
    }

    fn remote(id: &str, order: &str) -> RemoteItem {
        RemoteItem {
            id: id.into(),
            text: id.to_uppercase(),
            checked: false,
            order: Some(order.into()),
            is_section: false,
        }
    }

    #[tokio::test]
    async fn test_resolve_prefers_known_id() {
        let api = InMemoryListApi::new();
        api.insert_list(
            "G",
            WeekList {
                id: "L1".into(),
                week_start: monday(),
                items: Some(vec![remote("a", "i")]),
            },
        );

        let list = resolve_list(&api, "G", Some("L1"), monday()).await.unwrap();
        assert_eq!(list.id, "L1");
        assert_eq!(api.list_count(), 1);
    }

    #[tokio::test]
    async fn test_resolve_unknown_id_falls_back_to_week_and_refetches_items() {
        let api = InMemoryListApi::new();
        api.insert_list(
            "G",
            WeekList {
                id: "L1".into(),
                week_start: monday(),
                items: Some(vec![remote("a", "i")]),
            },
        );

        let list = resolve_list(&api, "G", Some("stale"), monday()).await.unwrap();
        assert_eq!(list.id, "L1");
        assert_eq!(list.items.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_fetch_error_is_not_fatal() {
        let api = InMemoryListApi::new();
        api.fail_fetches(true);

        let list = resolve_list(&api, "G", Some("L1"), monday()).await.unwrap();
        assert_eq!(list.week_start, monday());
        assert_eq!(api.list_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_week_lookup_does_not_create_a_list() {
        let api = Arc::new(InMemoryListApi::new());
        api.insert_list(
            "G",
            WeekList {
                id: "L1".into(),
                week_start: monday(),
                items: Some(vec![remote("a", "i")]),
            },
        );
        api.fail_lookups(true);

        let err = ListSession::open(api.clone(), "G", None, monday(), &SessionSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ConnectionFailed(_)));
        assert_eq!(api.list_count(), 1);

        // Once the lookup works again the existing list is found.
        api.fail_lookups(false);
        let session =
            ListSession::open(api.clone(), "G", None, monday(), &SessionSettings::default())
                .await
                .unwrap();
        assert_eq!(session.list_id(), "L1");
        assert_eq!(api.list_count(), 1);
    }

    #[tokio::test]
    async fn test_open_normalizes_week_and_reuses_list() {
        let api = Arc::new(InMemoryListApi::new());
        let settings = SessionSettings::default();

        let first = ListSession::open(api.clone(), "G", None, wednesday(), &settings)
            .await
            .unwrap();
        assert_eq!(first.week_start(), monday());
        let first_id = first.list_id().to_string();
        first.close().await;

        // Same week, different time of day.
        let sunday_night = Utc.with_ymd_and_hms(2024, 3, 10, 23, 0, 0).unwrap();
        let second = ListSession::open(api.clone(), "G", None, sunday_night, &settings)
            .await
            .unwrap();
        assert_eq!(second.list_id(), first_id);
        assert_eq!(api.list_count(), 1);

        let status = second.status().await;
        assert_eq!(status.state, SessionState::Synced);
        assert_eq!(status.list_id.as_deref(), Some(first_id.as_str()));
        assert_eq!(status.week_start, Some(monday()));
    }

    #[tokio::test]
    async fn test_open_without_subscription() {
        let api = Arc::new(InMemoryListApi::new());
        let settings = SessionSettings {
            subscribe_on_open: false,
            ..Default::default()
        };
        let mut session = ListSession::open(api, "G", None, wednesday(), &settings)
            .await
            .unwrap();

        assert!(!session.is_subscribed());
        assert!(session.next_remote_event().await.is_none());
    }

    #[tokio::test]
    async fn test_apply_remote_ignores_identical_items() {
        let api = Arc::new(InMemoryListApi::new());
        api.insert_list(
            "G",
            WeekList {
                id: "L1".into(),
                week_start: monday(),
                items: Some(vec![remote("a", "i"), remote("b", "j")]),
            },
        );
        let mut session =
            ListSession::open(api, "G", Some("L1"), monday(), &SessionSettings::default())
                .await
                .unwrap();

        let same = ListUpdate::new("L1", vec![remote("a", "i"), remote("b", "j")]);
        assert!(!session.apply_remote(same));

        let different = ListUpdate::new("L1", vec![remote("b", "i"), remote("a", "j")]);
        assert!(session.apply_remote(different));
        let ids: Vec<_> = session.store().sorted().iter().map(|i| i.id.clone()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        // A remote replace does not trigger a save.
        assert!(!session.has_pending_save());
    }

    #[tokio::test]
    async fn test_apply_remote_clears_focus_on_vanished_row() {
        let api = Arc::new(InMemoryListApi::new());
        api.insert_list(
            "G",
            WeekList {
                id: "L1".into(),
                week_start: monday(),
                items: Some(vec![remote("a", "i")]),
            },
        );
        let mut session =
            ListSession::open(api, "G", Some("L1"), monday(), &SessionSettings::default())
                .await
                .unwrap();
        assert_eq!(session.focus(), Some("a"));

        session.apply_remote(ListUpdate::new("L1", vec![remote("z", "k")]));
        assert_eq!(session.focus(), None);
    }
}
