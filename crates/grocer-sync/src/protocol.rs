//! # Wire Protocol
//!
//! Request bodies and push frames exchanged with the Grocer backend.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Grocer REST / WebSocket API                        │
//! │                                                                         │
//! │  LISTS (every request carries ?groupId=G)                              │
//! │  ─────                                                                  │
//! │  GET  {base}/list                    ──► [WeekList]                    │
//! │  GET  {base}/list/{id}               ──► WeekList      (404 = none)    │
//! │  POST {base}/list            {weekStart}  ──► WeekList                 │
//! │  POST {base}/list/{id}       {items}      ──► 2xx                      │
//! │  POST {base}/list/categorize/{id}         ──► [Item]                   │
//! │                                                                         │
//! │  GROUPS                                                                │
//! │  ──────                                                                 │
//! │  GET  {base}/group                   ──► [Group]                       │
//! │  POST {base}/group           {name}  ──► Group                         │
//! │                                                                         │
//! │  PUSH                                                                  │
//! │  ────                                                                   │
//! │  WS   {ws_base}/ws/list/{id}         ◄── text frames: list JSON        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! JSON with camelCase field names:
//! ```json
//! { "id": "L1", "weekStart": "2024-03-04T00:00:00.000Z", "items": [ ... ] }
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use grocer_core::{Item, RemoteItem};
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Request Bodies
// =============================================================================

/// Body of `POST /list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListRequest {
    /// ISO-8601 week start with millisecond precision.
    pub week_start: String,
}

impl CreateListRequest {
    pub fn new(week_start: DateTime<Utc>) -> Self {
        CreateListRequest {
            week_start: week_start.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Body of `POST /list/{id}`: the full item set, last write wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveListRequest {
    pub items: Vec<Item>,
}

/// Body of `POST /group`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
}

// =============================================================================
// Push Frames
// =============================================================================

/// Content of one push frame.
///
/// Only `items` is required. The backend sends the whole list document, but
/// the session only ever looks at the items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUpdate {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub week_start: Option<DateTime<Utc>>,

    pub items: Vec<RemoteItem>,
}

impl ListUpdate {
    /// Builds an update carrying `items`, as the in-memory backend does.
    pub fn new(id: impl Into<String>, items: Vec<RemoteItem>) -> Self {
        ListUpdate {
            id: Some(id.into()),
            week_start: None,
            items,
        }
    }
}

/// Decodes a push frame.
pub fn decode_push(text: &str) -> SyncResult<ListUpdate> {
    serde_json::from_str(text).map_err(|e| SyncError::DeserializationFailed(e.to_string()))
}
