//! # Domain Types
//!
//! Core domain types shared by the list store, the sync adapter and the
//! mobile client.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Group       │   │    WeekList     │   │      Item       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │──►│  id             │──►│  id (UUID)      │       │
//! │  │  name           │   │  week_start     │   │  text           │       │
//! │  └─────────────────┘   │  items          │   │  checked        │       │
//! │                        └─────────────────┘   │  order (Rank)   │       │
//! │                                              │  is_section     │       │
//! │  ┌─────────────────┐   ┌─────────────────┐   └─────────────────┘       │
//! │  │   ItemDraft     │   │   RemoteItem    │                             │
//! │  │  not yet ranked │   │  lenient wire   │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! JSON field names are camelCase (`isSection`, `weekStart`) to match the
//! backend and the TypeScript client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use ts_rs::TS;
use uuid::Uuid;

use crate::rank::Rank;

/// Default text for a section created with the "+ Section" action.
pub const DEFAULT_SECTION_TEXT: &str = "New Section";

/// Generates a new client-side item id (UUID v4).
pub fn new_item_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Item
// =============================================================================

/// A row in a shopping list: either a checkable entry or a section header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Item {
    /// Immutable, client-generated id.
    pub id: String,

    /// Row text. May be empty while the user is typing.
    pub text: String,

    /// Whether the entry has been ticked off. Always false for sections.
    pub checked: bool,

    /// Display position.
    #[ts(as = "String")]
    pub order: Rank,

    /// Section headers group the rows below them.
    #[serde(default)]
    pub is_section: bool,
}

impl Item {
    /// Creates a blank, unchecked entry at the given rank.
    pub fn blank(order: Rank) -> Self {
        ItemDraft::item("").into_item(order)
    }
}

// =============================================================================
// Item Draft
// =============================================================================

/// An item that has an id and content but no rank yet.
///
/// The store assigns the rank when the draft is inserted, so callers never
/// compute positions themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDraft {
    pub id: String,
    pub text: String,
    pub checked: bool,
    pub is_section: bool,
}

impl ItemDraft {
    /// A new checkable entry with a fresh id.
    pub fn item(text: impl Into<String>) -> Self {
        ItemDraft {
            id: new_item_id(),
            text: text.into(),
            checked: false,
            is_section: false,
        }
    }

    /// A new section header with a fresh id.
    pub fn section(text: impl Into<String>) -> Self {
        ItemDraft {
            is_section: true,
            ..Self::item(text)
        }
    }

    /// Overrides the generated id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Attaches a rank, producing a full item.
    pub fn into_item(self, order: Rank) -> Item {
        Item {
            id: self.id,
            text: self.text,
            checked: self.checked,
            order,
            is_section: self.is_section,
        }
    }
}

// =============================================================================
// Remote Item
// =============================================================================

/// Lenient decoding of an item received from the backend.
///
/// Everything except `id` may be missing, null or of the wrong type. A
/// field that does not decode falls back to its default instead of rejecting
/// the whole list, and `order` is kept as a raw string. The store repairs
/// these into [`Item`]s (see `OrderedItemStore::from_remote`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RemoteItem {
    pub id: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub text: String,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub checked: bool,

    #[serde(default, deserialize_with = "lenient_order")]
    pub order: Option<String>,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_section: bool,
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => s,
        _ => String::new(),
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(matches!(
        Option::<Value>::deserialize(deserializer)?,
        Some(Value::Bool(true))
    ))
}

// Non-string orders become `None` and are repaired like missing ones.
fn lenient_order<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

impl RemoteItem {
    /// Returns the order if it parses as a valid rank.
    pub fn valid_order(&self) -> Option<Rank> {
        self.order.as_deref().and_then(|s| s.parse().ok())
    }
}

impl From<Item> for RemoteItem {
    fn from(item: Item) -> Self {
        RemoteItem {
            id: item.id,
            text: item.text,
            checked: item.checked,
            order: Some(item.order.into()),
            is_section: item.is_section,
        }
    }
}

// =============================================================================
// Week List
// =============================================================================

/// One shopping list per (group, week).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct WeekList {
    /// Backend document id.
    pub id: String,

    /// Canonical start of the week (Monday 00:00 UTC).
    #[ts(as = "String")]
    pub week_start: DateTime<Utc>,

    /// Items; absent in some list summaries.
    #[serde(default)]
    pub items: Option<Vec<RemoteItem>>,
}

// =============================================================================
// Group
// =============================================================================

/// A set of users sharing the same weekly lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Group {
    pub id: String,
    pub name: String,
}

// =============================================================================
// Unit Tests
// =============================================================================
