//! # Ordered Item Store
//!
//! In-memory collection of the items of the currently open list.
//!
//! ## Storage vs Display
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Where Order Comes From                               │
//! │                                                                         │
//! │  storage (any order)          display (sorted by rank)                  │
//! │  ───────────────────          ────────────────────────                  │
//! │  Eggs   "j"                   Milk   "i"                                │
//! │  Milk   "i"          ──►      Butter "ii"                               │
//! │  Butter "ii"                  Eggs   "j"                                │
//! │                                                                         │
//! │  Sortedness is a view property. Mutations only ever touch the rank of   │
//! │  the row they create, except a drag-end re-rank which rewrites all.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Focus Suggestions
//! The store does not own any input or focus resource. Mutations return the
//! id the UI should focus next (the new row, or the row above a deleted one)
//! and the UI decides what to do with it.
//!
//! ## Usage
//! ```rust
//! use grocer_core::store::OrderedItemStore;
//! use grocer_core::types::ItemDraft;
//!
//! let mut store = OrderedItemStore::new();
//! let milk = store.append(ItemDraft::item("Milk"));
//! let eggs = store.append(ItemDraft::item("Eggs"));
//! let butter = store.insert_after(&milk, ItemDraft::item("Butter")).unwrap();
//!
//! let texts: Vec<_> = store.sorted().iter().map(|i| i.text.as_str()).collect();
//! assert_eq!(texts, ["Milk", "Butter", "Eggs"]);
//! # let _ = (eggs, butter);
//! ```

use crate::rank::Rank;
use crate::types::{Item, ItemDraft, RemoteItem};

// =============================================================================
// Ordered Item Store
// =============================================================================

/// Exclusive owner of the open list's items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedItemStore {
    items: Vec<Item>,
}

impl OrderedItemStore {
    /// Creates an empty store.
    ///
    /// Only a freshly created list is empty; once the user deletes rows the
    /// store keeps at least one editable row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store from already-ranked items.
    pub fn from_items(items: Vec<Item>) -> Self {
        OrderedItemStore { items }
    }

    /// Creates a store from backend items, repairing missing ranks.
    pub fn from_remote(items: Vec<RemoteItem>) -> Self {
        OrderedItemStore {
            items: repair_remote_items(items),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Number of rows, sections included.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if the store has no rows.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Looks up an item by id.
    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Items in display order (ascending rank).
    ///
    /// The sort is stable, so items with equal ranks keep storage order.
    pub fn sorted(&self) -> Vec<&Item> {
        let mut view: Vec<&Item> = self.items.iter().collect();
        view.sort_by(|a, b| a.order.cmp(&b.order));
        view
    }

    /// Clones the items in storage order, for serialization.
    pub fn snapshot(&self) -> Vec<Item> {
        self.items.clone()
    }

    /// Borrows the items in storage order.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// JSON form of the items in storage order (the save body payload).
    pub fn serialized(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.items)
    }

    /// True if `other` is structurally identical to the current items:
    /// same ids, text, flags and ranks in the same sequence. Equivalent to
    /// comparing the serialized forms.
    pub fn matches(&self, other: &[Item]) -> bool {
        self.items.as_slice() == other
    }

    /// Row to focus after a list is loaded: the first in display order.
    pub fn initial_focus(&self) -> Option<String> {
        self.sorted().first().map(|item| item.id.clone())
    }

    fn max_rank(&self) -> Option<&Rank> {
        self.items.iter().map(|item| &item.order).max()
    }

    fn storage_index(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Item> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Inserts `draft` directly below `anchor_id` in display order.
    ///
    /// The new rank lies strictly between the anchor and the row that
    /// follows it, or is `anchor.next()` when the anchor is last. No other
    /// rank changes. Returns the new item's id (the focus target), or `None`
    /// without touching the store if the anchor does not exist.
    pub fn insert_after(&mut self, anchor_id: &str, draft: ItemDraft) -> Option<String> {
        let anchor_index = self.storage_index(anchor_id)?;
        let anchor_rank = self.items[anchor_index].order.clone();

        // Smallest rank strictly above the anchor. Equal ranks can only come
        // from a misbehaving remote; skipping them keeps the new rank valid.
        let upper = self
            .items
            .iter()
            .map(|item| &item.order)
            .filter(|rank| **rank > anchor_rank)
            .min()
            .cloned();

        let order = Rank::between_bounds(Some(&anchor_rank), upper.as_ref());
        let item = draft.into_item(order);
        let id = item.id.clone();
        self.items.insert(anchor_index + 1, item);
        Some(id)
    }

    /// Appends `draft` after the last row; into an empty store it lands at
    /// [`Rank::middle`]. Returns the new item's id.
    pub fn append(&mut self, draft: ItemDraft) -> String {
        let order = Rank::between_bounds(self.max_rank(), None);
        let item = draft.into_item(order);
        let id = item.id.clone();
        self.items.push(item);
        id
    }

    /// Appends a new section header. Returns its id.
    pub fn append_section(&mut self, text: impl Into<String>) -> String {
        self.append(ItemDraft::section(text))
    }

    /// Removes the item with `id`.
    ///
    /// The list never becomes empty through deletion: removing the last row
    /// synthesizes a fresh blank row at [`Rank::middle`]. Returns the row to
    /// focus next: the display predecessor, else the first remaining row,
    /// else the synthesized row. Returns `None` if `id` is unknown.
    pub fn delete(&mut self, id: &str) -> Option<String> {
        let display_ids: Vec<String> = self.sorted().iter().map(|item| item.id.clone()).collect();
        let display_pos = display_ids.iter().position(|other| other == id)?;

        if let Some(index) = self.storage_index(id) {
            self.items.remove(index);
        }

        if self.items.is_empty() {
            let blank = Item::blank(Rank::middle());
            let focus = blank.id.clone();
            self.items.push(blank);
            return Some(focus);
        }

        let focus = if display_pos > 0 {
            display_ids[display_pos - 1].clone()
        } else {
            display_ids[1].clone()
        };
        Some(focus)
    }

    /// Applies a drag-end reordering.
    ///
    /// `ordered_ids` is the full visible sequence after the drag. Every item
    /// gets a fresh rank starting at [`Rank::middle`] and advancing with
    /// [`Rank::next`], so sorting afterwards reproduces `ordered_ids` exactly
    /// with no ties. Unknown or repeated ids are ignored; items missing from
    /// `ordered_ids` keep their relative display order after the listed ones.
    pub fn move_and_rerank<I, S>(&mut self, ordered_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut remaining: Vec<Option<Item>> = {
            let mut current = std::mem::take(&mut self.items);
            current.sort_by(|a, b| a.order.cmp(&b.order));
            current.into_iter().map(Some).collect()
        };

        let mut reordered = Vec::with_capacity(remaining.len());
        for id in ordered_ids {
            let id = id.as_ref();
            let slot = remaining
                .iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|item| item.id == id));
            if let Some(item) = slot.and_then(Option::take) {
                reordered.push(item);
            }
        }
        reordered.extend(remaining.into_iter().flatten());

        let mut rank = Rank::middle();
        for item in &mut reordered {
            item.order = rank.clone();
            rank = rank.next();
        }

        self.items = reordered;
    }

    /// Flips `checked` on an entry. Sections are not checkable.
    ///
    /// Returns true if the item changed.
    pub fn toggle_checked(&mut self, id: &str) -> bool {
        match self.find_mut(id) {
            Some(item) if !item.is_section => {
                item.checked = !item.checked;
                true
            }
            _ => false,
        }
    }

    /// Replaces an item's text. Returns true if the item exists.
    pub fn update_text(&mut self, id: &str, text: impl Into<String>) -> bool {
        match self.find_mut(id) {
            Some(item) => {
                item.text = text.into();
                true
            }
            None => false,
        }
    }

    /// Replaces the whole collection, ranks included.
    pub fn replace_all(&mut self, items: Vec<Item>) {
        self.items = items;
    }

    /// Replaces the whole collection with repaired backend items.
    pub fn replace_from_remote(&mut self, items: Vec<RemoteItem>) {
        self.items = repair_remote_items(items);
    }
}

// =============================================================================
// Remote Repair
// =============================================================================

/// Converts backend items into ranked items without dropping any.
///
/// Items whose `order` is missing or malformed are placed after every valid
/// rank: the first gets `next(max(valid ranks, middle))`, the next one `next`
/// of that, and so on, keeping their arrival order. With no valid rank above
/// the middle, the first repaired rank is exactly `middle().next()`.
pub fn repair_remote_items(items: Vec<RemoteItem>) -> Vec<Item> {
    let parsed: Vec<(RemoteItem, Option<Rank>)> = items
        .into_iter()
        .map(|item| {
            let rank = item.valid_order();
            (item, rank)
        })
        .collect();

    let mut cursor = parsed
        .iter()
        .filter_map(|(_, rank)| rank.clone())
        .chain(std::iter::once(Rank::middle()))
        .max()
        .unwrap_or_else(Rank::middle);

    parsed
        .into_iter()
        .map(|(remote, rank)| {
            let order = rank.unwrap_or_else(|| {
                cursor = cursor.next();
                cursor.clone()
            });
            Item {
                id: remote.id,
                text: remote.text,
                checked: remote.checked,
                order,
                is_section: remote.is_section,
            }
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
