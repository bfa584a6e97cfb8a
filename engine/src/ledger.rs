//! Pending-update ledger.
//!
//! Every speculative mutation the reconciler applies gets an entry here,
//! keyed by a generated update id. The entry keeps the list as it was before
//! the mutation and the procedure that undoes it. Entries live only until the
//! network call behind the mutation settles.

use crate::{error::Result, Error, Item, ItemId, Timestamp, UpdateId, TEMP_ID_PREFIX};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Prefix of generated update identifiers.
pub const UPDATE_ID_PREFIX: &str = "upd_";

/// Undo procedure: `(current, original) -> restored`.
pub type RollbackFn = Box<dyn Fn(&[Item], &[Item]) -> Vec<Item> + Send>;

/// Source of timestamps for generated identifiers.
pub type ClockFn = fn() -> Timestamp;

/// Milliseconds since the Unix epoch from the system clock.
pub fn system_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or(0)
}

/// Which reconciler entry point produced an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    Update,
    Create,
    Delete,
    Vote,
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdateKind::Update => "update",
            UpdateKind::Create => "create",
            UpdateKind::Delete => "delete",
            UpdateKind::Vote => "vote",
        };
        f.write_str(name)
    }
}

/// An in-flight speculative mutation.
pub struct PendingUpdate {
    /// Ledger key
    pub update_id: UpdateId,
    /// Entry point that created the update
    pub kind: UpdateKind,
    /// Item the update targets, if any
    pub item_id: Option<ItemId>,
    /// Full list as it was before the mutation
    pub original_data: Vec<Item>,
    /// The speculative item or patch
    pub optimistic_data: serde_json::Value,
    /// When the entry was recorded
    pub created_at: Timestamp,
    /// Position in the ledger, assigned on insert
    order: u64,
    rollback: RollbackFn,
}

impl PendingUpdate {
    /// Create a new ledger entry.
    pub fn new(
        update_id: impl Into<UpdateId>,
        kind: UpdateKind,
        item_id: Option<ItemId>,
        original_data: Vec<Item>,
        optimistic_data: serde_json::Value,
        created_at: Timestamp,
        rollback: RollbackFn,
    ) -> Self {
        Self {
            update_id: update_id.into(),
            kind,
            item_id,
            original_data,
            optimistic_data,
            created_at,
            order: 0,
            rollback,
        }
    }

    /// Apply the undo procedure against `current` and the recorded snapshot.
    pub fn restore(&self, current: &[Item]) -> Vec<Item> {
        (self.rollback)(current, &self.original_data)
    }
}

impl fmt::Debug for PendingUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingUpdate")
            .field("update_id", &self.update_id)
            .field("kind", &self.kind)
            .field("item_id", &self.item_id)
            .field("original_len", &self.original_data.len())
            .field("optimistic_data", &self.optimistic_data)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Owned map of pending updates plus the identifier generator.
pub struct Ledger {
    entries: HashMap<UpdateId, PendingUpdate>,
    /// Distinguishes ids generated within the same millisecond
    seq: u64,
    inserted: u64,
    clock: ClockFn,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Create an empty ledger using the system clock.
    pub fn new() -> Self {
        Self::with_clock(system_millis)
    }

    /// Create an empty ledger with a custom timestamp source.
    pub fn with_clock(clock: ClockFn) -> Self {
        Self {
            entries: HashMap::new(),
            seq: 0,
            inserted: 0,
            clock,
        }
    }

    /// Current timestamp from the ledger's clock.
    pub fn now(&self) -> Timestamp {
        (self.clock)()
    }

    fn next_suffix(&mut self) -> String {
        let seq = self.seq;
        self.seq += 1;
        format!("{}_{}", self.now(), seq)
    }

    /// Generate a fresh update identifier.
    pub fn next_update_id(&mut self) -> UpdateId {
        format!("{UPDATE_ID_PREFIX}{}", self.next_suffix())
    }

    /// Generate a fresh temporary item identifier.
    pub fn next_temp_id(&mut self) -> ItemId {
        format!("{TEMP_ID_PREFIX}{}", self.next_suffix())
    }

    /// Record an entry. An entry with the same id is replaced.
    pub fn insert(&mut self, mut update: PendingUpdate) {
        update.order = self.inserted;
        self.inserted += 1;
        self.entries.insert(update.update_id.clone(), update);
    }

    /// Remove an entry, returning it if present.
    pub fn remove(&mut self, update_id: &str) -> Option<PendingUpdate> {
        self.entries.remove(update_id)
    }

    /// Get an entry by id.
    pub fn get(&self, update_id: &str) -> Option<&PendingUpdate> {
        self.entries.get(update_id)
    }

    /// Check if an entry is present.
    pub fn contains(&self, update_id: &str) -> bool {
        self.entries.contains_key(update_id)
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending update ids in creation order. Entries stamped in the same
    /// millisecond keep the order they were recorded in.
    pub fn ids(&self) -> Vec<UpdateId> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by_key(|e| (e.created_at, e.order));
        entries.into_iter().map(|e| e.update_id.clone()).collect()
    }

    /// Remove the entry and apply its undo procedure to `current`.
    ///
    /// Fails with [`Error::UpdateNotFound`] once the entry has been removed,
    /// so an update can be unwound at most once.
    pub fn rollback(&mut self, update_id: &str, current: &[Item]) -> Result<Vec<Item>> {
        let update = self
            .remove(update_id)
            .ok_or_else(|| Error::UpdateNotFound(update_id.to_string()))?;
        Ok(update.restore(current))
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("entries", &self.entries)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}
