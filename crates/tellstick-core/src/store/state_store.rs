// ── State store ──
//
// The one cache every view reads. A single mutex guards the whole map;
// it is taken by the refresh merge, by the reconciler on the device
// manager's thread, and by confirmed commands. It is never held across
// an `.await`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::warn;

use crate::model::{Entry, Identifier};

/// Entries in first-insertion order plus refresh bookkeeping.
#[derive(Debug, Default)]
pub(crate) struct StoreState {
    pub(crate) entries: IndexMap<Identifier, Entry>,
    pub(crate) last_update: Option<DateTime<Utc>>,
}

impl StoreState {
    /// Replace or insert one entry.
    ///
    /// A sensor stays a sensor: a record without `data` never replaces a
    /// cached sensor. Returns whether the entry was stored.
    pub(crate) fn replace(&mut self, id: Identifier, entry: Entry) -> bool {
        if !entry.is_sensor() && self.entries.get(&id).is_some_and(Entry::is_sensor) {
            warn!(%id, "refusing to turn a sensor into a device");
            return false;
        }
        self.entries.insert(id, entry);
        true
    }
}

/// Authoritative in-memory cache of devices and sensors.
#[derive(Debug, Default)]
pub struct StateStore {
    state: Mutex<StoreState>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Copy of one entry.
    pub fn get(&self, id: &str) -> Option<Entry> {
        self.lock().entries.get(id).cloned()
    }

    /// Run `f` against one entry without copying it out.
    pub fn with_entry<R>(&self, id: &str, f: impl FnOnce(&Entry) -> R) -> Option<R> {
        self.lock().entries.get(id).map(f)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().entries.contains_key(id)
    }

    /// All keys, in first-insertion order.
    pub fn ids(&self) -> Vec<Identifier> {
        self.lock().entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// When the last successful full refresh was committed.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.lock().last_update
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Replace or insert a single entry.
    pub fn upsert(&self, id: impl Into<Identifier>, entry: Entry) -> bool {
        self.lock().replace(id.into(), entry)
    }

    /// Mutate one entry in place. `false` if it is not cached.
    pub fn update_entry(&self, id: &str, f: impl FnOnce(&mut Entry)) -> bool {
        self.lock().entries.get_mut(id).map(f).is_some()
    }
}
