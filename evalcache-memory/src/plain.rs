// Copyright 2026 evalcache Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;

use ahash::RandomState;
use evalcache_common::{
    error::{Error, Result},
    slab::Slab,
    strict_assert_eq,
};
use hashbrown::{hash_map::Entry as HashMapEntry, HashMap};
use itertools::Itertools;

use crate::{
    entry::{EntryId, PlainValueEntry},
    location::{BookSheetKey, LocationKey},
    metrics::Metrics,
};

/// Cache of literal cell values, addressed by [`LocationKey`].
///
/// The cache owns its entries. Replacing or removing an entry makes its [`EntryId`] dangle; detaching the entry's
/// consumers is up to the caller.
#[derive(Debug)]
pub struct PlainValueCache {
    entries: Slab<PlainValueEntry>,
    index: HashMap<LocationKey, EntryId, RandomState>,
    metrics: Arc<Metrics>,
}

impl Default for PlainValueCache {
    fn default() -> Self {
        Self::new(0, Arc::default())
    }
}

impl PlainValueCache {
    /// Create an empty cache with room for `capacity` entries.
    pub fn new(capacity: usize, metrics: Arc<Metrics>) -> Self {
        Self {
            entries: Slab::with_capacity(capacity),
            index: HashMap::with_capacity_and_hasher(capacity, RandomState::default()),
            metrics,
        }
    }

    /// Get the entry at `key`.
    pub fn get(&self, key: &LocationKey) -> Option<&PlainValueEntry> {
        self.get_with_id(key).map(|(_, entry)| entry)
    }

    /// Get the entry at `key` along with its handle.
    pub fn get_with_id(&self, key: &LocationKey) -> Option<(EntryId, &PlainValueEntry)> {
        let found = self
            .lookup(key)
            .and_then(|id| self.entries.get(id.token()).map(|entry| (id, entry)));
        match found {
            Some(_) => Metrics::inc(&self.metrics.plain_hit),
            None => Metrics::inc(&self.metrics.plain_miss),
        }
        found
    }

    /// Get the handle of the entry at `key`.
    pub fn lookup(&self, key: &LocationKey) -> Option<EntryId> {
        self.index.get(key).copied()
    }

    /// Resolve a handle. `None` if it dangles.
    pub fn entry(&self, id: EntryId) -> Option<&PlainValueEntry> {
        self.entries.get(id.token())
    }

    /// Resolve a handle mutably. `None` if it dangles.
    pub fn entry_mut(&mut self, id: EntryId) -> Option<&mut PlainValueEntry> {
        self.entries.get_mut(id.token())
    }

    /// Store `entry` at `key`, replacing any previous entry.
    ///
    /// The previous entry is dropped and its handle dangles from now on. Fails if the entry belongs to another
    /// location.
    pub fn put(&mut self, key: LocationKey, entry: PlainValueEntry) -> Result<EntryId> {
        if entry.location() != &key {
            return Err(Error::invalid_argument("plain entry stored under a foreign location")
                .with_context("key", key)
                .with_context("entry", entry.location()));
        }

        let id = EntryId::new(self.entries.insert(entry));
        match self.index.entry(key) {
            HashMapEntry::Occupied(mut o) => {
                let old = std::mem::replace(o.get_mut(), id);
                if let Some(old) = self.entries.remove(old.token()) {
                    tracing::debug!(
                        "[plain cache]: replace entry at {key} ({} consumers dropped with it)",
                        old.consumers().len()
                    );
                }
                Metrics::inc(&self.metrics.plain_replace);
            }
            HashMapEntry::Vacant(v) => {
                v.insert(id);
                Metrics::inc(&self.metrics.plain_insert);
            }
        }
        Ok(id)
    }

    /// Remove the entry at `key`. Removing an absent key is a no-op.
    pub fn remove(&mut self, key: &LocationKey) -> Option<PlainValueEntry> {
        let id = self.index.remove(key)?;
        let entry = self.entries.remove(id.token());
        strict_assert_eq!(entry.as_ref().map(|e| *e.location()), Some(*key));
        if entry.is_some() {
            Metrics::inc(&self.metrics.plain_remove);
        }
        entry
    }

    /// Remove every entry whose location matches `pred`.
    pub fn remove_where<F>(&mut self, mut pred: F) -> Vec<(EntryId, PlainValueEntry)>
    where
        F: FnMut(&LocationKey) -> bool,
    {
        let keys = self.index.keys().filter(|key| pred(key)).copied().collect_vec();
        keys.into_iter()
            .filter_map(|key| {
                let id = self.index.get(&key).copied()?;
                self.remove(&key).map(|entry| (id, entry))
            })
            .collect()
    }

    /// Move the entries of `sheet` to the locations returned by `relocate`.
    ///
    /// Entries for which `relocate` returns `None` are removed and returned. Moved entries keep their handles, so
    /// dependency edges pointing at them stay valid.
    pub fn relocate<F>(&mut self, sheet: BookSheetKey, mut relocate: F) -> Vec<(EntryId, PlainValueEntry)>
    where
        F: FnMut(&LocationKey) -> Option<LocationKey>,
    {
        let moving = self
            .index
            .iter()
            .filter(|(key, _)| key.book_sheet() == sheet)
            .map(|(key, id)| (*key, *id))
            .collect_vec();
        for (key, _) in moving.iter() {
            self.index.remove(key);
        }

        let mut removed = vec![];
        for (key, id) in moving {
            match relocate(&key) {
                Some(to) => {
                    if let Some(entry) = self.entries.get_mut(id.token()) {
                        entry.set_location(to);
                    }
                    // Targets are distinct for a shift, a collision means the caller mapped two cells onto one.
                    if let Some(displaced) = self.index.insert(to, id) {
                        tracing::warn!("[plain cache]: relocation of {key} onto {to} displaced another entry");
                        if let Some(entry) = self.entries.remove(displaced.token()) {
                            removed.push((displaced, entry));
                        }
                    }
                }
                None => {
                    if let Some(entry) = self.entries.remove(id.token()) {
                        Metrics::inc(&self.metrics.plain_remove);
                        removed.push((id, entry));
                    }
                }
            }
        }
        removed
    }

    /// Drop all entries. All handles dangle afterwards.
    pub fn clear(&mut self) {
        self.index.clear();
        self.entries.clear();
    }

    /// Count of entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the cache holds no entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate entries with their handles, in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (EntryId, &PlainValueEntry)> + '_ {
        self.entries.iter().map(|(token, entry)| (EntryId::new(token), entry))
    }
}
