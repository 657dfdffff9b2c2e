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
};
use hashbrown::{hash_map::Entry as HashMapEntry, HashMap};

use crate::{
    entry::{EntryId, FormulaValueEntry},
    identity::CellIdentity,
    metrics::Metrics,
};

/// Cache of formula results, addressed by [`CellIdentity`].
///
/// Keying by identity keeps a formula's entry attached to its cell when rows or columns move, and keeps two
/// structurally equal cells apart.
#[derive(Debug)]
pub struct FormulaValueCache {
    entries: Slab<FormulaValueEntry>,
    index: HashMap<CellIdentity, EntryId, RandomState>,
    metrics: Arc<Metrics>,
}

impl Default for FormulaValueCache {
    fn default() -> Self {
        Self::new(0, Arc::default())
    }
}

impl FormulaValueCache {
    /// Create an empty cache with room for `capacity` entries.
    pub fn new(capacity: usize, metrics: Arc<Metrics>) -> Self {
        Self {
            entries: Slab::with_capacity(capacity),
            index: HashMap::with_capacity_and_hasher(capacity, RandomState::default()),
            metrics,
        }
    }

    /// Get the entry of the cell.
    ///
    /// Only an entry with a trusted value counts as a hit.
    pub fn get(&self, cell: CellIdentity) -> Option<&FormulaValueEntry> {
        self.get_with_id(cell).map(|(_, entry)| entry)
    }

    /// Get the entry of the cell along with its handle.
    pub fn get_with_id(&self, cell: CellIdentity) -> Option<(EntryId, &FormulaValueEntry)> {
        let found = self
            .lookup(cell)
            .and_then(|id| self.entries.get(id.token()).map(|entry| (id, entry)));
        match found {
            Some((_, entry)) if entry.is_fresh() => Metrics::inc(&self.metrics.formula_hit),
            _ => Metrics::inc(&self.metrics.formula_miss),
        }
        found
    }

    /// Get the handle of the cell's entry.
    pub fn lookup(&self, cell: CellIdentity) -> Option<EntryId> {
        self.index.get(&cell).copied()
    }

    /// Resolve a handle. `None` if it dangles.
    pub fn entry(&self, id: EntryId) -> Option<&FormulaValueEntry> {
        self.entries.get(id.token())
    }

    /// Resolve a handle mutably. `None` if it dangles.
    pub fn entry_mut(&mut self, id: EntryId) -> Option<&mut FormulaValueEntry> {
        self.entries.get_mut(id.token())
    }

    /// Store `entry` for `cell`, replacing any previous entry.
    ///
    /// The previous entry is dropped and its handle dangles from now on; use [`FormulaValueCache::remove`] first to
    /// detach its edges. Fails if the entry belongs to another cell.
    pub fn put(&mut self, cell: CellIdentity, entry: FormulaValueEntry) -> Result<EntryId> {
        if entry.identity() != cell {
            return Err(Error::invalid_argument("formula entry stored under a foreign identity")
                .with_context("cell", cell)
                .with_context("entry", entry.identity()));
        }

        let id = EntryId::new(self.entries.insert(entry));
        match self.index.entry(cell) {
            HashMapEntry::Occupied(mut o) => {
                let old = std::mem::replace(o.get_mut(), id);
                if let Some(old) = self.entries.remove(old.token()) {
                    tracing::debug!(
                        "[formula cache]: replace entry of cell {cell} ({} inputs, {} consumers dropped with it)",
                        old.inputs().len(),
                        old.consumers().len()
                    );
                }
                Metrics::inc(&self.metrics.formula_replace);
            }
            HashMapEntry::Vacant(v) => {
                v.insert(id);
                Metrics::inc(&self.metrics.formula_insert);
            }
        }
        Ok(id)
    }

    /// Remove the cell's entry and hand it back so the caller can detach its edges.
    ///
    /// Removing a cell without entry is a no-op.
    pub fn remove(&mut self, cell: CellIdentity) -> Option<FormulaValueEntry> {
        let id = self.index.remove(&cell)?;
        let entry = self.entries.remove(id.token());
        if entry.is_some() {
            Metrics::inc(&self.metrics.formula_remove);
        }
        entry
    }

    /// Snapshot of all entry handles, in unspecified order.
    pub fn entries(&self) -> Vec<EntryId> {
        self.entries.iter().map(|(token, _)| EntryId::new(token)).collect()
    }

    /// Iterate entries with their handles, in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (EntryId, &FormulaValueEntry)> + '_ {
        self.entries.iter().map(|(token, entry)| (EntryId::new(token), entry))
    }

    /// Visit every entry exactly once, in unspecified order.
    ///
    /// The visitor gets mutable access to one entry at a time; the cache itself stays borrowed for the whole visit,
    /// so entries cannot be added or removed meanwhile.
    pub fn apply_to_all<F>(&mut self, mut f: F)
    where
        F: FnMut(EntryId, &mut FormulaValueEntry),
    {
        for (token, entry) in self.entries.iter_mut() {
            f(EntryId::new(token), entry);
        }
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
}
