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
use evalcache_memory::{
    CellIdentity, CellValue, Consumers, EntryId, EntryRef, Error, Event, EventListener, FormulaValueCache,
    FormulaValueEntry, LocationKey, Metrics, PlainValueCache, PlainValueEntry, Result, UsedBlankCells,
};
use hashbrown::HashSet;
use itertools::Itertools;

use crate::{
    builder::{EvaluationCacheConfig, StalePolicy},
    cell::{CellContent, EvaluationCell},
};

/// What the cache knows about the result of a formula cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CachedResult<'a> {
    /// The value is up to date.
    Fresh(&'a CellValue),
    /// The last computed value. An input changed since, so it must be recomputed.
    Stale(&'a CellValue),
    /// No value: never evaluated, or discarded when it went stale.
    Pending,
}

impl<'a> CachedResult<'a> {
    fn of(entry: &'a FormulaValueEntry) -> Self {
        match entry.value() {
            Some(value) if entry.is_stale() => CachedResult::Stale(value),
            Some(value) => CachedResult::Fresh(value),
            None => CachedResult::Pending,
        }
    }

    /// The value if it is up to date.
    pub fn fresh(self) -> Option<&'a CellValue> {
        match self {
            CachedResult::Fresh(value) => Some(value),
            _ => None,
        }
    }

    /// The last computed value, up to date or not.
    pub fn last_known(self) -> Option<&'a CellValue> {
        match self {
            CachedResult::Fresh(value) | CachedResult::Stale(value) => Some(value),
            CachedResult::Pending => None,
        }
    }

    /// Whether the value is up to date.
    pub fn is_fresh(self) -> bool {
        matches!(self, CachedResult::Fresh(_))
    }
}

/// Result cache of one evaluation session.
///
/// Pairs a [`PlainValueCache`] with a [`FormulaValueCache`] and keeps the dependency edges between their entries
/// consistent:
///
/// - while evaluating, the evaluator reads literal cells through [`EvaluationCache::plain_value_entry`] and records
///   each formula result along with the entries it read through [`EvaluationCache::record_evaluation`];
/// - when the workbook is edited, the `notify_*` methods drop the affected entries and mark every formula that
///   transitively read them as stale. They return the formula entries that went stale during the call.
///
/// All operations take `&mut self`. A cache serves one evaluation at a time.
pub struct EvaluationCache {
    name: String,
    stale_policy: StalePolicy,
    pub(crate) plain: PlainValueCache,
    pub(crate) formula: FormulaValueCache,
    metrics: Arc<Metrics>,
    event_listener: Option<Arc<dyn EventListener>>,
}

impl std::fmt::Debug for EvaluationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationCache")
            .field("name", &self.name)
            .field("stale_policy", &self.stale_policy)
            .field("plain", &self.plain.len())
            .field("formula", &self.formula.len())
            .finish()
    }
}

impl EvaluationCache {
    pub(crate) fn new(config: EvaluationCacheConfig, event_listener: Option<Arc<dyn EventListener>>) -> Self {
        let metrics = Arc::new(Metrics::default());
        Self {
            plain: PlainValueCache::new(config.plain_capacity, metrics.clone()),
            formula: FormulaValueCache::new(config.formula_capacity, metrics.clone()),
            name: config.name,
            stale_policy: config.stale_policy,
            metrics,
            event_listener,
        }
    }

    /// Name of the session.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// What happens to stale formula values.
    pub fn stale_policy(&self) -> StalePolicy {
        self.stale_policy
    }

    /// Counters of the session.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// The literal value side of the cache.
    pub fn plain_cache(&self) -> &PlainValueCache {
        &self.plain
    }

    /// The formula result side of the cache.
    pub fn formula_cache(&self) -> &FormulaValueCache {
        &self.formula
    }

    /// Count of literal value entries.
    pub fn plain_len(&self) -> usize {
        self.plain.len()
    }

    /// Count of formula entries.
    pub fn formula_len(&self) -> usize {
        self.formula.len()
    }

    /// Whether both caches are empty.
    pub fn is_empty(&self) -> bool {
        self.plain.is_empty() && self.formula.is_empty()
    }

    /// Get the entry of a literal cell read by the evaluator, creating it on first read.
    ///
    /// If the cache holds another value for the location, the entry is replaced and its consumers go stale; they
    /// are reported to the event listener only. Blank cells have no entry: the evaluator records them in the
    /// [`UsedBlankCells`] of the formula instead.
    pub fn plain_value_entry(&mut self, location: LocationKey, value: CellValue) -> Result<EntryRef> {
        if value.is_blank() {
            return Err(Error::invalid_argument("blank cells are tracked as used blank cells")
                .with_context("location", location));
        }

        let cached = self
            .plain
            .get_with_id(&location)
            .map(|(id, entry)| (id, entry.value() == &value));
        if let Some((id, true)) = cached {
            tracing::trace!("[evaluation cache]: {} plain hit at {location}", self.name);
            if let Some(listener) = self.event_listener.as_deref() {
                listener.on_cache_hit(EntryRef::Plain(id), &value);
            }
            return Ok(EntryRef::Plain(id));
        }

        if let Some(listener) = self.event_listener.as_deref() {
            listener.on_read_plain_value(&location, &value);
        }
        let (id, stale) = self.replace_plain(location, value)?;
        if !stale.is_empty() {
            tracing::debug!(
                "[evaluation cache]: {} value at {location} changed under the evaluator, {} formulas went stale",
                self.name,
                stale.len()
            );
        }
        Ok(EntryRef::Plain(id))
    }

    /// Get the entry of a formula cell, creating an empty one if the cell has none.
    pub fn get_or_create_formula_entry<C>(&mut self, cell: &C) -> Result<EntryId>
    where
        C: EvaluationCell + ?Sized,
    {
        let location = cell.location()?;
        self.get_or_create_formula_entry_at(cell.identity(), location)
    }

    /// Get the entry of the formula cell `identity` located at `location`, creating an empty one if the cell has
    /// none.
    pub fn get_or_create_formula_entry_at(
        &mut self,
        identity: CellIdentity,
        location: LocationKey,
    ) -> Result<EntryId> {
        if let Some(id) = self.formula.lookup(identity) {
            if let Some(entry) = self.formula.entry_mut(id) {
                entry.set_location(Some(location));
            }
            return Ok(id);
        }
        let id = self
            .formula
            .put(identity, FormulaValueEntry::new(identity, Some(location)))?;
        tracing::trace!(
            "[evaluation cache]: {} new formula entry {id} for {identity} at {location}",
            self.name
        );
        Ok(id)
    }

    /// Result held by a formula entry. `None` if the handle dangles.
    pub fn formula_result(&self, id: EntryId) -> Option<CachedResult<'_>> {
        self.formula.entry(id).map(CachedResult::of)
    }

    /// Look up the result of a formula cell. A fresh result counts as a cache hit.
    pub fn lookup_formula<C>(&self, cell: &C) -> Option<CachedResult<'_>>
    where
        C: EvaluationCell + ?Sized,
    {
        let (id, entry) = self.formula.get_with_id(cell.identity())?;
        let result = CachedResult::of(entry);
        if let (CachedResult::Fresh(value), Some(listener)) = (result, self.event_listener.as_deref()) {
            listener.on_cache_hit(EntryRef::Formula(id), value);
        }
        Some(result)
    }

    /// Store the result of a formula evaluation along with everything the evaluation read.
    ///
    /// The recorded inputs replace those of the previous evaluation and the entry becomes fresh. Inputs that no
    /// longer resolve are skipped and leave the entry stale. If the value differs from the previous one, the
    /// consumers of the entry go stale and are returned.
    pub fn record_evaluation(
        &mut self,
        id: EntryId,
        value: CellValue,
        inputs: &[EntryRef],
        used_blanks: UsedBlankCells,
    ) -> Result<Vec<EntryId>> {
        if self.formula.entry(id).is_none() {
            return Err(Error::invalid_argument("result recorded for an unknown or removed formula entry")
                .with_context("entry", id));
        }
        if inputs.contains(&EntryRef::Formula(id)) {
            return Err(Error::invalid_argument("formula entry cannot read its own result").with_context("entry", id));
        }

        let (live, dangling): (Vec<_>, Vec<_>) = inputs
            .iter()
            .copied()
            .unique()
            .partition(|input| self.resolves(*input));

        let Some(entry) = self.formula.entry_mut(id) else {
            return Ok(vec![]);
        };
        let (old_inputs, changed) = entry.update_result(value, live.clone(), used_blanks);
        if !dangling.is_empty() {
            entry.mark_dangling_input();
            tracing::debug!(
                "[evaluation cache]: {} formula {id} read {} entries that are gone, result kept stale",
                self.name,
                dangling.len()
            );
        }
        let consumers = match changed {
            true => entry.consumers().iter().copied().collect_vec(),
            false => vec![],
        };

        for input in old_inputs {
            self.remove_consumer(input, id);
        }
        for input in live.iter() {
            self.add_consumer(*input, id);
        }
        Metrics::add(&self.metrics.edge_record, live.len() as u64);
        tracing::trace!(
            "[evaluation cache]: {} recorded formula {id} with {} inputs, changed: {changed}",
            self.name,
            live.len()
        );

        Ok(self.invalidate(consumers, Event::Upstream))
    }

    /// Handle an edit of a cell.
    ///
    /// See [`EvaluationCache::notify_update`].
    pub fn notify_update_cell<C>(&mut self, cell: &C) -> Result<Vec<EntryId>>
    where
        C: EvaluationCell + ?Sized,
    {
        let location = cell.location()?;
        self.notify_update(cell.identity(), location, cell.content())
    }

    /// Handle an edit of the cell `identity` located at `location`, which now holds `content`.
    ///
    /// The entries the cell had are replaced or removed and every formula that read them, directly or not, goes
    /// stale. Formulas read through the new entry of the cell once they are evaluated again. A literal edit that
    /// keeps the same value changes nothing. A blank cell that gets content invalidates the formulas that read it
    /// as blank.
    pub fn notify_update(
        &mut self,
        identity: CellIdentity,
        location: LocationKey,
        content: CellContent,
    ) -> Result<Vec<EntryId>> {
        let formula_id = self.formula.lookup(identity);
        let plain_id = self.plain.lookup(&location);
        let was_blank = formula_id.is_none() && plain_id.is_none();
        let mut stale = vec![];

        let current = match content {
            CellContent::Formula => {
                let old = formula_id.and_then(|old_id| self.formula.remove(identity).map(|entry| (old_id, entry)));
                let id = self
                    .formula
                    .put(identity, FormulaValueEntry::new(identity, Some(location)))?;
                if let Some((old_id, old)) = old {
                    stale.extend(self.retire_formula(old_id, old, Some(EntryRef::Formula(id)), Event::Replace));
                }
                stale.extend(self.remove_plain(&location, Some(EntryRef::Formula(id)), Event::Remove));
                Some(EntryRef::Formula(id))
            }
            CellContent::Value(value) => {
                let unchanged = plain_id
                    .and_then(|id| self.plain.entry(id))
                    .is_some_and(|entry| entry.value() == &value);
                let current = if unchanged {
                    plain_id.map(EntryRef::Plain)
                } else if value.is_blank() {
                    stale.extend(self.remove_plain(&location, None, Event::Remove));
                    None
                } else {
                    let (id, s) = self.replace_plain(location, value)?;
                    stale.extend(s);
                    Some(EntryRef::Plain(id))
                };
                if let Some(old_id) = formula_id {
                    if let Some(old) = self.formula.remove(identity) {
                        stale.extend(self.retire_formula(old_id, old, current, Event::Remove));
                    }
                }
                current
            }
        };

        if was_blank && current.is_some() {
            stale.extend(self.change_from_blank(&location));
        }
        tracing::debug!(
            "[evaluation cache]: {} cell {identity} at {location} updated, {} formulas went stale",
            self.name,
            stale.len()
        );
        Ok(stale)
    }

    /// Handle the deletion of a cell.
    ///
    /// See [`EvaluationCache::notify_delete`].
    pub fn notify_delete_cell<C>(&mut self, cell: &C) -> Result<Vec<EntryId>>
    where
        C: EvaluationCell + ?Sized,
    {
        let location = cell.location()?;
        self.notify_delete(cell.identity(), location)
    }

    /// Handle the deletion of the cell `identity` located at `location`.
    ///
    /// A deleted cell reads as blank, so this is an update to [`CellValue::Blank`]. Deleting a cell the cache knows
    /// nothing about is a no-op.
    pub fn notify_delete(&mut self, identity: CellIdentity, location: LocationKey) -> Result<Vec<EntryId>> {
        self.notify_update(identity, location, CellContent::Value(CellValue::Blank))
    }

    /// Formula entries whose result must be recomputed, in unspecified order.
    pub fn stale_formulas(&self) -> Vec<EntryId> {
        self.formula
            .iter()
            .filter(|(_, entry)| entry.is_stale())
            .map(|(id, _)| id)
            .collect()
    }

    /// Snapshot of all formula entry handles, in unspecified order.
    pub fn formula_entries(&self) -> Vec<EntryId> {
        self.formula.entries()
    }

    /// Visit every formula entry exactly once, in unspecified order.
    pub fn apply_to_all<F>(&self, mut f: F)
    where
        F: FnMut(EntryId, &FormulaValueEntry),
    {
        for (id, entry) in self.formula.iter() {
            f(id, entry);
        }
    }

    /// Drop every entry of both caches. All handles dangle afterwards.
    ///
    /// Used when the whole session is reset, e.g. after the set of linked workbooks changed.
    pub fn clear(&mut self) {
        tracing::debug!(
            "[evaluation cache]: {} clear {} plain and {} formula entries",
            self.name,
            self.plain.len(),
            self.formula.len()
        );
        self.plain.clear();
        self.formula.clear();
        Metrics::inc(&self.metrics.clear);
        if let Some(listener) = self.event_listener.as_deref() {
            listener.on_clear();
        }
    }

    /// Store a non-blank literal at `location`, replacing the entry there if any.
    fn replace_plain(&mut self, location: LocationKey, value: CellValue) -> Result<(EntryId, Vec<EntryId>)> {
        let old = self
            .plain
            .lookup(&location)
            .and_then(|old_id| self.plain.remove(&location).map(|entry| (old_id, entry)));
        let id = self.plain.put(location, PlainValueEntry::new(location, value))?;
        let stale = match old {
            Some((old_id, old)) => self.retire_plain(old_id, old, Some(EntryRef::Plain(id)), Event::Replace),
            None => vec![],
        };
        Ok((id, stale))
    }

    /// Remove the literal at `location` if any, handing its consumers over to `successor`.
    fn remove_plain(&mut self, location: &LocationKey, successor: Option<EntryRef>, reason: Event) -> Vec<EntryId> {
        let Some(id) = self.plain.lookup(location) else {
            return vec![];
        };
        match self.plain.remove(location) {
            Some(entry) => self.retire_plain(id, entry, successor, reason),
            None => vec![],
        }
    }

    /// Detach a literal entry that left the cache.
    pub(crate) fn retire_plain(
        &mut self,
        id: EntryId,
        mut entry: PlainValueEntry,
        successor: Option<EntryRef>,
        reason: Event,
    ) -> Vec<EntryId> {
        tracing::trace!(
            "[evaluation cache]: {} plain entry {id} at {} left, reason: {reason}",
            self.name,
            entry.location()
        );
        if let Some(listener) = self.event_listener.as_deref() {
            listener.on_leave(reason, EntryRef::Plain(id));
        }
        let consumers = entry.take_consumers();
        self.hand_over(EntryRef::Plain(id), consumers, successor)
    }

    /// Detach a formula entry that left the cache.
    pub(crate) fn retire_formula(
        &mut self,
        id: EntryId,
        mut entry: FormulaValueEntry,
        successor: Option<EntryRef>,
        reason: Event,
    ) -> Vec<EntryId> {
        tracing::trace!(
            "[evaluation cache]: {} formula entry {id} of {} left, reason: {reason}",
            self.name,
            entry.identity()
        );
        if let Some(listener) = self.event_listener.as_deref() {
            listener.on_leave(reason, EntryRef::Formula(id));
        }
        for input in entry.take_inputs() {
            self.remove_consumer(input, id);
        }
        let consumers = entry.take_consumers();
        self.hand_over(EntryRef::Formula(id), consumers, successor)
    }

    /// Invalidate the consumers of an entry that left the cache and point their inputs at `successor`.
    ///
    /// Without successor the edges are dropped. Consumers that no longer resolve are forgotten.
    fn hand_over(&mut self, from: EntryRef, consumers: Consumers, successor: Option<EntryRef>) -> Vec<EntryId> {
        let stale = self.invalidate(consumers.iter().copied(), Event::Upstream);

        let mut live = vec![];
        for consumer in consumers {
            let Some(entry) = self.formula.entry_mut(consumer) else {
                continue;
            };
            match successor {
                Some(to) => {
                    entry.replace_input(from, to);
                    live.push(consumer);
                }
                None => {
                    entry.remove_input(from);
                }
            }
        }
        if let Some(to) = successor {
            for consumer in live {
                self.add_consumer(to, consumer);
            }
        }
        stale
    }

    /// Invalidate the formulas that read the blank cell at `location`, which just got content.
    fn change_from_blank(&mut self, location: &LocationKey) -> Vec<EntryId> {
        if let Some(listener) = self.event_listener.as_deref() {
            listener.on_change_from_blank(location);
        }
        let readers = self
            .formula
            .iter()
            .filter(|(_, entry)| entry.used_blanks().contains(location))
            .map(|(id, _)| id)
            .collect_vec();
        if readers.is_empty() {
            return vec![];
        }
        tracing::trace!(
            "[evaluation cache]: {} blank cell {location} got content, {} formulas read it",
            self.name,
            readers.len()
        );
        self.invalidate(readers, Event::ChangeFromBlank)
    }

    /// Mark `seeds` and everything that transitively consumes them as stale.
    ///
    /// Returns the entries that were fresh before, each once. Cycles and dangling handles are tolerated.
    pub(crate) fn invalidate(&mut self, seeds: impl IntoIterator<Item = EntryId>, reason: Event) -> Vec<EntryId> {
        let discard = self.stale_policy == StalePolicy::Discard;
        let listener = self.event_listener.clone();

        let mut visited: HashSet<EntryId, RandomState> = HashSet::default();
        let mut stack = seeds.into_iter().map(|id| (id, reason)).collect_vec();
        let mut stale = vec![];

        while let Some((id, reason)) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(entry) = self.formula.entry_mut(id) else {
                continue;
            };
            if entry.mark_stale(discard) {
                tracing::trace!(
                    "[evaluation cache]: {} formula {id} of {} went stale, reason: {reason}",
                    self.name,
                    entry.identity()
                );
                Metrics::inc(&self.metrics.invalidate);
                if let Some(listener) = listener.as_deref() {
                    listener.on_stale(reason, id);
                }
                stale.push(id);
            }
            stack.extend(entry.consumers().iter().map(|consumer| (*consumer, Event::Upstream)));
        }
        stale
    }

    fn resolves(&self, target: EntryRef) -> bool {
        match target {
            EntryRef::Plain(id) => self.plain.entry(id).is_some(),
            EntryRef::Formula(id) => self.formula.entry(id).is_some(),
        }
    }

    fn add_consumer(&mut self, input: EntryRef, consumer: EntryId) {
        match input {
            EntryRef::Plain(id) => {
                if let Some(entry) = self.plain.entry_mut(id) {
                    entry.add_consumer(consumer);
                }
            }
            EntryRef::Formula(id) => {
                if let Some(entry) = self.formula.entry_mut(id) {
                    entry.add_consumer(consumer);
                }
            }
        }
    }

    fn remove_consumer(&mut self, input: EntryRef, consumer: EntryId) {
        match input {
            EntryRef::Plain(id) => {
                if let Some(entry) = self.plain.entry_mut(id) {
                    entry.remove_consumer(consumer);
                }
            }
            EntryRef::Formula(id) => {
                if let Some(entry) = self.formula.entry_mut(id) {
                    entry.remove_consumer(consumer);
                }
            }
        }
    }
}
