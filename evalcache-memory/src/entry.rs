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

use std::fmt::Display;

use ahash::RandomState;
use bitflags::bitflags;
use evalcache_common::{slab::Token, value::CellValue};
use hashbrown::HashSet;

use crate::{blank::UsedBlankCells, identity::CellIdentity, location::LocationKey};

/// Handle of an entry within the arena of the cache that owns it.
///
/// A handle outlives nothing: once its entry is removed or replaced the handle dangles and resolves to `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(Token);

impl EntryId {
    pub(crate) fn new(token: Token) -> Self {
        Self(token)
    }

    pub(crate) fn token(&self) -> Token {
        self.0
    }
}

impl Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle of an entry in either cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryRef {
    /// Entry of the plain value cache.
    Plain(EntryId),
    /// Entry of the formula value cache.
    Formula(EntryId),
}

impl Display for EntryRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryRef::Plain(id) => write!(f, "plain:{id}"),
            EntryRef::Formula(id) => write!(f, "formula:{id}"),
        }
    }
}

/// Formula entries that read an entry during their last evaluation.
pub type Consumers = HashSet<EntryId, RandomState>;

bitflags! {
    /// State flags of a formula entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EntryFlags: u8 {
        /// An input changed since the last evaluation.
        const STALE = 0b0000_0001;
        /// An input vanished while the result was being recorded.
        const DANGLING_INPUT = 0b0000_0010;
    }
}

/// Cached value of a literal cell.
///
/// A leaf of the dependency graph: it has no inputs, only consumers.
#[derive(Debug, Clone)]
pub struct PlainValueEntry {
    location: LocationKey,
    value: CellValue,
    consumers: Consumers,
}

impl PlainValueEntry {
    /// Create an entry with no consumer.
    pub fn new(location: LocationKey, value: CellValue) -> Self {
        Self {
            location,
            value,
            consumers: Consumers::default(),
        }
    }

    /// Location of the cell.
    pub fn location(&self) -> &LocationKey {
        &self.location
    }

    /// Value of the cell.
    pub fn value(&self) -> &CellValue {
        &self.value
    }

    /// Formula entries reading this cell.
    pub fn consumers(&self) -> &Consumers {
        &self.consumers
    }

    /// Register a consumer.
    pub fn add_consumer(&mut self, consumer: EntryId) -> bool {
        self.consumers.insert(consumer)
    }

    /// Unregister a consumer.
    pub fn remove_consumer(&mut self, consumer: EntryId) -> bool {
        self.consumers.remove(&consumer)
    }

    /// Move all consumers out.
    pub fn take_consumers(&mut self) -> Consumers {
        std::mem::take(&mut self.consumers)
    }

    pub(crate) fn set_location(&mut self, location: LocationKey) {
        self.location = location;
    }
}

/// Cached result of a formula cell.
#[derive(Debug, Clone)]
pub struct FormulaValueEntry {
    identity: CellIdentity,
    location: Option<LocationKey>,
    value: Option<CellValue>,
    flags: EntryFlags,
    inputs: Vec<EntryRef>,
    used_blanks: UsedBlankCells,
    consumers: Consumers,
}

impl FormulaValueEntry {
    /// Create an entry that has not been evaluated yet.
    ///
    /// `location` is where the cell was last seen. It is only a hint for structural edits.
    pub fn new(identity: CellIdentity, location: Option<LocationKey>) -> Self {
        Self {
            identity,
            location,
            value: None,
            flags: EntryFlags::empty(),
            inputs: vec![],
            used_blanks: UsedBlankCells::default(),
            consumers: Consumers::default(),
        }
    }

    /// Identity of the formula cell.
    pub fn identity(&self) -> CellIdentity {
        self.identity
    }

    /// Where the cell was last seen.
    pub fn location(&self) -> Option<&LocationKey> {
        self.location.as_ref()
    }

    /// Update where the cell was last seen.
    pub fn set_location(&mut self, location: Option<LocationKey>) {
        self.location = location;
    }

    /// Last computed value, `None` if never evaluated or discarded on invalidation.
    pub fn value(&self) -> Option<&CellValue> {
        self.value.as_ref()
    }

    /// Entry flags.
    pub fn flags(&self) -> EntryFlags {
        self.flags
    }

    /// Whether the value must be recomputed before it can be trusted.
    pub fn is_stale(&self) -> bool {
        self.flags.intersects(EntryFlags::STALE | EntryFlags::DANGLING_INPUT)
    }

    /// Whether the value can be trusted.
    pub fn is_fresh(&self) -> bool {
        self.value.is_some() && !self.is_stale()
    }

    /// Entries read during the last evaluation.
    pub fn inputs(&self) -> &[EntryRef] {
        &self.inputs
    }

    /// Blank cells read during the last evaluation.
    pub fn used_blanks(&self) -> &UsedBlankCells {
        &self.used_blanks
    }

    /// Formula entries reading this cell.
    pub fn consumers(&self) -> &Consumers {
        &self.consumers
    }

    /// Register a consumer.
    pub fn add_consumer(&mut self, consumer: EntryId) -> bool {
        self.consumers.insert(consumer)
    }

    /// Unregister a consumer.
    pub fn remove_consumer(&mut self, consumer: EntryId) -> bool {
        self.consumers.remove(&consumer)
    }

    /// Move all consumers out.
    pub fn take_consumers(&mut self) -> Consumers {
        std::mem::take(&mut self.consumers)
    }

    /// Store a freshly computed result and its inputs, clearing every flag.
    ///
    /// Returns the inputs of the previous evaluation, whose consumer sets the caller must update, and whether the
    /// value differs from the previous one.
    pub fn update_result(
        &mut self,
        value: CellValue,
        inputs: Vec<EntryRef>,
        used_blanks: UsedBlankCells,
    ) -> (Vec<EntryRef>, bool) {
        let changed = self.value.as_ref() != Some(&value);
        self.value = Some(value);
        self.flags = EntryFlags::empty();
        self.used_blanks = used_blanks;
        (std::mem::replace(&mut self.inputs, inputs), changed)
    }

    /// Mark the entry stale. Returns `true` if it was not stale before.
    ///
    /// With `discard` the last value is dropped as well.
    pub fn mark_stale(&mut self, discard: bool) -> bool {
        if discard {
            self.value = None;
        }
        let newly = !self.flags.contains(EntryFlags::STALE);
        self.flags.insert(EntryFlags::STALE);
        newly
    }

    /// Flag that an input vanished while the result was recorded.
    pub fn mark_dangling_input(&mut self) {
        self.flags.insert(EntryFlags::DANGLING_INPUT);
    }

    /// Replace one input handle by another. Returns `true` if `from` was an input.
    pub fn replace_input(&mut self, from: EntryRef, to: EntryRef) -> bool {
        let mut replaced = false;
        for input in self.inputs.iter_mut().filter(|input| **input == from) {
            *input = to;
            replaced = true;
        }
        replaced
    }

    /// Drop one input handle. Returns `true` if it was an input.
    pub fn remove_input(&mut self, input: EntryRef) -> bool {
        let len = self.inputs.len();
        self.inputs.retain(|i| *i != input);
        self.inputs.len() != len
    }

    /// Move all inputs out, leaving the entry without edges.
    pub fn take_inputs(&mut self) -> Vec<EntryRef> {
        std::mem::take(&mut self.inputs)
    }
}
