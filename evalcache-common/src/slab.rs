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

//! A slab whose tokens carry the generation of the slot they were issued for.
//!
//! A token keeps resolving only while the value it was issued for is alive. Once the value is removed the slot's
//! generation moves on, so a stale token held elsewhere (e.g. a dependency edge) resolves to nothing instead of to
//! whatever value reuses the slot.

/// Stable handle of a value stored in a [`Slab`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token {
    index: u32,
    generation: u32,
}

impl Token {
    /// Slot index of the token.
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// Generation of the slot when the token was issued.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone)]
enum Entry<T> {
    Vacant(usize),
    Occupied(T),
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    entry: Entry<T>,
}

/// Dense storage indexed by generational [`Token`]s.
#[derive(Debug, Clone)]
pub struct Slab<T> {
    slots: Vec<Slot<T>>,
    len: usize,
    next: usize,
}

impl<T> Default for Slab<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Slab<T> {
    /// Create an empty slab.
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            next: 0,
            len: 0,
        }
    }

    /// Create an empty slab with room for `capacity` values.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            next: 0,
            len: 0,
        }
    }

    /// Store a value and return its token.
    pub fn insert(&mut self, val: T) -> Token {
        let index = self.next;
        crate::strict_assert!(index <= u32::MAX as usize, "slab index overflows token");
        self.len += 1;

        if index == self.slots.len() {
            self.slots.push(Slot {
                generation: 0,
                entry: Entry::Occupied(val),
            });
            self.next = index + 1;
        } else {
            let slot = &mut self.slots[index];
            self.next = match slot.entry {
                Entry::Vacant(next) => next,
                Entry::Occupied(_) => unreachable!("free list points at an occupied slot"),
            };
            slot.entry = Entry::Occupied(val);
        }

        Token {
            index: index as u32,
            generation: self.slots[index].generation,
        }
    }

    /// Remove the value the token was issued for.
    ///
    /// Returns `None` if the token is dangling.
    pub fn remove(&mut self, token: Token) -> Option<T> {
        let index = token.index();
        let slot = self.slots.get_mut(index)?;
        if slot.generation != token.generation || matches!(slot.entry, Entry::Vacant(_)) {
            return None;
        }

        let entry = std::mem::replace(&mut slot.entry, Entry::Vacant(self.next));
        slot.generation = slot.generation.wrapping_add(1);
        self.len -= 1;
        self.next = index;

        match entry {
            Entry::Occupied(val) => Some(val),
            Entry::Vacant(_) => unreachable!(),
        }
    }

    /// Get the value the token was issued for.
    pub fn get(&self, token: Token) -> Option<&T> {
        match self.slots.get(token.index()) {
            Some(Slot {
                generation,
                entry: Entry::Occupied(val),
            }) if *generation == token.generation => Some(val),
            _ => None,
        }
    }

    /// Get the mutable value the token was issued for.
    pub fn get_mut(&mut self, token: Token) -> Option<&mut T> {
        match self.slots.get_mut(token.index()) {
            Some(Slot {
                generation,
                entry: Entry::Occupied(val),
            }) if *generation == token.generation => Some(val),
            _ => None,
        }
    }

    /// Whether the token still resolves.
    pub fn contains(&self, token: Token) -> bool {
        self.get(token).is_some()
    }

    /// Count of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the slab holds no live value.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate live values with their tokens, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Token, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| match &slot.entry {
            Entry::Occupied(val) => Some((
                Token {
                    index: index as u32,
                    generation: slot.generation,
                },
                val,
            )),
            Entry::Vacant(_) => None,
        })
    }

    /// Iterate live values mutably with their tokens, in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Token, &mut T)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| match &mut slot.entry {
                Entry::Occupied(val) => Some((
                    Token {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    val,
                )),
                Entry::Vacant(_) => None,
            })
    }

    /// Drop all values.
    ///
    /// Slots are kept with bumped generations so that tokens issued before the clear stay dangling.
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if matches!(slot.entry, Entry::Occupied(_)) {
                slot.generation = slot.generation.wrapping_add(1);
            }
            // Rebuild the free list in slot order.
            slot.entry = Entry::Vacant(index + 1);
        }
        self.next = 0;
        self.len = 0;
    }
}
