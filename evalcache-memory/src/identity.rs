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

use std::{
    num::NonZeroU64,
    sync::atomic::{AtomicU64, Ordering},
};

/// Opaque identity of a live cell.
///
/// Two structurally equal cells (e.g. both empty, or both holding `=A1+1`) still have different identities. The
/// identity is issued once per cell by an [`IdentityAllocator`] and stored alongside the cell for its whole life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellIdentity(NonZeroU64);

impl CellIdentity {
    /// Wrap a raw identity. Returns `None` for zero.
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Raw identity value.
    pub fn as_raw(&self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for CellIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Issues monotonically increasing [`CellIdentity`]s.
#[derive(Debug)]
pub struct IdentityAllocator {
    next: AtomicU64,
}

impl Default for IdentityAllocator {
    fn default() -> Self {
        Self { next: AtomicU64::new(1) }
    }
}

impl IdentityAllocator {
    /// Issue a new identity.
    pub fn allocate(&self) -> CellIdentity {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        // 2^64 identities are not reachable within one session.
        CellIdentity(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }
}
