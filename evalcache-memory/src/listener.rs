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

use evalcache_common::{event::Event, value::CellValue};

use crate::{
    entry::{EntryId, EntryRef},
    location::LocationKey,
};

/// Trait for the customized evaluation cache listener.
///
/// All methods default to no-ops. They are called synchronously from the cache operation that triggers them and
/// must not call back into the cache.
pub trait EventListener: Send + Sync + 'static {
    /// A lookup was answered from the cache.
    #[expect(unused_variables)]
    fn on_cache_hit(&self, target: EntryRef, value: &CellValue) {}

    /// A literal cell value was read for the first time or changed since the last read.
    #[expect(unused_variables)]
    fn on_read_plain_value(&self, location: &LocationKey, value: &CellValue) {}

    /// An entry left the cache with the reason.
    #[expect(unused_variables)]
    fn on_leave(&self, reason: Event, target: EntryRef) {}

    /// A formula entry went stale with the reason.
    #[expect(unused_variables)]
    fn on_stale(&self, reason: Event, id: EntryId) {}

    /// A blank cell some formulas may have read now holds a value.
    #[expect(unused_variables)]
    fn on_change_from_blank(&self, location: &LocationKey) {}

    /// The whole cache was cleared.
    fn on_clear(&self) {}
}

/// Listener that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventListener;

impl EventListener for NoopEventListener {}
