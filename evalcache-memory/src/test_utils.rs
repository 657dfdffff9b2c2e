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

use evalcache_common::{event::Event, value::CellValue};
use parking_lot::{Mutex, MutexGuard};

use crate::{
    entry::{EntryId, EntryRef},
    listener::EventListener,
    location::LocationKey,
};

/// An event captured by [`RecordingListener`].
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// See [`EventListener::on_cache_hit`].
    Hit(EntryRef, CellValue),
    /// See [`EventListener::on_read_plain_value`].
    ReadPlainValue(LocationKey, CellValue),
    /// See [`EventListener::on_leave`].
    Leave(Event, EntryRef),
    /// See [`EventListener::on_stale`].
    Stale(Event, EntryId),
    /// See [`EventListener::on_change_from_blank`].
    ChangeFromBlank(LocationKey),
    /// See [`EventListener::on_clear`].
    Clear,
}

/// A listener that records all events.
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    records: Arc<Mutex<Vec<Record>>>,
}

impl RecordingListener {
    /// Get all recorded events.
    pub fn records(&self) -> MutexGuard<'_, Vec<Record>> {
        self.records.lock()
    }

    /// Take all recorded events, leaving none behind.
    pub fn take(&self) -> Vec<Record> {
        std::mem::take(&mut *self.records.lock())
    }

    /// Handles reported stale so far, in report order.
    pub fn stale(&self) -> Vec<EntryId> {
        self.records
            .lock()
            .iter()
            .filter_map(|r| match r {
                Record::Stale(_, id) => Some(*id),
                _ => None,
            })
            .collect()
    }
}

impl EventListener for RecordingListener {
    fn on_cache_hit(&self, target: EntryRef, value: &CellValue) {
        self.records.lock().push(Record::Hit(target, value.clone()));
    }

    fn on_read_plain_value(&self, location: &LocationKey, value: &CellValue) {
        self.records.lock().push(Record::ReadPlainValue(*location, value.clone()));
    }

    fn on_leave(&self, reason: Event, target: EntryRef) {
        self.records.lock().push(Record::Leave(reason, target));
    }

    fn on_stale(&self, reason: Event, id: EntryId) {
        self.records.lock().push(Record::Stale(reason, id));
    }

    fn on_change_from_blank(&self, location: &LocationKey) {
        self.records.lock().push(Record::ChangeFromBlank(*location));
    }

    fn on_clear(&self) {
        self.records.lock().push(Record::Clear);
    }
}
