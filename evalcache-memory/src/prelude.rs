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

pub use evalcache_common::{
    error::{Error, ErrorKind, Result},
    event::Event,
    value::{CellValue, ErrorCode},
};

pub use crate::{
    blank::UsedBlankCells,
    entry::{Consumers, EntryFlags, EntryId, EntryRef, FormulaValueEntry, PlainValueEntry},
    formula::FormulaValueCache,
    identity::{CellIdentity, IdentityAllocator},
    listener::{EventListener, NoopEventListener},
    location::{BookSheetKey, LocationKey},
    metrics::{Metrics, MetricsSnapshot},
    plain::PlainValueCache,
};
