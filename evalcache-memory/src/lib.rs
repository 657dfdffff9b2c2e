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

//! In-memory caches backing formula evaluation.
//!
//! Two caches address the same workbook → sheet → cell space in different ways:
//!
//! - [`PlainValueCache`] keys literal cells by their packed [`LocationKey`];
//! - [`FormulaValueCache`] keys formula cells by their [`CellIdentity`], so a formula keeps its entry when its position
//!   moves.
//!
//! Entries live in generational arenas and reference each other through [`EntryRef`] handles. A handle whose entry is
//! gone simply stops resolving.

mod blank;
mod entry;
mod formula;
mod identity;
mod listener;
mod location;
mod metrics;
mod plain;

/// Re-export of the commonly used types.
pub mod prelude;

/// Utilities for testing.
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use prelude::*;
