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

//! A dependency-aware result cache for spreadsheet formula evaluation.
//!
//! An [`EvaluationCache`] remembers the values of literal cells and the computed results of formula cells for one
//! evaluation session, records which entries each formula read, and invalidates exactly the affected results when
//! the workbook is edited.
//!
//! ```
//! use evalcache::prelude::*;
//!
//! # fn main() -> evalcache::Result<()> {
//! let mut cache = EvaluationCacheBuilder::new().with_name("book").build()?;
//!
//! let allocator = IdentityAllocator::default();
//! let (a1, b1) = (allocator.allocate(), allocator.allocate());
//! let (a1_at, b1_at) = (LocationKey::new(0, 0, 0, 0)?, LocationKey::new(0, 0, 0, 1)?);
//!
//! // Evaluating `B1 = A1 + 1` reads A1 and records the edge.
//! let input = cache.plain_value_entry(a1_at, CellValue::from(5.0))?;
//! let formula = cache.get_or_create_formula_entry_at(b1, b1_at)?;
//! cache.record_evaluation(formula, CellValue::from(6.0), &[input], UsedBlankCells::default())?;
//! assert!(cache.formula_result(formula).and_then(|r| r.fresh()).is_some());
//!
//! // Editing A1 invalidates B1 and nothing else.
//! let stale = cache.notify_update(a1, a1_at, CellContent::Value(CellValue::from(10.0)))?;
//! assert_eq!(stale, vec![formula]);
//! # Ok(())
//! # }
//! ```

mod builder;
mod cache;
mod cell;
mod structure;

/// Re-export of the commonly used types.
pub mod prelude;

/// Utilities for testing.
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use prelude::*;
