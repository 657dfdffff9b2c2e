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

use evalcache_memory::{CellIdentity, CellValue, LocationKey, Result};

/// What a cell holds after an edit.
#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    /// A formula. Its result is produced by the evaluator and recorded later.
    Formula,
    /// A literal value. [`CellValue::Blank`] means the cell is empty.
    Value(CellValue),
}

impl From<CellValue> for CellContent {
    fn from(value: CellValue) -> Self {
        CellContent::Value(value)
    }
}

/// A cell of the workbook as seen by the evaluation cache.
///
/// The cache never holds on to cells. It only reads their identity, position and content while handling a call.
pub trait EvaluationCell {
    /// Identity of the cell. Stable across edits of its content.
    fn identity(&self) -> CellIdentity;

    /// Index of the workbook holding the cell.
    fn book_index(&self) -> u32;

    /// Index of the sheet within its workbook.
    fn sheet_index(&self) -> u32;

    /// Zero-based row.
    fn row_index(&self) -> i32;

    /// Zero-based column.
    fn column_index(&self) -> u32;

    /// Current content of the cell.
    fn content(&self) -> CellContent;

    /// Location key of the cell. Fails if a component does not fit its lane.
    fn location(&self) -> Result<LocationKey> {
        LocationKey::new(
            self.book_index(),
            self.sheet_index(),
            self.row_index(),
            self.column_index(),
        )
    }
}
