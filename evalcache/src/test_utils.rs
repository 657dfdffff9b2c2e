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

pub use evalcache_memory::test_utils::*;
use evalcache_memory::{CellIdentity, CellValue, IdentityAllocator};

use crate::cell::{CellContent, EvaluationCell};

/// A workbook cell for tests.
#[derive(Debug, Clone, PartialEq)]
pub struct TestCell {
    /// Identity of the cell.
    pub identity: CellIdentity,
    /// Workbook index.
    pub book: u32,
    /// Sheet index.
    pub sheet: u32,
    /// Row index.
    pub row: i32,
    /// Column index.
    pub column: u32,
    /// Content of the cell.
    pub content: CellContent,
}

impl TestCell {
    /// A new blank cell at the given position of book 0, sheet 0.
    pub fn new(allocator: &IdentityAllocator, row: i32, column: u32) -> Self {
        Self {
            identity: allocator.allocate(),
            book: 0,
            sheet: 0,
            row,
            column,
            content: CellContent::Value(CellValue::Blank),
        }
    }

    /// Move the cell to another book and sheet.
    pub fn on(mut self, book: u32, sheet: u32) -> Self {
        self.book = book;
        self.sheet = sheet;
        self
    }

    /// Set a literal value.
    pub fn with_value(mut self, value: impl Into<CellValue>) -> Self {
        self.content = CellContent::Value(value.into());
        self
    }

    /// Turn the cell into a formula cell.
    pub fn with_formula(mut self) -> Self {
        self.content = CellContent::Formula;
        self
    }

    /// Current literal value, blank for formula cells.
    pub fn value(&self) -> CellValue {
        match &self.content {
            CellContent::Value(value) => value.clone(),
            CellContent::Formula => CellValue::Blank,
        }
    }
}

impl EvaluationCell for TestCell {
    fn identity(&self) -> CellIdentity {
        self.identity
    }

    fn book_index(&self) -> u32 {
        self.book
    }

    fn sheet_index(&self) -> u32 {
        self.sheet
    }

    fn row_index(&self) -> i32 {
        self.row
    }

    fn column_index(&self) -> u32 {
        self.column
    }

    fn content(&self) -> CellContent {
        self.content.clone()
    }
}
