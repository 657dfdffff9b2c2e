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

use ahash::RandomState;
use hashbrown::HashMap;

use crate::location::{BookSheetKey, LocationKey};

/// A run of consecutive blank cells in one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RowSpan {
    row: i32,
    first_column: u32,
    last_column: u32,
}

impl RowSpan {
    fn contains(&self, row: i32, column: u32) -> bool {
        self.row == row && self.first_column <= column && column <= self.last_column
    }
}

/// Row spans of identical width stacked over consecutive rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rectangle {
    first_row: i32,
    last_row: i32,
    first_column: u32,
    last_column: u32,
}

impl Rectangle {
    fn from_span(span: RowSpan) -> Self {
        Self {
            first_row: span.row,
            last_row: span.row,
            first_column: span.first_column,
            last_column: span.last_column,
        }
    }

    /// Grow by one row if the span sits right below with the same columns.
    fn accept(&mut self, span: RowSpan) -> bool {
        if span.first_column != self.first_column || span.last_column != self.last_column {
            return false;
        }
        if Some(span.row) != self.last_row.checked_add(1) {
            return false;
        }
        self.last_row = span.row;
        true
    }

    fn contains(&self, row: i32, column: u32) -> bool {
        self.first_row <= row && row <= self.last_row && self.first_column <= column && column <= self.last_column
    }
}

#[derive(Debug, Clone, Default)]
struct SheetBlanks {
    rectangles: Vec<Rectangle>,
    current: Option<Rectangle>,
    span: Option<RowSpan>,
}

impl SheetBlanks {
    fn add(&mut self, row: i32, column: u32) {
        let Some(span) = self.span.as_mut() else {
            self.span = Some(RowSpan {
                row,
                first_column: column,
                last_column: column,
            });
            return;
        };
        if span.row == row && span.last_column.checked_add(1) == Some(column) {
            span.last_column = column;
            return;
        }

        let finished = *span;
        match self.current.as_mut() {
            Some(rectangle) => {
                if !rectangle.accept(finished) {
                    self.rectangles.push(*rectangle);
                    self.current = Some(Rectangle::from_span(finished));
                }
            }
            None => self.current = Some(Rectangle::from_span(finished)),
        }
        self.span = Some(RowSpan {
            row,
            first_column: column,
            last_column: column,
        });
    }

    fn contains(&self, row: i32, column: u32) -> bool {
        self.span.is_some_and(|s| s.contains(row, column))
            || self.current.is_some_and(|r| r.contains(row, column))
            || self.rectangles.iter().any(|r| r.contains(row, column))
    }
}

/// Blank cells a formula read during its last evaluation.
///
/// Blank cells get no plain value entry, so a formula cannot hold a dependency edge to them. Instead the formula
/// remembers which blank positions it read and goes stale once one of them receives a value. Cells are usually
/// read in range order, so they are folded into row spans and then rectangles as they are added.
#[derive(Debug, Clone, Default)]
pub struct UsedBlankCells {
    sheets: HashMap<BookSheetKey, SheetBlanks, RandomState>,
}

impl UsedBlankCells {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the blank cell at `location` was read.
    pub fn add(&mut self, location: &LocationKey) {
        self.sheets
            .entry(location.book_sheet())
            .or_default()
            .add(location.row_index(), location.column_index());
    }

    /// Whether the blank cell at `location` was read.
    pub fn contains(&self, location: &LocationKey) -> bool {
        self.sheets
            .get(&location.book_sheet())
            .is_some_and(|sheet| sheet.contains(location.row_index(), location.column_index()))
    }

    /// Whether any blank cell of the sheet was read.
    pub fn touches_sheet(&self, sheet: &BookSheetKey) -> bool {
        self.sheets.contains_key(sheet)
    }

    /// Whether any blank cell of the workbook was read.
    pub fn touches_book(&self, book: u32) -> bool {
        self.sheets.keys().any(|key| key.book_index() == book)
    }

    /// Whether no blank cell was read.
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}
