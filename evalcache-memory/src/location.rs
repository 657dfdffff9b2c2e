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
    fmt::{Debug, Display},
    hash::{Hash, Hasher},
};

use evalcache_common::error::{Error, Result};

const LANE_MASK: u64 = 0xFFFF;
const BOOK_SHIFT: u32 = 48;
const SHEET_SHIFT: u32 = 32;
/// Bits 16..32 of a packed value. They never carry a component.
const GAP_MASK: u64 = 0xFFFF_0000;

fn check_lane(field: &'static str, value: u32) -> Result<u64> {
    if value as u64 > LANE_MASK {
        return Err(Error::out_of_range(field, value, LANE_MASK));
    }
    Ok(value as u64)
}

/// Position of a literal cell across all linked workbooks.
///
/// Book, sheet and column are packed into one `u64` as `(book << 48) | (sheet << 32) | column`; the row is kept
/// apart as it is the component that varies most within a scan.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocationKey {
    book_sheet_column: u64,
    row: i32,
}

impl LocationKey {
    /// Largest book, sheet or column index a key can hold.
    pub const MAX_LANE_INDEX: u32 = LANE_MASK as u32;

    /// Build a key, failing with [`evalcache_common::error::ErrorKind::OutOfRange`] if book, sheet or column does
    /// not fit in 16 bits.
    pub fn new(book: u32, sheet: u32, row: i32, column: u32) -> Result<Self> {
        Ok(Self {
            book_sheet_column: Self::pack(book, sheet, column)?,
            row,
        })
    }

    /// Pack book, sheet and column indices into one value.
    pub fn pack(book: u32, sheet: u32, column: u32) -> Result<u64> {
        let book = check_lane("book", book)?;
        let sheet = check_lane("sheet", sheet)?;
        let column = check_lane("column", column)?;
        Ok((book << BOOK_SHIFT) | (sheet << SHEET_SHIFT) | column)
    }

    /// Pack book, sheet and column indices, masking each to its lane.
    ///
    /// Out-of-lane indices alias other cells. Only use it with indices already known to fit.
    pub fn pack_truncating(book: u32, sheet: u32, column: u32) -> u64 {
        ((book as u64 & LANE_MASK) << BOOK_SHIFT) | ((sheet as u64 & LANE_MASK) << SHEET_SHIFT) | (column as u64 & LANE_MASK)
    }

    /// Rebuild a key from a packed value and a row.
    ///
    /// Fails if the packed value carries bits outside the three lanes.
    pub fn from_packed(book_sheet_column: u64, row: i32) -> Result<Self> {
        if book_sheet_column & GAP_MASK != 0 {
            return Err(Error::out_of_range("packed", format!("{book_sheet_column:#018x}"), "3 16-bit lanes"));
        }
        Ok(Self { book_sheet_column, row })
    }

    /// Packed book, sheet and column.
    pub fn packed(&self) -> u64 {
        self.book_sheet_column
    }

    /// Workbook index.
    pub fn book_index(&self) -> u32 {
        ((self.book_sheet_column >> BOOK_SHIFT) & LANE_MASK) as u32
    }

    /// Sheet index within the workbook.
    pub fn sheet_index(&self) -> u32 {
        ((self.book_sheet_column >> SHEET_SHIFT) & LANE_MASK) as u32
    }

    /// Column index.
    pub fn column_index(&self) -> u32 {
        (self.book_sheet_column & LANE_MASK) as u32
    }

    /// Row index.
    pub fn row_index(&self) -> i32 {
        self.row
    }

    /// Book and sheet of the key.
    pub fn book_sheet(&self) -> BookSheetKey {
        BookSheetKey {
            book: self.book_index() as u16,
            sheet: self.sheet_index() as u16,
        }
    }

    /// Same book and sheet, another row and column.
    pub fn with_position(&self, row: i32, column: u32) -> Result<Self> {
        Self::new(self.book_index(), self.sheet_index(), row, column)
    }
}

impl Hash for LocationKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let folded = (self.book_sheet_column ^ (self.book_sheet_column >> 32)) as u32 as i32;
        state.write_i32(folded.wrapping_add(self.row.wrapping_mul(17)));
    }
}

impl Debug for LocationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationKey")
            .field("book", &self.book_index())
            .field("sheet", &self.sheet_index())
            .field("row", &self.row)
            .field("column", &self.column_index())
            .finish()
    }
}

impl Display for LocationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}]{}!R{}C{}",
            self.book_index(),
            self.sheet_index(),
            self.row,
            self.column_index()
        )
    }
}

/// A sheet within a workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BookSheetKey {
    book: u16,
    sheet: u16,
}

impl BookSheetKey {
    /// Build a key, failing if either index does not fit in 16 bits.
    pub fn new(book: u32, sheet: u32) -> Result<Self> {
        Ok(Self {
            book: check_lane("book", book)? as u16,
            sheet: check_lane("sheet", sheet)? as u16,
        })
    }

    /// Workbook index.
    pub fn book_index(&self) -> u32 {
        self.book as u32
    }

    /// Sheet index within the workbook.
    pub fn sheet_index(&self) -> u32 {
        self.sheet as u32
    }
}
