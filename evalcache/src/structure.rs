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

//! Row, column, sheet and workbook edits.

use evalcache_memory::{BookSheetKey, EntryId, Error, Event, LocationKey, Result, UsedBlankCells};
use itertools::Itertools;

use crate::cache::EvaluationCache;

/// A band of rows or columns inserted into or deleted from one sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shift {
    InsertRows { at: i32, count: i32 },
    DeleteRows { first: i32, count: i32 },
    InsertColumns { at: u32, count: u32 },
    DeleteColumns { first: u32, count: u32 },
}

impl Shift {
    fn is_empty(&self) -> bool {
        match *self {
            Shift::InsertRows { count, .. } | Shift::DeleteRows { count, .. } => count == 0,
            Shift::InsertColumns { count, .. } | Shift::DeleteColumns { count, .. } => count == 0,
        }
    }

    /// Where the cell at `key` ends up. `None` if it was deleted or pushed past the last column.
    fn apply(&self, key: &LocationKey) -> Option<LocationKey> {
        let (row, column) = (key.row_index(), key.column_index());
        match *self {
            Shift::InsertRows { at, count } if row >= at => key.with_position(row.checked_add(count)?, column).ok(),
            Shift::DeleteRows { first, count } if row >= first => {
                if row < first.saturating_add(count) {
                    return None;
                }
                key.with_position(row - count, column).ok()
            }
            Shift::InsertColumns { at, count } if column >= at => {
                key.with_position(row, column.checked_add(count)?).ok()
            }
            Shift::DeleteColumns { first, count } if column >= first => {
                if column < first.saturating_add(count) {
                    return None;
                }
                key.with_position(row, column - count).ok()
            }
            _ => Some(*key),
        }
    }
}

/// Cells removed all at once.
#[derive(Debug, Clone, Copy)]
enum Region {
    Sheet(BookSheetKey),
    Book(u32),
}

impl Region {
    fn contains(&self, key: &LocationKey) -> bool {
        match *self {
            Region::Sheet(sheet) => key.book_sheet() == sheet,
            Region::Book(book) => key.book_index() == book,
        }
    }

    fn touched_by(&self, blanks: &UsedBlankCells) -> bool {
        match *self {
            Region::Sheet(sheet) => blanks.touches_sheet(&sheet),
            Region::Book(book) => blanks.touches_book(book),
        }
    }
}

fn row_count(count: u32) -> Result<i32> {
    i32::try_from(count)
        .map_err(|_| Error::invalid_argument("row count exceeds the row range").with_context("count", count))
}

fn first_row(row: i32) -> Result<i32> {
    if row < 0 {
        return Err(Error::invalid_argument("row index must not be negative").with_context("row", row));
    }
    Ok(row)
}

impl EvaluationCache {
    /// Handle `count` rows inserted before `row` on a sheet.
    ///
    /// Literal entries below move down and keep their handles. Formulas that read blank cells of the sheet go
    /// stale, since the blank positions they read have moved.
    pub fn notify_rows_inserted(&mut self, book: u32, sheet: u32, row: i32, count: u32) -> Result<Vec<EntryId>> {
        let shift = Shift::InsertRows {
            at: first_row(row)?,
            count: row_count(count)?,
        };
        self.shift(book, sheet, shift)
    }

    /// Handle `count` rows deleted from `row` on a sheet.
    ///
    /// Entries of the deleted rows are removed and their consumers go stale. Entries below move up.
    pub fn notify_rows_deleted(&mut self, book: u32, sheet: u32, row: i32, count: u32) -> Result<Vec<EntryId>> {
        let shift = Shift::DeleteRows {
            first: first_row(row)?,
            count: row_count(count)?,
        };
        self.shift(book, sheet, shift)
    }

    /// Handle `count` columns inserted before `column` on a sheet.
    ///
    /// Entries pushed past the last addressable column are removed.
    pub fn notify_columns_inserted(
        &mut self,
        book: u32,
        sheet: u32,
        column: u32,
        count: u32,
    ) -> Result<Vec<EntryId>> {
        self.shift(book, sheet, Shift::InsertColumns { at: column, count })
    }

    /// Handle `count` columns deleted from `column` on a sheet.
    pub fn notify_columns_deleted(
        &mut self,
        book: u32,
        sheet: u32,
        column: u32,
        count: u32,
    ) -> Result<Vec<EntryId>> {
        self.shift(book, sheet, Shift::DeleteColumns { first: column, count })
    }

    /// Handle the removal of a sheet. Every entry of the sheet is removed and its consumers go stale.
    ///
    /// Indices of the remaining sheets are left as they are.
    pub fn notify_sheet_removed(&mut self, book: u32, sheet: u32) -> Result<Vec<EntryId>> {
        let sheet = BookSheetKey::new(book, sheet)?;
        Ok(self.remove_region(Region::Sheet(sheet)))
    }

    /// Handle the removal of a workbook from the linked set.
    pub fn notify_workbook_removed(&mut self, book: u32) -> Result<Vec<EntryId>> {
        let book = BookSheetKey::new(book, 0)?.book_index();
        Ok(self.remove_region(Region::Book(book)))
    }

    fn shift(&mut self, book: u32, sheet: u32, shift: Shift) -> Result<Vec<EntryId>> {
        let sheet = BookSheetKey::new(book, sheet)?;
        if shift.is_empty() {
            return Ok(vec![]);
        }
        tracing::debug!("[evaluation cache]: {} {shift:?} on {sheet:?}", self.name());

        let removed = self.plain.relocate(sheet, |key| shift.apply(key));

        // Formula entries are keyed by identity, only their location hint moves.
        let mut deleted = vec![];
        let mut blank_readers = vec![];
        self.formula.apply_to_all(|id, entry| {
            if entry.used_blanks().touches_sheet(&sheet) {
                blank_readers.push(id);
            }
            let Some(location) = entry.location().copied() else {
                return;
            };
            if location.book_sheet() != sheet {
                return;
            }
            match shift.apply(&location) {
                Some(to) => entry.set_location(Some(to)),
                None => deleted.push((id, entry.identity())),
            }
        });
        let mut stale = vec![];
        for (id, identity) in deleted {
            if let Some(entry) = self.formula.remove(identity) {
                stale.extend(self.retire_formula(id, entry, None, Event::Structure));
            }
        }
        for (id, entry) in removed {
            stale.extend(self.retire_plain(id, entry, None, Event::Structure));
        }
        stale.extend(self.invalidate(blank_readers, Event::Structure));
        stale.retain(|id| self.formula.entry(*id).is_some());
        Ok(stale)
    }

    fn remove_region(&mut self, region: Region) -> Vec<EntryId> {
        tracing::debug!("[evaluation cache]: {} remove {region:?}", self.name());

        let mut stale = vec![];
        let doomed = self
            .formula
            .iter()
            .filter(|(_, entry)| entry.location().is_some_and(|location| region.contains(location)))
            .map(|(id, entry)| (id, entry.identity()))
            .collect_vec();
        for (id, identity) in doomed {
            if let Some(entry) = self.formula.remove(identity) {
                stale.extend(self.retire_formula(id, entry, None, Event::Structure));
            }
        }
        for (id, entry) in self.plain.remove_where(|key| region.contains(key)) {
            stale.extend(self.retire_plain(id, entry, None, Event::Structure));
        }

        let blank_readers = self
            .formula
            .iter()
            .filter(|(_, entry)| region.touched_by(entry.used_blanks()))
            .map(|(id, _)| id)
            .collect_vec();
        stale.extend(self.invalidate(blank_readers, Event::Structure));
        stale.retain(|id| self.formula.entry(*id).is_some());
        stale
    }
}
