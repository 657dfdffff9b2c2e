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

use std::{fmt::Display, sync::Arc};

/// Spreadsheet error values a cell can evaluate to.
///
/// The discriminants are the codes used by the binary workbook format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorCode {
    /// `#NULL!`, intersection of two disjoint areas.
    Null,
    /// `#DIV/0!`
    Div0,
    /// `#VALUE!`, wrong operand type.
    Value,
    /// `#REF!`, reference to a deleted or invalid cell.
    Ref,
    /// `#NAME?`, unknown function or name.
    Name,
    /// `#NUM!`
    Num,
    /// `#N/A`
    NA,
    /// Circular reference detected during evaluation.
    Circular,
}

impl ErrorCode {
    /// Numeric code of the error.
    pub fn code(self) -> i32 {
        match self {
            ErrorCode::Null => 0x00,
            ErrorCode::Div0 => 0x07,
            ErrorCode::Value => 0x0F,
            ErrorCode::Ref => 0x17,
            ErrorCode::Name => 0x1D,
            ErrorCode::Num => 0x24,
            ErrorCode::NA => 0x2A,
            ErrorCode::Circular => -60,
        }
    }

    /// Text shown in a cell holding the error.
    pub fn text(self) -> &'static str {
        match self {
            ErrorCode::Null => "#NULL!",
            ErrorCode::Div0 => "#DIV/0!",
            ErrorCode::Value => "#VALUE!",
            ErrorCode::Ref => "#REF!",
            ErrorCode::Name => "#NAME?",
            ErrorCode::Num => "#NUM!",
            ErrorCode::NA => "#N/A",
            ErrorCode::Circular => "~CIRCULAR~REF~",
        }
    }

    /// Map a numeric code back to the error, `None` for unknown codes.
    pub fn from_code(code: i32) -> Option<Self> {
        let error = match code {
            0x00 => ErrorCode::Null,
            0x07 => ErrorCode::Div0,
            0x0F => ErrorCode::Value,
            0x17 => ErrorCode::Ref,
            0x1D => ErrorCode::Name,
            0x24 => ErrorCode::Num,
            0x2A => ErrorCode::NA,
            -60 => ErrorCode::Circular,
            _ => return None,
        };
        Some(error)
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

/// A computed or literal cell value.
///
/// Error values are legitimate payloads: a cell evaluating to `#DIV/0!` is cached like any other result.
///
/// Two `NaN` numbers compare equal, so re-entering the same value is never reported as a change.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellValue {
    /// Empty cell.
    #[default]
    Blank,
    /// Numeric value. Dates are numbers too.
    Number(f64),
    /// Text value.
    Text(Arc<str>),
    /// Boolean value.
    Boolean(bool),
    /// Error value.
    Error(ErrorCode),
}

impl CellValue {
    /// Create a text value.
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        CellValue::Text(text.into())
    }

    /// Whether the value is [`CellValue::Blank`].
    pub fn is_blank(&self) -> bool {
        matches!(self, CellValue::Blank)
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Blank, CellValue::Blank) => true,
            (CellValue::Number(a), CellValue::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (CellValue::Text(a), CellValue::Text(b)) => a == b,
            (CellValue::Boolean(a), CellValue::Boolean(b)) => a == b,
            (CellValue::Error(a), CellValue::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Number(v)
    }
}

impl From<bool> for CellValue {
    fn from(v: bool) -> Self {
        CellValue::Boolean(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::text(v)
    }
}

impl From<ErrorCode> for CellValue {
    fn from(v: ErrorCode) -> Self {
        CellValue::Error(v)
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Blank => Ok(()),
            CellValue::Number(v) => write!(f, "{v}"),
            CellValue::Text(v) => f.write_str(v),
            CellValue::Boolean(true) => f.write_str("TRUE"),
            CellValue::Boolean(false) => f.write_str("FALSE"),
            CellValue::Error(e) => write!(f, "{e}"),
        }
    }
}
