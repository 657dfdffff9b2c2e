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

/// Why an entry left the cache or stopped being trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// The entry was replaced by a fresh one after its cell changed.
    Replace,
    /// The entry was removed because its cell was deleted or changed kind.
    Remove,
    /// The whole cache was cleared.
    Clear,
    /// An entry the formula read has changed or disappeared.
    Upstream,
    /// A blank cell the formula read now holds a value.
    ChangeFromBlank,
    /// Rows, columns, a sheet or a workbook were inserted or removed.
    Structure,
}

impl Event {
    /// Convert self into static str.
    pub fn into_static(self) -> &'static str {
        match self {
            Event::Replace => "replace",
            Event::Remove => "remove",
            Event::Clear => "clear",
            Event::Upstream => "upstream",
            Event::ChangeFromBlank => "change from blank",
            Event::Structure => "structure",
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.into_static())
    }
}
