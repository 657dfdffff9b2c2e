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

use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counters of one evaluation session.
///
/// Counters are relaxed atomics so that lookups through `&self` can count hits and misses.
#[derive(Debug, Default)]
pub struct Metrics {
    /// plain value lookups that found an entry
    pub plain_hit: AtomicU64,
    /// plain value lookups that found nothing
    pub plain_miss: AtomicU64,
    /// plain entries inserted without replacing another
    pub plain_insert: AtomicU64,
    /// plain entries replaced by a new one
    pub plain_replace: AtomicU64,
    /// plain entries removed
    pub plain_remove: AtomicU64,

    /// formula lookups that found a fresh entry
    pub formula_hit: AtomicU64,
    /// formula lookups that found nothing or a stale entry
    pub formula_miss: AtomicU64,
    /// formula entries inserted without replacing another
    pub formula_insert: AtomicU64,
    /// formula entries replaced by a new one
    pub formula_replace: AtomicU64,
    /// formula entries removed
    pub formula_remove: AtomicU64,

    /// dependency edges recorded
    pub edge_record: AtomicU64,
    /// formula entries marked stale
    pub invalidate: AtomicU64,
    /// whole-cache clears
    pub clear: AtomicU64,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// see [`Metrics::plain_hit`]
    pub plain_hit: u64,
    /// see [`Metrics::plain_miss`]
    pub plain_miss: u64,
    /// see [`Metrics::plain_insert`]
    pub plain_insert: u64,
    /// see [`Metrics::plain_replace`]
    pub plain_replace: u64,
    /// see [`Metrics::plain_remove`]
    pub plain_remove: u64,
    /// see [`Metrics::formula_hit`]
    pub formula_hit: u64,
    /// see [`Metrics::formula_miss`]
    pub formula_miss: u64,
    /// see [`Metrics::formula_insert`]
    pub formula_insert: u64,
    /// see [`Metrics::formula_replace`]
    pub formula_replace: u64,
    /// see [`Metrics::formula_remove`]
    pub formula_remove: u64,
    /// see [`Metrics::edge_record`]
    pub edge_record: u64,
    /// see [`Metrics::invalidate`]
    pub invalidate: u64,
    /// see [`Metrics::clear`]
    pub clear: u64,
}

impl Metrics {
    /// Increase a counter by one.
    pub fn inc(counter: &AtomicU64) {
        Self::add(counter, 1);
    }

    /// Increase a counter by `val`.
    pub fn add(counter: &AtomicU64, val: u64) {
        counter.fetch_add(val, Ordering::Relaxed);
    }

    /// Copy all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            plain_hit: load(&self.plain_hit),
            plain_miss: load(&self.plain_miss),
            plain_insert: load(&self.plain_insert),
            plain_replace: load(&self.plain_replace),
            plain_remove: load(&self.plain_remove),
            formula_hit: load(&self.formula_hit),
            formula_miss: load(&self.formula_miss),
            formula_insert: load(&self.formula_insert),
            formula_replace: load(&self.formula_replace),
            formula_remove: load(&self.formula_remove),
            edge_record: load(&self.edge_record),
            invalidate: load(&self.invalidate),
            clear: load(&self.clear),
        }
    }
}
