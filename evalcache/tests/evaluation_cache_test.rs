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

use std::{collections::BTreeSet, sync::Arc};

use evalcache::{
    prelude::*,
    test_utils::{Record, RecordingListener, TestCell},
};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

fn cache_with_listener(policy: StalePolicy) -> (EvaluationCache, RecordingListener) {
    let listener = RecordingListener::default();
    let cache = EvaluationCacheBuilder::new()
        .with_name("test")
        .with_stale_policy(policy)
        .with_event_listener(Arc::new(listener.clone()))
        .build()
        .unwrap();
    (cache, listener)
}

/// Evaluate `cell` as the sum of `inputs`, reading them through the cache the way an evaluator does.
///
/// Returns the entry of the formula and the formulas that went stale because its value changed.
fn evaluate_sum(cache: &mut EvaluationCache, cell: &TestCell, inputs: &[&TestCell]) -> (EntryId, Vec<EntryId>) {
    let id = cache.get_or_create_formula_entry(cell).unwrap();
    let mut refs = vec![];
    let mut blanks = UsedBlankCells::new();
    let mut sum = 0.0;
    for input in inputs {
        match input.content() {
            CellContent::Formula => {
                let input_id = cache.get_or_create_formula_entry(*input).unwrap();
                if let Some(CellValue::Number(n)) = cache.formula_result(input_id).and_then(|r| r.last_known()) {
                    sum += *n;
                }
                refs.push(EntryRef::Formula(input_id));
            }
            CellContent::Value(CellValue::Blank) => blanks.add(&input.location().unwrap()),
            CellContent::Value(value) => {
                if let CellValue::Number(n) = value {
                    sum += n;
                }
                refs.push(cache.plain_value_entry(input.location().unwrap(), value).unwrap());
            }
        }
    }
    let stale = cache
        .record_evaluation(id, CellValue::from(sum), &refs, blanks)
        .unwrap();
    (id, stale)
}

fn fresh_value(cache: &EvaluationCache, id: EntryId) -> Option<CellValue> {
    cache.formula_result(id).and_then(|r| r.fresh()).cloned()
}

fn set<I: IntoIterator<Item = EntryId>>(ids: I) -> BTreeSet<EntryId> {
    ids.into_iter().collect()
}

#[test_log::test]
fn test_edit_invalidates_direct_consumer() {
    let (mut cache, listener) = cache_with_listener(StalePolicy::Retain);
    let allocator = IdentityAllocator::default();
    let mut a1 = TestCell::new(&allocator, 0, 0).with_value(5.0);
    let b1 = TestCell::new(&allocator, 0, 1).with_formula();

    let (b1_id, _) = evaluate_sum(&mut cache, &b1, &[&a1]);
    assert_eq!(fresh_value(&cache, b1_id), Some(CellValue::from(5.0)));
    assert_eq!(cache.lookup_formula(&b1), Some(CachedResult::Fresh(&CellValue::from(5.0))));

    a1 = a1.with_value(10.0);
    let stale = cache.notify_update_cell(&a1).unwrap();
    assert_eq!(stale, vec![b1_id]);
    assert_eq!(cache.formula_result(b1_id), Some(CachedResult::Stale(&CellValue::from(5.0))));
    assert_eq!(listener.stale(), vec![b1_id]);

    let (again, _) = evaluate_sum(&mut cache, &b1, &[&a1]);
    assert_eq!(again, b1_id);
    assert_eq!(fresh_value(&cache, b1_id), Some(CellValue::from(10.0)));
    assert!(cache.stale_formulas().is_empty());
}

#[test]
fn test_same_value_edit_is_silent() {
    let (mut cache, _) = cache_with_listener(StalePolicy::Retain);
    let allocator = IdentityAllocator::default();
    let a1 = TestCell::new(&allocator, 0, 0).with_value("north");
    let b1 = TestCell::new(&allocator, 0, 1).with_formula();
    let (b1_id, _) = evaluate_sum(&mut cache, &b1, &[&a1]);

    assert!(cache.notify_update_cell(&a1).unwrap().is_empty());
    assert!(cache.formula_result(b1_id).unwrap().is_fresh());
}

#[test]
fn test_same_nan_edit_is_silent() {
    let (mut cache, _) = cache_with_listener(StalePolicy::Retain);
    let allocator = IdentityAllocator::default();
    let a1 = TestCell::new(&allocator, 0, 0).with_value(f64::NAN);
    let b1 = TestCell::new(&allocator, 0, 1).with_formula();
    let (b1_id, _) = evaluate_sum(&mut cache, &b1, &[&a1]);

    assert!(cache.notify_update_cell(&a1).unwrap().is_empty());
    assert!(cache.formula_result(b1_id).unwrap().is_fresh());
}

#[test]
fn test_reevaluation_replaces_inputs() {
    let (mut cache, _) = cache_with_listener(StalePolicy::Retain);
    let allocator = IdentityAllocator::default();
    let mut a1 = TestCell::new(&allocator, 0, 0).with_value(1.0);
    let mut a2 = TestCell::new(&allocator, 1, 0).with_value(2.0);
    let b1 = TestCell::new(&allocator, 0, 1).with_formula();

    let (b1_id, _) = evaluate_sum(&mut cache, &b1, &[&a1]);
    let (again, _) = evaluate_sum(&mut cache, &b1, &[&a2]);
    assert_eq!(again, b1_id);
    assert_eq!(fresh_value(&cache, b1_id), Some(CellValue::from(2.0)));

    a1 = a1.with_value(3.0);
    assert!(cache.notify_update_cell(&a1).unwrap().is_empty());
    assert!(cache.formula_result(b1_id).unwrap().is_fresh());

    a2 = a2.with_value(4.0);
    assert_eq!(cache.notify_update_cell(&a2).unwrap(), vec![b1_id]);
}

#[test]
fn test_transitive_invalidation() {
    let (mut cache, _) = cache_with_listener(StalePolicy::Retain);
    let allocator = IdentityAllocator::default();
    let mut a1 = TestCell::new(&allocator, 0, 0).with_value(1.0);
    let b1 = TestCell::new(&allocator, 0, 1).with_formula();
    let c1 = TestCell::new(&allocator, 0, 2).with_formula();
    let d1 = TestCell::new(&allocator, 0, 3).with_formula();
    let e1 = TestCell::new(&allocator, 0, 4).with_value(7.0);
    let f1 = TestCell::new(&allocator, 0, 5).with_formula();

    let (b1_id, _) = evaluate_sum(&mut cache, &b1, &[&a1]);
    let (c1_id, _) = evaluate_sum(&mut cache, &c1, &[&b1]);
    let (d1_id, _) = evaluate_sum(&mut cache, &d1, &[&c1, &b1]);
    let (f1_id, _) = evaluate_sum(&mut cache, &f1, &[&e1]);
    assert_eq!(fresh_value(&cache, d1_id), Some(CellValue::from(2.0)));

    a1 = a1.with_value(2.0);
    let stale = cache.notify_update_cell(&a1).unwrap();
    // Each entry is reported once even though D1 is reachable twice.
    assert_eq!(stale.len(), 3);
    assert_eq!(set(stale), set([b1_id, c1_id, d1_id]));
    assert!(cache.formula_result(f1_id).unwrap().is_fresh());
    assert_eq!(cache.metrics().snapshot().invalidate, 3);
}

#[test]
fn test_cyclic_invalidation_terminates() {
    let (mut cache, _) = cache_with_listener(StalePolicy::Retain);
    let allocator = IdentityAllocator::default();
    let a1 = TestCell::new(&allocator, 0, 0).with_value(1.0);
    let b1 = TestCell::new(&allocator, 0, 1).with_formula();
    let c1 = TestCell::new(&allocator, 0, 2).with_formula();

    let b1_id = cache.get_or_create_formula_entry(&b1).unwrap();
    let c1_id = cache.get_or_create_formula_entry(&c1).unwrap();
    let input = cache.plain_value_entry(a1.location().unwrap(), a1.value()).unwrap();

    let circular = CellValue::from(ErrorCode::Circular);
    let b1_inputs = [input, EntryRef::Formula(c1_id)];
    let c1_inputs = [EntryRef::Formula(b1_id)];
    cache
        .record_evaluation(b1_id, circular.clone(), &b1_inputs, UsedBlankCells::new())
        .unwrap();
    // C1 gets a value, so B1 which read it goes stale, and C1 behind it.
    let stale = cache
        .record_evaluation(c1_id, circular.clone(), &c1_inputs, UsedBlankCells::new())
        .unwrap();
    assert_eq!(set(stale), set([b1_id, c1_id]));

    // Recording unchanged values settles the cycle.
    for (id, inputs) in [(b1_id, &b1_inputs[..]), (c1_id, &c1_inputs[..])] {
        let stale = cache
            .record_evaluation(id, circular.clone(), inputs, UsedBlankCells::new())
            .unwrap();
        assert!(stale.is_empty());
    }
    assert!(cache.stale_formulas().is_empty());

    let stale = cache.notify_update_cell(&a1.clone().with_value(2.0)).unwrap();
    assert_eq!(set(stale), set([b1_id, c1_id]));
}

#[test]
fn test_blank_cell_gets_value() {
    let (mut cache, listener) = cache_with_listener(StalePolicy::Retain);
    let allocator = IdentityAllocator::default();
    let a1 = TestCell::new(&allocator, 0, 0);
    let a2 = TestCell::new(&allocator, 1, 0);
    let b1 = TestCell::new(&allocator, 0, 1).with_formula();
    let b2 = TestCell::new(&allocator, 1, 1).with_formula();

    let (b1_id, _) = evaluate_sum(&mut cache, &b1, &[&a1]);
    let (b2_id, _) = evaluate_sum(&mut cache, &b2, &[&a2]);
    assert_eq!(cache.plain_len(), 0);
    assert!(cache.formula_cache().entry(b1_id).unwrap().inputs().is_empty());

    let stale = cache.notify_update_cell(&a1.clone().with_value(3.0)).unwrap();
    assert_eq!(stale, vec![b1_id]);
    assert!(cache.formula_result(b2_id).unwrap().is_fresh());
    assert!(listener
        .records()
        .contains(&Record::ChangeFromBlank(a1.location().unwrap())));
    assert!(listener.records().contains(&Record::Stale(Event::ChangeFromBlank, b1_id)));
}

#[test]
fn test_delete_cell() {
    let (mut cache, listener) = cache_with_listener(StalePolicy::Retain);
    let allocator = IdentityAllocator::default();
    let a1 = TestCell::new(&allocator, 0, 0).with_value(5.0);
    let b1 = TestCell::new(&allocator, 0, 1).with_formula();
    let (b1_id, _) = evaluate_sum(&mut cache, &b1, &[&a1]);
    let a1_id = cache.plain_cache().lookup(&a1.location().unwrap()).unwrap();

    let stale = cache.notify_delete_cell(&a1).unwrap();
    assert_eq!(stale, vec![b1_id]);
    assert_eq!(cache.plain_len(), 0);
    assert!(cache.formula_cache().entry(b1_id).unwrap().inputs().is_empty());
    assert!(listener.records().contains(&Record::Leave(Event::Remove, EntryRef::Plain(a1_id))));

    // Deleting again, or deleting a cell never seen, is a no-op.
    assert!(cache.notify_delete_cell(&a1).unwrap().is_empty());
    let never_seen = TestCell::new(&allocator, 40, 40);
    assert!(cache.notify_delete_cell(&never_seen).unwrap().is_empty());
}

#[test]
fn test_literal_becomes_formula() {
    let (mut cache, _) = cache_with_listener(StalePolicy::Retain);
    let allocator = IdentityAllocator::default();
    let mut a1 = TestCell::new(&allocator, 0, 0).with_value(5.0);
    let b1 = TestCell::new(&allocator, 0, 1).with_formula();
    let (b1_id, _) = evaluate_sum(&mut cache, &b1, &[&a1]);

    a1 = a1.with_formula();
    let stale = cache.notify_update_cell(&a1).unwrap();
    assert_eq!(stale, vec![b1_id]);
    assert_eq!(cache.plain_len(), 0);

    // B1 now depends on the formula entry of A1.
    let a1_id = cache.formula_cache().lookup(a1.identity).unwrap();
    assert_eq!(cache.formula_result(a1_id), Some(CachedResult::Pending));
    assert_eq!(
        cache.formula_cache().entry(b1_id).unwrap().inputs(),
        &[EntryRef::Formula(a1_id)]
    );
    assert!(cache.formula_cache().entry(a1_id).unwrap().consumers().contains(&b1_id));

    // B1 is already stale, nothing new to report.
    let stale = cache
        .record_evaluation(a1_id, CellValue::from(42.0), &[], UsedBlankCells::new())
        .unwrap();
    assert!(stale.is_empty());

    evaluate_sum(&mut cache, &b1, &[&a1]);
    assert_eq!(fresh_value(&cache, b1_id), Some(CellValue::from(42.0)));

    let stale = cache
        .record_evaluation(a1_id, CellValue::from(50.0), &[], UsedBlankCells::new())
        .unwrap();
    assert_eq!(stale, vec![b1_id]);
}

#[test]
fn test_formula_becomes_literal() {
    let (mut cache, _) = cache_with_listener(StalePolicy::Retain);
    let allocator = IdentityAllocator::default();
    let a1 = TestCell::new(&allocator, 0, 0).with_value(5.0);
    let mut b1 = TestCell::new(&allocator, 0, 1).with_formula();
    let c1 = TestCell::new(&allocator, 0, 2).with_formula();
    let (b1_id, _) = evaluate_sum(&mut cache, &b1, &[&a1]);
    let (c1_id, _) = evaluate_sum(&mut cache, &c1, &[&b1]);

    b1 = b1.with_value(7.0);
    let stale = cache.notify_update_cell(&b1).unwrap();
    assert_eq!(stale, vec![c1_id]);
    assert_eq!(cache.formula_len(), 1);
    assert!(cache.formula_result(b1_id).is_none());

    let b1_plain = cache.plain_cache().lookup(&b1.location().unwrap()).unwrap();
    assert_eq!(
        cache.formula_cache().entry(c1_id).unwrap().inputs(),
        &[EntryRef::Plain(b1_plain)]
    );
    let a1_entry = cache.plain_cache().get(&a1.location().unwrap()).unwrap();
    assert!(a1_entry.consumers().is_empty());

    evaluate_sum(&mut cache, &c1, &[&b1]);
    assert_eq!(fresh_value(&cache, c1_id), Some(CellValue::from(7.0)));
}

#[test]
fn test_formula_replaced() {
    let (mut cache, listener) = cache_with_listener(StalePolicy::Retain);
    let allocator = IdentityAllocator::default();
    let a1 = TestCell::new(&allocator, 0, 0).with_value(5.0);
    let b1 = TestCell::new(&allocator, 0, 1).with_formula();
    let c1 = TestCell::new(&allocator, 0, 2).with_formula();
    let (b1_id, _) = evaluate_sum(&mut cache, &b1, &[&a1]);
    let (c1_id, _) = evaluate_sum(&mut cache, &c1, &[&b1]);

    let stale = cache.notify_update_cell(&b1).unwrap();
    assert_eq!(stale, vec![c1_id]);
    assert!(cache.formula_result(b1_id).is_none());
    assert!(listener
        .records()
        .contains(&Record::Leave(Event::Replace, EntryRef::Formula(b1_id))));

    let new_b1 = cache.formula_cache().lookup(b1.identity).unwrap();
    assert_ne!(new_b1, b1_id);
    assert_eq!(cache.formula_result(new_b1), Some(CachedResult::Pending));
    assert!(cache.formula_cache().entry(new_b1).unwrap().consumers().contains(&c1_id));
    // The old entry no longer consumes A1.
    let a1_entry = cache.plain_cache().get(&a1.location().unwrap()).unwrap();
    assert!(a1_entry.consumers().is_empty());
}

#[test]
fn test_record_with_dangling_input() {
    let (mut cache, _) = cache_with_listener(StalePolicy::Retain);
    let allocator = IdentityAllocator::default();
    let a1 = TestCell::new(&allocator, 0, 0).with_value(5.0);
    let b1 = TestCell::new(&allocator, 0, 1).with_formula();

    let b1_id = cache.get_or_create_formula_entry(&b1).unwrap();
    let input = cache.plain_value_entry(a1.location().unwrap(), a1.value()).unwrap();
    // A1 is deleted while B1 is being evaluated.
    cache.notify_delete_cell(&a1).unwrap();

    let stale = cache
        .record_evaluation(b1_id, CellValue::from(6.0), &[input], UsedBlankCells::new())
        .unwrap();
    assert!(stale.is_empty());
    assert_eq!(cache.formula_result(b1_id), Some(CachedResult::Stale(&CellValue::from(6.0))));
    assert!(cache.formula_cache().entry(b1_id).unwrap().inputs().is_empty());
    assert_eq!(cache.stale_formulas(), vec![b1_id]);
}

#[test]
fn test_invalid_operations() {
    let (mut cache, _) = cache_with_listener(StalePolicy::Retain);
    let allocator = IdentityAllocator::default();
    let b1 = TestCell::new(&allocator, 0, 1).with_formula();
    let b1_id = cache.get_or_create_formula_entry(&b1).unwrap();

    let err = cache
        .record_evaluation(
            b1_id,
            CellValue::from(1.0),
            &[EntryRef::Formula(b1_id)],
            UsedBlankCells::new(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let location = LocationKey::new(0, 0, 0, 0).unwrap();
    let err = cache.plain_value_entry(location, CellValue::Blank).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    cache.clear();
    let err = cache
        .record_evaluation(b1_id, CellValue::from(1.0), &[], UsedBlankCells::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let far = TestCell::new(&allocator, 0, 70_000).with_value(1.0);
    let err = cache.notify_update_cell(&far).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfRange);
    assert!(cache.is_empty());
}

#[test]
fn test_hits_are_reported() {
    let (mut cache, listener) = cache_with_listener(StalePolicy::Retain);
    let allocator = IdentityAllocator::default();
    let a1 = TestCell::new(&allocator, 0, 0).with_value(true);
    let b1 = TestCell::new(&allocator, 0, 1).with_formula();
    let location = a1.location().unwrap();

    let first = cache.plain_value_entry(location, a1.value()).unwrap();
    let second = cache.plain_value_entry(location, a1.value()).unwrap();
    assert_eq!(first, second);

    let (b1_id, _) = evaluate_sum(&mut cache, &b1, &[&a1]);
    assert!(cache.lookup_formula(&b1).unwrap().is_fresh());

    let records = listener.take();
    assert_eq!(records[0], Record::ReadPlainValue(location, CellValue::from(true)));
    assert!(records.contains(&Record::Hit(first, CellValue::from(true))));
    assert!(records.contains(&Record::Hit(EntryRef::Formula(b1_id), CellValue::from(0.0))));

    let metrics = cache.metrics().snapshot();
    assert_eq!(metrics.plain_insert, 1);
    assert_eq!(metrics.formula_hit, 1);
    assert_eq!(metrics.edge_record, 1);
}

#[test]
fn test_changed_value_on_read_replaces_entry() {
    let (mut cache, _) = cache_with_listener(StalePolicy::Retain);
    let allocator = IdentityAllocator::default();
    let a1 = TestCell::new(&allocator, 0, 0).with_value(1.0);
    let b1 = TestCell::new(&allocator, 0, 1).with_formula();
    let (b1_id, _) = evaluate_sum(&mut cache, &b1, &[&a1]);
    let old = cache.plain_cache().lookup(&a1.location().unwrap()).unwrap();

    let new = cache
        .plain_value_entry(a1.location().unwrap(), CellValue::from(2.0))
        .unwrap();
    assert_ne!(new, EntryRef::Plain(old));
    assert!(!cache.formula_result(b1_id).unwrap().is_fresh());
    assert_eq!(cache.formula_cache().entry(b1_id).unwrap().inputs(), &[new]);
}

#[test]
fn test_rows_inserted_keep_handles() {
    let (mut cache, _) = cache_with_listener(StalePolicy::Retain);
    let allocator = IdentityAllocator::default();
    let a3 = TestCell::new(&allocator, 2, 0).with_value(3.0);
    let b1 = TestCell::new(&allocator, 0, 1).with_formula();
    let c3 = TestCell::new(&allocator, 2, 2).with_formula();
    let (b1_id, _) = evaluate_sum(&mut cache, &b1, &[&a3]);
    let (c3_id, _) = evaluate_sum(&mut cache, &c3, &[&b1]);
    let a3_id = cache.plain_cache().lookup(&a3.location().unwrap()).unwrap();

    let stale = cache.notify_rows_inserted(0, 0, 1, 2).unwrap();
    assert!(stale.is_empty());

    let moved = LocationKey::new(0, 0, 4, 0).unwrap();
    assert_eq!(cache.plain_cache().lookup(&moved), Some(a3_id));
    assert!(cache.plain_cache().lookup(&a3.location().unwrap()).is_none());
    assert_eq!(
        cache.formula_cache().entry(c3_id).unwrap().location(),
        Some(&LocationKey::new(0, 0, 4, 2).unwrap())
    );
    assert_eq!(
        cache.formula_cache().entry(b1_id).unwrap().location(),
        Some(&b1.location().unwrap())
    );
    assert!(cache.formula_result(b1_id).unwrap().is_fresh());

    // Nothing happens on another sheet.
    assert!(cache.notify_rows_inserted(0, 1, 0, 10).unwrap().is_empty());
    assert_eq!(cache.plain_cache().lookup(&moved), Some(a3_id));
}

#[test]
fn test_rows_deleted() {
    let (mut cache, _) = cache_with_listener(StalePolicy::Retain);
    let allocator = IdentityAllocator::default();
    let a2 = TestCell::new(&allocator, 1, 0).with_value(2.0);
    let a5 = TestCell::new(&allocator, 4, 0).with_value(5.0);
    let b2 = TestCell::new(&allocator, 1, 1).with_formula();
    let c1 = TestCell::new(&allocator, 0, 2).with_formula();
    let d1 = TestCell::new(&allocator, 0, 3).with_formula();
    let (_, _) = evaluate_sum(&mut cache, &b2, &[&a5]);
    let (c1_id, _) = evaluate_sum(&mut cache, &c1, &[&a2]);
    let (d1_id, _) = evaluate_sum(&mut cache, &d1, &[&b2, &a5]);
    let a5_id = cache.plain_cache().lookup(&a5.location().unwrap()).unwrap();

    // Rows 2 and 3 (zero-based 1 and 2) go away, taking A2 and B2 with them.
    let stale = cache.notify_rows_deleted(0, 0, 1, 2).unwrap();
    assert_eq!(set(stale), set([c1_id, d1_id]));
    assert_eq!(cache.formula_len(), 2);
    assert_eq!(cache.plain_len(), 1);
    assert_eq!(cache.plain_cache().lookup(&LocationKey::new(0, 0, 2, 0).unwrap()), Some(a5_id));
    assert_eq!(
        cache.formula_cache().entry(d1_id).unwrap().inputs(),
        &[EntryRef::Plain(a5_id)]
    );
}

#[test]
fn test_columns_shift() {
    let (mut cache, _) = cache_with_listener(StalePolicy::Retain);
    let allocator = IdentityAllocator::default();
    let edge = TestCell::new(&allocator, 0, 0xFFFF).with_value(1.0);
    let b1 = TestCell::new(&allocator, 0, 1).with_value(2.0);
    let a2 = TestCell::new(&allocator, 1, 0).with_formula();
    let (a2_id, _) = evaluate_sum(&mut cache, &a2, &[&edge, &b1]);
    let b1_id = cache.plain_cache().lookup(&b1.location().unwrap()).unwrap();

    // The last column is pushed off the sheet.
    let stale = cache.notify_columns_inserted(0, 0, 1, 1).unwrap();
    assert_eq!(stale, vec![a2_id]);
    assert_eq!(cache.plain_len(), 1);
    assert_eq!(cache.plain_cache().lookup(&LocationKey::new(0, 0, 0, 2).unwrap()), Some(b1_id));

    let moved = TestCell { column: 2, ..b1.clone() };
    evaluate_sum(&mut cache, &a2, &[&moved]);
    assert_eq!(fresh_value(&cache, a2_id), Some(CellValue::from(2.0)));
    assert_eq!(cache.plain_len(), 1);

    // A2 goes away together with everything it read.
    let stale = cache.notify_columns_deleted(0, 0, 0, 3).unwrap();
    assert!(stale.is_empty());
    assert!(cache.is_empty());
}

#[test]
fn test_shift_invalidates_blank_readers() {
    let (mut cache, _) = cache_with_listener(StalePolicy::Retain);
    let allocator = IdentityAllocator::default();
    let blank = TestCell::new(&allocator, 5, 0);
    let reader = TestCell::new(&allocator, 0, 0).with_formula().on(0, 1);
    let (reader_id, _) = evaluate_sum(&mut cache, &reader, &[&blank]);

    assert!(cache.notify_rows_inserted(0, 2, 0, 1).unwrap().is_empty());
    assert_eq!(cache.notify_rows_inserted(0, 0, 0, 1).unwrap(), vec![reader_id]);
}

#[test]
fn test_sheet_and_workbook_removed() {
    let (mut cache, _) = cache_with_listener(StalePolicy::Retain);
    let allocator = IdentityAllocator::default();
    let source = TestCell::new(&allocator, 0, 0).with_value(2.0);
    let local = TestCell::new(&allocator, 0, 1).with_formula();
    let remote = TestCell::new(&allocator, 0, 0).with_formula().on(0, 1);
    let other_book = TestCell::new(&allocator, 0, 0).with_formula().on(1, 0);
    let (_, _) = evaluate_sum(&mut cache, &local, &[&source]);
    let (remote_id, _) = evaluate_sum(&mut cache, &remote, &[&source, &local]);
    let (other_id, _) = evaluate_sum(&mut cache, &other_book, &[&remote]);

    let stale = cache.notify_sheet_removed(0, 0).unwrap();
    assert_eq!(set(stale), set([remote_id, other_id]));
    assert_eq!(cache.plain_len(), 0);
    assert_eq!(cache.formula_len(), 2);
    assert!(cache.formula_cache().entry(remote_id).unwrap().inputs().is_empty());

    let stale = cache.notify_workbook_removed(0).unwrap();
    assert!(stale.is_empty());
    assert_eq!(cache.formula_entries(), vec![other_id]);
    assert!(cache.formula_cache().entry(other_id).unwrap().inputs().is_empty());

    assert_eq!(
        cache.notify_sheet_removed(0x1_0000, 0).unwrap_err().kind(),
        ErrorKind::OutOfRange
    );
}

#[test]
fn test_clear() {
    let (mut cache, listener) = cache_with_listener(StalePolicy::Retain);
    let allocator = IdentityAllocator::default();
    let cells = (0..10)
        .map(|row| TestCell::new(&allocator, row, 0).with_value(row as f64))
        .collect::<Vec<_>>();
    let formulas = (0..10)
        .map(|row| TestCell::new(&allocator, row, 1).with_formula())
        .collect::<Vec<_>>();
    let ids = formulas
        .iter()
        .zip(cells.iter())
        .map(|(formula, cell)| evaluate_sum(&mut cache, formula, &[cell]).0)
        .collect::<Vec<_>>();

    cache.clear();
    assert!(cache.is_empty());
    assert!(ids.iter().all(|id| cache.formula_result(*id).is_none()));
    assert!(formulas.iter().all(|f| cache.lookup_formula(f).is_none()));
    assert_eq!(listener.records().last(), Some(&Record::Clear));
    assert_eq!(cache.metrics().snapshot().clear, 1);

    // The session starts over.
    let (id, _) = evaluate_sum(&mut cache, &formulas[3], &[&cells[3]]);
    assert_eq!(fresh_value(&cache, id), Some(CellValue::from(3.0)));
}

#[test]
fn test_discard_policy() {
    let (mut cache, _) = cache_with_listener(StalePolicy::Discard);
    let allocator = IdentityAllocator::default();
    let a1 = TestCell::new(&allocator, 0, 0).with_value(5.0);
    let b1 = TestCell::new(&allocator, 0, 1).with_formula();
    let (b1_id, _) = evaluate_sum(&mut cache, &b1, &[&a1]);

    cache.notify_update_cell(&a1.clone().with_value(6.0)).unwrap();
    assert_eq!(cache.formula_result(b1_id), Some(CachedResult::Pending));
    assert_eq!(cache.stale_formulas(), vec![b1_id]);
}

#[test]
fn test_apply_to_all_visits_every_entry() {
    let (mut cache, _) = cache_with_listener(StalePolicy::Retain);
    let allocator = IdentityAllocator::default();
    let formulas = (0..16)
        .map(|row| TestCell::new(&allocator, row, 0).with_formula())
        .collect::<Vec<_>>();
    for formula in formulas.iter() {
        evaluate_sum(&mut cache, formula, &[]);
    }
    for formula in formulas.iter().step_by(3) {
        cache.notify_delete_cell(formula).unwrap();
    }

    let mut visited = vec![];
    cache.apply_to_all(|id, entry| {
        assert!(entry.is_fresh());
        visited.push(id);
    });
    assert_eq!(visited.len(), cache.formula_len());
    assert_eq!(set(visited), set(cache.formula_entries()));
}

/// Random acyclic sheets: after each edit exactly the transitive consumers of the edited cell go stale.
#[test]
fn test_random_edits_invalidate_transitive_consumers() {
    const LITERALS: usize = 24;
    const FORMULAS: usize = 48;

    let mut rng = StdRng::seed_from_u64(20261016);
    let (mut cache, _) = cache_with_listener(StalePolicy::Retain);
    let allocator = IdentityAllocator::default();

    let mut literals = (0..LITERALS)
        .map(|row| TestCell::new(&allocator, row as i32, 0).with_value(row as f64))
        .collect::<Vec<_>>();
    let formulas = (0..FORMULAS)
        .map(|row| TestCell::new(&allocator, row as i32, 1).with_formula())
        .collect::<Vec<_>>();

    // Formula `i` reads some literals and some formulas before it.
    let reads = (0..FORMULAS)
        .map(|i| {
            let mut literal_reads = (0..LITERALS).collect::<Vec<_>>();
            literal_reads.shuffle(&mut rng);
            literal_reads.truncate(rng.random_range(0..3));
            let mut formula_reads = (0..i).collect::<Vec<_>>();
            formula_reads.shuffle(&mut rng);
            formula_reads.truncate(rng.random_range(0..3));
            (literal_reads, formula_reads)
        })
        .collect::<Vec<_>>();

    let evaluate = |cache: &mut EvaluationCache, literals: &[TestCell], i: usize| {
        let (literal_reads, formula_reads) = &reads[i];
        let inputs = literal_reads
            .iter()
            .map(|&l| &literals[l])
            .chain(formula_reads.iter().map(|&f| &formulas[f]))
            .collect::<Vec<_>>();
        evaluate_sum(cache, &formulas[i], &inputs).0
    };

    let ids = (0..FORMULAS)
        .map(|i| evaluate(&mut cache, &literals, i))
        .collect::<Vec<_>>();
    assert!(cache.stale_formulas().is_empty());

    for _ in 0..32 {
        let edited = rng.random_range(0..LITERALS);
        literals[edited] = literals[edited].clone().with_value(rng.random_range(100.0..200.0));

        let mut expected = BTreeSet::new();
        for i in 0..FORMULAS {
            let (literal_reads, formula_reads) = &reads[i];
            if literal_reads.contains(&edited) || formula_reads.iter().any(|f| expected.contains(&ids[*f])) {
                expected.insert(ids[i]);
            }
        }

        let stale = cache.notify_update_cell(&literals[edited]).unwrap();
        assert_eq!(stale.len(), expected.len());
        assert_eq!(set(stale), expected);

        for i in 0..FORMULAS {
            if expected.contains(&ids[i]) {
                assert_eq!(evaluate(&mut cache, &literals, i), ids[i]);
            }
        }
        assert!(cache.stale_formulas().is_empty());
    }
}
