use std::ops::Bound;
use std::sync::Arc;

use facetdb::database::{Database, ItemSet};
use facetdb::datatype::Value;
use facetdb::expression::{Expression, KeyRange};
use facetdb::range::RangeIndex;

fn setup() -> Database {
    let mut db = Database::new();
    for (i, score) in [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0].iter().enumerate() {
        db.add_fact(&format!("item{i}"), "score", Value::Number(*score)).unwrap();
    }
    // a second value for one item
    db.add_fact("item0", "score", Value::Number(7.0)).unwrap();
    db.add_fact("plain", "name", Value::Text("no score".into())).unwrap();
    db
}

fn brute_force(db: &Database, range: &KeyRange, filter: &ItemSet) -> ItemSet {
    filter
        .iter()
        .filter(|thing| {
            db.values_of(*thing, "score")
                .iter()
                .filter_map(Value::sort_key)
                .any(|key| range.contains(key))
        })
        .collect()
}

#[test]
fn boundaries_are_half_open_by_default() {
    let index = RangeIndex::build([1, 2, 3, 4], 1, |thing| vec![thing as f64 * 10.0]);
    assert_eq!(index.items_in_range(10.0, 30.0, true).iter().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(index.items_in_range(10.0, 30.0, false).iter().collect::<Vec<_>>(), vec![2]);
    assert_eq!(
        index.items_between(Bound::Included(20.0), Bound::Included(40.0)).iter().collect::<Vec<_>>(),
        vec![2, 3, 4]
    );
    assert!(index.items_in_range(50.0, 60.0, true).is_empty());
    // an inverted range is empty rather than an error
    assert!(index.items_in_range(30.0, 10.0, true).is_empty());
}

#[test]
fn extremes_of_an_empty_index() {
    let index = RangeIndex::build(Vec::new(), 0, |_| Vec::new());
    assert!(index.is_empty());
    assert_eq!(index.min(), f64::INFINITY);
    assert_eq!(index.max(), f64::NEG_INFINITY);
    assert_eq!(index.bounds_within(&ItemSet::new()), None);
}

#[test]
fn non_finite_keys_are_left_out() {
    let index = RangeIndex::build([1, 2], 0, |thing| if thing == 1 { vec![f64::NAN] } else { vec![2.0, 3.0] });
    assert_eq!(index.len(), 2);
    assert_eq!(index.min(), 2.0);
    assert_eq!(index.max(), 3.0);
}

#[test]
fn counts_and_bounds_respect_the_subset() {
    let db = setup();
    let index = db.range_index("score").expect("score is numeric");
    assert_eq!(index.min(), 1.0);
    assert_eq!(index.max(), 9.0);
    let subset = db.item_set(["item1", "item2", "item6"]);
    assert_eq!(index.bounds_within(&subset), Some((1.0, 4.0)));
    // item0 has two keys in range but counts once
    let all = db.all_items().clone();
    assert_eq!(index.count_within(Bound::Included(3.0), Bound::Included(7.0), &all), 4);
    assert_eq!(index.count_within(Bound::Included(3.0), Bound::Included(7.0), &subset), 1);
}

#[test]
fn store_indexes_are_reused_until_stale() {
    let mut db = setup();
    let first = db.range_index("score").unwrap();
    let again = db.range_index("score").unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    // other properties do not invalidate it
    db.add_fact("plain", "name", Value::Text("still none".into())).unwrap();
    assert!(Arc::ptr_eq(&first, &db.range_index("score").unwrap()));

    db.add_fact("late", "score", Value::Number(100.0)).unwrap();
    let rebuilt = db.range_index("score").unwrap();
    assert!(!Arc::ptr_eq(&first, &rebuilt));
    assert_eq!(rebuilt.max(), 100.0);
    // the old snapshot is left as it was
    assert_eq!(first.max(), 9.0);
    assert!(db.range_index("name").is_none());
}

#[test]
fn range_backward_matches_brute_force() {
    let db = setup();
    let expression = Expression::parse(".score").unwrap();
    let mut filter = db.all_items().clone();
    filter.remove(db.item_handle("item5").unwrap());
    for range in [
        KeyRange::half_open(1.0, 4.0, true),
        KeyRange::half_open(1.0, 4.0, false),
        KeyRange::closed(5.0, 9.0),
        KeyRange::closed(6.5, 6.5),
        KeyRange::unbounded(),
    ] {
        let (matched, failed) = expression.range_backward(&range, &filter, &db);
        assert!(failed.is_empty());
        assert_eq!(matched, brute_force(&db, &range, &filter), "{range:?}");
    }
}

#[test]
fn range_backward_evaluates_computed_expressions() {
    let db = setup();
    let expression = Expression::parse(".score * 10").unwrap();
    let range = KeyRange::closed(50.0, 70.0);
    let (matched, failed) = expression.range_backward(&range, db.all_items(), &db);
    assert!(failed.is_empty());
    assert_eq!(db.item_ids(&matched), vec!["item0", "item4", "item7"]);
}

#[test]
fn range_forward_matches_brute_force() {
    let db = setup();
    let roots = db.item_set(["item0", "item2", "item3", "plain"]);
    let expression = Expression::parse(".score").unwrap();
    let range = KeyRange::half_open(1.0, 7.0, true);
    let values = expression.range_forward(&range, &roots, &db).unwrap();
    assert_eq!(values.keys(), vec!["1", "3", "4"]);
    let everything = expression.range_forward(&KeyRange::unbounded(), &roots, &db).unwrap();
    assert_eq!(everything.keys(), vec!["1", "3", "4", "7"]);
}
