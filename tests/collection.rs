use std::cell::{Cell, RefCell};
use std::rc::Rc;

use facetdb::FacetError;
use facetdb::collection::{Collection, CollectionState, Root};
use facetdb::config::Settings;
use facetdb::database::{Database, ItemSet};
use facetdb::datatype::Value;
use facetdb::facet::{FacetConfig, FacetState, FacetView, SliderRange};

fn setup() -> Database {
    let mut db = Database::new();
    for (item, score, category) in [("a", 1.0, "x"), ("b", 5.0, "y"), ("c", 9.0, "x")] {
        db.add_fact(item, "score", Value::Number(score)).unwrap();
        db.add_fact(item, "category", Value::Text(category.into())).unwrap();
    }
    db
}

fn ids(db: &Database, items: &ItemSet) -> Vec<String> {
    db.item_ids(items)
}

fn count_of(view: &FacetView, key: &str) -> u64 {
    match view {
        FacetView::List { choices, .. } => choices.iter().find(|c| c.key == key).map_or(0, |c| c.count),
        other => panic!("not a list view: {other:?}"),
    }
}

#[test]
fn category_and_score_narrow_together() {
    let db = setup();
    let mut collection = Collection::new(Root::All, &db);
    let category = collection.add_facet(&FacetConfig::list("category", ".category"), &db).unwrap();
    collection.select(category, "x", &db).unwrap();
    assert_eq!(ids(&db, collection.restricted_items()), vec!["a", "c"]);

    let score = collection
        .add_facet(&FacetConfig::numeric("score", ".score", Some(5.0)), &db)
        .unwrap();
    collection.select_range(score, 0.0, 5.0, &db).unwrap();
    assert_eq!(ids(&db, collection.restricted_items()), vec!["a"]);

    // b has score 5, which the half-open bucket leaves out
    assert_eq!(ids(&db, collection.others(category).unwrap()), vec!["a"]);
    let view = collection.update(category, &db).unwrap();
    assert_eq!(count_of(&view, "x"), 1);
    assert_eq!(count_of(&view, "y"), 0);
    // the score facet counts against the category selection only
    assert_eq!(ids(&db, collection.others(score).unwrap()), vec!["a", "c"]);
}

#[test]
fn restricted_set_is_the_intersection_in_any_order() {
    let db = setup();
    let configs = [
        FacetConfig::list("category", ".category"),
        FacetConfig::slider("score", ".score"),
        FacetConfig::search("search", None),
    ];
    let mut forward = Collection::new(Root::All, &db);
    let mut backward = Collection::new(Root::All, &db);
    for config in configs.iter() {
        forward.add_facet(config, &db).unwrap();
    }
    for config in configs.iter().rev() {
        backward.add_facet(config, &db).unwrap();
    }
    for collection in [&mut forward, &mut backward] {
        let category = collection.facet_id("category").unwrap();
        let score = collection.facet_id("score").unwrap();
        collection.select(category, "x", &db).unwrap();
        collection.set_slider(score, Some(SliderRange { min: 0.0, max: 5.0 }), &db).unwrap();
    }
    assert_eq!(forward.restricted_items(), backward.restricted_items());
    assert_eq!(ids(&db, forward.restricted_items()), vec!["a"]);

    let mut expected = forward.root_items().clone();
    for (_, facet) in forward.facets() {
        expected &= facet.restrict(forward.root_items(), &db).matched;
    }
    assert_eq!(forward.restricted_items(), &expected);
}

#[test]
fn others_match_brute_force() {
    let mut db = setup();
    db.add_fact("d", "score", Value::Number(3.0)).unwrap();
    db.add_fact("e", "category", Value::Text("y".into())).unwrap();
    let mut collection = Collection::new(Root::All, &db);
    let category = collection.add_facet(&FacetConfig::list("category", ".category"), &db).unwrap();
    let score = collection.add_facet(&FacetConfig::slider("score", ".score"), &db).unwrap();
    let low = collection.add_facet(&FacetConfig::numeric("low", ".score", Some(4.0)), &db).unwrap();
    collection.select(category, "x", &db).unwrap();
    collection.select_missing(category, true, &db).unwrap();
    collection.set_slider(score, Some(SliderRange { min: 1.0, max: 9.0 }), &db).unwrap();
    collection.select_range(low, 0.0, 4.0, &db).unwrap();

    let root = collection.root_items().clone();
    let matched: Vec<ItemSet> = collection.facets().map(|(_, facet)| facet.restrict(&root, &db).matched).collect();
    for (id, _) in collection.facets() {
        let mut expected = root.clone();
        for (j, m) in matched.iter().enumerate() {
            if j != id.index() {
                expected &= m;
            }
        }
        assert_eq!(collection.others(id).unwrap(), &expected, "others of facet {id}");
    }
    assert_eq!(ids(&db, collection.restricted_items()), vec!["a", "d"]);
}

#[test]
fn clearing_twice_is_clearing_once() {
    let db = setup();
    let mut collection = Collection::new(Root::All, &db);
    let category = collection.add_facet(&FacetConfig::list("category", ".category"), &db).unwrap();
    collection.select(category, "y", &db).unwrap();
    let before = collection.notifications();
    assert!(collection.clear_all_restrictions(category, &db).unwrap());
    assert!(!collection.clear_all_restrictions(category, &db).unwrap());
    assert_eq!(collection.notifications(), before + 1);
    assert_eq!(collection.count_restricted_items(), 3);
}

#[test]
fn importing_an_exported_state_is_a_no_op() {
    let db = setup();
    let mut collection = Collection::new(Root::All, &db);
    let category = collection.add_facet(&FacetConfig::list("category", ".category"), &db).unwrap();
    let score = collection.add_facet(&FacetConfig::numeric("score", ".score", Some(5.0)), &db).unwrap();
    collection.select(category, "x", &db).unwrap();
    collection.select_range(score, 5.0, 10.0, &db).unwrap();
    let state = collection.export_state();
    let before = collection.notifications();
    assert!(!collection.import_state(state.clone(), &db).unwrap());
    assert_eq!(collection.notifications(), before);

    collection.clear_everything(&db);
    assert_eq!(collection.count_restricted_items(), 3);
    assert!(collection.import_state(state, &db).unwrap());
    assert_eq!(ids(&db, collection.restricted_items()), vec!["c"]);
}

#[test]
fn importing_is_all_or_nothing() {
    let db = setup();
    let mut collection = Collection::new(Root::All, &db);
    collection.add_facet(&FacetConfig::list("category", ".category"), &db).unwrap();
    let mut state = CollectionState::new();
    state.insert("category".into(), FacetState::List { selection: vec!["x".into()], missing: false });
    state.insert("nope".into(), FacetState::Search { text: None });
    assert!(matches!(collection.import_state(state, &db), Err(FacetError::UnknownFacet(_))));
    assert_eq!(collection.count_restricted_items(), 3);

    let mut state = CollectionState::new();
    state.insert("category".into(), FacetState::Search { text: Some("x".into()) });
    assert!(matches!(collection.import_state(state, &db), Err(FacetError::Invariant(_))));

    // facets left out keep their restriction
    let category = collection.facet_id("category").unwrap();
    collection.select(category, "y", &db).unwrap();
    assert!(!collection.import_state(CollectionState::new(), &db).unwrap());
    assert_eq!(ids(&db, collection.restricted_items()), vec!["b"]);
}

#[test]
fn listeners_see_each_change_once() {
    let db = setup();
    let mut collection = Collection::new(Root::All, &db);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let record = Rc::clone(&seen);
    collection.on_items_changed(move |notice| {
        record.borrow_mut().push((notice.round(), notice.collection().count_restricted_items()));
    });
    let category = collection.add_facet(&FacetConfig::list("category", ".category"), &db).unwrap();
    // adding a facet without a restriction changes nothing
    assert!(seen.borrow().is_empty());
    collection.select(category, "x", &db).unwrap();
    // selecting again is no change
    assert!(!collection.select(category, "x", &db).unwrap());
    assert_eq!(*seen.borrow(), vec![(1, 2)]);
}

#[test]
fn batches_notify_once() {
    let db = setup();
    let mut collection = Collection::new(Root::All, &db);
    let category = collection.add_facet(&FacetConfig::list("category", ".category"), &db).unwrap();
    let score = collection.add_facet(&FacetConfig::slider("score", ".score"), &db).unwrap();
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    collection.on_items_changed(move |_| counter.set(counter.get() + 1));
    let inside = collection
        .batch(&db, |collection| {
            collection.select(category, "x", &db)?;
            collection.set_slider(score, Some(SliderRange { min: 5.0, max: 10.0 }), &db)?;
            // reads inside the batch see the state from before it
            Ok(collection.count_restricted_items())
        })
        .unwrap();
    assert_eq!(inside, 3);
    assert_eq!(calls.get(), 1);
    assert_eq!(ids(&db, collection.restricted_items()), vec!["c"]);

    // an empty batch notifies nobody
    collection.batch(&db, |_| Ok(())).unwrap();
    assert_eq!(calls.get(), 1);
}

#[test]
fn a_failing_batch_still_applies_what_it_did() {
    let db = setup();
    let mut collection = Collection::new(Root::All, &db);
    let category = collection.add_facet(&FacetConfig::list("category", ".category"), &db).unwrap();
    let result: facetdb::Result<()> = collection.batch(&db, |collection| {
        collection.select(category, "y", &db)?;
        collection.select_range(category, 0.0, 1.0, &db)?;
        Ok(())
    });
    assert!(matches!(result, Err(FacetError::Invariant(_))));
    assert_eq!(ids(&db, collection.restricted_items()), vec!["b"]);
}

#[test]
fn deferred_changes_run_in_bounded_rounds() {
    let db = setup();
    let settings = Settings { max_notification_rounds: 3, ..Settings::default() };
    let mut collection = Collection::with_settings(Root::All, settings, &db);
    let category = collection.add_facet(&FacetConfig::list("category", ".category"), &db).unwrap();
    let rounds = Rc::new(RefCell::new(Vec::new()));
    let record = Rc::clone(&rounds);
    // never settles: asks for a different selection every round
    collection.on_items_changed(move |notice| {
        record.borrow_mut().push(notice.round());
        let selection = vec![format!("k{}", notice.round())];
        notice.defer(category, FacetState::List { selection, missing: false });
    });
    collection.select(category, "x", &db).unwrap();
    assert_eq!(*rounds.borrow(), vec![1, 2, 3]);
    assert_eq!(collection.notifications(), 3);
    // the change asked for in round 3 was dropped
    let state = collection.facet(category).unwrap().export_state();
    assert_eq!(state, FacetState::List { selection: vec!["k2".into()], missing: false });
}

#[test]
fn deferring_the_current_state_settles_at_once() {
    let db = setup();
    let mut collection = Collection::new(Root::All, &db);
    let category = collection.add_facet(&FacetConfig::list("category", ".category"), &db).unwrap();
    let score = collection.add_facet(&FacetConfig::slider("score", ".score"), &db).unwrap();
    let rounds = Rc::new(Cell::new(0));
    let counter = Rc::clone(&rounds);
    // keeps the slider on whatever the category leaves
    collection.on_items_changed(move |notice| {
        counter.set(counter.get() + 1);
        let collection = notice.collection();
        let others = collection.others(score).unwrap().clone();
        let slider = collection.facet(score).unwrap().export_state();
        if counter.get() == 1 && matches!(slider, FacetState::Slider { range: None, .. }) && !others.is_empty() {
            notice.defer(score, FacetState::Slider { range: Some(SliderRange { min: 0.0, max: 4.0 }), missing: false });
        } else {
            notice.defer(score, slider);
        }
    });
    collection.select(category, "x", &db).unwrap();
    assert_eq!(rounds.get(), 2);
    assert_eq!(ids(&db, collection.restricted_items()), vec!["a"]);
}

#[test]
fn root_changes_and_refresh() {
    let mut db = setup();
    let mut collection = Collection::new(Root::All, &db);
    let category = collection.add_facet(&FacetConfig::list("category", ".category"), &db).unwrap();
    collection.select(category, "x", &db).unwrap();

    assert!(collection.set_root(Root::Items(vec!["a".into(), "b".into(), "ghost".into()]), &db));
    assert_eq!(ids(&db, collection.root_items()), vec!["a", "b"]);
    assert_eq!(ids(&db, collection.restricted_items()), vec!["a"]);
    assert!(!collection.set_root(Root::Items(vec!["b".into(), "a".into()]), &db));

    assert!(collection.set_root(Root::All, &db));
    assert!(!collection.refresh(&db));
    db.add_fact("d", "category", Value::Text("x".into())).unwrap();
    assert!(collection.refresh(&db));
    assert_eq!(ids(&db, collection.restricted_items()), vec!["a", "c", "d"]);
    assert!(!collection.refresh(&db));
    // a changed value moves counts without touching the root
    db.remove_fact("a", "category", &Value::Text("x".into()));
    db.add_fact("a", "category", Value::Text("y".into())).unwrap();
    assert!(collection.refresh(&db));
    assert_eq!(ids(&db, collection.restricted_items()), vec!["c", "d"]);
}

#[test]
fn typed_roots() {
    let mut db = setup();
    db.declare_type("a", "Book").unwrap();
    db.declare_type("c", "Film").unwrap();
    let collection = Collection::new(Root::Types(vec!["Book".into(), "Film".into()]), &db);
    assert_eq!(ids(&db, collection.root_items()), vec!["a", "c"]);
    let empty = Collection::new(Root::Types(vec!["Poem".into()]), &db);
    assert_eq!(empty.count_restricted_items(), 0);
}

#[test]
fn registration_failures_leave_nothing_behind() {
    let db = setup();
    let mut collection = Collection::new(Root::All, &db);
    let broken = FacetConfig::list("category", ".category )");
    assert!(matches!(collection.add_facet(&broken, &db), Err(FacetError::Syntax { .. })));
    assert!(matches!(collection.facet_id("category"), Err(FacetError::UnknownFacet(_))));
    assert_eq!(collection.facets().count(), 0);

    let category = collection.add_facet(&FacetConfig::list("category", ".category"), &db).unwrap();
    let again = collection.add_facet(&FacetConfig::slider("category", ".score"), &db);
    assert!(matches!(again, Err(FacetError::Invariant(_))));
    assert_eq!(collection.facets().count(), 1);
    assert_eq!(collection.facet_id("category").unwrap(), category);
    assert_eq!(collection.facet(category).unwrap().id(), "category");
}

#[test]
fn operations_of_the_wrong_kind_are_refused() {
    let db = setup();
    let mut collection = Collection::new(Root::All, &db);
    let category = collection.add_facet(&FacetConfig::list("category", ".category"), &db).unwrap();
    assert!(matches!(collection.set_search(category, Some("x"), &db), Err(FacetError::Invariant(_))));
    assert!(matches!(
        collection.set_slider(category, Some(SliderRange { min: 0.0, max: 1.0 }), &db),
        Err(FacetError::Invariant(_))
    ));
    assert_eq!(collection.count_restricted_items(), 3);
}
