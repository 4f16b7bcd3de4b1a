use std::fs;

use facetdb::FacetError;
use facetdb::database::{Database, LABEL};
use facetdb::datatype::{Value, ValueType};
use facetdb::loader::{self, DEFAULT_TYPE};

const DATA: &str = r#"{
    "types": { "Book": { "label": "Books" }, "Person": {} },
    "properties": {
        "pages": { "valueType": "number" },
        "published": { "valueType": "date" },
        "author": { "valueType": "item", "inverse": "wrote", "reverseLabel": "author of" }
    },
    "items": [
        { "id": "dune", "label": "Dune", "type": "Book", "pages": 412, "published": "1965",
          "author": "herbert", "tags": ["sf", "classic"] },
        { "label": "Emma", "type": "Book", "pages": "474", "author": "austen", "note": null },
        { "id": 7, "label": "Seven", "pages": "lots" },
        { "label": "herbert", "type": "Person" },
        { "type": "Book" },
        { "id": "nested", "tags": [["a"]] }
    ]
}"#;

fn setup() -> (Database, loader::LoadReport) {
    let mut db = Database::new();
    let report = loader::load_json(DATA, &mut db).unwrap();
    (db, report)
}

#[test]
fn declarations_come_first() {
    let (db, report) = setup();
    assert_eq!(report.types, 2);
    assert_eq!(report.properties, 3);
    assert_eq!(db.type_label("Book"), "Books");
    assert_eq!(db.type_label("Person"), "Person");
    assert_eq!(db.value_type("pages"), Some(ValueType::Number));
    assert_eq!(db.values("emma", "pages"), &[Value::Number(474.0)]);
    assert_eq!(db.values("dune", "published")[0].key(), "1965-01-01");
    assert_eq!(db.reverse_label("author"), Some("author of"));
}

#[test]
fn items_are_identified_by_id_or_label() {
    let (db, report) = setup();
    // the one without id and label, and the one with a nested array
    assert_eq!(report.items, 4);
    assert!(db.item_handle("Emma").is_some());
    assert_eq!(db.label_of("7"), "Seven");
    assert_eq!(db.type_of("7").as_deref(), Some(DEFAULT_TYPE));
    assert_eq!(db.items_of_type("Book").len(), 2);
    assert!(db.item_handle("nested").is_none());
}

#[test]
fn arrays_become_one_fact_each() {
    let (db, _) = setup();
    let tags: Vec<String> = db.values("dune", "tags").iter().map(Value::key).collect();
    assert_eq!(tags, vec!["sf", "classic"]);
    assert!(db.values("Emma", "note").is_empty());
    assert_eq!(db.values("dune", LABEL), &[Value::Text("Dune".into())]);
}

#[test]
fn bad_facts_are_reported_and_skipped() {
    let (db, report) = setup();
    assert!(!report.is_clean());
    assert_eq!(report.errors.len(), 3);
    assert!(report.errors.iter().any(|e| matches!(e, FacetError::TypeMismatch { value, .. } if value == "lots")));
    assert!(report.errors.iter().all(|e| matches!(e, FacetError::TypeMismatch { .. } | FacetError::Load(_))));
    // the rest of the item still loaded
    assert_eq!(db.label_of("7"), "Seven");
    assert!(db.values("7", "pages").is_empty());
}

#[test]
fn inverse_names_walk_items_backward() {
    let (db, _) = setup();
    let wrote = facetdb::expression::Expression::parse(".wrote.label").unwrap();
    assert_eq!(wrote.evaluate_item("herbert", &db).unwrap().keys(), vec!["Dune"]);
}

#[test]
fn files_that_are_not_data_fail_outright() {
    let mut db = Database::new();
    assert!(matches!(loader::load_json("[1, 2", &mut db), Err(FacetError::Load(_))));
    assert!(matches!(loader::load_json("{\"items\": 3}", &mut db), Err(FacetError::Load(_))));
    let missing = std::env::temp_dir().join("facetdb-no-such-file.json");
    assert!(matches!(loader::load_file(&missing, &mut db), Err(FacetError::Load(_))));
}

#[test]
fn files_load_like_text() {
    let path = std::env::temp_dir().join(format!("facetdb-loader-{}.json", std::process::id()));
    fs::write(&path, DATA).unwrap();
    let mut db = Database::new();
    let report = loader::load_file(&path, &mut db).unwrap();
    fs::remove_file(&path).unwrap();
    assert_eq!(report.items, 4);
    assert_eq!(report.facts, setup().1.facts);
}
