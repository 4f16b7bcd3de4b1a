use std::fs;
use std::path::PathBuf;

use facetdb::FacetError;
use facetdb::config::Settings;

fn setup(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("facetdb-{name}-{}.toml", std::process::id()));
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn defaults_without_a_file() {
    let missing = std::env::temp_dir().join("facetdb-settings-that-do-not-exist");
    let settings = Settings::load_from(missing.to_str().unwrap()).unwrap();
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.max_notification_rounds, 4);
    assert_eq!(settings.missing_label, "(missing this field)");
}

#[test]
fn file_values_override_defaults() {
    let path = setup("override", "max_buckets = 5\nmissing_label = \"(none)\"\n");
    let settings = Settings::load_from(path.to_str().unwrap()).unwrap();
    fs::remove_file(&path).unwrap();
    assert_eq!(settings.max_buckets, 5);
    assert_eq!(settings.missing_label, "(none)");
    assert_eq!(settings.min_buckets, 2);
}

#[test]
fn inconsistent_bucket_bounds_are_refused() {
    let path = setup("inconsistent", "min_buckets = 8\nmax_buckets = 3\n");
    let result = Settings::load_from(path.to_str().unwrap());
    fs::remove_file(&path).unwrap();
    assert!(matches!(result, Err(FacetError::Config(_))));
}

#[test]
fn zero_values_are_raised_to_one() {
    let path = setup("zeros", "min_buckets = 0\nmax_notification_rounds = 0\n");
    let settings = Settings::load_from(path.to_str().unwrap()).unwrap();
    fs::remove_file(&path).unwrap();
    assert_eq!(settings.min_buckets, 1);
    assert_eq!(settings.max_notification_rounds, 1);
}

#[test]
fn settings_flow_into_facets() {
    use facetdb::collection::{Collection, Root};
    use facetdb::database::Database;
    use facetdb::datatype::Value;
    use facetdb::facet::{FacetConfig, FacetView};

    let mut db = Database::new();
    db.add_fact("a", "n", Value::Number(1.0)).unwrap();
    db.add_fact("b", "m", Value::Number(1.0)).unwrap();
    let settings = Settings { missing_label: "(none)".into(), ..Settings::default() };
    let mut collection = Collection::with_settings(Root::All, settings, &db);
    let n = collection.add_facet(&FacetConfig::list("n", ".n"), &db).unwrap();
    match collection.update(n, &db).unwrap() {
        FacetView::List { missing, .. } => {
            assert_eq!(missing.label, "(none)");
            assert_eq!(missing.count, 1);
        }
        other => panic!("not a list view: {other:?}"),
    }
}
