use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use facetdb::collection::{Collection, Root};
use facetdb::database::Database;
use facetdb::datatype::Value;
use facetdb::expression::{Expression, KeyRange};
use facetdb::facet::{FacetConfig, SliderRange};

fn database(items: usize) -> Database {
    let mut db = Database::new();
    for i in 0..items {
        let id = format!("item{i}");
        db.add_fact(&id, "category", Value::Text(format!("c{}", i % 10))).unwrap();
        db.add_fact(&id, "score", Value::Number((i % 1000) as f64)).unwrap();
        db.add_fact(&id, "label", Value::Text(format!("Item number {i}"))).unwrap();
    }
    db
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let db = database(10_000);

    let mut collection = Collection::new(Root::All, &db);
    let category = collection.add_facet(&FacetConfig::list("category", ".category"), &db).unwrap();
    let score = collection.add_facet(&FacetConfig::slider("score", ".score"), &db).unwrap();
    let buckets = collection.add_facet(&FacetConfig::numeric("buckets", ".score", None), &db).unwrap();
    collection.set_slider(score, Some(SliderRange { min: 100.0, max: 800.0 }), &db).unwrap();
    c.bench_function("recompute 10k x 3 facets", |b| {
        b.iter(|| {
            collection.select(category, "c3", &db).unwrap();
            collection.deselect(category, "c3", &db).unwrap();
        })
    });
    c.bench_function("update list 10k", |b| b.iter(|| black_box(collection.update(category, &db).unwrap())));
    c.bench_function("update buckets 10k", |b| b.iter(|| black_box(collection.update(buckets, &db).unwrap())));

    let mut search = Collection::new(Root::All, &db);
    let text = search.add_facet(&FacetConfig::search("search", None), &db).unwrap();
    c.bench_function("search 10k", |b| {
        b.iter(|| {
            search.set_search(text, Some("number 99"), &db).unwrap();
            search.set_search(text, None, &db).unwrap();
        })
    });

    let path = Expression::parse(".score").unwrap();
    let range = KeyRange::half_open(250.0, 500.0, true);
    c.bench_function("range backward 10k", |b| {
        b.iter(|| black_box(path.range_backward(&range, db.all_items(), &db)))
    });
    let computed = Expression::parse("if(.score > 500, 'high', 'low')").unwrap();
    c.bench_function("evaluate computed 10k", |b| {
        b.iter(|| black_box(computed.evaluate_items(db.all_items(), &db).unwrap()))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
