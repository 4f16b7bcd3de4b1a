//! facetdb – an in-memory triple store with faceted narrowing on top.
//!
//! The store holds *facts*, triples of the form `(item, property, value)`:
//! * An item is an opaque string identifier, interned to a [`database::Thing`]
//!   handle so that sets of items are roaring bitmaps.
//! * A property is typed (text, number, date, boolean, item or url),
//!   multi-valued, and may declare an inverse name that walks it backward.
//! * Values are coerced to the property's type on the way in; what cannot be
//!   coerced is rejected and reported, never stored.
//!
//! The store keeps a forward index `(item, property) -> values` and a
//! backward index `(property, value) -> items`, and hands out a sorted
//! [`range::RangeIndex`] per number or date property, rebuilt when the
//! property's facts have changed since it was built.
//!
//! ## Modules
//! * [`database`] – Items, properties, facts and their indexes.
//! * [`datatype`] – Value types, values and coercion.
//! * [`range`] – Sorted range index snapshots.
//! * [`expression`] – Scanner, parser and evaluator of the expression language.
//! * [`facet`] – List, numeric bucket, slider and text search facets.
//! * [`collection`] – Folds facets over a root set and tracks "others" sets.
//! * [`registry`] – Name to handle lookups for facets.
//! * [`loader`] – JSON data file ingestion.
//! * [`config`] – Settings read from `facetdb.toml` and `FACETDB_*` variables.
//!
//! ## Expressions
//! Paths such as `.author.label` walk properties forward from the current
//! item, `!author` walks one backward. Operators (`+ - * / = <> < <= > >=
//! and or`) and functions (`count(.tags)`, `if(...)`, `date-range(...)`)
//! combine the values reached. Every evaluation results in a deduplicated,
//! typed [`expression::ExpressionCollection`].
//!
//! ## Quick Start
//! ```
//! use facetdb::collection::{Collection, Root};
//! use facetdb::database::Database;
//! use facetdb::datatype::Value;
//! use facetdb::facet::FacetConfig;
//!
//! let mut db = Database::new();
//! db.add_fact("a", "category", Value::Text("x".into())).unwrap();
//! db.add_fact("b", "category", Value::Text("y".into())).unwrap();
//! let mut collection = Collection::new(Root::All, &db);
//! let category = collection.add_facet(&FacetConfig::list("category", ".category"), &db).unwrap();
//! collection.select(category, "x", &db).unwrap();
//! assert_eq!(collection.count_restricted_items(), 1);
//! ```

pub mod collection;
pub mod config;
pub mod database;
pub mod datatype;
pub mod error;
pub mod expression;
pub mod facet;
pub mod loader;
pub mod range;
pub mod registry;

pub use error::{FacetError, Result};
