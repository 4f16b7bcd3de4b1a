//! Loads items from JSON data files into a [`Database`].
//!
//! The layout is the one faceted browsers have long used:
//!
//! ```json
//! {
//!   "types": { "Book": { "label": "Book" } },
//!   "properties": { "pages": { "valueType": "number" } },
//!   "items": [ { "label": "Dune", "type": "Book", "pages": 412, "tags": ["sf", "classic"] } ]
//! }
//! ```
//!
//! Arrays become one fact per element. An item without `id` is identified
//! by its `label`, and one without `type` is an `Item`. Bad facts are
//! reported and skipped, the rest of the file still loads.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value as Json};
use tracing::{info, warn};

use crate::database::{Database, FactInput, LABEL, PropertyDef, TYPE};
use crate::datatype::Value;
use crate::error::{FacetError, Result};

pub const DEFAULT_TYPE: &str = "Item";
const ID: &str = "id";

#[derive(Debug, Default, Deserialize)]
struct TypeDef {
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DataFile {
    #[serde(default)]
    types: BTreeMap<String, TypeDef>,
    #[serde(default)]
    properties: BTreeMap<String, PropertyDef>,
    #[serde(default)]
    items: Vec<Map<String, Json>>,
}

/// What a load did. Per-fact and per-item problems end up in `errors`.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub types: usize,
    pub properties: usize,
    pub items: usize,
    pub facts: usize,
    pub errors: Vec<FacetError>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn load_file(path: &Path, database: &mut Database) -> Result<LoadReport> {
    let text = fs::read_to_string(path).map_err(|e| FacetError::Load(format!("{}: {e}", path.display())))?;
    load_json(&text, database)
}

/// Fails only when the text is not a data file at all.
pub fn load_json(text: &str, database: &mut Database) -> Result<LoadReport> {
    let data: DataFile = serde_json::from_str(text)?;
    let mut report = LoadReport::default();
    for (type_id, def) in &data.types {
        database.set_type_label(type_id, def.label.as_deref().unwrap_or(type_id));
        report.types += 1;
    }
    // declared before any fact so that values are coerced to the declared type
    for (id, def) in &data.properties {
        match database.declare_property(id, def) {
            Ok(()) => report.properties += 1,
            Err(e) => report.errors.push(e),
        }
    }
    let mut facts = Vec::new();
    for (position, item) in data.items.iter().enumerate() {
        match item_facts(item) {
            Ok(mut item_facts) => {
                report.items += 1;
                facts.append(&mut item_facts);
            }
            Err(e) => {
                warn!(position, error = %e, "item skipped");
                report.errors.push(e);
            }
        }
    }
    let offered = facts.len();
    let rejected = database.load_facts(facts);
    report.facts = offered - rejected.len();
    report.errors.extend(rejected);
    info!(
        types = report.types,
        properties = report.properties,
        items = report.items,
        facts = report.facts,
        errors = report.errors.len(),
        "data loaded"
    );
    Ok(report)
}

fn item_facts(item: &Map<String, Json>) -> Result<Vec<FactInput>> {
    let id = item
        .get(ID)
        .or_else(|| item.get(LABEL))
        .and_then(scalar_text)
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| FacetError::Load("item has neither id nor label".to_string()))?;
    let mut facts = Vec::new();
    for (property, value) in item {
        if property == ID {
            continue;
        }
        for value in json_values(value).map_err(|e| FacetError::Load(format!("item {id}, property {property}: {e}")))? {
            facts.push(FactInput::new(&id, property, value));
        }
    }
    if !item.contains_key(TYPE) {
        facts.push(FactInput::new(&id, TYPE, Value::Text(DEFAULT_TYPE.to_string())));
    }
    Ok(facts)
}

fn scalar_text(value: &Json) -> Option<String> {
    match value {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_values(value: &Json) -> std::result::Result<Vec<Value>, String> {
    match value {
        Json::Null => Ok(Vec::new()),
        Json::Bool(b) => Ok(vec![Value::Boolean(*b)]),
        Json::Number(n) => n
            .as_f64()
            .filter(|n| n.is_finite())
            .map(|n| vec![Value::Number(n)])
            .ok_or_else(|| format!("{n} is not a usable number")),
        Json::String(s) => Ok(vec![Value::Text(s.clone())]),
        Json::Array(elements) => {
            let mut values = Vec::new();
            for element in elements {
                if element.is_array() {
                    return Err("nested arrays are not values".to_string());
                }
                values.extend(json_values(element)?);
            }
            Ok(values)
        }
        Json::Object(_) => Err("objects are not values".to_string()),
    }
}
