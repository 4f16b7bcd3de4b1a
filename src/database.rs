use std::sync::{Arc, Mutex, PoisonError};

// used to keep the one-to-one mapping between item identifiers and their handles
use bimap::BiMap;

// other lookups use HashSet or HashMap
use core::hash::BuildHasherDefault;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use seahash::SeaHasher;

// item sets are bitmaps so that facets can be "joined" by intersection
use roaring::RoaringTreemap;

use serde::Deserialize;
use tracing::{debug, info, warn};

// our own stuff that we need
use crate::datatype::{Value, ValueType};
use crate::error::{FacetError, Result};
use crate::range::RangeIndex;

// ------------- Thing -------------
pub type Thing = u64;
pub type ItemSet = RoaringTreemap;

pub type ThingHasher = BuildHasherDefault<SeaHasher>;
pub type OtherHasher = BuildHasherDefault<SeaHasher>;

pub const GENESIS: Thing = 0;

// Reserved properties that every database starts out with.
pub const LABEL: &str = "label";
pub const TYPE: &str = "type";
pub const URI: &str = "uri";

#[derive(Debug)]
pub struct ItemKeeper {
    lower_bound: Thing,
    kept: BiMap<String, Thing>,
}

impl ItemKeeper {
    pub fn new() -> Self {
        Self {
            lower_bound: GENESIS,
            kept: BiMap::new(),
        }
    }
    // Items are never released, so handles stay stable for the life of the database.
    pub fn keep(&mut self, id: &str) -> (Thing, bool) {
        if let Some(thing) = self.kept.get_by_left(id) {
            return (*thing, true);
        }
        self.lower_bound += 1;
        self.kept.insert(id.to_string(), self.lower_bound);
        (self.lower_bound, false)
    }
    pub fn handle(&self, id: &str) -> Option<Thing> {
        self.kept.get_by_left(id).copied()
    }
    pub fn id(&self, thing: Thing) -> Option<&str> {
        self.kept.get_by_right(&thing).map(String::as_str)
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}

impl Default for ItemKeeper {
    fn default() -> Self {
        Self::new()
    }
}

// ------------- Property -------------
/// Declared metadata of a property, as found in data files.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDef {
    #[serde(default)]
    pub value_type: Option<ValueType>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub reverse_label: Option<String>,
    #[serde(default)]
    pub inverse: Option<String>,
}

#[derive(Debug)]
pub struct Property {
    id: String,
    // None until declared or inferred from the first fact
    value_type: Option<ValueType>,
    label: String,
    reverse_label: String,
    inverse: Option<String>,
    forward: HashMap<Thing, Vec<Value>, ThingHasher>,
    backward: HashMap<Value, ItemSet, OtherHasher>,
    fact_count: usize,
    // generation of the last change to the facts of this property
    modified: u64,
}

impl Property {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            value_type: None,
            label: id.to_string(),
            reverse_label: format!("reverse of {id}"),
            inverse: None,
            forward: HashMap::default(),
            backward: HashMap::default(),
            fact_count: 0,
            modified: 0,
        }
    }
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn value_type(&self) -> ValueType {
        self.value_type.unwrap_or(ValueType::Text)
    }
    pub fn label(&self) -> &str {
        &self.label
    }
    pub fn reverse_label(&self) -> &str {
        &self.reverse_label
    }
    pub fn inverse(&self) -> Option<&str> {
        self.inverse.as_deref()
    }
    pub fn fact_count(&self) -> usize {
        self.fact_count
    }
    /// Values of a subject in insertion order.
    pub fn values(&self, subject: Thing) -> &[Value] {
        self.forward.get(&subject).map(Vec::as_slice).unwrap_or(&[])
    }
    pub fn subjects(&self, value: &Value) -> Option<&ItemSet> {
        self.backward.get(value)
    }
    /// Each distinct value with the subjects holding it.
    pub fn value_subjects(&self) -> impl Iterator<Item = (&Value, &ItemSet)> {
        self.backward.iter()
    }
    /// Every subject holding at least one value.
    pub fn subject_handles(&self) -> impl Iterator<Item = Thing> + '_ {
        self.forward.keys().copied()
    }
    fn insert(&mut self, subject: Thing, value: Value) {
        self.backward.entry(value.clone()).or_default().insert(subject);
        self.forward.entry(subject).or_default().push(value);
        self.fact_count += 1;
    }
    fn remove(&mut self, subject: Thing, value: &Value) -> bool {
        let Entry::Occupied(mut entry) = self.forward.entry(subject) else {
            return false;
        };
        let Some(position) = entry.get().iter().position(|v| v == value) else {
            return false;
        };
        entry.get_mut().remove(position);
        let still_held = entry.get().contains(value);
        if entry.get().is_empty() {
            entry.remove();
        }
        if !still_held {
            if let Entry::Occupied(mut subjects) = self.backward.entry(value.clone()) {
                subjects.get_mut().remove(subject);
                if subjects.get().is_empty() {
                    subjects.remove();
                }
            }
        }
        self.fact_count -= 1;
        true
    }
}

// ------------- Facts -------------
/// One fact as handed over by an external loader.
#[derive(Debug, Clone)]
pub struct FactInput {
    pub item: String,
    pub property: String,
    pub value: Value,
    pub hint: Option<ValueType>,
}

impl FactInput {
    pub fn new(item: &str, property: &str, value: Value) -> Self {
        Self {
            item: item.to_string(),
            property: property.to_string(),
            value,
            hint: None,
        }
    }
    pub fn with_hint(mut self, hint: ValueType) -> Self {
        self.hint = Some(hint);
        self
    }
}

// ------------- Database -------------
// Holds items, properties and the facts between them. All index maintenance
// happens inside `&mut self` calls so readers never see one side of an update.
#[derive(Debug)]
pub struct Database {
    items: ItemKeeper,
    properties: HashMap<String, Property, OtherHasher>,
    // inverse identifier -> property identifier
    inverses: HashMap<String, String, OtherHasher>,
    // number of facts per subject
    subject_facts: HashMap<Thing, usize, ThingHasher>,
    all_items: ItemSet,
    // display labels of item types
    type_labels: HashMap<String, String, OtherHasher>,
    generation: u64,
    range_indexes: Mutex<HashMap<String, Arc<RangeIndex>, OtherHasher>>,
}

impl Database {
    pub fn new() -> Self {
        let mut database = Self {
            items: ItemKeeper::new(),
            properties: HashMap::default(),
            inverses: HashMap::default(),
            subject_facts: HashMap::default(),
            all_items: RoaringTreemap::new(),
            type_labels: HashMap::default(),
            generation: 0,
            range_indexes: Mutex::new(HashMap::default()),
        };
        // Reserve some properties that every faceted view relies on.
        for (id, value_type) in [(LABEL, ValueType::Text), (TYPE, ValueType::Text), (URI, ValueType::Url)] {
            let mut property = Property::new(id);
            property.value_type = Some(value_type);
            database.properties.insert(id.to_string(), property);
        }
        database
    }
    pub fn generation(&self) -> u64 {
        self.generation
    }
    fn bump(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    // ------------- Items -------------
    pub fn item_handle(&self, id: &str) -> Option<Thing> {
        self.items.handle(id)
    }
    pub fn item_id(&self, thing: Thing) -> Option<&str> {
        self.items.id(thing)
    }
    /// Items that are the subject of at least one fact.
    pub fn all_items(&self) -> &ItemSet {
        &self.all_items
    }
    /// Resolves identifiers to a set, silently skipping unknown ones.
    pub fn item_set<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> ItemSet {
        ids.into_iter().filter_map(|id| self.item_handle(id)).collect()
    }
    pub fn item_ids(&self, items: &ItemSet) -> Vec<String> {
        let mut ids: Vec<String> = items
            .iter()
            .filter_map(|thing| self.item_id(thing).map(str::to_string))
            .collect();
        ids.sort();
        ids
    }
    pub fn label_of(&self, id: &str) -> String {
        self.values(id, LABEL)
            .first()
            .map(Value::key)
            .unwrap_or_else(|| id.to_string())
    }

    // ------------- Properties -------------
    pub fn property(&self, id: &str) -> Option<&Property> {
        self.properties.get(id)
    }
    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }
    pub fn value_type(&self, id: &str) -> Option<ValueType> {
        self.property(id).map(Property::value_type)
    }
    pub fn label(&self, id: &str) -> Option<&str> {
        self.property(id).map(Property::label)
    }
    pub fn reverse_label(&self, id: &str) -> Option<&str> {
        self.property(id).map(Property::reverse_label)
    }
    /// Resolves a path step name to a property and direction. A name that is
    /// the declared inverse of a property walks that property backward.
    pub fn resolve_step(&self, name: &str) -> Option<(&Property, bool)> {
        if let Some(property) = self.properties.get(name) {
            return Some((property, true));
        }
        self.inverses
            .get(name)
            .and_then(|id| self.properties.get(id))
            .map(|property| (property, false))
    }
    pub fn declare_property(&mut self, id: &str, def: &PropertyDef) -> Result<()> {
        let generation = self.generation + 1;
        let property = self.properties.entry(id.to_string()).or_insert_with(|| Property::new(id));
        // retyping may fail, so it runs before any metadata changes
        if let Some(target) = def.value_type {
            if property.value_type != Some(target) {
                retype(property, target, &self.items)?;
                property.modified = generation;
            }
        }
        if let Some(label) = &def.label {
            property.label = label.clone();
        }
        if let Some(reverse_label) = &def.reverse_label {
            property.reverse_label = reverse_label.clone();
        }
        if let Some(inverse) = &def.inverse {
            if let Some(previous) = property.inverse.replace(inverse.clone()) {
                self.inverses.remove(&previous);
            }
            self.inverses.insert(inverse.clone(), id.to_string());
        }
        self.generation = generation;
        Ok(())
    }

    // ------------- Facts -------------
    pub fn add_fact(&mut self, item: &str, property: &str, value: Value) -> Result<()> {
        let item = item.trim();
        if item.is_empty() {
            return Err(FacetError::TypeMismatch {
                item: item.to_string(),
                property: property.to_string(),
                value: value.key(),
                expected: ValueType::Item,
            });
        }
        let target = self
            .properties
            .get(property)
            .and_then(|p| p.value_type)
            .unwrap_or_else(|| value.value_type());
        let Some(coerced) = value.coerce(target) else {
            return Err(FacetError::TypeMismatch {
                item: item.to_string(),
                property: property.to_string(),
                value: value.key(),
                expected: target,
            });
        };
        let (thing, _) = self.items.keep(item);
        let generation = self.bump();
        let kept = self
            .properties
            .entry(property.to_string())
            .or_insert_with(|| Property::new(property));
        kept.value_type = Some(target);
        kept.insert(thing, coerced);
        kept.modified = generation;
        *self.subject_facts.entry(thing).or_insert(0) += 1;
        self.all_items.insert(thing);
        Ok(())
    }
    /// Removes one occurrence of the fact. Returns false when it was not held.
    pub fn remove_fact(&mut self, item: &str, property: &str, value: &Value) -> bool {
        let Some(thing) = self.items.handle(item) else {
            return false;
        };
        let Some(kept) = self.properties.get_mut(property) else {
            return false;
        };
        let Some(coerced) = value.coerce(kept.value_type()) else {
            return false;
        };
        if !kept.remove(thing, &coerced) {
            return false;
        }
        self.generation += 1;
        kept.modified = self.generation;
        if let Entry::Occupied(mut count) = self.subject_facts.entry(thing) {
            *count.get_mut() -= 1;
            if *count.get() == 0 {
                count.remove();
                self.all_items.remove(thing);
            }
        }
        true
    }
    pub fn values(&self, item: &str, property: &str) -> &[Value] {
        match (self.items.handle(item), self.properties.get(property)) {
            (Some(thing), Some(p)) => p.values(thing),
            _ => &[],
        }
    }
    pub fn values_of(&self, thing: Thing, property: &str) -> &[Value] {
        self.properties.get(property).map(|p| p.values(thing)).unwrap_or(&[])
    }
    pub fn subjects(&self, property: &str, value: &Value) -> ItemSet {
        self.properties
            .get(property)
            .and_then(|p| value.coerce(p.value_type()).and_then(|v| p.subjects(&v).cloned()))
            .unwrap_or_default()
    }

    // ------------- Types -------------
    /// Gives the item a type, replacing the one it had.
    pub fn declare_type(&mut self, item: &str, type_id: &str) -> Result<()> {
        let previous: Vec<Value> = self.values(item, TYPE).to_vec();
        for value in &previous {
            self.remove_fact(item, TYPE, value);
        }
        self.add_fact(item, TYPE, Value::Text(type_id.to_string()))
    }
    pub fn type_of(&self, item: &str) -> Option<String> {
        self.values(item, TYPE).first().map(Value::key)
    }
    pub fn set_type_label(&mut self, type_id: &str, label: &str) {
        self.type_labels.insert(type_id.to_string(), label.to_string());
    }
    pub fn type_label(&self, type_id: &str) -> String {
        self.type_labels.get(type_id).cloned().unwrap_or_else(|| type_id.to_string())
    }
    pub fn items_of_type(&self, type_id: &str) -> ItemSet {
        self.subjects(TYPE, &Value::Text(type_id.to_string()))
    }

    // ------------- Batches -------------
    /// Adds every fact it can and returns the errors of those it could not.
    pub fn load_facts(&mut self, facts: impl IntoIterator<Item = FactInput>) -> Vec<FacetError> {
        let mut errors = Vec::new();
        let mut added = 0usize;
        for fact in facts {
            if let Some(hint) = fact.hint {
                let untyped = self.properties.get(&fact.property).is_none_or(|p| p.value_type.is_none());
                if untyped {
                    let def = PropertyDef { value_type: Some(hint), ..PropertyDef::default() };
                    if let Err(e) = self.declare_property(&fact.property, &def) {
                        errors.push(e);
                        continue;
                    }
                }
            }
            match self.add_fact(&fact.item, &fact.property, fact.value) {
                Ok(()) => added += 1,
                Err(e) => {
                    warn!(error = %e, "fact rejected");
                    errors.push(e);
                }
            }
        }
        info!(added, rejected = errors.len(), "facts loaded");
        errors
    }

    // ------------- Range indexes -------------
    /// The range index of a number or date property, rebuilt when its facts changed.
    pub fn range_index(&self, id: &str) -> Option<Arc<RangeIndex>> {
        let property = self.properties.get(id)?;
        if !property.value_type().is_orderable() {
            return None;
        }
        let mut cache = self.range_indexes.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = cache.get(id) {
            if index.generation() == property.modified {
                return Some(Arc::clone(index));
            }
        }
        debug!(property = id, facts = property.fact_count, "building range index");
        let index = Arc::new(RangeIndex::build(
            property.subject_handles().collect::<Vec<_>>(),
            property.modified,
            |thing| property.values(thing).iter().filter_map(Value::sort_key).collect(),
        ));
        cache.insert(id.to_string(), Arc::clone(&index));
        Some(index)
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

// Converts every value of a property to a new type, all or nothing.
fn retype(property: &mut Property, target: ValueType, items: &ItemKeeper) -> Result<()> {
    let mut converted: Vec<(Thing, Vec<Value>)> = Vec::with_capacity(property.forward.len());
    for (thing, values) in &property.forward {
        let mut coerced = Vec::with_capacity(values.len());
        for value in values {
            match value.coerce(target) {
                Some(v) => coerced.push(v),
                None => {
                    return Err(FacetError::TypeMismatch {
                        item: items.id(*thing).unwrap_or_default().to_string(),
                        property: property.id.clone(),
                        value: value.key(),
                        expected: target,
                    });
                }
            }
        }
        converted.push((*thing, coerced));
    }
    property.forward.clear();
    property.backward.clear();
    property.fact_count = 0;
    for (thing, values) in converted {
        for value in values {
            property.insert(thing, value);
        }
    }
    property.value_type = Some(target);
    Ok(())
}
