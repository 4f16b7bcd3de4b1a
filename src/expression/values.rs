use std::collections::HashSet;

use crate::database::{Database, ItemSet, OtherHasher};
use crate::datatype::{Value, ValueType};

/// The deduplicated, typed outcome of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionCollection {
    values: HashSet<Value, OtherHasher>,
    value_type: ValueType,
}

impl ExpressionCollection {
    pub fn empty(value_type: ValueType) -> Self {
        Self { values: HashSet::default(), value_type }
    }
    pub fn single(value: Value) -> Self {
        let value_type = value.value_type();
        let mut values = HashSet::default();
        values.insert(value);
        Self { values, value_type }
    }
    pub fn from_values(value_type: ValueType, values: impl IntoIterator<Item = Value>) -> Self {
        let mut collection = Self::empty(value_type);
        for value in values {
            collection.add(value);
        }
        collection
    }
    /// The items of a set as item values.
    pub fn from_items(items: &ItemSet, database: &Database) -> Self {
        Self::from_values(
            ValueType::Item,
            items.iter().filter_map(|thing| database.item_id(thing)).map(|id| Value::Item(id.to_string())),
        )
    }
    pub fn boolean(b: bool) -> Self {
        Self::single(Value::Boolean(b))
    }
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }
    // Mixed collections fall back to text.
    pub fn add(&mut self, value: Value) {
        if value.value_type() != self.value_type {
            self.value_type = if self.is_empty() { value.value_type() } else { ValueType::Text };
        }
        self.values.insert(value);
    }
    pub fn union(&mut self, other: ExpressionCollection) {
        if !other.is_empty() && other.value_type != self.value_type {
            self.value_type = if self.is_empty() { other.value_type } else { ValueType::Text };
        }
        self.values.extend(other.values);
    }
    pub fn contains(&self, value: &Value) -> bool {
        self.values.contains(value)
    }
    pub fn size(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    pub fn for_each(&self, mut visit: impl FnMut(&Value)) {
        for value in &self.values {
            visit(value);
        }
    }
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }
    /// A collection counts as true when it holds boolean `true`.
    pub fn truthy(&self) -> bool {
        self.values.iter().any(Value::is_true)
    }
    /// Values in type-aware order.
    pub fn sorted(&self) -> Vec<Value> {
        let mut values: Vec<Value> = self.values.iter().cloned().collect();
        values.sort_by(|a, b| a.compare(b));
        values
    }
    pub fn keys(&self) -> Vec<String> {
        self.sorted().iter().map(Value::key).collect()
    }
    /// Handles of the item values known to the database.
    pub fn items(&self, database: &Database) -> ItemSet {
        self.values
            .iter()
            .filter_map(|value| match value {
                Value::Item(id) => database.item_handle(id),
                _ => None,
            })
            .collect()
    }
}

impl IntoIterator for ExpressionCollection {
    type Item = Value;
    type IntoIter = std::collections::hash_set::IntoIter<Value>;
    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}
