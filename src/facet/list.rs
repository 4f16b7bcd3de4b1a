use std::collections::{BTreeSet, HashMap};

use crate::database::{Database, ItemSet, OtherHasher};
use crate::datatype::Value;
use crate::expression::Expression;

use super::{Choice, FacetState, FacetView, Filtered};

/// Discrete values, any number of which can be selected.
#[derive(Debug)]
pub struct ListFacet {
    expression: Expression,
    selection: BTreeSet<String>,
    // also let through items without any value
    missing: bool,
    missing_label: String,
}

impl ListFacet {
    pub fn new(expression: Expression, missing_label: &str) -> Self {
        Self {
            expression,
            selection: BTreeSet::new(),
            missing: false,
            missing_label: missing_label.to_string(),
        }
    }
    pub fn expression(&self) -> &Expression {
        &self.expression
    }
    pub fn selection(&self) -> impl Iterator<Item = &str> {
        self.selection.iter().map(String::as_str)
    }
    pub fn missing_selected(&self) -> bool {
        self.missing
    }
    pub fn has_restrictions(&self) -> bool {
        !self.selection.is_empty() || self.missing
    }
    pub fn select(&mut self, key: &str) -> bool {
        self.selection.insert(key.to_string())
    }
    pub fn deselect(&mut self, key: &str) -> bool {
        self.selection.remove(key)
    }
    pub fn set_selection(&mut self, keys: impl IntoIterator<Item = String>) {
        self.selection = keys.into_iter().collect();
    }
    pub fn set_missing(&mut self, missing: bool) -> bool {
        std::mem::replace(&mut self.missing, missing) != missing
    }
    pub(crate) fn clear(&mut self) {
        self.selection.clear();
        self.missing = false;
    }
    pub(crate) fn export_state(&self) -> FacetState {
        FacetState::List {
            selection: self.selection.iter().cloned().collect(),
            missing: self.missing,
        }
    }

    pub(crate) fn restrict(&self, candidates: &ItemSet, database: &Database) -> Filtered {
        let mut filtered = Filtered::default();
        // a plain path is walked backward from the selected values
        if let Some(path) = self.expression.as_path().filter(|_| !self.missing) {
            let targets: Vec<Value> = self.selection.iter().map(|key| Value::Text(key.clone())).collect();
            filtered.matched = path.walk_backward(&targets, candidates, database);
            return filtered;
        }
        for thing in candidates.iter() {
            match self.expression.evaluate_thing(thing, database) {
                Ok(values) => {
                    let hit = if values.is_empty() {
                        self.missing
                    } else {
                        values.iter().any(|value| self.selection.contains(&value.key()))
                    };
                    if hit {
                        filtered.matched.insert(thing);
                    }
                }
                Err(_) => {
                    filtered.unprocessed.insert(thing);
                }
            }
        }
        filtered
    }

    pub(crate) fn update(&self, others: &ItemSet, database: &Database) -> FacetView {
        // key -> (a value with that key, number of items)
        let mut counts: HashMap<String, (Value, u64), OtherHasher> = HashMap::default();
        let mut missing = 0u64;
        let property = self.expression.as_path().and_then(|path| path.forward_property(database));
        if let Some(property) = property {
            let mut holding = ItemSet::new();
            for (value, subjects) in property.value_subjects() {
                let within = subjects & others;
                if !within.is_empty() {
                    holding |= &within;
                    let entry = counts.entry(value.key()).or_insert_with(|| (value.clone(), 0));
                    entry.1 += within.len();
                }
            }
            missing = others.len() - holding.len();
        } else {
            for thing in others.iter() {
                let Ok(values) = self.expression.evaluate_thing(thing, database) else {
                    continue;
                };
                if values.is_empty() {
                    missing += 1;
                }
                let mut seen: HashMap<String, Value, OtherHasher> = HashMap::default();
                for value in values {
                    seen.entry(value.key()).or_insert(value);
                }
                for (key, value) in seen {
                    counts.entry(key).or_insert_with(|| (value, 0)).1 += 1;
                }
            }
        }
        for key in &self.selection {
            counts
                .entry(key.clone())
                .or_insert_with(|| (Value::Text(key.clone()), 0));
        }
        let mut entries: Vec<(Value, Choice)> = counts
            .into_iter()
            .map(|(key, (value, count))| {
                let label = match &value {
                    Value::Item(id) => database.label_of(id),
                    _ => key.clone(),
                };
                let selected = self.selection.contains(&key);
                (value, Choice { key, label, count, selected })
            })
            .collect();
        entries.sort_by(|(a, x), (b, y)| match (a, b) {
            (Value::Item(_), Value::Item(_)) => x.label.cmp(&y.label).then_with(|| x.key.cmp(&y.key)),
            _ => a.compare(b).then_with(|| x.key.cmp(&y.key)),
        });
        FacetView::List {
            choices: entries.into_iter().map(|(_, choice)| choice).collect(),
            missing: Choice {
                key: String::new(),
                label: self.missing_label.clone(),
                count: missing,
                selected: self.missing,
            },
        }
    }
}
