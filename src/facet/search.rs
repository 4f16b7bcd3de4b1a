use std::collections::HashMap;

use tracing::debug;

use crate::database::{Database, ItemSet, Thing, ThingHasher};
use crate::datatype::ValueType;
use crate::error::Result;
use crate::expression::Expression;

use super::{FacetState, FacetView, Filtered};

/// Substring search over the text of each item.
#[derive(Debug)]
pub struct SearchFacet {
    // without one, every text, url and item value of the item is searched
    expression: Option<Expression>,
    text: Option<String>,
    cache: HashMap<Thing, String, ThingHasher>,
    stamp: Option<(u64, u64)>,
}

/// Trimmed and lower-cased, `None` when nothing is left.
pub fn normalize(text: &str) -> Option<String> {
    let text = text.trim().to_lowercase();
    (!text.is_empty()).then_some(text)
}

impl SearchFacet {
    pub fn new(expression: Option<Expression>) -> Self {
        Self {
            expression,
            text: None,
            cache: HashMap::default(),
            stamp: None,
        }
    }
    pub fn expression(&self) -> Option<&Expression> {
        self.expression.as_ref()
    }
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
    pub fn has_restrictions(&self) -> bool {
        self.text.is_some()
    }
    pub fn set_text(&mut self, text: Option<&str>) -> bool {
        let text = text.and_then(normalize);
        std::mem::replace(&mut self.text, text.clone()) != text
    }
    pub(crate) fn clear(&mut self) {
        self.text = None;
    }
    pub(crate) fn export_state(&self) -> FacetState {
        FacetState::Search { text: self.text.clone() }
    }

    /// The lower-cased text searched for one item.
    pub fn item_text(&self, thing: Thing, database: &Database) -> Result<String> {
        let mut parts: Vec<String> = match &self.expression {
            Some(expression) => expression.evaluate_thing(thing, database)?.keys(),
            None => database
                .properties()
                .filter(|p| matches!(p.value_type(), ValueType::Text | ValueType::Url | ValueType::Item))
                .flat_map(|p| p.values(thing).iter().map(|v| v.key()))
                .collect(),
        };
        parts.sort();
        Ok(parts.join("\n").to_lowercase())
    }

    // Texts are only gathered once a search is set, and again when the root
    // set or the store changed.
    pub(crate) fn prepare(&mut self, root: &ItemSet, stamp: (u64, u64), database: &Database) {
        if self.text.is_none() || self.stamp == Some(stamp) {
            return;
        }
        let mut cache = HashMap::default();
        let mut failed = 0usize;
        for thing in root.iter() {
            match self.item_text(thing, database) {
                Ok(text) => {
                    cache.insert(thing, text);
                }
                Err(_) => failed += 1,
            }
        }
        debug!(items = cache.len(), failed, "search texts cached");
        self.cache = cache;
        self.stamp = Some(stamp);
    }
    fn matches(&self, thing: Thing, query: &str, database: &Database) -> Result<bool> {
        // items that failed while caching fail again here
        match self.cache.get(&thing) {
            Some(text) => Ok(text.contains(query)),
            None => Ok(self.item_text(thing, database)?.contains(query)),
        }
    }
    pub(crate) fn restrict(&self, candidates: &ItemSet, database: &Database) -> Filtered {
        let mut filtered = Filtered::default();
        let Some(query) = &self.text else {
            filtered.matched = candidates.clone();
            return filtered;
        };
        for thing in candidates.iter() {
            match self.matches(thing, query, database) {
                Ok(true) => {
                    filtered.matched.insert(thing);
                }
                Ok(false) => {}
                Err(_) => {
                    filtered.unprocessed.insert(thing);
                }
            }
        }
        filtered
    }
    pub(crate) fn update(&self, others: &ItemSet, database: &Database) -> FacetView {
        FacetView::Search {
            text: self.text.clone(),
            matches: self.restrict(others, database).matched.len(),
        }
    }
}
