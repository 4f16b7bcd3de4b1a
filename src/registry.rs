use std::collections::HashMap;

use crate::database::OtherHasher;
use crate::error::{FacetError, Result};
use crate::facet::FacetId;

/// Maps the names facets are configured under to their handles.
/// Lookups fail instead of handing back nothing.
#[derive(Debug, Default)]
pub struct Registry {
    named: HashMap<String, FacetId, OtherHasher>,
    // registration order
    names: Vec<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn register(&mut self, name: &str, id: FacetId) -> Result<()> {
        if self.named.contains_key(name) {
            return Err(FacetError::Invariant(format!("facet {name} is already registered")));
        }
        self.named.insert(name.to_string(), id);
        self.names.push(name.to_string());
        Ok(())
    }
    pub fn get(&self, name: &str) -> Option<FacetId> {
        self.named.get(name).copied()
    }
    pub fn lookup(&self, name: &str) -> Result<FacetId> {
        self.get(name).ok_or_else(|| FacetError::UnknownFacet(name.to_string()))
    }
    pub fn contains(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
    pub fn len(&self) -> usize {
        self.names.len()
    }
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
