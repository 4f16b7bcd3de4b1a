//! The collection folds every facet over a root item set.
//!
//! The restricted set is `root ∩ match(facet_0) ∩ ... ∩ match(facet_n-1)`,
//! where each match set is what the facet lets through of the root. Because
//! facets filter item by item the order of the fold does not matter. For
//! every facet the collection also keeps its "others" set, the root narrowed
//! by every facet except that one, which is what the facet counts its
//! choices against. These come from prefix and suffix intersections:
//!
//! ```text
//! P[0] = root          P[i+1] = P[i] ∩ M[i]
//! S[n] = root          S[i]   = S[i+1] ∩ M[i]
//! others[i] = P[i] ∩ S[i+1]
//! ```
//!
//! so a recomputation costs O(F) intersections rather than O(F²).
//!
//! All mutation goes through the collection. Listeners run synchronously
//! once per recomputation and may only defer further facet changes, which
//! are applied in bounded follow-up rounds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::database::{Database, ItemSet};
use crate::error::{FacetError, Result};
use crate::facet::{
    Facet, FacetConfig, FacetId, FacetKind, FacetState, FacetView, ListFacet, NumericFacet, SearchFacet, SliderFacet,
    SliderRange,
};
use crate::registry::Registry;

// ------------- Root -------------
/// The items a collection starts from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ids", rename_all = "lowercase")]
pub enum Root {
    /// Every item that is the subject of a fact.
    All,
    /// Items of any of the given types.
    Types(Vec<String>),
    /// Exactly these items, as far as the store knows them.
    Items(Vec<String>),
}

impl Root {
    pub fn resolve(&self, database: &Database) -> ItemSet {
        match self {
            Root::All => database.all_items().clone(),
            Root::Types(types) => {
                let mut items = ItemSet::new();
                for type_id in types {
                    items |= database.items_of_type(type_id);
                }
                items
            }
            Root::Items(ids) => database.item_set(ids.iter().map(String::as_str)),
        }
    }
}

/// Exported restrictions of every facet, keyed by facet name.
pub type CollectionState = BTreeMap<String, FacetState>;

// ------------- Notification -------------
/// Handed to listeners after the restricted set was recomputed.
pub struct ItemsChanged<'c> {
    collection: &'c Collection,
    round: usize,
    deferred: Vec<(FacetId, FacetState)>,
}

impl<'c> ItemsChanged<'c> {
    pub fn collection(&self) -> &'c Collection {
        self.collection
    }
    /// 1 for the change itself, higher for rounds caused by deferred changes.
    pub fn round(&self) -> usize {
        self.round
    }
    /// Asks for a facet state to be imported once every listener has run.
    pub fn defer(&mut self, id: FacetId, state: FacetState) {
        self.deferred.push((id, state));
    }
}

pub type Listener = Box<dyn FnMut(&mut ItemsChanged<'_>)>;

// ------------- Collection -------------
pub struct Collection {
    root: Root,
    root_items: ItemSet,
    // bumped whenever the root set changes, facets key their caches on it
    root_generation: u64,
    // store generation at the last recomputation
    seen_generation: u64,
    facets: Vec<Facet>,
    registry: Registry,
    matched: Vec<ItemSet>,
    unprocessed: Vec<ItemSet>,
    others: Vec<ItemSet>,
    restricted: ItemSet,
    listeners: Vec<Listener>,
    batch_depth: usize,
    dirty: bool,
    notifications: u64,
    settings: Settings,
}

impl Collection {
    pub fn new(root: Root, database: &Database) -> Self {
        Self::with_settings(root, Settings::default(), database)
    }
    pub fn with_settings(root: Root, settings: Settings, database: &Database) -> Self {
        let root_items = root.resolve(database);
        Self {
            root,
            restricted: root_items.clone(),
            root_items,
            root_generation: 1,
            seen_generation: database.generation(),
            facets: Vec::new(),
            registry: Registry::new(),
            matched: Vec::new(),
            unprocessed: Vec::new(),
            others: Vec::new(),
            listeners: Vec::new(),
            batch_depth: 0,
            dirty: false,
            notifications: 0,
            settings,
        }
    }
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ------------- Reading -------------
    pub fn root(&self) -> &Root {
        &self.root
    }
    pub fn root_items(&self) -> &ItemSet {
        &self.root_items
    }
    pub fn restricted_items(&self) -> &ItemSet {
        &self.restricted
    }
    pub fn count_restricted_items(&self) -> u64 {
        self.restricted.len()
    }
    /// Number of notification rounds fired so far.
    pub fn notifications(&self) -> u64 {
        self.notifications
    }
    fn slot(&self, id: FacetId) -> Result<usize> {
        if id.0 < self.facets.len() {
            Ok(id.0)
        } else {
            Err(FacetError::UnknownFacet(id.to_string()))
        }
    }
    pub fn facet_id(&self, name: &str) -> Result<FacetId> {
        self.registry.lookup(name)
    }
    pub fn facet(&self, id: FacetId) -> Result<&Facet> {
        Ok(&self.facets[self.slot(id)?])
    }
    pub fn facets(&self) -> impl Iterator<Item = (FacetId, &Facet)> {
        self.facets.iter().enumerate().map(|(i, facet)| (FacetId(i), facet))
    }
    /// The root narrowed by every facet except this one.
    pub fn others(&self, id: FacetId) -> Result<&ItemSet> {
        let slot = self.slot(id)?;
        self.others
            .get(slot)
            .ok_or_else(|| FacetError::Invariant(format!("facet {id} has not been computed")))
    }
    /// Root items the facet's expression could not be evaluated on.
    pub fn unprocessed_items(&self, id: FacetId) -> Result<&ItemSet> {
        let slot = self.slot(id)?;
        self.unprocessed
            .get(slot)
            .ok_or_else(|| FacetError::Invariant(format!("facet {id} has not been computed")))
    }
    /// Choices and counts of a facet given the current restrictions of the others.
    pub fn update(&self, id: FacetId, database: &Database) -> Result<FacetView> {
        let slot = self.slot(id)?;
        Ok(self.facets[slot].update(self.others(id)?, database))
    }

    // ------------- Facets -------------
    /// Builds and registers a facet. Nothing is registered when it fails.
    pub fn add_facet(&mut self, config: &FacetConfig, database: &Database) -> Result<FacetId> {
        let facet = Facet::from_config(config, &self.settings)?;
        self.insert_facet(facet, database)
    }
    pub fn insert_facet(&mut self, facet: Facet, database: &Database) -> Result<FacetId> {
        let id = FacetId(self.facets.len());
        self.registry.register(facet.id(), id)?;
        info!(facet = facet.id(), handle = %id, "facet added");
        let restricting = facet.has_restrictions();
        self.facets.push(facet);
        if restricting {
            self.changed(database);
        } else {
            self.recompute(database);
        }
        Ok(id)
    }
    pub fn on_items_changed(&mut self, listener: impl FnMut(&mut ItemsChanged<'_>) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    // ------------- Mutation -------------
    /// Runs a change against one facet, recomputing and notifying when it reports one.
    pub fn modify(
        &mut self,
        id: FacetId,
        database: &Database,
        change: impl FnOnce(&mut Facet) -> Result<bool>,
    ) -> Result<bool> {
        let slot = self.slot(id)?;
        let changed = change(&mut self.facets[slot])?;
        if changed {
            debug!(facet = self.facets[slot].id(), "restriction changed");
            self.changed(database);
        }
        Ok(changed)
    }
    pub fn select(&mut self, id: FacetId, key: &str, database: &Database) -> Result<bool> {
        self.modify(id, database, |facet| Ok(list(facet)?.select(key)))
    }
    pub fn deselect(&mut self, id: FacetId, key: &str, database: &Database) -> Result<bool> {
        self.modify(id, database, |facet| Ok(list(facet)?.deselect(key)))
    }
    pub fn select_missing(&mut self, id: FacetId, missing: bool, database: &Database) -> Result<bool> {
        self.modify(id, database, |facet| {
            if let FacetKind::Slider(slider) = facet.kind_mut() {
                return Ok(slider.set_missing(missing));
            }
            Ok(list(facet)?.set_missing(missing))
        })
    }
    pub fn select_range(&mut self, id: FacetId, from: f64, to: f64, database: &Database) -> Result<bool> {
        self.modify(id, database, |facet| Ok(numeric(facet)?.select_range(from, to)))
    }
    pub fn deselect_range(&mut self, id: FacetId, from: f64, to: f64, database: &Database) -> Result<bool> {
        self.modify(id, database, |facet| Ok(numeric(facet)?.deselect_range(from, to)))
    }
    pub fn set_slider(&mut self, id: FacetId, range: Option<SliderRange>, database: &Database) -> Result<bool> {
        self.modify(id, database, |facet| Ok(slider(facet)?.set_range(range)))
    }
    pub fn set_search(&mut self, id: FacetId, text: Option<&str>, database: &Database) -> Result<bool> {
        self.modify(id, database, |facet| Ok(search(facet)?.set_text(text)))
    }
    /// Replaces the facet's restriction with `state`.
    pub fn apply_restrictions(&mut self, id: FacetId, state: FacetState, database: &Database) -> Result<bool> {
        self.modify(id, database, |facet| facet.import_state(state))
    }
    pub fn clear_all_restrictions(&mut self, id: FacetId, database: &Database) -> Result<bool> {
        self.modify(id, database, |facet| Ok(facet.clear_all_restrictions()))
    }
    /// Clears every facet with a single notification.
    pub fn clear_everything(&mut self, database: &Database) -> bool {
        let mut changed = false;
        for facet in &mut self.facets {
            changed |= facet.clear_all_restrictions();
        }
        if changed {
            self.changed(database);
        }
        changed
    }
    /// Groups several changes into one recomputation and one notification.
    /// Reads inside the batch see the state from before it.
    pub fn batch<R>(&mut self, database: &Database, changes: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        self.batch_depth += 1;
        let result = changes(self);
        self.batch_depth -= 1;
        if self.batch_depth == 0 && std::mem::take(&mut self.dirty) {
            self.recompute(database);
            self.notify(database);
        }
        result
    }

    // ------------- Root -------------
    pub fn set_root(&mut self, root: Root, database: &Database) -> bool {
        let items = root.resolve(database);
        self.root = root;
        if items == self.root_items {
            return false;
        }
        self.root_items = items;
        self.root_generation += 1;
        self.changed(database);
        true
    }
    /// Catches up with changes in the store.
    pub fn refresh(&mut self, database: &Database) -> bool {
        let items = self.root.resolve(database);
        let moved = items != self.root_items;
        if moved {
            self.root_items = items;
            self.root_generation += 1;
        }
        if moved || database.generation() != self.seen_generation {
            self.changed(database);
            return true;
        }
        false
    }

    // ------------- History -------------
    pub fn export_state(&self) -> CollectionState {
        self.facets
            .iter()
            .map(|facet| (facet.id().to_string(), facet.export_state()))
            .collect()
    }
    /// Applies exported restrictions. Facets missing from `state` keep theirs.
    /// Nothing is applied when any entry names an unknown facet or does not fit it.
    pub fn import_state(&mut self, state: CollectionState, database: &Database) -> Result<bool> {
        let mut resolved = Vec::with_capacity(state.len());
        for (name, facet_state) in state {
            let slot = self.facet_id(&name)?.0;
            if self.facets[slot].export_state().kind() != facet_state.kind() {
                return Err(FacetError::Invariant(format!(
                    "{} state does not fit facet {name}",
                    facet_state.kind()
                )));
            }
            resolved.push((slot, facet_state));
        }
        let mut changed = false;
        for (slot, facet_state) in resolved {
            changed |= self.facets[slot].import_state(facet_state)?;
        }
        if changed {
            self.changed(database);
        }
        Ok(changed)
    }

    // ------------- Recomputation -------------
    fn changed(&mut self, database: &Database) {
        if self.batch_depth > 0 {
            self.dirty = true;
            return;
        }
        self.recompute(database);
        self.notify(database);
    }
    fn recompute(&mut self, database: &Database) {
        let stamp = (self.root_generation, database.generation());
        for facet in &mut self.facets {
            facet.prepare(&self.root_items, stamp, database);
        }
        let count = self.facets.len();
        self.matched.clear();
        self.unprocessed.clear();
        for facet in &self.facets {
            let filtered = facet.restrict(&self.root_items, database);
            self.matched.push(filtered.matched);
            self.unprocessed.push(filtered.unprocessed);
        }
        let mut prefix = Vec::with_capacity(count + 1);
        prefix.push(self.root_items.clone());
        for (i, matched) in self.matched.iter().enumerate() {
            let next = &prefix[i] & matched;
            prefix.push(next);
        }
        let mut suffix = vec![ItemSet::new(); count + 1];
        suffix[count] = self.root_items.clone();
        for i in (0..count).rev() {
            suffix[i] = &suffix[i + 1] & &self.matched[i];
        }
        self.others = (0..count).map(|i| &prefix[i] & &suffix[i + 1]).collect();
        self.restricted = prefix.pop().unwrap_or_default();
        self.seen_generation = database.generation();
        debug!(
            facets = count,
            root = self.root_items.len(),
            restricted = self.restricted.len(),
            "restrictions recomputed"
        );
    }
    fn notify(&mut self, database: &Database) {
        let mut round = 0;
        loop {
            round += 1;
            self.notifications += 1;
            let mut listeners = std::mem::take(&mut self.listeners);
            let mut deferred = Vec::new();
            for listener in listeners.iter_mut() {
                let mut notice = ItemsChanged { collection: self, round, deferred: Vec::new() };
                listener(&mut notice);
                deferred.append(&mut notice.deferred);
            }
            self.listeners = listeners;
            debug!(round, listeners = self.listeners.len(), deferred = deferred.len(), "items changed");
            if deferred.is_empty() {
                break;
            }
            if round >= self.settings.max_notification_rounds {
                warn!(round, dropped = deferred.len(), "deferred facet changes dropped");
                break;
            }
            let mut changed = false;
            for (id, state) in deferred {
                match self.facets.get_mut(id.0) {
                    Some(facet) => match facet.import_state(state) {
                        Ok(c) => changed |= c,
                        Err(e) => warn!(error = %e, "deferred facet change rejected"),
                    },
                    None => warn!(facet = %id, "deferred change for an unknown facet"),
                }
            }
            if !changed {
                break;
            }
            self.recompute(database);
        }
    }
}

fn kind_error(name: &str, wanted: &str) -> FacetError {
    FacetError::Invariant(format!("facet {name} is not a {wanted} facet"))
}

fn list(facet: &mut Facet) -> Result<&mut ListFacet> {
    let name = facet.id().to_string();
    match facet.kind_mut() {
        FacetKind::List(list) => Ok(list),
        _ => Err(kind_error(&name, "list")),
    }
}

fn numeric(facet: &mut Facet) -> Result<&mut NumericFacet> {
    let name = facet.id().to_string();
    match facet.kind_mut() {
        FacetKind::Numeric(numeric) => Ok(numeric),
        _ => Err(kind_error(&name, "numeric")),
    }
}

fn slider(facet: &mut Facet) -> Result<&mut SliderFacet> {
    let name = facet.id().to_string();
    match facet.kind_mut() {
        FacetKind::Slider(slider) => Ok(slider),
        _ => Err(kind_error(&name, "slider")),
    }
}

fn search(facet: &mut Facet) -> Result<&mut SearchFacet> {
    let name = facet.id().to_string();
    match facet.kind_mut() {
        FacetKind::Search(search) => Ok(search),
        _ => Err(kind_error(&name, "search")),
    }
}
