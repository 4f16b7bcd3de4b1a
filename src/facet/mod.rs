//! Facets narrow a collection by a predicate over an expression's values.
//!
//! Every facet kind follows the same contract: `restrict` filters a candidate
//! set given the current selection, `update` reports choices and counts over
//! the items the other facets leave, and the selection round-trips through
//! [`FacetState`]. Facets are held by the [`crate::collection::Collection`],
//! which is the only thing that mutates them.

pub mod list;
pub mod numeric;
pub mod search;
pub mod slider;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::database::{Database, ItemSet};
use crate::error::{FacetError, Result};
use crate::expression::Expression;

pub use list::ListFacet;
pub use numeric::NumericFacet;
pub use search::SearchFacet;
pub use slider::SliderFacet;

// ------------- FacetId -------------
/// Handle of a facet inside the collection that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FacetId(pub(crate) usize);

impl FacetId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for FacetId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ------------- State -------------
/// A `[from, to)` bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketRange {
    pub from: f64,
    pub to: f64,
}

/// A closed `[min, max]` interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliderRange {
    pub min: f64,
    pub max: f64,
}

/// The restriction of one facet, as exported for history or bookmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FacetState {
    List {
        #[serde(default)]
        selection: Vec<String>,
        #[serde(default)]
        missing: bool,
    },
    Numeric {
        #[serde(default)]
        ranges: Vec<BucketRange>,
    },
    Slider {
        #[serde(default)]
        range: Option<SliderRange>,
        #[serde(default)]
        missing: bool,
    },
    Search {
        #[serde(default)]
        text: Option<String>,
    },
}

impl FacetState {
    pub fn kind(&self) -> &'static str {
        match self {
            FacetState::List { .. } => "list",
            FacetState::Numeric { .. } => "numeric",
            FacetState::Slider { .. } => "slider",
            FacetState::Search { .. } => "search",
        }
    }
}

// ------------- Config -------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum KindConfig {
    List,
    Numeric {
        // fixed bucket width, auto-scaled when absent
        #[serde(default)]
        interval: Option<f64>,
    },
    Slider,
    Search,
}

/// Declarative description of a facet, as read from a facets file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetConfig {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(flatten)]
    pub kind: KindConfig,
    #[serde(default)]
    pub state: Option<FacetState>,
}

impl FacetConfig {
    pub fn list(id: &str, expression: &str) -> Self {
        Self::new(id, Some(expression), KindConfig::List)
    }
    pub fn numeric(id: &str, expression: &str, interval: Option<f64>) -> Self {
        Self::new(id, Some(expression), KindConfig::Numeric { interval })
    }
    pub fn slider(id: &str, expression: &str) -> Self {
        Self::new(id, Some(expression), KindConfig::Slider)
    }
    pub fn search(id: &str, expression: Option<&str>) -> Self {
        Self::new(id, expression, KindConfig::Search)
    }
    fn new(id: &str, expression: Option<&str>, kind: KindConfig) -> Self {
        Self {
            id: id.to_string(),
            label: None,
            expression: expression.map(str::to_string),
            kind,
            state: None,
        }
    }
}

// ------------- Views -------------
/// One selectable value of a list facet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Choice {
    pub key: String,
    pub label: String,
    pub count: u64,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub from: f64,
    pub to: f64,
    pub count: u64,
    pub selected: bool,
}

/// What a facet displays, computed against the items the other facets leave.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FacetView {
    List {
        choices: Vec<Choice>,
        missing: Choice,
    },
    Numeric {
        interval: f64,
        buckets: Vec<Bucket>,
        missing: u64,
    },
    Slider {
        domain: Option<SliderRange>,
        selected: Option<SliderRange>,
        missing: u64,
    },
    Search {
        text: Option<String>,
        matches: u64,
    },
}

/// Result of restricting a candidate set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filtered {
    pub matched: ItemSet,
    // candidates the expression could not be evaluated on
    pub unprocessed: ItemSet,
}

// ------------- Facet -------------
#[derive(Debug)]
pub enum FacetKind {
    List(ListFacet),
    Numeric(NumericFacet),
    Slider(SliderFacet),
    Search(SearchFacet),
}

#[derive(Debug)]
pub struct Facet {
    id: String,
    label: String,
    kind: FacetKind,
}

impl Facet {
    pub fn new(id: &str, label: &str, kind: FacetKind) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            kind,
        }
    }
    /// Builds a facet from its configuration. Expression errors surface here,
    /// before the facet takes part in any restriction.
    pub fn from_config(config: &FacetConfig, settings: &Settings) -> Result<Self> {
        let expression = match &config.expression {
            Some(text) => Some(Expression::parse(text)?),
            None => None,
        };
        let required = || expression.clone().ok_or_else(|| FacetError::syntax(0, "an expression"));
        let kind = match &config.kind {
            KindConfig::List => FacetKind::List(ListFacet::new(required()?, &settings.missing_label)),
            KindConfig::Numeric { interval } => {
                if interval.is_some_and(|i| !(i.is_finite() && i > 0.0)) {
                    return Err(FacetError::Config(format!("facet {}: interval must be positive", config.id)));
                }
                FacetKind::Numeric(NumericFacet::new(required()?, *interval, settings.min_buckets, settings.max_buckets))
            }
            KindConfig::Slider => FacetKind::Slider(SliderFacet::new(required()?)),
            KindConfig::Search => FacetKind::Search(SearchFacet::new(expression.clone())),
        };
        let label = config.label.clone().unwrap_or_else(|| config.id.clone());
        let mut facet = Facet::new(&config.id, &label, kind);
        if let Some(state) = &config.state {
            facet.import_state(state.clone())?;
        }
        Ok(facet)
    }
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn label(&self) -> &str {
        &self.label
    }
    pub fn kind(&self) -> &FacetKind {
        &self.kind
    }
    pub fn kind_mut(&mut self) -> &mut FacetKind {
        &mut self.kind
    }
    pub fn expression(&self) -> Option<&Expression> {
        match &self.kind {
            FacetKind::List(f) => Some(f.expression()),
            FacetKind::Numeric(f) => Some(f.expression()),
            FacetKind::Slider(f) => Some(f.expression()),
            FacetKind::Search(f) => f.expression(),
        }
    }

    pub fn has_restrictions(&self) -> bool {
        match &self.kind {
            FacetKind::List(f) => f.has_restrictions(),
            FacetKind::Numeric(f) => f.has_restrictions(),
            FacetKind::Slider(f) => f.has_restrictions(),
            FacetKind::Search(f) => f.has_restrictions(),
        }
    }
    /// Refreshes per-root caches. `stamp` changes whenever the root set or
    /// the store does.
    pub fn prepare(&mut self, root: &ItemSet, stamp: (u64, u64), database: &Database) {
        match &mut self.kind {
            FacetKind::List(_) => {}
            FacetKind::Numeric(f) => f.prepare(root, stamp, database),
            FacetKind::Slider(f) => f.prepare(root, stamp, database),
            FacetKind::Search(f) => f.prepare(root, stamp, database),
        }
    }
    pub fn restrict(&self, candidates: &ItemSet, database: &Database) -> Filtered {
        if !self.has_restrictions() {
            return Filtered { matched: candidates.clone(), unprocessed: ItemSet::new() };
        }
        match &self.kind {
            FacetKind::List(f) => f.restrict(candidates, database),
            FacetKind::Numeric(f) => f.restrict(candidates, database),
            FacetKind::Slider(f) => f.restrict(candidates, database),
            FacetKind::Search(f) => f.restrict(candidates, database),
        }
    }
    /// Choices and counts against `others`, the items every other facet lets through.
    pub fn update(&self, others: &ItemSet, database: &Database) -> FacetView {
        match &self.kind {
            FacetKind::List(f) => f.update(others, database),
            FacetKind::Numeric(f) => f.update(others, database),
            FacetKind::Slider(f) => f.update(others, database),
            FacetKind::Search(f) => f.update(others, database),
        }
    }

    /// Returns whether anything was cleared.
    pub fn clear_all_restrictions(&mut self) -> bool {
        let had = self.has_restrictions();
        match &mut self.kind {
            FacetKind::List(f) => f.clear(),
            FacetKind::Numeric(f) => f.clear(),
            FacetKind::Slider(f) => f.clear(),
            FacetKind::Search(f) => f.clear(),
        }
        had
    }
    pub fn export_state(&self) -> FacetState {
        match &self.kind {
            FacetKind::List(f) => f.export_state(),
            FacetKind::Numeric(f) => f.export_state(),
            FacetKind::Slider(f) => f.export_state(),
            FacetKind::Search(f) => f.export_state(),
        }
    }
    pub fn state_differs(&self, state: &FacetState) -> bool {
        self.export_state() != *state
    }
    /// Replaces the restriction. Returns whether it changed.
    pub fn import_state(&mut self, state: FacetState) -> Result<bool> {
        if !self.state_differs(&state) {
            return Ok(false);
        }
        let before = self.export_state();
        let kind = state.kind();
        let fits = match (&mut self.kind, state) {
            (FacetKind::List(f), FacetState::List { selection, missing }) => {
                f.set_selection(selection);
                f.set_missing(missing);
                true
            }
            (FacetKind::Numeric(f), FacetState::Numeric { ranges }) => {
                f.set_ranges(ranges);
                true
            }
            (FacetKind::Slider(f), FacetState::Slider { range, missing }) => {
                f.set_range(range);
                f.set_missing(missing);
                true
            }
            (FacetKind::Search(f), FacetState::Search { text }) => {
                f.set_text(text.as_deref());
                true
            }
            _ => false,
        };
        if !fits {
            return Err(FacetError::Invariant(format!("{kind} state does not fit facet {}", self.id)));
        }
        // normalization may turn a differing state into the current one
        Ok(self.export_state() != before)
    }
}
