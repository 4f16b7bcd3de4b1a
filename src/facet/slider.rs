use crate::database::{Database, ItemSet};
use crate::expression::{Expression, KeyRange};

use super::numeric::NumericKeys;
use super::{FacetState, FacetView, Filtered, SliderRange};

/// One closed interval over a numeric expression.
#[derive(Debug)]
pub struct SliderFacet {
    expression: Expression,
    range: Option<SliderRange>,
    // let items without a value through while a range is set
    missing: bool,
    keys: NumericKeys,
}

impl SliderFacet {
    pub fn new(expression: Expression) -> Self {
        Self {
            expression,
            range: None,
            missing: false,
            keys: NumericKeys::default(),
        }
    }
    pub fn expression(&self) -> &Expression {
        &self.expression
    }
    pub fn range(&self) -> Option<SliderRange> {
        self.range
    }
    pub fn show_missing(&self) -> bool {
        self.missing
    }
    pub fn has_restrictions(&self) -> bool {
        self.range.is_some()
    }
    /// Sets or clears the interval, swapping reversed bounds.
    /// Non-finite bounds clear it. Returns whether anything changed.
    pub fn set_range(&mut self, range: Option<SliderRange>) -> bool {
        let range = range
            .filter(|r| r.min.is_finite() && r.max.is_finite())
            .map(|r| SliderRange { min: r.min.min(r.max), max: r.min.max(r.max) });
        std::mem::replace(&mut self.range, range) != range
    }
    pub fn set_missing(&mut self, missing: bool) -> bool {
        std::mem::replace(&mut self.missing, missing) != missing
    }
    pub(crate) fn clear(&mut self) {
        self.range = None;
        self.missing = false;
    }
    pub(crate) fn export_state(&self) -> FacetState {
        FacetState::Slider { range: self.range, missing: self.missing }
    }

    pub(crate) fn prepare(&mut self, root: &ItemSet, stamp: (u64, u64), database: &Database) {
        self.keys.prepare(&self.expression, root, stamp, database);
    }
    pub(crate) fn restrict(&self, candidates: &ItemSet, database: &Database) -> Filtered {
        let Some(range) = self.range else {
            return Filtered { matched: candidates.clone(), unprocessed: ItemSet::new() };
        };
        let mut filtered = self
            .keys
            .matching(&self.expression, &KeyRange::closed(range.min, range.max), candidates, database);
        if self.missing {
            filtered.matched |= self.keys.missing(&self.expression, candidates, database);
        }
        filtered
    }
    pub(crate) fn update(&self, others: &ItemSet, database: &Database) -> FacetView {
        let domain = self
            .keys
            .index(&self.expression, database)
            .and_then(|index| index.bounds_within(others))
            .map(|(min, max)| SliderRange { min, max });
        FacetView::Slider {
            domain,
            selected: self.range,
            missing: self.keys.missing(&self.expression, others, database).len(),
        }
    }
}
