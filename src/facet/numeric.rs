use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::database::{Database, ItemSet};
use crate::datatype::Value;
use crate::expression::{Expression, KeyRange};
use crate::range::RangeIndex;

use super::{Bucket, BucketRange, FacetState, FacetView, Filtered};

// ------------- Keys -------------
// Numeric keys of the root items. A path over a number or date property is
// answered by the store's own index; anything else gets an index derived
// from evaluating the expression on every root item.
#[derive(Debug, Default)]
pub(crate) struct NumericKeys {
    stamp: Option<(u64, u64)>,
    derived: Option<Arc<RangeIndex>>,
    failed: ItemSet,
}

impl NumericKeys {
    pub(crate) fn prepare(&mut self, expression: &Expression, root: &ItemSet, stamp: (u64, u64), database: &Database) {
        if self.stamp == Some(stamp) {
            return;
        }
        self.stamp = Some(stamp);
        self.failed = ItemSet::new();
        if expression.as_path().and_then(|path| path.range_property(database)).is_some() {
            self.derived = None;
            return;
        }
        let mut failed = ItemSet::new();
        let index = RangeIndex::build(root.iter(), stamp.0, |thing| match expression.evaluate_thing(thing, database) {
            Ok(values) => values.iter().filter_map(Value::sort_key).collect(),
            Err(_) => {
                failed.insert(thing);
                Vec::new()
            }
        });
        debug!(expression = expression.source(), keys = index.len(), failed = failed.len(), "derived range index");
        self.failed = failed;
        self.derived = Some(Arc::new(index));
    }
    pub(crate) fn index(&self, expression: &Expression, database: &Database) -> Option<Arc<RangeIndex>> {
        match &self.derived {
            Some(index) => Some(Arc::clone(index)),
            None => expression
                .as_path()
                .and_then(|path| path.range_property(database))
                .and_then(|property| database.range_index(property.id())),
        }
    }
    /// Candidates with a key inside `range`, and those that failed to evaluate.
    pub(crate) fn matching(
        &self,
        expression: &Expression,
        range: &KeyRange,
        candidates: &ItemSet,
        database: &Database,
    ) -> Filtered {
        match &self.derived {
            Some(index) => {
                let mut matched = index.items_between(range.lower, range.upper);
                matched &= candidates;
                Filtered { matched, unprocessed: &self.failed & candidates }
            }
            None => {
                let (matched, unprocessed) = expression.range_backward(range, candidates, database);
                Filtered { matched, unprocessed }
            }
        }
    }
    /// Candidates yielding no key at all, leaving out the ones that failed.
    pub(crate) fn missing(&self, expression: &Expression, candidates: &ItemSet, database: &Database) -> ItemSet {
        let keyed = self.matching(expression, &KeyRange::unbounded(), candidates, database);
        let mut missing = candidates - &keyed.matched;
        missing -= &keyed.unprocessed;
        missing
    }
}

/// A power of ten such that `span` covers between `min_buckets` and
/// `max_buckets` buckets where possible.
pub fn auto_interval(span: f64, min_buckets: usize, max_buckets: usize) -> f64 {
    if !(span.is_finite() && span > 0.0) {
        return 1.0;
    }
    let mut width = 10f64.powi(span.log10().floor() as i32);
    while span / width < min_buckets as f64 {
        width /= 10.0;
    }
    while span / width > max_buckets as f64 {
        width *= 10.0;
    }
    width
}

// ------------- Numeric facet -------------
/// Fixed width `[from, to)` buckets over a numeric expression.
#[derive(Debug)]
pub struct NumericFacet {
    expression: Expression,
    interval: Option<f64>,
    min_buckets: usize,
    max_buckets: usize,
    // sorted by lower bound, no duplicates
    ranges: Vec<BucketRange>,
    keys: NumericKeys,
    auto_interval: f64,
}

impl NumericFacet {
    pub fn new(expression: Expression, interval: Option<f64>, min_buckets: usize, max_buckets: usize) -> Self {
        Self {
            expression,
            interval,
            min_buckets,
            max_buckets,
            ranges: Vec::new(),
            keys: NumericKeys::default(),
            auto_interval: 1.0,
        }
    }
    pub fn expression(&self) -> &Expression {
        &self.expression
    }
    /// Bucket width in use, configured or derived from the root domain.
    pub fn interval(&self) -> f64 {
        self.interval.unwrap_or(self.auto_interval)
    }
    pub fn ranges(&self) -> &[BucketRange] {
        &self.ranges
    }
    pub fn has_restrictions(&self) -> bool {
        !self.ranges.is_empty()
    }
    /// Adds a bucket to the selection. Empty or non-finite ranges are ignored.
    pub fn select_range(&mut self, from: f64, to: f64) -> bool {
        if !(from.is_finite() && to.is_finite() && from < to) {
            return false;
        }
        let range = BucketRange { from, to };
        if self.ranges.contains(&range) {
            return false;
        }
        self.ranges.push(range);
        self.ranges.sort_by(|a, b| a.from.total_cmp(&b.from).then(a.to.total_cmp(&b.to)));
        true
    }
    pub fn deselect_range(&mut self, from: f64, to: f64) -> bool {
        let before = self.ranges.len();
        self.ranges.retain(|r| !(r.from == from && r.to == to));
        self.ranges.len() != before
    }
    pub fn set_ranges(&mut self, ranges: Vec<BucketRange>) {
        self.ranges.clear();
        for range in ranges {
            self.select_range(range.from, range.to);
        }
    }
    pub(crate) fn clear(&mut self) {
        self.ranges.clear();
    }
    pub(crate) fn export_state(&self) -> FacetState {
        FacetState::Numeric { ranges: self.ranges.clone() }
    }

    pub(crate) fn prepare(&mut self, root: &ItemSet, stamp: (u64, u64), database: &Database) {
        self.keys.prepare(&self.expression, root, stamp, database);
        if self.interval.is_none() {
            let bounds = self
                .keys
                .index(&self.expression, database)
                .and_then(|index| index.bounds_within(root));
            self.auto_interval = match bounds {
                Some((low, high)) => auto_interval(high - low, self.min_buckets, self.max_buckets),
                None => 1.0,
            };
        }
    }
    pub(crate) fn restrict(&self, candidates: &ItemSet, database: &Database) -> Filtered {
        let mut filtered = Filtered::default();
        for range in &self.ranges {
            let bucket = KeyRange::half_open(range.from, range.to, true);
            let part = self.keys.matching(&self.expression, &bucket, candidates, database);
            filtered.matched |= part.matched;
            filtered.unprocessed |= part.unprocessed;
        }
        filtered
    }
    pub(crate) fn update(&self, others: &ItemSet, database: &Database) -> FacetView {
        let width = self.interval();
        let mut filled: BTreeMap<i64, ItemSet> = BTreeMap::new();
        if let Some(index) = self.keys.index(&self.expression, database) {
            for (key, thing) in index.entries() {
                if others.contains(thing) {
                    filled.entry(slot_of(key, width)).or_default().insert(thing);
                }
            }
        }
        let mut buckets: Vec<Bucket> = filled
            .into_iter()
            .map(|(slot, items)| {
                Bucket { from: edge(slot, width), to: edge(slot + 1, width), count: items.len(), selected: false }
            })
            .collect();
        for range in &self.ranges {
            match buckets.iter_mut().find(|b| same(b.from, range.from, width) && same(b.to, range.to, width)) {
                Some(bucket) => bucket.selected = true,
                None => {
                    let bucket = KeyRange::half_open(range.from, range.to, true);
                    let count = self.keys.matching(&self.expression, &bucket, others, database).matched.len();
                    buckets.push(Bucket { from: range.from, to: range.to, count, selected: true });
                }
            }
        }
        buckets.sort_by(|a, b| a.from.total_cmp(&b.from));
        FacetView::Numeric {
            interval: width,
            buckets,
            missing: self.keys.missing(&self.expression, others, database).len(),
        }
    }
}

/// Lower edge of a bucket. Widths like 0.1 divide by their reciprocal so
/// that edges land on the nearest double to the decimal value.
fn edge(slot: i64, width: f64) -> f64 {
    let reciprocal = (1.0 / width).round();
    if width < 1.0 && reciprocal >= 1.0 && (reciprocal * width - 1.0).abs() < 1e-12 {
        slot as f64 / reciprocal
    } else {
        slot as f64 * width
    }
}

/// Bucket holding `key`, so that `edge(slot) <= key < edge(slot + 1)`.
fn slot_of(key: f64, width: f64) -> i64 {
    let mut slot = (key / width).floor() as i64;
    while key < edge(slot, width) {
        slot -= 1;
    }
    while key >= edge(slot + 1, width) {
        slot += 1;
    }
    slot
}

fn same(a: f64, b: f64, width: f64) -> bool {
    (a - b).abs() <= width * 1e-9
}

