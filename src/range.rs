//! Sorted auxiliary index answering range queries over numeric or date keys.
//!
//! A [`RangeIndex`] is an immutable snapshot. It remembers the generation of
//! whatever it was built from (the store for property indexes, a collection's
//! root set for derived ones) so owners can tell when it has gone stale and
//! must be rebuilt rather than reused.

use std::ops::Bound;

use roaring::RoaringTreemap;

use crate::database::{ItemSet, Thing};

#[derive(Debug, Clone)]
pub struct RangeIndex {
    // sorted by key, items with equal keys are adjacent
    pairs: Vec<(f64, Thing)>,
    generation: u64,
}

impl RangeIndex {
    /// Builds an index over `items`, where `project` yields zero or more keys per item.
    /// Non-finite keys are ignored.
    pub fn build<I, F>(items: I, generation: u64, mut project: F) -> Self
    where
        I: IntoIterator<Item = Thing>,
        F: FnMut(Thing) -> Vec<f64>,
    {
        let mut pairs = Vec::new();
        for item in items {
            for key in project(item) {
                if key.is_finite() {
                    pairs.push((key, item));
                }
            }
        }
        pairs.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));
        Self { pairs, generation }
    }
    pub fn generation(&self) -> u64 {
        self.generation
    }
    pub fn len(&self) -> usize {
        self.pairs.len()
    }
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
    /// Every (key, item) pair in key order.
    pub fn entries(&self) -> impl Iterator<Item = (f64, Thing)> + '_ {
        self.pairs.iter().copied()
    }
    /// Smallest key, or positive infinity for an empty index.
    pub fn min(&self) -> f64 {
        self.pairs.first().map(|p| p.0).unwrap_or(f64::INFINITY)
    }
    /// Largest key, or negative infinity for an empty index.
    pub fn max(&self) -> f64 {
        self.pairs.last().map(|p| p.0).unwrap_or(f64::NEG_INFINITY)
    }
    /// Items with a key in `[from, to)`, or in `(from, to)` when `inclusive_low` is false.
    pub fn items_in_range(&self, from: f64, to: f64, inclusive_low: bool) -> ItemSet {
        let lower = if inclusive_low { Bound::Included(from) } else { Bound::Excluded(from) };
        self.items_between(lower, Bound::Excluded(to))
    }
    pub fn items_between(&self, lower: Bound<f64>, upper: Bound<f64>) -> ItemSet {
        let start = match lower {
            Bound::Included(k) => self.pairs.partition_point(|p| p.0 < k),
            Bound::Excluded(k) => self.pairs.partition_point(|p| p.0 <= k),
            Bound::Unbounded => 0,
        };
        let end = match upper {
            Bound::Included(k) => self.pairs.partition_point(|p| p.0 <= k),
            Bound::Excluded(k) => self.pairs.partition_point(|p| p.0 < k),
            Bound::Unbounded => self.pairs.len(),
        };
        let mut items = RoaringTreemap::new();
        if start < end {
            for (_, item) in &self.pairs[start..end] {
                items.insert(*item);
            }
        }
        items
    }
    /// Number of distinct items of `within` with a key in the given bounds.
    pub fn count_within(&self, lower: Bound<f64>, upper: Bound<f64>, within: &ItemSet) -> u64 {
        let mut items = self.items_between(lower, upper);
        items &= within;
        items.len()
    }
    /// Smallest and largest key held by any item of `within`.
    pub fn bounds_within(&self, within: &ItemSet) -> Option<(f64, f64)> {
        let low = self.pairs.iter().find(|p| within.contains(p.1))?.0;
        let high = self.pairs.iter().rev().find(|p| within.contains(p.1))?.0;
        Some((low, high))
    }
}
