use std::ops::Bound;

use crate::database::{Database, ItemSet, Property, Thing};
use crate::datatype::{Value, ValueType};
use crate::error::{FacetError, Result};

use super::ast::{Control, Expr, Path, VALUE};
use super::functions::{apply_function, apply_operator};
use super::values::ExpressionCollection;

// ------------- Scope -------------
// Variables visible to an expression. Only `value` exists; `foreach` and
// `filter` rebind it for their inner expression.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'s> {
    value: &'s ExpressionCollection,
}

impl<'s> Scope<'s> {
    pub fn new(value: &'s ExpressionCollection) -> Self {
        Self { value }
    }
    fn lookup(&self, name: &str) -> Option<&'s ExpressionCollection> {
        (name == VALUE).then_some(self.value)
    }
}

pub fn evaluate(expr: &Expr, scope: Scope<'_>, database: &Database) -> Result<ExpressionCollection> {
    match expr {
        Expr::Constant(value) => Ok(ExpressionCollection::single(value.clone())),
        Expr::Path(path) => {
            let start = scope.lookup(&path.root).ok_or_else(|| {
                FacetError::evaluation(&path.root, None, "unknown variable")
            })?;
            Ok(path.walk(start, database))
        }
        Expr::Operator { operator, operands } => {
            let evaluated = operands
                .iter()
                .map(|operand| evaluate(operand, scope, database))
                .collect::<Result<Vec<_>>>()?;
            apply_operator(*operator, &evaluated)
        }
        Expr::FunctionCall { function, arguments } => {
            let evaluated = arguments
                .iter()
                .map(|argument| evaluate(argument, scope, database))
                .collect::<Result<Vec<_>>>()?;
            apply_function(*function, evaluated)
        }
        Expr::ControlCall { control, arguments } => evaluate_control(*control, arguments, scope, database),
    }
}

// Controls evaluate their arguments lazily.
fn evaluate_control(
    control: Control,
    arguments: &[Expr],
    scope: Scope<'_>,
    database: &Database,
) -> Result<ExpressionCollection> {
    match (control, arguments) {
        (Control::If, [condition, then, otherwise]) => {
            if evaluate(condition, scope, database)?.truthy() {
                evaluate(then, scope, database)
            } else {
                evaluate(otherwise, scope, database)
            }
        }
        (Control::Default, alternatives) => {
            let mut last = ExpressionCollection::empty(ValueType::Text);
            for alternative in alternatives {
                last = evaluate(alternative, scope, database)?;
                if !last.is_empty() {
                    break;
                }
            }
            Ok(last)
        }
        (Control::ForEach, [collection, body]) => {
            let elements = evaluate(collection, scope, database)?;
            // an empty result adopts the type of the first values produced
            let mut result = ExpressionCollection::empty(ValueType::Text);
            for element in elements {
                let bound = ExpressionCollection::single(element);
                result.union(evaluate(body, Scope::new(&bound), database)?);
            }
            Ok(result)
        }
        (Control::Filter, [collection, condition]) => {
            let elements = evaluate(collection, scope, database)?;
            let mut result = ExpressionCollection::empty(elements.value_type());
            for element in elements {
                let bound = ExpressionCollection::single(element.clone());
                if evaluate(condition, Scope::new(&bound), database)?.truthy() {
                    result.add(element);
                }
            }
            Ok(result)
        }
        (control, arguments) => Err(FacetError::evaluation(
            control.name(),
            None,
            format!("wrong number of arguments: {}", arguments.len()),
        )),
    }
}

// ------------- Paths -------------
/// Inclusive or exclusive bounds on numeric keys (dates use epoch milliseconds).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyRange {
    pub lower: Bound<f64>,
    pub upper: Bound<f64>,
}

impl KeyRange {
    /// `[from, to)`, or `(from, to)` when `inclusive_low` is false.
    pub fn half_open(from: f64, to: f64, inclusive_low: bool) -> Self {
        let lower = if inclusive_low { Bound::Included(from) } else { Bound::Excluded(from) };
        Self { lower, upper: Bound::Excluded(to) }
    }
    pub fn unbounded() -> Self {
        Self { lower: Bound::Unbounded, upper: Bound::Unbounded }
    }
    /// `[min, max]`.
    pub fn closed(min: f64, max: f64) -> Self {
        Self { lower: Bound::Included(min), upper: Bound::Included(max) }
    }
    pub fn contains(&self, key: f64) -> bool {
        let above = match self.lower {
            Bound::Included(k) => key >= k,
            Bound::Excluded(k) => key > k,
            Bound::Unbounded => true,
        };
        let below = match self.upper {
            Bound::Included(k) => key <= k,
            Bound::Excluded(k) => key < k,
            Bound::Unbounded => true,
        };
        above && below
    }
    fn holds(&self, value: &Value) -> bool {
        value.sort_key().is_some_and(|key| self.contains(key))
    }
}

impl Path {
    /// Walks every segment from the start values, fanning out at each step.
    /// Missing values end a branch without error.
    pub fn walk(&self, start: &ExpressionCollection, database: &Database) -> ExpressionCollection {
        let mut current = start.clone();
        for segment in &self.segments {
            let Some((property, natural)) = database.resolve_step(&segment.property) else {
                return ExpressionCollection::empty(ValueType::Text);
            };
            // a reversed step over an inverse name walks the property forward again
            if segment.forward == natural {
                current = step_forward(&current, property, database);
            } else {
                current = step_backward(&current, property, database);
            }
        }
        current
    }
    /// The property behind a single forward step, if the path is one.
    pub fn forward_property<'d>(&self, database: &'d Database) -> Option<&'d Property> {
        let segment = self.single_segment()?;
        let (property, natural) = database.resolve_step(&segment.property)?;
        (segment.forward == natural).then_some(property)
    }
    /// Like [`Path::forward_property`], for number and date properties only.
    pub fn range_property<'d>(&self, database: &'d Database) -> Option<&'d Property> {
        self.forward_property(database)
            .filter(|property| property.value_type().is_orderable())
    }
    /// Items of `filter` reaching at least one value inside `range`.
    pub fn range_backward(&self, range: &KeyRange, filter: &ItemSet, database: &Database) -> ItemSet {
        if let Some(property) = self.range_property(database) {
            if let Some(index) = database.range_index(property.id()) {
                let mut items = index.items_between(range.lower, range.upper);
                items &= filter;
                return items;
            }
        }
        filter
            .iter()
            .filter(|thing| {
                let start = thing_collection(*thing, database);
                self.walk(&start, database).iter().any(|v| range.holds(v))
            })
            .collect()
    }
    /// Values reachable from `roots` that lie inside `range`.
    pub fn range_forward(&self, range: &KeyRange, roots: &ItemSet, database: &Database) -> ExpressionCollection {
        if let Some(property) = self.range_property(database) {
            if let Some(index) = database.range_index(property.id()) {
                let mut items = index.items_between(range.lower, range.upper);
                items &= roots;
                let mut result = ExpressionCollection::empty(property.value_type());
                for thing in items.iter() {
                    for value in property.values(thing) {
                        if range.holds(value) {
                            result.add(value.clone());
                        }
                    }
                }
                return result;
            }
        }
        let start = ExpressionCollection::from_items(roots, database);
        let reached = self.walk(&start, database);
        let kept: Vec<Value> = reached.iter().filter(|v| range.holds(v)).cloned().collect();
        ExpressionCollection::from_values(reached.value_type(), kept)
    }
    /// Items of `filter` from which the path reaches any of `targets`,
    /// found by walking the segments in reverse.
    pub fn walk_backward(&self, targets: &[Value], filter: &ItemSet, database: &Database) -> ItemSet {
        let mut current: Vec<Value> = targets.to_vec();
        for segment in self.segments.iter().rev() {
            let Some((property, natural)) = database.resolve_step(&segment.property) else {
                return ItemSet::new();
            };
            let reached = if segment.forward == natural {
                let coerced: Vec<Value> = current.iter().filter_map(|v| v.coerce(property.value_type())).collect();
                let values = ExpressionCollection::from_values(property.value_type(), coerced);
                step_backward(&values, property, database)
            } else {
                let values = ExpressionCollection::from_values(
                    ValueType::Item,
                    current.iter().filter_map(|v| v.coerce(ValueType::Item)),
                );
                step_forward(&values, property, database)
            };
            current = reached.into_iter().collect();
        }
        let mut items: ItemSet = current
            .iter()
            .filter_map(|v| database.item_handle(&v.key()))
            .collect();
        items &= filter;
        items
    }
}

fn thing_collection(thing: Thing, database: &Database) -> ExpressionCollection {
    match database.item_id(thing) {
        Some(id) => ExpressionCollection::single(Value::Item(id.to_string())),
        None => ExpressionCollection::empty(ValueType::Item),
    }
}

fn step_forward(current: &ExpressionCollection, property: &Property, database: &Database) -> ExpressionCollection {
    let mut next = ExpressionCollection::empty(property.value_type());
    for value in current.iter() {
        // text and urls naming a known item are followed like item references
        let Some(Value::Item(id)) = value.coerce(ValueType::Item) else { continue };
        let Some(thing) = database.item_handle(&id) else { continue };
        for reached in property.values(thing) {
            next.add(reached.clone());
        }
    }
    next
}

fn step_backward(current: &ExpressionCollection, property: &Property, database: &Database) -> ExpressionCollection {
    let mut next = ExpressionCollection::empty(ValueType::Item);
    for value in current.iter() {
        let Some(value) = value.coerce(property.value_type()) else { continue };
        let Some(subjects) = property.subjects(&value) else { continue };
        for thing in subjects.iter() {
            if let Some(id) = database.item_id(thing) {
                next.add(Value::Item(id.to_string()));
            }
        }
    }
    next
}
