//! The expression language facets and views bind to.
//!
//! Text is scanned into tokens, parsed into an [`Expr`] tree and evaluated
//! against a [`Database`] starting from one item or a whole item set. The
//! result is always an [`ExpressionCollection`]; paths fan out and never fail
//! on missing values.

pub mod ast;
pub mod evaluate;
pub mod functions;
pub mod parser;
pub mod scanner;
pub mod values;

use std::fmt;

use crate::database::{Database, ItemSet, Thing};
use crate::datatype::{Value, ValueType};
use crate::error::Result;

pub use ast::{Control, Expr, Function, Operator, Path, Segment, VALUE};
pub use evaluate::{KeyRange, Scope, evaluate};
pub use parser::Parser;
pub use scanner::{Token, TokenKind, scan};
pub use values::ExpressionCollection;

/// A parsed expression together with the text it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Expr,
}

impl Expression {
    pub fn parse(text: &str) -> Result<Self> {
        let root = Parser::new(text)?.parse()?;
        Ok(Self { source: text.to_string(), root })
    }
    /// Parses comma separated alternatives such as `.x, .y`.
    pub fn parse_list(text: &str) -> Result<Vec<Self>> {
        let roots = Parser::new(text)?.parse_list()?;
        Ok(roots
            .into_iter()
            .map(|root| Self { source: root.to_string(), root })
            .collect())
    }
    pub fn source(&self) -> &str {
        &self.source
    }
    pub fn root(&self) -> &Expr {
        &self.root
    }
    /// The path this expression consists of, when it is nothing but a path.
    pub fn as_path(&self) -> Option<&Path> {
        match &self.root {
            Expr::Path(path) => Some(path),
            _ => None,
        }
    }
    pub fn is_path(&self) -> bool {
        self.as_path().is_some()
    }

    pub fn evaluate_with(&self, value: &ExpressionCollection, database: &Database) -> Result<ExpressionCollection> {
        evaluate(&self.root, Scope::new(value), database)
    }
    /// Evaluates with `value` bound to a single item.
    pub fn evaluate_item(&self, id: &str, database: &Database) -> Result<ExpressionCollection> {
        self.evaluate_with(&ExpressionCollection::single(Value::Item(id.to_string())), database)
    }
    pub fn evaluate_thing(&self, thing: Thing, database: &Database) -> Result<ExpressionCollection> {
        match database.item_id(thing) {
            Some(id) => self.evaluate_item(id, database),
            None => Ok(ExpressionCollection::empty(ValueType::Text)),
        }
    }
    /// Evaluates with `value` bound to every item of the set at once, so the
    /// result is the deduplicated union over all of them.
    pub fn evaluate_items(&self, items: &ItemSet, database: &Database) -> Result<ExpressionCollection> {
        self.evaluate_with(&ExpressionCollection::from_items(items, database), database)
    }

    /// Items of `filter` for which the expression yields a value inside `range`.
    /// The second set holds the items whose evaluation failed.
    pub fn range_backward(&self, range: &KeyRange, filter: &ItemSet, database: &Database) -> (ItemSet, ItemSet) {
        if let Some(path) = self.as_path() {
            return (path.range_backward(range, filter, database), ItemSet::new());
        }
        let mut matched = ItemSet::new();
        let mut failed = ItemSet::new();
        for thing in filter.iter() {
            match self.evaluate_thing(thing, database) {
                Ok(values) => {
                    if values.iter().any(|v| v.sort_key().is_some_and(|k| range.contains(k))) {
                        matched.insert(thing);
                    }
                }
                Err(_) => {
                    failed.insert(thing);
                }
            }
        }
        (matched, failed)
    }
    /// Values inside `range` that the expression yields for the items of `roots`.
    pub fn range_forward(&self, range: &KeyRange, roots: &ItemSet, database: &Database) -> Result<ExpressionCollection> {
        if let Some(path) = self.as_path() {
            return Ok(path.range_forward(range, roots, database));
        }
        let values = self.evaluate_items(roots, database)?;
        let kept: Vec<Value> = values
            .iter()
            .filter(|v| v.sort_key().is_some_and(|k| range.contains(k)))
            .cloned()
            .collect();
        Ok(ExpressionCollection::from_values(values.value_type(), kept))
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}
