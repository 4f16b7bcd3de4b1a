//! Operators and built-in functions over evaluated collections.
//!
//! Every operator applies to the cross product of its operand values. The
//! coercions are:
//! * arithmetic reads numbers, or text that parses as one; anything else fails,
//! * `=` and `<>` compare numerically when both sides read as numbers, as
//!   instants when either side is a date and both read as dates, otherwise by
//!   canonical key,
//! * ordering compares numbers and dates the same way and plain text by key;
//!   booleans and items cannot be ordered.
//!
//! `date-range` measures in `millisecond`, `second`, `minute`, `hour`, `day`,
//! `week`, `month`, `year`, `decade` or `century`; months and longer are
//! fractions of the mean Gregorian year.

use std::cmp::Ordering;

use crate::datatype::{Value, ValueType};
use crate::error::{FacetError, Result};

use super::ast::{Function, Operator};
use super::values::ExpressionCollection;

fn number(value: &Value, function: &str, argument: usize) -> Result<f64> {
    value.as_number().ok_or_else(|| {
        FacetError::evaluation(function, Some(argument), format!("{:?} is not a number", value.key()))
    })
}

fn date(value: &Value, function: &str, argument: usize) -> Result<chrono::NaiveDateTime> {
    value.as_date().ok_or_else(|| {
        FacetError::evaluation(function, Some(argument), format!("{:?} is not a date", value.key()))
    })
}

fn is_date(value: &Value) -> bool {
    value.value_type() == ValueType::Date
}

fn equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
        return x == y;
    }
    if is_date(a) || is_date(b) {
        if let (Some(x), Some(y)) = (a.as_date(), b.as_date()) {
            return x == y;
        }
    }
    a.key() == b.key()
}

fn order(a: &Value, b: &Value, symbol: &str) -> Result<Ordering> {
    for (i, v) in [a, b].into_iter().enumerate() {
        if matches!(v.value_type(), ValueType::Boolean | ValueType::Item) {
            return Err(FacetError::evaluation(
                symbol,
                Some(i),
                format!("{} values cannot be ordered", v.value_type()),
            ));
        }
    }
    if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
        return Ok(x.total_cmp(&y));
    }
    if is_date(a) || is_date(b) {
        if let (Some(x), Some(y)) = (a.as_date(), b.as_date()) {
            return Ok(x.cmp(&y));
        }
    }
    Ok(a.key().cmp(&b.key()))
}

pub(crate) fn apply_operator(operator: Operator, operands: &[ExpressionCollection]) -> Result<ExpressionCollection> {
    let symbol = operator.symbol();
    match (operator, operands) {
        (Operator::Negate, [operand]) => {
            let mut result = ExpressionCollection::empty(ValueType::Number);
            for value in operand.iter() {
                result.add(Value::Number(-number(value, symbol, 0)?));
            }
            Ok(result)
        }
        (Operator::And, [left, right]) => Ok(ExpressionCollection::boolean(left.truthy() && right.truthy())),
        (Operator::Or, [left, right]) => Ok(ExpressionCollection::boolean(left.truthy() || right.truthy())),
        (Operator::Add | Operator::Subtract | Operator::Multiply | Operator::Divide, [left, right]) => {
            let mut result = ExpressionCollection::empty(ValueType::Number);
            for a in left.iter() {
                let x = number(a, symbol, 0)?;
                for b in right.iter() {
                    let y = number(b, symbol, 1)?;
                    let z = match operator {
                        Operator::Add => x + y,
                        Operator::Subtract => x - y,
                        Operator::Multiply => x * y,
                        _ => x / y,
                    };
                    // division by zero or overflow yields nothing for the pair
                    if z.is_finite() {
                        result.add(Value::Number(z));
                    }
                }
            }
            Ok(result)
        }
        (_, [left, right]) => {
            let mut result = ExpressionCollection::empty(ValueType::Boolean);
            for a in left.iter() {
                for b in right.iter() {
                    let outcome = match operator {
                        Operator::Equal => equal(a, b),
                        Operator::NotEqual => !equal(a, b),
                        Operator::Less => order(a, b, symbol)? == Ordering::Less,
                        Operator::LessEqual => order(a, b, symbol)? != Ordering::Greater,
                        Operator::Greater => order(a, b, symbol)? == Ordering::Greater,
                        _ => order(a, b, symbol)? != Ordering::Less,
                    };
                    result.add(Value::Boolean(outcome));
                }
            }
            Ok(result)
        }
        _ => Err(FacetError::evaluation(symbol, None, format!("wrong number of operands: {}", operands.len()))),
    }
}

const GREGORIAN_YEAR: f64 = 365.2425 * 86_400_000.0;

// Length of a date-range unit in milliseconds. Months and longer units use
// the mean Gregorian year, so twelve months always make a year.
fn unit_millis(unit: &str) -> Option<f64> {
    Some(match unit {
        "millisecond" => 1.0,
        "second" => 1_000.0,
        "minute" => 60_000.0,
        "hour" => 3_600_000.0,
        "day" => 86_400_000.0,
        "week" => 604_800_000.0,
        "month" => GREGORIAN_YEAR / 12.0,
        "year" => GREGORIAN_YEAR,
        "decade" => GREGORIAN_YEAR * 10.0,
        "century" => GREGORIAN_YEAR * 100.0,
        _ => return None,
    })
}

fn argument_count(function: Function, given: usize) -> FacetError {
    let (min, max) = function.arity();
    // the first missing argument, or the first one too many
    let argument = if given < min { given } else { max.unwrap_or(given) };
    FacetError::evaluation(function.name(), Some(argument), format!("wrong number of arguments: {given}"))
}

fn extreme(function: Function, arguments: Vec<ExpressionCollection>) -> ExpressionCollection {
    let wanted = if function == Function::Min { Ordering::Less } else { Ordering::Greater };
    let mut best: Option<Value> = None;
    for value in arguments.into_iter().flatten() {
        best = match best {
            Some(current) if current.compare(&value) != wanted.reverse() => Some(current),
            _ => Some(value),
        };
    }
    match best {
        Some(value) => ExpressionCollection::single(value),
        None => ExpressionCollection::empty(ValueType::Number),
    }
}

pub(crate) fn apply_function(function: Function, arguments: Vec<ExpressionCollection>) -> Result<ExpressionCollection> {
    let name = function.name();
    if arguments.len() < function.arity().0 {
        return Err(argument_count(function, arguments.len()));
    }
    match function {
        Function::Union => {
            let mut result = ExpressionCollection::empty(arguments.first().map_or(ValueType::Text, |a| a.value_type()));
            for argument in arguments {
                result.union(argument);
            }
            Ok(result)
        }
        Function::Contains => match arguments.as_slice() {
            [haystack, needles] => {
                let haystack: Vec<String> = haystack.iter().map(Value::key).collect();
                let found = needles.iter().any(|needle| haystack.contains(&needle.key()));
                Ok(ExpressionCollection::boolean(found))
            }
            _ => Err(argument_count(function, arguments.len())),
        },
        Function::Exists | Function::Count | Function::Not => match arguments.as_slice() {
            [argument] => Ok(match function {
                Function::Exists => ExpressionCollection::boolean(!argument.is_empty()),
                Function::Count => ExpressionCollection::single(Value::Number(argument.size() as f64)),
                _ => ExpressionCollection::boolean(!argument.truthy()),
            }),
            _ => Err(argument_count(function, arguments.len())),
        },
        Function::And => Ok(ExpressionCollection::boolean(arguments.iter().all(|a| a.truthy()))),
        Function::Or => Ok(ExpressionCollection::boolean(arguments.iter().any(|a| a.truthy()))),
        Function::Add | Function::Multiply => {
            let mut total = if function == Function::Add { 0.0 } else { 1.0 };
            for (i, argument) in arguments.iter().enumerate() {
                for value in argument.iter() {
                    let n = number(value, name, i)?;
                    if function == Function::Add { total += n } else { total *= n }
                }
            }
            if !total.is_finite() {
                return Err(FacetError::evaluation(name, None, "result is not finite"));
            }
            Ok(ExpressionCollection::single(Value::Number(total)))
        }
        Function::Min | Function::Max => Ok(extreme(function, arguments)),
        Function::Concat => {
            let mut text = String::new();
            for argument in &arguments {
                for value in argument.sorted() {
                    text.push_str(&value.key());
                }
            }
            Ok(ExpressionCollection::single(Value::Text(text)))
        }
        Function::DateRange => {
            let [starts, ends, units] = arguments.as_slice() else {
                return Err(argument_count(function, arguments.len()));
            };
            let unit = units.sorted().first().map(Value::key).unwrap_or_default();
            let Some(millis) = unit_millis(&unit) else {
                return Err(FacetError::evaluation(name, Some(2), format!("unknown unit {unit:?}")));
            };
            let mut result = ExpressionCollection::empty(ValueType::Number);
            for start in starts.iter() {
                let from = date(start, name, 0)?;
                for end in ends.iter() {
                    let to = date(end, name, 1)?;
                    let span = (to - from).num_milliseconds() as f64;
                    result.add(Value::Number(span / millis));
                }
            }
            Ok(result)
        }
    }
}
