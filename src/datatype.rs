// used for date values
use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
// used for (de)serializing value type names in data files and facet configs
use serde::{Deserialize, Serialize};

// used to print out readable forms of a value
use std::fmt;
// used to indicate that values need to be hashable
use std::hash::{Hash, Hasher};
// custom made ordering for values
use std::cmp::Ordering;
use std::str::FromStr;

// ------------- ValueType -------------
#[derive(Eq, PartialEq, PartialOrd, Ord, Hash, Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Text,
    Number,
    Date,
    Boolean,
    Item,
    Url,
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Text => "text",
            ValueType::Number => "number",
            ValueType::Date => "date",
            ValueType::Boolean => "boolean",
            ValueType::Item => "item",
            ValueType::Url => "url",
        }
    }
    /// Values of these types can be placed in a range index.
    pub fn is_orderable(&self) -> bool {
        matches!(self, ValueType::Number | ValueType::Date)
    }
}
impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
impl FromStr for ValueType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(ValueType::Text),
            "number" => Ok(ValueType::Number),
            "date" => Ok(ValueType::Date),
            "boolean" => Ok(ValueType::Boolean),
            "item" => Ok(ValueType::Item),
            "url" => Ok(ValueType::Url),
            other => Err(format!("unknown value type '{other}'")),
        }
    }
}

// ------------- Dates -------------
// Accepted forms are a year, a year and month, a date or a date with time.
// Everything is widened to a NaiveDateTime at the start of the period.
pub fn parse_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    let mut parts = s.splitn(2, '-');
    let year = parts.next()?.parse::<i32>().ok()?;
    let month = match parts.next() {
        Some(m) => m.parse::<u32>().ok()?,
        None => 1,
    };
    if s.len() < 4 {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)
}

/// Milliseconds since the Unix epoch, the ordering key of a date.
pub fn date_key(dt: &NaiveDateTime) -> f64 {
    dt.and_utc().timestamp_millis() as f64
}

fn number_key(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

// ------------- Value -------------
#[derive(Clone, Debug)]
pub enum Value {
    Text(String),
    Number(f64),
    Date(NaiveDateTime),
    Boolean(bool),
    Item(String),
    Url(String),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Text(_) => ValueType::Text,
            Value::Number(_) => ValueType::Number,
            Value::Date(_) => ValueType::Date,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Item(_) => ValueType::Item,
            Value::Url(_) => ValueType::Url,
        }
    }
    /// Canonical text form, used for display, selections and text comparison.
    pub fn key(&self) -> String {
        match self {
            Value::Text(s) | Value::Item(s) | Value::Url(s) => s.clone(),
            Value::Number(n) => number_key(*n),
            Value::Date(dt) => {
                if dt.num_seconds_from_midnight() == 0 && dt.nanosecond() == 0 {
                    dt.format("%Y-%m-%d").to_string()
                } else {
                    dt.format("%Y-%m-%dT%H:%M:%S").to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
        }
    }
    /// Numeric ordering key of numbers and dates.
    pub fn sort_key(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Date(dt) => Some(date_key(dt)),
            _ => None,
        }
    }
    /// Numeric reading used by arithmetic: numbers, and text that parses as one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }
    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(dt) => Some(*dt),
            Value::Text(s) => parse_date(s),
            _ => None,
        }
    }
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Boolean(true))
    }
    /// Casts the value to the given type, `None` when it cannot be done.
    /// Item targets accept any non-empty text; resolving it is up to the store.
    pub fn coerce(&self, target: ValueType) -> Option<Value> {
        if self.value_type() == target {
            return match self {
                Value::Number(n) if !n.is_finite() => None,
                _ => Some(self.clone()),
            };
        }
        match target {
            ValueType::Text => Some(Value::Text(self.key())),
            ValueType::Number => self.as_number().map(Value::Number),
            ValueType::Date => match self {
                Value::Text(s) => parse_date(s).map(Value::Date),
                Value::Number(n) if n.fract() == 0.0 && (0.0..=9999.0).contains(n) => {
                    NaiveDate::from_ymd_opt(*n as i32, 1, 1)
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                        .map(Value::Date)
                }
                _ => None,
            },
            ValueType::Boolean => match self {
                Value::Text(s) => match s.trim().to_lowercase().as_str() {
                    "true" => Some(Value::Boolean(true)),
                    "false" => Some(Value::Boolean(false)),
                    _ => None,
                },
                _ => None,
            },
            ValueType::Item => match self {
                Value::Text(s) | Value::Url(s) if !s.trim().is_empty() => {
                    Some(Value::Item(s.trim().to_string()))
                }
                _ => None,
            },
            ValueType::Url => match self {
                Value::Text(s) | Value::Item(s) if !s.trim().is_empty() => {
                    Some(Value::Url(s.trim().to_string()))
                }
                _ => None,
            },
        }
    }
    /// Parses a selection key back into a value of the given type.
    pub fn from_key(key: &str, value_type: ValueType) -> Option<Value> {
        Value::Text(key.to_string()).coerce(value_type)
    }
    /// Type-aware ordering: numbers and dates by their keys, everything else by text.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            _ => self.key().cmp(&other.key()),
        }
    }
}
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Text(a), Value::Text(b))
            | (Value::Item(a), Value::Item(b))
            | (Value::Url(a), Value::Url(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            _ => false,
        }
    }
}
// Numbers are finite once stored, so equality is reflexive.
impl Eq for Value {}
impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value_type().hash(state);
        match self {
            Value::Text(s) | Value::Item(s) | Value::Url(s) => s.hash(state),
            // -0.0 and 0.0 are equal and must hash alike
            Value::Number(n) => (if *n == 0.0 { 0.0f64 } else { *n }).to_bits().hash(state),
            Value::Date(dt) => dt.hash(state),
            Value::Boolean(b) => b.hash(state),
        }
    }
}
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
