use thiserror::Error;

use crate::datatype::ValueType;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FacetError {
    #[error("Syntax error at offset {position}: expected {expected}")]
    Syntax { position: usize, expected: String },
    #[error("Type mismatch: {value:?} is not a {expected} value for property {property} of item {item}")]
    TypeMismatch { item: String, property: String, value: String, expected: ValueType },
    #[error("Evaluation error in {function}{}: {message}", .argument.map(|a| format!(" (argument {a})")).unwrap_or_default())]
    Evaluation { function: String, argument: Option<usize>, message: String },
    #[error("Unknown facet: {0}")]
    UnknownFacet(String),
    #[error("Load error: {0}")]
    Load(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
}

impl FacetError {
    pub(crate) fn syntax(position: usize, expected: impl Into<String>) -> Self {
        Self::Syntax { position, expected: expected.into() }
    }
    pub(crate) fn evaluation(function: &str, argument: Option<usize>, message: impl Into<String>) -> Self {
        Self::Evaluation { function: function.to_string(), argument, message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, FacetError>;

// Helper conversions
impl From<serde_json::Error> for FacetError {
    fn from(e: serde_json::Error) -> Self { Self::Load(e.to_string()) }
}
impl From<config::ConfigError> for FacetError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
