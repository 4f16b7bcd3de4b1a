use std::fmt;

use crate::datatype::Value;

/// Name of the variable bound to the item(s) an expression starts from.
pub const VALUE: &str = "value";

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant(Value),
    Path(Path),
    Operator { operator: Operator, operands: Vec<Expr> },
    FunctionCall { function: Function, arguments: Vec<Expr> },
    ControlCall { control: Control, arguments: Vec<Expr> },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    pub property: String,
    pub forward: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    // the variable the walk starts from, `value` unless written otherwise
    pub root: String,
    pub segments: Vec<Segment>,
}

impl Path {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { root: VALUE.to_string(), segments }
    }
    /// The single step of a one-segment path.
    pub fn single_segment(&self) -> Option<&Segment> {
        match self.segments.as_slice() {
            [segment] if self.root == VALUE => Some(segment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Negate,
    Multiply,
    Divide,
    Add,
    Subtract,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Negate => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Equal => "=",
            Operator::NotEqual => "<>",
            Operator::Less => "<",
            Operator::LessEqual => "<=",
            Operator::Greater => ">",
            Operator::GreaterEqual => ">=",
            Operator::And => "and",
            Operator::Or => "or",
        }
    }
    pub(crate) fn comparison(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(Operator::Equal),
            "<>" | "!=" => Some(Operator::NotEqual),
            "<" => Some(Operator::Less),
            "<=" => Some(Operator::LessEqual),
            ">" => Some(Operator::Greater),
            ">=" => Some(Operator::GreaterEqual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Union,
    Contains,
    Exists,
    Count,
    Not,
    And,
    Or,
    Add,
    Multiply,
    Min,
    Max,
    Concat,
    DateRange,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "union" => Function::Union,
            "contains" => Function::Contains,
            "exists" => Function::Exists,
            "count" => Function::Count,
            "not" => Function::Not,
            "and" => Function::And,
            "or" => Function::Or,
            "add" => Function::Add,
            "multiply" => Function::Multiply,
            "min" => Function::Min,
            "max" => Function::Max,
            "concat" => Function::Concat,
            "date-range" => Function::DateRange,
            _ => return None,
        })
    }
    pub fn name(&self) -> &'static str {
        match self {
            Function::Union => "union",
            Function::Contains => "contains",
            Function::Exists => "exists",
            Function::Count => "count",
            Function::Not => "not",
            Function::And => "and",
            Function::Or => "or",
            Function::Add => "add",
            Function::Multiply => "multiply",
            Function::Min => "min",
            Function::Max => "max",
            Function::Concat => "concat",
            Function::DateRange => "date-range",
        }
    }
    /// Minimum and maximum argument counts, `None` meaning unbounded.
    pub fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Function::Contains => (2, Some(2)),
            Function::Exists | Function::Count | Function::Not => (1, Some(1)),
            Function::DateRange => (3, Some(3)),
            _ => (1, None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    If,
    Default,
    ForEach,
    Filter,
}

impl Control {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "if" => Some(Control::If),
            "default" => Some(Control::Default),
            "foreach" => Some(Control::ForEach),
            "filter" => Some(Control::Filter),
            _ => None,
        }
    }
    pub fn name(&self) -> &'static str {
        match self {
            Control::If => "if",
            Control::Default => "default",
            Control::ForEach => "foreach",
            Control::Filter => "filter",
        }
    }
    pub fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Control::If => (3, Some(3)),
            Control::Default => (1, None),
            Control::ForEach | Control::Filter => (2, Some(2)),
        }
    }
}

// ------------- Display -------------
// Prints the expression back in a normalized, fully parenthesized form.
impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.root != VALUE || self.segments.is_empty() {
            write!(f, "{}", self.root)?;
        }
        for segment in &self.segments {
            write!(f, "{}{}", if segment.forward { "." } else { "!" }, segment.property)?;
        }
        Ok(())
    }
}

fn write_arguments(f: &mut fmt::Formatter, name: &str, arguments: &[Expr]) -> fmt::Result {
    write!(f, "{name}(")?;
    for (i, argument) in arguments.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{argument}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Constant(Value::Number(n)) => write!(f, "{}", Value::Number(*n)),
            Expr::Constant(Value::Boolean(b)) => write!(f, "{b}"),
            Expr::Constant(Value::Url(u)) => write!(f, "<{}>", u.replace('\\', "\\\\").replace('>', "\\>")),
            Expr::Constant(v) => write!(f, "{:?}", v.key()),
            Expr::Path(path) => write!(f, "{path}"),
            Expr::Operator { operator: Operator::Negate, operands } => match operands.as_slice() {
                [operand] => write!(f, "-({operand})"),
                _ => write!(f, "-(?)"),
            },
            Expr::Operator { operator, operands } => {
                write!(f, "(")?;
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", operator.symbol())?;
                    }
                    write!(f, "{operand}")?;
                }
                write!(f, ")")
            }
            Expr::FunctionCall { function, arguments } => write_arguments(f, function.name(), arguments),
            Expr::ControlCall { control, arguments } => write_arguments(f, control.name(), arguments),
        }
    }
}
