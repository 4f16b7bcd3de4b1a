//! Recursive descent parser over scanner tokens.
//!
//! Precedence, tightest first: unary `-`, `*` `/`, `+` `-`, comparisons,
//! `and`, `or`. Binary operators associate to the left.

use crate::datatype::Value;
use crate::error::{FacetError, Result};

use super::ast::{Control, Expr, Function, Operator, Path, Segment, VALUE};
use super::scanner::{Token, TokenKind, scan};

pub struct Parser {
    tokens: Vec<Token>,
    next: usize,
    // character length of the text, reported for errors at end of input
    end: usize,
}

impl Parser {
    pub fn new(text: &str) -> Result<Self> {
        Ok(Self {
            tokens: scan(text)?,
            next: 0,
            end: text.chars().count(),
        })
    }
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.next)
    }
    fn position(&self) -> usize {
        self.peek().map(|t| t.position).unwrap_or(self.end)
    }
    fn error(&self, expected: &str) -> FacetError {
        let found = self.peek().map(Token::describe).unwrap_or_else(|| "end of input".to_string());
        FacetError::syntax(self.position(), format!("{expected}, found {found}"))
    }
    fn expect_delimiter(&mut self, c: char) -> Result<()> {
        match self.peek() {
            Some(t) if t.is_delimiter(c) => {
                self.next += 1;
                Ok(())
            }
            _ => Err(self.error(&format!("'{c}'"))),
        }
    }
    fn expect_end(&self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.error("end of expression")),
        }
    }

    /// Parses text holding exactly one expression.
    pub fn parse(mut self) -> Result<Expr> {
        let expr = self.expression()?;
        self.expect_end()?;
        Ok(expr)
    }
    /// Parses comma separated alternative expressions.
    pub fn parse_list(mut self) -> Result<Vec<Expr>> {
        let mut exprs = vec![self.expression()?];
        while self.peek().is_some_and(|t| t.is_delimiter(',')) {
            self.next += 1;
            exprs.push(self.expression()?);
        }
        self.expect_end()?;
        Ok(exprs)
    }

    fn expression(&mut self) -> Result<Expr> {
        self.or()
    }
    fn binary(left: Expr, operator: Operator, right: Expr) -> Expr {
        Expr::Operator { operator, operands: vec![left, right] }
    }
    fn or(&mut self) -> Result<Expr> {
        let mut left = self.and()?;
        while self.peek().is_some_and(|t| t.is_keyword("or")) {
            self.next += 1;
            let right = self.and()?;
            left = Self::binary(left, Operator::Or, right);
        }
        Ok(left)
    }
    fn and(&mut self) -> Result<Expr> {
        let mut left = self.comparison()?;
        while self.peek().is_some_and(|t| t.is_keyword("and")) {
            self.next += 1;
            let right = self.comparison()?;
            left = Self::binary(left, Operator::And, right);
        }
        Ok(left)
    }
    fn comparison(&mut self) -> Result<Expr> {
        let mut left = self.additive()?;
        loop {
            let operator = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Operator(op)) => Operator::comparison(op),
                _ => None,
            };
            let Some(operator) = operator else { break };
            self.next += 1;
            let right = self.additive()?;
            left = Self::binary(left, operator, right);
        }
        Ok(left)
    }
    fn additive(&mut self) -> Result<Expr> {
        let mut left = self.multiplicative()?;
        loop {
            let operator = match self.peek() {
                Some(t) if t.is_operator("+") => Operator::Add,
                Some(t) if t.is_operator("-") => Operator::Subtract,
                _ => break,
            };
            self.next += 1;
            let right = self.multiplicative()?;
            left = Self::binary(left, operator, right);
        }
        Ok(left)
    }
    fn multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.unary()?;
        loop {
            let operator = match self.peek() {
                Some(t) if t.is_operator("*") => Operator::Multiply,
                Some(t) if t.is_operator("/") => Operator::Divide,
                _ => break,
            };
            self.next += 1;
            let right = self.unary()?;
            left = Self::binary(left, operator, right);
        }
        Ok(left)
    }
    fn unary(&mut self) -> Result<Expr> {
        if self.peek().is_some_and(|t| t.is_operator("-")) {
            self.next += 1;
            return Ok(match self.unary()? {
                Expr::Constant(Value::Number(n)) => Expr::Constant(Value::Number(-n)),
                operand => Expr::Operator { operator: Operator::Negate, operands: vec![operand] },
            });
        }
        self.primary()
    }
    fn primary(&mut self) -> Result<Expr> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.error("an expression"));
        };
        match token.kind {
            TokenKind::Number(n) => {
                self.next += 1;
                Ok(Expr::Constant(Value::Number(n)))
            }
            TokenKind::String(s) => {
                self.next += 1;
                Ok(Expr::Constant(Value::Text(s)))
            }
            TokenKind::Url(u) => {
                self.next += 1;
                Ok(Expr::Constant(Value::Url(u)))
            }
            TokenKind::Delimiter('(') => {
                self.next += 1;
                let inner = self.expression()?;
                self.expect_delimiter(')')?;
                Ok(inner)
            }
            TokenKind::Delimiter('.') | TokenKind::Delimiter('!') => self.path(VALUE.to_string()),
            TokenKind::Identifier(name) => {
                self.next += 1;
                if self.peek().is_some_and(|t| t.is_delimiter('(')) {
                    return self.call(&name, token.position);
                }
                match name.as_str() {
                    "true" => Ok(Expr::Constant(Value::Boolean(true))),
                    "false" => Ok(Expr::Constant(Value::Boolean(false))),
                    VALUE => self.path(name),
                    _ => Err(FacetError::syntax(
                        token.position,
                        format!("'(' after '{name}' or a path such as .{name}"),
                    )),
                }
            }
            _ => Err(self.error("an expression")),
        }
    }
    fn path(&mut self, root: String) -> Result<Expr> {
        let mut segments = Vec::new();
        loop {
            let forward = match self.peek() {
                Some(t) if t.is_delimiter('.') => true,
                Some(t) if t.is_delimiter('!') => false,
                _ => break,
            };
            self.next += 1;
            let property = match self.peek() {
                Some(Token { kind: TokenKind::Identifier(property), .. }) => property.clone(),
                _ => return Err(self.error("a property name")),
            };
            self.next += 1;
            segments.push(Segment { property, forward });
        }
        Ok(Expr::Path(Path { root, segments }))
    }
    fn call(&mut self, name: &str, position: usize) -> Result<Expr> {
        self.expect_delimiter('(')?;
        let mut arguments = Vec::new();
        if !self.peek().is_some_and(|t| t.is_delimiter(')')) {
            arguments.push(self.expression()?);
            while self.peek().is_some_and(|t| t.is_delimiter(',')) {
                self.next += 1;
                arguments.push(self.expression()?);
            }
        }
        self.expect_delimiter(')')?;
        if let Some(control) = Control::from_name(name) {
            check_arity(name, control.arity(), arguments.len())?;
            return Ok(Expr::ControlCall { control, arguments });
        }
        if let Some(function) = Function::from_name(name) {
            check_arity(name, function.arity(), arguments.len())?;
            return Ok(Expr::FunctionCall { function, arguments });
        }
        Err(FacetError::evaluation(name, None, format!("unknown function at offset {position}")))
    }
}

fn check_arity(name: &str, (min, max): (usize, Option<usize>), given: usize) -> Result<()> {
    let fits = given >= min && max.is_none_or(|max| given <= max);
    if fits {
        return Ok(());
    }
    let expected = match max {
        Some(max) if max == min => format!("{min}"),
        Some(max) => format!("{min} to {max}"),
        None => format!("at least {min}"),
    };
    // the first offending argument, or the first missing one
    let argument = match max {
        Some(max) if given > max => max,
        _ => given,
    };
    Err(FacetError::evaluation(
        name,
        Some(argument),
        format!("expects {expected} argument(s), got {given}"),
    ))
}
