//! JSONPath navigation and mutation.
//!
//! Paths start with `$` and chain `.field`, `["field"]`, `[index]` and
//! `[?(predicate)]` steps. `$` alone (and the `$.` form) names the
//! root. As rvalues, paths that do not resolve yield nothing; as
//! lvalues in dict literals they construct missing intermediate
//! mappings and pad lists with nulls.
//!
//! The filter predicate sublanguage binds `@` to the current list
//! element and supports `==`, `!=`, `<`, `<=`, `>`, `>=`, `in [..]`
//! and bare existence checks.

use std::fmt;

use serde_json::Value;

use viewline_core::value::Map;
use viewline_core::{Error, Result};

/// One navigation step.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Mapping field access (`.field` or `["field"]`).
    Field(String),
    /// Sequence index access (`[3]`).
    Index(usize),
    /// Sequence filter (`[?(@.name == 'x')]`).
    Filter(Predicate),
}

/// A filter predicate over the current list element.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Steps below `@` selecting the compared field.
    pub steps: Vec<Step>,
    /// The comparison to apply.
    pub op: PredicateOp,
}

/// Predicate comparison operators.
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateOp {
    /// Bare `@.field`: the field resolves to a non-null value.
    Exists,
    /// `==`
    Eq(Value),
    /// `!=`
    Ne(Value),
    /// `<`
    Lt(Value),
    /// `<=`
    Le(Value),
    /// `>`
    Gt(Value),
    /// `>=`
    Ge(Value),
    /// `in [v1, v2, ...]`
    In(Vec<Value>),
}

/// A parsed JSONPath.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    steps: Vec<Step>,
    raw: String,
}

impl Path {
    /// Parses a path that starts with `$`.
    pub fn parse(input: &str) -> Result<Self> {
        let mut p = Parser::new(input);
        p.expect('$')?;

        let mut steps = Vec::new();
        loop {
            match p.peek() {
                Some('.') => {
                    p.advance();
                    // a trailing dot names the root / current node
                    if p.peek().is_none() {
                        break;
                    }
                    steps.push(Step::Field(p.identifier()?));
                }
                Some('[') => {
                    p.advance();
                    match p.peek() {
                        Some('?') => {
                            p.advance();
                            p.expect('(')?;
                            let pred = p.predicate()?;
                            p.expect(')')?;
                            p.expect(']')?;
                            steps.push(Step::Filter(pred));
                        }
                        Some('\'') | Some('"') => {
                            let field = p.string_literal()?;
                            p.expect(']')?;
                            steps.push(Step::Field(field));
                        }
                        Some(c) if c.is_ascii_digit() => {
                            let idx = p.index()?;
                            p.expect(']')?;
                            steps.push(Step::Index(idx));
                        }
                        _ => {
                            return Err(p.error("invalid bracket step"));
                        }
                    }
                }
                None => break,
                _ => return Err(p.error("unexpected character in path")),
            }
        }

        Ok(Self {
            steps,
            raw: input.to_string(),
        })
    }

    /// Whether this path names the bare root.
    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    /// Resolves the path against a document.
    ///
    /// Returns `None` when any step does not resolve: a missing field,
    /// an out-of-range index, a step into a scalar, or a filter with no
    /// match. When a filter matches several elements, navigation
    /// continues through each and the last resolving result wins.
    pub fn get(&self, root: &Value) -> Option<Value> {
        get_at(&self.steps, root)
    }

    /// Writes a value at the path, constructing intermediate mappings
    /// and padding sequences with nulls.
    ///
    /// Writing to the bare root requires a mapping value, which
    /// replaces the root contents. Filter steps cannot be assigned to.
    pub fn set(&self, root: &mut Value, value: Value) -> Result<()> {
        if self.steps.is_empty() {
            if !value.is_object() {
                return Err(Error::InvalidArguments(format!(
                    "cannot copy non-mapping value {value} to the document root"
                )));
            }
            *root = value;
            return Ok(());
        }
        set_at(&self.steps, root, value)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn get_at(steps: &[Step], v: &Value) -> Option<Value> {
    let Some(step) = steps.first() else {
        return Some(v.clone());
    };
    let rest = &steps[1..];
    match step {
        Step::Field(f) => get_at(rest, v.as_object()?.get(f)?),
        Step::Index(i) => get_at(rest, v.as_array()?.get(*i)?),
        Step::Filter(pred) => {
            let mut last = None;
            for el in v.as_array()? {
                if pred.matches(el) {
                    if let Some(found) = get_at(rest, el) {
                        last = Some(found);
                    }
                }
            }
            last
        }
    }
}

fn set_at(steps: &[Step], v: &mut Value, value: Value) -> Result<()> {
    let Some((step, rest)) = steps.split_first() else {
        return Ok(());
    };
    match step {
        Step::Field(f) => {
            if !v.is_object() {
                *v = Value::Object(Map::new());
            }
            let Value::Object(m) = v else {
                return Err(Error::InvalidArguments(format!(
                    "cannot write field {f} into a non-mapping"
                )));
            };
            if rest.is_empty() {
                m.insert(f.clone(), value);
                return Ok(());
            }
            let slot = m.entry(f.clone()).or_insert(Value::Null);
            set_at(rest, slot, value)
        }
        Step::Index(i) => {
            if !v.is_array() {
                *v = Value::Array(Vec::new());
            }
            let Value::Array(list) = v else {
                return Err(Error::InvalidArguments(format!(
                    "cannot write index {i} into a non-sequence"
                )));
            };
            while list.len() <= *i {
                list.push(Value::Null);
            }
            if rest.is_empty() {
                list[*i] = value;
                return Ok(());
            }
            set_at(rest, &mut list[*i], value)
        }
        Step::Filter(_) => Err(Error::InvalidArguments(
            "filter steps cannot be used in setter paths".into(),
        )),
    }
}

impl Predicate {
    /// Evaluates the predicate against one list element.
    pub fn matches(&self, element: &Value) -> bool {
        let resolved = get_at(&self.steps, element);
        match &self.op {
            PredicateOp::Exists => matches!(resolved, Some(v) if !v.is_null()),
            PredicateOp::Eq(want) => resolved.is_some_and(|got| loose_eq(&got, want)),
            PredicateOp::Ne(want) => resolved.is_some_and(|got| !loose_eq(&got, want)),
            PredicateOp::Lt(want) => compare(resolved.as_ref(), want).is_some_and(|o| o.is_lt()),
            PredicateOp::Le(want) => compare(resolved.as_ref(), want).is_some_and(|o| o.is_le()),
            PredicateOp::Gt(want) => compare(resolved.as_ref(), want).is_some_and(|o| o.is_gt()),
            PredicateOp::Ge(want) => compare(resolved.as_ref(), want).is_some_and(|o| o.is_ge()),
            PredicateOp::In(wants) => {
                resolved.is_some_and(|got| wants.iter().any(|w| loose_eq(&got, w)))
            }
        }
    }
}

/// Structural equality, except that numbers compare numerically so an
/// integer document field matches a `1.0` predicate literal.
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare(a: Option<&Value>, b: &Value) -> Option<std::cmp::Ordering> {
    let a = a?;
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    if let (Some(x), Some(y)) = (a.as_str(), b.as_str()) {
        return Some(x.cmp(y));
    }
    None
}

/// Recursive-descent parser state.
struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn error(&self, message: &str) -> Error {
        Error::unmarshal(
            "JSONPath",
            self.input,
            format!("{message} at position {}", self.pos),
        )
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        match self.peek() {
            Some(c) if c == expected => {
                self.advance();
                Ok(())
            }
            _ => Err(self.error(&format!("expected '{expected}'"))),
        }
    }

    fn identifier(&mut self) -> Result<String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            self.advance();
        }
        if self.pos == start {
            return Err(self.error("expected field name"));
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn index(&mut self) -> Result<usize> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        self.input[start..self.pos]
            .parse()
            .map_err(|_| self.error("invalid index"))
    }

    fn string_literal(&mut self) -> Result<String> {
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected string literal")),
        };
        self.advance();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == quote {
                let s = self.input[start..self.pos].to_string();
                self.advance();
                return Ok(s);
            }
            self.advance();
        }
        Err(self.error("unterminated string literal"))
    }

    fn number(&mut self) -> Result<Value> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.advance();
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            self.advance();
        }
        let text = &self.input[start..self.pos];
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Value::from(i));
        }
        text.parse::<f64>()
            .map(Value::from)
            .map_err(|_| self.error("invalid number"))
    }

    fn predicate(&mut self) -> Result<Predicate> {
        self.skip_whitespace();
        self.expect('@')?;

        let mut steps = Vec::new();
        loop {
            match self.peek() {
                Some('.') => {
                    self.advance();
                    if self.peek().is_none() {
                        return Err(self.error("dangling '.' in predicate"));
                    }
                    steps.push(Step::Field(self.identifier()?));
                }
                Some('[') => {
                    self.advance();
                    match self.peek() {
                        Some('\'') | Some('"') => {
                            let field = self.string_literal()?;
                            self.expect(']')?;
                            steps.push(Step::Field(field));
                        }
                        Some(c) if c.is_ascii_digit() => {
                            let idx = self.index()?;
                            self.expect(']')?;
                            steps.push(Step::Index(idx));
                        }
                        _ => return Err(self.error("invalid bracket step in predicate")),
                    }
                }
                _ => break,
            }
        }

        self.skip_whitespace();
        let op = match self.peek() {
            Some(')') => PredicateOp::Exists,
            Some('=') => {
                self.advance();
                self.expect('=')?;
                PredicateOp::Eq(self.predicate_value()?)
            }
            Some('!') => {
                self.advance();
                self.expect('=')?;
                PredicateOp::Ne(self.predicate_value()?)
            }
            Some('<') => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    PredicateOp::Le(self.predicate_value()?)
                } else {
                    PredicateOp::Lt(self.predicate_value()?)
                }
            }
            Some('>') => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    PredicateOp::Ge(self.predicate_value()?)
                } else {
                    PredicateOp::Gt(self.predicate_value()?)
                }
            }
            Some('i') => {
                if self.identifier()? != "in" {
                    return Err(self.error("unknown predicate operator"));
                }
                self.skip_whitespace();
                self.expect('[')?;
                let mut values = Vec::new();
                loop {
                    values.push(self.scalar_value()?);
                    self.skip_whitespace();
                    match self.peek() {
                        Some(',') => {
                            self.advance();
                        }
                        Some(']') => {
                            self.advance();
                            break;
                        }
                        _ => return Err(self.error("expected ',' or ']' in value list")),
                    }
                }
                PredicateOp::In(values)
            }
            _ => return Err(self.error("unknown predicate operator")),
        };

        self.skip_whitespace();
        Ok(Predicate { steps, op })
    }

    fn predicate_value(&mut self) -> Result<Value> {
        self.skip_whitespace();
        self.scalar_value()
    }

    fn scalar_value(&mut self) -> Result<Value> {
        self.skip_whitespace();
        match self.peek() {
            Some('\'') | Some('"') => Ok(Value::String(self.string_literal()?)),
            Some(c) if c.is_ascii_digit() || c == '-' => self.number(),
            Some(c) if c.is_alphabetic() => match self.identifier()?.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                "null" => Ok(Value::Null),
                other => Err(self.error(&format!("unknown literal '{other}'"))),
            },
            _ => Err(self.error("expected literal value")),
        }
    }
}
