//! The canonical expression tree and its surface-syntax elaboration.
//!
//! An expression is a tagged node `{op, literal?, arg?}`. Elaboration
//! rules, applied during deserialization:
//!
//! - scalars become `@bool`/`@int`/`@float`/`@string` literals (JSON
//!   integers stay i64, other numbers become f64)
//! - sequences become an `@list` literal of sub-expressions
//! - a mapping whose single key starts with `@` is an operator call;
//!   its value is the operand, parsed recursively (`@dict` instead
//!   takes its mapping literal)
//! - any other mapping is a dict literal; keys may be JSONPath setters,
//!   values are parsed recursively
//!
//! Strings beginning with `$` stay plain `@string` literals here;
//! JSONPath semantics only activate at evaluation time.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use viewline_core::{Error, Result};

/// Operator-specific inline data of an expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// The null literal.
    Null,
    /// A boolean literal (`@bool`).
    Bool(bool),
    /// An integer literal (`@int`).
    Int(i64),
    /// A float literal (`@float`).
    Float(f64),
    /// A string literal (`@string`), possibly a JSONPath.
    String(String),
    /// An ordered list of sub-expressions (`@list`).
    List(Vec<Expression>),
    /// A dict literal: ordered key/sub-expression pairs (`@dict`).
    /// Keys may be JSONPath setters.
    Dict(Vec<(String, Expression)>),
}

/// A node of the canonical expression tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    /// The operator tag, always `@`-prefixed after elaboration.
    pub op: String,
    /// Inline data for literal-style operators.
    pub literal: Option<Literal>,
    /// The operand for call-style operators.
    pub arg: Option<Box<Expression>>,
}

impl Expression {
    fn literal(op: &str, literal: Literal) -> Self {
        Self {
            op: op.into(),
            literal: Some(literal),
            arg: None,
        }
    }

    fn call(op: &str, arg: Expression) -> Self {
        Self {
            op: op.into(),
            literal: None,
            arg: Some(Box::new(arg)),
        }
    }

    /// Elaborates a surface document into the canonical tree.
    pub fn from_value(v: &Value) -> Result<Self> {
        match v {
            Value::Null => Ok(Self::literal("@null", Literal::Null)),
            Value::Bool(b) => Ok(Self::literal("@bool", Literal::Bool(*b))),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::literal("@int", Literal::Int(i)))
                } else if let Some(f) = n.as_f64() {
                    Ok(Self::literal("@float", Literal::Float(f)))
                } else {
                    Err(Error::unmarshal("expression", v, "unrepresentable number"))
                }
            }
            Value::String(s) => Ok(Self::literal("@string", Literal::String(s.clone()))),
            Value::Array(items) => {
                let subs = items.iter().map(Self::from_value).collect::<Result<_>>()?;
                Ok(Self::literal("@list", Literal::List(subs)))
            }
            Value::Object(m) => {
                let op_keys = m.keys().filter(|k| k.starts_with('@')).count();
                if op_keys == 0 {
                    let entries = m
                        .iter()
                        .map(|(k, v)| Ok((k.clone(), Self::from_value(v)?)))
                        .collect::<Result<_>>()?;
                    return Ok(Self::literal("@dict", Literal::Dict(entries)));
                }
                if op_keys != m.len() || m.len() != 1 {
                    return Err(Error::unmarshal(
                        "expression",
                        Value::Object(m.clone()),
                        "an operator call must be a mapping with a single @-key",
                    ));
                }
                let Some((op, operand)) = m.iter().next() else {
                    return Err(Error::unmarshal("expression", v, "empty operator mapping"));
                };
                if op == "@dict" {
                    let inner = operand.as_object().ok_or_else(|| {
                        Error::unmarshal("expression", operand, "@dict takes a mapping literal")
                    })?;
                    let entries = inner
                        .iter()
                        .map(|(k, v)| Ok((k.clone(), Self::from_value(v)?)))
                        .collect::<Result<_>>()?;
                    return Ok(Self::literal("@dict", Literal::Dict(entries)));
                }
                Ok(Self::call(op, Self::from_value(operand)?))
            }
        }
    }

    /// Renders the node back into its surface document form.
    ///
    /// Used for error messages and serialization; the distinction
    /// between implicit and explicit `@list`/`@dict` forms is not
    /// preserved.
    pub fn to_value(&self) -> Value {
        if let Some(lit) = &self.literal {
            return match lit {
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(i) => Value::from(*i),
                Literal::Float(f) => Value::from(*f),
                Literal::String(s) => Value::String(s.clone()),
                Literal::List(items) => Value::Array(items.iter().map(Self::to_value).collect()),
                Literal::Dict(entries) => Value::Object(
                    entries
                        .iter()
                        .map(|(k, e)| (k.clone(), e.to_value()))
                        .collect(),
                ),
            };
        }
        let mut m = serde_json::Map::new();
        let arg = self.arg.as_ref().map(|a| a.to_value()).unwrap_or(Value::Null);
        m.insert(self.op.clone(), arg);
        Value::Object(m)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl<'de> Deserialize<'de> for Expression {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = Value::deserialize(deserializer)?;
        Expression::from_value(&v).map_err(D::Error::custom)
    }
}

impl Serialize for Expression {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value().serialize(serializer)
    }
}
