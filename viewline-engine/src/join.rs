//! Multi-way joins.
//!
//! A join enumerates the Cartesian product of every declared source
//! view, evaluates its condition on each combination and emits a
//! synthetic document per match. The incoming object's slot is always
//! the object itself, never its stored version; sources with no store
//! yet contribute a null slot.

use std::fmt;

use serde::{Deserialize, Deserializer};

use viewline_expr::Expression;

/// A join condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// The condition evaluated on each source combination.
    pub expression: Expression,
}

/// The transient view name join outputs carry until normalization
/// recasts them into the target view.
pub(crate) const JOINED_VIEW: &str = "__joined";

impl Join {
    /// Creates a join from its condition expression.
    pub fn new(expression: Expression) -> Self {
        Self { expression }
    }
}

impl fmt::Display for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@join:{}", self.expression)
    }
}

impl<'de> Deserialize<'de> for Join {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Join::new(Expression::deserialize(deserializer)?))
    }
}

impl serde::Serialize for Join {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.expression.serialize(serializer)
    }
}
