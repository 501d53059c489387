//! Kubernetes-style label selectors.
//!
//! `@selector` accepts either the short form, a bare mapping of
//! required label values, or the full form with `matchLabels` and
//! `matchExpressions`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use viewline_core::{Error, Result};

/// A label selector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Selector {
    /// Labels that must be present with exactly these values.
    pub match_labels: BTreeMap<String, String>,
    /// Set-based requirements, all of which must hold.
    pub match_expressions: Vec<Requirement>,
}

/// One set-based selector requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    /// The label key the requirement applies to.
    pub key: String,
    /// The requirement operator.
    pub operator: Operator,
    /// The value set for `In`/`NotIn`.
    #[serde(default)]
    pub values: Vec<String>,
}

/// Selector requirement operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    /// The label value must be in the value set.
    In,
    /// The label must be absent or its value outside the value set.
    NotIn,
    /// The label key must be present.
    Exists,
    /// The label key must be absent.
    DoesNotExist,
}

impl Selector {
    /// Builds a selector from an evaluated selector document.
    ///
    /// A mapping containing neither `matchLabels` nor
    /// `matchExpressions` is the short form: every entry is a required
    /// label value.
    pub fn from_value(v: &Value) -> Result<Self> {
        let m = v
            .as_object()
            .ok_or_else(|| Error::InvalidArguments(format!("selector must be a mapping, got {v}")))?;

        if !m.contains_key("matchLabels") && !m.contains_key("matchExpressions") {
            let mut match_labels = BTreeMap::new();
            for (k, v) in m {
                let s = v.as_str().ok_or_else(|| {
                    Error::InvalidArguments(format!("label value for {k} must be a string, got {v}"))
                })?;
                match_labels.insert(k.clone(), s.to_string());
            }
            return Ok(Self {
                match_labels,
                match_expressions: Vec::new(),
            });
        }

        serde_json::from_value(v.clone())
            .map_err(|e| Error::unmarshal("selector", v, e))
    }

    /// Evaluates the selector against a labelset document (a mapping
    /// from string to string; null counts as the empty labelset).
    pub fn matches_value(&self, labels: &Value) -> Result<bool> {
        let mut set = BTreeMap::new();
        match labels {
            Value::Null => {}
            Value::Object(m) => {
                for (k, v) in m {
                    let s = v.as_str().ok_or_else(|| {
                        Error::InvalidArguments(format!(
                            "label value for {k} must be a string, got {v}"
                        ))
                    })?;
                    set.insert(k.as_str(), s);
                }
            }
            other => {
                return Err(Error::InvalidArguments(format!(
                    "labelset must be a mapping, got {other}"
                )))
            }
        }
        Ok(self.matches(&set))
    }

    /// Evaluates the selector against a labelset.
    pub fn matches(&self, labels: &BTreeMap<&str, &str>) -> bool {
        for (k, v) in &self.match_labels {
            if labels.get(k.as_str()) != Some(&v.as_str()) {
                return false;
            }
        }
        self.match_expressions.iter().all(|r| r.matches(labels))
    }
}

impl Requirement {
    fn matches(&self, labels: &BTreeMap<&str, &str>) -> bool {
        let value = labels.get(self.key.as_str()).copied();
        match self.operator {
            Operator::In => value.is_some_and(|v| self.values.iter().any(|w| w.as_str() == v)),
            Operator::NotIn => !value.is_some_and(|v| self.values.iter().any(|w| w.as_str() == v)),
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
        }
    }
}
