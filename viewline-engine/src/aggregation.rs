//! Aggregation pipelines.
//!
//! An aggregation is an ordered chain of per-object stages. Each stage
//! maps one document to zero, one or many documents; the running set
//! starts as the singleton input object and stages compose left to
//! right. The stateless stages live here; `@gather` needs engine state
//! and is evaluated by the engine against its [group
//! table](crate::gather::GatherTable).

use std::fmt;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use viewline_core::{Error, Result};
use viewline_expr::{EvalCtx, Expression, Literal, Path};

/// The recognized stage operators.
pub const STAGE_OPS: &[&str] = &["@select", "@project", "@map", "@unwind", "@gather", "@filter"];

/// An ordered chain of aggregation stages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    /// The stage expressions, applied left to right.
    pub stages: Vec<Expression>,
}

impl Aggregation {
    /// Creates an aggregation, validating the stage operators.
    pub fn new(stages: Vec<Expression>) -> Result<Self> {
        for stage in &stages {
            if !STAGE_OPS.contains(&stage.op.as_str()) {
                return Err(Error::unmarshal(
                    "aggregation",
                    stage,
                    format!("unknown aggregation stage {}", stage.op),
                ));
            }
            if stage.arg.is_none() && stage.literal.is_none() {
                return Err(Error::unmarshal(
                    "aggregation",
                    stage,
                    "no expression found in aggregation stage",
                ));
            }
        }
        Ok(Self { stages })
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@aggregate:[")?;
        for (i, s) in self.stages.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{s}")?;
        }
        write!(f, "]")
    }
}

impl<'de> Deserialize<'de> for Aggregation {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let stages = Vec::<Expression>::deserialize(deserializer)?;
        Aggregation::new(stages).map_err(serde::de::Error::custom)
    }
}

impl serde::Serialize for Aggregation {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.stages.serialize(serializer)
    }
}

/// Evaluates the `@select`/`@filter` stage condition on a document.
pub(crate) fn eval_select(stage: &Expression, doc: &Value) -> Result<bool> {
    let cond = stage
        .arg
        .as_deref()
        .ok_or_else(|| Error::InvalidArguments("no expression found in aggregation stage".into()))?;
    let res = cond.evaluate(&EvalCtx::new(doc))?;
    viewline_core::value::as_bool(&res).map_err(|_| {
        Error::InvalidArguments(format!(
            "expected conditional expression to evaluate to boolean, got {res}"
        ))
    })
}

/// Evaluates the `@project` stage: the projector result replaces the
/// document and must be a mapping.
pub(crate) fn eval_project(stage: &Expression, doc: &Value) -> Result<Value> {
    let projector = stage
        .arg
        .as_deref()
        .ok_or_else(|| Error::InvalidArguments("no expression found in aggregation stage".into()))?;
    let res = projector.evaluate(&EvalCtx::new(doc))?;
    if !res.is_object() {
        return Err(Error::InvalidArguments(format!(
            "expected projection to evaluate to a mapping, got {res}"
        )));
    }
    Ok(res)
}

/// Evaluates the `@map` stage: like `@project` without the mapping
/// requirement.
pub(crate) fn eval_map(stage: &Expression, doc: &Value) -> Result<Value> {
    let mapper = stage
        .arg
        .as_deref()
        .ok_or_else(|| Error::InvalidArguments("no expression found in aggregation stage".into()))?;
    mapper.evaluate(&EvalCtx::new(doc))
}

/// Evaluates the `@unwind` stage: the sequence at the path is exploded
/// into one document copy per element.
pub(crate) fn eval_unwind(stage: &Expression, doc: &Value) -> Result<Vec<Value>> {
    let path = stage_path(stage)?;
    let Some(list) = path.get(doc) else {
        return Err(Error::InvalidArguments(format!(
            "@unwind path {path} does not resolve"
        )));
    };
    let Value::Array(items) = list else {
        return Err(Error::InvalidArguments(format!(
            "@unwind expects a sequence at {path}, got {list}"
        )));
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let mut copy = doc.clone();
        path.set(&mut copy, item)?;
        out.push(copy);
    }
    Ok(out)
}

/// Extracts the literal JSONPath argument of a stage (`@unwind`, and
/// the target slot of `@gather`).
pub(crate) fn stage_path(stage: &Expression) -> Result<Path> {
    let arg = stage
        .arg
        .as_deref()
        .ok_or_else(|| Error::InvalidArguments("no expression found in aggregation stage".into()))?;
    expression_path(arg)
}

/// Interprets an expression node as a literal JSONPath.
pub(crate) fn expression_path(exp: &Expression) -> Result<Path> {
    match &exp.literal {
        Some(Literal::String(s)) if s.starts_with('$') => Path::parse(s),
        _ => Err(Error::InvalidArguments(format!(
            "expected a JSONPath argument, got {exp}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stage(src: &str) -> Expression {
        serde_json::from_str(src).expect("stage parses")
    }

    #[test]
    fn aggregation_validates_stage_ops() {
        let stages: Vec<Expression> =
            serde_json::from_str(r#"[{"@select": true}, {"@project": {"a": 1}}]"#).unwrap();
        assert!(Aggregation::new(stages).is_ok());

        let stages: Vec<Expression> = serde_json::from_str(r#"[{"@frobnicate": 1}]"#).unwrap();
        assert!(Aggregation::new(stages).is_err());

        let res: std::result::Result<Aggregation, _> =
            serde_json::from_str(r#"[{"@frobnicate": 1}]"#);
        assert!(res.is_err());
    }

    #[test]
    fn select_keeps_and_drops() {
        let doc = json!({"metadata": {"name": "name"}, "spec": {"a": 1}});
        assert!(eval_select(&stage(r#"{"@select": {"@eq": ["$.metadata.name", "name"]}}"#), &doc).unwrap());
        assert!(!eval_select(&stage(r#"{"@select": {"@eq": ["$.spec.a", 2]}}"#), &doc).unwrap());
        assert!(eval_select(&stage(r#"{"@select": 12}"#), &doc).is_err());
    }

    #[test]
    fn project_replaces_the_document() {
        let doc = json!({"metadata": {"namespace": "ns", "name": "name"}, "spec": {"a": 1}});
        let out = eval_project(
            &stage(r#"{"@project": {"metadata": {"name": "$.metadata.name"}, "a": "$.spec.a"}}"#),
            &doc,
        )
        .unwrap();
        assert_eq!(out, json!({"metadata": {"name": "name"}, "a": 1}));

        assert!(eval_project(&stage(r#"{"@project": "$.spec.a"}"#), &doc).is_err());
    }

    #[test]
    fn unwind_explodes_sequences() {
        let doc = json!({"metadata": {"name": "n"}, "spec": {"ports": [1, 2]}});
        let out = eval_unwind(&stage(r#"{"@unwind": "$.spec.ports"}"#), &doc).unwrap();
        assert_eq!(
            out,
            vec![
                json!({"metadata": {"name": "n"}, "spec": {"ports": 1}}),
                json!({"metadata": {"name": "n"}, "spec": {"ports": 2}}),
            ]
        );
    }

    #[test]
    fn unwind_of_empty_sequence_drops_the_object() {
        let doc = json!({"metadata": {"name": "n"}, "spec": {"ports": []}});
        let out = eval_unwind(&stage(r#"{"@unwind": "$.spec.ports"}"#), &doc).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn unwind_requires_a_resolving_sequence() {
        let doc = json!({"metadata": {"name": "n"}, "spec": {"ports": 1}});
        assert!(eval_unwind(&stage(r#"{"@unwind": "$.spec.ports"}"#), &doc).is_err());
        assert!(eval_unwind(&stage(r#"{"@unwind": "$.spec.missing"}"#), &doc).is_err());
        assert!(eval_unwind(&stage(r#"{"@unwind": 12}"#), &doc).is_err());
    }

    #[test]
    fn display_renders_the_chain() {
        let agg: Aggregation =
            serde_json::from_str(r#"[{"@select": true}, {"@project": {"a": 1}}]"#).unwrap();
        let s = agg.to_string();
        assert!(s.starts_with("@aggregate:["));
        assert!(s.contains("@select"));
        assert!(s.contains("@project"));
    }
}
