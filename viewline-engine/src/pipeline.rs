//! Pipeline composition.
//!
//! A pipeline chains an optional join with an aggregation. Join
//! outputs are synthetic combination objects; feeding them through the
//! aggregation (an empty one when the controller declared none) tracks
//! them in their own view store, so combination updates and deletions
//! replay correctly, and stamps every result into the target view.

use tracing::debug;

use viewline_core::{Delta, Result};

use crate::aggregation::Aggregation;
use crate::engine::Engine;
use crate::join::Join;

/// An evaluable pipeline: join, then aggregation.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    join: Option<Join>,
    aggregation: Aggregation,
}

impl Pipeline {
    /// Creates a pipeline from its optional halves. A missing
    /// aggregation behaves as the empty stage chain.
    pub fn new(join: Option<Join>, aggregation: Option<Aggregation>) -> Self {
        Self {
            join,
            aggregation: aggregation.unwrap_or_default(),
        }
    }

    /// The join half, if declared.
    pub fn join(&self) -> Option<&Join> {
        self.join.as_ref()
    }

    /// The aggregation half.
    pub fn aggregation(&self) -> &Aggregation {
        &self.aggregation
    }

    /// Evaluates one source delta into output deltas.
    pub fn evaluate(&self, engine: &mut Engine, delta: Delta) -> Result<Vec<Delta>> {
        let deltas = match &self.join {
            Some(join) => engine.evaluate_join(join, delta)?,
            None => vec![delta],
        };

        let mut out = Vec::new();
        for d in deltas {
            out.extend(engine.evaluate_aggregation(&self.aggregation, d)?);
        }

        debug!(results = out.len(), "pipeline: event processed");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use viewline_core::value::Map;
    use viewline_core::{DeltaType, GroupVersionKind, Object};

    fn content(v: Value) -> Map {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    fn obj(view: &str, ns: &str, name: &str, spec: Value) -> Object {
        Object::new_view(view)
            .with_name(ns, name)
            .with_content(content(json!({"spec": spec})))
    }

    #[test]
    fn aggregation_only_pipeline() {
        let mut eng = Engine::new("target", vec![GroupVersionKind::view("source")]);
        let agg: Aggregation = serde_json::from_str(
            r#"[
                {"@select": {"@lt": ["$.spec.load", 10]}},
                {"@project": {"metadata": {"name": "$.metadata.name"}, "load": "$.spec.load"}}
            ]"#,
        )
        .unwrap();
        let pipeline = Pipeline::new(None, Some(agg));

        let out = pipeline
            .evaluate(&mut eng, Delta::added(obj("source", "ns", "a", json!({"load": 3}))))
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].delta_type, DeltaType::Added);
        assert_eq!(out[0].object.as_ref().unwrap().gvk(), GroupVersionKind::view("target"));

        // objects over the threshold are filtered out
        let out = pipeline
            .evaluate(&mut eng, Delta::added(obj("source", "ns", "b", json!({"load": 30}))))
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn join_outputs_flow_through_the_aggregation() {
        let mut eng = Engine::new(
            "target",
            vec![GroupVersionKind::view("Left"), GroupVersionKind::view("Right")],
        );
        let join: Join =
            serde_json::from_str(r#"{"@eq": ["$.Left.spec.sel", "$.Right.spec.sel"]}"#).unwrap();
        let agg: Aggregation = serde_json::from_str(
            r#"[{"@project": {
                "metadata": {"name": "$.metadata.name"},
                "left": "$.Left.metadata.name",
                "right": "$.Right.metadata.name"
            }}]"#,
        )
        .unwrap();
        let pipeline = Pipeline::new(Some(join), Some(agg));

        pipeline
            .evaluate(&mut eng, Delta::added(obj("Left", "ns", "l1", json!({"sel": "x"}))))
            .unwrap();
        let out = pipeline
            .evaluate(&mut eng, Delta::added(obj("Right", "ns", "r1", json!({"sel": "x"}))))
            .unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].delta_type, DeltaType::Added);
        let produced = out[0].object.as_ref().unwrap();
        assert_eq!(produced.gvk(), GroupVersionKind::view("target"));
        assert_eq!(produced.content().get("left"), Some(&json!("l1")));
        assert_eq!(produced.content().get("right"), Some(&json!("r1")));

        // breaking the join condition deletes the derived object
        let out = pipeline
            .evaluate(&mut eng, Delta::updated(obj("Right", "ns", "r1", json!({"sel": "y"}))))
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].delta_type, DeltaType::Deleted);
    }

    #[test]
    fn join_only_pipeline_normalizes_into_the_target_view() {
        let mut eng = Engine::new(
            "target",
            vec![GroupVersionKind::view("Left"), GroupVersionKind::view("Right")],
        );
        let join: Join =
            serde_json::from_str(r#"{"@eq": ["$.Left.spec.sel", "$.Right.spec.sel"]}"#).unwrap();
        let pipeline = Pipeline::new(Some(join), None);

        pipeline
            .evaluate(&mut eng, Delta::added(obj("Left", "ns", "l1", json!({"sel": "x"}))))
            .unwrap();
        let out = pipeline
            .evaluate(&mut eng, Delta::added(obj("Right", "ns", "r1", json!({"sel": "x"}))))
            .unwrap();

        assert_eq!(out.len(), 1);
        let produced = out[0].object.as_ref().unwrap();
        assert_eq!(produced.gvk(), GroupVersionKind::view("target"));
        assert!(produced.content().contains_key("Left"));
        assert!(produced.content().contains_key("Right"));
    }

    #[test]
    fn unchanged_deltas_pass_through() {
        let mut eng = Engine::new("target", vec![GroupVersionKind::view("source")]);
        let pipeline = Pipeline::new(None, None);
        let out = pipeline.evaluate(&mut eng, Delta::unchanged()).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].is_unchanged());
    }
}
