//! The in-memory view writer.
//!
//! Targets in the view group are not API-server resources: their
//! planned writes land in an in-memory view store that downstream
//! pipelines (or the embedder) can read back. Native targets go to an
//! external object writer instead; this type only covers the view
//! side.

use std::collections::HashMap;

use serde_json::Value;

use viewline_core::value::{deep_merge, Map};
use viewline_core::{Error, GroupVersionKind, Object, Result, Store};

use crate::target::WriteOp;

/// Applies planned writes to in-memory view stores.
#[derive(Debug, Default)]
pub struct ViewWriter {
    stores: HashMap<GroupVersionKind, Store>,
}

impl ViewWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one write operation.
    pub fn write(&mut self, op: &WriteOp) -> Result<()> {
        let gvk = op.object().gvk();
        if !gvk.is_view() {
            return Err(Error::InvalidArguments(format!(
                "view writer cannot apply writes to non-view resource {gvk}"
            )));
        }
        let store = self.stores.entry(gvk).or_default();
        match op {
            WriteOp::Update(obj) => store.add(obj.clone()),
            WriteOp::Delete(obj) => store.delete(obj),
            WriteOp::Patch(obj) => {
                let merged = match store.get(obj) {
                    Some(live) => {
                        let merged = deep_merge(&live.to_value(), &obj.to_value());
                        let Value::Object(content) = merged else {
                            return Err(Error::InvalidObject(
                                "patch result is not a mapping".into(),
                            ));
                        };
                        Object::from_content(content)?
                    }
                    None => obj.clone(),
                };
                store.add(merged);
            }
            WriteOp::DeletePatch(obj) => {
                if let Some(live) = store.get(obj) {
                    let mut content = live.content().clone();
                    prune_nulled(&mut content, obj.content());
                    let mut pruned = live.clone();
                    pruned.set_content(content);
                    pruned.set_namespace(obj.namespace());
                    pruned.set_name(obj.name());
                    store.add(pruned);
                }
            }
        }
        Ok(())
    }

    /// Looks up a view object by kind and identity key.
    pub fn get(&self, view: &str, key: &str) -> Option<&Object> {
        self.stores
            .get(&GroupVersionKind::view(view))?
            .get_by_key(key)
    }

    /// Lists a view's objects.
    pub fn list(&self, view: &str) -> Vec<&Object> {
        self.stores
            .get(&GroupVersionKind::view(view))
            .map(|s| s.list())
            .unwrap_or_default()
    }
}

/// Removes from `live` every field the delete patch nulled, recursing
/// into nested mappings.
fn prune_nulled(live: &mut Map, patch: &Map) {
    for (k, pv) in patch {
        if k == "apiVersion" || k == "kind" || k == "metadata" {
            continue;
        }
        match pv {
            Value::Null => {
                live.remove(k);
            }
            Value::Object(inner_patch) => {
                if let Some(Value::Object(inner_live)) = live.get_mut(k) {
                    prune_nulled(inner_live, inner_patch);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content(v: Value) -> Map {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    fn view_obj(name: &str, spec: Value) -> Object {
        Object::new_view("OutView")
            .with_name("ns", name)
            .with_content(content(json!({"spec": spec})))
    }

    #[test]
    fn update_and_delete_round_trip() {
        let mut w = ViewWriter::new();
        w.write(&WriteOp::Update(view_obj("a", json!({"x": 1})))).unwrap();
        assert_eq!(w.list("OutView").len(), 1);
        assert!(w.get("OutView", "ns/a").is_some());

        w.write(&WriteOp::Delete(view_obj("a", json!({"x": 1})))).unwrap();
        assert!(w.get("OutView", "ns/a").is_none());
    }

    #[test]
    fn patch_merges_into_the_live_object() {
        let mut w = ViewWriter::new();
        w.write(&WriteOp::Update(view_obj("a", json!({"x": 1, "y": {"z": 1}}))))
            .unwrap();
        w.write(&WriteOp::Patch(view_obj("a", json!({"y": {"w": 2}}))))
            .unwrap();

        let live = w.get("OutView", "ns/a").unwrap();
        let spec = live.content().get("spec").unwrap();
        assert_eq!(spec.get("x"), Some(&json!(1)));
        assert_eq!(spec.get("y"), Some(&json!({"z": 1, "w": 2})));
    }

    #[test]
    fn patch_of_a_missing_object_creates_it() {
        let mut w = ViewWriter::new();
        w.write(&WriteOp::Patch(view_obj("a", json!({"x": 1})))).unwrap();
        assert!(w.get("OutView", "ns/a").is_some());
    }

    #[test]
    fn delete_patch_strips_nulled_fields() {
        let mut w = ViewWriter::new();
        w.write(&WriteOp::Update(view_obj(
            "a",
            json!({"owned": 1, "other": 2, "nested": {"owned": 3, "other": 4}}),
        )))
        .unwrap();

        // the patch nulls the fields the pipeline owned
        let patch = Object::new_view("OutView")
            .with_name("ns", "a")
            .with_content(content(json!({
                "spec": {"owned": null, "nested": {"owned": null}}
            })));
        w.write(&WriteOp::DeletePatch(patch)).unwrap();

        let live = w.get("OutView", "ns/a").unwrap();
        let spec = live.content().get("spec").unwrap();
        assert_eq!(spec.get("owned"), None);
        assert_eq!(spec.get("other"), Some(&json!(2)));
        assert_eq!(spec.get("nested"), Some(&json!({"other": 4})));
    }

    #[test]
    fn rejects_non_view_targets() {
        let mut w = ViewWriter::new();
        let native = Object::from_content(content(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"namespace": "ns", "name": "d"},
        })))
        .unwrap();
        assert!(w.write(&WriteOp::Update(native)).is_err());
    }
}
