//! The unstructured object model.
//!
//! An [`Object`] is a document with the distinguished Kubernetes shape:
//! `apiVersion`, `kind`, and a `metadata` mapping holding `namespace`,
//! `name`, labels and annotations. The `(kind, namespace, name)` triple
//! is the object's identity. View objects stamp their group/version
//! from the owning runtime and keep it immutable from then on.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::gvk::GroupVersionKind;
use crate::value::Map;

/// An unstructured object with a group/version/kind identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    content: Map,
}

impl Object {
    /// Creates an empty view object for the given view name.
    ///
    /// The `apiVersion` and `kind` fields are stamped from the view and
    /// survive any later content replacement.
    pub fn new_view(view: impl Into<String>) -> Self {
        let gvk = GroupVersionKind::view(view);
        let mut content = Map::new();
        content.insert("apiVersion".into(), Value::String(gvk.api_version()));
        content.insert("kind".into(), Value::String(gvk.kind));
        Self { content }
    }

    /// Creates an object from raw content.
    ///
    /// The content must carry string `apiVersion` and `kind` fields.
    pub fn from_content(content: Map) -> Result<Self> {
        let api_version = content.get("apiVersion").and_then(Value::as_str);
        let kind = content.get("kind").and_then(Value::as_str);
        if api_version.is_none() || kind.is_none() {
            return Err(Error::InvalidObject(
                "object content must carry string apiVersion and kind".into(),
            ));
        }
        Ok(Self { content })
    }

    /// Replaces the object content, keeping `apiVersion` and `kind`.
    pub fn set_content(&mut self, content: Map) {
        let api_version = self.content.get("apiVersion").cloned();
        let kind = self.content.get("kind").cloned();
        self.content = content;
        if let Some(v) = api_version {
            self.content.insert("apiVersion".into(), v);
        }
        if let Some(v) = kind {
            self.content.insert("kind".into(), v);
        }
    }

    /// Builder form of [`set_content`](Self::set_content).
    pub fn with_content(mut self, content: Map) -> Self {
        // merge rather than replace so metadata set earlier survives
        for (k, v) in content {
            if k == "apiVersion" || k == "kind" {
                continue;
            }
            self.content.insert(k, v);
        }
        self
    }

    /// Builder that sets namespace and name.
    pub fn with_name(mut self, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        self.set_namespace(namespace);
        self.set_name(name);
        self
    }

    /// The object's group/version/kind.
    pub fn gvk(&self) -> GroupVersionKind {
        let api_version = self
            .content
            .get("apiVersion")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let kind = self
            .content
            .get("kind")
            .and_then(Value::as_str)
            .unwrap_or_default();
        GroupVersionKind::from_api_version(api_version, kind)
    }

    /// The object name, or `""` when unset.
    pub fn name(&self) -> &str {
        self.metadata_str("name")
    }

    /// The object namespace, or `""` when unset.
    pub fn namespace(&self) -> &str {
        self.metadata_str("namespace")
    }

    /// Sets the object name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.metadata_mut()
            .insert("name".into(), Value::String(name.into()));
    }

    /// Sets the object namespace.
    pub fn set_namespace(&mut self, namespace: impl Into<String>) {
        self.metadata_mut()
            .insert("namespace".into(), Value::String(namespace.into()));
    }

    /// The identity key within a view store: `namespace/name`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace(), self.name())
    }

    /// The object labels, if any.
    pub fn labels(&self) -> Option<&Map> {
        self.metadata()?.get("labels")?.as_object()
    }

    /// Replaces the object labels.
    pub fn set_labels<K, V>(&mut self, labels: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let map: Map = labels
            .into_iter()
            .map(|(k, v)| (k.into(), Value::String(v.into())))
            .collect();
        self.metadata_mut().insert("labels".into(), Value::Object(map));
    }

    /// The object annotations, if any.
    pub fn annotations(&self) -> Option<&Map> {
        self.metadata()?.get("annotations")?.as_object()
    }

    /// Replaces the object annotations.
    pub fn set_annotations<K, V>(&mut self, annotations: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let map: Map = annotations
            .into_iter()
            .map(|(k, v)| (k.into(), Value::String(v.into())))
            .collect();
        self.metadata_mut()
            .insert("annotations".into(), Value::Object(map));
    }

    /// The raw unstructured content.
    pub fn content(&self) -> &Map {
        &self.content
    }

    /// The content as a document value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.content.clone())
    }

    fn metadata(&self) -> Option<&Map> {
        self.content.get("metadata")?.as_object()
    }

    fn metadata_str(&self, field: &str) -> &str {
        self.metadata()
            .and_then(|m| m.get(field))
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    fn metadata_mut(&mut self) -> &mut Map {
        let meta = self
            .content
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()));
        if !meta.is_object() {
            *meta = Value::Object(Map::new());
        }
        match meta {
            Value::Object(m) => m,
            _ => unreachable!("metadata was just replaced with a mapping"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(v: Value) -> Map {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn view_object_stamps_api_version_and_kind() {
        let obj = Object::new_view("view");
        assert_eq!(obj.gvk(), GroupVersionKind::view("view"));
        assert_eq!(
            obj.to_value(),
            json!({"apiVersion": "view.viewline.dev/v1alpha1", "kind": "view"})
        );
    }

    #[test]
    fn metadata_round_trip() {
        let obj = Object::new_view("view").with_name("ns", "test-1");
        assert_eq!(obj.namespace(), "ns");
        assert_eq!(obj.name(), "test-1");
        assert_eq!(obj.key(), "ns/test-1");
        assert_eq!(
            obj.to_value(),
            json!({
                "apiVersion": "view.viewline.dev/v1alpha1",
                "kind": "view",
                "metadata": {"namespace": "ns", "name": "test-1"},
            })
        );
    }

    #[test]
    fn content_builder_keeps_metadata_and_view() {
        let obj = Object::new_view("view")
            .with_name("ns", "test-1")
            .with_content(as_map(json!({"a": 1, "b": {"c": 2}})));
        assert_eq!(obj.name(), "test-1");
        assert_eq!(obj.content().get("a"), Some(&json!(1)));
        assert_eq!(obj.gvk().kind, "view");
    }

    #[test]
    fn set_content_cannot_change_the_view() {
        let mut obj = Object::new_view("view");
        obj.set_content(as_map(json!({
            "apiVersion": "view.viewline.dev/v1alpha1",
            "kind": "different-view",
            "a": 1,
        })));
        assert_eq!(obj.gvk().kind, "view");
        assert_eq!(obj.content().get("a"), Some(&json!(1)));
    }

    #[test]
    fn native_object_from_content() {
        let obj = Object::from_content(as_map(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"namespace": "default", "name": "dep"},
        })))
        .unwrap();
        assert_eq!(obj.gvk(), GroupVersionKind::new("apps", "v1", "Deployment"));
        assert_eq!(obj.key(), "default/dep");

        assert!(Object::from_content(as_map(json!({"metadata": {}}))).is_err());
    }

    #[test]
    fn labels_and_annotations() {
        let mut obj = Object::new_view("view").with_name("ns", "n");
        obj.set_labels([("app", "nginx")]);
        obj.set_annotations([("note", "x")]);
        assert_eq!(obj.labels().unwrap().get("app"), Some(&json!("nginx")));
        assert_eq!(obj.annotations().unwrap().get("note"), Some(&json!("x")));
    }

    #[test]
    fn deep_equality_is_structural() {
        let a = Object::new_view("view").with_name("ns", "n");
        let b = Object::new_view("view").with_name("ns", "n");
        assert_eq!(a, b);
        let c = b.clone().with_content(as_map(json!({"a": 1})));
        assert_ne!(a, c);
    }
}
