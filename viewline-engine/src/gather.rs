//! The `@gather` group table.
//!
//! `@gather([key, target])` folds objects into groups: objects are
//! grouped by the document projected from `key`, and the value at
//! `target` is collected into an ordered sequence. The table is
//! per-pipeline state; the engine works on a copy during an event and
//! commits it only after the whole replay succeeded, so a failed event
//! leaves the groups untouched.

use std::collections::HashMap;

use serde_json::Value;

use viewline_core::value::{canonical_string, Map};

/// One gather group.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    /// The projected key document.
    pub key: Value,
    /// The collected elements, in arrival order.
    pub elements: Vec<Value>,
}

/// The per-pipeline gather state, keyed by stage index and the
/// canonical serialization of the group key document.
#[derive(Debug, Clone, Default)]
pub struct GatherTable {
    groups: HashMap<(usize, String), Group>,
}

/// What happened to a group when an element was added or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupChange {
    /// The group did not exist before.
    Created,
    /// The group existed and still has elements.
    Changed,
    /// The group lost its last element and was dropped.
    Emptied,
}

impl GatherTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an element to the group for `key` under the given stage.
    /// Returns the group's new contents and what changed.
    pub fn add(&mut self, stage: usize, key: &Value, element: Value) -> (Group, GroupChange) {
        let id = (stage, canonical_string(key));
        let entry = self.groups.entry(id);
        let change = match &entry {
            std::collections::hash_map::Entry::Occupied(_) => GroupChange::Changed,
            std::collections::hash_map::Entry::Vacant(_) => GroupChange::Created,
        };
        let group = entry.or_insert_with(|| Group {
            key: key.clone(),
            elements: Vec::new(),
        });
        group.elements.push(element);
        (group.clone(), change)
    }

    /// Removes one occurrence of an element from the group for `key`.
    /// Returns the group's remaining contents, or `None` when the group
    /// or the element is unknown.
    pub fn remove(
        &mut self,
        stage: usize,
        key: &Value,
        element: &Value,
    ) -> Option<(Group, GroupChange)> {
        let id = (stage, canonical_string(key));
        let group = self.groups.get_mut(&id)?;
        let pos = group.elements.iter().position(|e| e == element)?;
        group.elements.remove(pos);
        let snapshot = group.clone();
        if snapshot.elements.is_empty() {
            self.groups.remove(&id);
            Some((snapshot, GroupChange::Emptied))
        } else {
            Some((snapshot, GroupChange::Changed))
        }
    }

    /// The number of live groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether the table has no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl Group {
    /// Renders the group into its output document: the key document
    /// with the collected elements written at `target` and the group
    /// name stamped from the canonical key serialization.
    pub fn to_document(&self, target: &viewline_expr::Path) -> viewline_core::Result<Value> {
        let mut doc = match &self.key {
            Value::Object(m) => Value::Object(m.clone()),
            other => {
                let mut m = Map::new();
                m.insert("key".into(), other.clone());
                Value::Object(m)
            }
        };
        target.set(&mut doc, Value::Array(self.elements.clone()))?;
        let name = canonical_string(&self.key);
        viewline_expr::Path::parse("$.metadata.name")?.set(&mut doc, Value::String(name))?;
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use viewline_expr::Path;

    #[test]
    fn add_and_remove_track_group_lifecycle() {
        let mut table = GatherTable::new();
        let key = json!({"app": "nginx"});

        let (group, change) = table.add(0, &key, json!(1));
        assert_eq!(change, GroupChange::Created);
        assert_eq!(group.elements, vec![json!(1)]);

        let (group, change) = table.add(0, &key, json!(2));
        assert_eq!(change, GroupChange::Changed);
        assert_eq!(group.elements, vec![json!(1), json!(2)]);

        let (group, change) = table.remove(0, &key, &json!(1)).unwrap();
        assert_eq!(change, GroupChange::Changed);
        assert_eq!(group.elements, vec![json!(2)]);

        let (_, change) = table.remove(0, &key, &json!(2)).unwrap();
        assert_eq!(change, GroupChange::Emptied);
        assert!(table.is_empty());
    }

    #[test]
    fn remove_of_unknown_element_is_none() {
        let mut table = GatherTable::new();
        let key = json!({"app": "nginx"});
        assert!(table.remove(0, &key, &json!(1)).is_none());
        table.add(0, &key, json!(1));
        assert!(table.remove(0, &key, &json!(9)).is_none());
    }

    #[test]
    fn stages_do_not_share_groups() {
        let mut table = GatherTable::new();
        let key = json!({"k": 1});
        table.add(0, &key, json!("a"));
        let (_, change) = table.add(1, &key, json!("b"));
        assert_eq!(change, GroupChange::Created);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn group_identity_ignores_key_field_order() {
        let mut table = GatherTable::new();
        let k1 = json!({"a": 1, "b": 2});
        let k2 = serde_json::from_str::<Value>(r#"{"b": 2, "a": 1}"#).unwrap();
        table.add(0, &k1, json!("x"));
        let (group, change) = table.add(0, &k2, json!("y"));
        assert_eq!(change, GroupChange::Changed);
        assert_eq!(group.elements.len(), 2);
    }

    #[test]
    fn group_document_carries_key_elements_and_name() {
        let group = Group {
            key: json!({"app": "nginx"}),
            elements: vec![json!(1), json!(2)],
        };
        let target = Path::parse("$.spec.ports").unwrap();
        let doc = group.to_document(&target).unwrap();
        assert_eq!(
            doc,
            json!({
                "app": "nginx",
                "spec": {"ports": [1, 2]},
                "metadata": {"name": r#"{"app":"nginx"}"#},
            })
        );
    }

    #[test]
    fn scalar_keys_are_wrapped() {
        let group = Group {
            key: json!("nginx"),
            elements: vec![json!(1)],
        };
        let target = Path::parse("$.items").unwrap();
        let doc = group.to_document(&target).unwrap();
        assert_eq!(doc.get("key"), Some(&json!("nginx")));
        assert_eq!(doc.get("items"), Some(&json!([1])));
    }
}
