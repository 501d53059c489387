//! Target write planning.
//!
//! A [`Target`] turns output deltas into declarative [`WriteOp`]s for
//! the external object writer. `Updater` targets enforce deltas as
//! full objects; `Patcher` targets produce merge-patch documents, and
//! deletions become a *delete patch* that nulls every scalar leaf so
//! the writer can strip exactly the fields the pipeline owns.
//! Applying the ops against an API server is the writer's business.

use serde_json::Value;

use viewline_core::value::Map;
use viewline_core::{Delta, DeltaType, Error, GroupVersionKind, Object, Result};

use crate::config::{TargetSpec, TargetType};

/// A planned write against the target resource.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create the object or update it in place. The writer merges
    /// metadata: labels and annotations are only ever added, so a
    /// pipeline cannot accidentally strip them from a live object.
    Update(Object),
    /// Remove the object.
    Delete(Object),
    /// Apply the object content as a merge patch.
    Patch(Object),
    /// Apply the object content as a delete patch: scalar leaves are
    /// null, so a strategic merge removes them from the live object.
    DeletePatch(Object),
}

impl WriteOp {
    /// The object the operation applies to.
    pub fn object(&self) -> &Object {
        match self {
            WriteOp::Update(o) | WriteOp::Delete(o) | WriteOp::Patch(o) | WriteOp::DeletePatch(o) => o,
        }
    }
}

/// A write planner for one controller target.
#[derive(Debug, Clone)]
pub struct Target {
    gvk: GroupVersionKind,
    target_type: TargetType,
}

impl Target {
    /// Builds the planner from a target declaration.
    pub fn from_spec(spec: &TargetSpec) -> Result<Self> {
        Ok(Self {
            gvk: spec.gvk()?,
            target_type: spec.target_type,
        })
    }

    /// The target GVK written objects carry.
    pub fn gvk(&self) -> &GroupVersionKind {
        &self.gvk
    }

    /// Plans the write for one output delta. `Unchanged` deltas plan
    /// nothing.
    pub fn plan(&self, delta: &Delta) -> Result<Option<WriteOp>> {
        let Some(obj) = &delta.object else {
            if delta.is_unchanged() {
                return Ok(None);
            }
            return Err(Error::InvalidObject("empty object in delta".into()));
        };

        let op = match (self.target_type, delta.delta_type) {
            (_, DeltaType::Unchanged) => return Ok(None),
            (TargetType::Updater, DeltaType::Deleted) => WriteOp::Delete(self.recast(obj)?),
            (TargetType::Updater, _) => WriteOp::Update(self.recast(obj)?),
            (TargetType::Patcher, DeltaType::Deleted) => {
                WriteOp::DeletePatch(self.delete_patch(obj)?)
            }
            (TargetType::Patcher, _) => WriteOp::Patch(self.recast(obj)?),
        };
        Ok(Some(op))
    }

    /// Rebuilds the delta object with the target GVK stamped on.
    fn recast(&self, obj: &Object) -> Result<Object> {
        let mut content = obj.content().clone();
        content.insert("apiVersion".into(), Value::String(self.gvk.api_version()));
        content.insert("kind".into(), Value::String(self.gvk.kind.clone()));
        Object::from_content(content)
    }

    /// Builds the delete patch: every scalar leaf nulled, sequences
    /// copied through, identity fields kept intact.
    fn delete_patch(&self, obj: &Object) -> Result<Object> {
        let mut patch = null_leaves(obj.content());
        patch.insert("apiVersion".into(), Value::String(self.gvk.api_version()));
        patch.insert("kind".into(), Value::String(self.gvk.kind.clone()));
        let mut out = Object::from_content(patch)?;
        out.set_namespace(obj.namespace());
        out.set_name(obj.name());
        Ok(out)
    }
}

/// Replaces every scalar leaf of a mapping with null, recursing into
/// nested mappings. Sequences are copied through unchanged; nulling
/// their elements one by one is left to the downstream writer.
fn null_leaves(m: &Map) -> Map {
    let mut out = Map::new();
    for (k, v) in m {
        let nulled = match v {
            Value::Object(inner) => Value::Object(null_leaves(inner)),
            Value::Array(items) => Value::Array(items.clone()),
            _ => Value::Null,
        };
        out.insert(k.clone(), nulled);
    }
    out
}
