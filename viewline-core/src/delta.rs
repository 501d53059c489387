//! Change deltas.
//!
//! A [`Delta`] is one typed change event carrying one object. Sources
//! emit them, the pipeline engine consumes and re-emits them.

use serde::{Deserialize, Serialize};

use crate::object::Object;

/// The kind of change a delta describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeltaType {
    /// The object is new.
    Added,
    /// The object changed.
    Updated,
    /// The object was replaced wholesale (list-style resync).
    Replaced,
    /// Source-side hint: unknown whether the object is new. The engine
    /// reclassifies it against its view store.
    Upserted,
    /// The object is gone.
    Deleted,
    /// No change; carries no work.
    Unchanged,
}

/// A typed change event carrying one object.
#[derive(Debug, Clone, PartialEq)]
pub struct Delta {
    /// What happened.
    pub delta_type: DeltaType,
    /// The object it happened to. Absent only for [`DeltaType::Unchanged`].
    pub object: Option<Object>,
}

impl Delta {
    /// A delta of the given type.
    pub fn new(delta_type: DeltaType, object: Object) -> Self {
        Self {
            delta_type,
            object: Some(object),
        }
    }

    /// An `Added` delta.
    pub fn added(object: Object) -> Self {
        Self::new(DeltaType::Added, object)
    }

    /// An `Updated` delta.
    pub fn updated(object: Object) -> Self {
        Self::new(DeltaType::Updated, object)
    }

    /// An `Upserted` delta.
    pub fn upserted(object: Object) -> Self {
        Self::new(DeltaType::Upserted, object)
    }

    /// A `Deleted` delta.
    pub fn deleted(object: Object) -> Self {
        Self::new(DeltaType::Deleted, object)
    }

    /// The no-op delta.
    pub fn unchanged() -> Self {
        Self {
            delta_type: DeltaType::Unchanged,
            object: None,
        }
    }

    /// Whether this delta carries no work.
    pub fn is_unchanged(&self) -> bool {
        self.delta_type == DeltaType::Unchanged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_carries_no_object() {
        let d = Delta::unchanged();
        assert!(d.is_unchanged());
        assert!(d.object.is_none());
    }

    #[test]
    fn typed_constructors() {
        let obj = Object::new_view("view").with_name("ns", "n");
        assert_eq!(Delta::added(obj.clone()).delta_type, DeltaType::Added);
        assert_eq!(Delta::deleted(obj.clone()).delta_type, DeltaType::Deleted);
        assert_eq!(Delta::upserted(obj).delta_type, DeltaType::Upserted);
    }
}
