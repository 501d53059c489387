//! Group/version/kind identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The API group of view objects.
pub const VIEW_GROUP: &str = "view.viewline.dev";

/// The API version of view objects.
pub const VIEW_VERSION: &str = "v1alpha1";

/// A fully qualified object kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersionKind {
    /// API group; empty for the core group.
    #[serde(default)]
    pub group: String,
    /// API version.
    pub version: String,
    /// Object kind.
    pub kind: String,
}

impl GroupVersionKind {
    /// A GVK in an arbitrary group.
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// The GVK of a view with the given name.
    pub fn view(kind: impl Into<String>) -> Self {
        Self::new(VIEW_GROUP, VIEW_VERSION, kind)
    }

    /// Whether this GVK names a view.
    pub fn is_view(&self) -> bool {
        self.group == VIEW_GROUP
    }

    /// The `apiVersion` rendering (`group/version`, or bare `version`
    /// for the core group).
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Parses an `apiVersion` string plus a kind.
    pub fn from_api_version(api_version: &str, kind: impl Into<String>) -> Self {
        match api_version.split_once('/') {
            Some((group, version)) => Self::new(group, version, kind),
            None => Self::new("", api_version, kind),
        }
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let group = if self.group.is_empty() { "core" } else { &self.group };
        write!(f, "{}/{}:{}", group, self.version, self.kind)
    }
}
