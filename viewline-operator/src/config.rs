//! Operator and controller declarations.
//!
//! Controllers are declared in data form, from YAML or JSON:
//!
//! ```yaml
//! name: service-health
//! controllers:
//!   - name: endpoint-counter
//!     sources:
//!       - kind: Service
//!         version: v1
//!       - kind: EndpointView
//!     pipeline:
//!       '@join':
//!         '@eq': ["$.Service.metadata.name", "$.EndpointView.spec.service"]
//!       '@aggregate':
//!         - '@project':
//!             metadata:
//!               name: "$.Service.metadata.name"
//!             ready: "$.EndpointView.spec.ready"
//!     target:
//!       kind: ServiceHealthView
//! ```
//!
//! Source and target kinds without an `apiGroup` (or with the view
//! group) are views; their version is fixed by the runtime. Native
//! kinds must spell out their version, since resolving versions
//! against API-server discovery is the embedder's business.

use serde::{Deserialize, Serialize};

use viewline_core::gvk::{GroupVersionKind, VIEW_GROUP};
use viewline_core::{Error, Result};
use viewline_engine::{Aggregation, Join};

/// A full operator declaration: a named set of controllers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OperatorSpec {
    /// The operator name.
    pub name: String,
    /// The controllers this operator runs.
    pub controllers: Vec<ControllerSpec>,
}

/// One controller declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ControllerSpec {
    /// The controller name, used for logging and task naming.
    pub name: String,
    /// The watched source resources.
    pub sources: Vec<ResourceRef>,
    /// The processing pipeline.
    pub pipeline: PipelineSpec,
    /// Where output deltas are written.
    pub target: TargetSpec,
}

/// A reference to a source resource kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResourceRef {
    /// API group; absent means a view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_group: Option<String>,
    /// API version; required for non-view kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// The resource kind.
    pub kind: String,
}

impl ResourceRef {
    /// Resolves the reference into a fully qualified GVK.
    pub fn gvk(&self) -> Result<GroupVersionKind> {
        if self.kind.is_empty() {
            return Err(Error::InvalidArguments("empty kind in resource".into()));
        }
        match self.api_group.as_deref() {
            None => Ok(GroupVersionKind::view(&self.kind)),
            Some(VIEW_GROUP) => Ok(GroupVersionKind::view(&self.kind)),
            Some(group) => {
                let version = self.version.as_deref().ok_or_else(|| {
                    Error::InvalidArguments(format!(
                        "missing version for resource {}/{}",
                        group, self.kind
                    ))
                })?;
                Ok(GroupVersionKind::new(group, version, &self.kind))
            }
        }
    }
}

/// The pipeline half of a controller declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineSpec {
    /// The join condition, if any.
    #[serde(rename = "@join", default, skip_serializing_if = "Option::is_none")]
    pub join: Option<Join>,
    /// The aggregation stage chain, if any.
    #[serde(rename = "@aggregate", default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<Aggregation>,
}

/// The write target of a controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TargetSpec {
    /// API group; absent means a view target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_group: Option<String>,
    /// API version; required for non-view targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// The target kind. For view targets this is the view name.
    pub kind: String,
    /// How deltas are applied.
    #[serde(rename = "type", default)]
    pub target_type: TargetType,
}

impl TargetSpec {
    /// Resolves the target into a fully qualified GVK.
    pub fn gvk(&self) -> Result<GroupVersionKind> {
        ResourceRef {
            api_group: self.api_group.clone(),
            version: self.version.clone(),
            kind: self.kind.clone(),
        }
        .gvk()
    }
}

/// How output deltas are applied to the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetType {
    /// Deltas are enforced as full-object updates.
    #[default]
    Updater,
    /// Deltas are applied as merge patches; deletions become delete
    /// patches.
    Patcher,
}

impl OperatorSpec {
    /// Parses an operator declaration from YAML (or JSON, which YAML
    /// subsumes).
    pub fn from_yaml(input: &str) -> Result<Self> {
        let spec: OperatorSpec = serde_yaml::from_str(input)
            .map_err(|e| Error::unmarshal("operator", abbreviate(input), e))?;
        spec.validate()?;
        Ok(spec)
    }

    /// Validates every controller declaration.
    pub fn validate(&self) -> Result<()> {
        for c in &self.controllers {
            c.validate()?;
        }
        Ok(())
    }
}

impl ControllerSpec {
    /// Parses a single controller declaration from YAML.
    pub fn from_yaml(input: &str) -> Result<Self> {
        let spec: ControllerSpec = serde_yaml::from_str(input)
            .map_err(|e| Error::unmarshal("controller", abbreviate(input), e))?;
        spec.validate()?;
        Ok(spec)
    }

    /// Checks declaration-level invariants: sources present and
    /// resolvable, a join only with two or more sources, a resolvable
    /// target.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidArguments("controller name must not be empty".into()));
        }
        if self.sources.is_empty() {
            return Err(Error::InvalidArguments(format!(
                "controller {} declares no sources",
                self.name
            )));
        }
        for s in &self.sources {
            s.gvk()?;
        }
        if self.pipeline.join.is_some() && self.sources.len() < 2 {
            return Err(Error::InvalidArguments(format!(
                "controller {} declares a join over fewer than two sources",
                self.name
            )));
        }
        self.target.gvk()?;
        Ok(())
    }

    /// The source GVKs, in declaration order.
    pub fn source_gvks(&self) -> Result<Vec<GroupVersionKind>> {
        self.sources.iter().map(ResourceRef::gvk).collect()
    }
}

fn abbreviate(s: &str) -> String {
    const LIMIT: usize = 120;
    if s.len() <= LIMIT {
        return s.to_string();
    }
    let cut = s
        .char_indices()
        .take_while(|(i, _)| *i < LIMIT)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(LIMIT);
    format!("{}...", &s[..cut])
}
