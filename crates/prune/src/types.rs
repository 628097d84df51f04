//! Resource identity types shared by the registry, strategies and pruner.

use std::fmt;

use chrono::{DateTime, Utc};
use kube::api::DynamicObject;
use kube::core::GroupVersionKind;
use serde::{Deserialize, Serialize};

/// Group, version and kind of a resource schema.
///
/// The core API group is the empty string, so a Pod is `("", "v1", "Pod")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeIdentifier {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl TypeIdentifier {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Core `v1/Pod`
    pub fn pod() -> Self {
        Self::new("", "v1", "Pod")
    }

    /// `batch/v1/Job`
    pub fn job() -> Self {
        Self::new("batch", "v1", "Job")
    }

    /// Identifier read from an object's own `apiVersion` and `kind`.
    ///
    /// `None` when either field is missing or empty.
    pub fn of(obj: &DynamicObject) -> Option<Self> {
        let types = obj.types.as_ref()?;
        if types.api_version.is_empty() || types.kind.is_empty() {
            return None;
        }
        let (group, version) = types
            .api_version
            .split_once('/')
            .unwrap_or(("", types.api_version.as_str()));
        Some(Self::new(group, version, types.kind.as_str()))
    }

    /// The `apiVersion` string objects of this type carry.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl Default for TypeIdentifier {
    fn default() -> Self {
        Self::pod()
    }
}

impl fmt::Display for TypeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version(), self.kind)
    }
}

impl From<&TypeIdentifier> for GroupVersionKind {
    fn from(id: &TypeIdentifier) -> Self {
        GroupVersionKind::gvk(&id.group, &id.version, &id.kind)
    }
}

impl From<GroupVersionKind> for TypeIdentifier {
    fn from(gvk: GroupVersionKind) -> Self {
        Self::new(gvk.group, gvk.version, gvk.kind)
    }
}

/// Namespace and name of a single object, used in errors and logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceKey {
    pub fn new(namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            name: name.into(),
        }
    }

    pub fn of(obj: &DynamicObject) -> Self {
        Self {
            namespace: obj.metadata.namespace.clone(),
            name: obj.metadata.name.clone().unwrap_or_default(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}/{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Timestamp strategies compare when judging how old an object is.
pub fn age_timestamp(obj: &DynamicObject) -> Option<DateTime<Utc>> {
    obj.metadata.creation_timestamp.as_ref().map(|t| t.0)
}
