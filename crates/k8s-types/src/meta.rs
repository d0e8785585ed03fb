//! Object metadata, resource identifiers and request options
//!
//! Mirrors the subset of `meta/v1` that the client needs on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// `apiVersion` and `kind` of a serialized object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    /// Versioned schema of the object, e.g. `v1` or `apps/v1`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    /// Kind of the object, e.g. `Endpoints`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
}

/// Standard metadata carried by every persisted object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Object name, unique within its namespace
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Namespace, empty for cluster-scoped objects
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// Server-assigned unique identifier
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,

    /// Opaque version used for optimistic concurrency and watch resumption
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,

    /// Sequence number of the desired state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<i64>,

    /// Creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,

    /// Time at which the object will be deleted, set by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,

    /// Identifying key/value pairs used by selectors
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Non-identifying key/value metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Identifies a resource kind within the API's URL namespace.
///
/// An empty `group` denotes the legacy core group served under `/api`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersionResource {
    /// API group, empty for the core group
    pub group: String,
    /// API version, e.g. `v1`
    pub version: String,
    /// Plural lowercase resource name, e.g. `endpoints`
    pub resource: String,
}

impl GroupVersionResource {
    /// Create an identifier from its three parts.
    pub fn new(group: impl Into<String>, version: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    /// Identifier in the core group (`/api/<version>`).
    pub fn core(version: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::new("", version, resource)
    }

    /// Path prefix of the group/version: `api/<version>` or `apis/<group>/<version>`.
    #[must_use]
    pub fn api_prefix(&self) -> String {
        if self.group.is_empty() {
            format!("api/{}", self.version)
        } else {
            format!("apis/{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for GroupVersionResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.resource)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.resource)
        }
    }
}

/// Options for a single-object GET.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Serve the object at (or newer than) this resource version
    pub resource_version: Option<String>,
}

impl GetOptions {
    /// Query parameters for the request, in wire form.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        self.resource_version
            .iter()
            .map(|rv| ("resourceVersion", rv.clone()))
            .collect()
    }
}

/// Options for list and watch requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Label selector, e.g. `app=web,tier!=db`
    pub label_selector: Option<String>,
    /// Field selector, e.g. `status.phase=Running`
    pub field_selector: Option<String>,
    /// Start the watch after this resource version
    pub resource_version: Option<String>,
    /// Server-side timeout for the watch, after which the stream ends
    pub timeout_seconds: Option<u32>,
}

impl ListOptions {
    /// Query parameters for the request, in wire form.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(labels) = &self.label_selector {
            pairs.push(("labelSelector", labels.clone()));
        }
        if let Some(fields) = &self.field_selector {
            pairs.push(("fieldSelector", fields.clone()));
        }
        if let Some(rv) = &self.resource_version {
            pairs.push(("resourceVersion", rv.clone()));
        }
        if let Some(timeout) = self.timeout_seconds {
            pairs.push(("timeoutSeconds", timeout.to_string()));
        }
        pairs
    }
}
