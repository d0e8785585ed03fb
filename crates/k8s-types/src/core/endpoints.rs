//! Endpoints resource
//!
//! Network addresses backing a Service.

use crate::{GroupVersionResource, Object, ObjectMeta, TypeMeta};
use serde::{Deserialize, Serialize};

/// Set of addresses and ports implementing a Service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    /// `apiVersion` and `kind`, inlined at the top level
    #[serde(flatten)]
    pub type_meta: TypeMeta,

    /// Standard object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Groups of addresses sharing the same ports
    #[serde(default)]
    pub subsets: Vec<EndpointSubset>,
}

impl Object for Endpoints {
    fn gvr() -> GroupVersionResource {
        GroupVersionResource::core("v1", "endpoints")
    }

    fn object_meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn type_meta(&self) -> &TypeMeta {
        &self.type_meta
    }
}

/// Addresses paired with the ports they serve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSubset {
    /// Ready addresses
    #[serde(default)]
    pub addresses: Vec<EndpointAddress>,

    /// Addresses that are not ready to serve traffic
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_ready_addresses: Vec<EndpointAddress>,

    /// Ports exposed on every address of the subset
    #[serde(default)]
    pub ports: Vec<EndpointPort>,
}

/// A single endpoint address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointAddress {
    /// IP address of the endpoint
    pub ip: String,

    /// Hostname of the endpoint, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Node hosting the endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,

    /// Object (usually a Pod) providing the endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_ref: Option<ObjectReference>,
}

/// Reference to another object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    /// Kind of the referenced object
    #[serde(default)]
    pub kind: String,

    /// Name of the referenced object
    #[serde(default)]
    pub name: String,

    /// Namespace of the referenced object
    #[serde(default)]
    pub namespace: String,

    /// UID of the referenced object
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
}

/// A port exposed by an endpoint subset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointPort {
    /// Port name, required when a subset has more than one port
    #[serde(default)]
    pub name: String,

    /// Port number
    pub port: i32,

    /// `TCP`, `UDP` or `SCTP`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}
