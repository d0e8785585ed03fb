//! Kubernetes API types
//!
//! Plain data types shared by the typed client: object metadata, resource
//! identifiers, watch events and the resource kinds the client ships with.
//!
//! Any type implementing [`Object`] can be fetched and watched by the client,
//! including caller-defined custom resources.

pub mod core;
pub mod event;
pub mod meta;

pub use event::*;
pub use meta::*;

use serde::de::DeserializeOwned;

/// A Kubernetes object the client knows how to address.
///
/// The resource identifier is a property of the kind, not of an instance,
/// so it is exposed as an associated function.
pub trait Object: DeserializeOwned + Send + 'static {
    /// Group, version and plural resource name used to build request paths.
    fn gvr() -> GroupVersionResource;

    /// Standard object metadata.
    fn object_meta(&self) -> &ObjectMeta;

    /// `apiVersion` and `kind` as returned by the API server.
    fn type_meta(&self) -> &TypeMeta;
}
