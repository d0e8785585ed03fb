//! Minimal Kubernetes API Client
//!
//! A small typed client for the Kubernetes API with Get and Watch semantics.
//! Designed for processes running inside the cluster: the service account
//! token is refreshed in the background whenever the kubelet rotates it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use k8s_client::{Client, ObjectApi};
//! use k8s_types::core::Endpoints;
//! use k8s_types::{GetOptions, ListOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(Client::in_cluster()?);
//! let endpoints = ObjectApi::<Endpoints>::new(client);
//!
//! let kubelet = endpoints.get("kube-system", "kubelet", &GetOptions::default()).await?;
//! println!("{:?}", kubelet.subsets);
//!
//! let mut events = endpoints.watch("kube-system", "kubelet", &ListOptions::default()).await?;
//! while let Some(event) = events.recv().await {
//!     println!("{}: {:?}", event.event_type, event.object.metadata.name);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Typed Get/Watch**: implemented once for every kind implementing [`k8s_types::Object`]
//! - **Streaming Watch**: events decoded on a background task into a channel
//! - **Token Rotation**: token file changes picked up without restarting
//! - **Pluggable Decoding**: swap the JSON decoder, e.g. for tests

pub mod api;
pub mod client;
pub mod config;
pub mod decoder;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod stream;
pub mod token;

#[cfg(test)]
mod token_test;

pub use api::ObjectApi;
pub use client::{ApiClient, Client, ClientBuilder};
pub use config::InClusterConfig;
pub use decoder::{ByteStream, DecoderFactory, JsonStreamDecoder, ResponseDecoder, json_decoder_factory};
pub use error::{ClientError, DecodeError};
#[cfg(any(test, feature = "test-util"))]
pub use mock::{ManualFileNotifier, MockDecoder, MockDecoderHandle};
pub use stream::{WatchHandle, WatchStopper, start_watch};
pub use token::{FileChangeNotifier, NotifyFileNotifier, TokenStore};
