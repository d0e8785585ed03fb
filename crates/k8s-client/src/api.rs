//! Typed object operations
//!
//! `ObjectApi<T>` implements Get and Watch once for every resource kind that
//! implements [`Object`]. The kind supplies its group/version/resource; the
//! caller supplies namespace and name.

use crate::client::{ApiClient, Client};
use crate::decoder::ByteStream;
use crate::error::ClientError;
use crate::stream::{WatchHandle, start_watch};
use futures::TryStreamExt;
use k8s_types::{GetOptions, ListOptions, Object};
use reqwest::{Response, StatusCode};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Get and Watch for objects of kind `T`.
pub struct ObjectApi<T, C = Client> {
    client: Arc<C>,
    _kind: PhantomData<fn() -> T>,
}

impl<T, C> ObjectApi<T, C>
where
    T: Object,
    C: ApiClient,
{
    /// Typed operations on top of `client`.
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }

    /// Path of a collection: `/api/v1/namespaces/<ns>/<resource>`.
    ///
    /// An empty namespace yields the cluster-wide (or cluster-scoped) path.
    #[must_use]
    pub fn collection_path(namespace: &str) -> String {
        let gvr = T::gvr();
        let mut path = format!("/{}", gvr.api_prefix());
        if !namespace.is_empty() {
            path.push_str("/namespaces/");
            path.push_str(namespace);
        }
        path.push('/');
        path.push_str(&gvr.resource);
        path
    }

    /// Path of a single object: `/api/v1/namespaces/<ns>/<resource>/<name>`.
    #[must_use]
    pub fn resource_path(namespace: &str, name: &str) -> String {
        format!("{}/{}", Self::collection_path(namespace), name)
    }

    /// Fetch one object.
    ///
    /// # Errors
    /// Invalid namespace or name, transport failures, any status other than
    /// 200 OK (with the response body attached), and bodies that do not
    /// decode into `T`.
    pub async fn get(&self, namespace: &str, name: &str, opts: &GetOptions) -> Result<T, ClientError> {
        if name.is_empty() {
            return Err(ClientError::InvalidRequest("object name must not be empty".to_string()));
        }
        check_segment("namespace", namespace)?;
        check_segment("name", name)?;

        let mut request = self.client.get_request(&Self::resource_path(namespace, name))?;
        let params = opts.query_pairs();
        if !params.is_empty() {
            request.url_mut().query_pairs_mut().extend_pairs(params);
        }

        let response = self.send(request).await?;
        let mut decoder = self.client.decoder(body_stream(response));
        let value = decoder.decode().await;
        decoder.close();

        Ok(serde_json::from_value(value?)?)
    }

    /// Watch one object, or the whole collection when `name` is empty.
    ///
    /// Returns as soon as the API server accepted the watch; events are
    /// decoded on a background task until the stream ends or the handle is
    /// stopped. Re-issuing the watch after it ends is up to the caller.
    ///
    /// # Errors
    /// Invalid namespace or name, transport failures and any status other
    /// than 200 OK. Failures after
    /// the watch started only end the event channel.
    pub async fn watch(&self, namespace: &str, name: &str, opts: &ListOptions) -> Result<WatchHandle<T>, ClientError> {
        check_segment("namespace", namespace)?;
        check_segment("name", name)?;

        let mut request = self.client.get_request(&Self::collection_path(namespace))?;
        {
            let mut query = request.url_mut().query_pairs_mut();
            query.append_pair("watch", "true");

            let field_selector = match (name.is_empty(), opts.field_selector.as_deref()) {
                (true, selector) => selector.filter(|s| !s.is_empty()).map(str::to_string),
                (false, None | Some("")) => Some(format!("metadata.name={name}")),
                (false, Some(selector)) => Some(format!("metadata.name={name},{selector}")),
            };
            if let Some(selector) = field_selector {
                query.append_pair("fieldSelector", &selector);
            }

            let rest = ListOptions {
                field_selector: None,
                ..opts.clone()
            };
            query.extend_pairs(rest.query_pairs());
        }

        let response = self.send(request).await?;
        debug!("Watching {} {}/{}", T::gvr(), namespace, name);

        let decoder = self.client.decoder(body_stream(response));
        Ok(start_watch(decoder, self.client.watch_buffer()))
    }

    /// Execute and reject anything but 200 OK.
    async fn send(&self, request: reqwest::Request) -> Result<Response, ClientError> {
        let url = request.url().to_string();
        let response = self.client.execute(request).await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                url,
                body,
            });
        }
        Ok(response)
    }
}

impl<T, C> Clone for ObjectApi<T, C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            _kind: PhantomData,
        }
    }
}

impl<T, C> fmt::Debug for ObjectApi<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectApi")
            .field("kind", &std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}

/// Reject values that would change the request URL when used as a path
/// segment. Object names and namespaces never contain these characters.
fn check_segment(what: &str, value: &str) -> Result<(), ClientError> {
    let invalid = value == "."
        || value == ".."
        || value
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace() || c.is_control());
    if invalid {
        return Err(ClientError::InvalidRequest(format!("invalid {what} {value:?}")));
    }
    Ok(())
}

fn body_stream(response: Response) -> ByteStream {
    Box::pin(response.bytes_stream().map_err(std::io::Error::other))
}
