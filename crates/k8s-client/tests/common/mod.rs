//! Shared helpers for integration tests
//!
//! A fake API server built on axum. It records the `Authorization` header
//! and query string of every request so tests can assert on them.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use axum::Router;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use bytes::Bytes;
use futures::StreamExt;
use k8s_client::ClientError;
use k8s_client::token::{ChangeCallback, FileChangeNotifier, ListenerGuard};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// Name that makes the fake server answer 404.
pub const MISSING: &str = "missing";
/// Namespace that makes the fake server refuse watches with 403.
pub const FORBIDDEN_NAMESPACE: &str = "forbidden";
/// Name whose watch stays open after the first event.
pub const OPEN_ENDED: &str = "open-ended";

/// A request as seen by the fake server.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub authorization: Option<String>,
    pub query: HashMap<String, String>,
}

#[derive(Clone, Default)]
pub struct FakeApiServer {
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeApiServer {
    /// Start the server on an ephemeral port and return it with its base URL.
    pub async fn start() -> (Self, String) {
        init_tracing();

        let server = Self::default();
        let router = Router::new()
            .route("/api/v1/namespaces/{namespace}/endpoints", get(watch_endpoints))
            .route("/api/v1/namespaces/{namespace}/endpoints/{name}", get(get_endpoints))
            .route("/apis/apps/v1/namespaces/{namespace}/deployments/{name}", get(get_deployment))
            .with_state(server.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("fake api server");
        });

        (server, format!("http://{addr}"))
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().expect("lock").clone()
    }

    pub fn last(&self) -> Recorded {
        self.requests().pop().expect("a request was recorded")
    }

    fn record(&self, path: String, headers: &HeaderMap, query: HashMap<String, String>) {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.requests.lock().expect("lock").push(Recorded {
            path,
            authorization,
            query,
        });
    }
}

/// Token file listener fired by the test instead of the filesystem.
#[derive(Clone, Default)]
pub struct TriggeredNotifier {
    callbacks: Arc<Mutex<Vec<ChangeCallback>>>,
}

impl TriggeredNotifier {
    pub fn fire(&self) {
        for callback in self.callbacks.lock().expect("lock").iter() {
            callback();
        }
    }
}

impl FileChangeNotifier for TriggeredNotifier {
    fn on_file_changed(&self, _path: &std::path::Path, callback: ChangeCallback) -> Result<ListenerGuard, ClientError> {
        self.callbacks.lock().expect("lock").push(callback);
        Ok(ListenerGuard::new(()))
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn endpoints_json(namespace: &str, name: &str) -> serde_json::Value {
    json!({
        "kind": "Endpoints",
        "apiVersion": "v1",
        "metadata": {"name": name, "namespace": namespace, "resourceVersion": "7"},
        "subsets": [{
            "addresses": [{"ip": "10.0.0.5", "nodeName": "node-1"}],
            "ports": [{"name": "https", "port": 10250, "protocol": "TCP"}]
        }]
    })
}

fn not_found(kind: &str, name: &str) -> Response {
    let status = json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{kind} \"{name}\" not found"),
        "reason": "NotFound",
        "code": 404
    });
    (StatusCode::NOT_FOUND, status.to_string()).into_response()
}

async fn get_endpoints(
    State(server): State<FakeApiServer>,
    Path((namespace, name)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    server.record(format!("/api/v1/namespaces/{namespace}/endpoints/{name}"), &headers, query);
    if name == MISSING {
        return not_found("endpoints", &name);
    }
    (StatusCode::OK, endpoints_json(&namespace, &name).to_string()).into_response()
}

async fn get_deployment(
    State(server): State<FakeApiServer>,
    Path((namespace, name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    server.record(
        format!("/apis/apps/v1/namespaces/{namespace}/deployments/{name}"),
        &headers,
        HashMap::new(),
    );
    let body = json!({
        "kind": "Deployment",
        "apiVersion": "apps/v1",
        "metadata": {"name": name, "namespace": namespace},
        "spec": {"replicas": 3}
    });
    (StatusCode::OK, body.to_string()).into_response()
}

async fn watch_endpoints(
    State(server): State<FakeApiServer>,
    Path(namespace): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let selector = query.get("fieldSelector").cloned().unwrap_or_default();
    server.record(format!("/api/v1/namespaces/{namespace}/endpoints"), &headers, query);

    if namespace == FORBIDDEN_NAMESPACE {
        return (StatusCode::FORBIDDEN, "endpoints is forbidden").into_response();
    }

    let name = selector.strip_prefix("metadata.name=").unwrap_or_default().to_string();
    let added = json!({"type": "ADDED", "object": endpoints_json(&namespace, &name)});

    if name == OPEN_ENDED {
        let events = futures::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from(format!("{added}\n")))])
            .chain(futures::stream::pending());
        return Body::from_stream(events).into_response();
    }

    let deleted = json!({"type": "DELETED", "object": endpoints_json(&namespace, &name)});
    // One event split across two chunks
    let added = added.to_string();
    let (head, tail) = added.split_at(added.len() / 2);
    let chunks = vec![
        Ok::<_, std::io::Error>(Bytes::from(head.to_string())),
        Ok(Bytes::from(format!("{tail}\n"))),
        Ok(Bytes::from(format!("{deleted}\n"))),
    ];
    Body::from_stream(futures::stream::iter(chunks)).into_response()
}
