//! In-cluster configuration
//!
//! A process running inside the cluster finds the API server through the
//! `KUBERNETES_SERVICE_HOST` / `KUBERNETES_SERVICE_PORT` environment variables
//! and authenticates with the service account token mounted at a well-known path.

use crate::error::ClientError;
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;

/// Service account token mounted into every pod.
pub const SERVICE_ACCOUNT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// CA bundle used to verify the API server certificate.
pub const SERVICE_ACCOUNT_CA_CERT_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

/// Environment variable holding the API server host.
pub const SERVICE_HOST_ENV: &str = "KUBERNETES_SERVICE_HOST";

/// Environment variable holding the API server port.
pub const SERVICE_PORT_ENV: &str = "KUBERNETES_SERVICE_PORT";

/// Where to reach the API server and which credentials to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InClusterConfig {
    /// Base URL of the API server, e.g. `https://10.96.0.1:443`
    pub host: String,
    /// Bearer token file, re-read whenever it is rewritten
    pub token_path: PathBuf,
    /// PEM encoded CA bundle
    pub ca_cert_path: PathBuf,
}

impl InClusterConfig {
    /// Load the configuration from the process environment.
    ///
    /// # Errors
    /// Returns [`ClientError::Configuration`] when either service variable is
    /// missing or empty, i.e. the process is not running inside a cluster.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load the configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    /// Same as [`InClusterConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup(SERVICE_HOST_ENV).unwrap_or_default();
        let port = lookup(SERVICE_PORT_ENV).unwrap_or_default();
        if host.is_empty() || port.is_empty() {
            return Err(ClientError::Configuration(format!(
                "unable to load in-cluster configuration, {SERVICE_HOST_ENV} and {SERVICE_PORT_ENV} must be defined"
            )));
        }

        Ok(Self {
            host: format!("https://{}", join_host_port(&host, &port)),
            token_path: PathBuf::from(SERVICE_ACCOUNT_TOKEN_PATH),
            ca_cert_path: PathBuf::from(SERVICE_ACCOUNT_CA_CERT_PATH),
        })
    }
}

/// Join host and port, bracketing IPv6 literals.
fn join_host_port(host: &str, port: &str) -> String {
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V6(_)) => format!("[{host}]:{port}"),
        _ => format!("{host}:{port}"),
    }
}
