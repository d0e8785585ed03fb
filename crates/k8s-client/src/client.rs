//! Kubernetes API client
//!
//! Owns the HTTP client, the API server base URL, the token store and the
//! decoder used for response bodies. Typed operations live in
//! [`ObjectApi`](crate::api::ObjectApi) and only need the [`ApiClient`] trait.

use crate::config::InClusterConfig;
use crate::decoder::{ByteStream, DecoderFactory, JsonStreamDecoder, ResponseDecoder, json_decoder_factory};
use crate::error::ClientError;
use crate::stream::DEFAULT_WATCH_BUFFER;
use crate::token::TokenStore;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};
use reqwest::{Method, Request, Response, Url};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Minimal API client surface used by typed operations.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ApiClient: Send + Sync {
    /// Base URL of the API server, without trailing slash.
    fn api_server_url(&self) -> &str;

    /// Current bearer token; empty for anonymous access.
    fn token(&self) -> String;

    /// Send a request.
    async fn execute(&self, request: Request) -> Result<Response, ClientError>;

    /// Decoder for a response body.
    fn decoder(&self, body: ByteStream) -> Box<dyn ResponseDecoder> {
        Box::new(JsonStreamDecoder::new(body))
    }

    /// Channel capacity for watches.
    fn watch_buffer(&self) -> usize {
        DEFAULT_WATCH_BUFFER
    }

    /// Build an authenticated GET request.
    ///
    /// Relative URLs are resolved against [`ApiClient::api_server_url`].
    /// Absolute URLs must point at the same scheme, host and port. The
    /// `Authorization` header is set only when a token is available.
    ///
    /// # Errors
    /// Returns [`ClientError::InvalidRequest`] for unparsable URLs, absolute
    /// URLs on another server, or tokens that are not valid header values.
    fn get_request(&self, url: &str) -> Result<Request, ClientError> {
        let base = self.api_server_url();
        let parse = |raw: &str| {
            Url::parse(raw).map_err(|e| ClientError::InvalidRequest(format!("invalid request url {raw:?}: {e}")))
        };

        let url = if url.contains("://") {
            let absolute = parse(url)?;
            if absolute.origin() != parse(base)?.origin() {
                return Err(ClientError::InvalidRequest(format!(
                    "request url {url:?} is not on the API server {base:?}"
                )));
            }
            absolute
        } else {
            parse(&format!("{}/{}", base, url.trim_start_matches('/')))?
        };

        let mut request = Request::new(Method::GET, url);
        request
            .headers_mut()
            .insert(ACCEPT, HeaderValue::from_static("application/json"));

        let token = self.token();
        if !token.is_empty() {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ClientError::InvalidRequest(format!("invalid bearer token: {e}")))?;
            value.set_sensitive(true);
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        Ok(request)
    }
}

/// Kubernetes API client.
pub struct Client {
    host: String,
    http: reqwest::Client,
    tokens: TokenStore,
    decoder_factory: DecoderFactory,
    watch_buffer: usize,
}

impl Client {
    /// Create a client for the cluster this process runs in.
    ///
    /// Reads the API server location from the environment, trusts the
    /// service account CA bundle and keeps the service account token fresh.
    ///
    /// # Errors
    /// Fails when not running in a cluster, or when the token or CA files
    /// cannot be loaded.
    pub fn in_cluster() -> Result<Self, ClientError> {
        Self::from_config(&InClusterConfig::from_env()?)
    }

    /// Create a client from an explicit in-cluster configuration.
    ///
    /// # Errors
    /// Fails when the token or CA files cannot be loaded, or the token file
    /// listener cannot be installed.
    pub fn from_config(config: &InClusterConfig) -> Result<Self, ClientError> {
        let tokens = TokenStore::from_file(&config.token_path)?;

        let ca = std::fs::read(&config.ca_cert_path).map_err(|source| ClientError::Io {
            path: config.ca_cert_path.clone(),
            source,
        })?;
        let certs = reqwest::Certificate::from_pem_bundle(&ca)
            .map_err(|e| ClientError::Configuration(format!("invalid CA certificate: {e}")))?;

        let mut http = reqwest::Client::builder()
            .use_rustls_tls()
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .connect_timeout(CONNECT_TIMEOUT);
        for cert in certs {
            http = http.add_root_certificate(cert);
        }

        info!("Configured in-cluster client for {}", config.host);
        Self::builder(config.host.clone())
            .http_client(http.build()?)
            .token_store(tokens)
            .build()
    }

    /// Start building a client for the API server at `host`.
    pub fn builder(host: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(host)
    }

    /// Base URL of the API server.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Token store backing the `Authorization` header.
    #[must_use]
    pub fn token_store(&self) -> &TokenStore {
        &self.tokens
    }
}

#[async_trait::async_trait]
impl ApiClient for Client {
    fn api_server_url(&self) -> &str {
        &self.host
    }

    fn token(&self) -> String {
        self.tokens.current_token()
    }

    async fn execute(&self, request: Request) -> Result<Response, ClientError> {
        debug!("{} {}", request.method(), request.url());
        Ok(self.http.execute(request).await?)
    }

    fn decoder(&self, body: ByteStream) -> Box<dyn ResponseDecoder> {
        (self.decoder_factory)(body)
    }

    fn watch_buffer(&self) -> usize {
        self.watch_buffer
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.host)
            .field("tokens", &self.tokens)
            .field("watch_buffer", &self.watch_buffer)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    host: String,
    http: Option<reqwest::Client>,
    tokens: Option<TokenStore>,
    decoder_factory: Option<DecoderFactory>,
    watch_buffer: usize,
}

impl ClientBuilder {
    /// Start a builder for the API server at `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into().trim_end_matches('/').to_string(),
            http: None,
            tokens: None,
            decoder_factory: None,
            watch_buffer: DEFAULT_WATCH_BUFFER,
        }
    }

    /// Use a preconfigured HTTP client (TLS, proxies, timeouts).
    ///
    /// Avoid an overall request timeout: it would cut long-running watches.
    #[must_use]
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Source of the bearer token. Defaults to anonymous.
    #[must_use]
    pub fn token_store(mut self, tokens: TokenStore) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Use a fixed bearer token.
    #[must_use]
    pub fn token(self, token: impl Into<String>) -> Self {
        self.token_store(TokenStore::fixed(token))
    }

    /// Replace the JSON decoder used for Get and Watch bodies.
    #[must_use]
    pub fn decoder_factory(mut self, factory: DecoderFactory) -> Self {
        self.decoder_factory = Some(factory);
        self
    }

    /// Number of events buffered per watch.
    #[must_use]
    pub fn watch_buffer(mut self, buffer: usize) -> Self {
        self.watch_buffer = buffer.max(1);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    /// Fails when the host is not an absolute URL or the default HTTP client
    /// cannot be created.
    pub fn build(self) -> Result<Client, ClientError> {
        Url::parse(&self.host)
            .map_err(|e| ClientError::Configuration(format!("invalid API server url {:?}: {e}", self.host)))?;

        let http = match self.http {
            Some(http) => http,
            None => reqwest::Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?,
        };

        Ok(Client {
            host: self.host,
            http,
            tokens: self.tokens.unwrap_or_else(TokenStore::anonymous),
            decoder_factory: self.decoder_factory.unwrap_or_else(json_decoder_factory),
            watch_buffer: self.watch_buffer,
        })
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("host", &self.host)
            .field("tokens", &self.tokens)
            .field("watch_buffer", &self.watch_buffer)
            .finish_non_exhaustive()
    }
}
