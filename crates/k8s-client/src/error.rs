//! Kubernetes client errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by client construction, Get and Watch.
///
/// Failures inside a running watch are never returned through this type;
/// they end the watch and are only logged.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Missing or invalid configuration (environment, base URL, CA bundle)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A required file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// File that could not be read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Request could not be built (bad URL, object name or token)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Transport failure while sending the request or reading the response
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API server answered with a status other than 200 OK
    #[error("invalid response code {status} for request url {url:?}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Full request URL
        url: String,
        /// Raw response body
        body: String,
    },

    /// Response body could not be framed as JSON
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Response JSON did not match the requested type
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Credential file listener could not be installed
    #[error("File watch error: {0}")]
    FileWatch(String),
}

impl ClientError {
    /// HTTP status code for [`ClientError::Status`] errors.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the API server reported the object as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Why a [`ResponseDecoder`](crate::decoder::ResponseDecoder) could not
/// produce the next value.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Stream ended cleanly between two values
    #[error("end of stream")]
    Eof,

    /// Stream ended in the middle of a value
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// Reading from the underlying stream failed
    #[error("stream read failed: {0}")]
    Transport(String),

    /// Bytes received were not valid JSON, or not the expected shape
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A watch event carried an unknown `type`
    #[error(transparent)]
    InvalidEventType(#[from] k8s_types::InvalidEventType),
}
