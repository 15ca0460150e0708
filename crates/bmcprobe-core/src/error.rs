//! Error taxonomy.
//!
//! Per-endpoint failures during a run ([`FetchError`]) are contained by the
//! sampling engine and never abort it. Only [`ConfigError`], [`AuthError`]
//! and a fatal empty discovery surface as [`CollectError`].

use thiserror::Error;

/// A fetch that never produced a usable document.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("{path}: request failed: {reason}")]
    Request { path: String, reason: String },

    #[error("{path}: HTTP {status}")]
    Status { path: String, status: u16 },

    #[error("{path}: response body is not JSON: {reason}")]
    Body { path: String, reason: String },
}

/// A document that did not match the shape expected for its resource.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{context}: {reason}")]
pub struct ParseError {
    pub context: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

/// Outcome of one endpoint fetch within a tick.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("worker panicked while fetching")]
    WorkerPanic,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid BMC address {0}")]
    InvalidAddress(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("login rejected with HTTP {0}")]
    Rejected(u16),

    #[error("login request failed: {0}")]
    Request(String),

    #[error("credentials verified but no usable session: {0}")]
    Session(String),
}

/// Invalid run configuration, detected before any network activity.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("invalid --{field}: {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: String,
}

impl ConfigError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("discovery found no endpoints to sample")]
    NoEndpoints,

    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize run summary: {0}")]
    Serialize(#[from] serde_json::Error),
}
