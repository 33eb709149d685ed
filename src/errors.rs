use std::path::PathBuf;

use http::StatusCode;
use thiserror::Error;

/// Failures a single bridge request (or listener) can end with.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Missing process configuration: authority, tenant, token file, ports.
    #[error("configuration error: {0}")]
    Config(String),

    /// The caller supplied an unusable combination of query parameters.
    #[error("invalid request: {0}")]
    Parameter(String),

    #[error("unrecognized api-version")]
    UnknownApiVersion(String),

    #[error("reading metadata from file {path}: {source}")]
    SnapshotRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("requesting access token: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {status} received with body: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("decoding token response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Well-formed JSON whose values break the token response contract.
    #[error("invalid token response: {0}")]
    InvalidTokenResponse(String),

    #[error("listener {name}: {source}")]
    Listener {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tls: {0}")]
    Tls(String),
}

impl BridgeError {
    /// Status written back to the IMDS caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            BridgeError::Parameter(_) | BridgeError::UnknownApiVersion(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
