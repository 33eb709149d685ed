use std::sync::Arc;

use axum::{
    body::Body,
    extract::Request,
    http::{header::CONTENT_TYPE, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use tracing::{info, warn};

use crate::identity::exchange::TokenExchangeClient;
use crate::metadata::snapshot::MetadataSnapshotStore;
use crate::server::handlers::{self, json_response};
use crate::utils::constants::{ENDPOINTS_PATH, TOKEN_PATH};

/// Only this much of a request body is written to the log.
const MAX_LOGGED_BODY_BYTES: usize = 64 * 1024;

/// Shared, read-only handler state.
#[derive(Clone)]
pub struct AppState {
    pub exchange: Arc<TokenExchangeClient>,
    pub snapshots: Arc<MetadataSnapshotStore>,
}

impl AppState {
    pub fn new(exchange: TokenExchangeClient, snapshots: MetadataSnapshotStore) -> Self {
        Self {
            exchange: Arc::new(exchange),
            snapshots: Arc::new(snapshots),
        }
    }
}

/// The IMDS surface: exactly the two identity routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(ENDPOINTS_PATH, get(handlers::metadata_endpoints))
        .route(TOKEN_PATH, get(handlers::identity_token))
        .fallback(handlers::not_found)
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Log method, URI, content type and body, then hand on an identical request.
async fn log_request(req: Request, next: Next) -> Response {
    let (parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("reading request body: {}", err);
            return json_response(
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": err.to_string() }),
            );
        }
    };

    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let logged = &bytes[..bytes.len().min(MAX_LOGGED_BODY_BYTES)];
    info!(
        content_type = %content_type,
        body = %String::from_utf8_lossy(logged),
        body_len = bytes.len(),
        "received request: {} {}",
        parts.method,
        parts.uri
    );

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
