use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};
use tracing::error;

use crate::errors::BridgeError;
use crate::identity::request::{query_value, TokenRequest};
use crate::observability::metrics::get_metrics;
use crate::server::server::AppState;
use crate::utils::constants::{ENDPOINTS_PATH, TOKEN_PATH};

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Raw query pairs in request order; repeated keys resolve to their first value.
type QueryPairs = Vec<(String, String)>;

/// `GET /metadata/endpoints?api-version=<v>`
pub async fn metadata_endpoints(
    State(state): State<AppState>,
    query: Result<Query<QueryPairs>, QueryRejection>,
) -> Response {
    let api_version = match query {
        Ok(Query(pairs)) => query_value(&pairs, "api-version").unwrap_or_default(),
        Err(rejection) => {
            return finish(
                ENDPOINTS_PATH,
                json_response(
                    StatusCode::BAD_REQUEST,
                    json!({ "error": rejection.body_text(), "api-version": "" }),
                ),
            )
            .await
        }
    };

    let response = match state.snapshots.load(&api_version).await {
        Ok(body) => bytes_response(StatusCode::OK, body),
        Err(err) => json_response(
            err.status_code(),
            json!({ "error": err.to_string(), "api-version": api_version }),
        ),
    };
    finish(ENDPOINTS_PATH, response).await
}

/// `GET /metadata/identity/oauth2/token?resource=<r>&scope=<s>&client_id=<c>`
pub async fn identity_token(
    State(state): State<AppState>,
    query: Result<Query<QueryPairs>, QueryRejection>,
) -> Response {
    let request = match query {
        Ok(Query(pairs)) => TokenRequest::from_query(&pairs),
        Err(rejection) => {
            return finish(
                TOKEN_PATH,
                token_error(
                    StatusCode::BAD_REQUEST,
                    rejection.body_text(),
                    &TokenRequest::default(),
                ),
            )
            .await
        }
    };

    let response = match state.exchange.acquire(&request).await {
        Ok(token) => match serde_json::to_vec(&token) {
            Ok(body) => bytes_response(StatusCode::OK, body),
            Err(err) => {
                error!("marshalling response to client: {}", err);
                let err = BridgeError::from(err);
                token_error(err.status_code(), err.to_string(), &request)
            }
        },
        Err(err) => {
            error!("acquiring access token: {}", err);
            token_error(err.status_code(), err.to_string(), &request)
        }
    };
    finish(TOKEN_PATH, response).await
}

/// Unknown paths still answer with a JSON body.
pub async fn not_found(uri: Uri) -> Response {
    json_response(
        StatusCode::NOT_FOUND,
        json!({ "error": "not found", "path": uri.path() }),
    )
}

fn token_error(status: StatusCode, error: String, request: &TokenRequest) -> Response {
    json_response(
        status,
        json!({
            "error": error,
            "resource": request.resource.as_deref().unwrap_or_default(),
            "scope": request.scope.as_deref().unwrap_or_default(),
            "client_id": request.client_id.as_deref().unwrap_or_default(),
        }),
    )
}

pub fn json_response(status: StatusCode, body: Value) -> Response {
    bytes_response(status, body.to_string().into_bytes())
}

fn bytes_response(status: StatusCode, body: Vec<u8>) -> Response {
    (
        status,
        [(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))],
        body,
    )
        .into_response()
}

async fn finish(route: &'static str, response: Response) -> Response {
    let metrics = get_metrics().await;
    metrics
        .http_requests
        .with_label_values(&[route, response.status().as_str()])
        .inc();
    response
}
