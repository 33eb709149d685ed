use http::header::ACCEPT;
use http::StatusCode;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::errors::BridgeError;
use crate::helpers::time::{expires_on, get_instant};
use crate::identity::credentials::CredentialSource;
use crate::identity::federated::FederatedTokenSource;
use crate::identity::request::TokenRequest;
use crate::observability::metrics::get_metrics;
use crate::utils::constants::{CLIENT_ASSERTION_TYPE, GRANT_TYPE_CLIENT_CREDENTIALS};

static SUCCESS_MSG: &str = "success";
static ERROR_MSG: &str = "error";

/// Token handed back to the IMDS caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    pub client_id: String,
    pub resource: String,
    pub token_type: String,
    pub expires_in: i64,
    /// computed locally when the response is built
    pub expires_on: i64,
    pub ext_expires_in: i64,
}

/// Body of a successful OAuth2 v2.0 token response.
#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    token_type: String,
    expires_in: i64,
    #[serde(default)]
    ext_expires_in: i64,
}

#[derive(Debug, Serialize)]
struct ClientAssertionForm<'a> {
    audience: &'a str,
    client_assertion: &'a str,
    client_assertion_type: &'a str,
    client_id: &'a str,
    grant_type: &'a str,
    scope: &'a str,
}

/// Trades the projected federated token for an access token, one upstream
/// call per inbound request. No caching, no retries.
#[derive(Debug, Clone)]
pub struct TokenExchangeClient {
    client: Client,
    credentials: CredentialSource,
}

impl TokenExchangeClient {
    pub fn new(client: Client, credentials: CredentialSource) -> Self {
        Self {
            client,
            credentials,
        }
    }

    pub async fn acquire(&self, request: &TokenRequest) -> Result<TokenResponse, BridgeError> {
        let metrics = get_metrics().await;
        let start = get_instant();

        let result = self.exchange(request).await;

        let outcome = if result.is_ok() { SUCCESS_MSG } else { ERROR_MSG };
        metrics.token_exchanges.with_label_values(&[outcome]).inc();
        metrics
            .token_exchange_duration
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());
        result
    }

    async fn exchange(&self, request: &TokenRequest) -> Result<TokenResponse, BridgeError> {
        // everything before the upstream call fails locally
        let credentials = self.credentials.load()?;
        let client_id = request.resolve_client_id(credentials.client_id.as_deref())?;
        let scope = request.resolve_scope()?;

        let assertion = FederatedTokenSource::new(&credentials.federated_token_file)
            .read_assertion()
            .await;

        let form = ClientAssertionForm {
            audience: &credentials.tenant_id,
            client_assertion: &assertion,
            client_assertion_type: CLIENT_ASSERTION_TYPE,
            client_id: &client_id,
            grant_type: GRANT_TYPE_CLIENT_CREDENTIALS,
            scope: &scope,
        };

        let endpoint = credentials.token_endpoint();
        debug!(endpoint = %endpoint, client_id = %client_id, scope = %scope, "requesting access token");

        let response = self
            .client
            .post(&endpoint)
            .header(ACCEPT, "application/json")
            // sets Content-Type: application/x-www-form-urlencoded
            .form(&form)
            .send()
            .await
            .inspect_err(|err| {
                error!(endpoint = %endpoint, client_id = %client_id, "requesting access token: {}", err)
            })?;

        let status = response.status();
        let body = response.text().await.inspect_err(|err| {
            error!("reading response body: {}", err);
        })?;

        if status != StatusCode::OK {
            error!(status = status.as_u16(), body = %body, "token service rejected the exchange");
            return Err(BridgeError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let upstream: OAuthTokenResponse = serde_json::from_str(&body).inspect_err(|err| {
            error!(response = %body, "unmarshalling response from token service: {}", err);
        })?;

        let expires_on = expires_on(upstream.expires_in).ok_or_else(|| {
            error!(expires_in = upstream.expires_in, "expires_in out of range");
            BridgeError::InvalidTokenResponse(format!(
                "expires_in {} is out of range",
                upstream.expires_in
            ))
        })?;

        info!(client_id = %client_id, scope = %scope, expires_in = upstream.expires_in, "access token acquired");

        Ok(TokenResponse {
            access_token: upstream.access_token,
            client_id,
            resource: request.resource.clone().unwrap_or_default(),
            token_type: upstream.token_type,
            expires_in: upstream.expires_in,
            expires_on,
            ext_expires_in: upstream.ext_expires_in,
        })
    }
}

