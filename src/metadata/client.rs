use http::header::ACCEPT;
use http::StatusCode;
use reqwest::{Client, Url};
use tracing::error;

use crate::errors::BridgeError;
use crate::identity::exchange::TokenResponse;
use crate::utils::constants::{CLIENT_API_VERSION, TOKEN_PATH};

/// Ask an instance metadata endpoint (this bridge, or real IMDS) for a token.
pub async fn access_token(
    client: &Client,
    metadata_url: &str,
    resource: Option<&str>,
    scope: Option<&str>,
    client_id: Option<&str>,
) -> Result<TokenResponse, BridgeError> {
    let client_id = client_id
        .filter(|v| !v.is_empty())
        .ok_or_else(|| BridgeError::Parameter("clientId was not specified".to_owned()))?;
    let resource = resolve_resource(resource, scope)?;

    let mut url = Url::parse(&format!("{}{}", metadata_url.trim_end_matches('/'), TOKEN_PATH))
        .map_err(|e| BridgeError::Config(format!("parsing metadata url: {}", e)))?;
    url.query_pairs_mut()
        .append_pair("api-version", CLIENT_API_VERSION)
        .append_pair("client_id", client_id)
        .append_pair("resource", &resource);

    let response = client
        .get(url)
        .header(ACCEPT, "application/json")
        .send()
        .await
        .inspect_err(|err| {
            error!(client_id = %client_id, resource = %resource, "requesting access token: {}", err)
        })?;

    let status = response.status();
    let body = response.text().await?;
    if status != StatusCode::OK {
        return Err(BridgeError::UpstreamStatus {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|err| {
        error!(response_body = %body, "unmarshalling response from instance metadata service: {}", err);
        BridgeError::Decode(err)
    })
}

/// IMDS only understands `resource`; a scope is reduced to `https://<host>`.
fn resolve_resource(resource: Option<&str>, scope: Option<&str>) -> Result<String, BridgeError> {
    if let Some(resource) = resource.filter(|v| !v.is_empty()) {
        return Ok(resource.to_owned());
    }
    let scope = scope
        .filter(|v| !v.is_empty())
        .ok_or_else(|| BridgeError::Parameter("`scope` or `resource` must be specified".to_owned()))?;
    let parsed = Url::parse(scope)
        .map_err(|e| BridgeError::Parameter(format!("parsing scope: {}", e)))?;
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(format!("https://{}", host)),
        _ => Err(BridgeError::Parameter("invalid scope specified".to_owned())),
    }
}
