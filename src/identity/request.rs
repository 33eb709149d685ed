use crate::errors::BridgeError;

/// Parameters of one `/metadata/identity/oauth2/token` call.
///
/// Empty query values are treated as absent, the way IMDS clients send them.
#[derive(Debug, Clone, Default)]
pub struct TokenRequest {
    pub resource: Option<String>,
    pub scope: Option<String>,
    pub client_id: Option<String>,
}

impl TokenRequest {
    pub fn new(resource: Option<String>, scope: Option<String>, client_id: Option<String>) -> Self {
        Self {
            resource: resource.filter(|v| !v.is_empty()),
            scope: scope.filter(|v| !v.is_empty()),
            client_id: client_id.filter(|v| !v.is_empty()),
        }
    }

    /// Build from decoded query pairs. A repeated key keeps its first value.
    pub fn from_query(pairs: &[(String, String)]) -> Self {
        Self::new(
            query_value(pairs, "resource"),
            query_value(pairs, "scope"),
            query_value(pairs, "client_id"),
        )
    }

    /// An explicit scope wins; otherwise `<resource>/.default`.
    pub fn resolve_scope(&self) -> Result<String, BridgeError> {
        match (&self.scope, &self.resource) {
            (Some(scope), _) => Ok(scope.clone()),
            (None, Some(resource)) => Ok(format!("{}/.default", resource)),
            (None, None) => Err(BridgeError::Parameter(
                "`scope` or `resource` must be specified by the calling client".to_owned(),
            )),
        }
    }

    /// Caller-supplied client id, else the process-wide default identity.
    pub fn resolve_client_id(&self, default: Option<&str>) -> Result<String, BridgeError> {
        self.client_id
            .as_deref()
            .or(default.filter(|v| !v.is_empty()))
            .map(str::to_owned)
            .ok_or_else(|| {
                BridgeError::Parameter(
                    "environment variable AZURE_CLIENT_ID is not set, or clientId was not specified by the calling client"
                        .to_owned(),
                )
            })
    }
}

/// First value of `key` in query order.
pub fn query_value(pairs: &[(String, String)], key: &str) -> Option<String> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
}
