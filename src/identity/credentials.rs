use std::env;
use std::path::PathBuf;

use tracing::error;

use crate::config::settings::IdentityConfig;
use crate::errors::BridgeError;
use crate::utils::constants::{
    ENV_AUTHORITY_HOST, ENV_CLIENT_ID, ENV_FEDERATED_TOKEN_FILE, ENV_TENANT_ID,
};

/// What one exchange needs to reach the authority.
#[derive(Debug, Clone)]
pub struct ExchangeCredentials {
    pub authority_host: String,
    pub tenant_id: String,
    /// default identity when the caller omits `client_id`
    pub client_id: Option<String>,
    pub federated_token_file: PathBuf,
}

impl ExchangeCredentials {
    pub fn token_endpoint(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

/// Where exchange credentials come from. Loaded on every acquisition, so a
/// rotated environment or token file is picked up by the next request.
#[derive(Debug, Clone, Default)]
pub enum CredentialSource {
    /// AKS Workload Identity environment variables.
    #[default]
    Env,
    /// Pinned through the config file.
    Static(IdentityConfig),
}

impl CredentialSource {
    pub fn load(&self) -> Result<ExchangeCredentials, BridgeError> {
        match self {
            CredentialSource::Env => build_credentials(
                env_value(ENV_AUTHORITY_HOST),
                env_value(ENV_TENANT_ID),
                env_value(ENV_CLIENT_ID),
                env_value(ENV_FEDERATED_TOKEN_FILE).map(PathBuf::from),
            ),
            CredentialSource::Static(identity) => build_credentials(
                identity.authority_host.clone(),
                identity.tenant_id.clone(),
                identity.client_id.clone(),
                identity.federated_token_file.clone(),
            ),
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn build_credentials(
    authority_host: Option<String>,
    tenant_id: Option<String>,
    client_id: Option<String>,
    federated_token_file: Option<PathBuf>,
) -> Result<ExchangeCredentials, BridgeError> {
    let authority_host = require(authority_host, ENV_AUTHORITY_HOST)?;
    let federated_token_file = require(
        federated_token_file.filter(|p| !p.as_os_str().is_empty()),
        ENV_FEDERATED_TOKEN_FILE,
    )?;
    let tenant_id = require(tenant_id, ENV_TENANT_ID)?;

    Ok(ExchangeCredentials {
        authority_host,
        tenant_id,
        client_id: client_id.filter(|v| !v.is_empty()),
        federated_token_file,
    })
}

fn require<T>(value: Option<T>, name: &str) -> Result<T, BridgeError> {
    value.ok_or_else(|| {
        error!("`{}` is not set", name);
        BridgeError::Config(format!("{} is not set", name))
    })
}
