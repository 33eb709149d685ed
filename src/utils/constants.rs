//! Shared constants and defaults

pub const SERVICE_NAME: &str = "workload-identity-adal-bridge";
pub const SERVICE_FRIENDLY_NAME: &str = "Workload Identity ADAL Bridge Service";

pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_HTTPS_PORT: u16 = 8443;
pub const DEFAULT_TLS_CERT_PATH: &str = "server.pem";
pub const DEFAULT_TLS_KEY_PATH: &str = "server.key";
pub const DEFAULT_METADATA_DIR: &str = "metadata";
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Grace window for in-flight requests once the stop signal fires.
pub const SHUTDOWN_GRACE_SECS: u64 = 5;

// IMDS routes
pub const ENDPOINTS_PATH: &str = "/metadata/endpoints";
pub const TOKEN_PATH: &str = "/metadata/identity/oauth2/token";

// Workload identity environment
pub const ENV_AUTHORITY_HOST: &str = "AZURE_AUTHORITY_HOST";
pub const ENV_TENANT_ID: &str = "AZURE_TENANT_ID";
pub const ENV_CLIENT_ID: &str = "AZURE_CLIENT_ID";
pub const ENV_FEDERATED_TOKEN_FILE: &str = "AZURE_FEDERATED_TOKEN_FILE";

pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";
pub const GRANT_TYPE_CLIENT_CREDENTIALS: &str = "client_credentials";

/// api-version the IMDS client asks for.
pub const CLIENT_API_VERSION: &str = "2022-09-01";
