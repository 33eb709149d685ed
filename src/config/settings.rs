use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::ValueEnum;
use serde::Deserialize;

use crate::utils::constants::{
    DEFAULT_HTTPS_PORT, DEFAULT_HTTP_PORT, DEFAULT_METADATA_DIR, DEFAULT_METRICS_PATH,
    DEFAULT_TLS_CERT_PATH, DEFAULT_TLS_KEY_PATH, SERVICE_FRIENDLY_NAME,
};

/// ================================
/// Config file shape (every section optional)
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct BridgeConfig {
    pub server: Option<ServerSection>,
    pub logging: Option<LoggingConfig>,
    pub metrics: Option<MetricsConfig>,
    pub identity: Option<IdentityConfig>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServerSection {
    pub http_port: Option<u16>,
    /// presence enables TLS
    pub https_port: Option<u16>,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
    pub bind_address: Option<IpAddr>,
    pub metadata_dir: Option<PathBuf>,
}

/// Pins the exchange credentials instead of reading the workload identity
/// environment on every request.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct IdentityConfig {
    pub authority_host: Option<String>,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub federated_token_file: Option<PathBuf>,
}

/// ================================
/// Resolved listener configuration
/// ================================
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_port: Option<u16>,
    pub https_port: Option<u16>,
    pub tls_cert_path: PathBuf,
    pub tls_key_path: PathBuf,
    /// loopback unless explicitly overridden
    pub bind_address: IpAddr,
    pub service_name: String,
    pub metadata_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: Some(DEFAULT_HTTP_PORT),
            https_port: None,
            tls_cert_path: PathBuf::from(DEFAULT_TLS_CERT_PATH),
            tls_key_path: PathBuf::from(DEFAULT_TLS_KEY_PATH),
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            service_name: SERVICE_FRIENDLY_NAME.to_owned(),
            metadata_dir: PathBuf::from(DEFAULT_METADATA_DIR),
        }
    }
}

impl ServerConfig {
    /// Command line over config file over defaults. TLS is on when requested
    /// on the command line or when the file names an https port.
    pub fn resolve(cli: &ServerSection, enable_tls: bool, file: Option<&ServerSection>) -> Self {
        let defaults = Self::default();
        let file = file.cloned().unwrap_or_default();
        let tls_enabled = enable_tls || file.https_port.is_some();

        Self {
            http_port: cli.http_port.or(file.http_port).or(defaults.http_port),
            https_port: tls_enabled
                .then(|| cli.https_port.or(file.https_port).unwrap_or(DEFAULT_HTTPS_PORT)),
            tls_cert_path: cli.tls_cert.clone().or(file.tls_cert).unwrap_or(defaults.tls_cert_path),
            tls_key_path: cli.tls_key.clone().or(file.tls_key).unwrap_or(defaults.tls_key_path),
            bind_address: cli.bind_address.or(file.bind_address).unwrap_or(defaults.bind_address),
            service_name: defaults.service_name,
            metadata_dir: cli
                .metadata_dir
                .clone()
                .or(file.metadata_dir)
                .unwrap_or(defaults.metadata_dir),
        }
    }

    pub fn tls_enabled(&self) -> bool {
        self.https_port.is_some()
    }

    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http_port.map(|port| SocketAddr::new(self.bind_address, port))
    }

    pub fn https_addr(&self) -> Option<SocketAddr> {
        self.https_port.map(|port| SocketAddr::new(self.bind_address, port))
    }
}

/// ================================
/// Metrics
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    /// metrics listener is started only when set
    pub port: Option<u16>,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: None,
            path: default_metrics_path(),
        }
    }
}

impl MetricsConfig {
    pub fn is_enabled(&self) -> bool {
        self.port.is_some()
    }
}

fn default_metrics_path() -> String {
    DEFAULT_METRICS_PATH.to_string()
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    #[serde(default)]
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new(level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new("info".to_owned(), LogFormat::Compact)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Compact,
}
