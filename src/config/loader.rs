use std::path::Path;

use anyhow::{anyhow, Result};
use regex::Regex;
use tracing::{debug, error};

use crate::config::settings::BridgeConfig;

/// Load the optional YAML config file, expanding `${VAR}` / `${VAR:default}`.
pub async fn run(config_path: &str) -> Result<BridgeConfig> {
    let path = Path::new(config_path);
    file_to_config(path)
        .await
        .map_err(|e| anyhow!(format!("Invalid config format: {}", e)))
}

pub async fn file_to_config(path: &Path) -> Result<BridgeConfig> {
    let content = tokio::fs::read_to_string(path).await?;
    let expanded = expand_env_vars(&content)?;
    parse_config(&expanded)
}

pub fn parse_config(content: &str) -> Result<BridgeConfig> {
    let config: BridgeConfig = serde_yaml::from_str(content).inspect_err(|e| {
        error!("parse config error: {}", e);
    })?;
    debug!("config parsed");
    Ok(config)
}

fn expand_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{(\w+)(?::([^\}]+))?\}")?;
    Ok(re
        .replace_all(input, |caps: &regex::Captures| {
            let var = &caps[1];
            let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var).unwrap_or_else(|_| default.to_string())
        })
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::LogFormat;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn parses_partial_config() {
        let cfg = parse_config(
            r#"
server:
  http_port: 9090
logging:
  level: debug
  format: json
"#,
        )
        .unwrap();
        let server = cfg.server.unwrap();
        assert_eq!(server.http_port, Some(9090));
        assert_eq!(server.https_port, None);
        let logging = cfg.logging.unwrap();
        assert_eq!(logging.level, "debug");
        assert_eq!(logging.format, LogFormat::Json);
        assert!(cfg.identity.is_none());
        assert!(cfg.metrics.is_none());
    }

    #[test]
    fn metrics_path_defaults() {
        let cfg = parse_config("metrics:\n  port: 9100\n").unwrap();
        let metrics = cfg.metrics.unwrap();
        assert!(metrics.is_enabled());
        assert_eq!(metrics.path, "/metrics");
    }

    #[tokio::test]
    #[serial]
    async fn expands_env_and_defaults_from_file() {
        std::env::set_var("ADAL_BRIDGE_TEST_TENANT", "tenant-from-env");
        std::env::remove_var("ADAL_BRIDGE_TEST_MISSING");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
identity:
  authority_host: ${{ADAL_BRIDGE_TEST_MISSING:https://login.microsoftonline.com}}
  tenant_id: ${{ADAL_BRIDGE_TEST_TENANT}}
  federated_token_file: /var/run/secrets/azure/tokens/azure-identity-token
"#
        )
        .unwrap();

        let cfg = run(file.path().to_str().unwrap()).await.unwrap();
        let identity = cfg.identity.unwrap();
        assert_eq!(
            identity.authority_host.as_deref(),
            Some("https://login.microsoftonline.com")
        );
        assert_eq!(identity.tenant_id.as_deref(), Some("tenant-from-env"));
        assert!(identity.client_id.is_none());

        std::env::remove_var("ADAL_BRIDGE_TEST_TENANT");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = run("/definitely/not/here.yaml").await.unwrap_err();
        assert!(err.to_string().contains("Invalid config format"));
    }
}
