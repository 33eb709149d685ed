use std::net::IpAddr;
use std::path::PathBuf;

use adal_bridge::config::loader as config_loader;
use adal_bridge::config::settings::{BridgeConfig, LogFormat, MetricsConfig, ServerConfig, ServerSection};
use adal_bridge::identity::credentials::CredentialSource;
use adal_bridge::identity::exchange::TokenExchangeClient;
use adal_bridge::identity::request::TokenRequest;
use adal_bridge::metadata::client as metadata_client;
use adal_bridge::metadata::snapshot::MetadataSnapshotStore;
use adal_bridge::observability::metrics::get_metrics;
use adal_bridge::observability::routes::MetricsState;
use adal_bridge::observability::service_resources_metrics::collect_process_metrics;
use adal_bridge::server::listener::ListenerManager;
use adal_bridge::server::server::{router, AppState};
use adal_bridge::utils::constants::{SERVICE_FRIENDLY_NAME, SERVICE_NAME};
use adal_bridge::utils::logging::{self, LogLevel};
use anyhow::{Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = SERVICE_NAME,
    author,
    version,
    about = "A wrapper for ADAL-based managed service identity in AKS clusters using workload identity",
    long_about = "A wrapper for ADAL-based managed service identity in Azure, for applications that do not support workload identity for Azure Kubernetes Service. It emulates the instance metadata service to vend access tokens using AKS Workload Identity."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    #[arg(long, env = "LOG_LEVEL", value_enum, global = true)]
    log_level: Option<LogLevel>,
    #[arg(long, env = "LOG_FORMAT", value_enum, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Command {
    /// Launch the instance metadata service
    Serve(ServeArgs),
    /// Run the API client
    #[command(subcommand)]
    Client(ClientCommand),
}

#[derive(Args)]
struct ServeArgs {
    /// optional YAML config file
    #[arg(short, long, env = "CONFIG")]
    config: Option<String>,
    /// HTTP port to listen on [default: 8080]
    #[arg(long, env = "HTTP_PORT")]
    http_port: Option<u16>,
    /// HTTPS port to listen on when TLS is enabled [default: 8443]
    #[arg(long, env = "HTTPS_PORT")]
    https_port: Option<u16>,
    /// enable TLS
    #[arg(long, env = "ENABLE_TLS")]
    enable_tls: bool,
    /// path to PEM-encoded TLS certificate [default: server.pem]
    #[arg(long, env = "TLS_CERT")]
    tls_cert: Option<PathBuf>,
    /// path to PEM-encoded TLS key [default: server.key]
    #[arg(long, env = "TLS_KEY")]
    tls_key: Option<PathBuf>,
    /// address every listener binds to [default: 127.0.0.1]
    #[arg(long, env = "BIND_ADDRESS")]
    bind_address: Option<IpAddr>,
    /// directory holding the /metadata/endpoints snapshots [default: metadata]
    #[arg(long, env = "METADATA_DIR")]
    metadata_dir: Option<PathBuf>,
    /// serve prometheus metrics on this port
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,
}

#[derive(Subcommand)]
enum ClientCommand {
    /// Acquire an access token from the authority using the federated token
    #[command(group(ArgGroup::new("target").required(true).args(["resource", "scope"])))]
    Token {
        /// client ID
        #[arg(long)]
        client_id: String,
        /// resource URL
        #[arg(long)]
        resource: Option<String>,
        /// scope URI
        #[arg(long)]
        scope: Option<String>,
    },
    /// Acquire an access token from an instance metadata endpoint
    #[command(group(ArgGroup::new("target").required(true).args(["resource", "scope"])))]
    MetadataToken {
        #[arg(long, env = "METADATA_URL", default_value = "http://169.254.169.254")]
        metadata_url: String,
        /// client ID
        #[arg(long)]
        client_id: String,
        /// resource URL
        #[arg(long)]
        resource: Option<String>,
        /// scope URI
        #[arg(long)]
        scope: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => serve(args, cli.log_level, cli.log_format).await,
        Command::Client(command) => {
            logging::init_logging(&logging::resolve(None, cli.log_level.or(Some(LogLevel::ERROR)), cli.log_format));
            client(command).await
        }
    }
}

async fn serve(args: ServeArgs, log_level: Option<LogLevel>, log_format: Option<LogFormat>) -> Result<()> {
    // -------------------------------
    // 1. Load config, init logging
    // -------------------------------

    let file_config = match &args.config {
        Some(path) => config_loader::run(path).await?,
        None => BridgeConfig::default(),
    };
    logging::init_logging(&logging::resolve(file_config.logging.as_ref(), log_level, log_format));
    info!("{} {}", SERVICE_NAME, env!("CARGO_PKG_VERSION"));

    let cli_server = ServerSection {
        http_port: args.http_port,
        https_port: args.https_port,
        tls_cert: args.tls_cert,
        tls_key: args.tls_key,
        bind_address: args.bind_address,
        metadata_dir: args.metadata_dir,
    };
    let server_config = ServerConfig::resolve(&cli_server, args.enable_tls, file_config.server.as_ref());

    let mut metrics_config = file_config.metrics.clone().unwrap_or_default();
    metrics_config.port = args.metrics_port.or(metrics_config.port);

    // -------------------------------
    // 2. Build handler state
    // -------------------------------

    let credentials = file_config
        .identity
        .clone()
        .map(CredentialSource::Static)
        .unwrap_or_default();
    let exchange = TokenExchangeClient::new(Client::new(), credentials);
    let snapshots = MetadataSnapshotStore::new(&server_config.metadata_dir);
    let app = router(AppState::new(exchange, snapshots));

    // -------------------------------
    // 3. Start listeners, stop on SIGINT / SIGTERM
    // -------------------------------

    let shutdown = CancellationToken::new();
    let mut manager = ListenerManager::new(server_config, app, shutdown.clone())
        .context("configuring listeners")?;

    if let Some(port) = metrics_config.port {
        let metrics = get_metrics().await;
        let metrics_router = MetricsState::new(metrics.registry.clone()).router(&metrics_config);
        manager = manager.with_metrics_listener(port, metrics_router);
        tokio::spawn(collect_process_metrics(shutdown.clone()));
    }

    tokio::spawn(stop_on_signal(shutdown.clone()));
    info!("{} starting...", SERVICE_FRIENDLY_NAME);
    manager.run().await.context("serving instance metadata")?;

    Ok(())
}

async fn client(command: ClientCommand) -> Result<()> {
    let token = match command {
        ClientCommand::Token {
            client_id,
            resource,
            scope,
        } => {
            let exchange = TokenExchangeClient::new(Client::new(), CredentialSource::Env);
            exchange
                .acquire(&TokenRequest::new(resource, scope, Some(client_id)))
                .await?
        }
        ClientCommand::MetadataToken {
            metadata_url,
            client_id,
            resource,
            scope,
        } => {
            metadata_client::access_token(
                &Client::new(),
                &metadata_url,
                resource.as_deref(),
                scope.as_deref(),
                Some(&client_id),
            )
            .await?
        }
    };

    println!("{}", token.access_token);
    Ok(())
}

async fn stop_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("listening for ctrl-c: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("listening for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = shutdown.cancelled() => return,
    }

    info!("stop signal received");
    shutdown.cancel();
}
