// tests/common/mod.rs
pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use reqwest::Client;
use tempfile::TempDir;

use crate::config::settings::IdentityConfig;
use crate::identity::credentials::CredentialSource;
use crate::identity::exchange::TokenExchangeClient;
use crate::metadata::snapshot::MetadataSnapshotStore;
use crate::server::server::{router, AppState};

pub const TENANT_ID: &str = "00000000-0000-0000-0000-00000000cafe";
pub const DEFAULT_CLIENT_ID: &str = "11111111-2222-3333-4444-555555555555";
pub const FEDERATED_TOKEN: &str = "eyJhbGciOiJSUzI1NiIsImtpZCI6InRlc3QifQ.eyJzdWIiOiJzeXN0ZW06c2VydmljZWFjY291bnQ6ZGVmYXVsdDp3b3JrbG9hZCJ9.c2ln";

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

/// Snapshot files for every supported api-version, each with distinct content.
pub fn write_snapshots(dir: &Path) {
    for (file, body) in [
        ("metadata20150101.json", r#"{"galleryEndpoint":"https://gallery.azure.com/","version":"2015-01-01"}"#),
        ("metadata20180101.json", r#"{"galleryEndpoint":"https://gallery.azure.com/","version":"2018-01-01"}"#),
        ("metadata20190501.json", r#"{"cloudEndpoint":{"public":{"endpoint":"management.azure.com"}},"version":"2019-05-01"}"#),
        ("metadata20220901.json", r#"{"cloudEndpoint":{"public":{"endpoint":"management.azure.com"}},"version":"2022-09-01"}"#),
    ] {
        std::fs::write(dir.join(file), body).expect("write snapshot");
    }
}

/// Workload identity fixture: a projected token file plus pinned credentials
/// pointing at `authority_host`.
pub struct IdentityFixture {
    pub dir: TempDir,
    pub token_file: PathBuf,
    pub credentials: CredentialSource,
}

pub fn identity_fixture(authority_host: &str, default_client_id: Option<&str>) -> IdentityFixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let token_file = dir.path().join("azure-identity-token");
    std::fs::write(&token_file, FEDERATED_TOKEN).expect("write token");
    let credentials = CredentialSource::Static(IdentityConfig {
        authority_host: Some(authority_host.to_owned()),
        tenant_id: Some(TENANT_ID.to_owned()),
        client_id: default_client_id.map(str::to_owned),
        federated_token_file: Some(token_file.clone()),
    });
    IdentityFixture {
        dir,
        token_file,
        credentials,
    }
}

/// The IMDS router wired to `credentials` and the snapshot directory.
pub fn bridge_router(credentials: CredentialSource, metadata_dir: &Path) -> Router {
    let exchange = TokenExchangeClient::new(build_reqwest_client(), credentials);
    router(AppState::new(exchange, MetadataSnapshotStore::new(metadata_dir)))
}

pub fn token_path(tenant_id: &str) -> String {
    format!("/{}/oauth2/v2.0/token", tenant_id)
}
