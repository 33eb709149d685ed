use std::path::PathBuf;

use tracing::error;

/// The projected service-account token used as the client assertion.
#[derive(Debug, Clone)]
pub struct FederatedTokenSource {
    path: PathBuf,
}

impl FederatedTokenSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the assertion at call time.
    ///
    /// An unreadable file yields an empty assertion: the exchange still goes
    /// out and the authority's rejection becomes the reported error.
    pub async fn read_assertion(&self) -> String {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => {
                error!(
                    path = %self.path.display(),
                    "reading federated token: {}; continuing with an empty client assertion",
                    err
                );
                String::new()
            }
        }
    }
}
