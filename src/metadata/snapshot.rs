use std::path::PathBuf;

use tracing::error;

use crate::errors::BridgeError;
use crate::observability::metrics::get_metrics;

/// Static `/metadata/endpoints` documents, one per supported api-version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotVersion {
    V2015_01_01,
    V2018_01_01,
    V2019_05_01,
    V2022_09_01,
}

impl SnapshotVersion {
    /// Exact, case-sensitive api-version lookup.
    pub fn from_api_version(api_version: &str) -> Option<Self> {
        match api_version {
            "1.0" | "2015-01-01" => Some(Self::V2015_01_01),
            "2018-01-01" => Some(Self::V2018_01_01),
            "2019-05-01" | "2020-06-01" => Some(Self::V2019_05_01),
            "2022-09-01" => Some(Self::V2022_09_01),
            _ => None,
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::V2015_01_01 => "metadata20150101.json",
            Self::V2018_01_01 => "metadata20180101.json",
            Self::V2019_05_01 => "metadata20190501.json",
            Self::V2022_09_01 => "metadata20220901.json",
        }
    }
}

/// Reads snapshots from a directory on every lookup; nothing is cached.
#[derive(Debug, Clone)]
pub struct MetadataSnapshotStore {
    dir: PathBuf,
}

impl MetadataSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn load(&self, api_version: &str) -> Result<Vec<u8>, BridgeError> {
        let metrics = get_metrics().await;

        let Some(version) = SnapshotVersion::from_api_version(api_version) else {
            error!(api_version = %api_version, "bad request: unrecognised api-version");
            metrics
                .metadata_snapshot_reads
                .with_label_values(&["unknown", "rejected"])
                .inc();
            return Err(BridgeError::UnknownApiVersion(api_version.to_owned()));
        };

        let path = self.dir.join(version.file_name());
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                metrics
                    .metadata_snapshot_reads
                    .with_label_values(&[api_version, "success"])
                    .inc();
                Ok(bytes)
            }
            Err(source) => {
                error!(path = %path.display(), "reading metadata from file: {}", source);
                metrics
                    .metadata_snapshot_reads
                    .with_label_values(&[api_version, "error"])
                    .inc();
                Err(BridgeError::SnapshotRead { path, source })
            }
        }
    }
}
