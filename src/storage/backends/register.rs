use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::storage::ObjectStore;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendConfigs {
    FileSystem {
        directory: PathBuf,
    },
    BlobStorage {
        region: String,

        /// Set for S3 compatible services other than AWS.
        #[serde(default)]
        endpoint: Option<String>,

        #[serde(default)]
        access_key: Option<String>,

        #[serde(default)]
        secret_key: Option<String>,

        #[serde(default)]
        security_token: Option<String>,

        #[serde(default)]
        session_token: Option<String>,

        /// Use `endpoint/bucket/key` addressing instead of `bucket.endpoint/key`.
        #[serde(default)]
        path_style: bool,

        #[serde(default)]
        request_timeout_secs: Option<u64>,
    },
}

impl BackendConfigs {
    pub fn connect(&self) -> anyhow::Result<Arc<dyn ObjectStore>> {
        match self {
            Self::FileSystem { directory } => Ok(Arc::new(
                super::filesystem::FileSystemBackend::new(directory.clone()),
            )),
            Self::BlobStorage {
                region,
                endpoint,
                access_key,
                secret_key,
                security_token,
                session_token,
                path_style,
                request_timeout_secs,
            } => {
                let backend = super::blob_storage::BlobStorageBackend::new(
                    region.clone(),
                    endpoint.clone(),
                    access_key.as_deref(),
                    secret_key.as_deref(),
                    security_token.as_deref(),
                    session_token.as_deref(),
                    *path_style,
                    request_timeout_secs.map(Duration::from_secs),
                )?;

                Ok(Arc::new(backend))
            },
        }
    }
}
