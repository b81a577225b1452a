use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};

use crate::storage::{ObjectStore, StoredObject};

/// S3 compatible storage, each namespace is a bucket.
pub struct BlobStorageBackend {
    region: Region,
    credentials: Credentials,
    path_style: bool,
    request_timeout: Option<Duration>,
}

impl BlobStorageBackend {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        region: String,
        endpoint: Option<String>,
        access_key: Option<&str>,
        secret_key: Option<&str>,
        security_token: Option<&str>,
        session_token: Option<&str>,
        path_style: bool,
        request_timeout: Option<Duration>,
    ) -> Result<Self> {
        // Missing keys fall back to the environment / instance profile.
        let credentials =
            Credentials::new(access_key, secret_key, security_token, session_token, None)?;
        let region = match endpoint {
            Some(endpoint) => Region::Custom { region, endpoint },
            None => region.parse()?,
        };

        Ok(Self {
            region,
            credentials,
            path_style,
            request_timeout,
        })
    }

    fn bucket(&self, namespace: &str) -> Result<Box<Bucket>> {
        let mut bucket = Bucket::new(namespace, self.region.clone(), self.credentials.clone())?;
        if self.path_style {
            bucket = bucket.with_path_style();
        }
        bucket.set_request_timeout(self.request_timeout);

        Ok(bucket)
    }
}

#[async_trait]
impl ObjectStore for BlobStorageBackend {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<StoredObject>> {
        let bucket = self.bucket(namespace)?;

        debug!("Retrieving object in bucket {} @ {}", namespace, key);
        let response = match bucket.get_object(key).await {
            Ok(response) => response,
            Err(S3Error::HttpFailWithBody(404, _)) => return Ok(None),
            Err(other) => return Err(other.into()),
        };

        let code = response.status_code();
        if code == 404 {
            Ok(None)
        } else if code != 200 {
            Err(anyhow!(
                "Remote storage bucket did not respond correctly, expected status 200 got {}",
                code
            ))
        } else {
            let cache_control = response
                .headers()
                .into_iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("cache-control"))
                .map(|(_, value)| value);

            Ok(Some(StoredObject {
                data: response.bytes().clone(),
                cache_control,
            }))
        }
    }

    async fn put(
        &self,
        namespace: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
        cache_control: Option<&str>,
    ) -> Result<String> {
        let mut bucket = self.bucket(namespace)?;
        if let Some(value) = cache_control {
            bucket.add_header("cache-control", value);
        }

        debug!("Storing object in bucket {} @ {}", namespace, key);
        let response = bucket
            .put_object_with_content_type(key, &data, content_type)
            .await?;

        let code = response.status_code();
        if code != 200 {
            Err(anyhow!(
                "Remote storage bucket did not respond correctly, expected status 200 got {}",
                code
            ))
        } else {
            Ok(format!("{}/{}", bucket.url(), key.trim_start_matches('/')))
        }
    }
}
