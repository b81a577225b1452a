use async_trait::async_trait;
use bytes::Bytes;

/// An object as returned by the storage backend.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,

    /// The `Cache-Control` metadata of the object, if it has any.
    pub cache_control: Option<String>,
}

/// The narrow view of object storage the pipeline needs.
///
/// `namespace` is the bucket (or equivalent) the object lives in.
#[async_trait]
pub trait ObjectStore: Sync + Send + 'static {
    /// Fetches the object, `Ok(None)` means it does not exist.
    async fn get(&self, namespace: &str, key: &str) -> anyhow::Result<Option<StoredObject>>;

    /// Stores the object and returns where it ended up.
    async fn put(
        &self,
        namespace: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
        cache_control: Option<&str>,
    ) -> anyhow::Result<String>;
}
