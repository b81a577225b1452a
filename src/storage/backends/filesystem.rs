use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;

use crate::storage::{ObjectStore, StoredObject};

/// Stores objects as flat files under `<directory>/<namespace>/objects`.
///
/// Keys are escaped into a single path component so `a.jpg` and
/// `a.jpg/thumb` can live side by side. The cache control value of each
/// object is kept in a matching file under `<directory>/<namespace>/meta`.
pub struct FileSystemBackend {
    directory: PathBuf,
}

impl FileSystemBackend {
    pub fn new(dir: PathBuf) -> Self {
        Self { directory: dir }
    }

    #[inline]
    fn format_paths(&self, namespace: &str, key: &str) -> anyhow::Result<(PathBuf, PathBuf)> {
        if !is_plain_component(namespace) {
            return Err(anyhow!("Invalid namespace {:?}", namespace));
        }

        let name = escape_key(key).ok_or_else(|| anyhow!("Invalid object key {:?}", key))?;
        let base = self.directory.join(namespace);

        Ok((base.join("objects").join(&name), base.join("meta").join(name)))
    }
}

fn is_plain_component(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(|c: char| c == '/' || c == '\\')
}

/// Turns a key into a single file name.
fn escape_key(key: &str) -> Option<String> {
    let escaped = key
        .replace('%', "%25")
        .replace('/', "%2F")
        .replace('\\', "%5C");

    if is_plain_component(&escaped) {
        Some(escaped)
    } else {
        None
    }
}

async fn write_creating_parent(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    match tokio::fs::write(path, data).await {
        Ok(()) => Ok(()),
        Err(ref e) if e.kind() == ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, data).await?;
            Ok(())
        },
        Err(other) => Err(other.into()),
    }
}

#[async_trait]
impl ObjectStore for FileSystemBackend {
    async fn get(&self, namespace: &str, key: &str) -> anyhow::Result<Option<StoredObject>> {
        let (path, meta_path) = self.format_paths(namespace, key)?;

        debug!("Retrieving object @ {:?}", &path);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => Bytes::from(data),
            Err(ref e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(other) => return Err(other.into()),
        };

        let cache_control = match tokio::fs::read_to_string(&meta_path).await {
            Ok(value) => Some(value),
            Err(ref e) if e.kind() == ErrorKind::NotFound => None,
            Err(other) => return Err(other.into()),
        };

        Ok(Some(StoredObject {
            data,
            cache_control,
        }))
    }

    async fn put(
        &self,
        namespace: &str,
        key: &str,
        data: Bytes,
        _content_type: &str,
        cache_control: Option<&str>,
    ) -> anyhow::Result<String> {
        let (path, meta_path) = self.format_paths(namespace, key)?;

        debug!("Storing object @ {:?}", &path);
        write_creating_parent(&path, &data).await?;

        match cache_control {
            Some(value) => write_creating_parent(&meta_path, value.as_bytes()).await?,
            None => match tokio::fs::remove_file(&meta_path).await {
                Ok(()) => {},
                Err(ref e) if e.kind() == ErrorKind::NotFound => {},
                Err(other) => return Err(other.into()),
            },
        }

        Ok(path.display().to_string())
    }
}
