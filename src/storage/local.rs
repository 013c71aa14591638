use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use super::{ObjectStore, StorageError, UploadOptions};

/// Object store backed by a directory on local disk. Objects are served by
/// the `/storage/{bucket}/{*path}` route.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    bucket: String,
    public_base_url: String,
}

impl LocalObjectStore {
    /// `root` is the bucket directory; it is created if missing.
    pub fn new(
        root: impl Into<PathBuf>,
        bucket: impl Into<String>,
        public_base_url: impl Into<String>,
    ) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            bucket: bucket.into(),
            public_base_url: public_base_url.into(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Maps an object path onto the bucket directory, refusing anything that
    /// could escape it.
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        if path.is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        options: UploadOptions,
    ) -> Result<String, StorageError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if !options.overwrite && tokio::fs::try_exists(&target).await? {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }

        tokio::fs::write(&target, &bytes).await?;
        tracing::debug!(path, size = bytes.len(), "Stored object");
        Ok(path.to_string())
    }

    async fn read(&self, path: &str) -> Result<Option<Bytes>, StorageError> {
        let target = self.resolve(path)?;
        // Directories inside the bucket are not objects.
        match tokio::fs::metadata(&target).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        match tokio::fs::read(&target).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn public_url(&self, stored_path: &str) -> String {
        format!(
            "{}/storage/{}/{}",
            self.public_base_url.trim_end_matches('/'),
            self.bucket,
            stored_path
        )
    }
}
