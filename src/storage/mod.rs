mod local;

use async_trait::async_trait;
use bytes::Bytes;

pub use self::local::LocalObjectStore;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid object path: {0}")]
    InvalidPath(String),

    #[error("object already exists: {0}")]
    AlreadyExists(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UploadOptions {
    /// Replace an existing object at the same path instead of failing.
    pub overwrite: bool,
}

/// Blob storage for uploaded images.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `path` and returns the stored path.
    async fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        options: UploadOptions,
    ) -> Result<String, StorageError>;

    /// Reads an object back. `None` when nothing is stored at `path`.
    async fn read(&self, path: &str) -> Result<Option<Bytes>, StorageError>;

    /// Public URL for a path returned by [`ObjectStore::upload`].
    fn public_url(&self, stored_path: &str) -> String;
}

/// Reduces a client-supplied file name to something safe to embed in an
/// object path: last path component only, no separators or control chars.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_plain_names() {
        assert_eq!(sanitize_file_name("beach.jpg"), "beach.jpg");
        assert_eq!(sanitize_file_name("my-photo_01.png"), "my-photo_01.png");
    }

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\pic.png"), "pic.png");
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_file_name("my photo (1).jpg"), "my_photo__1_.jpg");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "file");
        assert_eq!(sanitize_file_name("dir/"), "file");
    }
}
