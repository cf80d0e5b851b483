use crate::errors::ServiceError;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

const MAX_FILENAME_LEN: usize = 100;

/// Stores uploaded files and hands back a stable reference.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, filename: &str, contents: Bytes) -> Result<String, ServiceError>;
}

/// Keeps only ASCII alphanumerics, `.`, `-` and `_`, strips leading dots
/// and caps the length. Falls back to `upload` when nothing survives.
pub fn sanitize_filename(raw: &str) -> String {
    // Drop any client-side directory components
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);

    let cleaned: String = base
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    let cleaned: String = cleaned.chars().take(MAX_FILENAME_LEN).collect();

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Writes uploads into a local directory
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, filename: &str, contents: Bytes) -> Result<String, ServiceError> {
        if contents.is_empty() {
            return Err(ServiceError::ValidationError(
                "uploaded file is empty".to_string(),
            ));
        }

        // Random prefix keeps references unique for repeated filenames
        let reference = format!("{}-{}", Uuid::new_v4().simple(), sanitize_filename(filename));

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| ServiceError::InternalError(format!("cannot create upload dir: {}", e)))?;
        tokio::fs::write(self.root.join(&reference), &contents)
            .await
            .map_err(|e| ServiceError::InternalError(format!("cannot store upload: {}", e)))?;

        info!(reference = %reference, bytes = contents.len(), "Stored upload");
        metrics::counter!("household_uploads.stored", 1);
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("receipt.jpg", "receipt.jpg")]
    #[case("../../etc/passwd", "passwd")]
    #[case("C:\\photos\\my flour.png", "my_flour.png")]
    #[case("..hidden", "hidden")]
    #[case("mouka-žitná.jpg", "mouka-itn.jpg")]
    #[case("///", "upload")]
    fn sanitizes_names(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(sanitize_filename(raw), expected);
    }

    #[tokio::test]
    async fn stores_under_unique_references() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path().join("uploads"));

        let first = store
            .put("flour.jpg", Bytes::from_static(b"img"))
            .await
            .unwrap();
        let second = store
            .put("flour.jpg", Bytes::from_static(b"img2"))
            .await
            .unwrap();

        assert_ne!(first, second);
        assert!(first.ends_with("-flour.jpg"));
        assert_eq!(
            std::fs::read(store.root().join(&second)).unwrap(),
            b"img2".to_vec()
        );
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let result = store.put("empty.jpg", Bytes::new()).await;
        assert!(matches!(result, Err(ServiceError::ValidationError(_))));
    }
}
