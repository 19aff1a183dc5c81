use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;
use crate::storage::BlobStore;

fn ext_from_mime(ct: &str) -> &'static str {
    match ct {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/heic" => "heic",
        _ => "bin",
    }
}

/// Object key under `prefix`, e.g. `avatars/<uuid>.png`.
pub fn object_key(prefix: &str, content_type: &str) -> String {
    format!("{}/{}.{}", prefix, Uuid::new_v4(), ext_from_mime(content_type))
}

/// Uploads a local file and removes it afterwards, whether or not the upload
/// succeeded. No retry: a blob-store failure is surfaced as `Upload`.
pub async fn upload_local(
    storage: &dyn BlobStore,
    path: &Path,
    key: &str,
    content_type: &str,
) -> Result<String, ApiError> {
    let outcome = match tokio::fs::read(path).await {
        Ok(body) => storage
            .upload(key, Bytes::from(body), content_type)
            .await
            .map_err(|e| ApiError::Upload(e.to_string())),
        Err(e) => Err(ApiError::Internal(anyhow::Error::new(e))),
    };
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(error = %e, path = %path.display(), "temp file cleanup failed");
    }
    outcome
}

/// Stages incoming bytes to a temp file, then uploads through `upload_local`.
/// Mirrors the upload contract: the temp artifact never outlives the attempt.
pub async fn stage_and_upload(
    storage: &dyn BlobStore,
    body: Bytes,
    content_type: &str,
    prefix: &str,
) -> Result<String, ApiError> {
    if body.is_empty() {
        return Err(ApiError::Validation("empty file".into()));
    }
    let key = object_key(prefix, content_type);
    let path = temp_path(content_type);
    tokio::fs::write(&path, &body)
        .await
        .map_err(|e| ApiError::Internal(anyhow::Error::new(e)))?;
    upload_local(storage, &path, &key, content_type).await
}

fn temp_path(content_type: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "vidtube-{}.{}",
        Uuid::new_v4(),
        ext_from_mime(content_type)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingBlobStore, FakeBlobStore};
    use std::sync::Arc;

    #[test]
    fn object_key_uses_mime_extension() {
        assert!(object_key("avatars", "image/png").ends_with(".png"));
        assert!(object_key("covers", "image/jpeg").ends_with(".jpg"));
        assert!(object_key("covers", "application/octet-stream").ends_with(".bin"));
        assert!(object_key("avatars", "image/png").starts_with("avatars/"));
    }

    async fn staged_file(name: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        tokio::fs::write(&path, b"image-bytes").await.unwrap();
        path
    }

    #[tokio::test]
    async fn upload_local_uploads_and_removes_the_file() {
        let storage = FakeBlobStore::default();
        let path = staged_file("vidtube-test-success.png").await;
        let url = upload_local(&storage, &path, "avatars/x.png", "image/png")
            .await
            .expect("upload should succeed");
        assert_eq!(url, "https://cdn.fake.local/avatars/x.png");
        assert!(!path.exists());
        assert_eq!(*storage.uploads.lock().unwrap(), vec!["avatars/x.png"]);
    }

    #[tokio::test]
    async fn failed_upload_is_upload_error_and_file_is_still_removed() {
        let path = staged_file("vidtube-test-failure.png").await;
        let err = upload_local(&FailingBlobStore, &path, "avatars/y.png", "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Upload(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn stage_and_upload_returns_public_url() {
        let storage = Arc::new(FakeBlobStore::default());
        let url = stage_and_upload(
            storage.as_ref(),
            Bytes::from_static(b"png-bytes"),
            "image/png",
            "avatars",
        )
        .await
        .expect("upload should succeed");
        assert!(url.starts_with("https://cdn.fake.local/avatars/"));
        assert!(url.ends_with(".png"));
        assert_eq!(storage.uploads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_body_is_a_validation_error() {
        let err = stage_and_upload(&FailingBlobStore, Bytes::new(), "image/png", "avatars")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
