//! Blob-storage side of the backend facade.

use async_trait::async_trait;
use bytes::Bytes;

use crate::errors::BackendError;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Uploads `body` at `path`. Never overwrites: an existing object yields
    /// `BackendError::AlreadyExists`.
    async fn upload(
        &self,
        path: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), BackendError>;

    /// Publicly dereferenceable URL of the object at `path`.
    fn public_url(&self, path: &str) -> String;

    async fn remove(&self, path: &str) -> Result<(), BackendError>;
}
