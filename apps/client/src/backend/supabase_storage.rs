//! Storage REST (`/storage/v1`) implementation of `BlobStore`.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use tokio::sync::watch;
use tracing::info;

use crate::backend::auth::Session;
use crate::backend::http::RestClient;
use crate::backend::storage::BlobStore;
use crate::errors::BackendError;

const CACHE_CONTROL: &str = "max-age=3600";

pub struct SupabaseStorage {
    rest: RestClient,
    bucket: String,
    session: watch::Receiver<Option<Session>>,
}

impl SupabaseStorage {
    pub fn new(
        rest: RestClient,
        bucket: impl Into<String>,
        session: watch::Receiver<Option<Session>>,
    ) -> Self {
        Self {
            rest,
            bucket: bucket.into(),
            session,
        }
    }

    fn object_path(&self, path: &str) -> String {
        format!("/storage/v1/object/{}/{}", self.bucket, path)
    }

    fn bearer(&self) -> Option<String> {
        self.session
            .borrow()
            .as_ref()
            .map(|s| s.access_token.clone())
    }
}

#[async_trait]
impl BlobStore for SupabaseStorage {
    async fn upload(
        &self,
        path: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), BackendError> {
        let bearer = self.bearer();
        let request = self
            .rest
            .request(Method::POST, &self.object_path(path), bearer.as_deref())
            .header("x-upsert", "false")
            .header("cache-control", CACHE_CONTROL)
            .header("content-type", content_type)
            .body(body);

        match self.rest.send(request, false).await {
            Ok(_) => {
                info!("Uploaded object {}/{}", self.bucket, path);
                Ok(())
            }
            // Duplicates arrive as HTTP 400; the parsed error carries the embedded 409.
            Err(BackendError::Api { status: 409, .. }) => {
                Err(BackendError::AlreadyExists(path.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    fn public_url(&self, path: &str) -> String {
        self.rest
            .url(&format!("/storage/v1/object/public/{}/{}", self.bucket, path))
    }

    async fn remove(&self, path: &str) -> Result<(), BackendError> {
        let bearer = self.bearer();
        let request = self.rest.request(
            Method::DELETE,
            &self.object_path(path),
            bearer.as_deref(),
        );
        self.rest.send(request, true).await?;
        info!("Removed object {}/{}", self.bucket, path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::http::stub;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use std::time::Duration;

    const OBJECT_ROUTE: &str = "/storage/v1/object/resumes/*path";

    #[tokio::test]
    async fn test_duplicate_upload_is_already_exists() {
        let rest = stub::serve(Router::new().route(
            OBJECT_ROUTE,
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    r#"{"statusCode":"409","error":"Duplicate","message":"The resource already exists"}"#,
                )
            }),
        ))
        .await;
        let (_tx, rx) = watch::channel(None);
        let storage = SupabaseStorage::new(rest, "resumes", rx);

        let err = storage
            .upload("u1/1.pdf", Bytes::from_static(b"%PDF"), "application/pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::AlreadyExists(path) if path == "u1/1.pdf"));
    }

    #[tokio::test]
    async fn test_upload_never_asks_for_upsert() {
        let rest = stub::serve(Router::new().route(
            OBJECT_ROUTE,
            post(|headers: HeaderMap| async move {
                let upsert = headers.get("x-upsert").and_then(|v| v.to_str().ok());
                let content_type = headers.get("content-type").and_then(|v| v.to_str().ok());
                if upsert == Some("false") && content_type == Some("application/pdf") {
                    (StatusCode::OK, r#"{"Key":"resumes/u1/1.pdf"}"#)
                } else {
                    (StatusCode::BAD_REQUEST, r#"{"message":"unexpected headers"}"#)
                }
            }),
        ))
        .await;
        let (_tx, rx) = watch::channel(None);
        let storage = SupabaseStorage::new(rest, "resumes", rx);

        storage
            .upload("u1/1.pdf", Bytes::from_static(b"%PDF"), "application/pdf")
            .await
            .unwrap();
    }

    #[test]
    fn test_public_url_layout() {
        let (_tx, rx) = watch::channel(None);
        let storage = SupabaseStorage::new(
            RestClient::new("https://proj.supabase.co", "anon", Duration::from_secs(5)).unwrap(),
            "resumes",
            rx,
        );
        assert_eq!(
            storage.public_url("u1/1700000000000.pdf"),
            "https://proj.supabase.co/storage/v1/object/public/resumes/u1/1700000000000.pdf"
        );
        assert_eq!(
            storage.object_path("u1/a.pdf"),
            "/storage/v1/object/resumes/u1/a.pdf"
        );
    }
}
