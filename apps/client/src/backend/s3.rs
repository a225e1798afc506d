//! S3-compatible implementation of `BlobStore` (MinIO locally, AWS or the backend's
//! S3 endpoint in production).

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::info;

use crate::backend::storage::BlobStore;
use crate::config::S3Config;
use crate::errors::BackendError;

pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base: String,
}

impl S3BlobStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>, endpoint: &str) -> Self {
        let bucket = bucket.into();
        let public_base = format!("{}/{}", endpoint.trim_end_matches('/'), bucket);
        Self {
            client,
            bucket,
            public_base,
        }
    }

    pub async fn from_config(config: &S3Config, bucket: &str) -> Self {
        let client = build_s3_client(config).await;
        info!("S3 client initialized");
        Self::new(client, bucket, &config.endpoint)
    }
}

/// Constructs an S3 client with static credentials against a custom endpoint.
async fn build_s3_client(config: &S3Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.access_key_id,
        &config.secret_access_key,
        None,
        None,
        "futureu-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .credentials_provider(credentials)
        .endpoint_url(&config.endpoint)
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn upload(
        &self,
        path: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), BackendError> {
        // If-None-Match: * makes the put conditional on the key not existing yet.
        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .cache_control("max-age=3600")
            .if_none_match("*")
            .send()
            .await;

        match result {
            Ok(_) => {
                info!("Uploaded object to s3://{}/{}", self.bucket, path);
                Ok(())
            }
            Err(e) => {
                let status = e.raw_response().map(|r| r.status().as_u16());
                if matches!(status, Some(409) | Some(412)) {
                    Err(BackendError::AlreadyExists(path.to_string()))
                } else {
                    Err(BackendError::Storage(format!("S3 upload failed: {e}")))
                }
            }
        }
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base, path)
    }

    async fn remove(&self, path: &str) -> Result<(), BackendError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| BackendError::Storage(format!("S3 delete failed: {e}")))?;
        info!("Removed object s3://{}/{}", self.bucket, path);
        Ok(())
    }
}
