//! The remote backend facade: authentication, row store, blob storage.
//!
//! Services only ever see the three traits. Concrete clients are picked at startup
//! from `Config`: GoTrue for auth, PostgREST (or PostgreSQL when a database URL is
//! configured) for rows, Storage REST (or S3 when credentials are configured) for
//! blobs.

pub mod auth;
pub mod gotrue;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod postgrest;
pub mod s3;
pub mod storage;
pub mod store;
pub mod supabase_storage;

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::errors::BackendError;

pub use auth::{AuthProvider, Session};
pub use storage::BlobStore;
pub use store::RowStore;

/// Cheaply cloneable bundle of the three facade clients.
#[derive(Clone)]
pub struct Backend {
    pub auth: Arc<dyn AuthProvider>,
    pub rows: Arc<dyn RowStore>,
    pub blobs: Arc<dyn BlobStore>,
}

impl Backend {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        rows: Arc<dyn RowStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self { auth, rows, blobs }
    }

    /// Wires the remote clients described by `config`.
    pub async fn connect(config: &Config) -> Result<Self, BackendError> {
        let rest = http::RestClient::new(
            &config.supabase_url,
            &config.supabase_anon_key,
            config.http_timeout,
        )?;

        let auth = Arc::new(gotrue::GoTrueAuth::new(rest.clone()));
        info!("Auth client initialized ({})", rest.base_url());

        let rows: Arc<dyn RowStore> = match &config.database_url {
            Some(url) => Arc::new(postgres::PgStore::connect(url).await?),
            None => {
                info!("Row store: PostgREST");
                Arc::new(postgrest::PostgrestStore::new(rest.clone(), auth.subscribe()))
            }
        };

        let blobs: Arc<dyn BlobStore> = match &config.s3 {
            Some(s3_config) => {
                Arc::new(s3::S3BlobStore::from_config(s3_config, &config.resume_bucket).await)
            }
            None => {
                info!("Blob store: Storage REST (bucket {})", config.resume_bucket);
                Arc::new(supabase_storage::SupabaseStorage::new(
                    rest,
                    config.resume_bucket.clone(),
                    auth.subscribe(),
                ))
            }
        };

        Ok(Self { auth, rows, blobs })
    }
}
