//! Résumé analysis and job matching, behind pluggable traits.
//!
//! Default: `MockResumeAnalyzer` and `MockJobMatcher`, which return fixed payloads
//! (optionally after an artificial delay). A real scoring engine implements the same
//! traits and is swapped in at startup without touching the services.
//!
//! `Services` holds both as `Arc<dyn …>`.

pub mod mock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{AnalysisPayload, NewJobRecommendation};

pub use mock::{MockJobMatcher, MockResumeAnalyzer};

#[async_trait]
pub trait ResumeAnalyzer: Send + Sync {
    async fn analyze(&self, resume_url: &str) -> Result<AnalysisPayload, ServiceError>;

    /// Short label for logs ("mock", "llm", ...).
    fn backend_name(&self) -> &'static str;
}

#[async_trait]
pub trait JobMatcher: Send + Sync {
    /// Produces the full recommendation set for one user.
    async fn recommend(&self, user_id: Uuid) -> Result<Vec<NewJobRecommendation>, ServiceError>;

    fn backend_name(&self) -> &'static str;
}
