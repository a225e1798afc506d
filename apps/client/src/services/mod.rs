//! Domain services: identity-scoped operations over the backend facade.
//!
//! Every operation resolves the caller's identity from the current session first;
//! without one it fails with `ServiceError::Unauthenticated` before touching a table
//! or the blob store. Results are written through to the `SessionStore` when they
//! change what it caches.

pub mod account;
pub mod jobs;
pub mod profile;
pub mod project;
pub mod resume;

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::analysis::{JobMatcher, MockJobMatcher, MockResumeAnalyzer, ResumeAnalyzer};
use crate::backend::{Backend, Session};
use crate::errors::ServiceError;
use crate::session::SessionStore;

pub use account::{SignUpForm, SignUpOutcome};
pub use resume::ResumeFile;

#[derive(Clone)]
pub struct Services {
    backend: Backend,
    store: SessionStore,
    analyzer: Arc<dyn ResumeAnalyzer>,
    matcher: Arc<dyn JobMatcher>,
}

impl Services {
    /// Services backed by the mock analyzer and matcher.
    pub fn new(backend: Backend, store: SessionStore) -> Self {
        Self {
            backend,
            store,
            analyzer: Arc::new(MockResumeAnalyzer::default()),
            matcher: Arc::new(MockJobMatcher::default()),
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn ResumeAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn JobMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    async fn current_session(&self) -> Result<Session, ServiceError> {
        match self.backend.auth.get_session().await {
            Ok(Some(session)) => Ok(session),
            Ok(None) => Err(ServiceError::Unauthenticated),
            Err(e) => {
                warn!("Could not resolve session: {e}");
                Err(ServiceError::Unauthenticated)
            }
        }
    }

    async fn identity(&self) -> Result<Uuid, ServiceError> {
        Ok(self.current_session().await?.identity())
    }
}
