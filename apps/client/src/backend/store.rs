//! Row-store side of the backend facade: typed access to the four tables.

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::BackendError;
use crate::models::{
    JobRecommendation, NewJobRecommendation, NewProfile, NewProjectProgress, NewResumeAnalysis,
    Profile, ProfileUpdate, ProgressUpdate, ProjectProgress, ResumeAnalysis,
};

#[async_trait]
pub trait RowStore: Send + Sync {
    // profiles
    async fn fetch_profile(&self, id: Uuid) -> Result<Option<Profile>, BackendError>;
    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile, BackendError>;
    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<(), BackendError>;

    // resume_analysis
    async fn insert_analysis(
        &self,
        analysis: &NewResumeAnalysis,
    ) -> Result<ResumeAnalysis, BackendError>;
    async fn latest_analysis(&self, user_id: Uuid)
        -> Result<Option<ResumeAnalysis>, BackendError>;

    // project_progress
    async fn find_progress(
        &self,
        user_id: Uuid,
        project_id: &str,
    ) -> Result<Option<ProjectProgress>, BackendError>;
    async fn insert_progress(
        &self,
        progress: &NewProjectProgress,
    ) -> Result<ProjectProgress, BackendError>;
    async fn update_progress(&self, id: Uuid, update: &ProgressUpdate)
        -> Result<(), BackendError>;

    // job_recommendations
    async fn list_job_recommendations(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<JobRecommendation>, BackendError>;
    async fn delete_job_recommendations(&self, user_id: Uuid) -> Result<(), BackendError>;
    async fn insert_job_recommendations(
        &self,
        rows: &[NewJobRecommendation],
    ) -> Result<Vec<JobRecommendation>, BackendError>;

    /// Replaces the user's whole recommendation set.
    ///
    /// The default is delete-then-insert with no transaction: a failure between the
    /// two leaves the user with no recommendations until the next run. Stores that
    /// can do better override it.
    async fn replace_job_recommendations(
        &self,
        user_id: Uuid,
        rows: &[NewJobRecommendation],
    ) -> Result<Vec<JobRecommendation>, BackendError> {
        self.delete_job_recommendations(user_id).await?;
        self.insert_job_recommendations(rows).await
    }
}
