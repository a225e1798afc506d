use tracing::info;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::JobRecommendation;
use crate::services::Services;

impl Services {
    /// Replaces the user's recommendation set with a fresh one from the matcher.
    ///
    /// Only the signed-in user's own set can be regenerated.
    pub async fn generate_job_recommendations(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<JobRecommendation>, ServiceError> {
        let id = self.identity().await?;
        if id != user_id {
            return Err(ServiceError::Validation(
                "Recommendations can only be generated for the signed-in user".to_string(),
            ));
        }
        self.regenerate_job_recommendations(id).await
    }

    /// Recommendations for the caller, best match first.
    pub async fn job_recommendations(&self) -> Result<Vec<JobRecommendation>, ServiceError> {
        let id = self.identity().await?;
        let mut rows = self.backend.rows.list_job_recommendations(id).await?;
        rows.sort_by(|a, b| b.match_score.cmp(&a.match_score));
        Ok(rows)
    }

    pub(crate) async fn regenerate_job_recommendations(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<JobRecommendation>, ServiceError> {
        let rows = self.matcher.recommend(user_id).await?;
        let inserted = self
            .backend
            .rows
            .replace_job_recommendations(user_id, &rows)
            .await?;
        info!(
            "Stored {} job recommendations for user {user_id} ({} matcher)",
            inserted.len(),
            self.matcher.backend_name()
        );
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::mock::MOCK_RECOMMENDATION_COUNT;
    use crate::models::NewJobRecommendation;
    use crate::services::testing::{fixture, signed_in};

    fn stale(user_id: Uuid, company: &str) -> NewJobRecommendation {
        NewJobRecommendation {
            user_id,
            company: company.to_string(),
            position: "Intern".to_string(),
            location: None,
            salary: None,
            match_score: 10,
            match_reason: None,
            tags: vec![],
        }
    }

    #[tokio::test]
    async fn test_generation_replaces_previous_set() {
        let (f, id) = signed_in();
        f.mem.rows.seed_job_recommendation(stale(id, "Old Co"));
        f.mem.rows.seed_job_recommendation(stale(id, "Older Co"));

        let rows = f.services.generate_job_recommendations(id).await.unwrap();
        assert_eq!(rows.len(), MOCK_RECOMMENDATION_COUNT);

        let listed = f.services.job_recommendations().await.unwrap();
        assert_eq!(listed.len(), MOCK_RECOMMENDATION_COUNT);
        assert!(listed.iter().all(|j| j.company != "Old Co" && j.company != "Older Co"));
    }

    #[tokio::test]
    async fn test_generation_twice_never_accumulates() {
        let (f, id) = signed_in();
        f.services.generate_job_recommendations(id).await.unwrap();
        f.services.generate_job_recommendations(id).await.unwrap();
        assert_eq!(
            f.services.job_recommendations().await.unwrap().len(),
            MOCK_RECOMMENDATION_COUNT
        );
    }

    #[tokio::test]
    async fn test_other_users_rows_untouched() {
        let (f, id) = signed_in();
        let other = Uuid::new_v4();
        f.mem.rows.seed_job_recommendation(stale(other, "Theirs"));

        f.services.generate_job_recommendations(id).await.unwrap();

        let all = f.mem.rows.all_job_recommendations();
        assert_eq!(all.iter().filter(|j| j.user_id == other).count(), 1);
    }

    #[tokio::test]
    async fn test_listing_is_ordered_by_score() {
        let (f, id) = signed_in();
        f.services.generate_job_recommendations(id).await.unwrap();
        let scores: Vec<i32> = f
            .services
            .job_recommendations()
            .await
            .unwrap()
            .iter()
            .map(|j| j.match_score)
            .collect();
        assert_eq!(scores, vec![92, 89, 86]);
    }

    #[tokio::test]
    async fn test_cannot_generate_for_someone_else() {
        let (f, _) = signed_in();
        let err = f
            .services
            .generate_job_recommendations(Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(f.mem.rows.call_count("delete_job_recommendations"), 0);
    }

    #[tokio::test]
    async fn test_job_listing_requires_session() {
        let f = fixture();
        let err = f.services.job_recommendations().await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated));
    }
}
