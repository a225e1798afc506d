use tracing::info;

use crate::errors::ServiceError;
use crate::models::{Deliverable, NewProjectProgress, ProgressUpdate, ProjectProgress, ProjectStatus};
use crate::services::Services;

/// Trimmed project id, or `Validation` when blank.
fn normalize_project_id(project_id: &str) -> Result<&str, ServiceError> {
    let project_id = project_id.trim();
    if project_id.is_empty() {
        return Err(ServiceError::Validation("Project id is required".to_string()));
    }
    Ok(project_id)
}

impl Services {
    /// Marks the project as started at 0%. Starting again resets status and
    /// percentage but keeps the deliverables already recorded.
    pub async fn start_project(&self, project_id: &str) -> Result<ProjectProgress, ServiceError> {
        let id = self.identity().await?;
        let project_id = normalize_project_id(project_id)?;

        match self.backend.rows.find_progress(id, project_id).await? {
            Some(mut row) => {
                let update = ProgressUpdate {
                    status: Some(ProjectStatus::InProgress),
                    progress: Some(0),
                    deliverables: None,
                };
                self.backend.rows.update_progress(row.id, &update).await?;
                update.apply_to(&mut row);
                info!("Restarted project {project_id} for user {id}");
                Ok(row)
            }
            None => {
                let row = self
                    .backend
                    .rows
                    .insert_progress(&NewProjectProgress {
                        user_id: id,
                        project_id: project_id.to_string(),
                        status: ProjectStatus::InProgress,
                        progress: 0,
                        deliverables: Vec::new(),
                    })
                    .await?;
                info!("Started project {project_id} for user {id}");
                Ok(row)
            }
        }
    }

    /// Records a new completion percentage. Reaching 100 completes the project;
    /// `deliverables`, when given, replaces the stored list.
    pub async fn update_project_progress(
        &self,
        project_id: &str,
        progress: i32,
        deliverables: Option<Vec<Deliverable>>,
    ) -> Result<ProjectProgress, ServiceError> {
        let id = self.identity().await?;
        let project_id = normalize_project_id(project_id)?;
        if !(0..=100).contains(&progress) {
            return Err(ServiceError::Validation(format!(
                "Progress must be between 0 and 100, got {progress}"
            )));
        }

        let mut row = self
            .backend
            .rows
            .find_progress(id, project_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Project {project_id} has not been started"))
            })?;

        let update = ProgressUpdate {
            status: (progress >= 100).then_some(ProjectStatus::Completed),
            progress: Some(progress),
            deliverables,
        };
        self.backend.rows.update_progress(row.id, &update).await?;
        update.apply_to(&mut row);
        info!("Project {project_id} for user {id} at {progress}% ({})", row.status);
        Ok(row)
    }

    pub async fn project_progress(
        &self,
        project_id: &str,
    ) -> Result<Option<ProjectProgress>, ServiceError> {
        let id = self.identity().await?;
        let project_id = normalize_project_id(project_id)?;
        Ok(self.backend.rows.find_progress(id, project_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{fixture, signed_in};

    #[tokio::test]
    async fn test_start_then_complete() {
        let (f, id) = signed_in();

        let started = f.services.start_project("resume-ai").await.unwrap();
        assert_eq!(started.user_id, id);
        assert_eq!(started.status, ProjectStatus::InProgress);
        assert_eq!(started.progress, 0);
        assert!(started.deliverables.is_empty());

        let deliverables = vec![Deliverable::link("PRD", "https://docs.example.com/prd")];
        let done = f
            .services
            .update_project_progress("resume-ai", 100, Some(deliverables.clone()))
            .await
            .unwrap();
        assert_eq!(done.status, ProjectStatus::Completed);

        let stored = f.services.project_progress("resume-ai").await.unwrap().unwrap();
        assert_eq!(stored.status, ProjectStatus::Completed);
        assert_eq!(stored.progress, 100);
        assert_eq!(stored.deliverables, deliverables);
    }

    #[tokio::test]
    async fn test_new_user_walkthrough() {
        let (f, id) = signed_in();
        let profile = f.services.get_or_create_profile().await.unwrap();
        assert_eq!(profile.id, id);
        assert!(profile.education.is_none());
        assert!(profile.resume_url.is_none());

        let row = f.services.start_project("resume-ai").await.unwrap();
        assert_eq!((row.status, row.progress), (ProjectStatus::InProgress, 0));

        let doc = Deliverable::from("doc-link");
        let row = f
            .services
            .update_project_progress("resume-ai", 50, Some(vec![doc.clone()]))
            .await
            .unwrap();
        assert_eq!(row.progress, 50);
        assert_eq!(row.status, ProjectStatus::InProgress);
        assert_eq!(row.deliverables, vec![doc.clone()]);

        let proto = Deliverable::from("proto-link");
        f.services
            .update_project_progress("resume-ai", 100, Some(vec![doc.clone(), proto.clone()]))
            .await
            .unwrap();
        let stored = f.services.project_progress("resume-ai").await.unwrap().unwrap();
        assert_eq!(stored.progress, 100);
        assert_eq!(stored.status, ProjectStatus::Completed);
        assert_eq!(stored.deliverables, vec![doc, proto]);
    }

    #[tokio::test]
    async fn test_ninety_nine_is_not_complete() {
        let (f, _) = signed_in();
        f.services.start_project("resume-ai").await.unwrap();
        let row = f
            .services
            .update_project_progress("resume-ai", 99, None)
            .await
            .unwrap();
        assert_eq!(row.status, ProjectStatus::InProgress);
    }

    #[tokio::test]
    async fn test_restart_after_completion() {
        let (f, _) = signed_in();
        f.services.start_project("resume-ai").await.unwrap();
        f.services
            .update_project_progress("resume-ai", 100, None)
            .await
            .unwrap();
        f.services.start_project("resume-ai").await.unwrap();
        let stored = f.services.project_progress("resume-ai").await.unwrap().unwrap();
        assert_eq!((stored.status, stored.progress), (ProjectStatus::InProgress, 0));
    }

    #[tokio::test]
    async fn test_restart_resets_but_keeps_deliverables() {
        let (f, _) = signed_in();
        f.services.start_project("resume-ai").await.unwrap();
        let deliverables = vec![Deliverable::link("Prototype", "https://figma.example.com/p")];
        f.services
            .update_project_progress("resume-ai", 60, Some(deliverables.clone()))
            .await
            .unwrap();

        let restarted = f.services.start_project("resume-ai").await.unwrap();
        assert_eq!(restarted.status, ProjectStatus::InProgress);
        assert_eq!(restarted.progress, 0);
        assert_eq!(restarted.deliverables, deliverables);

        let stored = f.services.project_progress("resume-ai").await.unwrap().unwrap();
        assert_eq!(stored.deliverables, deliverables);
        assert_eq!(f.mem.rows.call_count("insert_progress"), 1);
    }

    #[tokio::test]
    async fn test_partial_progress_keeps_status() {
        let (f, _) = signed_in();
        f.services.start_project("abt-platform").await.unwrap();
        let row = f
            .services
            .update_project_progress("abt-platform", 40, None)
            .await
            .unwrap();
        assert_eq!(row.status, ProjectStatus::InProgress);
        assert_eq!(row.progress, 40);
    }

    #[tokio::test]
    async fn test_update_unstarted_project_is_not_found() {
        let (f, _) = signed_in();
        let err = f
            .services
            .update_project_progress("resume-ai", 50, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert_eq!(f.mem.rows.call_count("update_progress"), 0);
    }

    #[tokio::test]
    async fn test_out_of_range_progress_rejected() {
        let (f, _) = signed_in();
        f.services.start_project("resume-ai").await.unwrap();
        for progress in [-1, 101, 250] {
            let err = f
                .services
                .update_project_progress("resume-ai", progress, None)
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)));
        }
        assert_eq!(f.mem.rows.call_count("update_progress"), 0);
    }

    #[tokio::test]
    async fn test_progress_is_per_user() {
        let (f, _) = signed_in();
        f.services.start_project("resume-ai").await.unwrap();

        f.mem.auth.sign_in_as(uuid::Uuid::new_v4(), "other@example.com");
        assert!(f.services.project_progress("resume-ai").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_project_calls_require_session() {
        let f = fixture();
        assert!(matches!(
            f.services.start_project("resume-ai").await.unwrap_err(),
            ServiceError::Unauthenticated
        ));
        assert!(matches!(
            f.services.project_progress("resume-ai").await.unwrap_err(),
            ServiceError::Unauthenticated
        ));
        assert!(f.mem.rows.calls().is_empty());
    }

    #[tokio::test]
    async fn test_project_id_is_trimmed_everywhere() {
        let (f, _) = signed_in();
        f.services.start_project(" resume-ai ").await.unwrap();
        let row = f
            .services
            .update_project_progress(" resume-ai ", 30, None)
            .await
            .unwrap();
        assert_eq!(row.project_id, "resume-ai");
        assert!(f.services.project_progress("resume-ai ").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_session_wins_over_bad_input() {
        let f = fixture();
        assert!(matches!(
            f.services.start_project("  ").await.unwrap_err(),
            ServiceError::Unauthenticated
        ));
        assert!(matches!(
            f.services
                .update_project_progress("resume-ai", 250, None)
                .await
                .unwrap_err(),
            ServiceError::Unauthenticated
        ));
    }
}
