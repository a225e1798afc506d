use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::auth::SignUpMetadata;
use crate::errors::ServiceError;
use crate::models::{NewProfile, Profile, ProfileUpdate};
use crate::services::Services;

impl Services {
    /// Reads the caller's profile, provisioning a default row the first time.
    pub async fn get_or_create_profile(&self) -> Result<Profile, ServiceError> {
        let id = self.identity().await?;
        self.provision_profile(id, None).await
    }

    /// The caller's profile row.
    pub async fn current_profile(&self) -> Result<Profile, ServiceError> {
        let id = self.identity().await?;
        self.backend
            .rows
            .fetch_profile(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Profile for user {id} not found")))
    }

    /// Writes only the supplied, non-blank fields.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<(), ServiceError> {
        let id = self.identity().await?;
        let update = update.normalized();
        if update.is_empty() {
            debug!("Profile update for user {id} carried no fields");
            return Ok(());
        }

        self.backend.rows.update_profile(id, &update).await?;

        self.store.update_for(id, |user| {
            if let Some(name) = &update.name {
                user.full_name = name.clone();
            }
            if let Some(education) = &update.education {
                user.education = Some(education.clone());
            }
            if let Some(goal) = &update.career_goal {
                user.career_goal = Some(goal.clone());
            }
            if let Some(url) = &update.resume_url {
                user.resume_url = Some(url.clone());
            }
        });
        info!("Updated profile for user {id}");
        Ok(())
    }

    /// Fetches the profile or inserts one, seeded from sign-up intake when given.
    pub(crate) async fn provision_profile(
        &self,
        id: Uuid,
        intake: Option<&SignUpMetadata>,
    ) -> Result<Profile, ServiceError> {
        match self.backend.rows.fetch_profile(id).await {
            Ok(Some(profile)) => return Ok(profile),
            Ok(None) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let mut row = NewProfile::default_for(id);
        if let Some(intake) = intake {
            let blank_to_none = |s: &str| (!s.trim().is_empty()).then(|| s.to_string());
            if !intake.full_name.trim().is_empty() {
                row.name = intake.full_name.clone();
            }
            row.education = blank_to_none(&intake.education);
            row.career_goal = blank_to_none(&intake.career_goal);
        }

        info!("Provisioning profile for user {id}");
        match self.backend.rows.insert_profile(&row).await {
            Ok(profile) => Ok(profile),
            Err(insert_err) => {
                // A concurrent call may have inserted the row first.
                match self.backend.rows.fetch_profile(id).await {
                    Ok(Some(profile)) => Ok(profile),
                    _ => {
                        warn!("Profile provisioning failed for user {id}: {insert_err}");
                        Err(insert_err.into())
                    }
                }
            }
        }
    }
}
