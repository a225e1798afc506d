use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Display name given to auto-provisioned profiles.
pub const DEFAULT_PROFILE_NAME: &str = "New user";

/// Row of the `profiles` table. `id` equals the auth identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub education: Option<String>,
    pub career_goal: Option<String>,
    pub resume_url: Option<String>,
    pub linkedin_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: Uuid,
    pub name: String,
    pub education: Option<String>,
    pub career_goal: Option<String>,
    pub resume_url: Option<String>,
    pub linkedin_url: Option<String>,
}

impl NewProfile {
    /// The row inserted the first time an identity is seen without a profile.
    pub fn default_for(id: Uuid) -> Self {
        NewProfile {
            id,
            name: DEFAULT_PROFILE_NAME.to_string(),
            education: None,
            career_goal: None,
            resume_url: None,
            linkedin_url: None,
        }
    }
}

/// Partial profile write. `None` fields are left untouched by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub career_goal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
}

impl ProfileUpdate {
    pub fn resume_url(url: impl Into<String>) -> Self {
        ProfileUpdate {
            resume_url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Drops blank values: an empty form field means "not supplied", never "clear it".
    pub fn normalized(self) -> Self {
        fn keep(v: Option<String>) -> Option<String> {
            v.filter(|s| !s.trim().is_empty())
        }
        ProfileUpdate {
            name: keep(self.name),
            education: keep(self.education),
            career_goal: keep(self.career_goal),
            resume_url: keep(self.resume_url),
            linkedin_url: keep(self.linkedin_url),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.education.is_none()
            && self.career_goal.is_none()
            && self.resume_url.is_none()
            && self.linkedin_url.is_none()
    }

    /// Applies the supplied fields onto an existing row.
    pub fn apply_to(&self, profile: &mut Profile) {
        if let Some(name) = &self.name {
            profile.name = name.clone();
        }
        if let Some(education) = &self.education {
            profile.education = Some(education.clone());
        }
        if let Some(goal) = &self.career_goal {
            profile.career_goal = Some(goal.clone());
        }
        if let Some(url) = &self.resume_url {
            profile.resume_url = Some(url.clone());
        }
        if let Some(url) = &self.linkedin_url {
            profile.linkedin_url = Some(url.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_serializes_only_supplied_fields() {
        let update = ProfileUpdate {
            education: Some("BSc Physics".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({ "education": "BSc Physics" }));
    }

    #[test]
    fn test_normalized_drops_blank_fields() {
        let update = ProfileUpdate {
            name: Some("  ".into()),
            career_goal: Some("Product manager".into()),
            ..Default::default()
        }
        .normalized();
        assert!(update.name.is_none());
        assert_eq!(update.career_goal.as_deref(), Some("Product manager"));
        assert!(ProfileUpdate::default().normalized().is_empty());
    }
}
