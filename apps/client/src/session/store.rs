use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Profile;

/// Denormalized view of the signed-in user, as the views consume it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub full_name: String,
    /// Taken from the session, never from the profile row.
    pub email: String,
    pub education: Option<String>,
    pub career_goal: Option<String>,
    pub resume_url: Option<String>,
}

impl SessionUser {
    pub fn from_profile(profile: &Profile, email: Option<&str>) -> Self {
        SessionUser {
            id: profile.id,
            full_name: profile.name.clone(),
            email: email.unwrap_or_default().to_string(),
            education: profile.education.clone(),
            career_goal: profile.career_goal.clone(),
            resume_url: profile.resume_url.clone(),
        }
    }
}

/// Shared holder of the current user. Cloning yields another handle to the same slot.
///
/// Created empty, populated by the bootstrap or a sign-in, cleared on sign-out.
/// Last writer wins; nothing is persisted.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<Option<SessionUser>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<SessionUser> {
        self.inner.read().clone()
    }

    pub fn cached_id(&self) -> Option<Uuid> {
        self.inner.read().as_ref().map(|u| u.id)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_none()
    }

    pub fn set(&self, user: SessionUser) {
        *self.inner.write() = Some(user);
    }

    pub fn clear(&self) {
        *self.inner.write() = None;
    }

    /// Edits the cached user in place, but only if it is the given identity.
    pub fn update_for(&self, id: Uuid, edit: impl FnOnce(&mut SessionUser)) -> bool {
        match self.inner.write().as_mut() {
            Some(user) if user.id == id => {
                edit(user);
                true
            }
            _ => false,
        }
    }
}
