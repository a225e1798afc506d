//! Account flows: email/password sign-in and sign-up, OAuth, sign-out.
//!
//! A successful flow leaves the `SessionStore` populated, the same way the
//! bootstrap does for a returning session.

use tracing::{info, warn};

use crate::backend::auth::{OAuthProvider, Session, SignUpMetadata, SignUpResult};
use crate::errors::{BackendError, ServiceError};
use crate::services::Services;
use crate::session::SessionUser;

/// Fields collected by the sign-up form.
#[derive(Debug, Clone, Default)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub education: String,
    pub career_goal: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    SignedIn(SessionUser),
    /// Nothing is cached until the address is confirmed.
    ConfirmationRequired { email: String },
}

fn required(value: &str, field: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::Validation(format!("{field} is required")));
    }
    Ok(())
}

impl Services {
    /// Email/password sign-in. An unconfirmed address gets the confirmation
    /// email re-sent and fails with `EmailNotConfirmed`.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionUser, ServiceError> {
        required(email, "Email")?;
        required(password, "Password")?;
        let email = email.trim();

        match self.backend.auth.sign_in_with_password(email, password).await {
            Ok(session) => self.establish(&session, None).await,
            Err(BackendError::EmailNotConfirmed) => {
                info!("Sign-in blocked on unconfirmed email, resending confirmation");
                self.backend.auth.resend_confirmation(email).await?;
                Err(ServiceError::EmailNotConfirmed)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn sign_up(
        &self,
        form: SignUpForm,
        redirect_to: Option<&str>,
    ) -> Result<SignUpOutcome, ServiceError> {
        required(&form.email, "Email")?;
        required(&form.password, "Password")?;
        required(&form.full_name, "Name")?;

        let email = form.email.trim().to_string();
        let intake = SignUpMetadata {
            full_name: form.full_name.trim().to_string(),
            education: form.education.trim().to_string(),
            career_goal: form.career_goal.trim().to_string(),
        };

        match self
            .backend
            .auth
            .sign_up(&email, &form.password, &intake, redirect_to)
            .await?
        {
            SignUpResult::Session(session) => {
                let user = self.establish(&session, Some(&intake)).await?;
                Ok(SignUpOutcome::SignedIn(user))
            }
            SignUpResult::ConfirmationRequired(_) => {
                info!("Sign-up awaiting email confirmation");
                Ok(SignUpOutcome::ConfirmationRequired { email })
            }
        }
    }

    /// URL to open in the browser to start an OAuth sign-in.
    pub fn oauth_authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> Result<String, ServiceError> {
        Ok(self.backend.auth.oauth_authorize_url(provider, redirect_to)?)
    }

    /// Finishes an OAuth sign-in with the code delivered to the redirect URL.
    pub async fn complete_oauth(&self, code: &str) -> Result<SessionUser, ServiceError> {
        required(code, "Authorization code")?;
        let session = self.backend.auth.exchange_code_for_session(code).await?;
        self.establish(&session, None).await
    }

    /// Re-populates the cache from an existing session, if there is one.
    pub async fn resume_session(&self) -> Result<Option<SessionUser>, ServiceError> {
        match self.current_session().await {
            Ok(session) => Ok(Some(self.establish(&session, None).await?)),
            Err(ServiceError::Unauthenticated) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Ends the session. The cache is cleared even when the backend call fails.
    pub async fn sign_out(&self) -> Result<(), ServiceError> {
        let result = self.backend.auth.sign_out().await;
        self.store.clear();
        if let Err(e) = &result {
            warn!("Backend sign-out failed: {e}");
        }
        Ok(result?)
    }

    async fn establish(
        &self,
        session: &Session,
        intake: Option<&SignUpMetadata>,
    ) -> Result<SessionUser, ServiceError> {
        let profile = self.provision_profile(session.identity(), intake).await?;
        let user = SessionUser::from_profile(&profile, session.user.email.as_deref());
        self.store.set(user.clone());
        info!("Signed in as user {}", user.id);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryAuth, MemoryBackend};
    use crate::backend::AuthProvider;
    use crate::models::DEFAULT_PROFILE_NAME;
    use crate::session::SessionStore;
    use std::sync::Arc;

    use crate::services::testing::fixture;

    fn form() -> SignUpForm {
        SignUpForm {
            email: "ada@example.com".into(),
            password: "hunter22".into(),
            full_name: "Ada Lovelace".into(),
            education: "BSc Mathematics".into(),
            career_goal: "".into(),
        }
    }

    #[tokio::test]
    async fn test_sign_in_populates_store() {
        let f = fixture();
        let id = f.mem.auth.register("ada@example.com", "pw", true);

        let user = f.services.sign_in("ada@example.com", "pw").await.unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.full_name, DEFAULT_PROFILE_NAME);
        assert_eq!(f.store.get(), Some(user));
    }

    #[tokio::test]
    async fn test_wrong_password_is_backend_error() {
        let f = fixture();
        f.mem.auth.register("ada@example.com", "pw", true);
        let err = f.services.sign_in("ada@example.com", "nope").await.unwrap_err();
        assert!(matches!(err, ServiceError::Backend(_)));
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_unconfirmed_sign_in_resends_confirmation() {
        let f = fixture();
        f.mem.auth.register("ada@example.com", "pw", false);

        let err = f.services.sign_in("ada@example.com", "pw").await.unwrap_err();
        assert!(matches!(err, ServiceError::EmailNotConfirmed));
        assert_eq!(f.mem.auth.resent_confirmations(), vec!["ada@example.com"]);
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_blank_credentials_rejected_locally() {
        let f = fixture();
        let err = f.services.sign_in("", "pw").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(f.mem.auth.calls().is_empty());
    }

    #[tokio::test]
    async fn test_sign_up_seeds_profile_from_intake() {
        let f = fixture();
        let outcome = f.services.sign_up(form(), None).await.unwrap();

        let user = match outcome {
            SignUpOutcome::SignedIn(user) => user,
            other => panic!("expected sign-in, got {other:?}"),
        };
        assert_eq!(user.full_name, "Ada Lovelace");
        assert_eq!(user.education.as_deref(), Some("BSc Mathematics"));
        assert!(user.career_goal.is_none());

        let profile = f.services.current_profile().await.unwrap();
        assert_eq!(profile.name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn test_sign_up_requiring_confirmation_caches_nothing() {
        let mem = MemoryBackend {
            auth: Arc::new(MemoryAuth::new(false)),
            ..MemoryBackend::new()
        };
        let store = SessionStore::new();
        let services = Services::new(mem.backend(), store.clone());

        let outcome = services.sign_up(form(), Some("futureu://welcome")).await.unwrap();
        assert_eq!(
            outcome,
            SignUpOutcome::ConfirmationRequired {
                email: "ada@example.com".into()
            }
        );
        assert!(store.is_empty());
        assert_eq!(mem.rows.profile_count(), 0);
    }

    #[tokio::test]
    async fn test_oauth_code_exchange_signs_in() {
        let f = fixture();
        let id = f.mem.auth.register("ada@example.com", "pw", true);
        let code = f.mem.auth.issue_oauth_code("ada@example.com");

        let url = f
            .services
            .oauth_authorize_url(OAuthProvider::Google, "http://127.0.0.1:54321/auth/callback")
            .unwrap();
        assert!(url.contains("google"));

        let user = f.services.complete_oauth(&code).await.unwrap();
        assert_eq!(user.id, id);
        assert!(f.services.complete_oauth(&code).await.is_err());
    }

    #[tokio::test]
    async fn test_sign_out_clears_store_and_session() {
        let f = fixture();
        f.mem.auth.register("ada@example.com", "pw", true);
        f.services.sign_in("ada@example.com", "pw").await.unwrap();

        f.services.sign_out().await.unwrap();
        assert!(f.store.is_empty());
        assert!(f.mem.auth.get_session().await.unwrap().is_none());
        assert!(matches!(
            f.services.current_profile().await.unwrap_err(),
            ServiceError::Unauthenticated
        ));
    }

    #[tokio::test]
    async fn test_failed_sign_out_still_clears_store() {
        let f = fixture();
        f.mem.auth.register("ada@example.com", "pw", true);
        f.services.sign_in("ada@example.com", "pw").await.unwrap();
        f.mem.auth.fail("sign_out");

        assert!(f.services.sign_out().await.is_err());
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_resume_session() {
        let f = fixture();
        assert!(f.services.resume_session().await.unwrap().is_none());

        f.mem.auth.register("ada@example.com", "pw", true);
        f.services.sign_in("ada@example.com", "pw").await.unwrap();
        f.store.clear();

        let user = f.services.resume_session().await.unwrap().unwrap();
        assert_eq!(f.store.get(), Some(user));
    }
}
