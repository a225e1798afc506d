//! Authentication side of the backend facade.
//!
//! The current session lives in a `SessionCell`, a `tokio::sync::watch` channel
//! owned by the auth client. Every change (sign-in, refresh, sign-out) is published
//! there; `subscribe()` hands out receivers so mounted views can react.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::errors::BackendError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Backend-issued proof of authentication.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub user: AuthUser,
}

impl Session {
    pub fn identity(&self) -> Uuid {
        self.user.id
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// Intake data stored as user metadata at sign-up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignUpMetadata {
    pub full_name: String,
    pub education: String,
    pub career_goal: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignUpResult {
    /// Auto-confirmed account, already signed in.
    Session(Session),
    /// Account created; a confirmation email must be followed before sign-in.
    ConfirmationRequired(AuthUser),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Github,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Github => "github",
        }
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
        redirect_to: Option<&str>,
    ) -> Result<SignUpResult, BackendError>;

    /// Builds the provider authorize URL. The browser lands on `redirect_to?code=...`.
    fn oauth_authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> Result<String, BackendError>;

    async fn exchange_code_for_session(&self, code: &str) -> Result<Session, BackendError>;

    /// Ends the session. The local session is cleared even if the backend call fails.
    async fn sign_out(&self) -> Result<(), BackendError>;

    /// The current session, refreshed first if it has expired.
    async fn get_session(&self) -> Result<Option<Session>, BackendError>;

    /// Session-change notifications. The receiver starts at the current value.
    fn subscribe(&self) -> watch::Receiver<Option<Session>>;

    async fn resend_confirmation(&self, email: &str) -> Result<(), BackendError>;
}

/// Holder of the current session with change notification.
pub struct SessionCell {
    tx: watch::Sender<Option<Session>>,
}

impl SessionCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    /// Publishes a new session (or its absence) to every subscriber.
    pub fn set(&self, session: Option<Session>) {
        self.tx.send_replace(session);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}

impl Default for SessionCell {
    fn default() -> Self {
        Self::new()
    }
}
