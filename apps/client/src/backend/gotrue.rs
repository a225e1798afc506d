//! GoTrue (`/auth/v1`) implementation of `AuthProvider`.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::RngCore;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::backend::auth::{
    AuthProvider, AuthUser, OAuthProvider, Session, SessionCell, SignUpMetadata, SignUpResult,
};
use crate::backend::http::RestClient;
use crate::errors::BackendError;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| {
                self.expires_in
                    .map(|secs| now + chrono::Duration::seconds(secs))
            });
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

pub struct GoTrueAuth {
    rest: RestClient,
    session: SessionCell,
    /// PKCE verifier of the OAuth flow in flight, consumed by the code exchange.
    code_verifier: Mutex<Option<String>>,
}

impl GoTrueAuth {
    pub fn new(rest: RestClient) -> Self {
        Self {
            rest,
            session: SessionCell::new(),
            code_verifier: Mutex::new(None),
        }
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<Session, BackendError> {
        let request = self
            .rest
            .request(Method::POST, "/auth/v1/token", None)
            .query(&[("grant_type", grant_type)])
            .json(&body);
        let response = self.rest.send(request, false).await?;
        let token: TokenResponse = response.json().await?;
        let session = token.into_session(Utc::now());
        info!("Session issued for user {}", session.user.id);
        self.session.set(Some(session.clone()));
        Ok(session)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, BackendError> {
        self.token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }
}

#[async_trait]
impl AuthProvider for GoTrueAuth {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        self.token_grant("password", json!({ "email": email, "password": password }))
            .await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
        redirect_to: Option<&str>,
    ) -> Result<SignUpResult, BackendError> {
        let mut request = self
            .rest
            .request(Method::POST, "/auth/v1/signup", None)
            .json(&json!({
                "email": email,
                "password": password,
                "data": metadata,
            }));
        if let Some(redirect_to) = redirect_to {
            request = request.query(&[("redirect_to", redirect_to)]);
        }
        let response = self.rest.send(request, false).await?;
        let body: Value = response.json().await?;
        let result = parse_sign_up(body, Utc::now())?;
        if let SignUpResult::Session(session) = &result {
            self.session.set(Some(session.clone()));
        }
        Ok(result)
    }

    fn oauth_authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> Result<String, BackendError> {
        let verifier = generate_code_verifier();
        let challenge = code_challenge(&verifier);
        *self.code_verifier.lock() = Some(verifier);

        let mut url = url::Url::parse(&self.rest.url("/auth/v1/authorize"))
            .map_err(|e| BackendError::Unexpected(format!("invalid auth URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("provider", provider.as_str())
            .append_pair("redirect_to", redirect_to)
            .append_pair("code_challenge", &challenge)
            .append_pair("code_challenge_method", "s256");
        Ok(url.into())
    }

    async fn exchange_code_for_session(&self, code: &str) -> Result<Session, BackendError> {
        let verifier = self.code_verifier.lock().take().ok_or_else(|| {
            BackendError::Unexpected("no OAuth flow in progress".to_string())
        })?;
        self.token_grant(
            "pkce",
            json!({ "auth_code": code, "code_verifier": verifier }),
        )
        .await
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let Some(session) = self.session.current() else {
            return Ok(());
        };
        self.session.set(None);
        info!("Signed out user {}", session.user.id);

        let request = self.rest.request(
            Method::POST,
            "/auth/v1/logout",
            Some(&session.access_token),
        );
        self.rest.send(request, false).await?;
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        let Some(session) = self.session.current() else {
            return Ok(None);
        };
        if !session.is_expired(Utc::now()) {
            return Ok(Some(session));
        }

        match session.refresh_token.as_deref() {
            Some(refresh_token) => match self.refresh(refresh_token).await {
                Ok(fresh) => Ok(Some(fresh)),
                Err(e) => {
                    warn!("Session refresh failed: {e}");
                    self.session.set(None);
                    Err(e)
                }
            },
            None => {
                self.session.set(None);
                Ok(None)
            }
        }
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    async fn resend_confirmation(&self, email: &str) -> Result<(), BackendError> {
        let request = self
            .rest
            .request(Method::POST, "/auth/v1/resend", None)
            .json(&json!({ "type": "signup", "email": email }));
        self.rest.send(request, false).await?;
        info!("Confirmation email re-sent");
        Ok(())
    }
}

/// Sign-up answers with a full token response when auto-confirm is on, or just the
/// user object when a confirmation email is pending.
fn parse_sign_up(body: Value, now: DateTime<Utc>) -> Result<SignUpResult, BackendError> {
    if body.get("access_token").is_some() {
        let token: TokenResponse = serde_json::from_value(body)?;
        return Ok(SignUpResult::Session(token.into_session(now)));
    }
    let user_value = body.get("user").cloned().unwrap_or(body);
    let user: AuthUser = serde_json::from_value(user_value)?;
    Ok(SignUpResult::ConfirmationRequired(user))
}

/// 32 random bytes, base64url-encoded: a 43-character PKCE verifier.
fn generate_code_verifier() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::http::stub;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use std::time::Duration;
    use uuid::Uuid;

    fn expired_session(id: Uuid) -> Session {
        Session {
            access_token: "stale".into(),
            refresh_token: Some("refresh-1".into()),
            expires_at: Some(Utc::now() - chrono::Duration::minutes(5)),
            user: AuthUser {
                id,
                email: Some("a@example.com".into()),
            },
        }
    }

    fn auth() -> GoTrueAuth {
        GoTrueAuth::new(
            RestClient::new("https://proj.supabase.co", "anon", Duration::from_secs(5)).unwrap(),
        )
    }

    #[test]
    fn test_code_challenge_is_s256_of_verifier() {
        let verifier = "dBjftJeZ4CVP-mJ0kTe9zAQ1hnoGMKEpWqWbq4TB5M0";
        assert_eq!(
            code_challenge(verifier),
            "oTme60IsAIPkbkEIxukZXZDF6QnOq6-dCC4C_iEtCfA"
        );
        assert_eq!(
            code_challenge(verifier),
            URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
        );
    }

    #[test]
    fn test_verifier_shape() {
        let a = generate_code_verifier();
        let b = generate_code_verifier();
        assert_eq!(a.len(), 43);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(a, b);
    }

    #[test]
    fn test_authorize_url_carries_pkce_challenge() {
        let auth = auth();
        let url = auth
            .oauth_authorize_url(OAuthProvider::Google, "http://127.0.0.1:54321/auth/callback")
            .unwrap();
        let parsed = url::Url::parse(&url).unwrap();
        assert_eq!(parsed.path(), "/auth/v1/authorize");
        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("provider".into(), "google".into())));
        assert!(pairs.contains(&("code_challenge_method".into(), "s256".into())));
        assert!(auth.code_verifier.lock().is_some());
    }

    #[tokio::test]
    async fn test_exchange_without_flow_fails_locally() {
        let err = auth().exchange_code_for_session("abc").await.unwrap_err();
        assert!(matches!(err, BackendError::Unexpected(_)));
    }

    #[test]
    fn test_parse_sign_up_pending_confirmation() {
        let id = Uuid::new_v4();
        let body = json!({ "id": id, "email": "a@example.com", "confirmation_sent_at": "2024-01-01T00:00:00Z" });
        match parse_sign_up(body, Utc::now()).unwrap() {
            SignUpResult::ConfirmationRequired(user) => assert_eq!(user.id, id),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_sign_up_with_session() {
        let id = Uuid::new_v4();
        let body = json!({
            "access_token": "jwt",
            "refresh_token": "r",
            "expires_in": 3600,
            "user": { "id": id, "email": "a@example.com" }
        });
        match parse_sign_up(body, Utc::now()).unwrap() {
            SignUpResult::Session(s) => {
                assert_eq!(s.identity(), id);
                assert!(s.expires_at.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sign_out_without_session_is_noop() {
        auth().sign_out().await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_session_is_refreshed() {
        let id = Uuid::new_v4();
        let rest = stub::serve(Router::new().route(
            "/auth/v1/token",
            post(move || async move {
                axum::Json(json!({
                    "access_token": "fresh",
                    "refresh_token": "refresh-2",
                    "expires_in": 3600,
                    "user": { "id": id, "email": "a@example.com" }
                }))
            }),
        ))
        .await;
        let auth = GoTrueAuth::new(rest);
        auth.session.set(Some(expired_session(id)));

        let session = auth.get_session().await.unwrap().unwrap();
        assert_eq!(session.access_token, "fresh");
        assert_eq!(session.identity(), id);
        assert_eq!(auth.subscribe().borrow().as_ref(), Some(&session));
    }

    #[tokio::test]
    async fn test_failed_refresh_publishes_sign_out() {
        let rest = stub::serve(Router::new().route(
            "/auth/v1/token",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    r#"{"error":"invalid_grant","error_description":"Refresh Token Not Found"}"#,
                )
            }),
        ))
        .await;
        let auth = GoTrueAuth::new(rest);
        auth.session.set(Some(expired_session(Uuid::new_v4())));
        let mut changes = auth.subscribe();
        changes.borrow_and_update();

        assert!(auth.get_session().await.is_err());
        changes.changed().await.unwrap();
        assert!(changes.borrow_and_update().is_none());
        assert!(auth.get_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_out_clears_session_even_when_logout_fails() {
        let rest = stub::serve(Router::new().route(
            "/auth/v1/logout",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        ))
        .await;
        let auth = GoTrueAuth::new(rest);
        let mut session = expired_session(Uuid::new_v4());
        session.expires_at = None;
        auth.session.set(Some(session));

        assert!(auth.sign_out().await.is_err());
        assert!(auth.subscribe().borrow().is_none());
    }
}
