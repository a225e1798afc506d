//! Loopback HTTP listener that receives the OAuth redirect.
//!
//! The authorize URL points the browser at `http://127.0.0.1:{port}/auth/callback`.
//! The first request carrying `code` (or `error`) completes the wait; the server
//! then shuts down gracefully.

pub mod callback;
pub mod health;

use std::net::SocketAddr;
use std::time::Duration;

use axum::{routing::get, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::info;

use callback::{CallbackOutcome, CallbackState};

pub const CALLBACK_PATH: &str = "/auth/callback";

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("Callback listener error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No OAuth redirect received within {0:?}")]
    Timeout(Duration),

    #[error("OAuth provider returned an error: {0}")]
    Denied(String),

    #[error("Callback listener stopped before a redirect arrived")]
    Closed,
}

pub fn build_router(state: CallbackState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(CALLBACK_PATH, get(callback::handle_callback))
        .with_state(state)
}

pub struct CallbackServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl CallbackServer {
    /// Binds on 127.0.0.1. Port 0 picks a free port.
    pub async fn bind(port: u16) -> Result<Self, CallbackError> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], port))).await?;
        let addr = listener.local_addr()?;
        info!("OAuth callback listening on {addr}");
        Ok(Self { listener, addr })
    }

    pub fn redirect_url(&self) -> String {
        format!("http://{}{}", self.addr, CALLBACK_PATH)
    }

    /// Serves until the first redirect arrives, then returns its code.
    pub async fn wait_for_code(self, timeout: Duration) -> Result<String, CallbackError> {
        let (state, rx) = CallbackState::new();
        let app = build_router(state).layer(TraceLayer::new_for_http());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(self.listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let received = tokio::time::timeout(timeout, rx).await;
        let _ = shutdown_tx.send(());
        let _ = server.await;

        let outcome: CallbackOutcome = match received {
            Err(_) => return Err(CallbackError::Timeout(timeout)),
            Ok(Err(_)) => return Err(CallbackError::Closed),
            Ok(Ok(outcome)) => outcome,
        };
        outcome.map_err(CallbackError::Denied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _rx) = CallbackState::new();
        let res = build_router(state).oneshot(get("/health")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_code_is_delivered_once() {
        let (state, rx) = CallbackState::new();
        let app = build_router(state);

        let res = app
            .clone()
            .oneshot(get("/auth/callback?code=abc123"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(rx.await.unwrap(), Ok("abc123".to_string()));

        let res = app.oneshot(get("/auth/callback?code=again")).await.unwrap();
        assert_eq!(res.status(), StatusCode::GONE);
    }

    #[tokio::test]
    async fn test_provider_error_is_delivered() {
        let (state, rx) = CallbackState::new();
        let res = build_router(state)
            .oneshot(get(
                "/auth/callback?error=access_denied&error_description=User%20cancelled",
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(rx.await.unwrap(), Err("User cancelled".to_string()));
    }

    #[tokio::test]
    async fn test_missing_code_keeps_waiting() {
        let (state, mut rx) = CallbackState::new();
        let res = build_router(state).oneshot(get("/auth/callback")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let server = CallbackServer::bind(0).await.unwrap();
        assert!(server.redirect_url().ends_with("/auth/callback"));
        let err = server
            .wait_for_code(Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, CallbackError::Timeout(_)));
    }
}
