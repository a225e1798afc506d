use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// What the provider redirect delivered: an authorization code or an error text.
pub type CallbackOutcome = Result<String, String>;

#[derive(Clone)]
pub struct CallbackState {
    tx: Arc<Mutex<Option<oneshot::Sender<CallbackOutcome>>>>,
}

impl CallbackState {
    pub fn new() -> (Self, oneshot::Receiver<CallbackOutcome>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Delivers the outcome once. Later redirects find the slot empty.
    fn deliver(&self, outcome: CallbackOutcome) -> bool {
        match self.tx.lock().take() {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

const SIGNED_IN_PAGE: &str =
    "<html><body><h1>Signed in</h1><p>You can close this window and return to FutureU.</p></body></html>";
const FAILED_PAGE: &str =
    "<html><body><h1>Sign-in failed</h1><p>Return to FutureU and try again.</p></body></html>";
const DONE_PAGE: &str =
    "<html><body><h1>Already handled</h1><p>This sign-in has already completed.</p></body></html>";

/// GET /auth/callback?code=...
pub async fn handle_callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Html<&'static str>) {
    let outcome = match (params.code, params.error) {
        (Some(code), _) if !code.trim().is_empty() => Ok(code),
        (_, Some(error)) => Err(params.error_description.unwrap_or(error)),
        _ => return (StatusCode::BAD_REQUEST, Html(FAILED_PAGE)),
    };

    let succeeded = outcome.is_ok();
    if !state.deliver(outcome) {
        warn!("OAuth callback hit after the flow completed");
        return (StatusCode::GONE, Html(DONE_PAGE));
    }

    if succeeded {
        info!("OAuth callback received an authorization code");
        (StatusCode::OK, Html(SIGNED_IN_PAGE))
    } else {
        warn!("OAuth provider redirected with an error");
        (StatusCode::BAD_REQUEST, Html(FAILED_PAGE))
    }
}
