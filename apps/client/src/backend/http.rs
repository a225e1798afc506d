//! Shared HTTP plumbing for the REST facade clients (auth, row store, storage).
//!
//! Every request carries the project's anon key in `apikey`; callers add a bearer
//! token when acting on behalf of a signed-in user. Idempotent requests are retried
//! on 429 and 5xx with exponential backoff; writes are sent once.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::BackendError;

const MAX_RETRIES: u32 = 3;

#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

/// The error body shapes returned by GoTrue, PostgREST and Storage.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    error_code: Option<String>,
    /// Storage repeats the real status here, sometimes as a string, behind an HTTP 400.
    #[serde(default, rename = "statusCode")]
    status_code: Option<serde_json::Value>,
}

impl ErrorBody {
    fn embedded_status(&self) -> Option<u16> {
        match self.status_code.as_ref()? {
            serde_json::Value::String(s) => s.parse().ok(),
            serde_json::Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
            _ => None,
        }
    }
}

impl RestClient {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Starts a request with the anon key attached. `bearer` defaults to the anon key.
    pub fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        bearer: Option<&str>,
    ) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(&self.anon_key))
    }

    /// Sends the request, retrying idempotent ones, and maps non-2xx answers to errors.
    pub async fn send(
        &self,
        request: RequestBuilder,
        idempotent: bool,
    ) -> Result<Response, BackendError> {
        let attempts = if idempotent { MAX_RETRIES } else { 1 };
        let mut last_error: Option<BackendError> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                // Exponential backoff: 250ms, 500ms
                let delay = Duration::from_millis(250 * (1 << (attempt - 1)));
                warn!(
                    "Backend request attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let Some(builder) = request.try_clone() else {
                return Err(BackendError::Unexpected(
                    "request body cannot be replayed".to_string(),
                ));
            };

            let response = match builder.send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(BackendError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                debug!("Backend request succeeded with {}", status);
                return Ok(response);
            }

            let err = error_from_response(response).await;
            if status.as_u16() == 429 || status.is_server_error() {
                warn!("Backend returned {}: {}", status, err);
                last_error = Some(err);
                continue;
            }
            return Err(err);
        }

        Err(last_error.unwrap_or_else(|| {
            BackendError::Unexpected(format!("request failed after {attempts} attempts"))
        }))
    }
}

/// Converts a non-success response into a `BackendError`, extracting the backend's message.
pub async fn error_from_response(response: Response) -> BackendError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    parse_error_body(status, &body)
}

pub(crate) fn parse_error_body(status: u16, body: &str) -> BackendError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    if parsed.error_code.as_deref() == Some("email_not_confirmed") {
        return BackendError::EmailNotConfirmed;
    }

    let duplicate = matches!(&parsed.error, Some(serde_json::Value::String(e)) if e == "Duplicate");
    let status = if duplicate {
        409
    } else {
        parsed.embedded_status().unwrap_or(status)
    };

    let message = parsed
        .msg
        .or(parsed.message)
        .or(parsed.error_description)
        .or_else(|| match parsed.error {
            Some(serde_json::Value::String(s)) => Some(s),
            _ => None,
        })
        .unwrap_or_else(|| body.to_string());

    if message.eq_ignore_ascii_case("Email not confirmed") {
        return BackendError::EmailNotConfirmed;
    }

    BackendError::Api { status, message }
}
