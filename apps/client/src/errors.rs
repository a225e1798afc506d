use thiserror::Error;

/// Failure reported by one of the backend facade clients (auth, row store, blob storage).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Email not confirmed")]
    EmailNotConfirmed,

    #[error("Unexpected response: {0}")]
    Unexpected(String),
}

impl BackendError {
    /// True when the backend answered "row not found" rather than failing.
    pub fn is_not_found(&self) -> bool {
        match self {
            BackendError::Api { status, .. } => *status == 404 || *status == 406,
            BackendError::Database(sqlx::Error::RowNotFound) => true,
            _ => false,
        }
    }
}

/// Error returned by every domain service and account flow.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Not signed in")]
    Unauthenticated,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Backend error: {0}")]
    Backend(#[source] BackendError),

    #[error("Email not confirmed")]
    EmailNotConfirmed,
}

impl From<BackendError> for ServiceError {
    /// Backend details are logged here, once, and never shown to the user.
    fn from(err: BackendError) -> Self {
        tracing::error!("Backend error: {err}");
        ServiceError::Backend(err)
    }
}

impl ServiceError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Unauthenticated => "UNAUTHENTICATED",
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Backend(_) => "BACKEND_ERROR",
            ServiceError::EmailNotConfirmed => "EMAIL_NOT_CONFIRMED",
        }
    }

    /// Text safe to show in an inline error banner.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Unauthenticated => "You are not signed in.".to_string(),
            ServiceError::Validation(msg) => msg.clone(),
            ServiceError::NotFound(msg) => msg.clone(),
            ServiceError::Backend(_) => {
                "Something went wrong talking to the server. Please try again.".to_string()
            }
            ServiceError::EmailNotConfirmed => {
                "Email not confirmed. We sent the confirmation link again, please check your inbox."
                    .to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ServiceError::Unauthenticated.code(), "UNAUTHENTICATED");
        assert_eq!(
            ServiceError::Validation("x".into()).code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(ServiceError::NotFound("x".into()).code(), "NOT_FOUND");
        assert_eq!(
            ServiceError::Backend(BackendError::Storage("down".into())).code(),
            "BACKEND_ERROR"
        );
    }

    #[test]
    fn test_backend_details_not_surfaced() {
        let err = ServiceError::Backend(BackendError::Api {
            status: 500,
            message: "relation \"profiles\" does not exist".into(),
        });
        assert!(!err.user_message().contains("profiles"));
    }

    #[test]
    fn test_backend_conversion_keeps_source() {
        let err: ServiceError = BackendError::AlreadyExists("u1/1.pdf".into()).into();
        assert_eq!(err.code(), "BACKEND_ERROR");
        match err {
            ServiceError::Backend(BackendError::AlreadyExists(path)) => assert_eq!(path, "u1/1.pdf"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_not_found_detection() {
        assert!(BackendError::Api {
            status: 406,
            message: String::new()
        }
        .is_not_found());
        assert!(BackendError::Database(sqlx::Error::RowNotFound).is_not_found());
        assert!(!BackendError::Storage("x".into()).is_not_found());
    }
}
