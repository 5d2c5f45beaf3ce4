//! Error taxonomy for the harvest pipeline.

use std::time::Duration;

/// All errors that can occur while logging in and harvesting.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    /// Missing or empty credentials. Caller error, never retried.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The upstream rejected the credentials or the captcha answer.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The identity provider accepted the login but the course platform
    /// never issued its session cookie.
    #[error("Session not established: {0}")]
    SessionNotEstablished(String),

    /// Transport, status or parse failure against the course platform API.
    #[error("Upstream error at {url}: {message}")]
    Upstream { url: String, message: String },

    /// The captcha solver produced nothing usable. Always handled fail-soft.
    #[error("Captcha unavailable: {0}")]
    CaptchaUnavailable(String),

    /// Browser launch or automation failure.
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: &'static str, after: Duration },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Shorthand for an [`HarvestError::Upstream`] error.
    pub fn upstream(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        HarvestError::Upstream {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Stable machine-readable code for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            HarvestError::InvalidArgument(_) => "E_INVALID_ARGUMENT",
            HarvestError::Authentication(_) => "E_AUTH_FAILED",
            HarvestError::SessionNotEstablished(_) => "E_NO_SESSION",
            HarvestError::Upstream { .. } => "E_UPSTREAM",
            HarvestError::CaptchaUnavailable(_) => "E_CAPTCHA_UNAVAILABLE",
            HarvestError::Browser(_) => "E_BROWSER",
            HarvestError::Timeout { .. } => "E_TIMEOUT",
            HarvestError::Config(_) => "E_CONFIG",
            HarvestError::Io(_) => "E_IO",
        }
    }
}

/// Convenience result type.
pub type HarvestResult<T> = Result<T, HarvestError>;

/// Run `fut` under a deadline, mapping expiry to [`HarvestError::Timeout`].
pub(crate) async fn with_deadline<T, F>(stage: &'static str, after: Duration, fut: F) -> HarvestResult<T>
where
    F: std::future::Future<Output = HarvestResult<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(HarvestError::Timeout { stage, after }),
    }
}
