//! HTTP client bound to one authenticated platform session.

use crate::config::HarvestConfig;
use crate::error::{HarvestError, HarvestResult};
use crate::types::Session;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, HOST, REFERER};
use serde_json::Value;

/// Issues session-scoped JSON GETs against the course platform.
///
/// Owns its [`Session`]; dropping the client ends the session.
pub struct SessionClient {
    client: reqwest::Client,
    api_root: String,
    host: Option<String>,
    session: Session,
}

impl SessionClient {
    pub fn new(config: &HarvestConfig, session: Session) -> HarvestResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| HarvestError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_root: config.api_root().to_string(),
            host: config.effective_host(),
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Attach the secondary token to every later request.
    pub fn set_secondary_token(&mut self, token: impl Into<String>) {
        self.session.set_secondary_token(token);
    }

    /// Absolute URL for a path below the API root.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.api_root, path.trim_start_matches('/'))
    }

    fn headers(&self, referer: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(v) = HeaderValue::from_str(&self.session.cookie_header()) {
            headers.insert(COOKIE, v);
        }
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
        if let Some(Ok(v)) = self.host.as_deref().map(HeaderValue::from_str) {
            headers.insert(HOST, v);
        }
        if let Some(Ok(v)) = referer.map(HeaderValue::from_str) {
            headers.insert(REFERER, v);
        }
        if let Some(Ok(v)) = self.session.secondary_token().map(HeaderValue::from_str) {
            headers.insert("sessionId", v);
        }
        headers
    }

    /// GET `url` and parse the body as JSON.
    ///
    /// Transport failures, non-2xx statuses, non-JSON bodies and the
    /// platform's in-band error envelope all become [`HarvestError::Upstream`].
    pub async fn get_json(&self, url: &str, referer: Option<&str>) -> HarvestResult<Value> {
        tracing::debug!(url = %url, "GET");

        let response = self
            .client
            .get(url)
            .headers(self.headers(referer))
            .send()
            .await
            .map_err(|e| HarvestError::upstream(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::upstream(url, format!("HTTP {}", status.as_u16())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| HarvestError::upstream(url, format!("failed to read body: {e}")))?;

        let value: Value = serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(80).collect();
            HarvestError::upstream(url, format!("response is not JSON ({e}): {preview:?}"))
        })?;

        if let Some(message) = envelope_error(&value) {
            return Err(HarvestError::upstream(url, message));
        }
        Ok(value)
    }
}

/// `STATUS == "1"` with a non-empty `ERRMSG` is the platform's error envelope.
fn envelope_error(value: &Value) -> Option<String> {
    let status = match value.get("STATUS")? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if status != "1" {
        return None;
    }
    value
        .get("ERRMSG")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}
