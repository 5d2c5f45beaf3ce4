//! Direct form login against the platform's legacy login page.

use crate::captcha::{digits_only, solve_soft, CaptchaSolver};
use crate::config::HarvestConfig;
use crate::error::{HarvestError, HarvestResult};
use crate::types::{Credentials, Session};
use md5::{Digest, Md5};
use reqwest::cookie::{CookieStore, Jar};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The platform reports a failed login as an inline script, not an HTTP error.
const FAILURE_MARKER: &str = "alert(";

/// Password sent upstream.
///
/// A prehashed secret is used verbatim. Otherwise an empty secret falls back
/// to the platform's initial password `Bjtu@<student id>`, and the result is
/// MD5-hashed to lowercase hex. Plaintext never leaves this function.
pub fn password_digest(credentials: &Credentials) -> String {
    if credentials.secret_is_prehashed {
        return credentials.secret.clone();
    }
    let plain = if credentials.secret.is_empty() {
        format!("Bjtu@{}", credentials.student_id)
    } else {
        credentials.secret.clone()
    };
    hex::encode(Md5::digest(plain.as_bytes()))
}

/// Logs in with a single form POST.
pub struct DirectFormLogin {
    base_url: String,
    user_agent: String,
    timeout: std::time::Duration,
    solver: Arc<dyn CaptchaSolver>,
}

impl DirectFormLogin {
    pub fn new(config: &HarvestConfig, solver: Arc<dyn CaptchaSolver>) -> HarvestResult<Self> {
        url::Url::parse(config.api_root())
            .map_err(|e| HarvestError::Config(format!("base_url: {e}")))?;
        Ok(Self {
            base_url: config.api_root().to_string(),
            user_agent: config.user_agent.clone(),
            timeout: config.request_timeout,
            solver,
        })
    }

    pub async fn login(&self, credentials: &Credentials) -> HarvestResult<Session> {
        if credentials.student_id.trim().is_empty() {
            return Err(HarvestError::InvalidArgument(
                "student id must not be empty".to_string(),
            ));
        }

        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(&self.user_agent)
            .cookie_provider(Arc::clone(&jar))
            .build()
            .map_err(|e| HarvestError::Config(format!("failed to build HTTP client: {e}")))?;

        tracing::info!(student_id = %credentials.student_id, "direct form login");

        // The entry page hands out the cookie the captcha is bound to.
        let entry = format!("{}/", self.base_url);
        client
            .get(&entry)
            .send()
            .await
            .map_err(|e| HarvestError::upstream(&entry, e))?;

        let passcode = self.passcode(&client).await;
        tracing::debug!(passcode_len = passcode.len(), "captcha passcode ready");

        let form = [
            ("login", "main_2".to_string()),
            ("qxkt_type", String::new()),
            ("qxkt_url", String::new()),
            ("username", credentials.student_id.clone()),
            ("password", password_digest(credentials)),
            ("passcode", passcode),
        ];

        let submit = format!("{}/s.shtml", self.base_url);
        let response = client
            .post(&submit)
            .form(&form)
            .send()
            .await
            .map_err(|e| HarvestError::upstream(&submit, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::Authentication(format!(
                "login form returned HTTP {}",
                status.as_u16()
            )));
        }
        // A body we cannot read cannot prove the marker is absent.
        let body = response
            .text()
            .await
            .map_err(|e| HarvestError::upstream(&submit, e))?;
        if body.contains(FAILURE_MARKER) {
            return Err(HarvestError::Authentication(
                "login rejected (wrong password or captcha)".to_string(),
            ));
        }

        let session = session_from_jar(&jar, &entry)?;
        tracing::info!(
            student_id = %credentials.student_id,
            cookies = ?session.cookie_names().collect::<Vec<_>>(),
            "direct form login succeeded"
        );
        Ok(session)
    }

    /// Fetch and solve the numeric captcha. Any failure yields an empty passcode.
    async fn passcode(&self, client: &reqwest::Client) -> String {
        let url = format!("{}/GetImg", self.base_url);
        let image = match client.get(&url).send().await {
            Ok(resp) => match resp.bytes().await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "failed to read captcha image");
                    return String::new();
                }
            },
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "failed to fetch captcha image");
                return String::new();
            }
        };
        digits_only(&solve_soft(self.solver.as_ref(), &image).await)
    }
}

/// Every cookie the jar would send to `url`.
fn session_from_jar(jar: &Jar, url: &str) -> HarvestResult<Session> {
    let parsed = url::Url::parse(url).map_err(|e| HarvestError::Config(format!("{url}: {e}")))?;

    let header = jar
        .cookies(&parsed)
        .and_then(|h| h.to_str().ok().map(str::to_string))
        .unwrap_or_default();

    let cookies: BTreeMap<String, String> = header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (!name.is_empty()).then(|| (name.to_string(), value.to_string()))
        })
        .collect();

    if cookies.is_empty() {
        return Err(HarvestError::Authentication(
            "login accepted but no session cookie was issued".to_string(),
        ));
    }
    Ok(Session::new(cookies))
}
