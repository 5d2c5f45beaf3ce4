//! Harvest configuration.
//!
//! Values are resolved in order of priority:
//! 1. explicit overrides set by the caller (CLI flags)
//! 2. `HOMEWORK_*` environment variables via [`HarvestConfig::from_env`]
//! 3. built-in defaults targeting the BJTU course platform
//!
//! The resolved config is passed by reference into every component; nothing
//! in the library reads the environment after construction.

use crate::error::{HarvestError, HarvestResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Course platform API root.
pub const DEFAULT_BASE_URL: &str = "http://123.121.147.7:88/ve";

/// Identity provider login page.
pub const DEFAULT_SSO_LOGIN_URL: &str = "https://cas.bjtu.edu.cn";

/// Landing page visited after SSO to force the platform to issue its cookie.
pub const DEFAULT_SSO_LANDING_URL: &str = "https://bksy.bjtu.edu.cn/login_introduce_s.html";

pub const DEFAULT_SESSION_COOKIE: &str = "JSESSIONID";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                                  AppleWebKit/537.36 (KHTML, like Gecko) \
                                  Chrome/131.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Course platform API root, without trailing slash.
    pub base_url: String,
    /// `Host` header sent with API calls. Derived from `base_url` when unset.
    pub host_header: Option<String>,
    pub user_agent: String,
    /// Per-request HTTP timeout.
    #[serde(with = "duration_ms")]
    pub request_timeout: Duration,
    pub sso_login_url: String,
    pub sso_landing_url: String,
    /// Name of the cookie that identifies a platform session.
    pub session_cookie_name: String,
    /// Fixed wait after submitting the SSO form.
    #[serde(with = "duration_ms")]
    pub settle_delay: Duration,
    /// Upper bound for any single browser automation step.
    #[serde(with = "duration_ms")]
    pub browser_step_timeout: Duration,
    /// Upper bound for one whole login + harvest + normalize run.
    #[serde(with = "duration_ms")]
    pub query_timeout: Duration,
    pub chromium_path: Option<PathBuf>,
    /// External OCR program; receives the captcha image path as last argument.
    pub ocr_command: Option<Vec<String>>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            host_header: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(15),
            sso_login_url: DEFAULT_SSO_LOGIN_URL.to_string(),
            sso_landing_url: DEFAULT_SSO_LANDING_URL.to_string(),
            session_cookie_name: DEFAULT_SESSION_COOKIE.to_string(),
            settle_delay: Duration::from_secs(3),
            browser_step_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(180),
            chromium_path: None,
            ocr_command: None,
        }
    }
}

impl HarvestConfig {
    /// Defaults overlaid with `HOMEWORK_*` environment variables.
    pub fn from_env() -> HarvestResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`HarvestConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> HarvestResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("HOMEWORK_BASE_URL") {
            config.base_url = v;
        }
        if let Some(v) = lookup("HOMEWORK_HOST_HEADER") {
            config.host_header = Some(v);
        }
        if let Some(v) = lookup("HOMEWORK_SSO_LOGIN_URL") {
            config.sso_login_url = v;
        }
        if let Some(v) = lookup("HOMEWORK_SSO_LANDING_URL") {
            config.sso_landing_url = v;
        }
        if let Some(v) = lookup("HOMEWORK_USER_AGENT") {
            config.user_agent = v;
        }
        if let Some(v) = lookup("HOMEWORK_SESSION_COOKIE") {
            config.session_cookie_name = v;
        }
        if let Some(v) = lookup("HOMEWORK_SETTLE_DELAY_MS") {
            config.settle_delay = parse_ms("HOMEWORK_SETTLE_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("HOMEWORK_BROWSER_STEP_TIMEOUT_MS") {
            config.browser_step_timeout = parse_ms("HOMEWORK_BROWSER_STEP_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("HOMEWORK_REQUEST_TIMEOUT_MS") {
            config.request_timeout = parse_ms("HOMEWORK_REQUEST_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("HOMEWORK_QUERY_TIMEOUT_MS") {
            config.query_timeout = parse_ms("HOMEWORK_QUERY_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("HOMEWORK_CHROMIUM_PATH") {
            config.chromium_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("HOMEWORK_OCR_COMMAND") {
            let parts: Vec<String> = v.split_whitespace().map(str::to_string).collect();
            if !parts.is_empty() {
                config.ocr_command = Some(parts);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that every URL parses.
    pub fn validate(&self) -> HarvestResult<()> {
        for (name, value) in [
            ("base_url", &self.base_url),
            ("sso_login_url", &self.sso_login_url),
            ("sso_landing_url", &self.sso_landing_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| HarvestError::Config(format!("{name} '{value}' is not a URL: {e}")))?;
        }
        Ok(())
    }

    /// API root without a trailing slash.
    pub fn api_root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// `Host` header value: the override, or `host[:port]` of `base_url`.
    pub fn effective_host(&self) -> Option<String> {
        if let Some(h) = &self.host_header {
            return Some(h.clone());
        }
        let parsed = url::Url::parse(&self.base_url).ok()?;
        let host = parsed.host_str()?;
        Some(match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }
}

fn parse_ms(name: &str, value: &str) -> HarvestResult<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| HarvestError::Config(format!("{name}='{value}': {e}")))
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
