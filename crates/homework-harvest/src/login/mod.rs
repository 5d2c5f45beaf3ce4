//! Login strategies.
//!
//! Two ways to obtain a platform [`Session`]:
//! - [`DirectFormLogin`]: one form POST with an MD5 password digest and an
//!   OCR'd numeric captcha.
//! - [`BrowserSsoLogin`]: drives a headless browser through the campus
//!   identity provider and picks up the platform's session cookie.
//!
//! The set is closed: [`Login`] is an enum, selected by [`LoginMethod`].

pub mod direct;
pub mod sso;

pub use direct::{password_digest, DirectFormLogin};
pub use sso::BrowserSsoLogin;

use crate::captcha::CaptchaSolver;
use crate::config::HarvestConfig;
use crate::error::HarvestResult;
use crate::renderer::BrowserDriver;
use crate::types::{Credentials, Session};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Which login strategy to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoginMethod {
    #[default]
    #[serde(rename = "direct", alias = "direct_form")]
    DirectForm,
    #[serde(rename = "sso", alias = "browser_sso", alias = "auto")]
    BrowserSso,
}

impl LoginMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            LoginMethod::DirectForm => "direct",
            LoginMethod::BrowserSso => "sso",
        }
    }
}

impl fmt::Display for LoginMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoginMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" | "direct_form" => Ok(LoginMethod::DirectForm),
            "sso" | "browser_sso" | "auto" => Ok(LoginMethod::BrowserSso),
            other => Err(format!("unknown login method '{other}' (expected direct or sso)")),
        }
    }
}

/// A constructed login strategy.
pub enum Login {
    DirectForm(DirectFormLogin),
    BrowserSso(BrowserSsoLogin),
}

impl Login {
    /// Build the strategy for `method`.
    ///
    /// The browser driver is only used by the SSO variant.
    pub fn new(
        method: LoginMethod,
        config: &HarvestConfig,
        solver: Arc<dyn CaptchaSolver>,
        driver: Arc<dyn BrowserDriver>,
    ) -> HarvestResult<Self> {
        Ok(match method {
            LoginMethod::DirectForm => Login::DirectForm(DirectFormLogin::new(config, solver)?),
            LoginMethod::BrowserSso => Login::BrowserSso(BrowserSsoLogin::new(config, solver, driver)),
        })
    }

    pub fn method(&self) -> LoginMethod {
        match self {
            Login::DirectForm(_) => LoginMethod::DirectForm,
            Login::BrowserSso(_) => LoginMethod::BrowserSso,
        }
    }

    /// Authenticate and return the acquired session.
    pub async fn login(&self, credentials: &Credentials) -> HarvestResult<Session> {
        match self {
            Login::DirectForm(l) => l.login(credentials).await,
            Login::BrowserSso(l) => l.login(credentials).await,
        }
    }
}
