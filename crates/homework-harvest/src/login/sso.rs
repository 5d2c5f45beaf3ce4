//! Browser-driven login through the campus identity provider.

use crate::captcha::{solve_soft, ArithmeticSolver, CaptchaSolver};
use crate::config::HarvestConfig;
use crate::error::{with_deadline, HarvestError, HarvestResult};
use crate::renderer::{BrowserCookie, BrowserDriver, BrowserSession};
use crate::types::{Credentials, Session};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const USERNAME_INPUT: &str = "#id_loginname";
const PASSWORD_INPUT: &str = "#id_password";
const CAPTCHA_IMAGE: &str = "#id_captcha_1_img";
const CAPTCHA_INPUT: &str = "#id_captcha_1";
const SUBMIT_BUTTON: &str = r#"button[type="submit"]"#;

pub struct BrowserSsoLogin {
    login_url: String,
    landing_url: String,
    cookie_name: String,
    settle_delay: Duration,
    step_timeout: Duration,
    solver: ArithmeticSolver<Arc<dyn CaptchaSolver>>,
    driver: Arc<dyn BrowserDriver>,
}

impl BrowserSsoLogin {
    pub fn new(
        config: &HarvestConfig,
        solver: Arc<dyn CaptchaSolver>,
        driver: Arc<dyn BrowserDriver>,
    ) -> Self {
        Self {
            login_url: config.sso_login_url.clone(),
            landing_url: config.sso_landing_url.clone(),
            cookie_name: config.session_cookie_name.clone(),
            settle_delay: config.settle_delay,
            step_timeout: config.browser_step_timeout,
            solver: ArithmeticSolver::new(solver),
            driver,
        }
    }

    /// Log in and return a session holding only the platform cookie.
    ///
    /// The browser is closed on every path once it has been launched.
    pub async fn login(&self, credentials: &Credentials) -> HarvestResult<Session> {
        if credentials.student_id.trim().is_empty() || credentials.secret.is_empty() {
            return Err(HarvestError::InvalidArgument(
                "student id and password are required for SSO login".to_string(),
            ));
        }
        if credentials.secret_is_prehashed {
            return Err(HarvestError::InvalidArgument(
                "SSO login needs the plaintext password, not a digest".to_string(),
            ));
        }

        tracing::info!(student_id = %credentials.student_id, "browser SSO login");

        let mut browser = with_deadline("browser launch", self.step_timeout, self.driver.launch()).await?;
        let result = self.drive(browser.as_mut(), credentials).await;

        if let Err(e) = browser.close().await {
            tracing::warn!(error = %e, "failed to close browser session");
        }

        match &result {
            Ok(_) => tracing::info!(student_id = %credentials.student_id, "browser SSO login succeeded"),
            Err(e) => tracing::warn!(student_id = %credentials.student_id, error = %e, "browser SSO login failed"),
        }
        result
    }

    async fn drive(
        &self,
        browser: &mut dyn BrowserSession,
        credentials: &Credentials,
    ) -> HarvestResult<Session> {
        let step = self.step_timeout;

        browser.navigate(&self.login_url, step).await?;
        with_deadline("fill username", step, browser.fill(USERNAME_INPUT, &credentials.student_id))
            .await?;
        with_deadline("fill password", step, browser.fill(PASSWORD_INPUT, &credentials.secret)).await?;

        // Dropped at the end of this call, taking the screenshot with it.
        let artifacts = tempfile::Builder::new().prefix("hwharvest-captcha-").tempdir()?;
        let answer = self.read_captcha(browser, &artifacts.path().join("captcha.png")).await;
        tracing::debug!(answer_len = answer.len(), "captcha answer ready");
        with_deadline("fill captcha", step, browser.fill(CAPTCHA_INPUT, &answer)).await?;

        with_deadline("submit", step, browser.click(SUBMIT_BUTTON)).await?;
        tokio::time::sleep(self.settle_delay).await;

        let after_submit = with_deadline("read url", step, browser.current_url()).await?;
        tracing::debug!(url = %after_submit, "identity provider responded");
        if still_on_login(&after_submit, &self.login_url) {
            return Err(HarvestError::Authentication(
                "identity provider kept the login form (wrong password or captcha)".to_string(),
            ));
        }

        browser.navigate(&self.landing_url, step).await?;
        let cookies = with_deadline("read cookies", step, browser.cookies()).await?;

        let value = pick_cookie(&cookies, &self.cookie_name, &self.landing_url).ok_or_else(|| {
            HarvestError::SessionNotEstablished(format!(
                "{} was not issued after visiting {}",
                self.cookie_name, self.landing_url
            ))
        })?;
        tracing::debug!(
            cookie = %self.cookie_name,
            prefix = %value.chars().take(8).collect::<String>(),
            "platform session cookie issued"
        );
        Ok(Session::with_cookie(&self.cookie_name, value))
    }

    /// Screenshot and solve the captcha. Failures give an empty answer.
    async fn read_captcha(&self, browser: &mut dyn BrowserSession, path: &Path) -> String {
        let shot = with_deadline(
            "captcha screenshot",
            self.step_timeout,
            browser.screenshot_element(CAPTCHA_IMAGE, path),
        )
        .await;
        match shot {
            Ok(image) => solve_soft(&self.solver, &image).await,
            Err(e) => {
                tracing::warn!(error = %e, "captcha screenshot failed, continuing with empty answer");
                String::new()
            }
        }
    }
}

/// Whether `current` is still the identity provider's login form.
fn still_on_login(current: &str, login_url: &str) -> bool {
    let login_host = url::Url::parse(login_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string));
    let current_host = url::Url::parse(current)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string));

    let same_host = match (login_host, current_host) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(&b),
        _ => false,
    };
    same_host && current.to_ascii_lowercase().contains("login")
}

/// The named cookie, preferring one scoped to the landing page's host.
fn pick_cookie(cookies: &[BrowserCookie], name: &str, landing_url: &str) -> Option<String> {
    let landing_host = url::Url::parse(landing_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();

    let named = cookies.iter().filter(|c| c.name == name && !c.value.is_empty());
    let scoped = named
        .clone()
        .find(|c| landing_host.ends_with(c.domain.trim_start_matches('.')));
    scoped.or_else(|| named.clone().next()).map(|c| c.value.clone())
}
