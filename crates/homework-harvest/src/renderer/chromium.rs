//! Chromium-based browser driver using chromiumoxide.

use super::{BrowserCookie, BrowserDriver, BrowserSession};
use crate::config::HarvestConfig;
use crate::error::{HarvestError, HarvestResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Find the Chromium binary path.
pub fn find_chromium(explicit: Option<&Path>) -> Option<PathBuf> {
    // 1. Configured path
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.to_path_buf());
        }
    }

    // 2. ~/.homework-harvest/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".homework-harvest/chromium/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".homework-harvest/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".homework-harvest/chromium/chrome-linux64/chrome"),
                home.join(".homework-harvest/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Launches one headless Chromium process per session.
pub struct ChromiumDriver {
    chrome_path: PathBuf,
}

impl ChromiumDriver {
    pub fn new(chrome_path: PathBuf) -> Self {
        Self { chrome_path }
    }

    /// Resolve the executable from the config, then the usual locations.
    pub fn from_config(config: &HarvestConfig) -> HarvestResult<Self> {
        find_chromium(config.chromium_path.as_deref())
            .map(Self::new)
            .ok_or_else(|| {
                HarvestError::Browser(
                    "Chromium not found. Set HOMEWORK_CHROMIUM_PATH or install Chrome.".to_string(),
                )
            })
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn launch(&self) -> HarvestResult<Box<dyn BrowserSession>> {
        // A throwaway profile keeps every login isolated from the last one.
        let profile = tempfile::Builder::new().prefix("hwharvest-profile-").tempdir()?;

        let config = BrowserConfig::builder()
            .chrome_executable(&self.chrome_path)
            .user_data_dir(profile.path())
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .build()
            .map_err(|e| HarvestError::Browser(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| HarvestError::Browser(format!("failed to launch Chromium: {e}")))?;

        // Spawn the handler task
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(HarvestError::Browser(format!("failed to create page: {e}")));
            }
        };

        tracing::debug!(chrome = %self.chrome_path.display(), "launched headless Chromium");

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
            _profile: profile,
        }))
    }
}

/// A single Chromium browser with one page.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: tokio::task::JoinHandle<()>,
    _profile: tempfile::TempDir,
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        // Browser's own Drop kills the child process if it is still running.
        self.handler_task.abort();
    }
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> HarvestResult<()> {
        let start = Instant::now();

        let result = tokio::time::timeout(timeout, async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        })
        .await;

        match result {
            Ok(Ok(())) => {
                tracing::debug!(url, elapsed_ms = start.elapsed().as_millis() as u64, "page loaded");
                Ok(())
            }
            Ok(Err(e)) => Err(HarvestError::Browser(format!("navigation to {url} failed: {e}"))),
            Err(_) => Err(HarvestError::Timeout {
                stage: "navigation",
                after: timeout,
            }),
        }
    }

    async fn fill(&mut self, selector: &str, value: &str) -> HarvestResult<()> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.focus();
                el.value = {val};
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()"#,
            sel = js_string(selector),
            val = js_string(value),
        );

        let found: bool = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| HarvestError::Browser(format!("fill {selector} failed: {e}")))?
            .into_value()
            .map_err(|e| HarvestError::Browser(format!("fill {selector}: bad result: {e:?}")))?;

        if !found {
            return Err(HarvestError::Browser(format!("no element matches {selector}")));
        }
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> HarvestResult<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| HarvestError::Browser(format!("no element matches {selector}: {e}")))?;
        element
            .click()
            .await
            .map_err(|e| HarvestError::Browser(format!("click {selector} failed: {e}")))?;
        Ok(())
    }

    async fn screenshot_element(&mut self, selector: &str, path: &Path) -> HarvestResult<Vec<u8>> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| HarvestError::Browser(format!("no element matches {selector}: {e}")))?;
        element
            .save_screenshot(CaptureScreenshotFormat::Png, path)
            .await
            .map_err(|e| HarvestError::Browser(format!("screenshot of {selector} failed: {e}")))
    }

    async fn current_url(&self) -> HarvestResult<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| HarvestError::Browser(format!("failed to get URL: {e}")))?
            .unwrap_or_default();
        Ok(url)
    }

    async fn cookies(&self) -> HarvestResult<Vec<BrowserCookie>> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .map_err(|e| HarvestError::Browser(format!("failed to read cookies: {e}")))?;

        Ok(cookies
            .into_iter()
            .map(|c| BrowserCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
            })
            .collect())
    }

    async fn close(self: Box<Self>) -> HarvestResult<()> {
        let mut this = self;
        let _ = this.page.clone().close().await;
        if let Err(e) = this.browser.close().await {
            tracing::debug!(error = %e, "browser close returned an error");
        }
        let _ = this.browser.wait().await;
        Ok(())
    }
}
