//! Browser driver abstraction for the SSO login flow.
//!
//! Defines the `BrowserDriver` and `BrowserSession` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide).

pub mod chromium;

use crate::error::{HarvestError, HarvestResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// A cookie visible to the browser session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
}

/// A browser engine that can launch isolated sessions.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Launch a fresh, isolated browser session with an empty cookie jar.
    async fn launch(&self) -> HarvestResult<Box<dyn BrowserSession>>;
}

/// One isolated browser session (one page).
///
/// Dropping a session without calling [`BrowserSession::close`] must still
/// release the underlying browser.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate and wait for the page to settle.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> HarvestResult<()>;
    /// Replace the value of the input matching `selector`.
    async fn fill(&mut self, selector: &str, value: &str) -> HarvestResult<()>;
    async fn click(&mut self, selector: &str) -> HarvestResult<()>;
    /// Screenshot one element as PNG into `path` and return the bytes.
    async fn screenshot_element(&mut self, selector: &str, path: &Path) -> HarvestResult<Vec<u8>>;
    async fn current_url(&self) -> HarvestResult<String>;
    async fn cookies(&self) -> HarvestResult<Vec<BrowserCookie>>;
    /// Close the page and shut the browser down.
    async fn close(self: Box<Self>) -> HarvestResult<()>;
}

#[async_trait]
impl<D: BrowserDriver + ?Sized> BrowserDriver for std::sync::Arc<D> {
    async fn launch(&self) -> HarvestResult<Box<dyn BrowserSession>> {
        (**self).launch().await
    }
}

/// A driver used when Chromium is unavailable.
///
/// The direct form login works without a browser; this stub makes the SSO
/// login fail with a clear error instead.
pub struct NoopDriver;

#[async_trait]
impl BrowserDriver for NoopDriver {
    async fn launch(&self) -> HarvestResult<Box<dyn BrowserSession>> {
        Err(HarvestError::Browser(
            "browser not available, use the direct login method".to_string(),
        ))
    }
}
