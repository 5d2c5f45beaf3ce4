//! Captcha solving.
//!
//! OCR itself is an external capability behind [`CaptchaSolver`]. Solvers may
//! fail or return garbage; callers go through [`solve_soft`], which turns every
//! failure into an empty answer so the login flow can still proceed.

use crate::config::HarvestConfig;
use crate::error::{HarvestError, HarvestResult};
use async_trait::async_trait;
use regex::Regex;
use std::io::Write;
use std::sync::OnceLock;
use std::time::Duration;

/// Turns captcha image bytes into recognized text.
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// Best-effort recognition. "Nothing recognized" is `Ok("")`, not an error.
    async fn solve(&self, image: &[u8]) -> HarvestResult<String>;
}

#[async_trait]
impl<S: CaptchaSolver + ?Sized> CaptchaSolver for std::sync::Arc<S> {
    async fn solve(&self, image: &[u8]) -> HarvestResult<String> {
        (**self).solve(image).await
    }
}

#[async_trait]
impl<S: CaptchaSolver + ?Sized> CaptchaSolver for Box<S> {
    async fn solve(&self, image: &[u8]) -> HarvestResult<String> {
        (**self).solve(image).await
    }
}

/// Solver used when no OCR backend is configured.
pub struct NoopSolver;

#[async_trait]
impl CaptchaSolver for NoopSolver {
    async fn solve(&self, _image: &[u8]) -> HarvestResult<String> {
        Err(HarvestError::CaptchaUnavailable(
            "no OCR command configured".to_string(),
        ))
    }
}

/// Runs an external OCR program on a temporary copy of the image.
///
/// The image path is appended as the last argument; trimmed stdout is the
/// answer.
#[derive(Debug, Clone)]
pub struct CommandSolver {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSolver {
    pub fn new(command: Vec<String>, timeout: Duration) -> HarvestResult<Self> {
        let mut parts = command.into_iter();
        let program = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| HarvestError::Config("OCR command is empty".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
            timeout,
        })
    }

    /// Build from `config.ocr_command`, if set.
    pub fn from_config(config: &HarvestConfig) -> HarvestResult<Option<Self>> {
        match &config.ocr_command {
            Some(cmd) => Self::new(cmd.clone(), config.request_timeout).map(Some),
            None => Ok(None),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl CaptchaSolver for CommandSolver {
    async fn solve(&self, image: &[u8]) -> HarvestResult<String> {
        let mut file = tempfile::Builder::new()
            .prefix("captcha-")
            .suffix(".png")
            .tempfile()?;
        file.write_all(image)?;
        file.flush()?;

        let run = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(file.path())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| {
                HarvestError::CaptchaUnavailable(format!(
                    "{} timed out after {:?}",
                    self.program, self.timeout
                ))
            })?
            .map_err(|e| {
                HarvestError::CaptchaUnavailable(format!("failed to run {}: {e}", self.program))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HarvestError::CaptchaUnavailable(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Decorator that evaluates arithmetic captchas such as `5X8=`.
pub struct ArithmeticSolver<S> {
    inner: S,
}

impl<S> ArithmeticSolver<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: CaptchaSolver> CaptchaSolver for ArithmeticSolver<S> {
    async fn solve(&self, image: &[u8]) -> HarvestResult<String> {
        let text = self.inner.solve(image).await?;
        Ok(evaluate_arithmetic(&text))
    }
}

fn product_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)[Xx](\d+)$").expect("product regex is valid"))
}

/// Evaluate `<digits> X <digits> =` to its decimal product.
///
/// Only `X`/`x` is understood. Anything that does not match, including other
/// operators, comes back as the trimmed input.
pub fn evaluate_arithmetic(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.contains('=') {
        return trimmed.to_string();
    }

    let expr: String = trimmed
        .chars()
        .filter(|c| *c != '=' && !c.is_whitespace())
        .collect();

    let product = product_re().captures(&expr).and_then(|caps| {
        let lhs: u64 = caps[1].parse().ok()?;
        let rhs: u64 = caps[2].parse().ok()?;
        lhs.checked_mul(rhs)
    });

    match product {
        Some(value) => {
            tracing::debug!(expr = %expr, value, "evaluated arithmetic captcha");
            value.to_string()
        }
        None => {
            tracing::debug!(expr = %expr, "captcha is not a supported expression");
            trimmed.to_string()
        }
    }
}

/// Keep ASCII digits only.
pub fn digits_only(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Solve, converting any failure into an empty answer.
pub async fn solve_soft<S: CaptchaSolver + ?Sized>(solver: &S, image: &[u8]) -> String {
    match solver.solve(image).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "captcha solver failed, continuing with empty answer");
            String::new()
        }
    }
}
