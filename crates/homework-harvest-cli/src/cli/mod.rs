//! CLI subcommand implementations for the hwharvest binary.

pub mod doctor;
pub mod output;
pub mod query_cmd;
pub mod serve;

use anyhow::{Context, Result};
use clap::Args;
use homework_harvest::captcha::CommandSolver;
use homework_harvest::renderer::chromium::ChromiumDriver;
use homework_harvest::{
    BrowserDriver, CaptchaSolver, Credentials, FilterSpec, FinishStatus, HarvestConfig,
    LoginMethod, NoopDriver, NoopSolver,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Overrides layered on top of `HOMEWORK_*` environment variables.
#[derive(Args, Clone, Default)]
pub struct ConfigArgs {
    /// Course platform API root
    #[arg(long)]
    pub base_url: Option<String>,
    /// Chromium executable for SSO login
    #[arg(long)]
    pub chromium_path: Option<PathBuf>,
    /// OCR command; the captcha image path is appended as last argument
    #[arg(long, num_args = 1.., value_delimiter = ' ')]
    pub ocr_command: Option<Vec<String>>,
    /// Upper bound for one whole query, in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

impl ConfigArgs {
    pub fn resolve(&self) -> Result<HarvestConfig> {
        let mut config = HarvestConfig::from_env().context("invalid HOMEWORK_* environment")?;
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(path) = &self.chromium_path {
            config.chromium_path = Some(path.clone());
        }
        if let Some(cmd) = &self.ocr_command {
            config.ocr_command = Some(cmd.clone());
        }
        if let Some(secs) = self.timeout_secs {
            config.query_timeout = std::time::Duration::from_secs(secs);
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[derive(Args, Clone)]
pub struct LoginArgs {
    /// Student id
    #[arg(long, short = 'u', env = "HOMEWORK_STUDENT_ID")]
    pub student_id: String,
    /// Password; empty means the platform's initial password
    #[arg(long, short = 'p', env = "HOMEWORK_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,
    /// The password is already the upstream MD5 digest
    #[arg(long)]
    pub use_hash: bool,
    /// Login method (direct or sso)
    #[arg(long, default_value = "direct")]
    pub method: LoginMethod,
}

impl LoginArgs {
    pub fn credentials(&self) -> Credentials {
        if self.use_hash {
            Credentials::prehashed(&self.student_id, &self.password)
        } else {
            Credentials::new(&self.student_id, &self.password)
        }
    }
}

#[derive(Args, Clone)]
pub struct FilterArgs {
    /// all, finished or unfinished
    #[arg(long, default_value = "all")]
    pub status: FinishStatus,
    /// Keep only courses whose name contains this (repeatable)
    #[arg(long = "course")]
    pub courses: Vec<String>,
    /// Drop courses whose name contains this (repeatable)
    #[arg(long = "exclude-course")]
    pub exclude_courses: Vec<String>,
    /// Drop work more than this many days past due
    #[arg(long, default_value = "15")]
    pub expired_days: i64,
    /// Drop work due more than this many days from now
    #[arg(long, default_value = "90")]
    pub unexpired_days: i64,
}

impl FilterArgs {
    pub fn spec(&self) -> FilterSpec {
        FilterSpec {
            finish_status: self.status,
            course_positive_keywords: self.courses.iter().cloned().collect(),
            course_negative_keywords: self.exclude_courses.iter().cloned().collect(),
            ignore_expired_days: self.expired_days,
            ignore_unexpired_days: self.unexpired_days,
        }
    }
}

/// The configured OCR command, or a solver that always fails soft.
pub fn build_solver(config: &HarvestConfig) -> Result<Arc<dyn CaptchaSolver>> {
    match CommandSolver::from_config(config)? {
        Some(solver) => {
            tracing::debug!(program = %solver.program(), "using OCR command");
            Ok(Arc::new(solver))
        }
        None => {
            tracing::warn!("no OCR command configured, captcha will be left blank");
            Ok(Arc::new(NoopSolver))
        }
    }
}

/// Chromium when it can be found, otherwise a driver that refuses to launch.
pub fn build_driver(config: &HarvestConfig) -> Arc<dyn BrowserDriver> {
    match ChromiumDriver::from_config(config) {
        Ok(driver) => Arc::new(driver),
        Err(e) => {
            tracing::debug!(error = %e, "SSO login unavailable");
            Arc::new(NoopDriver)
        }
    }
}
