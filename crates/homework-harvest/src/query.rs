//! End-to-end query: login, harvest, normalize.
//!
//! Every call builds its own login strategy, session and harvester. Nothing
//! is cached between calls.

use crate::captcha::CaptchaSolver;
use crate::client::SessionClient;
use crate::config::HarvestConfig;
use crate::error::{with_deadline, HarvestError, HarvestResult};
use crate::harvest::Harvester;
use crate::login::{Login, LoginMethod};
use crate::normalize::normalize;
use crate::renderer::BrowserDriver;
use crate::types::{CanonicalHomework, Credentials, FilterSpec};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Successful result of one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub semester: String,
    pub records: Vec<CanonicalHomework>,
    pub courses: usize,
    /// Records harvested before filtering.
    pub harvested: usize,
    pub skipped_fetches: usize,
}

/// Run one query under `config.query_timeout`.
pub async fn run(
    config: &HarvestConfig,
    method: LoginMethod,
    credentials: &Credentials,
    filter: &FilterSpec,
    solver: Arc<dyn CaptchaSolver>,
    driver: Arc<dyn BrowserDriver>,
) -> HarvestResult<QueryOutcome> {
    with_deadline(
        "query",
        config.query_timeout,
        run_unbounded(config, method, credentials, filter, solver, driver),
    )
    .await
}

async fn run_unbounded(
    config: &HarvestConfig,
    method: LoginMethod,
    credentials: &Credentials,
    filter: &FilterSpec,
    solver: Arc<dyn CaptchaSolver>,
    driver: Arc<dyn BrowserDriver>,
) -> HarvestResult<QueryOutcome> {
    tracing::info!(student_id = %credentials.student_id, method = %method, "query started");

    let login = Login::new(method, config, solver, driver)?;
    let session = login.login(credentials).await?;

    let client = SessionClient::new(config, session)?;
    let report = Harvester::new(client).run().await?;

    let now = chrono::Local::now().naive_local();
    let records = normalize(&report.records, filter, now);

    tracing::info!(
        student_id = %credentials.student_id,
        semester = %report.semester,
        harvested = report.records.len(),
        returned = records.len(),
        "query finished"
    );

    Ok(QueryOutcome {
        semester: report.semester,
        courses: report.courses.len(),
        harvested: report.records.len(),
        skipped_fetches: report.skipped_fetches,
        records,
    })
}

/// Wire shape returned to callers.
///
/// Success: `{success: true, data, total, semester}`.
/// Failure: `{success: false, error, code}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<CanonicalHomework>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semester: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl QueryResponse {
    pub fn success(outcome: QueryOutcome) -> Self {
        Self {
            success: true,
            total: Some(outcome.records.len()),
            data: Some(outcome.records),
            semester: Some(outcome.semester),
            error: None,
            code: None,
        }
    }

    pub fn failure(err: &HarvestError) -> Self {
        Self {
            success: false,
            data: None,
            total: None,
            semester: None,
            error: Some(err.to_string()),
            code: Some(err.kind().to_string()),
        }
    }
}

impl From<HarvestResult<QueryOutcome>> for QueryResponse {
    fn from(result: HarvestResult<QueryOutcome>) -> Self {
        match result {
            Ok(outcome) => Self::success(outcome),
            Err(e) => Self::failure(&e),
        }
    }
}
