//! `hwharvest query`: log in, harvest and print homework.

use crate::cli::output::{self, OutputFormat};
use crate::cli::{build_driver, build_solver, ConfigArgs, FilterArgs, LoginArgs};
use anyhow::{bail, Result};
use homework_harvest::query::{self, QueryResponse};
use homework_harvest::{sort_by_due, summarize, BrowserDriver, LoginMethod, NoopDriver};
use std::sync::Arc;

pub async fn run(
    login: &LoginArgs,
    filter: &FilterArgs,
    config: &ConfigArgs,
    format: OutputFormat,
    sort: bool,
) -> Result<()> {
    let config = config.resolve()?;
    let solver = build_solver(&config)?;
    let driver: Arc<dyn BrowserDriver> = match login.method {
        LoginMethod::BrowserSso => build_driver(&config),
        LoginMethod::DirectForm => Arc::new(NoopDriver),
    };

    let result = query::run(
        &config,
        login.method,
        &login.credentials(),
        &filter.spec(),
        solver,
        driver,
    )
    .await;

    match result {
        Ok(mut outcome) => {
            if sort {
                sort_by_due(&mut outcome.records);
            }
            match format {
                OutputFormat::Json => output::print_response(&QueryResponse::success(outcome)),
                OutputFormat::Pretty => {
                    let now = chrono::Local::now().naive_local();
                    let summary = summarize(&outcome.records, now);
                    print!(
                        "{}",
                        output::render_pretty(&outcome.semester, &outcome.records, &summary)
                    );
                }
            }
            Ok(())
        }
        Err(e) => {
            if format == OutputFormat::Json {
                output::print_response(&QueryResponse::failure(&e));
            }
            bail!("query failed ({}): {e}", e.kind())
        }
    }
}
