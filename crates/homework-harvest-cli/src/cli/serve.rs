// Copyright 2026 homework-harvest contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP REST API for the harvester.
//!
//! `POST /api/homework` runs one full query per request; nothing is shared
//! between requests except the resolved configuration, the captcha solver
//! and the browser driver.

use crate::cli::{build_driver, build_solver, ConfigArgs};
use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use homework_harvest::query::{self, QueryResponse};
use homework_harvest::{
    BrowserDriver, CaptchaSolver, Credentials, FilterSpec, HarvestConfig, HarvestError,
    LoginMethod,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

pub struct ServeState {
    pub config: HarvestConfig,
    pub solver: Arc<dyn CaptchaSolver>,
    pub driver: Arc<dyn BrowserDriver>,
}

/// Request body: credentials, login method and filter fields side by side.
#[derive(Deserialize)]
pub struct HomeworkRequest {
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(default)]
    pub method: LoginMethod,
    #[serde(flatten)]
    pub filter: FilterSpec,
}

/// Build the axum Router with all REST endpoints.
pub fn router(state: Arc<ServeState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/homework", post(handle_homework))
        .layer(cors)
        .with_state(state)
}

pub async fn run(host: &str, port: u16, config: &ConfigArgs) -> Result<()> {
    let config = config.resolve()?;
    let state = Arc::new(ServeState {
        solver: build_solver(&config)?,
        driver: build_driver(&config),
        config,
    });

    let app = router(state);
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    tracing::info!("REST API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "BJTU homework harvester",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn handle_homework(
    State(state): State<Arc<ServeState>>,
    payload: Result<Json<HomeworkRequest>, JsonRejection>,
) -> (StatusCode, Json<QueryResponse>) {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => {
            let err = HarvestError::InvalidArgument(rejection.body_text());
            return (StatusCode::BAD_REQUEST, Json(QueryResponse::failure(&err)));
        }
    };

    let result = query::run(
        &state.config,
        request.method,
        &request.credentials,
        &request.filter,
        Arc::clone(&state.solver),
        Arc::clone(&state.driver),
    )
    .await;

    match result {
        Ok(outcome) => (StatusCode::OK, Json(QueryResponse::success(outcome))),
        Err(e) => {
            tracing::warn!(
                student_id = %request.credentials.student_id,
                code = e.kind(),
                error = %e,
                "homework query failed"
            );
            (status_for(&e), Json(QueryResponse::failure(&e)))
        }
    }
}

fn status_for(err: &HarvestError) -> StatusCode {
    match err {
        HarvestError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        HarvestError::Authentication(_) | HarvestError::SessionNotEstablished(_) => {
            StatusCode::UNAUTHORIZED
        }
        HarvestError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    }
}
