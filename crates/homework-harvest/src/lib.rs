// Copyright 2026 homework-harvest contributors
// SPDX-License-Identifier: Apache-2.0

//! Homework harvester for the BJTU course platform.
//!
//! Logs in (direct form POST or browser-driven SSO), walks the platform's
//! session-scoped API for the current semester's courses and homework, and
//! normalizes the records into a stable JSON shape.

pub mod captcha;
pub mod client;
pub mod config;
pub mod error;
pub mod harvest;
pub mod login;
pub mod normalize;
pub mod query;
pub mod renderer;
pub mod summary;
pub mod types;

pub use captcha::{ArithmeticSolver, CaptchaSolver, CommandSolver, NoopSolver};
pub use client::SessionClient;
pub use config::HarvestConfig;
pub use error::{HarvestError, HarvestResult};
pub use harvest::{HarvestReport, Harvester};
pub use login::{BrowserSsoLogin, DirectFormLogin, Login, LoginMethod};
pub use normalize::{normalize, NO_CONTENT, NO_DUE_TIME};
pub use query::{QueryOutcome, QueryResponse};
pub use renderer::{BrowserDriver, BrowserSession, NoopDriver};
pub use summary::{sort_by_due, summarize, HomeworkSummary};
pub use types::*;
