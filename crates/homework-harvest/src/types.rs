//! Data model shared by the login, harvest and normalize stages.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Upstream marker for a submitted assignment.
pub const STATUS_SUBMITTED: &str = "已提交";

/// Upstream marker for an assignment not yet submitted.
pub const STATUS_NOT_SUBMITTED: &str = "未提交";

/// Login credentials. Lives for one login call and is never persisted.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub student_id: String,
    #[serde(alias = "password", default)]
    pub secret: String,
    /// `secret` already holds the upstream password digest.
    #[serde(alias = "use_hash", default)]
    pub secret_is_prehashed: bool,
}

impl Credentials {
    pub fn new(student_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            secret: secret.into(),
            secret_is_prehashed: false,
        }
    }

    pub fn prehashed(student_id: impl Into<String>, digest: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            secret: digest.into(),
            secret_is_prehashed: true,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("student_id", &self.student_id)
            .field("secret", &"<redacted>")
            .field("secret_is_prehashed", &self.secret_is_prehashed)
            .finish()
    }
}

/// An authenticated platform session.
///
/// Produced by a login strategy and owned by exactly one
/// [`SessionClient`](crate::client::SessionClient). There is no logout; the
/// session is simply dropped.
#[derive(Clone, Default)]
pub struct Session {
    cookies: BTreeMap<String, String>,
    secondary_token: Option<String>,
}

impl Session {
    pub fn new(cookies: BTreeMap<String, String>) -> Self {
        Self {
            cookies,
            secondary_token: None,
        }
    }

    /// Session holding a single named cookie.
    pub fn with_cookie(name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut cookies = BTreeMap::new();
        cookies.insert(name.into(), value.into());
        Self::new(cookies)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn cookie_names(&self) -> impl Iterator<Item = &str> {
        self.cookies.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// `Cookie` header value: `name=value` pairs joined by `"; "`.
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn secondary_token(&self) -> Option<&str> {
        self.secondary_token.as_deref()
    }

    /// Record the secondary token. Empty tokens are treated as absent.
    pub fn set_secondary_token(&mut self, token: impl Into<String>) {
        let token = token.into();
        self.secondary_token = (!token.is_empty()).then_some(token);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("cookies", &self.cookies.keys().collect::<Vec<_>>())
            .field("secondary_token", &self.secondary_token.is_some())
            .finish()
    }
}

/// One course of the current semester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub course_num: String,
    pub name: String,
    /// Class-section id (`xkhId` in referer URLs).
    pub fz_id: String,
    pub teacher_id: String,
}

impl Course {
    /// Adapt an upstream `courseList` entry. Entries without an id are rejected.
    pub fn from_upstream(value: &Value) -> Option<Self> {
        let id = text_field(value, &["id"])?;
        if id.is_empty() {
            return None;
        }
        Some(Self {
            id,
            course_num: text_field(value, &["course_num", "courseNum"]).unwrap_or_default(),
            name: text_field(value, &["name", "courseName", "course_name"]).unwrap_or_default(),
            fz_id: text_field(value, &["fz_id", "fzId"]).unwrap_or_default(),
            teacher_id: text_field(value, &["teacher_id", "teacherId"]).unwrap_or_default(),
        })
    }
}

/// The three assignment categories the platform serves, by `subType` index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HomeworkKind {
    Homework,
    Report,
    Experiment,
}

impl HomeworkKind {
    pub const ALL: [HomeworkKind; 3] = [
        HomeworkKind::Homework,
        HomeworkKind::Report,
        HomeworkKind::Experiment,
    ];

    /// `subType` query parameter value.
    pub fn sub_type(self) -> u8 {
        match self {
            HomeworkKind::Homework => 0,
            HomeworkKind::Report => 1,
            HomeworkKind::Experiment => 2,
        }
    }
}

/// A homework record as the upstream sent it, after key-spelling adaptation.
///
/// Absent fields stay `None`; defaults are applied by normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawHomework {
    pub id: String,
    pub title: Option<String>,
    pub end_time: Option<String>,
    /// HTML.
    pub content: Option<String>,
    pub submit_status: Option<String>,
    pub submit_count: Option<i64>,
    pub total_count: Option<i64>,
    pub create_date: Option<String>,
    /// Display name of the parent course, tagged by the harvester.
    pub course_name: String,
    pub kind: Option<HomeworkKind>,
}

impl RawHomework {
    /// Adapt one upstream record.
    ///
    /// Accepts both the legacy spelling (`subStatus`, `submitCount`,
    /// `allCount`, `open_date`) and the REST spelling (`submit_status`,
    /// `submit_count`, `total_count`, `create_date`). The first present,
    /// non-null key wins.
    pub fn from_upstream(value: &Value) -> Self {
        Self {
            id: text_field(value, &["id"]).unwrap_or_default(),
            title: text_field(value, &["title"]),
            end_time: text_field(value, &["end_time", "due_time", "endTime"]),
            content: text_field(value, &["content"]),
            submit_status: text_field(value, &["subStatus", "submit_status"]),
            submit_count: count_field(value, &["submitCount", "submit_count"]),
            total_count: count_field(value, &["allCount", "total_count"]),
            create_date: text_field(value, &["open_date", "create_date"]),
            course_name: text_field(value, &["course_name"]).unwrap_or_default(),
            kind: None,
        }
    }
}

/// The stable record shape returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalHomework {
    pub id: String,
    pub title: String,
    pub course_name: String,
    /// Plain text, never empty.
    pub content: String,
    /// `YYYY-MM-DD HH:MM`, or [`NO_DUE_TIME`](crate::normalize::NO_DUE_TIME).
    pub due_time: String,
    pub submit_status: String,
    pub submit_count: i64,
    pub total_count: i64,
    pub create_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<HomeworkKind>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishStatus {
    #[default]
    All,
    Finished,
    Unfinished,
}

impl FromStr for FinishStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(FinishStatus::All),
            "finished" => Ok(FinishStatus::Finished),
            "unfinished" => Ok(FinishStatus::Unfinished),
            other => Err(format!(
                "unknown finish status '{other}' (expected all, finished or unfinished)"
            )),
        }
    }
}

/// Which records survive normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    pub finish_status: FinishStatus,
    /// Keep only courses whose name contains at least one of these.
    #[serde(alias = "course_keywords")]
    pub course_positive_keywords: BTreeSet<String>,
    /// Drop courses whose name contains any of these.
    pub course_negative_keywords: BTreeSet<String>,
    /// Past-due records older than this many whole days are dropped.
    pub ignore_expired_days: i64,
    /// Records due further out than this many whole days are dropped.
    pub ignore_unexpired_days: i64,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            finish_status: FinishStatus::All,
            course_positive_keywords: BTreeSet::new(),
            course_negative_keywords: BTreeSet::new(),
            ignore_expired_days: 15,
            ignore_unexpired_days: 90,
        }
    }
}

/// First present key rendered as text. Numbers and booleans are stringified;
/// `null` counts as absent.
fn text_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match value.get(*k)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    })
}

/// First present key as an integer. Numeric strings are accepted.
fn count_field(value: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|k| match value.get(*k)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}
