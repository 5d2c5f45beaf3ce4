//! Normalization and filtering of harvested records.
//!
//! Pure functions: the same records, filter and clock always produce the same
//! output.

use crate::types::{
    CanonicalHomework, FilterSpec, FinishStatus, RawHomework, STATUS_NOT_SUBMITTED,
    STATUS_SUBMITTED,
};
use chrono::NaiveDateTime;
use scraper::Html;

/// `due_time` of records that have none.
pub const NO_DUE_TIME: &str = "NAT";

/// `content` of records whose text is empty.
pub const NO_CONTENT: &str = "没有详情";

/// `submit_status` of records that carry none.
pub const UNKNOWN_STATUS: &str = "未知";

/// Due dates are parsed in this format only.
pub const DUE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Filter `records` and map the survivors to the canonical shape.
///
/// Input order is preserved.
pub fn normalize(records: &[RawHomework], filter: &FilterSpec, now: NaiveDateTime) -> Vec<CanonicalHomework> {
    let kept: Vec<CanonicalHomework> = records
        .iter()
        .filter(|raw| passes(raw, filter, now))
        .map(to_canonical)
        .collect();

    tracing::debug!(input = records.len(), output = kept.len(), "normalized homework");
    kept
}

/// Whether `raw` survives every filter in `filter`.
pub fn passes(raw: &RawHomework, filter: &FilterSpec, now: NaiveDateTime) -> bool {
    status_matches(raw, filter.finish_status)
        && keywords_match(&raw.course_name, filter)
        && within_window(raw.end_time.as_deref(), filter, now)
}

fn status_matches(raw: &RawHomework, wanted: FinishStatus) -> bool {
    let status = raw.submit_status.as_deref();
    match wanted {
        FinishStatus::All => true,
        FinishStatus::Finished => status == Some(STATUS_SUBMITTED),
        FinishStatus::Unfinished => status == Some(STATUS_NOT_SUBMITTED),
    }
}

fn keywords_match(course_name: &str, filter: &FilterSpec) -> bool {
    let positive = &filter.course_positive_keywords;
    if !positive.is_empty() && !positive.iter().any(|kw| course_name.contains(kw.as_str())) {
        return false;
    }
    !filter
        .course_negative_keywords
        .iter()
        .any(|kw| !kw.is_empty() && course_name.contains(kw.as_str()))
}

/// Missing or unparsable due times always pass.
fn within_window(due: Option<&str>, filter: &FilterSpec, now: NaiveDateTime) -> bool {
    let Some(due) = due.and_then(|s| NaiveDateTime::parse_from_str(s.trim(), DUE_TIME_FORMAT).ok()) else {
        return true;
    };
    if due < now && (now - due).num_days() > filter.ignore_expired_days {
        return false;
    }
    if due > now && (due - now).num_days() > filter.ignore_unexpired_days {
        return false;
    }
    true
}

fn to_canonical(raw: &RawHomework) -> CanonicalHomework {
    let content = raw.content.as_deref().map(html_to_text).unwrap_or_default();
    let due_time = raw
        .end_time
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(NO_DUE_TIME);

    CanonicalHomework {
        id: raw.id.clone(),
        title: raw.title.clone().unwrap_or_default(),
        course_name: raw.course_name.clone(),
        content: if content.is_empty() {
            NO_CONTENT.to_string()
        } else {
            content
        },
        due_time: due_time.to_string(),
        submit_status: raw
            .submit_status
            .clone()
            .unwrap_or_else(|| UNKNOWN_STATUS.to_string()),
        submit_count: raw.submit_count.unwrap_or(0),
        total_count: raw.total_count.unwrap_or(0),
        create_date: raw.create_date.clone().unwrap_or_default(),
        kind: raw.kind,
    }
}

/// Visible text of an HTML fragment, trimmed.
pub fn html_to_text(html: &str) -> String {
    if !html.contains('<') && !html.contains('&') {
        return html.trim().to_string();
    }
    let fragment = Html::parse_fragment(html);
    fragment.root_element().text().collect::<String>().trim().to_string()
}
