//! Counts and ordering over canonical records.

use crate::normalize::DUE_TIME_FORMAT;
use crate::types::{CanonicalHomework, STATUS_NOT_SUBMITTED, STATUS_SUBMITTED};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Unsubmitted work due within this window is urgent.
pub const URGENT_WITHIN_DAYS: i64 = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeworkSummary {
    pub total: usize,
    pub submitted: usize,
    pub unsubmitted: usize,
    /// Unsubmitted and past due.
    pub overdue: usize,
    /// Unsubmitted and due within [`URGENT_WITHIN_DAYS`].
    pub urgent: usize,
}

fn due(record: &CanonicalHomework) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(record.due_time.trim(), DUE_TIME_FORMAT).ok()
}

pub fn summarize(records: &[CanonicalHomework], now: NaiveDateTime) -> HomeworkSummary {
    let horizon = now + Duration::days(URGENT_WITHIN_DAYS);
    let mut summary = HomeworkSummary {
        total: records.len(),
        ..Default::default()
    };

    for record in records {
        match record.submit_status.as_str() {
            STATUS_SUBMITTED => summary.submitted += 1,
            STATUS_NOT_SUBMITTED => {
                summary.unsubmitted += 1;
                match due(record) {
                    Some(d) if d < now => summary.overdue += 1,
                    Some(d) if d <= horizon => summary.urgent += 1,
                    _ => {}
                }
            }
            _ => {}
        }
    }
    summary
}

/// Earliest due first. Records without a parsable due time go last, in
/// their original order.
pub fn sort_by_due(records: &mut [CanonicalHomework]) {
    records.sort_by_key(|r| match due(r) {
        Some(d) => (false, Some(d)),
        None => (true, None),
    });
}
