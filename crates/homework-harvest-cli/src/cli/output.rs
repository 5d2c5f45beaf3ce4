//! Rendering of query results for the terminal.

use clap::ValueEnum;
use homework_harvest::normalize::NO_DUE_TIME;
use homework_harvest::{CanonicalHomework, HomeworkSummary, QueryResponse};
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable listing with a summary line
    Pretty,
    /// The same JSON payload the REST endpoint returns
    Json,
}

pub fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("  Error: failed to serialize output: {e}"),
    }
}

pub fn print_response(response: &QueryResponse) {
    print_json(response);
}

/// Pretty listing: one block per record, then the summary.
pub fn render_pretty(semester: &str, records: &[CanonicalHomework], summary: &HomeworkSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Semester {semester}: {} assignment(s)", records.len());
    let _ = writeln!(out);

    for hw in records {
        let due = if hw.due_time == NO_DUE_TIME {
            "no deadline"
        } else {
            hw.due_time.as_str()
        };
        let _ = writeln!(out, "  [{}] {} / {}", hw.submit_status, hw.course_name, hw.title);
        let _ = writeln!(
            out,
            "      due {due}  submitted {}/{}",
            hw.submit_count, hw.total_count
        );
        let first_line = hw.content.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
        let _ = writeln!(out, "      {}", truncate(first_line, 72));
    }

    if !records.is_empty() {
        let _ = writeln!(out);
    }
    let _ = writeln!(
        out,
        "Total {}  submitted {}  unsubmitted {}  overdue {}  urgent {}",
        summary.total, summary.submitted, summary.unsubmitted, summary.overdue, summary.urgent
    );
    out
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hw(due: &str) -> CanonicalHomework {
        CanonicalHomework {
            id: "1".to_string(),
            title: "Lab 2".to_string(),
            course_name: "大学物理".to_string(),
            content: "\n  Measure g\nwith a pendulum".to_string(),
            due_time: due.to_string(),
            submit_status: "未提交".to_string(),
            submit_count: 5,
            total_count: 40,
            create_date: "2026-10-01".to_string(),
            kind: None,
        }
    }

    #[test]
    fn test_render_pretty_lists_records_and_summary() {
        let summary = HomeworkSummary {
            total: 2,
            unsubmitted: 2,
            urgent: 1,
            ..Default::default()
        };
        let text = render_pretty("2026202701", &[hw("2026-10-20 23:59"), hw(NO_DUE_TIME)], &summary);

        assert!(text.starts_with("Semester 2026202701: 2 assignment(s)"));
        assert!(text.contains("[未提交] 大学物理 / Lab 2"));
        assert!(text.contains("due 2026-10-20 23:59  submitted 5/40"));
        assert!(text.contains("due no deadline"));
        assert!(text.contains("      Measure g\n"));
        assert!(text.contains("Total 2  submitted 0  unsubmitted 2  overdue 0  urgent 1"));
    }

    #[test]
    fn test_render_pretty_empty_harvest_is_plain_listing() {
        let text = render_pretty("2026202701", &[], &HomeworkSummary::default());
        assert_eq!(
            text,
            "Semester 2026202701: 0 assignment(s)\n\nTotal 0  submitted 0  unsubmitted 0  overdue 0  urgent 0\n"
        );
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("短文本", 5), "短文本");
        assert_eq!(truncate("abcdefgh", 5), "abcd…");
    }
}
