//! Deterministic explanations
//!
//! Used directly when no LLM is configured, and as the fact sheet the LLM
//! rewrites when one is.

use std::collections::HashMap;
use std::fmt::Write as _;

use chrono::{Duration, NaiveDate, TimeZone};
use planstore::{ProjectSummary, Recommendation, RiskLevel, WorkSession};

use crate::dispatch::catalog;
use crate::format::minutes;

/// Why the current recommendation looks the way it does
pub fn explain_now(rec: &Recommendation) -> String {
    if rec.items.is_empty() {
        let mut out = format!("Nothing fits into {} right now.", minutes(rec.requested));
        if !rec.blockers.is_empty() {
            let _ = write!(out, " {} item(s) are waiting on other work first.", rec.blockers.len());
        }
        return out;
    }

    let mut out = String::new();
    if rec.mode == "catch_up" {
        out.push_str("You are behind on at least one item, so overdue work comes first.\n");
    } else {
        out.push_str("Nothing is overdue; work is ordered by the nearest due date.\n");
    }
    if let Some(first) = rec.items.first() {
        let _ = write!(out, "Start with {} for {}", first.title, minutes(first.allocated_min));
        if !first.reasons.is_empty() {
            let _ = write!(out, " ({})", first.reasons.join(", "));
        }
        out.push_str(".\n");
    }
    if rec.items.len() > 1 {
        let rest: Vec<&str> = rec.items[1..].iter().map(|i| i.title.as_str()).collect();
        let _ = writeln!(out, "Then: {}.", rest.join(", "));
    }
    if rec.unallocated > 0 {
        let _ = writeln!(out, "{} of your time is left unplanned.", minutes(rec.unallocated));
    }
    if !rec.blockers.is_empty() {
        let _ = writeln!(out, "Held back: {}.", rec.blockers.join("; "));
    }
    out.trim_end().to_string()
}

/// Seven-day look back over logged sessions plus current project risk
pub fn review_weekly(summaries: &[ProjectSummary], sessions: &[WorkSession], today: NaiveDate) -> String {
    let since = today - Duration::days(6);
    let since_ms = since
        .and_hms_opt(0, 0, 0)
        .and_then(|t| chrono::Local.from_local_datetime(&t).earliest())
        .map(|t| t.timestamp_millis())
        .unwrap_or(i64::MIN);

    let recent: Vec<&WorkSession> = sessions.iter().filter(|s| s.started_at >= since_ms).collect();
    let total: u32 = recent.iter().map(|s| s.minutes).sum();

    let mut per_day: HashMap<NaiveDate, u32> = HashMap::new();
    for s in &recent {
        if let Some(day) = chrono::DateTime::from_timestamp_millis(s.started_at)
            .map(|t| t.with_timezone(&chrono::Local).date_naive())
        {
            *per_day.entry(day).or_default() += s.minutes;
        }
    }

    let mut out = format!(
        "Week of {} to {}: {} logged over {} session(s) on {} day(s).\n",
        since,
        today,
        minutes(total),
        recent.len(),
        per_day.len()
    );
    for s in summaries {
        let _ = writeln!(
            out,
            "  {}: {}% done, {} risk",
            s.short_code,
            s.progress_pct(),
            s.risk
        );
    }
    let at_risk: Vec<&str> = summaries
        .iter()
        .filter(|s| s.risk == RiskLevel::High)
        .map(|s| s.short_code.as_str())
        .collect();
    if !at_risk.is_empty() {
        let _ = writeln!(
            out,
            "High risk: {}. Consider `replan --project <code>` or moving the target date.",
            at_risk.join(", ")
        );
    }
    out.trim_end().to_string()
}

/// Help-chat answer built from the command catalog
pub fn help_answer(question: &str) -> String {
    let matches = catalog::suggest(question, 3);
    if matches.is_empty() {
        return "I could not match that to a command. Type `help` for the full list.".to_string();
    }
    let mut out = String::from("These commands look relevant:\n");
    for entry in matches {
        let _ = writeln!(out, "  {:<22} {}", entry.path, entry.summary);
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use planstore::RecommendedItem;

    fn rec(items: Vec<RecommendedItem>, mode: &str) -> Recommendation {
        let allocated = items.iter().map(|i| i.allocated_min).sum();
        Recommendation {
            mode: mode.to_string(),
            requested: 60,
            allocated,
            unallocated: 60 - allocated,
            items,
            blockers: vec![],
        }
    }

    fn item(title: &str, min: u32) -> RecommendedItem {
        RecommendedItem {
            work_item_id: format!("id-{}", title),
            title: title.to_string(),
            allocated_min: min,
            score: 1.0,
            reasons: vec!["overdue by 2 days".to_string()],
        }
    }

    #[test]
    fn test_explain_now_empty() {
        let text = explain_now(&rec(vec![], "due_first"));
        assert!(text.starts_with("Nothing fits into 1h"));
    }

    #[test]
    fn test_explain_now_catch_up() {
        let text = explain_now(&rec(vec![item("Essay", 45), item("Quiz", 15)], "catch_up"));
        assert!(text.contains("behind"));
        assert!(text.contains("Start with Essay for 45m (overdue by 2 days)"));
        assert!(text.contains("Then: Quiz."));
    }

    #[test]
    fn test_review_weekly_counts_recent_sessions() {
        let today = chrono::Local::now().date_naive();
        let now = chrono::Utc::now().timestamp_millis();
        let sessions = vec![
            WorkSession {
                id: "s1".to_string(),
                work_item_id: "w".to_string(),
                started_at: now - 60_000,
                minutes: 30,
                note: None,
            },
            WorkSession {
                id: "s2".to_string(),
                work_item_id: "w".to_string(),
                started_at: now - 30 * 24 * 3_600_000,
                minutes: 500,
                note: None,
            },
        ];
        let summaries = vec![ProjectSummary {
            id: "p".to_string(),
            short_code: "PSP".to_string(),
            name: "Physics".to_string(),
            planned_min: 100,
            logged_min: 30,
            risk: RiskLevel::High,
        }];
        let text = review_weekly(&summaries, &sessions, today);
        assert!(text.contains("30m logged over 1 session(s)"));
        assert!(text.contains("High risk: PSP"));
    }

    #[test]
    fn test_help_answer_uses_catalog() {
        let text = help_answer("archive");
        assert!(text.contains("project archive"));
        assert!(help_answer("xyzzy").contains("help"));
    }
}
