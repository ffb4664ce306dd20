//! Per-project planned/logged summaries with a simple schedule risk

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{Project, WorkItem, WorkItemStatus};

/// Minutes of remaining work per day above which a project is at risk
const MEDIUM_RISK_MIN_PER_DAY: u32 = 60;
const HIGH_RISK_MIN_PER_DAY: u32 = 120;

/// Schedule risk bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Status line for one project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: String,
    pub short_code: String,
    pub name: String,
    pub planned_min: u32,
    pub logged_min: u32,
    pub risk: RiskLevel,
}

impl ProjectSummary {
    /// Percentage of planned minutes logged, capped at 100
    pub fn progress_pct(&self) -> u32 {
        if self.planned_min == 0 {
            return 0;
        }
        (self.logged_min.min(self.planned_min) * 100) / self.planned_min
    }
}

/// Summarize the given projects against their non-archived work items
pub fn summarize(projects: &[Project], items: &[WorkItem], today: NaiveDate) -> Vec<ProjectSummary> {
    debug!(projects = projects.len(), items = items.len(), %today, "summarize: called");
    projects
        .iter()
        .map(|project| {
            let mine: Vec<&WorkItem> = items
                .iter()
                .filter(|w| w.project_id == project.id && w.archived_at.is_none())
                .collect();
            let planned_min = mine.iter().map(|w| w.planned_min).sum();
            let logged_min = mine.iter().map(|w| w.logged_min).sum();
            let remaining: u32 = mine
                .iter()
                .filter(|w| w.status != WorkItemStatus::Done)
                .map(|w| w.remaining_min())
                .sum();
            ProjectSummary {
                id: project.id.clone(),
                short_code: project.short_code.clone(),
                name: project.name.clone(),
                planned_min,
                logged_min,
                risk: risk_for(remaining, project.target_date, today),
            }
        })
        .collect()
}

fn risk_for(remaining_min: u32, target: Option<NaiveDate>, today: NaiveDate) -> RiskLevel {
    let Some(target) = target else {
        return RiskLevel::Low;
    };
    if remaining_min == 0 {
        return RiskLevel::Low;
    }
    let days_left = (target - today).num_days();
    if days_left <= 0 {
        return RiskLevel::High;
    }
    let per_day = remaining_min / days_left as u32;
    if per_day > HIGH_RISK_MIN_PER_DAY {
        RiskLevel::High
    } else if per_day > MEDIUM_RISK_MIN_PER_DAY {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProjectStatus, WorkItemType};

    fn project(id: &str, target: Option<NaiveDate>) -> Project {
        Project {
            id: id.to_string(),
            short_code: id.to_uppercase(),
            name: id.to_string(),
            description: String::new(),
            status: ProjectStatus::Active,
            start_date: None,
            target_date: target,
            archived_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn item(project_id: &str, planned: u32, logged: u32) -> WorkItem {
        WorkItem {
            id: format!("{}-{}", project_id, planned),
            project_id: project_id.to_string(),
            node_id: "n".to_string(),
            title: "t".to_string(),
            item_type: WorkItemType::Task,
            planned_min: planned,
            logged_min: logged,
            status: WorkItemStatus::Todo,
            archived_at: None,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn test_sums_and_progress() {
        let summaries = summarize(&[project("a", None)], &[item("a", 60, 30), item("a", 40, 0)], day(1));
        assert_eq!(summaries[0].planned_min, 100);
        assert_eq!(summaries[0].logged_min, 30);
        assert_eq!(summaries[0].progress_pct(), 30);
        assert_eq!(summaries[0].risk, RiskLevel::Low);
    }

    #[test]
    fn test_risk_buckets() {
        assert_eq!(risk_for(600, Some(day(11)), day(1)), RiskLevel::Low);
        assert_eq!(risk_for(900, Some(day(11)), day(1)), RiskLevel::Medium);
        assert_eq!(risk_for(1300, Some(day(11)), day(1)), RiskLevel::High);
        assert_eq!(risk_for(10, Some(day(1)), day(2)), RiskLevel::High);
        assert_eq!(risk_for(0, Some(day(1)), day(2)), RiskLevel::Low);
    }
}
