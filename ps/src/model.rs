//! Record types stored by PlanStore

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::schema::ImportSchema;

/// Project lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Active,
    Paused,
    Done,
    /// Soft-deleted; hidden from default listings
    Archived,
}

impl ProjectStatus {
    pub const ALL: [ProjectStatus; 4] = [Self::Active, Self::Paused, Self::Done, Self::Archived];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Done => "done",
            Self::Archived => "archived",
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "ProjectStatus::from_str: called");
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("Unknown project status: {}. Use: active, paused, done, archived", s))
    }
}

/// Kind of a plan node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    #[default]
    Module,
    Chapter,
    Unit,
    Milestone,
    Exam,
    Review,
}

impl NodeKind {
    pub const ALL: [NodeKind; 6] = [
        Self::Module,
        Self::Chapter,
        Self::Unit,
        Self::Milestone,
        Self::Exam,
        Self::Review,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Chapter => "chapter",
            Self::Unit => "unit",
            Self::Milestone => "milestone",
            Self::Exam => "exam",
            Self::Review => "review",
        }
    }

    /// Comma-separated list of all kinds, for prompts and error messages
    pub fn choices() -> String {
        Self::ALL.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "NodeKind::from_str: called");
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("Unknown node kind: {}. Use: {}", s, Self::choices()))
    }
}

/// Type of a work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemType {
    #[default]
    Task,
    Reading,
    Practice,
    Review,
    Writing,
    Assessment,
}

impl WorkItemType {
    pub const ALL: [WorkItemType; 6] = [
        Self::Task,
        Self::Reading,
        Self::Practice,
        Self::Review,
        Self::Writing,
        Self::Assessment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Reading => "reading",
            Self::Practice => "practice",
            Self::Review => "review",
            Self::Writing => "writing",
            Self::Assessment => "assessment",
        }
    }

    pub fn choices() -> String {
        Self::ALL.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
    }
}

impl std::fmt::Display for WorkItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for WorkItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "WorkItemType::from_str: called");
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("Unknown work item type: {}. Use: {}", s, Self::choices()))
    }
}

/// Work item progress status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl std::fmt::Display for WorkItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Todo => write!(f, "todo"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Done => write!(f, "done"),
        }
    }
}

impl std::str::FromStr for WorkItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "WorkItemStatus::from_str: called");
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "todo" => Ok(Self::Todo),
            "in_progress" | "started" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            _ => Err(format!("Unknown work item status: {}. Use: todo, in_progress, done", s)),
        }
    }
}

/// A project: the root of a plan hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    /// Short display code, unique across projects (e.g. "PSP")
    pub short_code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: ProjectStatus,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    /// Set when archived (Unix milliseconds)
    #[serde(default)]
    pub archived_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Project {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some() || self.status == ProjectStatus::Archived
    }
}

/// A node in a project hierarchy (module, chapter, milestone, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub project_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub title: String,
    pub kind: NodeKind,
    pub order_index: u32,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub planned_min: Option<u32>,
    #[serde(default)]
    pub archived_at: Option<i64>,
}

/// A unit of schedulable work attached to a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub project_id: String,
    pub node_id: String,
    pub title: String,
    pub item_type: WorkItemType,
    pub planned_min: u32,
    #[serde(default)]
    pub logged_min: u32,
    #[serde(default)]
    pub status: WorkItemStatus,
    #[serde(default)]
    pub archived_at: Option<i64>,
}

impl WorkItem {
    pub fn remaining_min(&self) -> u32 {
        self.planned_min.saturating_sub(self.logged_min)
    }
}

/// A logged block of time against a work item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkSession {
    pub id: String,
    pub work_item_id: String,
    pub started_at: i64,
    pub minutes: u32,
    #[serde(default)]
    pub note: Option<String>,
}

/// Ordering edge between two records (nodes or work items) of one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: String,
    pub project_id: String,
    /// Must be done first
    pub from_id: String,
    pub to_id: String,
}

/// A reusable import schema saved under a name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub schema: ImportSchema,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_status_from_str() {
        assert_eq!("archived".parse::<ProjectStatus>(), Ok(ProjectStatus::Archived));
        assert_eq!(" Paused ".parse::<ProjectStatus>(), Ok(ProjectStatus::Paused));
        assert!("deleted".parse::<ProjectStatus>().is_err());
    }

    #[test]
    fn test_node_kind_roundtrip_display() {
        for kind in NodeKind::ALL {
            assert_eq!(kind.to_string().parse::<NodeKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_work_item_type_unknown() {
        let err = "homework".parse::<WorkItemType>().unwrap_err();
        assert!(err.contains("task"));
    }

    #[test]
    fn test_work_item_status_accepts_dashes() {
        assert_eq!("in-progress".parse::<WorkItemStatus>(), Ok(WorkItemStatus::InProgress));
        assert!("blocked".parse::<WorkItemStatus>().is_err());
    }

    #[test]
    fn test_remaining_min_saturates() {
        let item = WorkItem {
            id: "w".to_string(),
            project_id: "p".to_string(),
            node_id: "n".to_string(),
            title: "Read".to_string(),
            item_type: WorkItemType::Reading,
            planned_min: 30,
            logged_min: 45,
            status: WorkItemStatus::InProgress,
            archived_at: None,
        };
        assert_eq!(item.remaining_min(), 0);
    }
}
