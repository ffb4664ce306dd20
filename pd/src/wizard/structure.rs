//! Guided structure wizard
//!
//! Asks a fixed sequence of questions and builds a [`WizardResult`]. Each
//! phase carries only the partial data it needs; [`Phase::advance`] consumes
//! one answer and returns the next phase. There is no way back except
//! cancelling the whole flow.

use chrono::{Local, NaiveDate};
use planstore::{NodeKind, WorkItemType};
use tracing::{debug, warn};

use super::compile::{self, GroupSpec, ItemTemplate, SpecialNode, WizardResult};
use super::{Completion, FlowStep, accept_schema};
use crate::services::Services;

const DEFAULT_GROUP_COUNT: u32 = 1;
const MAX_GROUP_COUNT: u32 = 50;
const DEFAULT_NODE_COUNT: u32 = 1;
const MAX_NODE_COUNT: u32 = 500;
const DEFAULT_MINUTES: u32 = 30;
const MAX_MINUTES: u32 = 1440;
const MAX_DAYS_PER_NODE: u32 = 365;

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Description,
    StartDate,
    Deadline,
    GroupCount,
    GroupLabel {
        index: u32,
        total: u32,
    },
    GroupNodeCount {
        index: u32,
        total: u32,
        label: String,
    },
    GroupKind {
        index: u32,
        total: u32,
        label: String,
        count: u32,
    },
    GroupDays {
        index: u32,
        total: u32,
        label: String,
        count: u32,
        kind: NodeKind,
    },
    TemplateTitle,
    TemplateType {
        title: String,
    },
    TemplateMinutes {
        title: String,
        item_type: WorkItemType,
    },
    SpecialTitle,
    SpecialKind {
        title: String,
    },
    SpecialDue {
        title: String,
        kind: NodeKind,
    },
    SpecialItemTitle {
        special: SpecialNode,
    },
    SpecialItemType {
        special: SpecialNode,
        title: String,
    },
    SpecialItemMinutes {
        special: SpecialNode,
        title: String,
        item_type: WorkItemType,
    },
    Review,
}

/// Parse a count or minutes answer; out of range or garbage gives the default
fn bounded(input: &str, default: u32, max: u32, what: &str, notices: &mut Vec<String>) -> u32 {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return default;
    }
    match trimmed.parse::<u32>() {
        Ok(n) if (1..=max).contains(&n) => n,
        _ => {
            warn!(%input, %what, "bounded: invalid number, using default");
            notices.push(format!(
                "'{}' is not a valid {} (1-{}); using {}",
                trimmed, what, max, default
            ));
            default
        }
    }
}

/// Empty input means "not set"; invalid dates warn and stay unset
fn optional_date(input: &str, what: &str, notices: &mut Vec<String>) -> Option<NaiveDate> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    match NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            warn!(%input, %what, "optional_date: invalid date");
            notices.push(format!("'{}' is not a YYYY-MM-DD date; {} left unset", trimmed, what));
            None
        }
    }
}

fn node_kind(input: &str, notices: &mut Vec<String>) -> NodeKind {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return NodeKind::default();
    }
    trimmed.parse().unwrap_or_else(|_| {
        warn!(%input, "node_kind: unknown kind, using module");
        notices.push(format!("Unknown node kind '{}'; using module", trimmed));
        NodeKind::Module
    })
}

fn item_type(input: &str, notices: &mut Vec<String>) -> WorkItemType {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return WorkItemType::default();
    }
    trimmed.parse().unwrap_or_else(|_| {
        warn!(%input, "item_type: unknown type, using task");
        notices.push(format!("Unknown work item type '{}'; using task", trimmed));
        WorkItemType::Task
    })
}

impl Phase {
    fn prompt(&self, result: &WizardResult) -> String {
        match self {
            Self::Description => "What is this project? (becomes its name)".to_string(),
            Self::StartDate => format!("Start date (YYYY-MM-DD, empty for {})", result.created_on),
            Self::Deadline => "Deadline (YYYY-MM-DD, empty for none)".to_string(),
            Self::GroupCount => format!(
                "How many groups of nodes? (1-{}, default {})",
                MAX_GROUP_COUNT, DEFAULT_GROUP_COUNT
            ),
            Self::GroupLabel { index, total } => format!(
                "Group {}/{}: label for its nodes (e.g. Chapter, empty for \"Group {}\")",
                index, total, index
            ),
            Self::GroupNodeCount { label, .. } => format!(
                "How many \"{}\" nodes? (1-{}, default {})",
                label, MAX_NODE_COUNT, DEFAULT_NODE_COUNT
            ),
            Self::GroupKind { label, .. } => {
                format!("Kind of each \"{}\" node ({}, default module)", label, NodeKind::choices())
            }
            Self::GroupDays { label, .. } => format!(
                "Days per \"{}\" node (1-{}, empty to spread over the deadline)",
                label, MAX_DAYS_PER_NODE
            ),
            Self::TemplateTitle => "Work item added to every node: title (empty to finish)".to_string(),
            Self::TemplateType { title } => {
                format!("Type of \"{}\" ({}, default task)", title, WorkItemType::choices())
            }
            Self::TemplateMinutes { title, .. } => format!(
                "Minutes planned for \"{}\" (1-{}, default {})",
                title, MAX_MINUTES, DEFAULT_MINUTES
            ),
            Self::SpecialTitle => "Special node (exam, review, ...): title (empty to finish)".to_string(),
            Self::SpecialKind { title } => {
                format!("Kind of \"{}\" ({}, default module)", title, NodeKind::choices())
            }
            Self::SpecialDue { title, .. } => {
                format!("Due date of \"{}\" (YYYY-MM-DD, empty for the deadline)", title)
            }
            Self::SpecialItemTitle { special } => {
                format!("Work item for \"{}\": title (empty to finish)", special.title)
            }
            Self::SpecialItemType { title, .. } => {
                format!("Type of \"{}\" ({}, default task)", title, WorkItemType::choices())
            }
            Self::SpecialItemMinutes { title, .. } => format!(
                "Minutes planned for \"{}\" (1-{}, default {})",
                title, MAX_MINUTES, DEFAULT_MINUTES
            ),
            Self::Review => "accept, refine (with AI) or cancel?".to_string(),
        }
    }

    /// Consume one answer; returns the next phase
    fn advance(self, input: &str, result: &mut WizardResult, notices: &mut Vec<String>) -> Phase {
        let text = input.trim();
        match self {
            Self::Description => {
                if text.is_empty() {
                    notices.push("The project needs a description".to_string());
                    return Self::Description;
                }
                result.description = text.to_string();
                Self::StartDate
            }
            Self::StartDate => {
                result.start_date = optional_date(text, "start date", notices);
                Self::Deadline
            }
            Self::Deadline => {
                let deadline = optional_date(text, "deadline", notices);
                if let Some(date) = deadline
                    && date < result.effective_start()
                {
                    notices.push(format!(
                        "Deadline {} is before the start {}; left unset",
                        date,
                        result.effective_start()
                    ));
                    result.deadline = None;
                } else {
                    result.deadline = deadline;
                }
                Self::GroupCount
            }
            Self::GroupCount => {
                let total = bounded(text, DEFAULT_GROUP_COUNT, MAX_GROUP_COUNT, "group count", notices);
                Self::GroupLabel { index: 1, total }
            }
            Self::GroupLabel { index, total } => {
                let label = if text.is_empty() {
                    format!("Group {}", index)
                } else {
                    text.to_string()
                };
                Self::GroupNodeCount { index, total, label }
            }
            Self::GroupNodeCount { index, total, label } => {
                let count = bounded(text, DEFAULT_NODE_COUNT, MAX_NODE_COUNT, "node count", notices);
                Self::GroupKind {
                    index,
                    total,
                    label,
                    count,
                }
            }
            Self::GroupKind {
                index,
                total,
                label,
                count,
            } => Self::GroupDays {
                index,
                total,
                label,
                count,
                kind: node_kind(text, notices),
            },
            Self::GroupDays {
                index,
                total,
                label,
                count,
                kind,
            } => {
                let days_per_node = if text.is_empty() {
                    None
                } else {
                    match text.parse::<u32>() {
                        Ok(d) if (1..=MAX_DAYS_PER_NODE).contains(&d) => Some(d),
                        _ => {
                            notices.push(format!(
                                "'{}' is not a valid number of days (1-{}); left unset",
                                text, MAX_DAYS_PER_NODE
                            ));
                            None
                        }
                    }
                };
                result.groups.push(GroupSpec {
                    label,
                    count,
                    kind,
                    days_per_node,
                });
                if index < total {
                    Self::GroupLabel {
                        index: index + 1,
                        total,
                    }
                } else {
                    Self::TemplateTitle
                }
            }
            Self::TemplateTitle => {
                if text.is_empty() {
                    Self::SpecialTitle
                } else {
                    Self::TemplateType {
                        title: text.to_string(),
                    }
                }
            }
            Self::TemplateType { title } => Self::TemplateMinutes {
                title,
                item_type: item_type(text, notices),
            },
            Self::TemplateMinutes { title, item_type } => {
                let planned_min = bounded(text, DEFAULT_MINUTES, MAX_MINUTES, "minutes", notices);
                result.templates.push(ItemTemplate {
                    title,
                    item_type,
                    planned_min,
                });
                Self::TemplateTitle
            }
            Self::SpecialTitle => {
                if text.is_empty() {
                    Self::Review
                } else {
                    Self::SpecialKind {
                        title: text.to_string(),
                    }
                }
            }
            Self::SpecialKind { title } => Self::SpecialDue {
                title,
                kind: node_kind(text, notices),
            },
            Self::SpecialDue { title, kind } => Self::SpecialItemTitle {
                special: SpecialNode {
                    title,
                    kind,
                    due: optional_date(text, "due date", notices),
                    work_items: Vec::new(),
                },
            },
            Self::SpecialItemTitle { special } => {
                if text.is_empty() {
                    result.specials.push(special);
                    Self::SpecialTitle
                } else {
                    Self::SpecialItemType {
                        special,
                        title: text.to_string(),
                    }
                }
            }
            Self::SpecialItemType { special, title } => Self::SpecialItemMinutes {
                special,
                title,
                item_type: item_type(text, notices),
            },
            Self::SpecialItemMinutes {
                mut special,
                title,
                item_type,
            } => {
                let planned_min = bounded(text, DEFAULT_MINUTES, MAX_MINUTES, "minutes", notices);
                special.work_items.push(ItemTemplate {
                    title,
                    item_type,
                    planned_min,
                });
                Self::SpecialItemTitle { special }
            }
            // Review answers are handled by the wizard, which needs services
            Self::Review => Self::Review,
        }
    }
}

/// Guided wizard that builds a whole project plan
#[derive(Debug, Clone)]
pub struct StructureWizard {
    result: WizardResult,
    phase: Phase,
}

impl Default for StructureWizard {
    fn default() -> Self {
        Self::new(Local::now().date_naive())
    }
}

impl StructureWizard {
    pub fn new(today: NaiveDate) -> Self {
        debug!(%today, "StructureWizard::new: called");
        Self {
            result: WizardResult::new(today),
            phase: Phase::Description,
        }
    }

    pub fn result(&self) -> &WizardResult {
        &self.result
    }

    pub fn in_review(&self) -> bool {
        self.phase == Phase::Review
    }

    pub fn prompt(&self) -> String {
        self.phase.prompt(&self.result)
    }

    /// Summary shown while reviewing
    pub fn detail(&self) -> Vec<String> {
        if !self.in_review() {
            return Vec::new();
        }
        let schema = compile::compile(&self.result);
        let mut lines = vec![format!(
            "{}: {} nodes, {} work items, {} planned minutes",
            schema.project.name,
            schema.nodes.len(),
            schema.work_items.len(),
            schema.total_planned_min()
        )];
        for node in schema.nodes.iter().take(12) {
            let due = node.due_date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());
            lines.push(format!("  {:>3}. {:<30} {:<10} {}", node.order, node.title, node.kind.as_str(), due));
        }
        if schema.nodes.len() > 12 {
            lines.push(format!("  ... and {} more", schema.nodes.len() - 12));
        }
        lines
    }

    pub fn submit(&mut self, input: &str, services: &Services) -> FlowStep {
        debug!(phase = ?self.phase, "StructureWizard::submit: called");
        if self.in_review() {
            return self.review(input, services);
        }
        let mut notices = Vec::new();
        let phase = std::mem::replace(&mut self.phase, Phase::Review);
        self.phase = phase.advance(input, &mut self.result, &mut notices);
        FlowStep::Continue { notices }
    }

    fn review(&mut self, input: &str, services: &Services) -> FlowStep {
        let answer = input.trim().to_lowercase();
        debug!(%answer, "StructureWizard::review: called");
        match answer.as_str() {
            "accept" | "a" | "yes" | "y" => {
                let schema = compile::compile(&self.result);
                match accept_schema(services, &schema) {
                    Ok(report) => FlowStep::Done(Completion::Imported(report)),
                    Err(notices) => FlowStep::Continue { notices },
                }
            }
            "refine" | "r" => {
                if !services.has_nl() {
                    return FlowStep::notice("Refining needs an LLM; accept or cancel instead");
                }
                FlowStep::Done(Completion::Refine {
                    schema: compile::compile(&self.result),
                    summary: compile::summarize(&self.result),
                })
            }
            "cancel" | "c" => FlowStep::Done(Completion::Cancelled),
            _ => FlowStep::notice("Type accept, refine or cancel"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::temp_services;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn feed(wizard: &mut StructureWizard, services: &Services, answers: &[&str]) -> Vec<String> {
        let mut notices = Vec::new();
        for answer in answers {
            match wizard.submit(answer, services) {
                FlowStep::Continue { notices: n } => notices.extend(n),
                FlowStep::Done(done) => panic!("wizard finished early: {:?}", done),
            }
        }
        notices
    }

    const PHYSICS: &[&str] = &[
        "Physics Study Plan",
        "2026-02-08",
        "",
        "1",
        "Chapter",
        "5",
        "module",
        "10",
        "Read",
        "reading",
        "60",
        "Problems",
        "practice",
        "45",
        "",
        "",
    ];

    #[test]
    fn test_physics_walkthrough_reaches_review() {
        let (_dir, services) = temp_services();
        let mut wizard = StructureWizard::new(date("2026-01-15"));
        let notices = feed(&mut wizard, &services, PHYSICS);
        assert!(notices.is_empty(), "{:?}", notices);
        assert!(wizard.in_review());

        let result = wizard.result();
        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].days_per_node, Some(10));
        assert_eq!(result.template_budget(), 105);
        assert!(wizard.detail()[0].contains("5 nodes, 10 work items"));
    }

    #[test]
    fn test_accept_imports_project() {
        let (_dir, services) = temp_services();
        let mut wizard = StructureWizard::new(date("2026-01-15"));
        feed(&mut wizard, &services, PHYSICS);
        match wizard.submit("accept", &services) {
            FlowStep::Done(Completion::Imported(report)) => {
                assert_eq!(report.project.name, "Physics Study Plan");
                assert_eq!(report.node_count, 5);
                assert_eq!(report.work_item_count, 10);
            }
            other => panic!("expected import, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_answers_fall_back_to_defaults() {
        let (_dir, services) = temp_services();
        let mut wizard = StructureWizard::new(date("2026-01-15"));
        let notices = feed(
            &mut wizard,
            &services,
            &["Thing", "not-a-date", "2026-13-40", "999", "", "0", "blob", "400"],
        );
        assert_eq!(notices.len(), 6, "{:?}", notices);
        assert!(notices.iter().any(|n| n.contains("Unknown node kind 'blob'")));
        let result = wizard.result();
        assert_eq!(result.start_date, None);
        assert_eq!(result.deadline, None);
        assert_eq!(
            result.groups[0],
            GroupSpec {
                label: "Group 1".to_string(),
                count: 1,
                kind: NodeKind::Module,
                days_per_node: None,
            }
        );
        assert_eq!(wizard.prompt(), Phase::TemplateTitle.prompt(result));
    }

    #[test]
    fn test_unknown_item_type_and_minutes_defaults() {
        let (_dir, services) = temp_services();
        let mut wizard = StructureWizard::new(date("2026-01-15"));
        let notices = feed(
            &mut wizard,
            &services,
            &["Thing", "", "", "", "", "", "", "", "Write", "poem", "abc"],
        );
        assert_eq!(notices.len(), 2);
        assert!(notices[0].contains("Unknown work item type 'poem'"), "{:?}", notices);
        assert_eq!(
            wizard.result().templates[0],
            ItemTemplate {
                title: "Write".to_string(),
                item_type: WorkItemType::Task,
                planned_min: 30,
            }
        );
    }

    #[test]
    fn test_deadline_before_start_is_rejected() {
        let (_dir, services) = temp_services();
        let mut wizard = StructureWizard::new(date("2026-01-15"));
        let notices = feed(&mut wizard, &services, &["Thing", "2026-03-01", "2026-02-01"]);
        assert_eq!(notices.len(), 1);
        assert_eq!(wizard.result().deadline, None);
    }

    #[test]
    fn test_special_nodes_with_own_items() {
        let (_dir, services) = temp_services();
        let mut wizard = StructureWizard::new(date("2026-01-15"));
        feed(
            &mut wizard,
            &services,
            &[
                "Course", "", "2026-04-01", "1", "Week", "2", "unit", "", "", "Final", "exam", "", "Mock exam",
                "assessment", "90", "", "",
            ],
        );
        assert!(wizard.in_review());
        let special = &wizard.result().specials[0];
        assert_eq!(special.kind, NodeKind::Exam);
        assert_eq!(special.due, None);
        assert_eq!(special.work_items.len(), 1);

        let schema = compile::compile(wizard.result());
        assert_eq!(schema.nodes.len(), 3);
        assert_eq!(schema.nodes[2].due_date, Some(date("2026-04-01")));
        assert_eq!(schema.nodes[2].planned_min, Some(90));
    }

    #[test]
    fn test_review_refine_needs_nl_and_cancel_discards() {
        let (_dir, services) = temp_services();
        let mut wizard = StructureWizard::new(date("2026-01-15"));
        feed(&mut wizard, &services, PHYSICS);
        assert!(matches!(wizard.submit("refine", &services), FlowStep::Continue { .. }));
        assert!(wizard.in_review());
        assert!(matches!(wizard.submit("what", &services), FlowStep::Continue { .. }));
        assert_eq!(wizard.submit("cancel", &services), FlowStep::Done(Completion::Cancelled));
        assert!(services.repo.list_projects(true).unwrap().is_empty());
    }

    #[test]
    fn test_empty_description_is_asked_again() {
        let (_dir, services) = temp_services();
        let mut wizard = StructureWizard::new(date("2026-01-15"));
        let notices = feed(&mut wizard, &services, &["   "]);
        assert_eq!(notices.len(), 1);
        assert_eq!(wizard.prompt(), Phase::Description.prompt(wizard.result()));
    }
}
