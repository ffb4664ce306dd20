//! Greedy due-date recommender and overdue replanning
//!
//! Candidates are the unfinished, unblocked work items of active projects.
//! They are scored by due-date urgency (node due date, else the project's
//! target date) and the time budget is handed out in session-sized chunks
//! from the top of the list.

use std::collections::{HashMap, HashSet};

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{Dependency, Node, Project, ProjectStatus, WorkItem, WorkItemStatus};

/// Largest chunk handed to one item per recommendation
const MAX_CHUNK_MIN: u32 = 90;
/// Chunks smaller than this are skipped unless they finish the item
const MIN_CHUNK_MIN: u32 = 15;

/// One allocated work item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedItem {
    pub work_item_id: String,
    pub title: String,
    pub allocated_min: u32,
    pub score: f64,
    pub reasons: Vec<String>,
}

/// Result of spending a time budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// "catch_up" when something is overdue, else "due_first"
    pub mode: String,
    pub requested: u32,
    pub allocated: u32,
    pub unallocated: u32,
    pub items: Vec<RecommendedItem>,
    /// Human-readable reasons why otherwise eligible items were held back
    pub blockers: Vec<String>,
}

struct Candidate<'a> {
    item: &'a WorkItem,
    order: u32,
    due: Option<NaiveDate>,
    score: f64,
}

/// Spend `budget_min` minutes over the most urgent work
pub fn recommend(
    projects: &[Project],
    nodes: &[Node],
    items: &[WorkItem],
    deps: &[Dependency],
    budget_min: u32,
    today: NaiveDate,
) -> Recommendation {
    debug!(budget_min, %today, items = items.len(), "recommend: called");
    let active: HashMap<&str, &Project> = projects
        .iter()
        .filter(|p| p.status == ProjectStatus::Active && !p.is_archived())
        .map(|p| (p.id.as_str(), p))
        .collect();
    let node_by_id: HashMap<&str, &Node> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let unfinished = unfinished_ids(nodes, items);

    let mut blockers = Vec::new();
    let mut candidates = Vec::new();
    for item in items {
        let Some(project) = active.get(item.project_id.as_str()) else {
            continue;
        };
        let Some(node) = node_by_id.get(item.node_id.as_str()) else {
            continue;
        };
        if item.archived_at.is_some()
            || node.archived_at.is_some()
            || item.status == WorkItemStatus::Done
            || item.remaining_min() == 0
        {
            continue;
        }
        let waiting_on: Vec<&Dependency> = deps
            .iter()
            .filter(|d| (d.to_id == item.id || d.to_id == node.id) && unfinished.contains(d.from_id.as_str()))
            .collect();
        if let Some(dep) = waiting_on.first() {
            blockers.push(format!("{}: waiting on {}", item.title, title_of(&dep.from_id, nodes, items)));
            continue;
        }

        let due = node.due_date.or(project.target_date);
        candidates.push(Candidate {
            item,
            order: node.order_index,
            due,
            score: score(due, item.status, today),
        });
    }

    candidates.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.order.cmp(&b.order)));
    let overdue = candidates.iter().any(|c| c.due.is_some_and(|d| d < today));

    let mut left = budget_min;
    let mut picked = Vec::new();
    for candidate in &candidates {
        if left == 0 {
            break;
        }
        let remaining = candidate.item.remaining_min();
        let chunk = remaining.min(left).min(MAX_CHUNK_MIN);
        if chunk < MIN_CHUNK_MIN && chunk < remaining {
            continue;
        }
        left -= chunk;
        picked.push(RecommendedItem {
            work_item_id: candidate.item.id.clone(),
            title: candidate.item.title.clone(),
            allocated_min: chunk,
            score: candidate.score,
            reasons: reasons(candidate, remaining, today),
        });
    }

    let rec = Recommendation {
        mode: if overdue { "catch_up" } else { "due_first" }.to_string(),
        requested: budget_min,
        allocated: budget_min - left,
        unallocated: left,
        items: picked,
        blockers,
    };
    debug!(allocated = rec.allocated, items = rec.items.len(), "recommend: done");
    rec
}

fn score(due: Option<NaiveDate>, status: WorkItemStatus, today: NaiveDate) -> f64 {
    let mut score = match due {
        Some(due) => {
            let days = (due - today).num_days();
            if days < 0 {
                100.0 + (-days) as f64
            } else {
                100.0 / (1.0 + days as f64)
            }
        }
        None => 1.0,
    };
    if status == WorkItemStatus::InProgress {
        score += 5.0;
    }
    (score * 100.0).round() / 100.0
}

fn reasons(candidate: &Candidate<'_>, remaining: u32, today: NaiveDate) -> Vec<String> {
    let mut reasons = Vec::new();
    match candidate.due {
        Some(due) => {
            let days = (due - today).num_days();
            reasons.push(match days {
                d if d < 0 => format!("overdue by {} day(s)", -d),
                0 => "due today".to_string(),
                d => format!("due in {} day(s)", d),
            });
        }
        None => reasons.push("no due date".to_string()),
    }
    if candidate.item.status == WorkItemStatus::InProgress {
        reasons.push("already in progress".to_string());
    }
    reasons.push(format!("{} min remaining", remaining));
    reasons
}

/// IDs of work items not done plus nodes that still have such items
fn unfinished_ids<'a>(nodes: &'a [Node], items: &'a [WorkItem]) -> HashSet<&'a str> {
    let mut ids = HashSet::new();
    for item in items.iter().filter(|w| w.status != WorkItemStatus::Done && w.archived_at.is_none()) {
        ids.insert(item.id.as_str());
        if let Some(node) = nodes.iter().find(|n| n.id == item.node_id) {
            ids.insert(node.id.as_str());
        }
    }
    ids
}

fn title_of(id: &str, nodes: &[Node], items: &[WorkItem]) -> String {
    items
        .iter()
        .find(|w| w.id == id)
        .map(|w| w.title.clone())
        .or_else(|| nodes.iter().find(|n| n.id == id).map(|n| n.title.clone()))
        .unwrap_or_else(|| id.to_string())
}

/// A due-date move proposed by [`replan`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeShift {
    pub node_id: String,
    pub title: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Spread overdue, unfinished nodes of one project over the days left until
/// its target date (one per day from tomorrow when there is no usable target)
pub fn replan(project: &Project, nodes: &[Node], items: &[WorkItem], today: NaiveDate) -> Vec<NodeShift> {
    debug!(project = %project.short_code, %today, "replan: called");
    let unfinished = unfinished_ids(nodes, items);
    let mut overdue: Vec<&Node> = nodes
        .iter()
        .filter(|n| n.project_id == project.id && n.archived_at.is_none())
        .filter(|n| n.due_date.is_some_and(|d| d < today) && unfinished.contains(n.id.as_str()))
        .collect();
    overdue.sort_by_key(|n| n.order_index);

    let count = overdue.len() as u64;
    let span = project
        .target_date
        .map(|t| (t - today).num_days())
        .filter(|d| *d > 0)
        .map(|d| d as u64);
    overdue
        .into_iter()
        .enumerate()
        .filter_map(|(i, node)| {
            let k = i as u64 + 1;
            let offset = match span {
                Some(span) => (span * k / count).max(1),
                None => k,
            };
            Some(NodeShift {
                node_id: node.id.clone(),
                title: node.title.clone(),
                from: node.due_date?,
                to: today.checked_add_days(Days::new(offset))?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeKind, WorkItemType};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn project(target: Option<NaiveDate>) -> Project {
        Project {
            id: "p".to_string(),
            short_code: "P".to_string(),
            name: "Plan".to_string(),
            description: String::new(),
            status: ProjectStatus::Active,
            start_date: None,
            target_date: target,
            archived_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn node(id: &str, order: u32, due: Option<NaiveDate>) -> Node {
        Node {
            id: id.to_string(),
            project_id: "p".to_string(),
            parent_id: None,
            title: format!("Node {}", id),
            kind: NodeKind::Module,
            order_index: order,
            due_date: due,
            planned_min: None,
            archived_at: None,
        }
    }

    fn item(id: &str, node_id: &str, planned: u32) -> WorkItem {
        WorkItem {
            id: id.to_string(),
            project_id: "p".to_string(),
            node_id: node_id.to_string(),
            title: format!("Item {}", id),
            item_type: WorkItemType::Task,
            planned_min: planned,
            logged_min: 0,
            status: WorkItemStatus::Todo,
            archived_at: None,
        }
    }

    #[test]
    fn test_most_urgent_first_and_budget_respected() {
        let nodes = [node("n1", 1, Some(day(20))), node("n2", 2, Some(day(5)))];
        let items = [item("w1", "n1", 60), item("w2", "n2", 45)];
        let rec = recommend(&[project(None)], &nodes, &items, &[], 60, day(1));
        assert_eq!(rec.items[0].work_item_id, "w2");
        assert_eq!(rec.items[0].allocated_min, 45);
        assert_eq!(rec.allocated, 60);
        assert_eq!(rec.unallocated, 0);
        assert_eq!(rec.mode, "due_first");
    }

    #[test]
    fn test_blocked_items_reported() {
        let nodes = [node("n1", 1, None)];
        let items = [item("w1", "n1", 30), item("w2", "n1", 30)];
        let deps = [Dependency {
            id: "d".to_string(),
            project_id: "p".to_string(),
            from_id: "w1".to_string(),
            to_id: "w2".to_string(),
        }];
        let rec = recommend(&[project(None)], &nodes, &items, &deps, 120, day(1));
        assert_eq!(rec.items.len(), 1);
        assert_eq!(rec.blockers, vec!["Item w2: waiting on Item w1".to_string()]);
        assert_eq!(rec.unallocated, 90);
    }

    #[test]
    fn test_paused_projects_ignored() {
        let mut p = project(None);
        p.status = ProjectStatus::Paused;
        let rec = recommend(&[p], &[node("n1", 1, None)], &[item("w1", "n1", 30)], &[], 60, day(1));
        assert!(rec.items.is_empty());
        assert_eq!(rec.unallocated, 60);
    }

    #[test]
    fn test_overdue_sets_catch_up_mode() {
        let rec = recommend(
            &[project(None)],
            &[node("n1", 1, Some(day(1)))],
            &[item("w1", "n1", 30)],
            &[],
            60,
            day(3),
        );
        assert_eq!(rec.mode, "catch_up");
        assert!(rec.items[0].reasons[0].contains("overdue by 2"));
    }

    #[test]
    fn test_replan_spreads_overdue_nodes() {
        let nodes = [node("n1", 1, Some(day(1))), node("n2", 2, Some(day(2))), node("n3", 3, Some(day(30)))];
        let items = [item("w1", "n1", 30), item("w2", "n2", 30), item("w3", "n3", 30)];
        let shifts = replan(&project(Some(day(11))), &nodes, &items, day(5));
        assert_eq!(shifts.len(), 2);
        assert_eq!(shifts[0].to, day(8));
        assert_eq!(shifts[1].to, day(11));
    }
}
