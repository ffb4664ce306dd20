//! Plain-text formatting of collaborator results
//!
//! Output is uncolored so the same text can go to the TUI transcript, the
//! line shell and one-shot commands.

use std::collections::HashMap;
use std::fmt::Write as _;

use planstore::{
    ImportReport, Node, NodeShift, Project, ProjectSummary, Recommendation, Template, WorkItem, WorkItemStatus,
    WorkSession,
};

use crate::resolve::short_id;

/// "1h 45m" style duration
pub fn minutes(total: u32) -> String {
    match (total / 60, total % 60) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h {}m", h, m),
    }
}

fn status_mark(status: WorkItemStatus) -> &'static str {
    match status {
        WorkItemStatus::Todo => "[ ]",
        WorkItemStatus::InProgress => "[~]",
        WorkItemStatus::Done => "[x]",
    }
}

pub fn recommendation(rec: &Recommendation) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Plan for {} ({} mode): {} allocated, {} unallocated",
        minutes(rec.requested),
        rec.mode,
        minutes(rec.allocated),
        minutes(rec.unallocated)
    );
    if rec.items.is_empty() {
        out.push_str("  Nothing to work on right now.\n");
    }
    for (i, item) in rec.items.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {}. {:<40} {:>7}  [{}]",
            i + 1,
            item.title,
            minutes(item.allocated_min),
            short_id(&item.work_item_id)
        );
        if !item.reasons.is_empty() {
            let _ = writeln!(out, "     {}", item.reasons.join("; "));
        }
    }
    if !rec.blockers.is_empty() {
        out.push_str("Blocked:\n");
        for blocker in &rec.blockers {
            let _ = writeln!(out, "  - {}", blocker);
        }
    }
    out.trim_end().to_string()
}

pub fn status(summaries: &[ProjectSummary]) -> String {
    if summaries.is_empty() {
        return "No projects.".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<6} {:<28} {:>9} {:>9} {:>5}  {}",
        "CODE", "NAME", "PLANNED", "LOGGED", "DONE", "RISK"
    );
    for s in summaries {
        let _ = writeln!(
            out,
            "{:<6} {:<28} {:>9} {:>9} {:>4}%  {}",
            s.short_code,
            truncate(&s.name, 28),
            minutes(s.planned_min),
            minutes(s.logged_min),
            s.progress_pct(),
            s.risk
        );
    }
    out.trim_end().to_string()
}

pub fn projects(projects: &[Project]) -> String {
    if projects.is_empty() {
        return "No projects. Create one with `project add <name>` or `project init`.".to_string();
    }
    let mut out = String::new();
    for p in projects {
        let target = p
            .target_date
            .map(|d| format!(" due {}", d))
            .unwrap_or_default();
        let _ = writeln!(out, "{:<6} {:<32} {}{}", p.short_code, truncate(&p.name, 32), p.status, target);
    }
    out.trim_end().to_string()
}

pub fn project_detail(project: &Project) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", project.name, project.short_code);
    let _ = writeln!(out, "  id:      {}", project.id);
    let _ = writeln!(out, "  status:  {}", project.status);
    if !project.description.is_empty() {
        let _ = writeln!(out, "  about:   {}", project.description);
    }
    if let Some(start) = project.start_date {
        let _ = writeln!(out, "  start:   {}", start);
    }
    if let Some(target) = project.target_date {
        let _ = writeln!(out, "  target:  {}", target);
    }
    out.trim_end().to_string()
}

/// Indented node / work-item tree of one project
pub fn tree(project: &Project, nodes: &[Node], items: &[WorkItem]) -> String {
    let mut out = format!("{} ({})\n", project.name, project.short_code);
    if nodes.is_empty() {
        out.push_str("  (empty)");
        return out;
    }

    let mut children: HashMap<Option<&str>, Vec<&Node>> = HashMap::new();
    for node in nodes {
        children.entry(node.parent_id.as_deref()).or_default().push(node);
    }
    for list in children.values_mut() {
        list.sort_by_key(|n| n.order_index);
    }
    let mut by_node: HashMap<&str, Vec<&WorkItem>> = HashMap::new();
    for item in items {
        by_node.entry(item.node_id.as_str()).or_default().push(item);
    }

    // Nodes whose parent is missing or archived still show at the top level
    let known: std::collections::HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let mut roots: Vec<&Node> = nodes
        .iter()
        .filter(|n| n.parent_id.as_deref().is_none_or(|p| !known.contains(p)))
        .collect();
    roots.sort_by_key(|n| n.order_index);

    let mut stack: Vec<(&Node, usize)> = roots.into_iter().rev().map(|n| (n, 1)).collect();
    while let Some((node, depth)) = stack.pop() {
        let indent = "  ".repeat(depth);
        let due = node.due_date.map(|d| format!(" due {}", d)).unwrap_or_default();
        let _ = writeln!(
            out,
            "{}{} [{}]{} ({})",
            indent,
            node.title,
            node.kind,
            due,
            short_id(&node.id)
        );
        for item in by_node.get(node.id.as_str()).into_iter().flatten() {
            let _ = writeln!(
                out,
                "{}  {} {} {}/{} ({})",
                indent,
                status_mark(item.status),
                item.title,
                minutes(item.logged_min),
                minutes(item.planned_min),
                short_id(&item.id)
            );
        }
        if let Some(kids) = children.get(&Some(node.id.as_str())) {
            for kid in kids.iter().rev() {
                stack.push((kid, depth + 1));
            }
        }
    }
    out.trim_end().to_string()
}

pub fn nodes(nodes: &[Node]) -> String {
    if nodes.is_empty() {
        return "No nodes.".to_string();
    }
    let mut out = String::new();
    for n in nodes {
        let due = n.due_date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:>3}. {:<32} {:<10} {:<10} {}",
            n.order_index,
            truncate(&n.title, 32),
            n.kind.as_str(),
            due,
            short_id(&n.id)
        );
    }
    out.trim_end().to_string()
}

pub fn work_items(items: &[WorkItem]) -> String {
    if items.is_empty() {
        return "No work items.".to_string();
    }
    let mut out = String::new();
    for w in items {
        let _ = writeln!(
            out,
            "{} {:<36} {:<10} {:>7}/{:<7} {}",
            status_mark(w.status),
            truncate(&w.title, 36),
            w.item_type.as_str(),
            minutes(w.logged_min),
            minutes(w.planned_min),
            short_id(&w.id)
        );
    }
    out.trim_end().to_string()
}

pub fn sessions(sessions: &[WorkSession]) -> String {
    if sessions.is_empty() {
        return "No sessions logged.".to_string();
    }
    let mut out = String::new();
    for s in sessions {
        let when = chrono::DateTime::from_timestamp_millis(s.started_at)
            .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "?".to_string());
        let _ = writeln!(
            out,
            "{}  {:>7}  work {}  {}  {}",
            when,
            minutes(s.minutes),
            short_id(&s.work_item_id),
            s.note.as_deref().unwrap_or(""),
            short_id(&s.id)
        );
    }
    out.trim_end().to_string()
}

pub fn templates(templates: &[Template]) -> String {
    if templates.is_empty() {
        return "No templates saved.".to_string();
    }
    let mut out = String::new();
    for t in templates {
        let _ = writeln!(
            out,
            "{:<24} {} nodes, {} work items",
            t.name,
            t.schema.nodes.len(),
            t.schema.work_items.len()
        );
    }
    out.trim_end().to_string()
}

pub fn import_report(report: &ImportReport) -> String {
    format!(
        "Imported {} ({}): {} nodes, {} work items, {} dependencies",
        report.project.name,
        report.project.short_code,
        report.node_count,
        report.work_item_count,
        report.dependency_count
    )
}

pub fn shifts(shifts: &[NodeShift]) -> String {
    if shifts.is_empty() {
        return "Nothing overdue; no changes.".to_string();
    }
    let mut out = format!("Moved {} overdue node(s):\n", shifts.len());
    for s in shifts {
        let _ = writeln!(out, "  {:<32} {} -> {}", truncate(&s.title, 32), s.from, s.to);
    }
    out.trim_end().to_string()
}

/// Schema validation errors as a bulleted block
pub fn validation_errors(errors: &[String]) -> String {
    let mut out = format!("Schema has {} problem(s):", errors.len());
    for e in errors {
        let _ = write!(out, "\n  - {}", e);
    }
    out
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use planstore::{NodeKind, ProjectStatus, RecommendedItem, RiskLevel, WorkItemType};

    fn project() -> Project {
        Project {
            id: "p1".to_string(),
            short_code: "PSP".to_string(),
            name: "Physics Study Plan".to_string(),
            description: String::new(),
            status: ProjectStatus::Active,
            start_date: None,
            target_date: None,
            archived_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn node(id: &str, parent: Option<&str>, order: u32) -> Node {
        Node {
            id: id.to_string(),
            project_id: "p1".to_string(),
            parent_id: parent.map(str::to_string),
            title: format!("Node {}", id),
            kind: NodeKind::Chapter,
            order_index: order,
            due_date: None,
            planned_min: None,
            archived_at: None,
        }
    }

    #[test]
    fn test_minutes() {
        assert_eq!(minutes(0), "0m");
        assert_eq!(minutes(45), "45m");
        assert_eq!(minutes(60), "1h");
        assert_eq!(minutes(105), "1h 45m");
    }

    #[test]
    fn test_recommendation_lists_items_and_blockers() {
        let rec = Recommendation {
            mode: "due_first".to_string(),
            requested: 60,
            allocated: 45,
            unallocated: 15,
            items: vec![RecommendedItem {
                work_item_id: "0190-abcdef12".to_string(),
                title: "Read chapter 1".to_string(),
                allocated_min: 45,
                score: 2.0,
                reasons: vec!["due in 3 days".to_string()],
            }],
            blockers: vec!["Lab: waiting on Read chapter 1".to_string()],
        };
        let text = recommendation(&rec);
        assert!(text.contains("Read chapter 1"));
        assert!(text.contains("abcdef12"));
        assert!(text.contains("Blocked:"));
        assert!(text.contains("due in 3 days"));
    }

    #[test]
    fn test_status_table() {
        let text = status(&[ProjectSummary {
            id: "p1".to_string(),
            short_code: "PSP".to_string(),
            name: "Physics".to_string(),
            planned_min: 120,
            logged_min: 60,
            risk: RiskLevel::Medium,
        }]);
        assert!(text.contains("PSP"));
        assert!(text.contains("50%"));
        assert!(text.contains("medium"));
        assert_eq!(status(&[]), "No projects.");
    }

    #[test]
    fn test_tree_nests_children_in_order() {
        let nodes = vec![node("b", None, 2), node("a", None, 1), node("a1", Some("a"), 3)];
        let items = vec![WorkItem {
            id: "w1".to_string(),
            project_id: "p1".to_string(),
            node_id: "a1".to_string(),
            title: "Problems".to_string(),
            item_type: WorkItemType::Practice,
            planned_min: 45,
            logged_min: 0,
            status: WorkItemStatus::Todo,
            archived_at: None,
        }];
        let text = tree(&project(), &nodes, &items);
        let a = text.find("Node a ").unwrap();
        let a1 = text.find("Node a1").unwrap();
        let problems = text.find("Problems").unwrap();
        let b = text.find("Node b").unwrap();
        assert!(a < a1 && a1 < problems && problems < b);
        assert!(text.contains("    Node a1"));
    }

    #[test]
    fn test_truncate_long_names() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 5), "abcd…");
    }
}
