//! Structure wizard answers and their compilation into an import schema

use std::fmt::Write as _;

use chrono::{Duration, NaiveDate};
use planstore::{ImportSchema, NodeKind, SchemaNode, SchemaProject, SchemaWorkItem, WorkItemType};
use tracing::debug;

/// A run of identically shaped nodes ("Chapter 1" .. "Chapter 12")
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpec {
    pub label: String,
    /// Always at least 1
    pub count: u32,
    pub kind: NodeKind,
    pub days_per_node: Option<u32>,
}

/// A work item added to every node of every group
#[derive(Debug, Clone, PartialEq)]
pub struct ItemTemplate {
    pub title: String,
    pub item_type: WorkItemType,
    pub planned_min: u32,
}

/// A one-off node appended after the groups (exam, review week, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct SpecialNode {
    pub title: String,
    pub kind: NodeKind,
    pub due: Option<NaiveDate>,
    pub work_items: Vec<ItemTemplate>,
}

/// Everything the structure wizard collected
#[derive(Debug, Clone, PartialEq)]
pub struct WizardResult {
    pub description: String,
    pub start_date: Option<NaiveDate>,
    pub deadline: Option<NaiveDate>,
    pub groups: Vec<GroupSpec>,
    pub templates: Vec<ItemTemplate>,
    pub specials: Vec<SpecialNode>,
    /// Start date when none was given
    pub created_on: NaiveDate,
}

impl WizardResult {
    pub fn new(created_on: NaiveDate) -> Self {
        Self {
            description: String::new(),
            start_date: None,
            deadline: None,
            groups: Vec::new(),
            templates: Vec::new(),
            specials: Vec::new(),
            created_on,
        }
    }

    pub fn effective_start(&self) -> NaiveDate {
        self.start_date.unwrap_or(self.created_on)
    }

    pub fn regular_node_count(&self) -> u32 {
        self.groups.iter().map(|g| g.count).sum()
    }

    /// Minutes per regular node
    pub fn template_budget(&self) -> u32 {
        self.templates.iter().map(|t| t.planned_min).sum()
    }
}

fn budget(minutes: u32) -> Option<u32> {
    (minutes > 0).then_some(minutes)
}

fn push_items(node_ref: &str, templates: &[ItemTemplate], work_items: &mut Vec<SchemaWorkItem>) {
    for template in templates {
        let item_ref = format!("w{}", work_items.len() + 1);
        work_items.push(SchemaWorkItem {
            ref_id: item_ref,
            node_ref: node_ref.to_string(),
            title: template.title.clone(),
            item_type: template.item_type,
            planned_min: template.planned_min,
        });
    }
}

/// Compile wizard answers into a schema; the same input always gives the same schema
pub fn compile(result: &WizardResult) -> ImportSchema {
    debug!(
        groups = result.groups.len(),
        templates = result.templates.len(),
        specials = result.specials.len(),
        "compile: called"
    );
    let start = result.effective_start();
    let regular_total = i64::from(result.regular_node_count());
    let span_days = result.deadline.map(|d| (d - start).num_days().max(0));
    let node_budget = budget(result.template_budget());

    let mut nodes = Vec::new();
    let mut work_items = Vec::new();
    let mut order = 0u32;
    let mut global_index = 0i64;
    let mut cursor = start;

    for group in &result.groups {
        for i in 1..=group.count {
            order += 1;
            global_index += 1;
            let due_date = match (group.days_per_node, span_days) {
                (Some(days), _) => {
                    cursor += Duration::days(i64::from(days));
                    Some(cursor)
                }
                (None, Some(span)) => Some(start + Duration::days(span * global_index / regular_total)),
                (None, None) => None,
            };
            let node_ref = format!("n{}", nodes.len() + 1);
            push_items(&node_ref, &result.templates, &mut work_items);
            nodes.push(SchemaNode {
                ref_id: node_ref,
                title: format!("{} {}", group.label, i),
                kind: group.kind,
                order,
                due_date,
                planned_min: node_budget,
                parent_ref: None,
            });
        }
    }

    for special in &result.specials {
        order += 1;
        let node_ref = format!("n{}", nodes.len() + 1);
        push_items(&node_ref, &special.work_items, &mut work_items);
        nodes.push(SchemaNode {
            ref_id: node_ref,
            title: special.title.clone(),
            kind: special.kind,
            order,
            due_date: special.due.or(result.deadline),
            planned_min: budget(special.work_items.iter().map(|w| w.planned_min).sum()),
            parent_ref: None,
        });
    }

    let description = result.description.trim();
    ImportSchema {
        project: SchemaProject {
            name: description.to_string(),
            short_code: None,
            description: description.to_string(),
            start_date: Some(start),
            target_date: result.deadline,
        },
        nodes,
        work_items,
        dependencies: Vec::new(),
        session_policy: Default::default(),
    }
}

/// Plain-language description of the plan, used to seed a draft conversation
pub fn summarize(result: &WizardResult) -> String {
    let mut out = format!(
        "Project \"{}\" starting {}",
        result.description.trim(),
        result.effective_start()
    );
    match result.deadline {
        Some(deadline) => {
            let _ = write!(out, " with a deadline of {}.", deadline);
        }
        None => out.push_str(" with no fixed deadline."),
    }
    for group in &result.groups {
        let _ = write!(
            out,
            " {} {} node(s) titled \"{} 1\" to \"{} {}\"",
            group.count, group.kind, group.label, group.label, group.count
        );
        match group.days_per_node {
            Some(days) => {
                let _ = write!(out, ", one every {} day(s).", days);
            }
            None => out.push('.'),
        }
    }
    if !result.templates.is_empty() {
        let items: Vec<String> = result
            .templates
            .iter()
            .map(|t| format!("{} ({}, {} min)", t.title, t.item_type, t.planned_min))
            .collect();
        let _ = write!(out, " Each of those nodes gets: {}.", items.join(", "));
    }
    for special in &result.specials {
        let _ = write!(out, " Special {} \"{}\"", special.kind, special.title);
        if let Some(due) = special.due {
            let _ = write!(out, " due {}", due);
        }
        if !special.work_items.is_empty() {
            let items: Vec<String> = special
                .work_items
                .iter()
                .map(|t| format!("{} ({} min)", t.title, t.planned_min))
                .collect();
            let _ = write!(out, " with {}", items.join(", "));
        }
        out.push('.');
    }
    out
}
