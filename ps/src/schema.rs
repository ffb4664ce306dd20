//! Import schema: the portable description of a whole project plan
//!
//! A schema is what the guided wizard compiles, what the draft conversation
//! refines, and what `project import` reads from disk. Nodes and work items
//! refer to each other through schema-local `ref` strings which are mapped
//! to real IDs on import.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{NodeKind, Project, WorkItemType};

/// Project header of an import schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SchemaProject {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_code: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
}

/// A node in an import schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaNode {
    #[serde(rename = "ref")]
    pub ref_id: String,
    pub title: String,
    #[serde(default)]
    pub kind: NodeKind,
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planned_min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_ref: Option<String>,
}

/// A work item in an import schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaWorkItem {
    #[serde(rename = "ref")]
    pub ref_id: String,
    pub node_ref: String,
    pub title: String,
    #[serde(rename = "type", default)]
    pub item_type: WorkItemType,
    pub planned_min: u32,
}

/// Ordering edge: `to_ref` cannot start before `from_ref` is done
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDependency {
    pub from_ref: String,
    pub to_ref: String,
}

/// Preferred session lengths in minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPolicy {
    #[serde(rename = "min")]
    pub min_min: u32,
    #[serde(rename = "default")]
    pub default_min: u32,
    #[serde(rename = "max")]
    pub max_min: u32,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            min_min: 15,
            default_min: 30,
            max_min: 90,
        }
    }
}

/// A complete project plan ready for validation and import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ImportSchema {
    pub project: SchemaProject,
    #[serde(default)]
    pub nodes: Vec<SchemaNode>,
    #[serde(default)]
    pub work_items: Vec<SchemaWorkItem>,
    #[serde(default)]
    pub dependencies: Vec<SchemaDependency>,
    #[serde(default)]
    pub session_policy: SessionPolicy,
}

impl ImportSchema {
    /// Parse a schema from JSON text
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        debug!(len = text.len(), "ImportSchema::from_json: called");
        serde_json::from_str(text)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Sum of planned minutes over all work items
    pub fn total_planned_min(&self) -> u32 {
        self.work_items.iter().map(|w| w.planned_min).sum()
    }
}

/// Outcome of importing a schema
#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    pub project: Project,
    pub node_count: usize,
    pub work_item_count: usize,
    pub dependency_count: usize,
}

/// Validate a schema, returning one message per problem (empty when valid)
pub fn validate_schema(schema: &ImportSchema) -> Vec<String> {
    debug!(
        nodes = schema.nodes.len(),
        work_items = schema.work_items.len(),
        "validate_schema: called"
    );
    let mut errors = Vec::new();

    if schema.project.name.trim().is_empty() {
        errors.push("project.name must not be empty".to_string());
    }
    if let Some(code) = &schema.project.short_code
        && (code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()))
    {
        errors.push(format!("project.short_code '{}' must be non-empty and alphanumeric", code));
    }
    if let (Some(start), Some(target)) = (schema.project.start_date, schema.project.target_date)
        && start > target
    {
        errors.push(format!("project.start_date {} is after target_date {}", start, target));
    }

    let mut node_refs = HashSet::new();
    for node in &schema.nodes {
        if node.ref_id.trim().is_empty() {
            errors.push(format!("node '{}' has an empty ref", node.title));
        } else if !node_refs.insert(node.ref_id.as_str()) {
            errors.push(format!("duplicate node ref '{}'", node.ref_id));
        }
        if node.title.trim().is_empty() {
            errors.push(format!("node '{}' has an empty title", node.ref_id));
        }
    }
    for node in &schema.nodes {
        if let Some(parent) = &node.parent_ref {
            if parent == &node.ref_id {
                errors.push(format!("node '{}' is its own parent", node.ref_id));
            } else if !node_refs.contains(parent.as_str()) {
                errors.push(format!("node '{}' has unknown parent_ref '{}'", node.ref_id, parent));
            }
        }
    }

    let mut item_refs = HashSet::new();
    for item in &schema.work_items {
        if item.ref_id.trim().is_empty() {
            errors.push(format!("work item '{}' has an empty ref", item.title));
        } else if node_refs.contains(item.ref_id.as_str()) || !item_refs.insert(item.ref_id.as_str()) {
            errors.push(format!("duplicate work item ref '{}'", item.ref_id));
        }
        if item.title.trim().is_empty() {
            errors.push(format!("work item '{}' has an empty title", item.ref_id));
        }
        if !node_refs.contains(item.node_ref.as_str()) {
            errors.push(format!("work item '{}' has unknown node_ref '{}'", item.ref_id, item.node_ref));
        }
        if item.planned_min == 0 {
            errors.push(format!("work item '{}' must have planned_min > 0", item.ref_id));
        }
    }

    for dep in &schema.dependencies {
        for r in [&dep.from_ref, &dep.to_ref] {
            if !node_refs.contains(r.as_str()) && !item_refs.contains(r.as_str()) {
                errors.push(format!("dependency references unknown ref '{}'", r));
            }
        }
        if dep.from_ref == dep.to_ref {
            errors.push(format!("dependency '{}' depends on itself", dep.from_ref));
        }
    }

    let policy = schema.session_policy;
    if policy.min_min == 0 || policy.min_min > policy.default_min || policy.default_min > policy.max_min {
        errors.push(format!(
            "session_policy must satisfy 0 < min <= default <= max (got {}/{}/{})",
            policy.min_min, policy.default_min, policy.max_min
        ));
    }

    debug!(count = errors.len(), "validate_schema: done");
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ImportSchema {
        ImportSchema {
            project: SchemaProject {
                name: "Thesis".to_string(),
                ..Default::default()
            },
            nodes: vec![SchemaNode {
                ref_id: "n1".to_string(),
                title: "Chapter 1".to_string(),
                kind: NodeKind::Chapter,
                order: 1,
                due_date: None,
                planned_min: Some(60),
                parent_ref: None,
            }],
            work_items: vec![SchemaWorkItem {
                ref_id: "w1".to_string(),
                node_ref: "n1".to_string(),
                title: "Draft".to_string(),
                item_type: WorkItemType::Writing,
                planned_min: 60,
            }],
            dependencies: vec![],
            session_policy: SessionPolicy::default(),
        }
    }

    #[test]
    fn test_valid_schema_has_no_errors() {
        assert!(validate_schema(&sample()).is_empty());
    }

    #[test]
    fn test_unknown_node_ref() {
        let mut schema = sample();
        schema.work_items[0].node_ref = "n9".to_string();
        let errors = validate_schema(&schema);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("n9"));
    }

    #[test]
    fn test_dates_out_of_order() {
        let mut schema = sample();
        schema.project.start_date = NaiveDate::from_ymd_opt(2026, 5, 1);
        schema.project.target_date = NaiveDate::from_ymd_opt(2026, 4, 1);
        assert!(validate_schema(&schema).iter().any(|e| e.contains("after target_date")));
    }

    #[test]
    fn test_duplicate_refs_and_bad_dependency() {
        let mut schema = sample();
        schema.nodes.push(schema.nodes[0].clone());
        schema.dependencies.push(SchemaDependency {
            from_ref: "w1".to_string(),
            to_ref: "zz".to_string(),
        });
        let errors = validate_schema(&schema);
        assert!(errors.iter().any(|e| e.contains("duplicate node ref 'n1'")));
        assert!(errors.iter().any(|e| e.contains("unknown ref 'zz'")));
    }

    #[test]
    fn test_json_uses_ref_and_type_keys() {
        let json = sample().to_json_pretty().unwrap();
        assert!(json.contains("\"ref\": \"n1\""));
        assert!(json.contains("\"type\": \"writing\""));
        let parsed = ImportSchema::from_json(&json).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn test_session_policy_defaults_when_missing() {
        let parsed = ImportSchema::from_json(r#"{"project": {"name": "X"}}"#).unwrap();
        assert_eq!(parsed.session_policy, SessionPolicy::default());
        assert!(parsed.nodes.is_empty());
    }
}
