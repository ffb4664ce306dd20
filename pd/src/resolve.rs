//! Turning user-typed references into records
//!
//! Projects resolve by short code, id or unique prefix. Nodes and work items
//! resolve by id, unique prefix or unique suffix; suffixes matter because
//! time-ordered ids created together share long prefixes and the shell shows
//! the last eight characters.

use planstore::{Node, Project, WorkItem, WorkSession};
use tracing::debug;

use crate::error::ResolveError;
use crate::services::Repository;

/// Characters of an id the shell displays
pub const SHORT_ID_LEN: usize = 8;

/// Shortest reference tried as an id prefix or suffix
pub const MIN_PARTIAL_ID: usize = 4;

/// Display form of a record id
pub fn short_id(id: &str) -> &str {
    let start = id
        .char_indices()
        .rev()
        .nth(SHORT_ID_LEN - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &id[start..]
}

/// Resolve a project reference, archived projects included
///
/// Order: exact short code (case-insensitive), exact id, then a unique
/// prefix of either id or short code.
pub fn resolve_project(repo: &dyn Repository, reference: &str) -> Result<Project, ResolveError> {
    debug!(%reference, "resolve_project: called");
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(ResolveError::InvalidArgument("project reference is empty".to_string()));
    }
    let projects = repo.list_projects(true)?;

    if let Some(p) = projects.iter().find(|p| p.short_code.eq_ignore_ascii_case(reference)) {
        debug!(id = %p.id, "resolve_project: short code match");
        return Ok(p.clone());
    }
    if let Some(p) = projects.iter().find(|p| p.id == reference) {
        debug!("resolve_project: exact id match");
        return Ok(p.clone());
    }

    let lower = reference.to_lowercase();
    let matches: Vec<&Project> = projects
        .iter()
        .filter(|p| p.id.starts_with(&lower) || p.short_code.to_lowercase().starts_with(&lower))
        .collect();
    match matches.as_slice() {
        [] => Err(ResolveError::NotFound {
            kind: "project",
            reference: reference.to_string(),
        }),
        [one] => Ok((*one).clone()),
        many => {
            debug!(count = many.len(), "resolve_project: ambiguous");
            Err(ResolveError::Ambiguous {
                kind: "project",
                reference: reference.to_string(),
                count: many.len(),
            })
        }
    }
}

/// Resolve a work item, optionally within one project
pub fn resolve_work_item(
    repo: &dyn Repository,
    reference: &str,
    project_id: Option<&str>,
) -> Result<WorkItem, ResolveError> {
    debug!(%reference, ?project_id, "resolve_work_item: called");
    let items = repo.list_work_items(project_id, true)?;
    pick_by_id(items, reference, "work item", |w| w.id.as_str())
}

/// Resolve a node within one project
pub fn resolve_node(repo: &dyn Repository, reference: &str, project_id: &str) -> Result<Node, ResolveError> {
    debug!(%reference, %project_id, "resolve_node: called");
    let nodes = repo.list_nodes(project_id, true)?;
    pick_by_id(nodes, reference, "node", |n| n.id.as_str())
}

/// Resolve a node in any project
pub fn resolve_node_anywhere(repo: &dyn Repository, reference: &str) -> Result<Node, ResolveError> {
    debug!(%reference, "resolve_node_anywhere: called");
    let mut nodes = Vec::new();
    for project in repo.list_projects(true)? {
        nodes.extend(repo.list_nodes(&project.id, true)?);
    }
    pick_by_id(nodes, reference, "node", |n| n.id.as_str())
}

/// Resolve a logged work session
pub fn resolve_session(repo: &dyn Repository, reference: &str) -> Result<WorkSession, ResolveError> {
    debug!(%reference, "resolve_session: called");
    let sessions = repo.list_sessions(None)?;
    pick_by_id(sessions, reference, "session", |s| s.id.as_str())
}

fn pick_by_id<T>(
    records: Vec<T>,
    reference: &str,
    kind: &'static str,
    id_of: impl Fn(&T) -> &str,
) -> Result<T, ResolveError> {
    let reference = reference.trim();
    let not_found = || ResolveError::NotFound {
        kind,
        reference: reference.to_string(),
    };
    if reference.is_empty() {
        return Err(not_found());
    }
    let lower = reference.to_lowercase();
    let partial = reference.chars().count() >= MIN_PARTIAL_ID;

    let mut exact = None;
    let mut prefixed = Vec::new();
    let mut suffixed = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        let id = id_of(record);
        if id == reference {
            exact = Some(idx);
            break;
        }
        if !partial {
            continue;
        }
        if id.starts_with(&lower) {
            prefixed.push(idx);
        }
        if id.ends_with(&lower) {
            suffixed.push(idx);
        }
    }

    let chosen = match (exact, prefixed.as_slice(), suffixed.as_slice()) {
        (Some(idx), _, _) => idx,
        (None, [idx], _) => *idx,
        (None, [], [idx]) => *idx,
        (None, [], []) => return Err(not_found()),
        (None, p, s) => {
            let count = p.len().max(s.len());
            debug!(%kind, count, "pick_by_id: ambiguous");
            return Err(ResolveError::Ambiguous {
                kind,
                reference: reference.to_string(),
                count,
            });
        }
    };
    records.into_iter().nth(chosen).ok_or_else(not_found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{add_project, temp_services};
    use planstore::{NodeKind, WorkItemType};

    #[test]
    fn test_short_id_takes_last_eight() {
        assert_eq!(short_id("0190abcd-1234-7000-8000-00000000abcd"), "0000abcd");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_resolve_project_by_code_case_insensitive() {
        let (_dir, services) = temp_services();
        let p = add_project(&services, "Physics Study Plan");
        let found = resolve_project(services.repo.as_ref(), "psp").unwrap();
        assert_eq!(found.id, p.id);
    }

    #[test]
    fn test_resolve_project_by_exact_id_and_prefix() {
        let (_dir, services) = temp_services();
        let p = add_project(&services, "Garden");
        assert_eq!(resolve_project(services.repo.as_ref(), &p.id).unwrap().id, p.id);
        // "GAR" short code prefix
        assert_eq!(resolve_project(services.repo.as_ref(), "ga").unwrap().id, p.id);
    }

    #[test]
    fn test_resolve_project_ambiguous_reports_count() {
        let (_dir, services) = temp_services();
        add_project(&services, "Alpha Plan");
        add_project(&services, "Alpha Project");
        // Short codes AP and AP2; "a" prefixes both
        match resolve_project(services.repo.as_ref(), "a") {
            Err(ResolveError::Ambiguous { count, .. }) => assert_eq!(count, 2),
            other => panic!("expected ambiguity, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_project_not_found() {
        let (_dir, services) = temp_services();
        add_project(&services, "Garden");
        assert!(matches!(
            resolve_project(services.repo.as_ref(), "zzz"),
            Err(ResolveError::NotFound { kind: "project", .. })
        ));
    }

    #[test]
    fn test_resolve_project_includes_archived() {
        let (_dir, services) = temp_services();
        let p = add_project(&services, "Old Work");
        services.repo.archive_project(&p.id).unwrap();
        assert_eq!(resolve_project(services.repo.as_ref(), "OW").unwrap().id, p.id);
    }

    #[test]
    fn test_resolve_work_item_by_suffix() {
        let (_dir, services) = temp_services();
        let p = add_project(&services, "Garden");
        let node = services
            .repo
            .add_node(&p.id, None, "Beds", NodeKind::Module, None)
            .unwrap();
        let a = services
            .repo
            .add_work_item(&node.id, "Dig", WorkItemType::Task, 30)
            .unwrap();
        services
            .repo
            .add_work_item(&node.id, "Plant", WorkItemType::Task, 30)
            .unwrap();

        let found = resolve_work_item(services.repo.as_ref(), short_id(&a.id), Some(&p.id)).unwrap();
        assert_eq!(found.id, a.id);
        let found = resolve_node(services.repo.as_ref(), short_id(&node.id), &p.id).unwrap();
        assert_eq!(found.id, node.id);
    }

    #[test]
    fn test_pick_by_id_prefers_exact() {
        let records = vec!["abc".to_string(), "abcd".to_string()];
        let picked = pick_by_id(records, "abc", "thing", |s| s.as_str()).unwrap();
        assert_eq!(picked, "abc");
    }

    #[test]
    fn test_pick_by_id_ambiguous_prefix() {
        let records = vec!["abcd1".to_string(), "abcd2".to_string()];
        assert!(matches!(
            pick_by_id(records, "abcd", "thing", |s| s.as_str()),
            Err(ResolveError::Ambiguous { count: 2, .. })
        ));
    }

    #[test]
    fn test_pick_by_id_short_reference_needs_exact_match() {
        let records = vec!["0190-aaaa-0002".to_string(), "0190-aaaa-0003".to_string()];
        assert!(matches!(
            pick_by_id(records.clone(), "2", "thing", |s| s.as_str()),
            Err(ResolveError::NotFound { .. })
        ));
        assert_eq!(pick_by_id(records, "0002", "thing", |s| s.as_str()).unwrap(), "0190-aaaa-0002");
    }
}
