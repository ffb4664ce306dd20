//! Collaborator seams
//!
//! The session engine never touches storage, scheduling or the LLM directly.
//! It talks to the narrow traits below, bundled in [`Services`]. The
//! reference implementations are backed by a [`planstore::Store`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use planstore::{
    ImportReport, ImportSchema, Node, NodeKind, NodeShift, NodeUpdate, Project, ProjectSummary, ProjectUpdate,
    Recommendation, SchemaProject, Store, StoreError, Template, WorkItem, WorkItemStatus, WorkItemType,
    WorkItemUpdate, WorkSession,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::NlError;
use crate::intent::{AskResolution, IntentKind};

/// Persistence: projects, nodes, work items, sessions and templates
pub trait Repository: Send + Sync {
    fn list_projects(&self, include_archived: bool) -> Result<Vec<Project>, StoreError>;
    fn get_project(&self, id: &str) -> Result<Option<Project>, StoreError>;
    fn create_project(&self, header: &SchemaProject) -> Result<Project, StoreError>;
    fn update_project(&self, id: &str, update: &ProjectUpdate) -> Result<Project, StoreError>;
    /// Sets status archived and stamps `archived_at`
    fn archive_project(&self, id: &str) -> Result<Project, StoreError>;
    fn unarchive_project(&self, id: &str) -> Result<Project, StoreError>;
    fn delete_project(&self, id: &str) -> Result<(), StoreError>;

    fn list_nodes(&self, project_id: &str, include_archived: bool) -> Result<Vec<Node>, StoreError>;
    fn add_node(
        &self,
        project_id: &str,
        parent_id: Option<&str>,
        title: &str,
        kind: NodeKind,
        due_date: Option<NaiveDate>,
    ) -> Result<Node, StoreError>;
    fn update_node(&self, id: &str, update: &NodeUpdate) -> Result<Node, StoreError>;
    fn archive_node(&self, id: &str) -> Result<Node, StoreError>;
    fn unarchive_node(&self, id: &str) -> Result<Node, StoreError>;
    fn delete_node(&self, id: &str) -> Result<(), StoreError>;

    fn list_work_items(&self, project_id: Option<&str>, include_archived: bool) -> Result<Vec<WorkItem>, StoreError>;
    fn get_work_item(&self, id: &str) -> Result<Option<WorkItem>, StoreError>;
    fn add_work_item(
        &self,
        node_id: &str,
        title: &str,
        item_type: WorkItemType,
        planned_min: u32,
    ) -> Result<WorkItem, StoreError>;
    fn update_work_item(&self, id: &str, update: &WorkItemUpdate) -> Result<WorkItem, StoreError>;
    fn set_work_item_status(&self, id: &str, status: WorkItemStatus) -> Result<WorkItem, StoreError>;
    fn archive_work_item(&self, id: &str) -> Result<WorkItem, StoreError>;
    fn unarchive_work_item(&self, id: &str) -> Result<WorkItem, StoreError>;
    fn delete_work_item(&self, id: &str) -> Result<(), StoreError>;

    fn log_session(&self, work_item_id: &str, minutes: u32, note: Option<&str>) -> Result<WorkSession, StoreError>;
    fn list_sessions(&self, work_item_id: Option<&str>) -> Result<Vec<WorkSession>, StoreError>;
    fn delete_session(&self, id: &str) -> Result<(), StoreError>;

    fn list_templates(&self) -> Result<Vec<Template>, StoreError>;
    fn get_template(&self, name_or_id: &str) -> Result<Option<Template>, StoreError>;
    fn save_template(&self, name: &str, schema: &ImportSchema) -> Result<Template, StoreError>;
    fn delete_template(&self, name_or_id: &str) -> Result<(), StoreError>;
}

/// Scheduling: what to work on, and moving overdue work
pub trait Recommender: Send + Sync {
    fn recommend(&self, budget_min: u32) -> Result<Recommendation, StoreError>;
    /// Propose and apply new due dates for overdue nodes of one project
    fn replan(&self, project_id: &str) -> Result<Vec<NodeShift>, StoreError>;
}

/// Planned/logged summaries, optionally scoped to one project id
pub trait StatusService: Send + Sync {
    fn status(&self, scope: Option<&str>) -> Result<Vec<ProjectSummary>, StoreError>;
}

/// Schema validation and import
pub trait SchemaService: Send + Sync {
    fn validate(&self, schema: &ImportSchema) -> Vec<String>;
    fn import(&self, schema: &ImportSchema) -> Result<ImportReport, StoreError>;
}

/// What the NL collaborator knows about the session when parsing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntentContext {
    pub active_project: Option<String>,
    pub project_codes: Vec<String>,
    pub today: Option<NaiveDate>,
}

/// Where a draft conversation stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    /// More information needed; keep forwarding user lines
    Gathering,
    /// A complete draft is available for accept / edit / cancel
    Ready,
}

/// One reply in a draft conversation
#[derive(Debug, Clone, PartialEq)]
pub struct DraftTurn {
    pub conversation_id: String,
    pub status: DraftStatus,
    pub message: String,
    pub draft: Option<ImportSchema>,
}

/// Natural-language collaborator (LLM-backed)
#[async_trait]
pub trait NlService: Send + Sync {
    /// Turn free text into an intent plus an execution state
    async fn parse_intent(&self, text: &str, context: &IntentContext) -> Result<AskResolution, NlError>;

    /// Rewrite deterministic facts into a friendly explanation
    async fn explain(&self, kind: &IntentKind, facts: &str) -> Result<String, NlError>;

    /// Answer a help-chat question; `history` holds earlier (question, answer) pairs
    async fn answer(&self, question: &str, history: &[(String, String)]) -> Result<String, NlError>;

    async fn start_draft(&self, text: &str, seed: Option<&ImportSchema>) -> Result<DraftTurn, NlError>;

    async fn next_draft_turn(&self, conversation_id: &str, text: &str) -> Result<DraftTurn, NlError>;

    /// Forget a draft conversation once it is accepted or cancelled
    fn end_draft(&self, _conversation_id: &str) {}
}

/// Every collaborator the engine needs, cheap to clone into tasks
#[derive(Clone)]
pub struct Services {
    pub repo: Arc<dyn Repository>,
    pub recommender: Arc<dyn Recommender>,
    pub status: Arc<dyn StatusService>,
    pub schema: Arc<dyn SchemaService>,
    /// Absent when the LLM is disabled or unconfigured
    pub nl: Option<Arc<dyn NlService>>,
}

impl Services {
    /// Wire every collaborator to one store
    pub fn from_store(store: Store, nl: Option<Arc<dyn NlService>>) -> Self {
        debug!(path = %store.path().display(), has_nl = nl.is_some(), "Services::from_store: called");
        let backend = Arc::new(StoreBackend {
            store: Arc::new(store),
        });
        Self {
            repo: backend.clone(),
            recommender: backend.clone(),
            status: backend.clone(),
            schema: backend,
            nl,
        }
    }

    pub fn has_nl(&self) -> bool {
        self.nl.is_some()
    }
}

/// Reference collaborators over a [`Store`]
pub struct StoreBackend {
    store: Arc<Store>,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

impl Repository for StoreBackend {
    fn list_projects(&self, include_archived: bool) -> Result<Vec<Project>, StoreError> {
        self.store.list_projects(include_archived)
    }

    fn get_project(&self, id: &str) -> Result<Option<Project>, StoreError> {
        self.store.get_project(id)
    }

    fn create_project(&self, header: &SchemaProject) -> Result<Project, StoreError> {
        self.store.create_project(header)
    }

    fn update_project(&self, id: &str, update: &ProjectUpdate) -> Result<Project, StoreError> {
        self.store.update_project(id, update)
    }

    fn archive_project(&self, id: &str) -> Result<Project, StoreError> {
        self.store.archive_project(id)
    }

    fn unarchive_project(&self, id: &str) -> Result<Project, StoreError> {
        self.store.unarchive_project(id)
    }

    fn delete_project(&self, id: &str) -> Result<(), StoreError> {
        self.store.delete_project(id)
    }

    fn list_nodes(&self, project_id: &str, include_archived: bool) -> Result<Vec<Node>, StoreError> {
        self.store.list_nodes(project_id, include_archived)
    }

    fn add_node(
        &self,
        project_id: &str,
        parent_id: Option<&str>,
        title: &str,
        kind: NodeKind,
        due_date: Option<NaiveDate>,
    ) -> Result<Node, StoreError> {
        self.store.add_node(project_id, parent_id, title, kind, due_date)
    }

    fn update_node(&self, id: &str, update: &NodeUpdate) -> Result<Node, StoreError> {
        self.store.update_node(id, update)
    }

    fn archive_node(&self, id: &str) -> Result<Node, StoreError> {
        self.store.archive_node(id)
    }

    fn unarchive_node(&self, id: &str) -> Result<Node, StoreError> {
        self.store.unarchive_node(id)
    }

    fn delete_node(&self, id: &str) -> Result<(), StoreError> {
        self.store.delete_node(id)
    }

    fn list_work_items(&self, project_id: Option<&str>, include_archived: bool) -> Result<Vec<WorkItem>, StoreError> {
        self.store.list_work_items(project_id, include_archived)
    }

    fn get_work_item(&self, id: &str) -> Result<Option<WorkItem>, StoreError> {
        self.store.get_work_item(id)
    }

    fn add_work_item(
        &self,
        node_id: &str,
        title: &str,
        item_type: WorkItemType,
        planned_min: u32,
    ) -> Result<WorkItem, StoreError> {
        self.store.add_work_item(node_id, title, item_type, planned_min)
    }

    fn update_work_item(&self, id: &str, update: &WorkItemUpdate) -> Result<WorkItem, StoreError> {
        self.store.update_work_item(id, update)
    }

    fn set_work_item_status(&self, id: &str, status: WorkItemStatus) -> Result<WorkItem, StoreError> {
        self.store.set_work_item_status(id, status)
    }

    fn archive_work_item(&self, id: &str) -> Result<WorkItem, StoreError> {
        self.store.archive_work_item(id)
    }

    fn unarchive_work_item(&self, id: &str) -> Result<WorkItem, StoreError> {
        self.store.unarchive_work_item(id)
    }

    fn delete_work_item(&self, id: &str) -> Result<(), StoreError> {
        self.store.delete_work_item(id)
    }

    fn log_session(&self, work_item_id: &str, minutes: u32, note: Option<&str>) -> Result<WorkSession, StoreError> {
        self.store.log_session(work_item_id, minutes, note, None)
    }

    fn list_sessions(&self, work_item_id: Option<&str>) -> Result<Vec<WorkSession>, StoreError> {
        self.store.list_sessions(work_item_id)
    }

    fn delete_session(&self, id: &str) -> Result<(), StoreError> {
        self.store.delete_session(id)
    }

    fn list_templates(&self) -> Result<Vec<Template>, StoreError> {
        self.store.list_templates()
    }

    fn get_template(&self, name_or_id: &str) -> Result<Option<Template>, StoreError> {
        self.store.get_template(name_or_id)
    }

    fn save_template(&self, name: &str, schema: &ImportSchema) -> Result<Template, StoreError> {
        self.store.save_template(name, schema)
    }

    fn delete_template(&self, name_or_id: &str) -> Result<(), StoreError> {
        self.store.delete_template(name_or_id)
    }
}

impl Recommender for StoreBackend {
    fn recommend(&self, budget_min: u32) -> Result<Recommendation, StoreError> {
        debug!(budget_min, "StoreBackend::recommend: called");
        let projects = self.store.list_projects(false)?;
        let mut nodes = Vec::new();
        for project in &projects {
            nodes.extend(self.store.list_nodes(&project.id, true)?);
        }
        let items = self.store.list_work_items(None, true)?;
        let deps = self.store.list_dependencies(None)?;
        Ok(planstore::recommend(&projects, &nodes, &items, &deps, budget_min, today()))
    }

    fn replan(&self, project_id: &str) -> Result<Vec<NodeShift>, StoreError> {
        debug!(%project_id, "StoreBackend::replan: called");
        let project = self
            .store
            .get_project(project_id)?
            .ok_or_else(|| StoreError::NotFound(format!("project {}", project_id)))?;
        let nodes = self.store.list_nodes(project_id, false)?;
        let items = self.store.list_work_items(Some(project_id), false)?;
        let shifts = planstore::replan(&project, &nodes, &items, today());
        for shift in &shifts {
            let update = NodeUpdate {
                due_date: Some(Some(shift.to)),
                ..Default::default()
            };
            self.store.update_node(&shift.node_id, &update)?;
        }
        Ok(shifts)
    }
}

impl StatusService for StoreBackend {
    fn status(&self, scope: Option<&str>) -> Result<Vec<ProjectSummary>, StoreError> {
        debug!(?scope, "StoreBackend::status: called");
        let mut projects = self.store.list_projects(scope.is_some())?;
        if let Some(id) = scope {
            projects.retain(|p| p.id == id);
        }
        let items = self.store.list_work_items(scope, false)?;
        Ok(planstore::summarize(&projects, &items, today()))
    }
}

impl SchemaService for StoreBackend {
    fn validate(&self, schema: &ImportSchema) -> Vec<String> {
        planstore::validate_schema(schema)
    }

    fn import(&self, schema: &ImportSchema) -> Result<ImportReport, StoreError> {
        self.store.import(schema)
    }
}

#[cfg(test)]
pub mod testing {
    //! Helpers for tests across the crate

    use super::*;
    use tempfile::TempDir;

    /// Services over a fresh temporary store; keep the `TempDir` alive
    pub fn temp_services() -> (TempDir, Services) {
        let dir = TempDir::new().expect("tempdir");
        let store = Store::open(dir.path()).expect("open store");
        (dir, Services::from_store(store, None))
    }

    /// Same as [`temp_services`] with an NL collaborator attached
    pub fn temp_services_with_nl(nl: Arc<dyn NlService>) -> (TempDir, Services) {
        let (dir, mut services) = temp_services();
        services.nl = Some(nl);
        (dir, services)
    }

    /// Create a project through the repository
    pub fn add_project(services: &Services, name: &str) -> Project {
        services
            .repo
            .create_project(&SchemaProject {
                name: name.to_string(),
                ..Default::default()
            })
            .expect("create project")
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use planstore::ProjectStatus;

    #[test]
    fn test_status_scope_filters_projects() {
        let (_dir, services) = temp_services();
        let a = add_project(&services, "Alpha Plan");
        add_project(&services, "Beta Plan");

        assert_eq!(services.status.status(None).unwrap().len(), 2);
        let scoped = services.status.status(Some(&a.id)).unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].short_code, "AP");
    }

    #[test]
    fn test_archived_project_excluded_from_recommendation() {
        let (_dir, services) = temp_services();
        let p = add_project(&services, "Garden");
        let node = services
            .repo
            .add_node(&p.id, None, "Beds", planstore::NodeKind::Module, None)
            .unwrap();
        services
            .repo
            .add_work_item(&node.id, "Dig", planstore::WorkItemType::Task, 30)
            .unwrap();
        assert_eq!(services.recommender.recommend(60).unwrap().items.len(), 1);

        let archived = services.repo.archive_project(&p.id).unwrap();
        assert_eq!(archived.status, ProjectStatus::Archived);
        assert!(services.recommender.recommend(60).unwrap().items.is_empty());
    }
}
