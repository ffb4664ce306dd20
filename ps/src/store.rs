//! JSONL-backed store
//!
//! Every table is a JSONL file rewritten in full on mutation. Mutations hold
//! an exclusive advisory lock on `.lock` so two shells sharing a data
//! directory never interleave writes.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use fs2::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::model::{
    Dependency, Node, NodeKind, Project, ProjectStatus, Template, WorkItem, WorkItemStatus, WorkItemType, WorkSession,
};
use crate::schema::{ImportReport, ImportSchema, SchemaProject, validate_schema};
use crate::{generate_id, now_ms};

#[derive(Debug, Clone, Copy)]
enum Table {
    Projects,
    Nodes,
    WorkItems,
    Sessions,
    Templates,
    Dependencies,
}

impl Table {
    fn file_name(self) -> &'static str {
        match self {
            Self::Projects => "projects.jsonl",
            Self::Nodes => "nodes.jsonl",
            Self::WorkItems => "work_items.jsonl",
            Self::Sessions => "sessions.jsonl",
            Self::Templates => "templates.jsonl",
            Self::Dependencies => "dependencies.jsonl",
        }
    }
}

/// Field changes for a project; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    /// `Some(None)` clears the date
    pub start_date: Option<Option<NaiveDate>>,
    /// `Some(None)` clears the date
    pub target_date: Option<Option<NaiveDate>>,
    /// Raw status write; does not touch `archived_at`
    pub status: Option<ProjectStatus>,
}

impl ProjectUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Field changes for a node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeUpdate {
    pub title: Option<String>,
    pub kind: Option<NodeKind>,
    pub due_date: Option<Option<NaiveDate>>,
    pub planned_min: Option<Option<u32>>,
}

/// Field changes for a work item
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkItemUpdate {
    pub title: Option<String>,
    pub item_type: Option<WorkItemType>,
    pub planned_min: Option<u32>,
    pub status: Option<WorkItemStatus>,
}

/// File-backed store for all planner records
pub struct Store {
    base_path: PathBuf,
}

impl Store {
    /// Open or create a store rooted at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        debug!(?base_path, "Store::open: opened");
        Ok(Self { base_path })
    }

    pub fn path(&self) -> &Path {
        &self.base_path
    }

    fn lock(&self) -> Result<File, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.base_path.join(".lock"))?;
        file.lock_exclusive()?;
        Ok(file)
    }

    fn load<T: DeserializeOwned>(&self, table: Table) -> Result<Vec<T>, StoreError> {
        let path = self.base_path.join(table.file_name());
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&path)?);
        let mut records = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(file = %path.display(), line = lineno + 1, error = %e, "Store::load: skipping malformed record"),
            }
        }
        Ok(records)
    }

    fn save<T: Serialize>(&self, table: Table, records: &[T]) -> Result<(), StoreError> {
        let path = self.base_path.join(table.file_name());
        let tmp = path.with_extension("jsonl.tmp");
        {
            let mut file = File::create(&tmp)?;
            for record in records {
                writeln!(file, "{}", serde_json::to_string(record)?)?;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        debug!(table = table.file_name(), count = records.len(), "Store::save: written");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Projects
    // ---------------------------------------------------------------------

    /// List projects ordered by creation; archived ones only when asked
    pub fn list_projects(&self, include_archived: bool) -> Result<Vec<Project>, StoreError> {
        debug!(include_archived, "Store::list_projects: called");
        let mut projects: Vec<Project> = self.load(Table::Projects)?;
        if !include_archived {
            projects.retain(|p| !p.is_archived());
        }
        projects.sort_by_key(|p| p.created_at);
        Ok(projects)
    }

    pub fn get_project(&self, id: &str) -> Result<Option<Project>, StoreError> {
        let projects: Vec<Project> = self.load(Table::Projects)?;
        Ok(projects.into_iter().find(|p| p.id == id))
    }

    /// Case-insensitive short code lookup
    pub fn find_project_by_code(&self, code: &str) -> Result<Option<Project>, StoreError> {
        let projects: Vec<Project> = self.load(Table::Projects)?;
        Ok(projects.into_iter().find(|p| p.short_code.eq_ignore_ascii_case(code)))
    }

    pub fn create_project(&self, header: &SchemaProject) -> Result<Project, StoreError> {
        debug!(name = %header.name, "Store::create_project: called");
        if header.name.trim().is_empty() {
            return Err(StoreError::Invalid("project name must not be empty".to_string()));
        }
        let _guard = self.lock()?;
        let mut projects: Vec<Project> = self.load(Table::Projects)?;
        let project = build_project(header, &projects);
        projects.push(project.clone());
        self.save(Table::Projects, &projects)?;
        info!(id = %project.id, code = %project.short_code, "Created project");
        Ok(project)
    }

    pub fn update_project(&self, id: &str, update: &ProjectUpdate) -> Result<Project, StoreError> {
        debug!(%id, ?update, "Store::update_project: called");
        self.modify_project(id, |project| {
            if let Some(name) = &update.name {
                project.name = name.clone();
            }
            if let Some(description) = &update.description {
                project.description = description.clone();
            }
            if let Some(start) = update.start_date {
                project.start_date = start;
            }
            if let Some(target) = update.target_date {
                project.target_date = target;
            }
            if let Some(status) = update.status {
                project.status = status;
            }
        })
    }

    /// Soft-delete: sets status archived and stamps `archived_at`
    pub fn archive_project(&self, id: &str) -> Result<Project, StoreError> {
        debug!(%id, "Store::archive_project: called");
        let now = now_ms();
        self.modify_project(id, |project| {
            project.status = ProjectStatus::Archived;
            project.archived_at = Some(now);
        })
    }

    /// Clears `archived_at`; an archived status falls back to active
    pub fn unarchive_project(&self, id: &str) -> Result<Project, StoreError> {
        debug!(%id, "Store::unarchive_project: called");
        self.modify_project(id, |project| {
            project.archived_at = None;
            if project.status == ProjectStatus::Archived {
                project.status = ProjectStatus::Active;
            }
        })
    }

    fn modify_project(&self, id: &str, f: impl FnOnce(&mut Project)) -> Result<Project, StoreError> {
        let _guard = self.lock()?;
        let mut projects: Vec<Project> = self.load(Table::Projects)?;
        let project = projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("project {}", id)))?;
        f(project);
        project.updated_at = now_ms();
        let updated = project.clone();
        self.save(Table::Projects, &projects)?;
        Ok(updated)
    }

    /// Delete a project with all its nodes, work items, sessions and dependencies
    pub fn delete_project(&self, id: &str) -> Result<(), StoreError> {
        debug!(%id, "Store::delete_project: called");
        let _guard = self.lock()?;
        let mut projects: Vec<Project> = self.load(Table::Projects)?;
        let before = projects.len();
        projects.retain(|p| p.id != id);
        if projects.len() == before {
            return Err(StoreError::NotFound(format!("project {}", id)));
        }

        let mut nodes: Vec<Node> = self.load(Table::Nodes)?;
        nodes.retain(|n| n.project_id != id);
        let mut items: Vec<WorkItem> = self.load(Table::WorkItems)?;
        let removed: HashSet<String> = items
            .iter()
            .filter(|w| w.project_id == id)
            .map(|w| w.id.clone())
            .collect();
        items.retain(|w| w.project_id != id);
        let mut sessions: Vec<WorkSession> = self.load(Table::Sessions)?;
        sessions.retain(|s| !removed.contains(&s.work_item_id));
        let mut deps: Vec<Dependency> = self.load(Table::Dependencies)?;
        deps.retain(|d| d.project_id != id);

        self.save(Table::Projects, &projects)?;
        self.save(Table::Nodes, &nodes)?;
        self.save(Table::WorkItems, &items)?;
        self.save(Table::Sessions, &sessions)?;
        self.save(Table::Dependencies, &deps)?;
        info!(%id, "Deleted project");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Nodes
    // ---------------------------------------------------------------------

    /// Nodes of a project ordered by `order_index`
    pub fn list_nodes(&self, project_id: &str, include_archived: bool) -> Result<Vec<Node>, StoreError> {
        debug!(%project_id, "Store::list_nodes: called");
        let mut nodes: Vec<Node> = self.load(Table::Nodes)?;
        nodes.retain(|n| n.project_id == project_id && (include_archived || n.archived_at.is_none()));
        nodes.sort_by_key(|n| n.order_index);
        Ok(nodes)
    }

    pub fn get_node(&self, id: &str) -> Result<Option<Node>, StoreError> {
        let nodes: Vec<Node> = self.load(Table::Nodes)?;
        Ok(nodes.into_iter().find(|n| n.id == id))
    }

    /// Append a node at the end of its project's ordering
    pub fn add_node(
        &self,
        project_id: &str,
        parent_id: Option<&str>,
        title: &str,
        kind: NodeKind,
        due_date: Option<NaiveDate>,
    ) -> Result<Node, StoreError> {
        debug!(%project_id, %title, "Store::add_node: called");
        if title.trim().is_empty() {
            return Err(StoreError::Invalid("node title must not be empty".to_string()));
        }
        if self.get_project(project_id)?.is_none() {
            return Err(StoreError::NotFound(format!("project {}", project_id)));
        }
        let _guard = self.lock()?;
        let mut nodes: Vec<Node> = self.load(Table::Nodes)?;
        if let Some(parent) = parent_id
            && !nodes.iter().any(|n| n.id == parent && n.project_id == project_id)
        {
            return Err(StoreError::NotFound(format!("parent node {}", parent)));
        }
        let order_index = nodes
            .iter()
            .filter(|n| n.project_id == project_id)
            .map(|n| n.order_index)
            .max()
            .unwrap_or(0)
            + 1;
        let node = Node {
            id: generate_id(),
            project_id: project_id.to_string(),
            parent_id: parent_id.map(str::to_string),
            title: title.to_string(),
            kind,
            order_index,
            due_date,
            planned_min: None,
            archived_at: None,
        };
        nodes.push(node.clone());
        self.save(Table::Nodes, &nodes)?;
        Ok(node)
    }

    pub fn update_node(&self, id: &str, update: &NodeUpdate) -> Result<Node, StoreError> {
        debug!(%id, ?update, "Store::update_node: called");
        self.modify_node(id, |node| {
            if let Some(title) = &update.title {
                node.title = title.clone();
            }
            if let Some(kind) = update.kind {
                node.kind = kind;
            }
            if let Some(due) = update.due_date {
                node.due_date = due;
            }
            if let Some(planned) = update.planned_min {
                node.planned_min = planned;
            }
        })
    }

    pub fn archive_node(&self, id: &str) -> Result<Node, StoreError> {
        let now = now_ms();
        self.modify_node(id, |node| node.archived_at = Some(now))
    }

    pub fn unarchive_node(&self, id: &str) -> Result<Node, StoreError> {
        self.modify_node(id, |node| node.archived_at = None)
    }

    fn modify_node(&self, id: &str, f: impl FnOnce(&mut Node)) -> Result<Node, StoreError> {
        let _guard = self.lock()?;
        let mut nodes: Vec<Node> = self.load(Table::Nodes)?;
        let node = nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("node {}", id)))?;
        f(node);
        let updated = node.clone();
        self.save(Table::Nodes, &nodes)?;
        Ok(updated)
    }

    /// Delete a node, its descendants and their work items
    pub fn delete_node(&self, id: &str) -> Result<(), StoreError> {
        debug!(%id, "Store::delete_node: called");
        let _guard = self.lock()?;
        let mut nodes: Vec<Node> = self.load(Table::Nodes)?;
        if !nodes.iter().any(|n| n.id == id) {
            return Err(StoreError::NotFound(format!("node {}", id)));
        }
        let mut doomed: HashSet<String> = HashSet::from([id.to_string()]);
        loop {
            let grown: Vec<String> = nodes
                .iter()
                .filter(|n| !doomed.contains(&n.id))
                .filter(|n| n.parent_id.as_ref().is_some_and(|p| doomed.contains(p)))
                .map(|n| n.id.clone())
                .collect();
            if grown.is_empty() {
                break;
            }
            doomed.extend(grown);
        }
        nodes.retain(|n| !doomed.contains(&n.id));

        let mut items: Vec<WorkItem> = self.load(Table::WorkItems)?;
        let removed_items: HashSet<String> = items
            .iter()
            .filter(|w| doomed.contains(&w.node_id))
            .map(|w| w.id.clone())
            .collect();
        items.retain(|w| !removed_items.contains(&w.id));
        let mut sessions: Vec<WorkSession> = self.load(Table::Sessions)?;
        sessions.retain(|s| !removed_items.contains(&s.work_item_id));
        let mut deps: Vec<Dependency> = self.load(Table::Dependencies)?;
        deps.retain(|d| {
            let gone = |r: &String| doomed.contains(r) || removed_items.contains(r);
            !gone(&d.from_id) && !gone(&d.to_id)
        });

        self.save(Table::Nodes, &nodes)?;
        self.save(Table::WorkItems, &items)?;
        self.save(Table::Sessions, &sessions)?;
        self.save(Table::Dependencies, &deps)?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Work items
    // ---------------------------------------------------------------------

    /// Work items, optionally restricted to one project, in node order
    pub fn list_work_items(&self, project_id: Option<&str>, include_archived: bool) -> Result<Vec<WorkItem>, StoreError> {
        debug!(?project_id, "Store::list_work_items: called");
        let mut items: Vec<WorkItem> = self.load(Table::WorkItems)?;
        items.retain(|w| project_id.is_none_or(|p| w.project_id == p) && (include_archived || w.archived_at.is_none()));
        let nodes: Vec<Node> = self.load(Table::Nodes)?;
        let order: HashMap<&str, u32> = nodes.iter().map(|n| (n.id.as_str(), n.order_index)).collect();
        items.sort_by_key(|w| order.get(w.node_id.as_str()).copied().unwrap_or(u32::MAX));
        Ok(items)
    }

    pub fn get_work_item(&self, id: &str) -> Result<Option<WorkItem>, StoreError> {
        let items: Vec<WorkItem> = self.load(Table::WorkItems)?;
        Ok(items.into_iter().find(|w| w.id == id))
    }

    pub fn add_work_item(
        &self,
        node_id: &str,
        title: &str,
        item_type: WorkItemType,
        planned_min: u32,
    ) -> Result<WorkItem, StoreError> {
        debug!(%node_id, %title, planned_min, "Store::add_work_item: called");
        if title.trim().is_empty() {
            return Err(StoreError::Invalid("work item title must not be empty".to_string()));
        }
        if planned_min == 0 {
            return Err(StoreError::Invalid("planned minutes must be greater than 0".to_string()));
        }
        let node = self
            .get_node(node_id)?
            .ok_or_else(|| StoreError::NotFound(format!("node {}", node_id)))?;
        let _guard = self.lock()?;
        let mut items: Vec<WorkItem> = self.load(Table::WorkItems)?;
        let item = WorkItem {
            id: generate_id(),
            project_id: node.project_id,
            node_id: node.id,
            title: title.to_string(),
            item_type,
            planned_min,
            logged_min: 0,
            status: WorkItemStatus::Todo,
            archived_at: None,
        };
        items.push(item.clone());
        self.save(Table::WorkItems, &items)?;
        Ok(item)
    }

    pub fn update_work_item(&self, id: &str, update: &WorkItemUpdate) -> Result<WorkItem, StoreError> {
        debug!(%id, ?update, "Store::update_work_item: called");
        if update.planned_min == Some(0) {
            return Err(StoreError::Invalid("planned minutes must be greater than 0".to_string()));
        }
        self.modify_work_item(id, |item| {
            if let Some(title) = &update.title {
                item.title = title.clone();
            }
            if let Some(item_type) = update.item_type {
                item.item_type = item_type;
            }
            if let Some(planned) = update.planned_min {
                item.planned_min = planned;
            }
            if let Some(status) = update.status {
                item.status = status;
            }
        })
    }

    pub fn set_work_item_status(&self, id: &str, status: WorkItemStatus) -> Result<WorkItem, StoreError> {
        debug!(%id, %status, "Store::set_work_item_status: called");
        self.modify_work_item(id, |item| item.status = status)
    }

    pub fn archive_work_item(&self, id: &str) -> Result<WorkItem, StoreError> {
        let now = now_ms();
        self.modify_work_item(id, |item| item.archived_at = Some(now))
    }

    pub fn unarchive_work_item(&self, id: &str) -> Result<WorkItem, StoreError> {
        self.modify_work_item(id, |item| item.archived_at = None)
    }

    fn modify_work_item(&self, id: &str, f: impl FnOnce(&mut WorkItem)) -> Result<WorkItem, StoreError> {
        let _guard = self.lock()?;
        let mut items: Vec<WorkItem> = self.load(Table::WorkItems)?;
        let item = items
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("work item {}", id)))?;
        f(item);
        let updated = item.clone();
        self.save(Table::WorkItems, &items)?;
        Ok(updated)
    }

    pub fn delete_work_item(&self, id: &str) -> Result<(), StoreError> {
        debug!(%id, "Store::delete_work_item: called");
        let _guard = self.lock()?;
        let mut items: Vec<WorkItem> = self.load(Table::WorkItems)?;
        let before = items.len();
        items.retain(|w| w.id != id);
        if items.len() == before {
            return Err(StoreError::NotFound(format!("work item {}", id)));
        }
        let mut sessions: Vec<WorkSession> = self.load(Table::Sessions)?;
        sessions.retain(|s| s.work_item_id != id);
        let mut deps: Vec<Dependency> = self.load(Table::Dependencies)?;
        deps.retain(|d| d.from_id != id && d.to_id != id);
        self.save(Table::WorkItems, &items)?;
        self.save(Table::Sessions, &sessions)?;
        self.save(Table::Dependencies, &deps)?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Work sessions
    // ---------------------------------------------------------------------

    /// Record minutes against a work item; a todo item becomes in progress
    pub fn log_session(
        &self,
        work_item_id: &str,
        minutes: u32,
        note: Option<&str>,
        started_at: Option<i64>,
    ) -> Result<WorkSession, StoreError> {
        debug!(%work_item_id, minutes, "Store::log_session: called");
        if minutes == 0 {
            return Err(StoreError::Invalid("session minutes must be greater than 0".to_string()));
        }
        let _guard = self.lock()?;
        let mut items: Vec<WorkItem> = self.load(Table::WorkItems)?;
        let item = items
            .iter_mut()
            .find(|w| w.id == work_item_id)
            .ok_or_else(|| StoreError::NotFound(format!("work item {}", work_item_id)))?;
        item.logged_min = item.logged_min.saturating_add(minutes);
        if item.status == WorkItemStatus::Todo {
            item.status = WorkItemStatus::InProgress;
        }

        let session = WorkSession {
            id: generate_id(),
            work_item_id: work_item_id.to_string(),
            started_at: started_at.unwrap_or_else(|| now_ms() - i64::from(minutes) * 60_000),
            minutes,
            note: note.map(str::to_string),
        };
        let mut sessions: Vec<WorkSession> = self.load(Table::Sessions)?;
        sessions.push(session.clone());
        self.save(Table::WorkItems, &items)?;
        self.save(Table::Sessions, &sessions)?;
        Ok(session)
    }

    /// Sessions, newest first, optionally for one work item
    pub fn list_sessions(&self, work_item_id: Option<&str>) -> Result<Vec<WorkSession>, StoreError> {
        let mut sessions: Vec<WorkSession> = self.load(Table::Sessions)?;
        sessions.retain(|s| work_item_id.is_none_or(|w| s.work_item_id == w));
        sessions.sort_by_key(|s| std::cmp::Reverse(s.started_at));
        Ok(sessions)
    }

    /// Remove a session and give its minutes back
    pub fn delete_session(&self, id: &str) -> Result<(), StoreError> {
        debug!(%id, "Store::delete_session: called");
        let _guard = self.lock()?;
        let mut sessions: Vec<WorkSession> = self.load(Table::Sessions)?;
        let pos = sessions
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("session {}", id)))?;
        let session = sessions.remove(pos);
        let mut items: Vec<WorkItem> = self.load(Table::WorkItems)?;
        if let Some(item) = items.iter_mut().find(|w| w.id == session.work_item_id) {
            item.logged_min = item.logged_min.saturating_sub(session.minutes);
        }
        self.save(Table::Sessions, &sessions)?;
        self.save(Table::WorkItems, &items)?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Templates
    // ---------------------------------------------------------------------

    pub fn list_templates(&self) -> Result<Vec<Template>, StoreError> {
        let mut templates: Vec<Template> = self.load(Table::Templates)?;
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(templates)
    }

    /// Look a template up by name (case-insensitive) or id
    pub fn get_template(&self, name_or_id: &str) -> Result<Option<Template>, StoreError> {
        let templates: Vec<Template> = self.load(Table::Templates)?;
        Ok(templates
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(name_or_id) || t.id == name_or_id))
    }

    /// Save a schema as a named template; names are unique
    pub fn save_template(&self, name: &str, schema: &ImportSchema) -> Result<Template, StoreError> {
        debug!(%name, "Store::save_template: called");
        if name.trim().is_empty() {
            return Err(StoreError::Invalid("template name must not be empty".to_string()));
        }
        let errors = validate_schema(schema);
        if !errors.is_empty() {
            return Err(StoreError::SchemaInvalid(errors));
        }
        let _guard = self.lock()?;
        let mut templates: Vec<Template> = self.load(Table::Templates)?;
        if templates.iter().any(|t| t.name.eq_ignore_ascii_case(name)) {
            return Err(StoreError::Invalid(format!("template '{}' already exists", name)));
        }
        let template = Template {
            id: generate_id(),
            name: name.to_string(),
            schema: schema.clone(),
            created_at: now_ms(),
        };
        templates.push(template.clone());
        self.save(Table::Templates, &templates)?;
        Ok(template)
    }

    pub fn delete_template(&self, name_or_id: &str) -> Result<(), StoreError> {
        debug!(%name_or_id, "Store::delete_template: called");
        let _guard = self.lock()?;
        let mut templates: Vec<Template> = self.load(Table::Templates)?;
        let before = templates.len();
        templates.retain(|t| !(t.name.eq_ignore_ascii_case(name_or_id) || t.id == name_or_id));
        if templates.len() == before {
            return Err(StoreError::NotFound(format!("template {}", name_or_id)));
        }
        self.save(Table::Templates, &templates)
    }

    // ---------------------------------------------------------------------
    // Dependencies and import
    // ---------------------------------------------------------------------

    pub fn list_dependencies(&self, project_id: Option<&str>) -> Result<Vec<Dependency>, StoreError> {
        let mut deps: Vec<Dependency> = self.load(Table::Dependencies)?;
        deps.retain(|d| project_id.is_none_or(|p| d.project_id == p));
        Ok(deps)
    }

    /// Validate and import a whole schema as a new project
    pub fn import(&self, schema: &ImportSchema) -> Result<ImportReport, StoreError> {
        debug!(name = %schema.project.name, "Store::import: called");
        let errors = validate_schema(schema);
        if !errors.is_empty() {
            warn!(count = errors.len(), "Store::import: schema rejected");
            return Err(StoreError::SchemaInvalid(errors));
        }

        let _guard = self.lock()?;
        let mut projects: Vec<Project> = self.load(Table::Projects)?;
        let mut nodes: Vec<Node> = self.load(Table::Nodes)?;
        let mut items: Vec<WorkItem> = self.load(Table::WorkItems)?;
        let mut deps: Vec<Dependency> = self.load(Table::Dependencies)?;

        let project = build_project(&schema.project, &projects);
        let mut ids: HashMap<&str, String> = HashMap::new();
        for node in &schema.nodes {
            ids.insert(node.ref_id.as_str(), generate_id());
        }
        for item in &schema.work_items {
            ids.insert(item.ref_id.as_str(), generate_id());
        }
        let id_of = |r: &str| ids.get(r).cloned().ok_or_else(|| StoreError::Invalid(format!("unknown ref '{}'", r)));

        for node in &schema.nodes {
            nodes.push(Node {
                id: id_of(node.ref_id.as_str())?,
                project_id: project.id.clone(),
                parent_id: node.parent_ref.as_deref().map(id_of).transpose()?,
                title: node.title.clone(),
                kind: node.kind,
                order_index: node.order,
                due_date: node.due_date,
                planned_min: node.planned_min,
                archived_at: None,
            });
        }
        for item in &schema.work_items {
            items.push(WorkItem {
                id: id_of(item.ref_id.as_str())?,
                project_id: project.id.clone(),
                node_id: id_of(item.node_ref.as_str())?,
                title: item.title.clone(),
                item_type: item.item_type,
                planned_min: item.planned_min,
                logged_min: 0,
                status: WorkItemStatus::Todo,
                archived_at: None,
            });
        }
        for dep in &schema.dependencies {
            deps.push(Dependency {
                id: generate_id(),
                project_id: project.id.clone(),
                from_id: id_of(dep.from_ref.as_str())?,
                to_id: id_of(dep.to_ref.as_str())?,
            });
        }

        projects.push(project.clone());
        self.save(Table::Projects, &projects)?;
        self.save(Table::Nodes, &nodes)?;
        self.save(Table::WorkItems, &items)?;
        self.save(Table::Dependencies, &deps)?;

        info!(id = %project.id, code = %project.short_code, "Imported project");
        Ok(ImportReport {
            project,
            node_count: schema.nodes.len(),
            work_item_count: schema.work_items.len(),
            dependency_count: schema.dependencies.len(),
        })
    }
}

fn build_project(header: &SchemaProject, existing: &[Project]) -> Project {
    let taken: HashSet<String> = existing.iter().map(|p| p.short_code.to_uppercase()).collect();
    let base = header
        .short_code
        .as_deref()
        .map(str::to_uppercase)
        .unwrap_or_else(|| derive_short_code(&header.name));
    let now = now_ms();
    Project {
        id: generate_id(),
        short_code: dedupe_code(&base, &taken),
        name: header.name.trim().to_string(),
        description: header.description.clone(),
        status: ProjectStatus::Active,
        start_date: header.start_date,
        target_date: header.target_date,
        archived_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// Uppercase initials of the name's words (max 4); a single word yields its
/// first three letters
pub(crate) fn derive_short_code(name: &str) -> String {
    let words: Vec<&str> = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let code: String = match words.as_slice() {
        [] => "P".to_string(),
        [single] => single.chars().take(3).collect(),
        many => many.iter().filter_map(|w| w.chars().next()).take(4).collect(),
    };
    code.to_uppercase()
}

fn dedupe_code(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}{}", base, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SchemaDependency, SchemaNode, SchemaWorkItem, SessionPolicy};
    use tempfile::TempDir;

    fn open() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (dir, store)
    }

    fn header(name: &str) -> SchemaProject {
        SchemaProject {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn two_node_schema() -> ImportSchema {
        ImportSchema {
            project: header("Physics Study Plan"),
            nodes: vec![
                SchemaNode {
                    ref_id: "n1".to_string(),
                    title: "Chapter 1".to_string(),
                    kind: NodeKind::Module,
                    order: 1,
                    due_date: None,
                    planned_min: Some(60),
                    parent_ref: None,
                },
                SchemaNode {
                    ref_id: "n2".to_string(),
                    title: "Chapter 2".to_string(),
                    kind: NodeKind::Module,
                    order: 2,
                    due_date: None,
                    planned_min: Some(60),
                    parent_ref: None,
                },
            ],
            work_items: vec![
                SchemaWorkItem {
                    ref_id: "w1".to_string(),
                    node_ref: "n1".to_string(),
                    title: "Read".to_string(),
                    item_type: WorkItemType::Reading,
                    planned_min: 60,
                },
                SchemaWorkItem {
                    ref_id: "w2".to_string(),
                    node_ref: "n2".to_string(),
                    title: "Read".to_string(),
                    item_type: WorkItemType::Reading,
                    planned_min: 60,
                },
            ],
            dependencies: vec![SchemaDependency {
                from_ref: "w1".to_string(),
                to_ref: "w2".to_string(),
            }],
            session_policy: SessionPolicy::default(),
        }
    }

    #[test]
    fn test_short_code_derivation() {
        assert_eq!(derive_short_code("Physics Study Plan"), "PSP");
        assert_eq!(derive_short_code("thesis"), "THE");
        assert_eq!(derive_short_code("a b c d e"), "ABCD");
        assert_eq!(derive_short_code("!!!"), "P");
    }

    #[test]
    fn test_short_code_dedupes() {
        let (_dir, store) = open();
        let a = store.create_project(&header("Physics Study Plan")).unwrap();
        let b = store.create_project(&header("Piano Scale Practice")).unwrap();
        assert_eq!(a.short_code, "PSP");
        assert_eq!(b.short_code, "PSP2");
    }

    #[test]
    fn test_archive_hides_and_unarchive_restores() {
        let (_dir, store) = open();
        let p = store.create_project(&header("Garden")).unwrap();
        let archived = store.archive_project(&p.id).unwrap();
        assert!(archived.archived_at.is_some());
        assert_eq!(archived.status, ProjectStatus::Archived);
        assert!(store.list_projects(false).unwrap().is_empty());
        assert_eq!(store.list_projects(true).unwrap().len(), 1);

        let restored = store.unarchive_project(&p.id).unwrap();
        assert_eq!(restored.archived_at, None);
        assert_eq!(restored.status, ProjectStatus::Active);
    }

    #[test]
    fn test_update_clears_target_date() {
        let (_dir, store) = open();
        let mut h = header("Garden");
        h.target_date = NaiveDate::from_ymd_opt(2026, 6, 1);
        let p = store.create_project(&h).unwrap();
        let update = ProjectUpdate {
            target_date: Some(None),
            ..Default::default()
        };
        let updated = store.update_project(&p.id, &update).unwrap();
        assert_eq!(updated.target_date, None);
        assert_eq!(updated.name, "Garden");
    }

    #[test]
    fn test_import_maps_refs() {
        let (_dir, store) = open();
        let report = store.import(&two_node_schema()).unwrap();
        assert_eq!(report.node_count, 2);
        assert_eq!(report.work_item_count, 2);
        assert_eq!(report.dependency_count, 1);

        let nodes = store.list_nodes(&report.project.id, false).unwrap();
        let items = store.list_work_items(Some(&report.project.id), false).unwrap();
        assert_eq!(items[0].node_id, nodes[0].id);
        let deps = store.list_dependencies(Some(&report.project.id)).unwrap();
        assert_eq!(deps[0].from_id, items[0].id);
        assert_eq!(deps[0].to_id, items[1].id);
    }

    #[test]
    fn test_import_rejects_invalid_schema() {
        let (_dir, store) = open();
        let mut schema = two_node_schema();
        schema.project.name = String::new();
        let err = store.import(&schema).unwrap_err();
        assert!(matches!(err, StoreError::SchemaInvalid(_)));
        assert!(store.list_projects(true).unwrap().is_empty());
    }

    #[test]
    fn test_log_and_delete_session_adjusts_logged() {
        let (_dir, store) = open();
        let report = store.import(&two_node_schema()).unwrap();
        let item = &store.list_work_items(Some(&report.project.id), false).unwrap()[0];

        let session = store.log_session(&item.id, 25, Some("warmup"), None).unwrap();
        let after = store.get_work_item(&item.id).unwrap().unwrap();
        assert_eq!(after.logged_min, 25);
        assert_eq!(after.status, WorkItemStatus::InProgress);

        store.delete_session(&session.id).unwrap();
        assert_eq!(store.get_work_item(&item.id).unwrap().unwrap().logged_min, 0);
    }

    #[test]
    fn test_delete_project_cascades() {
        let (_dir, store) = open();
        let report = store.import(&two_node_schema()).unwrap();
        store.delete_project(&report.project.id).unwrap();
        assert!(store.list_nodes(&report.project.id, true).unwrap().is_empty());
        assert!(store.list_work_items(None, true).unwrap().is_empty());
        assert!(store.list_dependencies(None).unwrap().is_empty());
    }

    #[test]
    fn test_templates_unique_by_name() {
        let (_dir, store) = open();
        store.save_template("course", &two_node_schema()).unwrap();
        let err = store.save_template("Course", &two_node_schema()).unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert!(store.get_template("COURSE").unwrap().is_some());
        store.delete_template("course").unwrap();
        assert!(store.list_templates().unwrap().is_empty());
    }

    #[test]
    fn test_add_node_appends_order() {
        let (_dir, store) = open();
        let p = store.create_project(&header("Garden")).unwrap();
        let a = store.add_node(&p.id, None, "Beds", NodeKind::Module, None).unwrap();
        let b = store.add_node(&p.id, Some(&a.id), "Soil", NodeKind::Unit, None).unwrap();
        assert_eq!(a.order_index, 1);
        assert_eq!(b.order_index, 2);
        assert!(store.add_node(&p.id, Some("nope"), "X", NodeKind::Unit, None).is_err());

        store.delete_node(&a.id).unwrap();
        assert!(store.list_nodes(&p.id, true).unwrap().is_empty());
    }
}
