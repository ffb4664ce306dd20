//! PlanStore - persistent state for plandeck
//!
//! Stores projects, nodes, work items, work sessions and templates as
//! JSONL files (one record per line) under a single data directory, and
//! provides the reference collaborators the plandeck shell talks to:
//!
//! - [`Store`] - CRUD, hierarchy listing, archive/unarchive
//! - [`schema`] - import schema types, validation and import
//! - [`status`] - per-project planned/logged summaries
//! - [`recommend`] - greedy due-date recommendation and overdue replanning
//!
//! # Layout
//!
//! ```text
//! ~/.local/share/plandeck/
//! ├── projects.jsonl
//! ├── nodes.jsonl
//! ├── work_items.jsonl
//! ├── sessions.jsonl
//! ├── templates.jsonl
//! ├── dependencies.jsonl
//! └── .lock
//! ```

mod error;
pub mod model;
pub mod recommend;
pub mod schema;
pub mod status;
mod store;

pub use error::StoreError;
pub use model::{
    Dependency, Node, NodeKind, Project, ProjectStatus, Template, WorkItem, WorkItemStatus, WorkItemType, WorkSession,
};
pub use recommend::{NodeShift, Recommendation, RecommendedItem, recommend, replan};
pub use schema::{
    ImportReport, ImportSchema, SchemaDependency, SchemaNode, SchemaProject, SchemaWorkItem, SessionPolicy,
    validate_schema,
};
pub use status::{ProjectSummary, RiskLevel, summarize};
pub use store::{NodeUpdate, ProjectUpdate, Store, WorkItemUpdate};

/// Current time as Unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a new time-ordered record ID
pub fn generate_id() -> String {
    uuid::Uuid::now_v7().to_string()
}
