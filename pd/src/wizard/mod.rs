//! Guided flows: confirmations, entity wizards and the structure wizard
//!
//! A [`Flow`] is a question/answer state machine. The shell and the TUI
//! show [`Flow::prompt`], feed each answer to [`Flow::submit`] and act on the
//! [`Completion`] once the flow is done. Flows never run commands themselves;
//! completions carry the argv or intent to run, so they can be inspected.

use planstore::{ImportReport, ImportSchema};
use tracing::{debug, warn};

use crate::format;
use crate::intent::ParsedIntent;
use crate::services::Services;

pub mod compile;
mod confirm;
mod entity;
mod structure;

pub use compile::{GroupSpec, ItemTemplate, SpecialNode, WizardResult};
pub use confirm::ConfirmStep;
pub use entity::{EntityKind, EntityWizard};
pub use structure::StructureWizard;

/// An action held back until the user confirms it
#[derive(Debug, Clone, PartialEq)]
pub enum PendingAction {
    /// Re-run these tokens through the dispatcher
    Argv(Vec<String>),
    /// Execute a natural-language intent
    Intent(ParsedIntent),
}

impl PendingAction {
    pub fn describe(&self) -> String {
        match self {
            Self::Argv(argv) => argv.join(" "),
            Self::Intent(intent) => intent.describe(),
        }
    }
}

/// How a flow ended
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Confirmed(PendingAction),
    Declined,
    /// Entity wizard finished; run this argv
    Run(Vec<String>),
    /// Structure wizard accepted and imported
    Imported(ImportReport),
    /// Continue in a draft conversation seeded with this schema
    Refine { schema: ImportSchema, summary: String },
    Cancelled,
}

/// Result of feeding one answer to a flow
#[derive(Debug, Clone, PartialEq)]
pub enum FlowStep {
    /// Ask the next question; `notices` are corrections to show first
    Continue { notices: Vec<String> },
    Done(Completion),
}

impl FlowStep {
    pub fn next() -> Self {
        Self::Continue { notices: Vec::new() }
    }

    pub fn notice(text: impl Into<String>) -> Self {
        Self::Continue {
            notices: vec![text.into()],
        }
    }
}

/// Any guided flow
#[derive(Debug, Clone)]
pub enum Flow {
    Confirm(ConfirmStep),
    Entity(EntityWizard),
    Structure(StructureWizard),
}

impl Flow {
    pub fn title(&self) -> String {
        match self {
            Self::Confirm(_) => "Confirm".to_string(),
            Self::Entity(w) => w.title(),
            Self::Structure(_) => "New project plan".to_string(),
        }
    }

    /// The current question
    pub fn prompt(&self) -> String {
        match self {
            Self::Confirm(c) => c.prompt(),
            Self::Entity(w) => w.prompt(),
            Self::Structure(w) => w.prompt(),
        }
    }

    /// Extra lines to show above the prompt (choices, review summary)
    pub fn detail(&self) -> Vec<String> {
        match self {
            Self::Confirm(_) => Vec::new(),
            Self::Entity(w) => w.detail(),
            Self::Structure(w) => w.detail(),
        }
    }

    pub fn submit(&mut self, input: &str, services: &Services) -> FlowStep {
        debug!(title = %self.title(), "Flow::submit: called");
        match self {
            Self::Confirm(c) => c.submit(input),
            Self::Entity(w) => w.submit(input, services),
            Self::Structure(w) => w.submit(input, services),
        }
    }

    pub fn is_confirm(&self) -> bool {
        matches!(self, Self::Confirm(_))
    }
}

/// Validate then import; problems come back as displayable lines
///
/// Shared by the structure wizard and the draft bridge.
pub fn accept_schema(services: &Services, schema: &ImportSchema) -> Result<ImportReport, Vec<String>> {
    debug!(name = %schema.project.name, "accept_schema: called");
    let errors = services.schema.validate(schema);
    if !errors.is_empty() {
        debug!(count = errors.len(), "accept_schema: validation failed");
        return Err(vec![format::validation_errors(&errors)]);
    }
    services.schema.import(schema).map_err(|e| {
        warn!(error = %e, "accept_schema: import failed");
        vec![format!("Import failed: {}", e)]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::temp_services;
    use planstore::{SchemaNode, SchemaProject};

    #[test]
    fn test_accept_schema_reports_validation_errors() {
        let (_dir, services) = temp_services();
        let schema = ImportSchema::default();
        let errors = accept_schema(&services, &schema).unwrap_err();
        assert!(errors[0].starts_with("Schema has"));
        assert!(services.repo.list_projects(true).unwrap().is_empty());
    }

    #[test]
    fn test_accept_schema_imports_valid_schema() {
        let (_dir, services) = temp_services();
        let schema = ImportSchema {
            project: SchemaProject {
                name: "Thesis".to_string(),
                ..Default::default()
            },
            nodes: vec![SchemaNode {
                ref_id: "n1".to_string(),
                title: "Outline".to_string(),
                kind: Default::default(),
                order: 1,
                due_date: None,
                planned_min: None,
                parent_ref: None,
            }],
            ..Default::default()
        };
        let report = accept_schema(&services, &schema).unwrap();
        assert_eq!(report.project.name, "Thesis");
        assert_eq!(report.node_count, 1);
    }

    #[test]
    fn test_pending_action_describe() {
        let action = PendingAction::Argv(vec!["project".into(), "delete".into(), "PSP".into(), "--yes".into()]);
        assert_eq!(action.describe(), "project delete PSP --yes");
    }
}
