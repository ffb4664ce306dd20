//! Guided creation of single records
//!
//! `project add`, `node add`, `work add`, `session add` and `template add`
//! typed without arguments walk through their fields one question at a time
//! (parents first) and finish with the argv the user would have typed.

use chrono::NaiveDate;
use planstore::{NodeKind, WorkItemType};
use tracing::{debug, warn};

use super::{Completion, FlowStep};
use crate::error::DispatchError;
use crate::resolve::short_id;
use crate::services::Services;

/// Where a pick field gets its choices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PickSource {
    Project,
    Node,
    WorkItem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Text,
    Number { default: u32, max: u32 },
    Date,
    Choice(&'static [&'static str]),
    Pick(PickSource),
}

/// How a field's value lands in the argv
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldArg {
    Positional,
    OptionValue(&'static str),
    /// Narrows later picks only
    Scope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSpec {
    id: &'static str,
    label: &'static str,
    required: bool,
    kind: FieldKind,
    arg: FieldArg,
}

const fn field(id: &'static str, label: &'static str, required: bool, kind: FieldKind, arg: FieldArg) -> FieldSpec {
    FieldSpec {
        id,
        label,
        required,
        kind,
        arg,
    }
}

const NODE_KINDS: &[&str] = &["module", "chapter", "unit", "milestone", "exam", "review"];
const ITEM_TYPES: &[&str] = &["task", "reading", "practice", "review", "writing", "assessment"];

const PROJECT_FIELDS: &[FieldSpec] = &[
    field("name", "Project name", true, FieldKind::Text, FieldArg::Positional),
    field(
        "description",
        "Description",
        false,
        FieldKind::Text,
        FieldArg::OptionValue("--description"),
    ),
    field("start", "Start date", false, FieldKind::Date, FieldArg::OptionValue("--start")),
    field("target", "Target date", false, FieldKind::Date, FieldArg::OptionValue("--target")),
];

const NODE_FIELDS: &[FieldSpec] = &[
    field(
        "project",
        "Project",
        true,
        FieldKind::Pick(PickSource::Project),
        FieldArg::OptionValue("--project"),
    ),
    field(
        "parent",
        "Parent node",
        false,
        FieldKind::Pick(PickSource::Node),
        FieldArg::OptionValue("--parent"),
    ),
    field("title", "Title", true, FieldKind::Text, FieldArg::Positional),
    field(
        "kind",
        "Kind",
        false,
        FieldKind::Choice(NODE_KINDS),
        FieldArg::OptionValue("--kind"),
    ),
    field("due", "Due date", false, FieldKind::Date, FieldArg::OptionValue("--due")),
];

const WORK_FIELDS: &[FieldSpec] = &[
    field(
        "project",
        "Project",
        true,
        FieldKind::Pick(PickSource::Project),
        FieldArg::Scope,
    ),
    field(
        "node",
        "Node",
        true,
        FieldKind::Pick(PickSource::Node),
        FieldArg::OptionValue("--node"),
    ),
    field("title", "Title", true, FieldKind::Text, FieldArg::Positional),
    field(
        "type",
        "Type",
        false,
        FieldKind::Choice(ITEM_TYPES),
        FieldArg::OptionValue("--type"),
    ),
    field(
        "minutes",
        "Planned minutes",
        false,
        FieldKind::Number { default: 30, max: 1440 },
        FieldArg::OptionValue("--minutes"),
    ),
];

const SESSION_FIELDS: &[FieldSpec] = &[
    field(
        "project",
        "Project",
        true,
        FieldKind::Pick(PickSource::Project),
        FieldArg::Scope,
    ),
    field(
        "work",
        "Work item",
        true,
        FieldKind::Pick(PickSource::WorkItem),
        FieldArg::Positional,
    ),
    field(
        "minutes",
        "Minutes worked",
        true,
        FieldKind::Number { default: 30, max: 1440 },
        FieldArg::Positional,
    ),
    field("note", "Note", false, FieldKind::Text, FieldArg::OptionValue("--note")),
];

const TEMPLATE_FIELDS: &[FieldSpec] = &[
    field("name", "Template name", true, FieldKind::Text, FieldArg::Positional),
    field(
        "from",
        "Schema file path",
        true,
        FieldKind::Text,
        FieldArg::OptionValue("--from"),
    ),
];

/// Which record the wizard creates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Project,
    Node,
    Work,
    Session,
    Template,
}

impl EntityKind {
    /// Entity group name as typed on the command line
    pub fn from_group(group: &str) -> Option<Self> {
        match group {
            "project" => Some(Self::Project),
            "node" => Some(Self::Node),
            "work" => Some(Self::Work),
            "session" => Some(Self::Session),
            "template" => Some(Self::Template),
            _ => None,
        }
    }

    pub fn group(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Node => "node",
            Self::Work => "work",
            Self::Session => "session",
            Self::Template => "template",
        }
    }

    fn fields(&self) -> &'static [FieldSpec] {
        match self {
            Self::Project => PROJECT_FIELDS,
            Self::Node => NODE_FIELDS,
            Self::Work => WORK_FIELDS,
            Self::Session => SESSION_FIELDS,
            Self::Template => TEMPLATE_FIELDS,
        }
    }
}

/// A selectable option for a pick field
#[derive(Debug, Clone, PartialEq)]
struct PickOption {
    label: String,
    value: String,
}

#[derive(Debug, Clone)]
pub struct EntityWizard {
    kind: EntityKind,
    index: usize,
    values: Vec<Option<String>>,
    options: Vec<PickOption>,
    /// Project id narrowing node and work item picks
    scope: Option<String>,
    /// Project code offered as the default pick
    default_project: Option<String>,
}

impl EntityWizard {
    /// Start a wizard; fails when a required parent has nothing to pick from
    pub fn new(kind: EntityKind, services: &Services, active: Option<(&str, &str)>) -> Result<Self, DispatchError> {
        debug!(?kind, ?active, "EntityWizard::new: called");
        let mut wizard = Self {
            kind,
            index: 0,
            values: vec![None; kind.fields().len()],
            options: Vec::new(),
            scope: active.map(|(id, _)| id.to_string()),
            default_project: active.map(|(_, code)| code.to_string()),
        };
        wizard.load_options(services)?;
        Ok(wizard)
    }

    fn current(&self) -> &'static FieldSpec {
        let fields = self.kind.fields();
        &fields[self.index.min(fields.len() - 1)]
    }

    pub fn title(&self) -> String {
        format!("New {}", self.kind.group())
    }

    pub fn prompt(&self) -> String {
        let spec = self.current();
        let mut prompt = spec.label.to_string();
        match spec.kind {
            FieldKind::Number { default, max } => prompt.push_str(&format!(" (1-{}, default {})", max, default)),
            FieldKind::Date => prompt.push_str(" (YYYY-MM-DD)"),
            FieldKind::Choice(choices) => prompt.push_str(&format!(" ({}, default {})", choices.join(", "), choices[0])),
            FieldKind::Pick(PickSource::Project) => {
                if let Some(code) = &self.default_project {
                    prompt.push_str(&format!(" (number or code, default {})", code));
                } else {
                    prompt.push_str(" (number or code)");
                }
            }
            FieldKind::Pick(_) => prompt.push_str(" (number or id)"),
            FieldKind::Text => {}
        }
        if !spec.required {
            prompt.push_str(", empty to skip");
        }
        prompt
    }

    /// Numbered options for pick fields
    pub fn detail(&self) -> Vec<String> {
        self.options
            .iter()
            .enumerate()
            .map(|(i, o)| format!("  {}. {}", i + 1, o.label))
            .collect()
    }

    fn load_options(&mut self, services: &Services) -> Result<(), DispatchError> {
        self.options.clear();
        let FieldKind::Pick(source) = self.current().kind else {
            return Ok(());
        };
        debug!(?source, scope = ?self.scope, "EntityWizard::load_options: called");
        self.options = match source {
            PickSource::Project => services
                .repo
                .list_projects(false)?
                .into_iter()
                .map(|p| PickOption {
                    label: format!("{} {}", p.short_code, p.name),
                    value: p.short_code,
                })
                .collect(),
            PickSource::Node => match &self.scope {
                Some(project_id) => services
                    .repo
                    .list_nodes(project_id, false)?
                    .into_iter()
                    .map(|n| PickOption {
                        label: format!("{} [{}]", n.title, n.kind),
                        value: n.id,
                    })
                    .collect(),
                None => Vec::new(),
            },
            PickSource::WorkItem => services
                .repo
                .list_work_items(self.scope.as_deref(), false)?
                .into_iter()
                .map(|w| PickOption {
                    label: format!("{} ({})", w.title, short_id(&w.id)),
                    value: w.id,
                })
                .collect(),
        };
        if self.options.is_empty() && self.current().required {
            let what = match source {
                PickSource::Project => "projects; create one with `project add <name>`",
                PickSource::Node => "nodes in this project; add one with `node add`",
                PickSource::WorkItem => "work items in this project; add one with `work add`",
            };
            return Err(DispatchError::User(format!("There are no {}", what)));
        }
        Ok(())
    }

    /// Interpret one answer for the current field
    fn parse(&self, text: &str, notices: &mut Vec<String>) -> Result<Option<String>, String> {
        let spec = self.current();
        if text.is_empty() {
            if let FieldKind::Pick(PickSource::Project) = spec.kind
                && let Some(code) = &self.default_project
            {
                return Ok(Some(code.clone()));
            }
            match spec.kind {
                FieldKind::Number { default, .. } => return Ok(Some(default.to_string())),
                FieldKind::Choice(choices) => return Ok(Some(choices[0].to_string())),
                _ => {}
            }
            if spec.required {
                return Err(format!("{} is required", spec.label));
            }
            return Ok(None);
        }
        match spec.kind {
            FieldKind::Text => Ok(Some(text.to_string())),
            FieldKind::Number { default, max } => match text.parse::<u32>() {
                Ok(n) if (1..=max).contains(&n) => Ok(Some(n.to_string())),
                _ => {
                    notices.push(format!("'{}' is not a number in 1-{}; using {}", text, max, default));
                    Ok(Some(default.to_string()))
                }
            },
            FieldKind::Date => match NaiveDate::parse_from_str(text, "%Y-%m-%d") {
                Ok(date) => Ok(Some(date.to_string())),
                Err(_) => {
                    notices.push(format!("'{}' is not a YYYY-MM-DD date; left unset", text));
                    Ok(None)
                }
            },
            FieldKind::Choice(choices) => {
                let lower = text.to_lowercase();
                if choices.contains(&lower.as_str()) {
                    Ok(Some(lower))
                } else {
                    notices.push(format!("Unknown value '{}'; using {}", text, choices[0]));
                    Ok(Some(choices[0].to_string()))
                }
            }
            FieldKind::Pick(source) => {
                if let Ok(n) = text.parse::<usize>()
                    && (1..=self.options.len()).contains(&n)
                {
                    return Ok(Some(self.options[n - 1].value.clone()));
                }
                // Typed reference: match option values by suffix or code
                let lower = text.to_lowercase();
                let hits: Vec<&PickOption> = self
                    .options
                    .iter()
                    .filter(|o| {
                        let value = o.value.to_lowercase();
                        value == lower || value.ends_with(&lower) || value.starts_with(&lower)
                    })
                    .collect();
                match hits.as_slice() {
                    [one] => Ok(Some(one.value.clone())),
                    [] => Err(format!("No {} matches '{}'", spec.label.to_lowercase(), text)),
                    many => {
                        if source == PickSource::Project
                            && let Some(exact) = many.iter().find(|o| o.value.eq_ignore_ascii_case(text))
                        {
                            return Ok(Some(exact.value.clone()));
                        }
                        Err(format!("'{}' matches {} options; be more specific", text, many.len()))
                    }
                }
            }
        }
    }

    pub fn submit(&mut self, input: &str, services: &Services) -> FlowStep {
        let text = input.trim();
        debug!(field = self.current().id, %text, "EntityWizard::submit: called");
        let mut notices = Vec::new();
        let value = match self.parse(text, &mut notices) {
            Ok(value) => value,
            Err(message) => return FlowStep::notice(message),
        };

        let spec = self.current();
        if let (FieldKind::Pick(PickSource::Project), Some(code)) = (spec.kind, &value) {
            match services.repo.list_projects(false) {
                Ok(projects) => {
                    self.scope = projects.into_iter().find(|p| &p.short_code == code).map(|p| p.id);
                }
                Err(e) => return FlowStep::notice(format!("Could not load projects: {}", e)),
            }
        }
        self.values[self.index] = value;
        self.index += 1;

        if self.index >= self.kind.fields().len() {
            return FlowStep::Done(Completion::Run(self.argv()));
        }
        if let Err(e) = self.load_options(services) {
            // Nothing to pick under that parent: ask for the parent again
            warn!(error = %e, "EntityWizard::submit: nothing to pick");
            self.index -= 1;
            self.values[self.index] = None;
            if let Err(reload) = self.load_options(services) {
                return FlowStep::notice(reload.to_string());
            }
            return FlowStep::notice(e.to_string());
        }
        FlowStep::Continue { notices }
    }

    /// The command line this wizard stands for
    pub fn argv(&self) -> Vec<String> {
        let mut argv = vec![self.kind.group().to_string(), "add".to_string()];
        let mut options = Vec::new();
        for (spec, value) in self.kind.fields().iter().zip(&self.values) {
            let Some(value) = value else { continue };
            match spec.arg {
                FieldArg::Positional => argv.push(value.clone()),
                FieldArg::OptionValue(flag) => options.extend([flag.to_string(), value.clone()]),
                FieldArg::Scope => {}
            }
        }
        argv.extend(options);
        argv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{add_project, temp_services};

    fn run(wizard: &mut EntityWizard, services: &Services, answers: &[&str]) -> FlowStep {
        let mut last = FlowStep::next();
        for answer in answers {
            last = wizard.submit(answer, services);
        }
        last
    }

    #[test]
    fn test_choice_tables_match_enums() {
        for (kind, name) in NodeKind::ALL.iter().zip(NODE_KINDS) {
            assert_eq!(kind.as_str(), *name);
        }
        for (ty, name) in WorkItemType::ALL.iter().zip(ITEM_TYPES) {
            assert_eq!(ty.as_str(), *name);
        }
    }

    #[test]
    fn test_project_wizard_builds_argv() {
        let (_dir, services) = temp_services();
        let mut wizard = EntityWizard::new(EntityKind::Project, &services, None).unwrap();
        let done = run(&mut wizard, &services, &["Garden Plan", "", "2026-03-01", "bad"]);
        assert_eq!(
            done,
            FlowStep::Done(Completion::Run(vec![
                "project".into(),
                "add".into(),
                "Garden Plan".into(),
                "--start".into(),
                "2026-03-01".into(),
            ]))
        );
    }

    #[test]
    fn test_required_field_is_asked_again() {
        let (_dir, services) = temp_services();
        let mut wizard = EntityWizard::new(EntityKind::Template, &services, None).unwrap();
        assert!(matches!(wizard.submit("", &services), FlowStep::Continue { notices } if notices.len() == 1));
        assert!(wizard.prompt().starts_with("Template name"));
    }

    #[test]
    fn test_node_wizard_defaults_to_active_project() {
        let (_dir, services) = temp_services();
        let p = add_project(&services, "Physics Study Plan");
        let mut wizard =
            EntityWizard::new(EntityKind::Node, &services, Some((p.id.as_str(), p.short_code.as_str()))).unwrap();
        assert!(wizard.prompt().contains("default PSP"));
        // project default, no parent, title, bad kind, no due
        let done = run(&mut wizard, &services, &["", "", "Chapter 1", "volume", ""]);
        assert_eq!(
            done,
            FlowStep::Done(Completion::Run(vec![
                "node".into(),
                "add".into(),
                "Chapter 1".into(),
                "--project".into(),
                "PSP".into(),
                "--kind".into(),
                "module".into(),
            ]))
        );
    }

    #[test]
    fn test_work_wizard_picks_node_by_number() {
        let (_dir, services) = temp_services();
        let p = add_project(&services, "Garden");
        let node = services.repo.add_node(&p.id, None, "Beds", NodeKind::Module, None).unwrap();
        let mut wizard = EntityWizard::new(EntityKind::Work, &services, None).unwrap();
        assert_eq!(wizard.detail(), vec!["  1. GAR Garden".to_string()]);

        let step = wizard.submit("1", &services);
        assert_eq!(step, FlowStep::next());
        assert_eq!(wizard.detail(), vec!["  1. Beds [module]".to_string()]);

        let done = run(&mut wizard, &services, &["1", "Dig", "", "45"]);
        assert_eq!(
            done,
            FlowStep::Done(Completion::Run(vec![
                "work".into(),
                "add".into(),
                "Dig".into(),
                "--node".into(),
                node.id.clone(),
                "--type".into(),
                "task".into(),
                "--minutes".into(),
                "45".into(),
            ]))
        );
    }

    #[test]
    fn test_wizard_needs_something_to_pick() {
        let (_dir, services) = temp_services();
        let err = EntityWizard::new(EntityKind::Node, &services, None).unwrap_err();
        assert!(err.to_string().contains("no projects"));
    }
}
