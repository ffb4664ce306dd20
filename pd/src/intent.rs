//! Natural-language intents and their dispatch
//!
//! `ask <text>` goes to the NL collaborator, which answers with an
//! [`AskResolution`]. Every resolution is normalized before use: the risk of a
//! known kind comes from [`IntentKind::inherent_risk`], and nothing that
//! writes can arrive already `Executed`.

use std::fmt;

use chrono::{Local, NaiveDate};
use planstore::{ImportSchema, Project, ProjectStatus, ProjectUpdate, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{NlError, ResolveError};
use crate::format;
use crate::nl::explain;
use crate::resolve::resolve_project;
use crate::services::{IntentContext, Repository, Services};

/// Budget used when an intent does not say how much time is available
pub const DEFAULT_AVAILABLE_MIN: u32 = 60;

/// Shown for `ask` when no NL collaborator is configured
pub const NO_NL_MESSAGE: &str = "Natural-language requests need an LLM (see `llm` in the config file). \
Use the explicit commands instead: `what-now [minutes]`, `status`, \
`project update <ref> --target <date> --status <status>`.";

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IntentKind {
    WhatNow,
    Status,
    ProjectUpdate,
    ProjectImport,
    ExplainNow,
    ReviewWeekly,
    Other(String),
}

impl IntentKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::WhatNow => "what-now",
            Self::Status => "status",
            Self::ProjectUpdate => "project-update",
            Self::ProjectImport => "project-import",
            Self::ExplainNow => "explain-now",
            Self::ReviewWeekly => "review-weekly",
            Self::Other(name) => name,
        }
    }

    /// Fixed risk of a known kind; `None` for unknown kinds
    pub fn inherent_risk(&self) -> Option<Risk> {
        match self {
            Self::WhatNow | Self::Status | Self::ExplainNow | Self::ReviewWeekly => Some(Risk::ReadOnly),
            Self::ProjectUpdate | Self::ProjectImport => Some(Risk::Write),
            Self::Other(_) => None,
        }
    }
}

impl From<String> for IntentKind {
    fn from(value: String) -> Self {
        let normalized = value.trim().to_lowercase().replace('_', "-");
        match normalized.as_str() {
            "what-now" => Self::WhatNow,
            "status" => Self::Status,
            "project-update" => Self::ProjectUpdate,
            "project-import" => Self::ProjectImport,
            "explain-now" => Self::ExplainNow,
            "review-weekly" => Self::ReviewWeekly,
            _ => Self::Other(normalized),
        }
    }
}

impl From<IntentKind> for String {
    fn from(kind: IntentKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Risk {
    ReadOnly,
    /// Unknown risk is treated as a write
    #[default]
    Write,
}

/// Where an `ask` ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecState {
    Executed,
    NeedsConfirmation,
    NeedsClarification,
    Rejected,
}

/// A structured request produced from free text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedIntent {
    pub kind: IntentKind,
    #[serde(default)]
    pub risk: Risk,
    #[serde(default)]
    pub args: Map<String, Value>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub needs_confirmation: bool,
}

impl ParsedIntent {
    pub fn new(kind: IntentKind) -> Self {
        let risk = kind.inherent_risk().unwrap_or_default();
        Self {
            kind,
            risk,
            args: Map::new(),
            confidence: 1.0,
            needs_confirmation: false,
        }
    }

    pub fn with_arg(mut self, key: &str, value: Value) -> Self {
        self.args.insert(key.to_string(), value);
        self
    }

    /// One-line description for confirmation prompts
    pub fn describe(&self) -> String {
        if self.args.is_empty() {
            return self.kind.to_string();
        }
        let args: Vec<String> = self.args.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        format!("{} {}", self.kind, args.join(" "))
    }

    fn arg_str(&self, key: &str) -> Option<&str> {
        self.args
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// `available_min` as a number or numeric string, else the default
    pub fn available_min(&self) -> u32 {
        let parsed = match self.args.get("available_min") {
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
                .and_then(|n| u32::try_from(n).ok()),
            Some(Value::String(s)) => s.trim().parse::<u32>().ok(),
            _ => None,
        };
        parsed.unwrap_or_else(|| {
            if self.args.contains_key("available_min") {
                warn!(value = ?self.args.get("available_min"), "ParsedIntent::available_min: unusable value, using default");
            }
            DEFAULT_AVAILABLE_MIN
        })
    }
}

/// The NL collaborator's verdict on one `ask`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResolution {
    pub intent: ParsedIntent,
    pub state: ExecState,
    #[serde(default)]
    pub message: String,
}

impl AskResolution {
    /// Apply the fixed risk table and the no-unconfirmed-writes rule
    pub fn normalized(mut self) -> Self {
        if let Some(risk) = self.intent.kind.inherent_risk() {
            self.intent.risk = risk;
        }
        if self.state == ExecState::Executed && (self.intent.risk == Risk::Write || self.intent.needs_confirmation) {
            debug!(kind = %self.intent.kind, "AskResolution::normalized: downgrading to needs confirmation");
            self.state = ExecState::NeedsConfirmation;
        }
        self
    }
}

/// Result text of running an intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentOutput {
    pub text: String,
    /// Data changed; views should reload
    pub refresh: bool,
}

impl IntentOutput {
    fn read(text: String) -> Self {
        Self { text, refresh: false }
    }
}

/// Ask the NL collaborator to resolve free text
pub async fn resolve_ask(
    text: &str,
    services: &Services,
    context: &IntentContext,
) -> Result<AskResolution, ResolveError> {
    debug!(%text, "resolve_ask: called");
    let nl = services.nl.as_ref().ok_or(NlError::Unavailable)?;
    let resolution = nl.parse_intent(text, context).await?;
    Ok(resolution.normalized())
}

/// Run an intent against the collaborators
///
/// `scope` limits `status` and `review-weekly` to one project id.
pub async fn execute(
    intent: &ParsedIntent,
    services: &Services,
    scope: Option<&str>,
) -> Result<IntentOutput, ResolveError> {
    debug!(kind = %intent.kind, ?scope, "execute: called");
    match &intent.kind {
        IntentKind::WhatNow => {
            let rec = services.recommender.recommend(intent.available_min())?;
            Ok(IntentOutput::read(format::recommendation(&rec)))
        }
        IntentKind::Status => {
            let summaries = services.status.status(scope)?;
            Ok(IntentOutput::read(format::status(&summaries)))
        }
        IntentKind::ProjectUpdate => project_update(intent, services),
        IntentKind::ProjectImport => project_import(intent, services),
        IntentKind::ExplainNow => {
            let rec = services.recommender.recommend(intent.available_min())?;
            let facts = explain::explain_now(&rec);
            Ok(IntentOutput::read(narrate(services, &intent.kind, facts).await))
        }
        IntentKind::ReviewWeekly => {
            let summaries = services.status.status(scope)?;
            let sessions = services.repo.list_sessions(None)?;
            let facts = explain::review_weekly(&summaries, &sessions, Local::now().date_naive());
            Ok(IntentOutput::read(narrate(services, &intent.kind, facts).await))
        }
        IntentKind::Other(name) => {
            debug!(%name, "execute: unsupported intent kind");
            Ok(IntentOutput::read(format!(
                "I can't run '{}' from a question yet. Try an explicit command: \
                 `what-now`, `status`, `project update <ref> …` or `project import <path>` (see `help`).",
                name
            )))
        }
    }
}

/// Friendly rewrite by the NL collaborator, falling back to the facts
async fn narrate(services: &Services, kind: &IntentKind, facts: String) -> String {
    let Some(nl) = &services.nl else {
        return facts;
    };
    match nl.explain(kind, &facts).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => facts,
        Err(e) => {
            warn!(error = %e, "narrate: explanation failed, using deterministic text");
            facts
        }
    }
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ResolveError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ResolveError::InvalidArgument(format!("{} must be YYYY-MM-DD, got '{}'", field, value)))
}

fn project_update(intent: &ParsedIntent, services: &Services) -> Result<IntentOutput, ResolveError> {
    let reference = intent
        .arg_str("project_id")
        .or_else(|| intent.arg_str("project"))
        .ok_or_else(|| ResolveError::InvalidArgument("project-update needs a project_id".to_string()))?;
    let project = resolve_project(services.repo.as_ref(), reference)?;
    debug!(id = %project.id, "project_update: resolved project");

    // Validate everything before the first write
    let status = match intent.args.get("status") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.parse::<ProjectStatus>().map_err(ResolveError::InvalidArgument)?),
        Some(other) => {
            return Err(ResolveError::InvalidArgument(format!("status must be a string, got {}", other)));
        }
    };
    let target_date = match intent.args.get("target_date") {
        None => None,
        Some(Value::Null) => Some(None),
        Some(Value::String(s)) => Some(Some(parse_date("target_date", s)?)),
        Some(other) => {
            return Err(ResolveError::InvalidArgument(format!(
                "target_date must be a date string or null, got {}",
                other
            )));
        }
    };
    let name = intent.arg_str("name").map(str::to_string);
    let recalc = intent.args.get("recalc").and_then(Value::as_bool).unwrap_or(false);

    let update = ProjectUpdate {
        name,
        target_date,
        ..Default::default()
    };
    if update.is_empty() && status.is_none() && !recalc {
        return Err(ResolveError::InvalidArgument(
            "project-update needs at least one of name, target_date, status".to_string(),
        ));
    }

    let mut changes = Vec::new();
    let mut current = project;
    if !update.is_empty() {
        current = services.repo.update_project(&current.id, &update)?;
        if let Some(name) = &update.name {
            changes.push(format!("renamed to '{}'", name));
        }
        match update.target_date {
            Some(Some(date)) => changes.push(format!("target date {}", date)),
            Some(None) => changes.push("target date cleared".to_string()),
            None => {}
        }
    }

    // Second, separate write: not atomic with the field update above
    if let Some(new_status) = status {
        current = apply_project_status(services.repo.as_ref(), &current, new_status)?;
        changes.push(match new_status {
            ProjectStatus::Archived => "archived".to_string(),
            other => format!("status {}", other),
        });
    }

    let mut text = if changes.is_empty() {
        format!("{} unchanged", current.short_code)
    } else {
        format!("Updated {}: {}", current.short_code, changes.join(", "))
    };
    if recalc {
        let summaries = services.status.status(Some(&current.id))?;
        text.push('\n');
        text.push_str(&format::status(&summaries));
    }
    Ok(IntentOutput { text, refresh: true })
}

/// Move a project to `status`
///
/// `archived` goes through the archive call, which stamps `archived_at`.
/// Any other status unarchives first if needed, then writes the raw status.
pub fn apply_project_status(
    repo: &dyn Repository,
    project: &Project,
    status: ProjectStatus,
) -> Result<Project, StoreError> {
    debug!(id = %project.id, %status, "apply_project_status: called");
    if status == ProjectStatus::Archived {
        return repo.archive_project(&project.id);
    }
    if project.is_archived() {
        repo.unarchive_project(&project.id)?;
    }
    let raw = ProjectUpdate {
        status: Some(status),
        ..Default::default()
    };
    repo.update_project(&project.id, &raw)
}

fn project_import(intent: &ParsedIntent, services: &Services) -> Result<IntentOutput, ResolveError> {
    let path = intent
        .arg_str("path")
        .ok_or_else(|| ResolveError::InvalidArgument("project-import needs a path".to_string()))?;
    debug!(%path, "project_import: called");
    let text = std::fs::read_to_string(path).map_err(StoreError::from)?;
    let schema = ImportSchema::from_json(&text).map_err(StoreError::from)?;
    let errors = services.schema.validate(&schema);
    if !errors.is_empty() {
        return Err(StoreError::SchemaInvalid(errors).into());
    }
    let report = services.schema.import(&schema)?;
    Ok(IntentOutput {
        text: format::import_report(&report),
        refresh: true,
    })
}
