//! Running parsed commands
//!
//! Each subcommand resolves its references, performs at most a few
//! repository calls and returns an [`Outcome`]. Destructive subcommands
//! without `--yes` return a confirmation flow holding the same argv plus
//! `--yes` instead of running.

use std::path::Path;

use chrono::NaiveDate;
use planstore::{
    ImportSchema, NodeKind, NodeUpdate, Project, ProjectStatus, ProjectUpdate, SchemaProject, WorkItemStatus,
    WorkItemType, WorkItemUpdate,
};
use tracing::{debug, info};

use crate::cli::{Command, NodeCommand, ProjectCommand, SessionCommand, TemplateCommand, WorkCommand};
use crate::dispatch::{Outcome, catalog, intent_context};
use crate::draft::DraftBridge;
use crate::error::{DispatchError, ResolveError};
use crate::format;
use crate::intent::{NO_NL_MESSAGE, apply_project_status};
use crate::jobs::Job;
use crate::resolve::{resolve_node, resolve_node_anywhere, resolve_project, resolve_session, resolve_work_item, short_id};
use crate::services::Services;
use crate::session::SessionState;
use crate::wizard::{ConfirmStep, Flow, PendingAction, StructureWizard, accept_schema};

pub fn execute(
    command: Command,
    tokens: &[String],
    session: &mut SessionState,
    services: &Services,
) -> Result<Outcome, DispatchError> {
    debug!(?command, "execute: called");
    match command {
        Command::Project { command } => project(command, tokens, session, services),
        Command::Node { command } => node(command, tokens, session, services),
        Command::Work { command } => work(command, tokens, session, services),
        Command::Session { command } => work_session(command, tokens, session, services),
        Command::Template { command } => template(command, tokens, session, services),
        Command::WhatNow { minutes } => Ok(Outcome::Job(Job::WhatNow { minutes })),
        Command::Status { all, project } => {
            let scope = match project {
                Some(reference) => Some(resolve_project(services.repo.as_ref(), &reference)?.id),
                None if all => None,
                None => session.active_project().map(String::from),
            };
            let summaries = services.status.status(scope.as_deref())?;
            Ok(Outcome::text(format::status(&summaries)))
        }
        Command::Replan { project } => {
            let project = scoped_project(project.as_deref(), session, services)?;
            let shifts = services.recommender.replan(&project.id)?;
            info!(code = %project.short_code, moved = shifts.len(), "Replanned project");
            if shifts.is_empty() {
                Ok(Outcome::text(format::shifts(&shifts)))
            } else {
                Ok(Outcome::changed(format::shifts(&shifts)))
            }
        }
        Command::Ask { yes, text } => {
            if !services.has_nl() {
                return Ok(Outcome::text(NO_NL_MESSAGE));
            }
            let context = intent_context(session, services)?;
            Ok(Outcome::Job(Job::Ask {
                text: text.join(" "),
                assume_yes: yes,
                context,
                scope: session.active_project().map(String::from),
            }))
        }
        Command::Help { topic } => help(&topic),
        Command::Shell { .. } => Err(DispatchError::User("Already in an interactive session".to_string())),
    }
}

fn help(topic: &[String]) -> Result<Outcome, DispatchError> {
    match topic {
        [] => Ok(Outcome::text(catalog::help_text())),
        [word] if word == "chat" => Ok(Outcome::OpenHelpChat),
        words => {
            let topic = words.join(" ");
            let entries = catalog::topic(&topic);
            if !entries.is_empty() {
                return Ok(Outcome::text(catalog::format_entries(entries.into_iter()).join("\n")));
            }
            let mut lines = vec![format!("No help topic '{}'.", topic)];
            let suggestions = catalog::suggest(&topic, 3);
            if !suggestions.is_empty() {
                lines.push("Did you mean:".to_string());
                lines.extend(catalog::format_entries(suggestions.into_iter()));
            }
            Ok(Outcome::text(lines.join("\n")))
        }
    }
}

/// Ask before running `tokens` again with `--yes`
fn confirm_first(tokens: &[String], question: String) -> Outcome {
    debug!(?tokens, "confirm_first: called");
    let mut argv = tokens.to_vec();
    argv.push("--yes".to_string());
    Outcome::StartFlow(Flow::Confirm(ConfirmStep::destructive(question, PendingAction::Argv(argv))))
}

/// Explicit project reference, else the active project
fn scoped_project(
    reference: Option<&str>,
    session: &SessionState,
    services: &Services,
) -> Result<Project, DispatchError> {
    let reference = match reference {
        Some(r) => r,
        None => session.active_project().ok_or(ResolveError::NoActiveProject)?,
    };
    Ok(resolve_project(services.repo.as_ref(), reference)?)
}

fn parse_date(value: &str) -> Result<NaiveDate, DispatchError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| DispatchError::User(format!("Invalid date '{}'; expected YYYY-MM-DD", value)))
}

fn parse_opt_date(value: Option<String>) -> Result<Option<NaiveDate>, DispatchError> {
    value.as_deref().map(parse_date).transpose()
}

fn read_schema(path: &Path) -> Result<ImportSchema, DispatchError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| DispatchError::User(format!("Cannot read {}: {}", path.display(), e)))?;
    ImportSchema::from_json(&text)
        .map_err(|e| DispatchError::User(format!("{} is not a valid plan schema: {}", path.display(), e)))
}

/// Validate, import and make the new project active
fn import_schema(schema: &ImportSchema, session: &mut SessionState, services: &Services) -> Result<Outcome, DispatchError> {
    let report = accept_schema(services, schema).map_err(|lines| DispatchError::User(lines.join("\n")))?;
    session.set_active_project(&report.project);
    Ok(Outcome::changed(format::import_report(&report)))
}

fn project(
    command: ProjectCommand,
    tokens: &[String],
    session: &mut SessionState,
    services: &Services,
) -> Result<Outcome, DispatchError> {
    let repo = services.repo.as_ref();
    match command {
        ProjectCommand::List { all } => Ok(Outcome::text(format::projects(&repo.list_projects(all)?))),
        ProjectCommand::Show { project } => {
            let project = resolve_project(repo, &project)?;
            Ok(Outcome::text(format::project_detail(&project)))
        }
        ProjectCommand::Add {
            name,
            description,
            start,
            target,
            code,
        } => {
            let header = SchemaProject {
                name,
                short_code: code,
                description: description.unwrap_or_default(),
                start_date: parse_opt_date(start)?,
                target_date: parse_opt_date(target)?,
            };
            let project = repo.create_project(&header)?;
            Ok(Outcome::changed(format!("Created project {} ({})", project.name, project.short_code)))
        }
        ProjectCommand::Update {
            project,
            name,
            description,
            start,
            target,
            clear_target,
            status,
        } => {
            let project = resolve_project(repo, &project)?;
            let status = status
                .as_deref()
                .map(str::parse::<ProjectStatus>)
                .transpose()
                .map_err(DispatchError::User)?;
            let update = ProjectUpdate {
                name,
                description,
                start_date: parse_opt_date(start)?.map(Some),
                target_date: if clear_target {
                    Some(None)
                } else {
                    parse_opt_date(target)?.map(Some)
                },
                status: None,
            };
            if update.is_empty() && status.is_none() {
                return Err(DispatchError::User(
                    "Nothing to update; pass --name, --description, --start, --target, --clear-target or --status"
                        .to_string(),
                ));
            }
            let mut current = project;
            if !update.is_empty() {
                current = repo.update_project(&current.id, &update)?;
            }
            if let Some(status) = status {
                current = apply_project_status(repo, &current, status)?;
            }
            Ok(Outcome::changed(format!(
                "Updated {}\n{}",
                current.short_code,
                format::project_detail(&current)
            )))
        }
        ProjectCommand::Archive { project, confirm } => {
            let project = resolve_project(repo, &project)?;
            if !confirm.yes {
                return Ok(confirm_first(
                    tokens,
                    format!("Archive project {} ({})?", project.short_code, project.name),
                ));
            }
            let project = repo.archive_project(&project.id)?;
            Ok(Outcome::changed(format!("Archived {}", project.short_code)))
        }
        ProjectCommand::Unarchive { project } => {
            let project = resolve_project(repo, &project)?;
            let project = repo.unarchive_project(&project.id)?;
            Ok(Outcome::changed(format!("Restored {}", project.short_code)))
        }
        ProjectCommand::Delete { project, confirm } => {
            let project = resolve_project(repo, &project)?;
            if !confirm.yes {
                return Ok(confirm_first(
                    tokens,
                    format!(
                        "Delete project {} ({}) with all its nodes, work items and sessions?",
                        project.short_code, project.name
                    ),
                ));
            }
            repo.delete_project(&project.id)?;
            if session.active_project() == Some(project.id.as_str()) {
                session.clear_active_project();
            }
            info!(code = %project.short_code, "Deleted project");
            Ok(Outcome::changed(format!("Deleted {}", project.short_code)))
        }
        ProjectCommand::Import { path } => {
            let schema = read_schema(&path)?;
            import_schema(&schema, session, services)
        }
        ProjectCommand::Init => Ok(Outcome::StartFlow(Flow::Structure(StructureWizard::default()))),
        ProjectCommand::Draft { text } => {
            let (bridge, first) = DraftBridge::open(services, &text.join(" "), None)?;
            Ok(Outcome::OpenDraft { bridge, first })
        }
    }
}

fn node(
    command: NodeCommand,
    tokens: &[String],
    session: &mut SessionState,
    services: &Services,
) -> Result<Outcome, DispatchError> {
    let repo = services.repo.as_ref();
    match command {
        NodeCommand::List { project } => {
            let project = scoped_project(project.as_deref(), session, services)?;
            Ok(Outcome::text(format::nodes(&repo.list_nodes(&project.id, false)?)))
        }
        NodeCommand::Add {
            title,
            project,
            parent,
            kind,
            due,
        } => {
            let project = scoped_project(project.as_deref(), session, services)?;
            let parent_id = match parent {
                Some(reference) => Some(resolve_node(repo, &reference, &project.id)?.id),
                None => None,
            };
            let kind = match kind {
                Some(k) => k.parse::<NodeKind>().map_err(DispatchError::User)?,
                None => NodeKind::default(),
            };
            let node = repo.add_node(&project.id, parent_id.as_deref(), &title, kind, parse_opt_date(due)?)?;
            Ok(Outcome::changed(format!(
                "Added {} '{}' ({}) to {}",
                node.kind,
                node.title,
                short_id(&node.id),
                project.short_code
            )))
        }
        NodeCommand::Update {
            node,
            title,
            kind,
            due,
            clear_due,
            planned_min,
        } => {
            let node = resolve_node_anywhere(repo, &node)?;
            let update = NodeUpdate {
                title,
                kind: kind
                    .as_deref()
                    .map(str::parse::<NodeKind>)
                    .transpose()
                    .map_err(DispatchError::User)?,
                due_date: if clear_due {
                    Some(None)
                } else {
                    parse_opt_date(due)?.map(Some)
                },
                planned_min: planned_min.map(Some),
            };
            if update == NodeUpdate::default() {
                return Err(DispatchError::User(
                    "Nothing to update; pass --title, --kind, --due, --clear-due or --planned-min".to_string(),
                ));
            }
            let node = repo.update_node(&node.id, &update)?;
            Ok(Outcome::changed(format!("Updated node '{}' ({})", node.title, short_id(&node.id))))
        }
        NodeCommand::Archive { node, confirm } => {
            let node = resolve_node_anywhere(repo, &node)?;
            if !confirm.yes {
                return Ok(confirm_first(tokens, format!("Archive node '{}'?", node.title)));
            }
            let node = repo.archive_node(&node.id)?;
            Ok(Outcome::changed(format!("Archived node '{}'", node.title)))
        }
        NodeCommand::Unarchive { node } => {
            let node = resolve_node_anywhere(repo, &node)?;
            let node = repo.unarchive_node(&node.id)?;
            Ok(Outcome::changed(format!("Restored node '{}'", node.title)))
        }
        NodeCommand::Delete { node, confirm } => {
            let node = resolve_node_anywhere(repo, &node)?;
            if !confirm.yes {
                return Ok(confirm_first(
                    tokens,
                    format!("Delete node '{}' with its children and work items?", node.title),
                ));
            }
            repo.delete_node(&node.id)?;
            Ok(Outcome::changed(format!("Deleted node '{}'", node.title)))
        }
    }
}

fn work(
    command: WorkCommand,
    tokens: &[String],
    session: &mut SessionState,
    services: &Services,
) -> Result<Outcome, DispatchError> {
    let repo = services.repo.as_ref();
    match command {
        WorkCommand::List { project, all } => {
            let scope = match project {
                Some(reference) => Some(resolve_project(repo, &reference)?.id),
                None => session.active_project().map(String::from),
            };
            let mut items = repo.list_work_items(scope.as_deref(), all)?;
            if !all {
                items.retain(|w| w.status != WorkItemStatus::Done);
            }
            Ok(Outcome::text(format::work_items(&items)))
        }
        WorkCommand::Add {
            title,
            node,
            item_type,
            minutes,
        } => {
            // Prefer the active project; fall back to every project
            let node = match session.active_project() {
                Some(project_id) => match resolve_node(repo, &node, project_id) {
                    Err(ResolveError::NotFound { .. }) => resolve_node_anywhere(repo, &node)?,
                    found => found?,
                },
                None => resolve_node_anywhere(repo, &node)?,
            };
            let item_type = match item_type {
                Some(t) => t.parse::<WorkItemType>().map_err(DispatchError::User)?,
                None => WorkItemType::default(),
            };
            if minutes == 0 {
                return Err(DispatchError::User("--minutes must be at least 1".to_string()));
            }
            let item = repo.add_work_item(&node.id, &title, item_type, minutes)?;
            Ok(Outcome::changed(format!(
                "Added work item '{}' ({}) to '{}'",
                item.title,
                short_id(&item.id),
                node.title
            )))
        }
        WorkCommand::Update {
            work,
            title,
            item_type,
            minutes,
            status,
        } => {
            let item = resolve_work_item(repo, &work, None)?;
            let update = WorkItemUpdate {
                title,
                item_type: item_type
                    .as_deref()
                    .map(str::parse::<WorkItemType>)
                    .transpose()
                    .map_err(DispatchError::User)?,
                planned_min: minutes,
                status: status
                    .as_deref()
                    .map(str::parse::<WorkItemStatus>)
                    .transpose()
                    .map_err(DispatchError::User)?,
            };
            if update == WorkItemUpdate::default() {
                return Err(DispatchError::User(
                    "Nothing to update; pass --title, --type, --minutes or --status".to_string(),
                ));
            }
            let item = repo.update_work_item(&item.id, &update)?;
            Ok(Outcome::changed(format!("Updated work item '{}'", item.title)))
        }
        WorkCommand::Done { work } => {
            let item = resolve_work_item(repo, &work, None)?;
            repo.set_work_item_status(&item.id, WorkItemStatus::Done)?;
            if session.active_work.as_ref().is_some_and(|w| w.id == item.id) {
                session.finish_work();
            }
            Ok(Outcome::changed(format!("Marked '{}' done", item.title)))
        }
        WorkCommand::Archive { work, confirm } => {
            let item = resolve_work_item(repo, &work, None)?;
            if !confirm.yes {
                return Ok(confirm_first(tokens, format!("Archive work item '{}'?", item.title)));
            }
            repo.archive_work_item(&item.id)?;
            Ok(Outcome::changed(format!("Archived work item '{}'", item.title)))
        }
        WorkCommand::Unarchive { work } => {
            let item = resolve_work_item(repo, &work, None)?;
            repo.unarchive_work_item(&item.id)?;
            Ok(Outcome::changed(format!("Restored work item '{}'", item.title)))
        }
        WorkCommand::Delete { work, confirm } => {
            let item = resolve_work_item(repo, &work, None)?;
            if !confirm.yes {
                return Ok(confirm_first(
                    tokens,
                    format!("Delete work item '{}' and its sessions?", item.title),
                ));
            }
            repo.delete_work_item(&item.id)?;
            if session.active_work.as_ref().is_some_and(|w| w.id == item.id) {
                session.finish_work();
            }
            Ok(Outcome::changed(format!("Deleted work item '{}'", item.title)))
        }
    }
}

fn work_session(
    command: SessionCommand,
    tokens: &[String],
    session: &mut SessionState,
    services: &Services,
) -> Result<Outcome, DispatchError> {
    let repo = services.repo.as_ref();
    match command {
        SessionCommand::List { work, limit } => {
            let work_id = match work {
                Some(reference) => Some(resolve_work_item(repo, &reference, None)?.id),
                None => None,
            };
            let mut sessions = repo.list_sessions(work_id.as_deref())?;
            let skip = sessions.len().saturating_sub(limit);
            sessions.drain(..skip);
            Ok(Outcome::text(format::sessions(&sessions)))
        }
        SessionCommand::Add { work, minutes, note } => {
            if minutes == 0 {
                return Err(DispatchError::User("minutes must be at least 1".to_string()));
            }
            let item = resolve_work_item(repo, &work, session.active_project())?;
            repo.log_session(&item.id, minutes, note.as_deref())?;
            session.record_logged(minutes);
            Ok(Outcome::changed(format!(
                "Logged {} on '{}'",
                format::minutes(minutes),
                item.title
            )))
        }
        SessionCommand::Delete { session: reference, confirm } => {
            let logged = resolve_session(repo, &reference)?;
            if !confirm.yes {
                return Ok(confirm_first(
                    tokens,
                    format!("Delete the {} session {}?", format::minutes(logged.minutes), short_id(&logged.id)),
                ));
            }
            repo.delete_session(&logged.id)?;
            Ok(Outcome::changed(format!("Deleted session {}", short_id(&logged.id))))
        }
    }
}

/// Move a template's dates so the plan starts on `start`
fn retarget(schema: &mut ImportSchema, start: NaiveDate) {
    if let Some(old) = schema.project.start_date {
        let delta = start.signed_duration_since(old);
        for node in &mut schema.nodes {
            node.due_date = node.due_date.and_then(|d| d.checked_add_signed(delta));
        }
        schema.project.target_date = schema.project.target_date.and_then(|d| d.checked_add_signed(delta));
    }
    schema.project.start_date = Some(start);
}

fn template(
    command: TemplateCommand,
    tokens: &[String],
    session: &mut SessionState,
    services: &Services,
) -> Result<Outcome, DispatchError> {
    let repo = services.repo.as_ref();
    let find = |name: &str| {
        repo.get_template(name)?.ok_or_else(|| {
            DispatchError::from(ResolveError::NotFound {
                kind: "template",
                reference: name.to_string(),
            })
        })
    };
    match command {
        TemplateCommand::List => Ok(Outcome::text(format::templates(&repo.list_templates()?))),
        TemplateCommand::Show { name } => {
            let template = find(&name)?;
            let json = template
                .schema
                .to_json_pretty()
                .map_err(|e| DispatchError::User(format!("Cannot show template: {}", e)))?;
            Ok(Outcome::text(json))
        }
        TemplateCommand::Add { name, from } => {
            let schema = read_schema(&from)?;
            let errors = services.schema.validate(&schema);
            if !errors.is_empty() {
                return Err(DispatchError::User(format::validation_errors(&errors)));
            }
            let template = repo.save_template(&name, &schema)?;
            Ok(Outcome::changed(format!("Saved template '{}'", template.name)))
        }
        TemplateCommand::Apply {
            name,
            project_name,
            start,
        } => {
            let template = find(&name)?;
            let mut schema = template.schema;
            schema.project.short_code = None;
            if let Some(project_name) = project_name {
                schema.project.name = project_name;
            }
            if let Some(start) = parse_opt_date(start)? {
                retarget(&mut schema, start);
            }
            import_schema(&schema, session, services)
        }
        TemplateCommand::Delete { name, confirm } => {
            let template = find(&name)?;
            if !confirm.yes {
                return Ok(confirm_first(tokens, format!("Delete template '{}'?", template.name)));
            }
            repo.delete_template(&template.id)?;
            Ok(Outcome::changed(format!("Deleted template '{}'", template.name)))
        }
    }
}
