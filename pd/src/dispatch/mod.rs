//! Command dispatcher
//!
//! One typed line in, one [`Outcome`] out. Built-ins run directly against
//! the session state; everything else is parsed by clap and handed to
//! [`crate::commands`]. Nothing here blocks on the LLM: long requests come
//! back as [`Outcome::Job`] for the caller to run.

use chrono::Local;
use clap::Parser;
use planstore::WorkItemStatus;
use tracing::{debug, info, warn};

use crate::cli::Cli;
use crate::commands;
use crate::draft::{DraftBridge, DraftRequest};
use crate::error::{DispatchError, ResolveError};
use crate::format;
use crate::intent::AskResolution;
use crate::jobs::Job;
use crate::resolve::{SHORT_ID_LEN, resolve_project, resolve_work_item};
use crate::services::{IntentContext, Services};
use crate::session::SessionState;
use crate::wizard::{Completion, ConfirmStep, EntityKind, EntityWizard, Flow, PendingAction};

pub mod catalog;
mod hints;
mod tokenize;

pub use tokenize::tokenize;

/// What the caller should do after a dispatch
#[derive(Debug)]
pub enum Outcome {
    Nothing,
    Output {
        text: String,
        /// Data changed; views should reload
        refresh: bool,
    },
    ClearTranscript,
    Exit,
    StartFlow(Flow),
    OpenHelpChat,
    OpenDraft {
        bridge: DraftBridge,
        first: DraftRequest,
    },
    Job(Job),
}

impl Outcome {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Output {
            text: text.into(),
            refresh: false,
        }
    }

    pub fn changed(text: impl Into<String>) -> Self {
        Self::Output {
            text: text.into(),
            refresh: true,
        }
    }
}

/// Tokenize and dispatch one line
pub fn dispatch(line: &str, session: &mut SessionState, services: &Services) -> Result<Outcome, DispatchError> {
    debug!(%line, "dispatch: called");
    let tokens = tokenize(line)?;
    dispatch_argv(tokens, session, services)
}

/// Dispatch already-split tokens (one-shot CLI, confirmed actions, wizards)
pub fn dispatch_argv(
    tokens: Vec<String>,
    session: &mut SessionState,
    services: &Services,
) -> Result<Outcome, DispatchError> {
    debug!(?tokens, "dispatch_argv: called");
    let outcome = route(&tokens, session, services)?;
    if let Outcome::Output { refresh: true, .. } = &outcome {
        session.invalidate_cache();
    }
    Ok(outcome)
}

fn route(tokens: &[String], session: &mut SessionState, services: &Services) -> Result<Outcome, DispatchError> {
    let Some(first) = tokens.first() else {
        return Ok(Outcome::Nothing);
    };
    let rest = &tokens[1..];
    match first.as_str() {
        "exit" | "quit" => Ok(Outcome::Exit),
        "clear" if rest.is_empty() => Ok(Outcome::ClearTranscript),
        "use" => use_project(rest, session, services),
        "inspect" => inspect(rest, session, services),
        "log" => log(rest, session, services),
        "start" => start(rest, session, services),
        "finish" => finish(rest, session, services),
        "context" => context(rest, session),
        group if rest.len() == 1 && rest[0] == "add" => match EntityKind::from_group(group) {
            Some(kind) => {
                debug!(?kind, "route: bare add, starting entity wizard");
                let active = session.active_project().zip(session.active_code());
                let wizard = EntityWizard::new(kind, services, active)?;
                Ok(Outcome::StartFlow(Flow::Entity(wizard)))
            }
            None => parse_and_run(tokens, session, services),
        },
        _ => parse_and_run(tokens, session, services),
    }
}

fn parse_and_run(tokens: &[String], session: &mut SessionState, services: &Services) -> Result<Outcome, DispatchError> {
    let argv = std::iter::once("pd".to_string()).chain(tokens.iter().cloned());
    match Cli::try_parse_from(argv) {
        Ok(cli) => match cli.command {
            Some(command) => commands::execute(command, tokens, session, services),
            None => Ok(Outcome::Nothing),
        },
        Err(err) => match hints::explain(&err, tokens, session.active_code()) {
            hints::ParseFailure::Display(text) => Ok(Outcome::text(text)),
            hints::ParseFailure::Usage(text) => Err(DispatchError::Usage(text)),
        },
    }
}

/// Turn a finished flow into the next outcome
pub fn complete_flow(
    completion: Completion,
    session: &mut SessionState,
    services: &Services,
) -> Result<Outcome, DispatchError> {
    debug!(?completion, "complete_flow: called");
    match completion {
        Completion::Confirmed(PendingAction::Argv(argv)) | Completion::Run(argv) => {
            dispatch_argv(argv, session, services)
        }
        Completion::Confirmed(PendingAction::Intent(intent)) => Ok(Outcome::Job(Job::Intent {
            intent,
            scope: session.active_project().map(String::from),
        })),
        Completion::Declined => Ok(Outcome::text("Not confirmed; nothing changed")),
        Completion::Imported(report) => {
            session.set_active_project(&report.project);
            session.invalidate_cache();
            Ok(Outcome::changed(format::import_report(&report)))
        }
        Completion::Refine { schema, summary } => {
            let (bridge, first) = DraftBridge::open(services, &summary, Some(schema))?;
            Ok(Outcome::OpenDraft { bridge, first })
        }
        Completion::Cancelled => Ok(Outcome::text("Cancelled")),
    }
}

/// Confirmation step for a write intent; empty answer means yes
pub fn confirm_intent(resolution: AskResolution) -> Flow {
    let mut question = resolution.message.trim().to_string();
    if !question.is_empty() {
        question.push(' ');
    }
    question.push_str(&format!("Apply {}?", resolution.intent.describe()));
    Flow::Confirm(ConfirmStep::intent(question, PendingAction::Intent(resolution.intent)))
}

/// What the NL collaborator should know about this session
pub fn intent_context(session: &mut SessionState, services: &Services) -> Result<IntentContext, DispatchError> {
    let projects = session.projects(services.repo.as_ref())?;
    Ok(IntentContext {
        active_project: session.active_code().map(String::from),
        project_codes: projects.into_iter().map(|p| p.short_code).collect(),
        today: Some(Local::now().date_naive()),
    })
}

fn use_project(args: &[String], session: &mut SessionState, services: &Services) -> Result<Outcome, DispatchError> {
    let Some(reference) = args.first() else {
        return Ok(Outcome::text(match session.active_code() {
            Some(code) => format!("Active project: {}", code),
            None => "No active project. Run `use <project>`.".to_string(),
        }));
    };
    let project = resolve_project(services.repo.as_ref(), reference)?;
    session.set_active_project(&project);
    info!(code = %project.short_code, "Active project set");
    let mut text = format!("Using {} ({})", project.short_code, project.name);
    if project.is_archived() {
        text.push_str(" [archived]");
    }
    Ok(Outcome::text(text))
}

fn inspect(args: &[String], session: &mut SessionState, services: &Services) -> Result<Outcome, DispatchError> {
    let reference = match (args.first(), session.active_project()) {
        (Some(reference), _) => reference.clone(),
        (None, Some(id)) => id.to_string(),
        (None, None) => return Err(ResolveError::NoActiveProject.into()),
    };
    let project = resolve_project(services.repo.as_ref(), &reference)?;
    let nodes = services.repo.list_nodes(&project.id, false)?;
    let items = services.repo.list_work_items(Some(&project.id), false)?;
    Ok(Outcome::text(format::tree(&project, &nodes, &items)))
}

fn parse_minutes(value: &str, usage: &str) -> Result<u32, DispatchError> {
    match value.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(DispatchError::User(format!(
            "'{}' is not a positive number of minutes. Usage: {}",
            value, usage
        ))),
    }
}

fn log(args: &[String], session: &mut SessionState, services: &Services) -> Result<Outcome, DispatchError> {
    const USAGE: &str = "log <minutes> [work] [note...]";
    let Some(minutes) = args.first() else {
        return Err(DispatchError::User(format!("Usage: {}", USAGE)));
    };
    let minutes = parse_minutes(minutes, USAGE)?;
    let scope = session.active_project();

    // With a work item started, only an id-length word names another item
    let has_active = session.active_work.is_some();
    let (item, note_words) = match args.get(1) {
        Some(reference) if has_active && reference.chars().count() < SHORT_ID_LEN => {
            (active_item(session, services)?, &args[1..])
        }
        Some(reference) => match resolve_work_item(services.repo.as_ref(), reference, scope) {
            Ok(item) => (item, &args[2..]),
            Err(ResolveError::NotFound { .. } | ResolveError::Ambiguous { .. }) if has_active => {
                (active_item(session, services)?, &args[1..])
            }
            Err(e) => return Err(e.into()),
        },
        None => (active_item(session, services)?, &args[1..]),
    };
    let note = (!note_words.is_empty()).then(|| note_words.join(" "));

    let logged = services.repo.log_session(&item.id, minutes, note.as_deref())?;
    session.record_logged(logged.minutes);
    info!(work_item = %item.id, minutes, "Logged session");
    Ok(Outcome::changed(format!("Logged {} on '{}'", format::minutes(minutes), item.title)))
}

fn active_item(session: &SessionState, services: &Services) -> Result<planstore::WorkItem, DispatchError> {
    let Some(active) = &session.active_work else {
        return Err(DispatchError::User(
            "No active work item. Run `start <work>` first or pass a work item id".to_string(),
        ));
    };
    Ok(resolve_work_item(services.repo.as_ref(), &active.id, None)?)
}

fn start(args: &[String], session: &mut SessionState, services: &Services) -> Result<Outcome, DispatchError> {
    let Some(reference) = args.first() else {
        return Err(DispatchError::User("Usage: start <work>".to_string()));
    };
    let item = resolve_work_item(services.repo.as_ref(), reference, session.active_project())?;
    if item.status == WorkItemStatus::Done {
        warn!(id = %item.id, "start: work item already done");
        return Err(DispatchError::User(format!("'{}' is already done", item.title)));
    }
    services.repo.set_work_item_status(&item.id, WorkItemStatus::InProgress)?;
    session.start_work(&item.id, &item.title);
    Ok(Outcome::changed(format!(
        "Started '{}' ({} remaining). `finish` logs the time.",
        item.title,
        format::minutes(item.remaining_min())
    )))
}

fn finish(args: &[String], session: &mut SessionState, services: &Services) -> Result<Outcome, DispatchError> {
    let Some(active) = session.active_work.clone() else {
        return Err(DispatchError::User("Nothing started. Run `start <work>` first".to_string()));
    };
    let minutes = match args.first() {
        Some(value) => parse_minutes(value, "finish [minutes]")?,
        None => active.elapsed_min(),
    };
    // Writes first: a failure leaves the session untouched
    services.repo.log_session(&active.id, minutes, None)?;
    services.repo.set_work_item_status(&active.id, WorkItemStatus::Done)?;
    session.finish_work();
    session.record_logged(minutes);
    Ok(Outcome::changed(format!(
        "Finished '{}': logged {}",
        active.title,
        format::minutes(minutes)
    )))
}

fn context(args: &[String], session: &mut SessionState) -> Result<Outcome, DispatchError> {
    match args {
        [] => Ok(Outcome::text(session.describe())),
        [word] if word == "clear" => {
            session.reset();
            Ok(Outcome::text("Session context cleared"))
        }
        _ => Err(DispatchError::User("Usage: context [clear]".to_string())),
    }
}
