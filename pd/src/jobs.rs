//! Long-running requests
//!
//! Recommendations, NL requests, draft turns and help-chat answers may take
//! a while. The dispatcher returns them as [`Job`] values instead of running
//! them; the TUI spawns them as detached tasks, the line shell awaits them.

use std::fmt;

use tracing::{debug, warn};

use crate::draft::DraftRequest;
use crate::error::{NlError, ResolveError};
use crate::format;
use crate::intent::{self, AskResolution, ExecState, NO_NL_MESSAGE, ParsedIntent};
use crate::nl::explain;
use crate::services::{DraftTurn, IntentContext, Services};

/// A request to run off the input loop
#[derive(Clone)]
pub enum Job {
    /// Resolve and (when allowed) run an `ask`
    Ask {
        text: String,
        /// Skip the confirmation for writes (`ask --yes`)
        assume_yes: bool,
        context: IntentContext,
        scope: Option<String>,
    },
    /// Run an intent the user already confirmed
    Intent { intent: ParsedIntent, scope: Option<String> },
    WhatNow { minutes: u32 },
    Draft(DraftRequest),
    HelpAnswer {
        question: String,
        history: Vec<(String, String)>,
    },
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ask { text, assume_yes, .. } => write!(f, "Job::Ask({:?}, assume_yes={})", text, assume_yes),
            Self::Intent { intent, .. } => write!(f, "Job::Intent({})", intent.describe()),
            Self::WhatNow { minutes } => write!(f, "Job::WhatNow({})", minutes),
            Self::Draft(request) => write!(f, "Job::Draft({:?})", request.conversation_id),
            Self::HelpAnswer { question, .. } => write!(f, "Job::HelpAnswer({:?})", question),
        }
    }
}

impl Job {
    /// Short label for progress indicators
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ask { .. } | Self::Intent { .. } => "ask",
            Self::WhatNow { .. } => "what-now",
            Self::Draft(_) => "draft",
            Self::HelpAnswer { .. } => "help",
        }
    }
}

/// What a finished job produced
#[derive(Debug, Clone, PartialEq)]
pub enum JobResult {
    Text { text: String, refresh: bool },
    /// A write intent waiting for confirmation
    Confirm(AskResolution),
    Draft(DraftTurn),
    Answer { question: String, answer: String },
    Failed(String),
}

impl JobResult {
    fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            refresh: false,
        }
    }
}

/// Add guidance to errors the user can act on
fn with_guidance(message: String, timed_out: bool) -> String {
    if timed_out {
        format!("{}. The LLM took too long; raise `llm.timeout-ms` in the config file.", message)
    } else {
        message
    }
}

fn failure(err: &ResolveError) -> String {
    with_guidance(err.to_string(), matches!(err, ResolveError::Nl(e) if e.is_timeout()))
}

fn nl_failure(err: &NlError) -> String {
    with_guidance(err.to_string(), err.is_timeout())
}

pub async fn run(job: Job, services: Services) -> JobResult {
    debug!(?job, "jobs::run: called");
    match job {
        Job::Ask {
            text,
            assume_yes,
            context,
            scope,
        } => {
            let resolution = match intent::resolve_ask(&text, &services, &context).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "jobs::run: ask could not be resolved");
                    return JobResult::Failed(failure(&e));
                }
            };
            debug!(state = ?resolution.state, kind = %resolution.intent.kind, "jobs::run: ask resolved");
            match resolution.state {
                ExecState::Executed => execute(&resolution.intent, &services, scope, Some(&resolution.message)).await,
                ExecState::NeedsConfirmation if assume_yes => {
                    execute(&resolution.intent, &services, scope, Some(&resolution.message)).await
                }
                ExecState::NeedsConfirmation => JobResult::Confirm(resolution),
                ExecState::NeedsClarification | ExecState::Rejected => JobResult::text(resolution.message),
            }
        }
        Job::Intent { intent, scope } => execute(&intent, &services, scope, None).await,
        Job::WhatNow { minutes } => match services.recommender.recommend(minutes) {
            Ok(rec) => JobResult::text(format::recommendation(&rec)),
            Err(e) => JobResult::Failed(e.to_string()),
        },
        Job::Draft(request) => {
            let Some(nl) = services.nl.clone() else {
                return JobResult::Failed(NO_NL_MESSAGE.to_string());
            };
            match request.send(nl.as_ref()).await {
                Ok(turn) => JobResult::Draft(turn),
                Err(e) => JobResult::Failed(nl_failure(&e)),
            }
        }
        Job::HelpAnswer { question, history } => {
            let answer = match &services.nl {
                Some(nl) => match nl.answer(&question, &history).await {
                    Ok(answer) => answer,
                    Err(e) => {
                        warn!(error = %e, "jobs::run: help answer failed, using catalog");
                        explain::help_answer(&question)
                    }
                },
                None => explain::help_answer(&question),
            };
            JobResult::Answer { question, answer }
        }
    }
}

async fn execute(intent: &ParsedIntent, services: &Services, scope: Option<String>, preface: Option<&str>) -> JobResult {
    match intent::execute(intent, services, scope.as_deref()).await {
        Ok(output) => {
            let text = match preface.map(str::trim).filter(|m| !m.is_empty()) {
                Some(message) => format!("{}\n\n{}", message, output.text),
                None => output.text,
            };
            JobResult::Text {
                text,
                refresh: output.refresh,
            }
        }
        Err(e) => {
            warn!(error = %e, kind = %intent.kind, "jobs::execute: intent failed");
            JobResult::Failed(failure(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::IntentKind;
    use crate::llm::client::mock::MockLlmClient;
    use crate::nl::LlmNlService;
    use crate::services::testing::{add_project, temp_services, temp_services_with_nl};
    use planstore::ProjectStatus;
    use std::sync::Arc;

    fn nl_with(texts: &[&str]) -> Arc<LlmNlService> {
        Arc::new(LlmNlService::new(Arc::new(MockLlmClient::with_texts(texts)), 1024))
    }

    fn ask(text: &str, assume_yes: bool) -> Job {
        Job::Ask {
            text: text.to_string(),
            assume_yes,
            context: IntentContext::default(),
            scope: None,
        }
    }

    #[tokio::test]
    async fn test_ask_without_nl_fails_with_guidance() {
        let (_dir, services) = temp_services();
        match run(ask("what now", false), services).await {
            JobResult::Failed(text) => assert!(text.contains("not configured")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_only_ask_executes_without_prompt() {
        let reply = r#"{"intent": {"kind": "status"}, "state": "executed", "message": "Here is where things stand."}"#;
        let (_dir, services) = temp_services_with_nl(nl_with(&[reply]));
        add_project(&services, "Garden");
        match run(ask("how am I doing", false), services).await {
            JobResult::Text { text, .. } => {
                assert!(text.starts_with("Here is where things stand."));
                assert!(text.contains("GAR"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_write_ask_waits_for_confirmation() {
        // Claims executed, but a write must be confirmed first
        let reply = r#"{"intent": {"kind": "project_update", "args": {"project_id": "GAR", "status": "paused"}},
                        "state": "executed", "message": "Pausing Garden."}"#;
        let (_dir, services) = temp_services_with_nl(nl_with(&[reply]));
        let project = add_project(&services, "Garden");
        let result = run(ask("pause the garden", false), services.clone()).await;
        let JobResult::Confirm(resolution) = result else {
            panic!("expected confirmation, got {:?}", result);
        };
        assert_eq!(resolution.intent.kind, IntentKind::ProjectUpdate);
        let unchanged = services.repo.get_project(&project.id).unwrap().unwrap();
        assert_eq!(unchanged.status, ProjectStatus::Active);

        let confirmed = Job::Intent {
            intent: resolution.intent,
            scope: None,
        };
        assert!(matches!(run(confirmed, services.clone()).await, JobResult::Text { refresh: true, .. }));
        let paused = services.repo.get_project(&project.id).unwrap().unwrap();
        assert_eq!(paused.status, ProjectStatus::Paused);
    }

    #[tokio::test]
    async fn test_assume_yes_runs_write() {
        let reply = r#"{"intent": {"kind": "project-update", "args": {"project_id": "GAR", "name": "Garden 2"}},
                        "state": "needs_confirmation", "message": "Renaming."}"#;
        let (_dir, services) = temp_services_with_nl(nl_with(&[reply]));
        let project = add_project(&services, "Garden");
        assert!(matches!(run(ask("rename", true), services.clone()).await, JobResult::Text { .. }));
        assert_eq!(services.repo.get_project(&project.id).unwrap().unwrap().name, "Garden 2");
    }

    #[tokio::test]
    async fn test_clarification_is_message_only() {
        let reply = r#"{"intent": {"kind": "project_update"}, "state": "needs_clarification", "message": "Which project?"}"#;
        let (_dir, services) = temp_services_with_nl(nl_with(&[reply]));
        assert_eq!(
            run(ask("change it", true), services).await,
            JobResult::Text {
                text: "Which project?".to_string(),
                refresh: false
            }
        );
    }

    #[tokio::test]
    async fn test_help_answer_falls_back_to_catalog() {
        let (_dir, services) = temp_services();
        let job = Job::HelpAnswer {
            question: "how do I archive a project".to_string(),
            history: Vec::new(),
        };
        match run(job, services).await {
            JobResult::Answer { answer, .. } => assert!(answer.contains("project archive")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
