//! LLM-backed natural-language collaborator
//!
//! Every call asks the model for strict JSON (or plain prose for
//! explanations and help answers) and parses the reply with serde. Draft
//! conversations keep their message history here, keyed by conversation id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use planstore::ImportSchema;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::dispatch::catalog;
use crate::error::NlError;
use crate::intent::{AskResolution, IntentKind};
use crate::llm::{CompletionRequest, LlmClient, Message, extract_json};
use crate::services::{DraftStatus, DraftTurn, IntentContext, NlService};

pub mod explain;

const INTENT_PROMPT: &str = r#"You turn requests about a personal project planner into JSON.
Reply with exactly one JSON object and nothing else:
{"intent": {"kind": KIND, "args": {...}, "confidence": 0.0-1.0, "needs_confirmation": bool},
 "state": "executed" | "needs_confirmation" | "needs_clarification" | "rejected",
 "message": "one or two sentences for the user"}

Kinds and args:
- what-now: available_min (number)
- status: none
- project-update: project_id (short code or id), name, target_date (YYYY-MM-DD or null to clear),
  status (active, paused, done, archived), recalc (bool)
- project-import: path
- explain-now: available_min
- review-weekly: none

Use "executed" only for read-only kinds. Use "needs_clarification" when a required
argument is missing and say what is missing. Use "rejected" for anything else."#;

const EXPLAIN_PROMPT: &str = "You explain a project planner's output to its user. Rewrite the facts \
you are given as a short, friendly paragraph. Do not invent numbers, dates or items that are not in the facts.";

const HELP_PROMPT: &str = "You answer questions about the plandeck command shell. Answer in at most \
five sentences and name the exact commands to type. Only mention commands from this list:\n\n";

const DRAFT_PROMPT: &str = r#"You help the user draft a project plan for a personal planner.
Ask short questions until you know the project name, its rough structure and its time frame,
then produce a draft. Reply with exactly one JSON object and nothing else:
{"status": "gathering" | "ready", "message": "text for the user", "draft": PLAN or null}

PLAN is:
{"project": {"name": "...", "description": "...", "start_date": "YYYY-MM-DD", "target_date": "YYYY-MM-DD"},
 "nodes": [{"ref": "n1", "title": "...", "kind": "module|chapter|unit|milestone|exam|review",
            "order": 1, "due_date": "YYYY-MM-DD", "planned_min": 120, "parent_ref": null}],
 "work_items": [{"ref": "w1", "node_ref": "n1", "title": "...",
                 "type": "task|reading|practice|review|writing|assessment", "planned_min": 30}],
 "dependencies": [{"from_ref": "n1", "to_ref": "n2"}]}

Refs must be unique, orders start at 1 and increase, every node_ref and parent_ref must exist.
Use status "ready" only together with a complete draft. When the user asks for changes,
reply with the whole updated draft."#;

#[derive(Debug, Deserialize)]
struct DraftReply {
    status: DraftStatus,
    #[serde(default)]
    message: String,
    #[serde(default)]
    draft: Option<ImportSchema>,
}

/// [`NlService`] over any [`LlmClient`]
pub struct LlmNlService {
    client: Arc<dyn LlmClient>,
    max_tokens: u32,
    conversations: Mutex<HashMap<String, Vec<Message>>>,
}

impl LlmNlService {
    pub fn new(client: Arc<dyn LlmClient>, max_tokens: u32) -> Self {
        debug!(max_tokens, "LlmNlService::new: called");
        Self {
            client,
            max_tokens,
            conversations: Mutex::new(HashMap::new()),
        }
    }

    async fn complete(&self, system_prompt: String, messages: Vec<Message>) -> Result<String, NlError> {
        debug!(messages = messages.len(), "LlmNlService::complete: called");
        let request = CompletionRequest {
            system_prompt,
            messages,
            max_tokens: self.max_tokens,
        };
        let response = self.client.complete(request).await?;
        Ok(response.content.unwrap_or_default())
    }

    fn history(&self, conversation_id: &str) -> Option<Vec<Message>> {
        let conversations = self.conversations.lock().unwrap_or_else(|p| p.into_inner());
        conversations.get(conversation_id).cloned()
    }

    fn store_history(&self, conversation_id: &str, messages: Vec<Message>) {
        let mut conversations = self.conversations.lock().unwrap_or_else(|p| p.into_inner());
        conversations.insert(conversation_id.to_string(), messages);
    }

    /// Send a draft conversation and record the reply
    async fn draft_turn(&self, conversation_id: &str, mut messages: Vec<Message>) -> Result<DraftTurn, NlError> {
        let raw = self.complete(DRAFT_PROMPT.to_string(), messages.clone()).await?;
        messages.push(Message::assistant(raw.clone()));
        self.store_history(conversation_id, messages);

        let Some(json) = extract_json(&raw) else {
            debug!("LlmNlService::draft_turn: prose reply, still gathering");
            return Ok(DraftTurn {
                conversation_id: conversation_id.to_string(),
                status: DraftStatus::Gathering,
                message: raw.trim().to_string(),
                draft: None,
            });
        };
        let reply: DraftReply = serde_json::from_str(json).map_err(|e| {
            warn!(error = %e, "LlmNlService::draft_turn: unparseable draft reply");
            NlError::Parse(e.to_string())
        })?;
        Ok(DraftTurn {
            conversation_id: conversation_id.to_string(),
            status: reply.status,
            message: reply.message,
            draft: reply.draft,
        })
    }
}

fn context_block(context: &IntentContext) -> String {
    let mut lines = Vec::new();
    if let Some(today) = context.today {
        lines.push(format!("Today: {}", today));
    }
    match &context.active_project {
        Some(code) => lines.push(format!("Active project: {}", code)),
        None => lines.push("Active project: none".to_string()),
    }
    if !context.project_codes.is_empty() {
        lines.push(format!("Known projects: {}", context.project_codes.join(", ")));
    }
    lines.join("\n")
}

#[async_trait]
impl NlService for LlmNlService {
    async fn parse_intent(&self, text: &str, context: &IntentContext) -> Result<AskResolution, NlError> {
        debug!(%text, "LlmNlService::parse_intent: called");
        let system = format!("{}\n\n{}", INTENT_PROMPT, context_block(context));
        let raw = self.complete(system, vec![Message::user(text)]).await?;
        let json = extract_json(&raw).ok_or_else(|| NlError::Parse("reply contained no JSON object".to_string()))?;
        serde_json::from_str(json).map_err(|e| NlError::Parse(e.to_string()))
    }

    async fn explain(&self, kind: &IntentKind, facts: &str) -> Result<String, NlError> {
        debug!(%kind, "LlmNlService::explain: called");
        let prompt = format!("Request: {}\n\nFacts:\n{}", kind, facts);
        let text = self.complete(EXPLAIN_PROMPT.to_string(), vec![Message::user(prompt)]).await?;
        Ok(text.trim().to_string())
    }

    async fn answer(&self, question: &str, history: &[(String, String)]) -> Result<String, NlError> {
        debug!(%question, history = history.len(), "LlmNlService::answer: called");
        let system = format!("{}{}", HELP_PROMPT, catalog::help_text());
        let mut messages = Vec::with_capacity(history.len() * 2 + 1);
        for (q, a) in history {
            messages.push(Message::user(q.clone()));
            messages.push(Message::assistant(a.clone()));
        }
        messages.push(Message::user(question));
        let text = self.complete(system, messages).await?;
        Ok(text.trim().to_string())
    }

    async fn start_draft(&self, text: &str, seed: Option<&ImportSchema>) -> Result<DraftTurn, NlError> {
        debug!(%text, seeded = seed.is_some(), "LlmNlService::start_draft: called");
        let conversation_id = uuid::Uuid::now_v7().to_string();
        let opening = match seed {
            Some(schema) => {
                let json = schema.to_json_pretty().map_err(|e| NlError::Parse(e.to_string()))?;
                format!("{}\n\nStart from this plan:\n{}", text, json)
            }
            None => text.to_string(),
        };
        self.draft_turn(&conversation_id, vec![Message::user(opening)]).await
    }

    async fn next_draft_turn(&self, conversation_id: &str, text: &str) -> Result<DraftTurn, NlError> {
        debug!(%conversation_id, "LlmNlService::next_draft_turn: called");
        let mut messages = self
            .history(conversation_id)
            .ok_or_else(|| NlError::UnknownConversation(conversation_id.to_string()))?;
        messages.push(Message::user(text));
        self.draft_turn(conversation_id, messages).await
    }

    fn end_draft(&self, conversation_id: &str) {
        debug!(%conversation_id, "LlmNlService::end_draft: called");
        let mut conversations = self.conversations.lock().unwrap_or_else(|p| p.into_inner());
        conversations.remove(conversation_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::ExecState;
    use crate::llm::Role;
    use crate::llm::client::mock::MockLlmClient;
    use chrono::NaiveDate;

    fn service(texts: &[&str]) -> (Arc<MockLlmClient>, LlmNlService) {
        let client = Arc::new(MockLlmClient::with_texts(texts));
        (client.clone(), LlmNlService::new(client, 512))
    }

    #[tokio::test]
    async fn test_parse_intent_reads_fenced_json() {
        let reply = "```json\n{\"intent\": {\"kind\": \"what_now\", \"args\": {\"available_min\": 45}}, \
                     \"state\": \"executed\", \"message\": \"Let's see.\"}\n```";
        let (client, nl) = service(&[reply]);
        let context = IntentContext {
            active_project: Some("PSP".to_string()),
            project_codes: vec!["PSP".to_string(), "GAR".to_string()],
            today: NaiveDate::from_ymd_opt(2026, 2, 10),
        };
        let resolution = nl.parse_intent("I have 45 minutes", &context).await.unwrap();
        assert_eq!(resolution.intent.kind, IntentKind::WhatNow);
        assert_eq!(resolution.intent.available_min(), 45);
        assert_eq!(resolution.state, ExecState::Executed);

        let request = &client.requests()[0];
        assert!(request.system_prompt.contains("Active project: PSP"));
        assert!(request.system_prompt.contains("Today: 2026-02-10"));
    }

    #[tokio::test]
    async fn test_parse_intent_without_json_is_parse_error() {
        let (_client, nl) = service(&["I am not sure what you mean."]);
        let err = nl.parse_intent("hmm", &IntentContext::default()).await.unwrap_err();
        assert!(matches!(err, NlError::Parse(_)));
    }

    #[tokio::test]
    async fn test_draft_conversation_keeps_history() {
        let first = r#"{"status": "gathering", "message": "When is the deadline?", "draft": null}"#;
        let second = r#"{"status": "ready", "message": "Here you go.",
            "draft": {"project": {"name": "Garden"},
                      "nodes": [{"ref": "n1", "title": "Beds", "order": 1}],
                      "work_items": [{"ref": "w1", "node_ref": "n1", "title": "Dig", "type": "task", "planned_min": 30}]}}"#;
        let (client, nl) = service(&[first, second]);

        let turn = nl.start_draft("a vegetable garden", None).await.unwrap();
        assert_eq!(turn.status, DraftStatus::Gathering);
        assert_eq!(turn.message, "When is the deadline?");

        let turn = nl.next_draft_turn(&turn.conversation_id, "end of May").await.unwrap();
        assert_eq!(turn.status, DraftStatus::Ready);
        assert_eq!(turn.draft.unwrap().work_items.len(), 1);

        let roles: Vec<Role> = client.requests()[1].messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
    }

    #[tokio::test]
    async fn test_end_draft_forgets_conversation() {
        let (_client, nl) = service(&["What should the project be called?"]);
        let turn = nl.start_draft("something for school", None).await.unwrap();
        assert!(nl.history(&turn.conversation_id).is_some());

        nl.end_draft(&turn.conversation_id);
        assert!(nl.history(&turn.conversation_id).is_none());
        let err = nl.next_draft_turn(&turn.conversation_id, "hello").await.unwrap_err();
        assert!(matches!(err, NlError::UnknownConversation(_)));
    }

    #[tokio::test]
    async fn test_prose_draft_reply_keeps_gathering() {
        let (_client, nl) = service(&["What should the project be called?"]);
        let turn = nl.start_draft("something for school", None).await.unwrap();
        assert_eq!(turn.status, DraftStatus::Gathering);
        assert_eq!(turn.message, "What should the project be called?");
    }

    #[tokio::test]
    async fn test_unknown_conversation() {
        let (_client, nl) = service(&[]);
        let err = nl.next_draft_turn("nope", "hello").await.unwrap_err();
        assert!(matches!(err, NlError::UnknownConversation(_)));
    }

    #[tokio::test]
    async fn test_answer_sends_history_and_catalog() {
        let (client, nl) = service(&["Use `project archive <code>`."]);
        let history = vec![("hi".to_string(), "Hello!".to_string())];
        let answer = nl.answer("how do I archive?", &history).await.unwrap();
        assert_eq!(answer, "Use `project archive <code>`.");
        let request = &client.requests()[0];
        assert_eq!(request.messages.len(), 3);
        assert!(request.system_prompt.contains("project archive"));
    }
}
