//! Draft conversation bridge
//!
//! A draft conversation builds a project plan by talking to the NL
//! collaborator. While gathering, every line is forwarded as a turn. Once the
//! collaborator reports a ready draft the user can accept it (validate and
//! import), edit it (back to gathering) or cancel.

use std::fmt;

use planstore::{ImportReport, ImportSchema};
use tracing::{debug, warn};

use crate::error::{DispatchError, NlError};
use crate::intent::NO_NL_MESSAGE;
use crate::services::{DraftStatus, DraftTurn, NlService, Services};
use crate::wizard::accept_schema;

/// One request to the collaborator; sent from a detached task
#[derive(Debug, Clone, PartialEq)]
pub struct DraftRequest {
    /// `None` starts a new conversation
    pub conversation_id: Option<String>,
    pub text: String,
    pub seed: Option<ImportSchema>,
}

impl DraftRequest {
    pub async fn send(self, nl: &dyn NlService) -> Result<DraftTurn, NlError> {
        debug!(conversation_id = ?self.conversation_id, "DraftRequest::send: called");
        match &self.conversation_id {
            Some(id) => nl.next_draft_turn(id, &self.text).await,
            None => nl.start_draft(&self.text, self.seed.as_ref()).await,
        }
    }
}

/// What the caller should do with a submitted line
#[derive(Debug, Clone, PartialEq)]
pub enum DraftAction {
    Send(DraftRequest),
    Accept,
    Cancel,
    /// Show this and wait for the next line
    Info(String),
}

/// State of one draft conversation
#[derive(Clone)]
pub struct DraftBridge {
    conversation_id: Option<String>,
    state: DraftStatus,
    draft: Option<ImportSchema>,
    transcript: Vec<String>,
    pending: bool,
    /// Resent if the opening request fails
    seed: Option<ImportSchema>,
}

impl fmt::Debug for DraftBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DraftBridge")
            .field("conversation_id", &self.conversation_id)
            .field("state", &self.state)
            .field("has_draft", &self.draft.is_some())
            .field("pending", &self.pending)
            .finish()
    }
}

impl DraftBridge {
    /// Open a conversation; requires the NL collaborator
    ///
    /// Returns the bridge and the first request to send.
    pub fn open(
        services: &Services,
        text: &str,
        seed: Option<ImportSchema>,
    ) -> Result<(Self, DraftRequest), DispatchError> {
        debug!(%text, seeded = seed.is_some(), "DraftBridge::open: called");
        if !services.has_nl() {
            return Err(DispatchError::User(NO_NL_MESSAGE.to_string()));
        }
        let bridge = Self {
            conversation_id: None,
            state: DraftStatus::Gathering,
            draft: None,
            transcript: vec![format!("you: {}", text)],
            pending: true,
            seed: seed.clone(),
        };
        let request = DraftRequest {
            conversation_id: None,
            text: text.to_string(),
            seed,
        };
        Ok((bridge, request))
    }

    pub fn state(&self) -> DraftStatus {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn draft(&self) -> Option<&ImportSchema> {
        self.draft.as_ref()
    }

    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    pub fn prompt(&self) -> String {
        match self.state {
            DraftStatus::Gathering => "Reply (or `cancel`)".to_string(),
            DraftStatus::Ready => "accept, edit or cancel".to_string(),
        }
    }

    /// Decide what one typed line means
    pub fn plan_submit(&mut self, input: &str) -> DraftAction {
        let text = input.trim();
        debug!(state = ?self.state, pending = self.pending, %text, "DraftBridge::plan_submit: called");
        if self.pending {
            return DraftAction::Info("Still waiting for the previous reply".to_string());
        }
        let lower = text.to_lowercase();
        match self.state {
            DraftStatus::Gathering => match lower.as_str() {
                "" => DraftAction::Info("Type a message, or `cancel`".to_string()),
                "cancel" => DraftAction::Cancel,
                _ => {
                    self.transcript.push(format!("you: {}", text));
                    self.pending = true;
                    DraftAction::Send(DraftRequest {
                        conversation_id: self.conversation_id.clone(),
                        text: text.to_string(),
                        seed: self.conversation_id.is_none().then(|| self.seed.clone()).flatten(),
                    })
                }
            },
            DraftStatus::Ready => match lower.as_str() {
                "accept" | "a" => DraftAction::Accept,
                "edit" | "e" => {
                    self.state = DraftStatus::Gathering;
                    DraftAction::Info("What should change?".to_string())
                }
                "cancel" | "c" => DraftAction::Cancel,
                _ => DraftAction::Info("Type accept, edit or cancel".to_string()),
            },
        }
    }

    /// Record the collaborator's reply
    pub fn apply_turn(&mut self, turn: DraftTurn) {
        debug!(status = ?turn.status, has_draft = turn.draft.is_some(), "DraftBridge::apply_turn: called");
        self.pending = false;
        self.conversation_id = Some(turn.conversation_id);
        if let Some(draft) = turn.draft {
            self.draft = Some(draft);
        }
        self.transcript.push(turn.message);
        self.state = match turn.status {
            DraftStatus::Ready if self.draft.is_none() => {
                warn!("DraftBridge::apply_turn: ready without a draft, still gathering");
                DraftStatus::Gathering
            }
            status => status,
        };
        if self.state == DraftStatus::Ready {
            self.transcript.extend(self.summary());
        }
    }

    /// Record a failed turn; the user may try again
    pub fn apply_failure(&mut self, message: &str) {
        warn!(%message, "DraftBridge::apply_failure: called");
        self.pending = false;
        self.transcript.push(format!("Error: {}", message));
    }

    /// Validate and import the ready draft
    pub fn accept(&self, services: &Services) -> Result<ImportReport, Vec<String>> {
        debug!("DraftBridge::accept: called");
        match &self.draft {
            Some(draft) => accept_schema(services, draft),
            None => Err(vec!["There is no draft yet".to_string()]),
        }
    }

    /// Release the collaborator's conversation; call when the draft ends
    pub fn close(&self, services: &Services) {
        debug!(conversation_id = ?self.conversation_id, "DraftBridge::close: called");
        if let (Some(id), Some(nl)) = (&self.conversation_id, &services.nl) {
            nl.end_draft(id);
        }
    }

    /// Short description of the current draft
    pub fn summary(&self) -> Vec<String> {
        let Some(draft) = &self.draft else {
            return Vec::new();
        };
        let mut lines = vec![format!(
            "Draft: {} with {} nodes, {} work items, {} planned minutes",
            draft.project.name,
            draft.nodes.len(),
            draft.work_items.len(),
            draft.total_planned_min()
        )];
        lines.extend(draft.nodes.iter().take(8).map(|n| {
            let due = n.due_date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());
            format!("  {:>3}. {} ({})", n.order, n.title, due)
        }));
        if draft.nodes.len() > 8 {
            lines.push(format!("  ... and {} more", draft.nodes.len() - 8));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{temp_services, temp_services_with_nl};
    use async_trait::async_trait;
    use planstore::{SchemaNode, SchemaProject};
    use std::sync::{Arc, Mutex};

    use crate::intent::{AskResolution, IntentKind};
    use crate::services::IntentContext;

    fn schema() -> ImportSchema {
        ImportSchema {
            project: SchemaProject {
                name: "Garden".to_string(),
                ..Default::default()
            },
            nodes: vec![SchemaNode {
                ref_id: "n1".to_string(),
                title: "Beds".to_string(),
                kind: Default::default(),
                order: 1,
                due_date: None,
                planned_min: None,
                parent_ref: None,
            }],
            ..Default::default()
        }
    }

    /// Answers every draft turn with a ready draft
    #[derive(Default)]
    struct ReadyNl {
        ended: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NlService for ReadyNl {
        async fn parse_intent(&self, _text: &str, _context: &IntentContext) -> Result<AskResolution, NlError> {
            Err(NlError::Unavailable)
        }

        async fn explain(&self, _kind: &IntentKind, _facts: &str) -> Result<String, NlError> {
            Err(NlError::Unavailable)
        }

        async fn answer(&self, _question: &str, _history: &[(String, String)]) -> Result<String, NlError> {
            Err(NlError::Unavailable)
        }

        async fn start_draft(&self, _text: &str, _seed: Option<&ImportSchema>) -> Result<DraftTurn, NlError> {
            Ok(ready_turn())
        }

        async fn next_draft_turn(&self, conversation_id: &str, _text: &str) -> Result<DraftTurn, NlError> {
            Ok(DraftTurn {
                conversation_id: conversation_id.to_string(),
                ..ready_turn()
            })
        }

        fn end_draft(&self, conversation_id: &str) {
            self.ended.lock().unwrap().push(conversation_id.to_string());
        }
    }

    fn ready_turn() -> DraftTurn {
        DraftTurn {
            conversation_id: "c1".to_string(),
            status: DraftStatus::Ready,
            message: "Here is a plan".to_string(),
            draft: Some(schema()),
        }
    }

    #[test]
    fn test_open_requires_nl() {
        let (_dir, services) = temp_services();
        let err = DraftBridge::open(&services, "a garden plan", None).unwrap_err();
        assert!(err.to_string().contains("LLM"));
    }

    #[tokio::test]
    async fn test_ready_then_edit_then_accept() {
        let (_dir, services) = temp_services_with_nl(Arc::new(ReadyNl::default()));
        let (mut bridge, first) = DraftBridge::open(&services, "a garden plan", None).unwrap();
        assert!(bridge.is_pending());
        assert!(matches!(bridge.plan_submit("more"), DraftAction::Info(_)));

        let nl = services.nl.clone().unwrap();
        bridge.apply_turn(first.send(nl.as_ref()).await.unwrap());
        assert_eq!(bridge.state(), DraftStatus::Ready);

        assert!(matches!(bridge.plan_submit("edit"), DraftAction::Info(_)));
        assert_eq!(bridge.state(), DraftStatus::Gathering);
        let DraftAction::Send(request) = bridge.plan_submit("add a compost node") else {
            panic!("expected a send");
        };
        assert_eq!(request.conversation_id.as_deref(), Some("c1"));
        bridge.apply_turn(request.send(nl.as_ref()).await.unwrap());

        assert_eq!(bridge.plan_submit("accept"), DraftAction::Accept);
        let report = bridge.accept(&services).unwrap();
        assert_eq!(report.project.name, "Garden");
    }

    #[tokio::test]
    async fn test_close_releases_conversation() {
        let nl = Arc::new(ReadyNl::default());
        let (_dir, services) = temp_services_with_nl(nl.clone());
        let (mut bridge, first) = DraftBridge::open(&services, "a garden plan", None).unwrap();
        // Nothing to release before the collaborator names the conversation
        bridge.close(&services);
        assert!(nl.ended.lock().unwrap().is_empty());

        bridge.apply_turn(first.send(nl.as_ref()).await.unwrap());
        bridge.close(&services);
        assert_eq!(*nl.ended.lock().unwrap(), vec!["c1".to_string()]);
    }

    #[test]
    fn test_ready_without_draft_keeps_gathering() {
        let (_dir, services) = temp_services_with_nl(Arc::new(ReadyNl::default()));
        let (mut bridge, _) = DraftBridge::open(&services, "plan", None).unwrap();
        bridge.apply_turn(DraftTurn {
            conversation_id: "c9".to_string(),
            status: DraftStatus::Ready,
            message: "done?".to_string(),
            draft: None,
        });
        assert_eq!(bridge.state(), DraftStatus::Gathering);
        assert!(bridge.accept(&services).is_err());
    }

    #[test]
    fn test_failure_clears_pending() {
        let (_dir, services) = temp_services_with_nl(Arc::new(ReadyNl::default()));
        let (mut bridge, _) = DraftBridge::open(&services, "plan", None).unwrap();
        bridge.apply_failure("timed out");
        assert!(!bridge.is_pending());
        assert_eq!(bridge.plan_submit("cancel"), DraftAction::Cancel);
    }
}
