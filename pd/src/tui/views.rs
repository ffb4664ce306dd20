//! TUI views
//!
//! Pure view data and per-view key handling. Rendering lives in `render`;
//! anything that touches services or the session is done by the `App` in
//! response to the [`ViewEvent`] a view returns.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use planstore::{Project, ProjectSummary, WorkItem};
use rand::seq::IndexedRandom;

use super::app::{Load, Reply, Request};
use crate::draft::DraftBridge;
use crate::jobs::{Job, JobResult};
use crate::wizard::Flow;

const WORKING_WORDS: &[&str] = &["working", "thinking", "fetching", "pondering", "sorting", "tallying"];

/// An outstanding detached request; completions with another token are stale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pending {
    pub token: u64,
    pub word: &'static str,
}

impl Pending {
    pub fn new(token: u64) -> Self {
        let word = WORKING_WORDS.choose(&mut rand::rng()).copied().unwrap_or("working");
        Self { token, word }
    }
}

/// Selection state for list views
#[derive(Debug, Default, Clone)]
pub struct Selection {
    pub index: usize,
    /// Rows available for the list, updated on resize
    pub page: u16,
}

impl Selection {
    pub fn next(&mut self, len: usize) {
        if len > 0 && self.index < len - 1 {
            self.index += 1;
        }
    }

    pub fn prev(&mut self) {
        self.index = self.index.saturating_sub(1);
    }

    pub fn clamp(&mut self, len: usize) {
        if len == 0 {
            self.index = 0;
        } else if self.index >= len {
            self.index = len - 1;
        }
    }

    /// First visible row so the selection stays on screen
    pub fn offset(&self) -> usize {
        let page = usize::from(self.page.max(1));
        self.index.saturating_sub(page - 1)
    }
}

/// What a view made of a key
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// Not for this view; the app applies its global keys
    Ignored,
    Handled,
    /// A capturing view submitted a line
    Submit(String),
    /// A capturing view asked to be cancelled
    Cancel,
    /// Enter on a list row
    Drill,
}

#[derive(Debug, Default)]
pub struct DashboardView {
    pub summaries: Vec<ProjectSummary>,
    pub selection: Selection,
    pub pending: Option<Pending>,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct ProjectListView {
    pub projects: Vec<Project>,
    pub selection: Selection,
    pub pending: Option<Pending>,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct TaskListView {
    /// `None` lists every project's items
    pub project_id: Option<String>,
    pub label: String,
    pub items: Vec<WorkItem>,
    pub selection: Selection,
    pub pending: Option<Pending>,
    pub error: Option<String>,
}

/// Things to do with one work item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Start,
    LogQuarterHour,
    Done,
    Archive,
    Delete,
}

impl MenuAction {
    pub const ALL: [MenuAction; 5] = [
        MenuAction::Start,
        MenuAction::LogQuarterHour,
        MenuAction::Done,
        MenuAction::Archive,
        MenuAction::Delete,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Start => "Start working on it",
            Self::LogQuarterHour => "Log 15 minutes",
            Self::Done => "Mark done",
            Self::Archive => "Archive",
            Self::Delete => "Delete",
        }
    }

    /// Command line this action runs through the dispatcher
    pub fn argv(&self, work_id: &str) -> Vec<String> {
        let words: Vec<&str> = match self {
            Self::Start => vec!["start", work_id],
            Self::LogQuarterHour => vec!["log", "15", work_id],
            Self::Done => vec!["work", "done", work_id],
            Self::Archive => vec!["work", "archive", work_id],
            Self::Delete => vec!["work", "delete", work_id],
        };
        words.into_iter().map(String::from).collect()
    }
}

#[derive(Debug)]
pub struct ActionMenuView {
    pub item: WorkItem,
    pub selection: Selection,
}

#[derive(Debug)]
pub struct RecommendationView {
    pub minutes: u32,
    pub text: Option<String>,
    pub pending: Option<Pending>,
    pub error: Option<String>,
}

/// Any guided flow (wizard step or confirmation)
#[derive(Debug)]
pub struct FormView {
    pub flow: Flow,
    pub input: String,
    pub notices: Vec<String>,
}

#[derive(Debug)]
pub struct DraftView {
    pub bridge: DraftBridge,
    pub input: String,
    pub notices: Vec<String>,
    pub pending: Option<Pending>,
}

#[derive(Debug, Default)]
pub struct HelpChatView {
    pub input: String,
    /// Question and answer; the answer is empty while pending
    pub exchanges: Vec<(String, String)>,
    pub pending: Option<Pending>,
}

/// Every screen the TUI can show
#[derive(Debug)]
pub enum View {
    Dashboard(DashboardView),
    ProjectList(ProjectListView),
    TaskList(TaskListView),
    ActionMenu(ActionMenuView),
    Recommendation(RecommendationView),
    Form(FormView),
    Draft(DraftView),
    HelpChat(HelpChatView),
}

impl View {
    pub fn form(flow: Flow) -> Self {
        Self::Form(FormView {
            flow,
            input: String::new(),
            notices: Vec::new(),
        })
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::Dashboard(_) => "dashboard",
            Self::ProjectList(_) => "projects",
            Self::TaskList(_) => "tasks",
            Self::ActionMenu(_) => "actions",
            Self::Recommendation(_) => "what-now",
            Self::Form(_) => "form",
            Self::Draft(_) => "draft",
            Self::HelpChat(_) => "help-chat",
        }
    }

    pub fn title(&self) -> String {
        match self {
            Self::Dashboard(_) => "Dashboard".to_string(),
            Self::ProjectList(_) => "Projects".to_string(),
            Self::TaskList(v) => format!("Tasks ({})", v.label),
            Self::ActionMenu(v) => format!("Actions: {}", v.item.title),
            Self::Recommendation(v) => format!("What now ({} min)", v.minutes),
            Self::Form(v) => v.flow.title(),
            Self::Draft(_) => "Draft".to_string(),
            Self::HelpChat(_) => "Help chat".to_string(),
        }
    }

    pub fn short_help(&self) -> &'static str {
        match self {
            Self::Dashboard(_) => ": command  p projects  t tasks  w what-now  r refresh  Enter open  q quit",
            Self::ProjectList(_) => ": command  j/k move  Enter use  r refresh  Esc back  q quit",
            Self::TaskList(_) => ": command  j/k move  Enter actions  r refresh  Esc back  q quit",
            Self::ActionMenu(_) => "j/k move  Enter run  Esc back",
            Self::Recommendation(_) => ": command  r refresh  Esc back  q quit",
            Self::Form(v) if v.flow.is_confirm() => "y/n or Left/Right then Enter  Esc cancel",
            Self::Form(_) => "Enter answer  Esc cancel",
            Self::Draft(_) => "Enter send  accept/edit/cancel when ready  Esc cancel",
            Self::HelpChat(_) => "Enter ask  empty line or Esc leaves",
        }
    }

    /// Capturing views receive every key, including `:` and `q`
    pub fn captures_input(&self) -> bool {
        matches!(self, Self::Form(_) | Self::Draft(_) | Self::HelpChat(_))
    }

    /// Line being typed in a capturing view
    pub fn input_mut(&mut self) -> Option<&mut String> {
        match self {
            Self::Form(v) => Some(&mut v.input),
            Self::Draft(v) => Some(&mut v.input),
            Self::HelpChat(v) => Some(&mut v.input),
            _ => None,
        }
    }

    pub fn pending(&self) -> Option<&Pending> {
        match self {
            Self::Dashboard(v) => v.pending.as_ref(),
            Self::ProjectList(v) => v.pending.as_ref(),
            Self::TaskList(v) => v.pending.as_ref(),
            Self::Recommendation(v) => v.pending.as_ref(),
            Self::Draft(v) => v.pending.as_ref(),
            Self::HelpChat(v) => v.pending.as_ref(),
            Self::ActionMenu(_) | Self::Form(_) => None,
        }
    }

    pub fn set_pending(&mut self, pending: Pending) {
        let slot = match self {
            Self::Dashboard(v) => &mut v.pending,
            Self::ProjectList(v) => &mut v.pending,
            Self::TaskList(v) => &mut v.pending,
            Self::Recommendation(v) => &mut v.pending,
            Self::Draft(v) => &mut v.pending,
            Self::HelpChat(v) => &mut v.pending,
            Self::ActionMenu(_) | Self::Form(_) => return,
        };
        *slot = Some(pending);
    }

    /// Request that refreshes this view's data, if it shows any
    pub fn reload_request(&self) -> Option<Request> {
        match self {
            Self::Dashboard(_) => Some(Request::Load(Load::Summaries)),
            Self::ProjectList(_) => Some(Request::Load(Load::Projects)),
            Self::TaskList(v) => Some(Request::Load(Load::Tasks {
                project_id: v.project_id.clone(),
            })),
            Self::Recommendation(v) => Some(Request::Job(Job::WhatNow { minutes: v.minutes })),
            _ => None,
        }
    }

    /// Only the active view is told about resizes
    pub fn resize(&mut self, _width: u16, height: u16) {
        // Borders, header, transcript and command bar
        let rows = height.saturating_sub(16).max(1);
        match self {
            Self::Dashboard(v) => v.selection.page = rows,
            Self::ProjectList(v) => v.selection.page = rows,
            Self::TaskList(v) => v.selection.page = rows,
            Self::ActionMenu(v) => v.selection.page = rows,
            _ => {}
        }
    }

    /// Store a completed request; the token was already matched
    pub fn apply(&mut self, reply: Reply) {
        match (self, reply) {
            (Self::Dashboard(v), Reply::Summaries(result)) => {
                v.pending = None;
                match result {
                    Ok(summaries) => {
                        v.summaries = summaries;
                        v.error = None;
                    }
                    Err(e) => v.error = Some(e),
                }
                v.selection.clamp(v.summaries.len());
            }
            (Self::ProjectList(v), Reply::Projects(result)) => {
                v.pending = None;
                match result {
                    Ok(projects) => {
                        v.projects = projects;
                        v.error = None;
                    }
                    Err(e) => v.error = Some(e),
                }
                v.selection.clamp(v.projects.len());
            }
            (Self::TaskList(v), Reply::Tasks(result)) => {
                v.pending = None;
                match result {
                    Ok(items) => {
                        v.items = items;
                        v.error = None;
                    }
                    Err(e) => v.error = Some(e),
                }
                v.selection.clamp(v.items.len());
            }
            (Self::Recommendation(v), Reply::Job(result)) => {
                v.pending = None;
                match result {
                    JobResult::Text { text, .. } => {
                        v.text = Some(text);
                        v.error = None;
                    }
                    JobResult::Failed(e) => v.error = Some(e),
                    other => v.error = Some(format!("Unexpected reply: {:?}", other)),
                }
            }
            (Self::Draft(v), Reply::Job(result)) => {
                v.pending = None;
                match result {
                    JobResult::Draft(turn) => v.bridge.apply_turn(turn),
                    JobResult::Failed(e) => v.bridge.apply_failure(&e),
                    other => v.bridge.apply_failure(&format!("Unexpected reply: {:?}", other)),
                }
            }
            (Self::HelpChat(v), Reply::Job(result)) => {
                v.pending = None;
                let answer = match result {
                    JobResult::Answer { answer, .. } => answer,
                    JobResult::Failed(e) => format!("Error: {}", e),
                    other => format!("Unexpected reply: {:?}", other),
                };
                if let Some(last) = v.exchanges.last_mut() {
                    last.1 = answer;
                }
            }
            (view, reply) => {
                tracing::warn!(view = view.id(), ?reply, "View::apply: reply does not fit view");
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ViewEvent {
        match self {
            Self::Form(v) => {
                if let Flow::Confirm(step) = &mut v.flow
                    && v.input.is_empty()
                {
                    match key.code {
                        KeyCode::Left | KeyCode::Right | KeyCode::Tab => {
                            step.toggle();
                            return ViewEvent::Handled;
                        }
                        KeyCode::Enter => {
                            let answer = if step.selected_yes { "y" } else { "n" };
                            return ViewEvent::Submit(answer.to_string());
                        }
                        _ => {}
                    }
                }
                edit_line(&mut v.input, key, false)
            }
            Self::Draft(v) => edit_line(&mut v.input, key, v.pending.is_some()),
            Self::HelpChat(v) => edit_line(&mut v.input, key, v.pending.is_some()),
            Self::Dashboard(v) => move_selection(&mut v.selection, v.summaries.len(), key),
            Self::ProjectList(v) => move_selection(&mut v.selection, v.projects.len(), key),
            Self::TaskList(v) => move_selection(&mut v.selection, v.items.len(), key),
            Self::ActionMenu(v) => move_selection(&mut v.selection, MenuAction::ALL.len(), key),
            Self::Recommendation(_) => ViewEvent::Ignored,
        }
    }
}

/// Key handling shared by the capturing views
///
/// While `busy`, Enter leaves the line in place for a later submit.
fn edit_line(input: &mut String, key: KeyEvent, busy: bool) -> ViewEvent {
    match key.code {
        KeyCode::Esc => ViewEvent::Cancel,
        KeyCode::Enter if busy => ViewEvent::Handled,
        KeyCode::Enter => ViewEvent::Submit(std::mem::take(input)),
        KeyCode::Backspace => {
            input.pop();
            ViewEvent::Handled
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            input.push(c);
            ViewEvent::Handled
        }
        _ => ViewEvent::Handled,
    }
}

fn move_selection(selection: &mut Selection, len: usize, key: KeyEvent) -> ViewEvent {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => {
            selection.prev();
            ViewEvent::Handled
        }
        KeyCode::Down | KeyCode::Char('j') => {
            selection.next(len);
            ViewEvent::Handled
        }
        KeyCode::Enter if len > 0 => ViewEvent::Drill,
        _ => ViewEvent::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::{ConfirmStep, PendingAction};

    fn confirm_form() -> View {
        let step = ConfirmStep::destructive("Delete?", PendingAction::Argv(vec!["x".into()]));
        View::form(Flow::Confirm(step))
    }

    #[test]
    fn test_capturing_views() {
        assert!(confirm_form().captures_input());
        assert!(View::HelpChat(HelpChatView::default()).captures_input());
        assert!(!View::Dashboard(DashboardView::default()).captures_input());
    }

    #[test]
    fn test_confirm_form_defaults_to_no_then_toggles() {
        let mut view = confirm_form();
        assert_eq!(view.handle_key(KeyEvent::from(KeyCode::Enter)), ViewEvent::Submit("n".to_string()));
        assert_eq!(view.handle_key(KeyEvent::from(KeyCode::Left)), ViewEvent::Handled);
        assert_eq!(view.handle_key(KeyEvent::from(KeyCode::Enter)), ViewEvent::Submit("y".to_string()));
    }

    #[test]
    fn test_capturing_view_takes_q_and_colon() {
        let mut view = View::HelpChat(HelpChatView::default());
        view.handle_key(KeyEvent::from(KeyCode::Char(':')));
        view.handle_key(KeyEvent::from(KeyCode::Char('q')));
        let View::HelpChat(chat) = &view else { unreachable!() };
        assert_eq!(chat.input, ":q");
        assert_eq!(view.handle_key(KeyEvent::from(KeyCode::Esc)), ViewEvent::Cancel);
    }

    #[test]
    fn test_list_selection_stays_in_bounds() {
        let mut view = View::ActionMenu(ActionMenuView {
            item: WorkItem {
                id: "w1".to_string(),
                project_id: "p1".to_string(),
                node_id: "n1".to_string(),
                title: "Dig".to_string(),
                item_type: Default::default(),
                planned_min: 30,
                logged_min: 0,
                status: Default::default(),
                archived_at: None,
            },
            selection: Selection::default(),
        });
        for _ in 0..10 {
            view.handle_key(KeyEvent::from(KeyCode::Down));
        }
        let View::ActionMenu(menu) = &view else { unreachable!() };
        assert_eq!(menu.selection.index, MenuAction::ALL.len() - 1);
        assert_eq!(view.handle_key(KeyEvent::from(KeyCode::Enter)), ViewEvent::Drill);
    }

    #[test]
    fn test_stale_reply_shape_is_ignored() {
        let mut view = View::Dashboard(DashboardView {
            pending: Some(Pending::new(3)),
            ..Default::default()
        });
        view.apply(Reply::Projects(Ok(Vec::new())));
        assert!(view.pending().is_some());
    }

    #[test]
    fn test_menu_argv() {
        assert_eq!(MenuAction::LogQuarterHour.argv("abc"), ["log", "15", "abc"]);
        assert_eq!(MenuAction::Delete.argv("abc"), ["work", "delete", "abc"]);
    }
}
