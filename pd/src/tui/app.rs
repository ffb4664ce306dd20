//! TUI application - key handling and state
//!
//! The App owns the navigator, the command bar, the transcript and the
//! session. It never blocks: anything slow is queued as a [`Request`] with a
//! token, which the runner spawns and answers with a [`Reply`].

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use planstore::{Project, ProjectSummary, WorkItem};
use tracing::{debug, info};

use super::navigator::Navigator;
use super::views::{
    ActionMenuView, DashboardView, DraftView, HelpChatView, MenuAction, Pending, ProjectListView, RecommendationView,
    Selection, TaskListView, View, ViewEvent,
};
use crate::dispatch::{self, Outcome, catalog, complete_flow, confirm_intent};
use crate::draft::{DraftAction, DraftBridge, DraftRequest};
use crate::error::DispatchError;
use crate::format;
use crate::history::History;
use crate::jobs::{Job, JobResult};
use crate::services::Services;
use crate::session::SessionState;
use crate::wizard::{Completion, FlowStep};

const TRANSCRIPT_LIMIT: usize = 1000;

/// Data a view loads off the input loop
#[derive(Debug, Clone)]
pub enum Load {
    Summaries,
    Projects,
    Tasks { project_id: Option<String> },
}

/// A detached request the runner spawns
#[derive(Debug, Clone)]
pub enum Request {
    Load(Load),
    Job(Job),
}

/// Completion of a [`Request`]
#[derive(Debug, Clone)]
pub enum Reply {
    Summaries(Result<Vec<ProjectSummary>, String>),
    Projects(Result<Vec<Project>, String>),
    Tasks(Result<Vec<WorkItem>, String>),
    Job(JobResult),
}

/// The `:` command line
#[derive(Debug, Default)]
pub struct CommandBar {
    pub input: String,
    pub focused: bool,
    /// Position while recalling history; `None` when editing fresh input
    recall: Option<usize>,
}

pub struct App {
    services: Services,
    session: SessionState,
    navigator: Navigator,
    bar: CommandBar,
    transcript: Vec<String>,
    /// Transient message, cleared by the next key
    status: Option<String>,
    history: History,
    next_token: u64,
    outbox: Vec<(u64, Request)>,
    /// Outstanding command-bar job
    bar_pending: Option<Pending>,
    should_quit: bool,
}

impl App {
    pub fn new(services: Services, session: SessionState, history: History) -> Self {
        let mut app = Self {
            services,
            session,
            navigator: Navigator::new(View::Dashboard(DashboardView::default())),
            bar: CommandBar::default(),
            transcript: Vec::new(),
            status: None,
            history,
            next_token: 1,
            outbox: Vec::new(),
            bar_pending: None,
            should_quit: false,
        };
        app.reload();
        app
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn bar(&self) -> &CommandBar {
        &self.bar
    }

    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn bar_pending(&self) -> Option<&Pending> {
        self.bar_pending.as_ref()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Requests queued since the last call
    pub fn take_requests(&mut self) -> Vec<(u64, Request)> {
        std::mem::take(&mut self.outbox)
    }

    pub fn save_history(&self) {
        self.history.save();
    }

    /// Handle a key event
    ///
    /// Returns true if the application should exit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return false;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return true;
        }
        self.status = None;

        if self.bar.focused && !self.navigator.active().captures_input() {
            self.handle_bar_key(key);
            return self.should_quit;
        }

        match self.navigator.active_mut().handle_key(key) {
            ViewEvent::Handled => {}
            ViewEvent::Submit(line) => self.submit_to_view(line),
            ViewEvent::Cancel => self.cancel_flow(),
            ViewEvent::Drill => self.drill(),
            ViewEvent::Ignored => self.handle_global_key(key),
        }
        self.should_quit
    }

    /// Pasted text joins the line being typed; newlines become spaces
    pub fn handle_paste(&mut self, text: &str) {
        debug!(len = text.len(), "App::handle_paste: called");
        self.status = None;
        let text = text.replace(['\r', '\n'], " ");
        if let Some(input) = self.navigator.active_mut().input_mut() {
            input.push_str(&text);
        } else if self.bar.focused {
            self.bar.recall = None;
            self.bar.input.push_str(&text);
        }
    }

    /// Resize reaches the active view only
    pub fn handle_resize(&mut self, width: u16, height: u16) {
        self.navigator.active_mut().resize(width, height);
    }

    /// Route a completion to whoever is still waiting for its token
    pub fn apply_reply(&mut self, token: u64, reply: Reply) {
        if self.bar_pending.as_ref().is_some_and(|p| p.token == token) {
            self.bar_pending = None;
            match reply {
                Reply::Job(result) => self.apply_bar_result(result),
                other => debug!(?other, "App::apply_reply: non-job reply for the command bar"),
            }
            return;
        }
        match self
            .navigator
            .views_mut()
            .iter_mut()
            .find(|v| v.pending().is_some_and(|p| p.token == token))
        {
            Some(view) => view.apply(reply),
            None => debug!(token, "App::apply_reply: dropping stale completion"),
        }
    }

    /// Keys for non-capturing views that the view did not use
    fn handle_global_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char(':') => self.bar.focused = true,
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Esc => {
                self.navigator.pop();
            }
            KeyCode::Char('p') => {
                let view = self.loading(View::ProjectList(ProjectListView::default()));
                self.navigator.push(view);
            }
            KeyCode::Char('t') => {
                let view = self.task_list(self.session.active_project().map(String::from));
                self.navigator.push(view);
            }
            KeyCode::Char('w') => self.open_recommendation(crate::intent::DEFAULT_AVAILABLE_MIN),
            KeyCode::Char('r') => self.reload(),
            KeyCode::Char('?') => self.show(catalog::help_text()),
            _ => {}
        }
    }

    fn handle_bar_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.bar.focused = false;
                self.bar.input.clear();
                self.bar.recall = None;
            }
            KeyCode::Enter => {
                let line = std::mem::take(&mut self.bar.input);
                self.bar.recall = None;
                self.submit_command(&line);
                if self.navigator.active().captures_input() {
                    self.bar.focused = false;
                }
            }
            KeyCode::Backspace => {
                self.bar.input.pop();
            }
            KeyCode::Up => self.recall_older(),
            KeyCode::Down => self.recall_newer(),
            KeyCode::Char(c) => {
                self.bar.input.push(c);
                self.bar.recall = None;
            }
            _ => {}
        }
    }

    fn recall_older(&mut self) {
        let entries = self.history.entries();
        if entries.is_empty() {
            return;
        }
        let index = match self.bar.recall {
            Some(i) => i.saturating_sub(1),
            None => entries.len() - 1,
        };
        self.bar.recall = Some(index);
        self.bar.input = entries[index].clone();
    }

    fn recall_newer(&mut self) {
        let Some(index) = self.bar.recall else {
            return;
        };
        let entries = self.history.entries();
        if index + 1 < entries.len() {
            self.bar.recall = Some(index + 1);
            self.bar.input = entries[index + 1].clone();
        } else {
            self.bar.recall = None;
            self.bar.input.clear();
        }
    }

    /// Run one command-bar line through the dispatcher
    pub fn submit_command(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        debug!(%line, "App::submit_command: called");
        self.history.push(line);
        self.transcript.push(format!("> {}", line));
        match dispatch::dispatch(line, &mut self.session, &self.services) {
            Ok(outcome) => self.apply_outcome(outcome),
            Err(e) => self.show_error(&e),
        }
    }

    fn apply_outcome(&mut self, outcome: Outcome) {
        debug!(?outcome, "App::apply_outcome: called");
        match outcome {
            Outcome::Nothing => {}
            Outcome::Output { text, refresh } => {
                self.show(text);
                if refresh {
                    self.reload();
                }
            }
            Outcome::ClearTranscript => self.transcript.clear(),
            Outcome::Exit => self.should_quit = true,
            Outcome::StartFlow(flow) => self.navigator.push(View::form(flow)),
            Outcome::OpenHelpChat => self.navigator.push(View::HelpChat(HelpChatView::default())),
            Outcome::OpenDraft { bridge, first } => {
                let view = self.draft_view(bridge, first);
                self.navigator.push(view);
            }
            Outcome::Job(job) => {
                if let Job::WhatNow { minutes } = job {
                    self.open_recommendation(minutes);
                    return;
                }
                let pending = self.request(Request::Job(job));
                // A newer command-bar job makes the older one stale
                self.bar_pending = Some(pending);
            }
        }
    }

    fn apply_bar_result(&mut self, result: JobResult) {
        match result {
            JobResult::Text { text, refresh } => {
                self.show(text);
                if refresh {
                    self.session.invalidate_cache();
                    self.reload();
                }
            }
            JobResult::Confirm(resolution) => self.navigator.push(View::form(confirm_intent(resolution))),
            JobResult::Answer { answer, .. } => self.show(answer),
            JobResult::Draft(turn) => self.show(turn.message),
            JobResult::Failed(message) => self.show(format!("error: {}", message)),
        }
    }

    fn submit_to_view(&mut self, line: String) {
        match self.navigator.active().id() {
            "form" => self.submit_form(&line),
            "draft" => self.submit_draft(&line),
            "help-chat" => self.submit_help(&line),
            other => debug!(view = other, "App::submit_to_view: view takes no input"),
        }
    }

    fn submit_form(&mut self, line: &str) {
        let View::Form(form) = self.navigator.active_mut() else {
            return;
        };
        match form.flow.submit(line, &self.services) {
            FlowStep::Continue { notices } => form.notices = notices,
            FlowStep::Done(completion) => self.finish_flow(completion),
        }
    }

    fn finish_flow(&mut self, completion: Completion) {
        let refine = matches!(completion, Completion::Refine { .. });
        match complete_flow(completion, &mut self.session, &self.services) {
            Ok(Outcome::OpenDraft { bridge, first }) if refine => {
                // The draft takes the form's place
                let view = self.draft_view(bridge, first);
                self.navigator.replace(view);
            }
            Ok(outcome) => {
                self.navigator.pop();
                self.apply_outcome(outcome);
            }
            Err(e) => {
                self.navigator.pop();
                self.show_error(&e);
            }
        }
    }

    fn submit_draft(&mut self, line: &str) {
        let View::Draft(view) = self.navigator.active_mut() else {
            return;
        };
        view.notices.clear();
        match view.bridge.plan_submit(line) {
            DraftAction::Send(request) => {
                let pending = self.request(Request::Job(Job::Draft(request)));
                self.navigator.active_mut().set_pending(pending);
            }
            DraftAction::Accept => match view.bridge.accept(&self.services) {
                Ok(report) => {
                    view.bridge.close(&self.services);
                    self.navigator.pop();
                    self.session.set_active_project(&report.project);
                    self.session.invalidate_cache();
                    self.show(format::import_report(&report));
                    self.reload();
                }
                Err(lines) => view.notices = lines,
            },
            DraftAction::Cancel => {
                view.bridge.close(&self.services);
                self.navigator.pop();
                self.show("Draft cancelled");
            }
            DraftAction::Info(text) => view.notices = vec![text],
        }
    }

    fn submit_help(&mut self, line: &str) {
        let question = line.trim();
        if question.is_empty() || question == "exit" || question == "quit" {
            self.navigator.pop();
            return;
        }
        let View::HelpChat(view) = self.navigator.active_mut() else {
            return;
        };
        if view.pending.is_some() {
            return;
        }
        let history: Vec<(String, String)> = view.exchanges.clone();
        view.exchanges.push((question.to_string(), String::new()));
        let job = Job::HelpAnswer {
            question: question.to_string(),
            history,
        };
        let pending = self.request(Request::Job(job));
        self.navigator.active_mut().set_pending(pending);
    }

    /// Esc in a capturing view
    fn cancel_flow(&mut self) {
        info!(view = self.navigator.active().id(), "flow cancelled");
        if let View::Draft(view) = self.navigator.active() {
            view.bridge.close(&self.services);
        }
        self.navigator.pop();
        self.bar.focused = true;
        self.status = Some("cancelled".to_string());
    }

    /// Enter on a list row
    fn drill(&mut self) {
        let next = match self.navigator.active() {
            View::Dashboard(v) => v.summaries.get(v.selection.index).map(|s| Drill::UseProject(s.id.clone())),
            View::ProjectList(v) => v.projects.get(v.selection.index).map(|p| Drill::UseProject(p.id.clone())),
            View::TaskList(v) => v.items.get(v.selection.index).cloned().map(Drill::Actions),
            View::ActionMenu(v) => MenuAction::ALL
                .get(v.selection.index)
                .map(|action| Drill::Run(action.argv(&v.item.id))),
            _ => None,
        };
        match next {
            Some(Drill::UseProject(id)) => {
                self.submit_command(&format!("use {}", id));
                let view = self.task_list(Some(id));
                self.navigator.push(view);
            }
            Some(Drill::Actions(item)) => self.navigator.push(View::ActionMenu(ActionMenuView {
                item,
                selection: Selection::default(),
            })),
            Some(Drill::Run(argv)) => {
                self.navigator.pop();
                self.transcript.push(format!("> {}", argv.join(" ")));
                match dispatch::dispatch_argv(argv, &mut self.session, &self.services) {
                    Ok(outcome) => self.apply_outcome(outcome),
                    Err(e) => self.show_error(&e),
                }
            }
            None => {}
        }
    }

    fn open_recommendation(&mut self, minutes: u32) {
        let view = self.loading(View::Recommendation(RecommendationView {
            minutes,
            text: None,
            pending: None,
            error: None,
        }));
        self.navigator.push(view);
    }

    fn task_list(&mut self, project_id: Option<String>) -> View {
        let label = match &project_id {
            Some(id) => self
                .session
                .projects(self.services.repo.as_ref())
                .ok()
                .and_then(|ps| ps.into_iter().find(|p| &p.id == id))
                .map(|p| p.short_code)
                .unwrap_or_else(|| "project".to_string()),
            None => "all".to_string(),
        };
        self.loading(View::TaskList(TaskListView {
            project_id,
            label,
            ..Default::default()
        }))
    }

    fn draft_view(&mut self, bridge: DraftBridge, first: DraftRequest) -> View {
        let pending = self.request(Request::Job(Job::Draft(first)));
        View::Draft(DraftView {
            bridge,
            input: String::new(),
            notices: Vec::new(),
            pending: Some(pending),
        })
    }

    /// Queue the view's first load
    fn loading(&mut self, mut view: View) -> View {
        if let Some(request) = view.reload_request() {
            let pending = self.request(request);
            view.set_pending(pending);
        }
        view
    }

    /// Reload every data view on the stack; older completions become stale
    fn reload(&mut self) {
        for index in 0..self.navigator.len() {
            if let Some(request) = self.navigator.views()[index].reload_request() {
                let pending = self.request(request);
                self.navigator.views_mut()[index].set_pending(pending);
            }
        }
    }

    fn request(&mut self, request: Request) -> Pending {
        let token = self.next_token;
        self.next_token += 1;
        debug!(token, ?request, "App::request: queued");
        self.outbox.push((token, request));
        Pending::new(token)
    }

    fn show(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.transcript.extend(text.lines().map(String::from));
        if self.transcript.len() > TRANSCRIPT_LIMIT {
            let excess = self.transcript.len() - TRANSCRIPT_LIMIT;
            self.transcript.drain(..excess);
        }
    }

    fn show_error(&mut self, err: &DispatchError) {
        match err {
            DispatchError::Usage(text) => self.show(text.clone()),
            other => self.show(format!("error: {}", other)),
        }
    }
}

enum Drill {
    UseProject(String),
    Actions(WorkItem),
    Run(Vec<String>),
}
