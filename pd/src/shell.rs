//! Plain line shell
//!
//! Reads lines with rustyline and prints colored output. Flows, draft
//! conversations and help chat prompt inline; jobs are awaited in place.
//! The same driver runs one-shot CLI commands.

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, info, warn};

use crate::dispatch::{self, Outcome, complete_flow, confirm_intent};
use crate::draft::{DraftAction, DraftBridge, DraftRequest};
use crate::error::DispatchError;
use crate::format;
use crate::history::History;
use crate::jobs::{self, Job, JobResult};
use crate::services::Services;
use crate::session::SessionState;
use crate::wizard::{Completion, Flow, FlowStep};

/// Line-mode driver for the interactive shell and one-shot commands
pub struct LineShell {
    services: Services,
    session: SessionState,
    history: History,
    editor: DefaultEditor,
}

impl LineShell {
    pub fn new(services: Services, session: SessionState, history: History) -> Result<Self> {
        let mut editor = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;
        for entry in history.entries() {
            let _ = editor.add_history_entry(entry.as_str());
        }
        Ok(Self {
            services,
            session,
            history,
            editor,
        })
    }

    /// Run the interactive loop until `exit` or Ctrl+D
    pub async fn run(&mut self) -> Result<()> {
        info!("LineShell::run: starting");
        self.print_welcome();

        loop {
            let prompt = match self.session.active_code() {
                Some(code) => format!("{} {} ", code.cyan(), ">".bright_green()),
                None => format!("{} ", ">".bright_green()),
            };
            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = self.editor.add_history_entry(input);
                    self.history.push(input);

                    match self.execute_line(input).await {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(e) => print_error(&e),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    self.history.save();
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        self.history.save();
        println!("Goodbye!");
        Ok(())
    }

    /// Run one command given as argv (the one-shot CLI)
    pub async fn run_once(&mut self, tokens: Vec<String>) -> Result<(), DispatchError> {
        debug!(?tokens, "LineShell::run_once: called");
        let outcome = dispatch::dispatch_argv(tokens, &mut self.session, &self.services)?;
        self.settle(outcome).await.map(|_| ())
    }

    /// Returns true when the session should end
    async fn execute_line(&mut self, input: &str) -> Result<bool, DispatchError> {
        let outcome = dispatch::dispatch(input, &mut self.session, &self.services)?;
        self.settle(outcome).await
    }

    /// Follow an outcome until it produces output
    async fn settle(&mut self, outcome: Outcome) -> Result<bool, DispatchError> {
        let mut outcome = outcome;
        loop {
            debug!(?outcome, "LineShell::settle: step");
            outcome = match outcome {
                Outcome::Nothing => return Ok(false),
                Outcome::Output { text, .. } => {
                    println!("{}", text);
                    return Ok(false);
                }
                Outcome::ClearTranscript => {
                    print!("\x1B[2J\x1B[1;1H");
                    return Ok(false);
                }
                Outcome::Exit => return Ok(true),
                Outcome::StartFlow(flow) => match self.run_flow(flow)? {
                    Some(completion) => complete_flow(completion, &mut self.session, &self.services)?,
                    None => Outcome::text("Cancelled"),
                },
                Outcome::OpenHelpChat => self.run_help_chat().await?,
                Outcome::OpenDraft { bridge, first } => self.run_draft(bridge, first).await?,
                Outcome::Job(job) => self.run_job(job).await?,
            };
        }
    }

    async fn run_job(&mut self, job: Job) -> Result<Outcome, DispatchError> {
        eprintln!("{}", format!("{}...", job.label()).dimmed());
        match jobs::run(job, self.services.clone()).await {
            JobResult::Text { text, refresh } => {
                if refresh {
                    self.session.invalidate_cache();
                }
                Ok(Outcome::Output { text, refresh })
            }
            JobResult::Confirm(resolution) => Ok(Outcome::StartFlow(confirm_intent(resolution))),
            JobResult::Answer { answer, .. } => Ok(Outcome::text(answer)),
            JobResult::Draft(turn) => {
                warn!("LineShell::run_job: draft turn outside a draft conversation");
                Ok(Outcome::text(turn.message))
            }
            JobResult::Failed(message) => Err(DispatchError::User(message)),
        }
    }

    /// Ask the flow's questions; `None` when the user bails out
    fn run_flow(&mut self, flow: Flow) -> Result<Option<Completion>, DispatchError> {
        let mut flow = flow;
        if !flow.is_confirm() {
            println!("{}", flow.title().bright_cyan().bold());
            println!("{}", "Ctrl+C cancels".dimmed());
        }
        let mut shown_detail = Vec::new();
        loop {
            let detail = flow.detail();
            if detail != shown_detail {
                for line in &detail {
                    println!("{}", line.dimmed());
                }
                shown_detail = detail;
            }
            let Some(answer) = self.read_answer(&flow.prompt())? else {
                return Ok(None);
            };
            match flow.submit(&answer, &self.services) {
                FlowStep::Continue { notices } => {
                    for notice in notices {
                        println!("{} {}", "!".yellow(), notice);
                    }
                }
                FlowStep::Done(completion) => return Ok(Some(completion)),
            }
        }
    }

    async fn run_draft(&mut self, bridge: DraftBridge, first: DraftRequest) -> Result<Outcome, DispatchError> {
        let mut bridge = bridge;
        println!("{}", "Draft conversation".bright_cyan().bold());
        let mut shown = bridge.transcript().len();
        let mut request = Some(first);
        loop {
            if let Some(req) = request.take() {
                eprintln!("{}", "drafting...".dimmed());
                match jobs::run(Job::Draft(req), self.services.clone()).await {
                    JobResult::Draft(turn) => bridge.apply_turn(turn),
                    JobResult::Failed(message) => bridge.apply_failure(&message),
                    other => {
                        warn!(?other, "LineShell::run_draft: unexpected job result");
                        bridge.apply_failure("unexpected reply");
                    }
                }
                for line in &bridge.transcript()[shown..] {
                    println!("{}", line);
                }
                shown = bridge.transcript().len();
            }

            let Some(line) = self.read_answer(&bridge.prompt())? else {
                bridge.close(&self.services);
                return Ok(Outcome::text("Draft cancelled"));
            };
            match bridge.plan_submit(&line) {
                DraftAction::Send(next) => {
                    shown = bridge.transcript().len();
                    request = Some(next);
                }
                DraftAction::Accept => match bridge.accept(&self.services) {
                    Ok(report) => {
                        bridge.close(&self.services);
                        self.session.set_active_project(&report.project);
                        self.session.invalidate_cache();
                        return Ok(Outcome::changed(format::import_report(&report)));
                    }
                    Err(lines) => {
                        for line in lines {
                            println!("{} {}", "!".yellow(), line);
                        }
                    }
                },
                DraftAction::Cancel => {
                    bridge.close(&self.services);
                    return Ok(Outcome::text("Draft cancelled"));
                }
                DraftAction::Info(text) => println!("{}", text.dimmed()),
            }
        }
    }

    async fn run_help_chat(&mut self) -> Result<Outcome, DispatchError> {
        println!("{}", "Help chat".bright_cyan().bold());
        println!("{}", "Ask how to do something; an empty line leaves.".dimmed());
        let mut history: Vec<(String, String)> = Vec::new();
        loop {
            let Some(question) = self.read_answer("?")? else {
                break;
            };
            let question = question.trim().to_string();
            if question.is_empty() || question == "exit" || question == "quit" {
                break;
            }
            let job = Job::HelpAnswer {
                question: question.clone(),
                history: history.clone(),
            };
            match jobs::run(job, self.services.clone()).await {
                JobResult::Answer { answer, .. } => {
                    println!("{}", answer);
                    history.push((question, answer));
                }
                JobResult::Failed(message) => println!("{} {}", "error:".red(), message),
                other => warn!(?other, "LineShell::run_help_chat: unexpected job result"),
            }
        }
        Ok(Outcome::text("Left help chat"))
    }

    /// One answer; `None` on Ctrl+C or Ctrl+D
    fn read_answer(&mut self, prompt: &str) -> Result<Option<String>, DispatchError> {
        match self.editor.readline(&format!("{} ", format!("{}:", prompt).yellow())) {
            Ok(line) => Ok(Some(line)),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
            Err(err) => Err(DispatchError::User(format!("Readline error: {}", err))),
        }
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "plandeck shell".bright_cyan().bold());
        println!("{}", self.session.describe().dimmed());
        println!("Type {} for commands, {} to leave", "help".yellow(), "exit".yellow());
        println!();
    }
}

pub fn print_error(err: &DispatchError) {
    match err {
        DispatchError::Usage(text) => eprintln!("{}", text),
        other => eprintln!("{} {}", "error:".red(), other),
    }
}
