//! TUI runner - owns the terminal and the event loop
//!
//! One task: `select!` over terminal events and the completion channel.
//! Requests queued by the App are spawned as detached tasks; each sends
//! its token back with the reply and the App drops stale ones.

use std::time::Duration;

use eyre::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::Tui;
use super::app::{App, Load, Reply, Request};
use super::events::{Event, TerminalEvents};
use super::render;
use crate::jobs;
use crate::services::Services;

const TICK_RATE: Duration = Duration::from_millis(250);

pub struct TuiRunner {
    app: App,
    terminal: Tui,
    events: TerminalEvents,
    tx: mpsc::UnboundedSender<(u64, Reply)>,
    rx: mpsc::UnboundedReceiver<(u64, Reply)>,
}

impl TuiRunner {
    pub fn new(terminal: Tui, app: App) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Self {
            app,
            terminal,
            events: TerminalEvents::spawn(TICK_RATE)?,
            tx,
            rx,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        info!("TuiRunner::run: starting");
        let size = self.terminal.size()?;
        self.app.handle_resize(size.width, size.height);

        loop {
            self.spawn_requests();
            self.terminal.draw(|frame| render::render(&self.app, frame))?;

            tokio::select! {
                event = self.events.next() => match event? {
                    Event::Key(key) => {
                        if self.app.handle_key(key) {
                            break;
                        }
                    }
                    Event::Paste(text) => self.app.handle_paste(&text),
                    Event::Resize(width, height) => self.app.handle_resize(width, height),
                    Event::Tick => {}
                },
                Some((token, reply)) = self.rx.recv() => {
                    debug!(token, "TuiRunner::run: completion");
                    self.app.apply_reply(token, reply);
                }
            }

            if self.app.should_quit() {
                break;
            }
        }

        self.app.save_history();
        info!("TuiRunner::run: stopped");
        Ok(())
    }

    fn spawn_requests(&mut self) {
        for (token, request) in self.app.take_requests() {
            let services = self.app.services().clone();
            let tx = self.tx.clone();
            tokio::spawn(async move {
                let reply = run_request(request, services).await;
                // The receiver is gone once the TUI has quit
                let _ = tx.send((token, reply));
            });
        }
    }
}

/// Answer one request; store reads run on the blocking pool
pub async fn run_request(request: Request, services: Services) -> Reply {
    match request {
        Request::Job(job) => Reply::Job(jobs::run(job, services).await),
        Request::Load(load) => {
            let result = tokio::task::spawn_blocking(move || load_blocking(&load, &services)).await;
            match result {
                Ok(reply) => reply,
                Err(e) => Reply::Job(jobs::JobResult::Failed(format!("Load task failed: {}", e))),
            }
        }
    }
}

fn load_blocking(load: &Load, services: &Services) -> Reply {
    match load {
        Load::Summaries => Reply::Summaries(services.status.status(None).map_err(|e| e.to_string())),
        Load::Projects => Reply::Projects(services.repo.list_projects(false).map_err(|e| e.to_string())),
        Load::Tasks { project_id } => Reply::Tasks(
            services
                .repo
                .list_work_items(project_id.as_deref(), false)
                .map_err(|e| e.to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{add_project, temp_services};

    #[tokio::test]
    async fn test_load_requests_answer_with_matching_reply() {
        let (_dir, services) = temp_services();
        add_project(&services, "Garden");
        match run_request(Request::Load(Load::Projects), services.clone()).await {
            Reply::Projects(Ok(projects)) => assert_eq!(projects[0].short_code, "GAR"),
            other => panic!("unexpected: {:?}", other),
        }
        match run_request(Request::Load(Load::Summaries), services).await {
            Reply::Summaries(Ok(summaries)) => assert_eq!(summaries.len(), 1),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
