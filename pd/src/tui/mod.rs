//! Terminal User Interface for plandeck
//!
//! A stack of views over the session engine:
//! - Dashboard, project and task lists with vim-style movement
//! - Command bar (`:`) that runs the same grammar as the line shell
//! - Forms for wizards and confirmations, draft and help chat views
//!
//! Store reads and model calls run as background tasks; the UI keeps
//! accepting keys while they are in flight.

mod app;
mod events;
mod navigator;
mod render;
mod runner;
pub mod views;

pub use app::{App, Load, Reply, Request};
pub use events::{Event, TerminalEvents};
pub use navigator::Navigator;
pub use runner::TuiRunner;
pub use views::View;

use std::io::{self, Stdout};

use crossterm::event::{DisableBracketedPaste, EnableBracketedPaste};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use eyre::Result;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

/// Terminal type alias
pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Initialize the terminal for TUI mode
pub fn init() -> Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore the terminal to normal mode
pub fn restore() -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, DisableBracketedPaste)?;
    Ok(())
}

/// Run the TUI until the user quits
pub async fn run(app: App) -> Result<()> {
    let terminal = init()?;

    // Restore the terminal even on early return/error
    struct TerminalGuard;
    impl Drop for TerminalGuard {
        fn drop(&mut self) {
            let _ = restore();
        }
    }
    let _guard = TerminalGuard;

    let mut runner = TuiRunner::new(terminal, app)?;
    runner.run().await
}
