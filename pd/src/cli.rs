//! CLI command definitions and subcommands
//!
//! The same definitions parse one-shot invocations (`pd project list`) and
//! lines typed into the shell or the TUI command bar.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// plandeck - plan projects, decide what to work on next
#[derive(Debug, Parser)]
#[command(
    name = "pd",
    about = "Interactive planner for hierarchical project plans",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute; none opens the TUI
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Skip-confirmation flag shared by destructive subcommands
#[derive(Debug, Clone, Copy, Default, Args)]
pub struct Confirm {
    /// Do not ask for confirmation
    #[arg(short = 'y', long = "yes", visible_alias = "force")]
    pub yes: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage projects
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },

    /// Manage nodes (modules, chapters, milestones, ...)
    Node {
        #[command(subcommand)]
        command: NodeCommand,
    },

    /// Manage work items
    Work {
        #[command(subcommand)]
        command: WorkCommand,
    },

    /// Manage logged work sessions
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Manage plan templates
    Template {
        #[command(subcommand)]
        command: TemplateCommand,
    },

    /// Recommend what to work on
    WhatNow {
        /// Available minutes
        #[arg(default_value_t = 60)]
        minutes: u32,
    },

    /// Planned vs logged time and risk per project
    Status {
        /// All projects, not just the active one
        #[arg(short, long)]
        all: bool,

        /// Project code or id
        #[arg(short, long)]
        project: Option<String>,
    },

    /// Move overdue nodes to new due dates
    Replan {
        /// Project code or id (default: active project)
        #[arg(short, long)]
        project: Option<String>,
    },

    /// Ask in plain language
    Ask {
        /// Apply changes without asking
        #[arg(short = 'y', long = "yes")]
        yes: bool,

        /// The question or request
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        text: Vec<String>,
    },

    /// Show help; `help chat` opens help chat
    Help {
        /// Topic or `chat`
        topic: Vec<String>,
    },

    /// Start the interactive shell
    Shell {
        /// Line-based shell instead of the full-screen TUI
        #[arg(long)]
        plain: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum ProjectCommand {
    /// List projects
    List {
        /// Include archived projects
        #[arg(short, long)]
        all: bool,
    },

    /// Show one project
    Show {
        /// Project code or id
        project: String,
    },

    /// Create a project
    Add {
        name: String,

        #[arg(short, long)]
        description: Option<String>,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// Target date (YYYY-MM-DD)
        #[arg(long)]
        target: Option<String>,

        /// Short code (derived from the name when omitted)
        #[arg(long)]
        code: Option<String>,
    },

    /// Change a project
    Update {
        /// Project code or id
        project: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// Target date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "clear_target")]
        target: Option<String>,

        /// Remove the target date
        #[arg(long)]
        clear_target: bool,

        /// active, paused, done or archived
        #[arg(long)]
        status: Option<String>,
    },

    /// Archive a project
    Archive {
        project: String,
        #[command(flatten)]
        confirm: Confirm,
    },

    /// Restore an archived project
    Unarchive { project: String },

    /// Delete a project and everything in it
    #[command(visible_alias = "rm", alias = "remove")]
    Delete {
        project: String,
        #[command(flatten)]
        confirm: Confirm,
    },

    /// Import a project plan from a JSON schema file
    Import { path: PathBuf },

    /// Guided wizard that builds a whole project plan
    Init,

    /// Draft a project plan in conversation with the LLM
    Draft {
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        text: Vec<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum NodeCommand {
    /// List nodes of a project
    List {
        /// Project code or id (default: active project)
        #[arg(short, long)]
        project: Option<String>,
    },

    /// Add a node
    Add {
        title: String,

        /// Project code or id (default: active project)
        #[arg(short, long)]
        project: Option<String>,

        /// Parent node id
        #[arg(long)]
        parent: Option<String>,

        /// module, chapter, unit, milestone, exam or review
        #[arg(short, long)]
        kind: Option<String>,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
    },

    /// Change a node
    Update {
        node: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(short, long)]
        kind: Option<String>,

        /// Due date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,

        /// Remove the due date
        #[arg(long)]
        clear_due: bool,

        /// Planned minutes for the node
        #[arg(long)]
        planned_min: Option<u32>,
    },

    /// Archive a node
    Archive {
        node: String,
        #[command(flatten)]
        confirm: Confirm,
    },

    /// Restore an archived node
    Unarchive { node: String },

    /// Delete a node, its children and their work items
    #[command(visible_alias = "rm", alias = "remove")]
    Delete {
        node: String,
        #[command(flatten)]
        confirm: Confirm,
    },
}

#[derive(Debug, Subcommand)]
pub enum WorkCommand {
    /// List work items
    List {
        /// Project code or id (default: active project)
        #[arg(short, long)]
        project: Option<String>,

        /// Include archived and done items
        #[arg(short, long)]
        all: bool,
    },

    /// Add a work item to a node
    Add {
        title: String,

        /// Node id
        #[arg(short, long)]
        node: String,

        /// task, reading, practice, review, writing or assessment
        #[arg(short = 't', long = "type")]
        item_type: Option<String>,

        /// Planned minutes
        #[arg(short, long, default_value_t = 30)]
        minutes: u32,
    },

    /// Change a work item
    Update {
        work: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(short = 't', long = "type")]
        item_type: Option<String>,

        #[arg(short, long)]
        minutes: Option<u32>,

        /// todo, in_progress or done
        #[arg(long)]
        status: Option<String>,
    },

    /// Mark a work item done
    Done { work: String },

    /// Archive a work item
    Archive {
        work: String,
        #[command(flatten)]
        confirm: Confirm,
    },

    /// Restore an archived work item
    Unarchive { work: String },

    /// Delete a work item
    #[command(visible_alias = "rm", alias = "remove")]
    Delete {
        work: String,
        #[command(flatten)]
        confirm: Confirm,
    },
}

#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// List logged sessions
    List {
        /// Only sessions of this work item
        #[arg(short, long)]
        work: Option<String>,

        /// Show at most this many
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Log a work session
    Add {
        work: String,
        minutes: u32,

        #[arg(long)]
        note: Option<String>,
    },

    /// Delete a session and give back its minutes
    #[command(visible_alias = "rm", alias = "remove")]
    Delete {
        session: String,
        #[command(flatten)]
        confirm: Confirm,
    },
}

#[derive(Debug, Subcommand)]
pub enum TemplateCommand {
    /// List templates
    List,

    /// Show a template as JSON
    Show { name: String },

    /// Save a schema file as a template
    Add {
        name: String,

        /// Schema JSON file
        #[arg(long)]
        from: PathBuf,
    },

    /// Create a project from a template
    Apply {
        name: String,

        /// Project name (default: the template's)
        #[arg(long)]
        project_name: Option<String>,

        /// Start date; node due dates shift with it
        #[arg(long)]
        start: Option<String>,
    },

    /// Delete a template
    #[command(visible_alias = "rm", alias = "remove")]
    Delete {
        name: String,
        #[command(flatten)]
        confirm: Confirm,
    },
}

/// Drop global options (and their values) from raw process arguments
///
/// Used to hand a one-shot invocation to the dispatcher as plain tokens.
pub fn strip_global_args(args: &[String]) -> Vec<String> {
    debug!(?args, "strip_global_args: called");
    let mut tokens = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-c" | "--config" | "-l" | "--log-level" => {
                iter.next();
            }
            a if a.starts_with("--config=") || a.starts_with("--log-level=") => {}
            _ => tokens.push(arg.clone()),
        }
    }
    tokens
}
