//! Plandeck - interactive session engine for a personal project planner
//!
//! Plandeck turns typed commands, wizard answers and plain-language requests
//! into operations on a PlanStore of projects, nodes, work items and logged
//! sessions. The same engine backs one-shot invocations, a line shell and a
//! full-screen TUI.
//!
//! # Core Concepts
//!
//! - **Session state**: the active project, the active work item and a
//!   short-lived project cache live for one interactive session
//! - **One grammar**: every surface dispatches through [`dispatch`], so a
//!   command means the same thing wherever it is typed
//! - **Confirm before destroy**: archive and delete ask first unless `--yes`
//! - **Flows**: wizards and confirmations are explicit state machines that
//!   the shell drives line by line and the TUI drives as forms
//!
//! # Modules
//!
//! - [`dispatch`] - tokenize, gate and route command lines
//! - [`commands`] - one handler per subcommand
//! - [`session`] - per-session state and project cache
//! - [`resolve`] - project/node/work references to records
//! - [`intent`] - plain-language requests to actions
//! - [`wizard`] - guided structure and entity wizards
//! - [`draft`] - conversational project drafting
//! - [`nl`] - natural-language service over an LLM client
//! - [`shell`] - line shell
//! - [`tui`] - full-screen interface
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod draft;
pub mod error;
pub mod format;
pub mod history;
pub mod intent;
pub mod jobs;
pub mod llm;
pub mod nl;
pub mod resolve;
pub mod services;
pub mod session;
pub mod shell;
pub mod tui;
pub mod wizard;
