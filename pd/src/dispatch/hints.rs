//! Turning clap errors into shell-friendly messages

use clap::error::{ContextKind, ContextValue, ErrorKind};
use tracing::debug;

use super::catalog;

/// What to show for a failed parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// Help or version text; not an error
    Display(String),
    /// Error text with hints appended
    Usage(String),
}

const GROUPS: &[&str] = &["project", "node", "work", "session", "template"];
/// Groups whose commands default to the active project
const SCOPED_GROUPS: &[&str] = &["node", "work"];

/// Value names of the arguments clap reported missing
fn missing_args(err: &clap::Error) -> Vec<String> {
    match err.get(ContextKind::InvalidArg) {
        Some(ContextValue::Strings(args)) => args.clone(),
        Some(ContextValue::String(arg)) => vec![arg.clone()],
        _ => Vec::new(),
    }
}

pub fn explain(err: &clap::Error, tokens: &[String], active_code: Option<&str>) -> ParseFailure {
    debug!(kind = ?err.kind(), ?tokens, "hints::explain: called");
    let rendered = err.render().to_string();
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            return ParseFailure::Display(rendered.trim_end().to_string());
        }
        _ => {}
    }

    let headline = rendered
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("invalid command")
        .trim_start_matches("error: ")
        .to_string();
    let mut lines = vec![headline];
    if let Some(usage) = rendered.lines().find(|l| l.starts_with("Usage:")) {
        lines.push(usage.to_string());
    }

    let group = tokens.first().map(String::as_str).filter(|t| GROUPS.contains(t));
    match err.kind() {
        ErrorKind::InvalidSubcommand => {
            let suggestions = catalog::suggest(&tokens.join(" "), 3);
            if !suggestions.is_empty() {
                lines.push("Did you mean:".to_string());
                lines.extend(catalog::format_entries(suggestions.into_iter()));
            }
        }
        ErrorKind::MissingSubcommand => {
            if let Some(group) = group {
                lines.push(format!("Subcommands of {}:", group));
                lines.extend(catalog::format_entries(catalog::topic(group).into_iter()));
            }
        }
        ErrorKind::MissingRequiredArgument => {
            let missing = missing_args(err);
            debug!(?missing, "hints::explain: missing arguments");
            if missing.iter().any(|arg| arg.contains("<PROJECT>")) {
                lines.push("Name the project by code or id; `project list` shows them".to_string());
            } else {
                match (group.filter(|g| SCOPED_GROUPS.contains(g)), active_code) {
                    (Some(group), Some(code)) => lines.push(format!(
                        "Active project is {code}; pass --project {code} or run `{group} add` with no arguments for a guided form"
                    )),
                    (Some(group), None) => lines.push(format!(
                        "No active project. Run `use <project>` first, or `{group} add` with no arguments for a guided form"
                    )),
                    (None, _) => {}
                }
            }
        }
        ErrorKind::UnknownArgument | ErrorKind::InvalidValue | ErrorKind::ValueValidation => {
            if let Some(group) = group {
                lines.push(format!("See `help {}`", group));
            }
        }
        _ => {}
    }
    ParseFailure::Usage(lines.join("\n"))
}
