//! Command catalog: help listing and fuzzy suggestions

use tracing::debug;

/// One user-facing command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub path: &'static str,
    pub summary: &'static str,
}

const fn entry(path: &'static str, summary: &'static str) -> CommandEntry {
    CommandEntry { path, summary }
}

/// Every command, in help order
pub const COMMANDS: &[CommandEntry] = &[
    entry("use", "Set the active project (use <code>)"),
    entry("inspect", "Show the node and work item tree of a project"),
    entry("status", "Planned vs logged time and risk per project"),
    entry("what-now", "Recommend what to work on for the given minutes"),
    entry("log", "Log minutes against a work item (log <minutes> [work] [note])"),
    entry("start", "Start working on a work item"),
    entry("finish", "Log elapsed time and mark the active work item done"),
    entry("context", "Show session context; `context clear` resets it"),
    entry("clear", "Clear the transcript"),
    entry("ask", "Ask in plain language (requires an LLM)"),
    entry("replan", "Move overdue nodes of a project to new due dates"),
    entry("project list", "List projects"),
    entry("project show", "Show one project"),
    entry("project add", "Create a project (guided when given no arguments)"),
    entry("project init", "Guided wizard that builds a whole project plan"),
    entry("project draft", "Draft a project plan in conversation with the LLM"),
    entry("project update", "Change name, description, dates or status of a project"),
    entry("project archive", "Archive a project (hidden from lists)"),
    entry("project unarchive", "Restore an archived project"),
    entry("project delete", "Delete a project and everything in it"),
    entry("project import", "Import a project plan from a JSON schema file"),
    entry("node list", "List nodes of a project"),
    entry("node add", "Add a node (module, chapter, milestone, ...)"),
    entry("node update", "Change title, kind, due date or budget of a node"),
    entry("node archive", "Archive a node"),
    entry("node unarchive", "Restore an archived node"),
    entry("node delete", "Delete a node, its children and their work items"),
    entry("work list", "List work items"),
    entry("work add", "Add a work item to a node"),
    entry("work update", "Change title, type, minutes or status of a work item"),
    entry("work done", "Mark a work item done"),
    entry("work archive", "Archive a work item"),
    entry("work unarchive", "Restore an archived work item"),
    entry("work delete", "Delete a work item"),
    entry("session list", "List logged work sessions"),
    entry("session add", "Log a work session"),
    entry("session delete", "Delete a logged session and give back its minutes"),
    entry("template list", "List saved plan templates"),
    entry("template show", "Show a template as JSON"),
    entry("template add", "Save a schema file as a named template"),
    entry("template apply", "Create a project from a template"),
    entry("template delete", "Delete a template"),
    entry("help", "Show help; `help <topic>` filters, `help chat` opens help chat"),
    entry("exit", "Leave the session"),
];

fn score(entry: &CommandEntry, tokens: &[String]) -> u32 {
    let path = entry.path.to_lowercase();
    let summary = entry.summary.to_lowercase();
    let mut total = 0;
    for token in tokens {
        if path.contains(token.as_str()) {
            total += 3;
        } else if path
            .split(' ')
            .any(|word| token.len() >= 3 && word.len() >= 3 && word[..3] == token[..3])
        {
            // Typos usually keep the first letters
            total += 2;
        }
        if summary.contains(token.as_str()) {
            total += 1;
        }
    }
    total
}

/// Best matching entries for a query, highest score first, ties in catalog order
pub fn suggest(query: &str, limit: usize) -> Vec<&'static CommandEntry> {
    debug!(%query, limit, "suggest: called");
    let tokens: Vec<String> = query
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .filter(|t| t.len() >= 2 && t.is_ascii())
        .collect();
    if tokens.is_empty() {
        return Vec::new();
    }
    let mut scored: Vec<(u32, usize, &'static CommandEntry)> = COMMANDS
        .iter()
        .enumerate()
        .map(|(idx, entry)| (score(entry, &tokens), idx, entry))
        .filter(|(s, _, _)| *s > 0)
        .collect();
    // Stable on declaration order for equal scores
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    scored.into_iter().take(limit).map(|(_, _, e)| e).collect()
}

/// Entries whose path starts with `topic` (case-insensitive), for `help <topic>`
pub fn topic(topic: &str) -> Vec<&'static CommandEntry> {
    let topic = topic.trim().to_lowercase();
    COMMANDS.iter().filter(|e| e.path.starts_with(&topic)).collect()
}

/// The full help listing
pub fn help_text() -> String {
    let mut lines = vec!["Commands:".to_string()];
    lines.extend(format_entries(COMMANDS.iter()));
    lines.push(String::new());
    lines.push("Destructive commands ask for confirmation unless given --yes.".to_string());
    lines.push("Type `:` to focus the command bar in the dashboard, Esc to go back.".to_string());
    lines.join("\n")
}

pub fn format_entries<'a>(entries: impl Iterator<Item = &'a CommandEntry>) -> Vec<String> {
    entries.map(|e| format!("  {:<20} {}", e.path, e.summary)).collect()
}
