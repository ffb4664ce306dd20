//! Command history shared by the TUI command bar and the line shell
//!
//! One command per line, oldest first. Loading and saving are best-effort:
//! a missing or unwritable file never stops a session.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

pub const DEFAULT_LIMIT: usize = 500;

#[derive(Debug, Clone)]
pub struct History {
    path: Option<PathBuf>,
    limit: usize,
    entries: Vec<String>,
}

impl History {
    /// In-memory only; nothing is written
    pub fn ephemeral(limit: usize) -> Self {
        Self {
            path: None,
            limit: limit.max(1),
            entries: Vec::new(),
        }
    }

    pub fn load(path: impl AsRef<Path>, limit: usize) -> Self {
        let path = path.as_ref().to_path_buf();
        debug!(path = %path.display(), limit, "History::load: called");
        let mut history = Self {
            path: Some(path.clone()),
            limit: limit.max(1),
            entries: Vec::new(),
        };
        match fs::read_to_string(&path) {
            Ok(text) => {
                history.entries = text
                    .lines()
                    .map(str::trim_end)
                    .filter(|l| !l.trim().is_empty())
                    .map(String::from)
                    .collect();
                history.truncate();
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "History::load: unreadable history file"),
        }
        history
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a line; blanks and immediate repeats are skipped
    pub fn push(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() || self.entries.last().is_some_and(|last| last == line) {
            return;
        }
        self.entries.push(line.to_string());
        self.truncate();
    }

    pub fn save(&self) {
        let Some(path) = &self.path else {
            return;
        };
        debug!(path = %path.display(), count = self.entries.len(), "History::save: called");
        if let Some(parent) = path.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warn!(error = %e, "History::save: cannot create directory");
            return;
        }
        let mut text = self.entries.join("\n");
        text.push('\n');
        if let Err(e) = fs::write(path, text) {
            warn!(path = %path.display(), error = %e, "History::save: write failed");
        }
    }

    fn truncate(&mut self) {
        if self.entries.len() > self.limit {
            let excess = self.entries.len() - self.limit;
            self.entries.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let history = History::load(dir.path().join("history"), 10);
        assert!(history.is_empty());
    }

    #[test]
    fn test_save_and_reload_keeps_newest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("history");
        let mut history = History::load(&path, 3);
        for line in ["use GAR", "status", "status", "", "what-now 30", "inspect"] {
            history.push(line);
        }
        assert_eq!(history.entries(), ["status", "what-now 30", "inspect"]);
        history.save();

        let reloaded = History::load(&path, 2);
        assert_eq!(reloaded.entries(), ["what-now 30", "inspect"]);
    }

    #[test]
    fn test_ephemeral_never_writes() {
        let mut history = History::ephemeral(5);
        history.push("status");
        history.save();
        assert_eq!(history.len(), 1);
    }
}
