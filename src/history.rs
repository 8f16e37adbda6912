use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Maximum number of entries kept in memory and written back to disk.
pub const HISTORY_LIMIT: usize = 1000;

/// Bounded, append-only command history.
///
/// Adjacent duplicates are collapsed; once the list grows past its limit the
/// oldest entries are evicted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    entries: Vec<String>,
    limit: usize,
}

impl History {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            limit,
        }
    }

    /// Build a history from previously persisted lines, keeping the most recent ones.
    pub fn from_entries(entries: impl IntoIterator<Item = String>, limit: usize) -> Self {
        let mut history = Self::with_limit(limit);
        history.entries = entries.into_iter().collect();
        history.enforce_limit();
        history
    }

    /// Record `line` unless it repeats the previous entry.
    pub fn push(&mut self, line: &str) {
        if self.entries.last().is_some_and(|last| last == line) {
            return;
        }
        self.entries.push(line.to_string());
        self.enforce_limit();
    }

    /// The last `n` entries (all of them if fewer exist), oldest first.
    pub fn last(&self, n: usize) -> &[String] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
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

    fn enforce_limit(&mut self) {
        if self.entries.len() > self.limit {
            let excess = self.entries.len() - self.limit;
            self.entries.drain(..excess);
        }
    }
}

impl Default for History {
    fn default() -> Self {
        Self::with_limit(HISTORY_LIMIT)
    }
}

/// Newline-delimited history file, one command per line.
#[derive(Debug, Clone)]
pub struct HistoryFile {
    path: PathBuf,
}

impl HistoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.ai_shell_history`, or `None` when the home directory is unknown.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".ai_shell_history"))
    }

    /// Read every stored line. A missing file is an empty history.
    pub fn load(&self) -> Result<Vec<String>> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(text
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("can't read {}", self.path.display())),
        }
    }

    /// Overwrite the file with the most recent `HISTORY_LIMIT` entries.
    pub fn save(&self, history: &History) -> Result<()> {
        let mut text = history.last(HISTORY_LIMIT).join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        fs::write(&self.path, text).with_context(|| format!("can't write {}", self.path.display()))
    }
}
