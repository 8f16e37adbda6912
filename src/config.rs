use crate::external::DEFAULT_TIMEOUT;
use crate::history::HistoryFile;
use std::path::PathBuf;
use std::time::Duration;

/// Knobs the interpreter is built with. `main` fills this from the command line.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Where history is loaded from and saved to. `None` disables persistence.
    pub history_file: Option<PathBuf>,
    /// Limit for commands handed to the OS shell.
    pub shell_timeout: Duration,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            history_file: HistoryFile::default_path(),
            shell_timeout: DEFAULT_TIMEOUT,
        }
    }
}
