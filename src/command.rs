use crate::metrics::MetricsProvider;
use crate::session::Session;
use anyhow::Result;
use std::io::Write;

/// What the read loop should do once a command has finished.
///
/// Only `exit` and `quit` ever produce [`Flow::Exit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Uniform result of executing one input line.
///
/// Every built-in, every natural-language expansion and every OS shell fallback
/// is normalized into this shape. `keep_running == false` asks the enclosing
/// loop to persist history and stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Text to show the user. May be empty or span several lines.
    pub output: String,
    /// `false` terminates the session loop.
    pub keep_running: bool,
}

impl ExecutionResult {
    pub fn new(output: impl Into<String>, flow: Flow) -> Self {
        Self {
            output: output.into(),
            keep_running: flow == Flow::Continue,
        }
    }

    /// An empty result that keeps the session alive.
    pub fn empty() -> Self {
        Self::new(String::new(), Flow::Continue)
    }
}

/// Object-safe trait for anything the dispatcher can run in-process.
///
/// Built-ins get this through a blanket impl in [`crate::builtin`].
pub trait ExecutableCommand {
    /// Executes the command, writing human readable output to `stdout`.
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        session: &mut Session,
        metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow>;
}

/// Factory that tries to create a command from a name and its raw argument tokens.
///
/// Returns `None` when the factory doesn't recognize `name`. `name` is already
/// case-folded by the dispatcher.
pub trait CommandFactory {
    /// Attempt to create a command instance for the provided name and arguments.
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>>;
}
