use crate::command::{CommandFactory, ExecutionResult, Flow};
use crate::config::ShellConfig;
use crate::external;
use crate::history::{HISTORY_LIMIT, History, HistoryFile};
use crate::metrics::{self, MetricsProvider, SystemMetrics};
use crate::session::Session;
use crate::synth;
use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports commands defined in this crate, see [`crate::builtin`].
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

const AI_HELP: &str = "\
AI Natural Language Commands:

File Operations:
  \"create a file named test.txt\"     → touch test.txt
  \"make a folder called projects\"    → mkdir projects
  \"delete the file old.txt\"          → rm old.txt
  \"list files in documents\"          → ls documents
  \"read the file config.json\"        → cat config.json
  \"copy file1.txt to backup/\"        → cp file1.txt backup/
  \"move old.txt to trash/\"           → mv old.txt trash/

Navigation:
  \"go home\"                          → cd ~
  \"navigate to documents\"            → cd documents
  \"go up one level\"                  → cd ..
  \"where am I?\"                      → pwd

Search:
  \"find files named config\"          → find . -name '*config*'
  \"search for \"error\" in log.txt\"    → grep \"error\" log.txt

System Monitoring:
  \"show CPU usage\"                   → cpu
  \"what is the memory usage?\"        → memory
  \"list running processes\"           → ps
  \"show system status\"               → uptime, cpu, memory

Utilities:
  \"clear the screen\"                 → clear
  \"show help\"                        → help

Usage: Type 'ai <your natural language command>' to use AI features.";

/// The command dispatcher.
///
/// Owns the [`Session`] and a list of [`CommandFactory`] objects queried in
/// order to resolve a command name. Names no factory recognizes, the whole
/// line is handed to the OS shell. `ai <phrase>` is translated into commands
/// that are fed back through [`Interpreter::execute`].
///
/// Example
/// ```no_run
/// use ai_shell::Interpreter;
/// let mut sh = Interpreter::default();
/// let result = sh.execute("pwd");
/// assert!(result.keep_running);
/// ```
pub struct Interpreter {
    session: Session,
    commands: Vec<Box<dyn CommandFactory>>,
    metrics: Box<dyn MetricsProvider>,
    config: ShellConfig,
}

impl Interpreter {
    /// Create an interpreter with the default built-ins.
    pub fn new(session: Session, metrics: Box<dyn MetricsProvider>, config: ShellConfig) -> Self {
        Self {
            session,
            commands: default_commands(),
            metrics,
            config,
        }
    }

    /// Interpreter in the process working directory, backed by real system metrics.
    pub fn with_config(config: ShellConfig) -> Self {
        Self::new(Session::new(), Box::new(SystemMetrics::new()), config)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Execute one input line.
    ///
    /// Never fails: problems are reported in the output text and only `exit`
    /// or `quit` clear [`ExecutionResult::keep_running`].
    pub fn execute(&mut self, line: &str) -> ExecutionResult {
        match self.dispatch(line) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(%line, error = %e, "command failed");
                ExecutionResult::new(format!("Error: {e}"), Flow::Continue)
            }
        }
    }

    fn dispatch(&mut self, line: &str) -> Result<ExecutionResult> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(ExecutionResult::empty());
        }
        self.session.history.push(line);

        let mut tokens = line.split_whitespace();
        let name = tokens.next().unwrap_or_default().to_lowercase();
        let args: Vec<&str> = tokens.collect();
        tracing::debug!(command = %name, ?args, "dispatch");

        if name == "ai" {
            let output = self.natural_language(&args);
            return Ok(ExecutionResult::new(output, Flow::Continue));
        }

        for factory in &self.commands {
            if let Some(cmd) = factory.try_create(&name, &args) {
                let mut out = Vec::new();
                let flow = cmd.execute(&mut out, &mut self.session, self.metrics.as_mut())?;
                return Ok(ExecutionResult::new(into_text(&out), flow));
            }
        }

        tracing::debug!(%line, "not a builtin, handing to the system shell");
        let output =
            match external::run_shell(line, self.session.current_dir(), self.config.shell_timeout) {
                Ok(outcome) => outcome.render(),
                Err(e) => format!("Error executing command: {e:#}"),
            };
        Ok(ExecutionResult::new(
            output.trim_end_matches('\n'),
            Flow::Continue,
        ))
    }

    /// Handle `ai <phrase>`: synthesize commands and run each through [`Self::execute`].
    fn natural_language(&mut self, args: &[&str]) -> String {
        if args.is_empty() {
            return AI_HELP.to_string();
        }
        let phrase = args.join(" ");
        let synthesis = synth::interpret(&phrase);
        tracing::debug!(%phrase, commands = ?synthesis.commands, "synthesized");

        let mut lines = vec![format!("AI: {}", synthesis.explanation)];
        if !synthesis.commands.is_empty() {
            lines.push("Executing commands:".to_string());
        }
        for cmd in &synthesis.commands {
            lines.push(format!("  → {cmd}"));
            let result = self.execute(cmd);
            if !result.output.is_empty() {
                lines.push(result.output);
            }
        }
        lines.join("\n")
    }

    /// `user@host:dir$ `, where `dir` is the last component of the session directory.
    pub fn prompt(&self) -> String {
        let user = self.session.user_name().unwrap_or_else(|| "user".to_string());
        let dir = self
            .session
            .current_dir()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/".to_string());
        format!("{}@{}:{}$ ", user, metrics::host_name(), dir)
    }

    /// Replace the session history with the persisted one, if configured.
    pub fn load_history(&mut self) -> Result<()> {
        if let Some(path) = &self.config.history_file {
            let entries = HistoryFile::new(path).load()?;
            tracing::info!(path = %path.display(), entries = entries.len(), "history loaded");
            self.session.history = History::from_entries(entries, HISTORY_LIMIT);
        }
        Ok(())
    }

    /// Write the session history back, if configured.
    pub fn save_history(&self) -> Result<()> {
        if let Some(path) = &self.config.history_file {
            HistoryFile::new(path).save(&self.session.history)?;
            tracing::info!(path = %path.display(), "history saved");
        }
        Ok(())
    }

    /// Interactive Read-Eval-Print Loop.
    ///
    /// History is loaded before the first prompt and saved once the loop ends,
    /// whether through `exit`, end of input or a terminal error.
    pub fn repl(&mut self) -> rustyline::Result<()> {
        if let Err(e) = self.load_history() {
            tracing::warn!(error = %e, "could not load history");
        }

        let mut rl = DefaultEditor::new()?;
        for entry in self.session.history.entries() {
            rl.add_history_entry(entry.as_str())?;
        }

        println!("ai_shell {}", env!("CARGO_PKG_VERSION"));
        println!("Type 'help' for available commands or 'exit' to quit.");
        println!("{}", "-".repeat(50));

        let outcome = loop {
            match rl.readline(&self.prompt()) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    let result = self.execute(&line);
                    if !result.output.is_empty() {
                        println!("{}", result.output);
                    }
                    if !result.keep_running {
                        break Ok(());
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("Use 'exit' to quit the shell.");
                }
                Err(ReadlineError::Eof) => {
                    println!("Goodbye!");
                    break Ok(());
                }
                Err(err) => break Err(err),
            }
        };

        if let Err(e) = self.save_history() {
            tracing::warn!(error = %e, "could not save history");
        }
        outcome
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::with_config(ShellConfig::default())
    }
}

fn into_text(out: &[u8]) -> String {
    String::from_utf8_lossy(out)
        .trim_end_matches('\n')
        .to_string()
}

/// The built-in table. `ai` is handled by the interpreter itself.
fn default_commands() -> Vec<Box<dyn CommandFactory>> {
    use crate::builtin::*;
    use crate::monitor::*;
    vec![
        Box::new(Factory::<Exit>::default()),
        Box::new(Factory::<Help>::default()),
        Box::new(Factory::<Clear>::default()),
        Box::new(Factory::<Pwd>::default()),
        Box::new(Factory::<Ls>::default()),
        Box::new(Factory::<Cd>::default()),
        Box::new(Factory::<Mkdir>::default()),
        Box::new(Factory::<Rm>::default()),
        Box::new(Factory::<Cp>::default()),
        Box::new(Factory::<Mv>::default()),
        Box::new(Factory::<Cat>::default()),
        Box::new(Factory::<Echo>::default()),
        Box::new(Factory::<Touch>::default()),
        Box::new(Factory::<HistoryCmd>::default()),
        Box::new(Factory::<Cpu>::default()),
        Box::new(Factory::<Memory>::default()),
        Box::new(Factory::<Processes>::default()),
        Box::new(Factory::<Whoami>::default()),
        Box::new(Factory::<Date>::default()),
        Box::new(Factory::<Uptime>::default()),
        Box::new(Factory::<Df>::default()),
        Box::new(Factory::<Du>::default()),
        Box::new(Factory::<Find>::default()),
        Box::new(Factory::<Grep>::default()),
        Box::new(Factory::<Head>::default()),
        Box::new(Factory::<Tail>::default()),
    ]
}
