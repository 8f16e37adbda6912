use crate::command::{CommandFactory, ExecutableCommand, Flow};
use crate::interpreter::Factory;
use crate::metrics::MetricsProvider;
use crate::session::Session;
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Local};
use regex::RegexBuilder;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Built-in commands known to the shell at compile time.
///
/// Builtins receive their raw whitespace-split argument tokens and interpret
/// them themselves, including any quote stripping. Operand problems (missing
/// paths, wrong file type) are written as Unix-style diagnostics and are not
/// errors; an `Err` is reserved for failures of the underlying system call and
/// is printed as the command's output by the blanket [`ExecutableCommand`] impl.
pub(crate) trait BuiltinCommand: Sized {
    /// Names the command answers to, e.g. `["exit", "quit"]`.
    fn names() -> &'static [&'static str];

    /// Build the command from its argument tokens.
    fn from_args(args: &[&str]) -> Self;

    /// Executes the command, writing its output to `stdout`.
    fn execute(
        self,
        stdout: &mut dyn Write,
        session: &mut Session,
        metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        session: &mut Session,
        metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        match <T as BuiltinCommand>::execute(*self, stdout, session, metrics) {
            Ok(flow) => Ok(flow),
            Err(e) => {
                tracing::warn!(command = T::names()[0], error = %e, "builtin failed");
                write!(stdout, "{e}")?;
                Ok(Flow::Continue)
            }
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        if T::names().contains(&name) {
            Some(Box::new(T::from_args(args)))
        } else {
            None
        }
    }
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

/// Arguments that are not `-x` style options.
fn operands(args: &[String]) -> Vec<&str> {
    args.iter()
        .map(String::as_str)
        .filter(|a| !a.starts_with('-') || *a == "-")
        .collect()
}

/// Strip one layer of matching single or double quotes.
pub(crate) fn unquote(s: &str) -> &str {
    for q in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

const HELP_TEXT: &str = "\
Available commands:

File & Directory Operations:
  ls [path]              List files and directories
  cd <path>              Change directory
  pwd                    Show current working directory
  mkdir <name>           Create directory
  rm <path>              Remove file or directory
  cp <src> <dest>        Copy file
  mv <src> <dest>        Move/rename file
  cat <file>             Display file contents
  echo <text>            Print text
  touch <file>           Create empty file

System Monitoring:
  cpu                    Show CPU usage
  memory                 Show memory usage
  processes              Show running processes
  ps                     Alias for processes
  uptime                 Show system uptime
  df                     Show disk usage
  du [path]              Show directory size

Search & Text:
  find <pattern> [path]  Find files
  grep <pattern> <file>  Search in file
  head <file> [n]        Show first n lines (default 10)
  tail <file> [n]        Show last n lines (default 10)

Utilities:
  clear                  Clear screen
  history [n]            Show command history
  whoami                 Show current user
  date                   Show current date/time
  help                   Show this help
  exit/quit              Exit the shell

AI Features:
  ai <command>           Convert natural language to shell commands

Anything else is passed to the system shell.";

/// Print the list of available commands.
pub struct Help;

impl BuiltinCommand for Help {
    fn names() -> &'static [&'static str] {
        &["help"]
    }

    fn from_args(_args: &[&str]) -> Self {
        Help
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _session: &mut Session,
        _metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        writeln!(stdout, "{HELP_TEXT}")?;
        Ok(Flow::Continue)
    }
}

/// Clear the terminal with an ANSI escape sequence.
pub struct Clear;

impl BuiltinCommand for Clear {
    fn names() -> &'static [&'static str] {
        &["clear"]
    }

    fn from_args(_args: &[&str]) -> Self {
        Clear
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _session: &mut Session,
        _metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        write!(stdout, "\x1b[2J\x1b[H")?;
        Ok(Flow::Continue)
    }
}

/// Print the session working directory.
pub struct Pwd;

impl BuiltinCommand for Pwd {
    fn names() -> &'static [&'static str] {
        &["pwd"]
    }

    fn from_args(_args: &[&str]) -> Self {
        Pwd
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        session: &mut Session,
        _metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        writeln!(stdout, "{}", session.current_dir().display())?;
        Ok(Flow::Continue)
    }
}

/// List a directory, one `ls -l` style line per entry.
pub struct Ls {
    pub args: Vec<String>,
}

impl BuiltinCommand for Ls {
    fn names() -> &'static [&'static str] {
        &["ls"]
    }

    fn from_args(args: &[&str]) -> Self {
        Ls { args: owned(args) }
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        session: &mut Session,
        _metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        let (target, shown) = match operands(&self.args).first() {
            Some(p) => (session.resolve(p), p.to_string()),
            None => (
                session.current_dir().to_path_buf(),
                session.current_dir().display().to_string(),
            ),
        };

        if !target.exists() {
            writeln!(stdout, "ls: cannot access '{shown}': No such file or directory")?;
            return Ok(Flow::Continue);
        }
        if !target.is_dir() {
            writeln!(stdout, "ls: '{shown}': Not a directory")?;
            return Ok(Flow::Continue);
        }

        let mut names = fs::read_dir(&target)
            .map_err(|e| anyhow!("ls: {}", e))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        names.sort();

        for name in names {
            match fs::metadata(target.join(&name)) {
                Ok(meta) => {
                    let modified = meta
                        .modified()
                        .map(|t| DateTime::<Local>::from(t).format("%b %d %H:%M").to_string())
                        .unwrap_or_else(|_| "??? ?? ??:??".to_string());
                    if meta.is_dir() {
                        writeln!(stdout, "drwxr-xr-x {:>8} {} {}/", meta.len(), modified, name)?;
                    } else {
                        writeln!(stdout, "-rw-r--r-- {:>8} {} {}", meta.len(), modified, name)?;
                    }
                }
                // dangling symlinks and the like
                Err(_) => writeln!(stdout, "?????????? ????????? {name}")?,
            }
        }
        Ok(Flow::Continue)
    }
}

/// Change the session working directory.
/// Without a target, changes to the home directory.
pub struct Cd {
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn names() -> &'static [&'static str] {
        &["cd"]
    }

    fn from_args(args: &[&str]) -> Self {
        Cd {
            target: args.first().map(|a| a.to_string()),
        }
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        session: &mut Session,
        _metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        let target = match &self.target {
            Some(t) if !t.is_empty() => session.resolve(t),
            _ => session
                .home_dir()
                .ok_or_else(|| anyhow!("cd: no target and HOME not set"))?,
        };

        if !target.exists() {
            writeln!(stdout, "cd: {}: No such file or directory", target.display())?;
            return Ok(Flow::Continue);
        }
        if !target.is_dir() {
            writeln!(stdout, "cd: {}: Not a directory", target.display())?;
            return Ok(Flow::Continue);
        }

        let canonical = fs::canonicalize(&target)
            .with_context(|| format!("cd: can't canonicalize {}", target.display()))?;
        session.set_current_dir(canonical);
        Ok(Flow::Continue)
    }
}

/// Create directories, including missing parents.
pub struct Mkdir {
    pub args: Vec<String>,
}

impl BuiltinCommand for Mkdir {
    fn names() -> &'static [&'static str] {
        &["mkdir"]
    }

    fn from_args(args: &[&str]) -> Self {
        Mkdir { args: owned(args) }
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        session: &mut Session,
        _metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        let dirs = operands(&self.args);
        if dirs.is_empty() {
            writeln!(stdout, "mkdir: missing operand")?;
            return Ok(Flow::Continue);
        }
        for dir in dirs {
            fs::create_dir_all(session.resolve(dir)).map_err(|e| anyhow!("mkdir: {}", e))?;
        }
        Ok(Flow::Continue)
    }
}

/// Remove files, and directories recursively. `-r`/`-f` style flags are accepted and ignored.
pub struct Rm {
    pub args: Vec<String>,
}

impl BuiltinCommand for Rm {
    fn names() -> &'static [&'static str] {
        &["rm"]
    }

    fn from_args(args: &[&str]) -> Self {
        Rm { args: owned(args) }
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        session: &mut Session,
        _metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        let paths = operands(&self.args);
        if paths.is_empty() {
            writeln!(stdout, "rm: missing operand")?;
            return Ok(Flow::Continue);
        }
        for path in paths {
            if names_dot_entry(path) {
                writeln!(stdout, "rm: refusing to remove '.' or '..' directory: skipping '{path}'")?;
                continue;
            }
            let target = session.resolve(path);
            let Ok(meta) = fs::symlink_metadata(&target) else {
                writeln!(stdout, "rm: cannot remove '{path}': No such file or directory")?;
                return Ok(Flow::Continue);
            };
            if meta.is_dir() && holds_session_dir(&target, session) {
                writeln!(
                    stdout,
                    "rm: cannot remove '{path}': Contains the current working directory"
                )?;
                continue;
            }
            let removed = if meta.is_dir() {
                fs::remove_dir_all(&target)
            } else {
                fs::remove_file(&target)
            };
            removed.map_err(|e| anyhow!("rm: {}", e))?;
        }
        Ok(Flow::Continue)
    }
}

/// `.` or `..` as the last path component, e.g. `..`, `a/.`, `../`.
fn names_dot_entry(path: &str) -> bool {
    matches!(path.trim_end_matches('/').rsplit('/').next(), Some(".") | Some(".."))
}

/// The session directory lives at or below `dir`.
fn holds_session_dir(dir: &Path, session: &Session) -> bool {
    fs::canonicalize(dir).is_ok_and(|dir| session.current_dir().starts_with(dir))
}

/// Where `src` lands when copied or moved to `dest`: inside `dest` if it is a directory.
fn destination(src: &Path, dest: PathBuf) -> PathBuf {
    match src.file_name() {
        Some(name) if dest.is_dir() => dest.join(name),
        _ => dest,
    }
}

fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let target = dest.join(entry.path().strip_prefix(src)?);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Copy a file, or a directory tree.
pub struct Cp {
    pub args: Vec<String>,
}

impl BuiltinCommand for Cp {
    fn names() -> &'static [&'static str] {
        &["cp"]
    }

    fn from_args(args: &[&str]) -> Self {
        Cp { args: owned(args) }
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        session: &mut Session,
        _metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        let operands = operands(&self.args);
        let [src, dest, ..] = operands[..] else {
            writeln!(stdout, "cp: missing file operand")?;
            return Ok(Flow::Continue);
        };
        let src_path = session.resolve(src);
        if !src_path.exists() {
            writeln!(stdout, "cp: cannot stat '{src}': No such file or directory")?;
            return Ok(Flow::Continue);
        }

        let dest_path = session.resolve(dest);
        if src_path.is_dir() {
            copy_tree(&src_path, &dest_path).map_err(|e| anyhow!("cp: {}", e))?;
        } else {
            fs::copy(&src_path, destination(&src_path, dest_path))
                .map_err(|e| anyhow!("cp: {}", e))?;
        }
        Ok(Flow::Continue)
    }
}

/// Move or rename a file or directory.
pub struct Mv {
    pub args: Vec<String>,
}

impl BuiltinCommand for Mv {
    fn names() -> &'static [&'static str] {
        &["mv"]
    }

    fn from_args(args: &[&str]) -> Self {
        Mv { args: owned(args) }
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        session: &mut Session,
        _metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        let operands = operands(&self.args);
        let [src, dest, ..] = operands[..] else {
            writeln!(stdout, "mv: missing file operand")?;
            return Ok(Flow::Continue);
        };
        let src_path = session.resolve(src);
        if !src_path.exists() {
            writeln!(stdout, "mv: cannot stat '{src}': No such file or directory")?;
            return Ok(Flow::Continue);
        }

        let dest_path = destination(&src_path, session.resolve(dest));
        move_path(&src_path, &dest_path).map_err(|e| anyhow!("mv: {}", e))?;
        Ok(Flow::Continue)
    }
}

/// Rename `src` to `dest`, copying and deleting when they sit on different filesystems.
fn move_path(src: &Path, dest: &Path) -> Result<()> {
    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            tracing::debug!(src = %src.display(), dest = %dest.display(), "rename crosses devices, copying");
            copy_then_remove(src, dest)
        }
        Err(e) => Err(e.into()),
    }
}

fn copy_then_remove(src: &Path, dest: &Path) -> Result<()> {
    if fs::symlink_metadata(src)?.is_dir() {
        copy_tree(src, dest)?;
        fs::remove_dir_all(src)?;
    } else {
        fs::copy(src, dest)?;
        fs::remove_file(src)?;
    }
    Ok(())
}

/// Print file(s). Problems with one file don't stop the others.
pub struct Cat {
    pub files: Vec<String>,
}

impl BuiltinCommand for Cat {
    fn names() -> &'static [&'static str] {
        &["cat"]
    }

    fn from_args(args: &[&str]) -> Self {
        Cat {
            files: owned(args),
        }
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        session: &mut Session,
        _metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        if self.files.is_empty() {
            writeln!(stdout, "cat: missing operand")?;
            return Ok(Flow::Continue);
        }

        let mut pieces = Vec::with_capacity(self.files.len());
        for fname in &self.files {
            let path = session.resolve(fname);
            if !path.exists() {
                pieces.push(format!("cat: {fname}: No such file or directory"));
            } else if path.is_dir() {
                pieces.push(format!("cat: {fname}: Is a directory"));
            } else {
                match fs::read_to_string(&path) {
                    Ok(text) => pieces.push(text),
                    Err(e) => pieces.push(format!("cat: {fname}: {e}")),
                }
            }
        }
        writeln!(stdout, "{}", pieces.join("\n"))?;
        Ok(Flow::Continue)
    }
}

/// Write the arguments separated by spaces, with surrounding quotes removed.
pub struct Echo {
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn names() -> &'static [&'static str] {
        &["echo"]
    }

    fn from_args(args: &[&str]) -> Self {
        Echo { args: owned(args) }
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _session: &mut Session,
        _metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        let words: Vec<&str> = self.args.iter().map(|a| unquote(a)).collect();
        writeln!(stdout, "{}", words.join(" "))?;
        Ok(Flow::Continue)
    }
}

/// Create empty files (and their parent directories), or refresh their mtime.
pub struct Touch {
    pub files: Vec<String>,
}

impl BuiltinCommand for Touch {
    fn names() -> &'static [&'static str] {
        &["touch"]
    }

    fn from_args(args: &[&str]) -> Self {
        Touch {
            files: owned(args),
        }
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        session: &mut Session,
        _metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        if self.files.is_empty() {
            writeln!(stdout, "touch: missing file operand")?;
            return Ok(Flow::Continue);
        }
        for fname in &self.files {
            let path = session.resolve(fname);
            touch(&path).map_err(|e| anyhow!("touch: {}", e))?;
        }
        Ok(Flow::Continue)
    }
}

fn touch(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    file.set_modified(SystemTime::now())
}

/// Show the last `n` history entries: 10 by default, everything for `0`.
pub struct HistoryCmd {
    pub count: Option<String>,
}

impl BuiltinCommand for HistoryCmd {
    fn names() -> &'static [&'static str] {
        &["history"]
    }

    fn from_args(args: &[&str]) -> Self {
        HistoryCmd {
            count: args.first().map(|a| a.to_string()),
        }
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        session: &mut Session,
        _metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        if session.history.is_empty() {
            writeln!(stdout, "No commands in history")?;
            return Ok(Flow::Continue);
        }
        let limit = match self.count.and_then(|c| c.parse::<usize>().ok()) {
            Some(0) => session.history.len(),
            Some(n) => n,
            None => 10,
        };
        for (i, cmd) in session.history.last(limit).iter().enumerate() {
            writeln!(stdout, "{:4}  {}", i + 1, cmd)?;
        }
        Ok(Flow::Continue)
    }
}

/// Print the current user name.
pub struct Whoami;

impl BuiltinCommand for Whoami {
    fn names() -> &'static [&'static str] {
        &["whoami"]
    }

    fn from_args(_args: &[&str]) -> Self {
        Whoami
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        session: &mut Session,
        _metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        let user = session.user_name().unwrap_or_else(|| "unknown".to_string());
        writeln!(stdout, "{user}")?;
        Ok(Flow::Continue)
    }
}

/// Print the local date and time.
pub struct Date;

impl BuiltinCommand for Date {
    fn names() -> &'static [&'static str] {
        &["date"]
    }

    fn from_args(_args: &[&str]) -> Self {
        Date
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _session: &mut Session,
        _metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        writeln!(stdout, "{}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
        Ok(Flow::Continue)
    }
}

/// End the session.
pub struct Exit;

impl BuiltinCommand for Exit {
    fn names() -> &'static [&'static str] {
        &["exit", "quit"]
    }

    fn from_args(_args: &[&str]) -> Self {
        Exit
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _session: &mut Session,
        _metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        writeln!(stdout, "Goodbye!")?;
        Ok(Flow::Exit)
    }
}

/// How `find` decides whether a file name matches.
enum NameFilter {
    Substring(String),
    Glob(glob::Pattern),
}

impl NameFilter {
    fn matches(&self, name: &str) -> bool {
        match self {
            NameFilter::Substring(s) => name.contains(s.as_str()),
            NameFilter::Glob(p) => p.matches(name),
        }
    }
}

/// Find files by name.
///
/// Two forms are understood: `find <pattern> [path]` (substring match) and
/// `find [path] -name <glob>`.
pub struct Find {
    pub args: Vec<String>,
}

impl Find {
    /// Returns `(pattern as typed, filter, path as typed)`.
    fn parse(&self) -> Result<Option<(String, NameFilter, Option<String>)>> {
        if let Some(pos) = self.args.iter().position(|a| a == "-name") {
            let Some(raw) = self.args.get(pos + 1) else {
                return Ok(None);
            };
            let pattern = unquote(raw).to_string();
            let glob = glob::Pattern::new(&pattern)
                .with_context(|| format!("find: invalid pattern '{pattern}'"))?;
            let path = self.args[..pos].first().cloned();
            return Ok(Some((pattern, NameFilter::Glob(glob), path)));
        }
        let Some(raw) = self.args.first() else {
            return Ok(None);
        };
        let pattern = unquote(raw).to_string();
        Ok(Some((
            pattern.clone(),
            NameFilter::Substring(pattern),
            self.args.get(1).cloned(),
        )))
    }
}

impl BuiltinCommand for Find {
    fn names() -> &'static [&'static str] {
        &["find"]
    }

    fn from_args(args: &[&str]) -> Self {
        Find { args: owned(args) }
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        session: &mut Session,
        _metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        let Some((pattern, filter, path)) = self.parse()? else {
            writeln!(stdout, "find: missing search pattern")?;
            return Ok(Flow::Continue);
        };
        let root = match &path {
            Some(p) => session.resolve(p),
            None => session.current_dir().to_path_buf(),
        };
        if !root.exists() {
            let shown = path.unwrap_or_default();
            writeln!(stdout, "find: '{shown}': No such file or directory")?;
            return Ok(Flow::Continue);
        }

        let matches: Vec<String> = WalkDir::new(&root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| filter.matches(&entry.file_name().to_string_lossy()))
            .map(|entry| entry.path().display().to_string())
            .collect();

        if matches.is_empty() {
            writeln!(stdout, "No files found matching '{pattern}'")?;
        } else {
            writeln!(stdout, "{}", matches.join("\n"))?;
        }
        Ok(Flow::Continue)
    }
}

/// Print lines of a file containing a literal pattern.
///
/// The pattern may be quoted and span several tokens (`grep "two words" f`).
/// `-i` ignores case.
pub struct Grep {
    pub args: Vec<String>,
}

impl Grep {
    /// Returns `(ignore_case, pattern, file)`.
    fn parse(&self) -> Option<(bool, String, String)> {
        let ignore_case = self.args.iter().any(|a| a == "-i");
        let tokens: Vec<&str> = self
            .args
            .iter()
            .map(String::as_str)
            .filter(|a| *a != "-i")
            .collect();
        let first = *tokens.first()?;

        // a quoted pattern may have been split on whitespace by the tokenizer
        let mut consumed = 1;
        if let Some(q) = first.chars().next().filter(|c| *c == '"' || *c == '\'') {
            let closed = |t: &str| t.ends_with(q);
            if !(first.len() >= 2 && closed(first)) {
                if let Some(end) = tokens[1..].iter().position(|t| closed(*t)) {
                    consumed = end + 2;
                }
            }
        }
        let pattern = tokens[..consumed].join(" ");
        let file = tokens.get(consumed)?;
        Some((ignore_case, unquote(&pattern).to_string(), file.to_string()))
    }
}

impl BuiltinCommand for Grep {
    fn names() -> &'static [&'static str] {
        &["grep"]
    }

    fn from_args(args: &[&str]) -> Self {
        Grep { args: owned(args) }
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        session: &mut Session,
        _metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        let Some((ignore_case, pattern, fname)) = self.parse() else {
            writeln!(stdout, "grep: missing pattern or file")?;
            return Ok(Flow::Continue);
        };
        let path = session.resolve(&fname);
        if !path.exists() {
            writeln!(stdout, "grep: {fname}: No such file or directory")?;
            return Ok(Flow::Continue);
        }
        if path.is_dir() {
            writeln!(stdout, "grep: {fname}: Is a directory")?;
            return Ok(Flow::Continue);
        }

        let re = RegexBuilder::new(&regex::escape(&pattern))
            .case_insensitive(ignore_case)
            .build()
            .with_context(|| format!("grep: invalid pattern: {pattern}"))?;
        let text = fs::read_to_string(&path).map_err(|e| anyhow!("grep: {}: {}", fname, e))?;

        let matches: Vec<String> = text
            .lines()
            .enumerate()
            .filter(|(_, line)| re.is_match(line))
            .map(|(i, line)| format!("{}:{}:{}", fname, i + 1, line))
            .collect();

        if matches.is_empty() {
            writeln!(stdout, "No matches found for '{pattern}'")?;
        } else {
            writeln!(stdout, "{}", matches.join("\n"))?;
        }
        Ok(Flow::Continue)
    }
}

/// Which end of a file `head`/`tail` print.
#[derive(Clone, Copy)]
enum End {
    Head,
    Tail,
}

impl End {
    fn name(self) -> &'static str {
        match self {
            End::Head => "head",
            End::Tail => "tail",
        }
    }
}

fn print_lines(
    end: End,
    args: &[String],
    stdout: &mut dyn Write,
    session: &Session,
) -> Result<Flow> {
    let cmd = end.name();
    let Some(fname) = args.first() else {
        writeln!(stdout, "{cmd}: missing file operand")?;
        return Ok(Flow::Continue);
    };
    let count = args
        .get(1)
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(10);

    let path = session.resolve(fname);
    if !path.exists() {
        writeln!(stdout, "{cmd}: {fname}: No such file or directory")?;
        return Ok(Flow::Continue);
    }
    if path.is_dir() {
        writeln!(stdout, "{cmd}: {fname}: Is a directory")?;
        return Ok(Flow::Continue);
    }

    let text = fs::read_to_string(&path).map_err(|e| anyhow!("{}: {}", cmd, e))?;
    let lines: Vec<&str> = text.lines().collect();
    let selected = match end {
        End::Head => &lines[..count.min(lines.len())],
        End::Tail => &lines[lines.len().saturating_sub(count)..],
    };
    for line in selected {
        writeln!(stdout, "{line}")?;
    }
    Ok(Flow::Continue)
}

/// Print the first lines of a file.
pub struct Head {
    pub args: Vec<String>,
}

impl BuiltinCommand for Head {
    fn names() -> &'static [&'static str] {
        &["head"]
    }

    fn from_args(args: &[&str]) -> Self {
        Head { args: owned(args) }
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        session: &mut Session,
        _metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        print_lines(End::Head, &self.args, stdout, session)
    }
}

/// Print the last lines of a file.
pub struct Tail {
    pub args: Vec<String>,
}

impl BuiltinCommand for Tail {
    fn names() -> &'static [&'static str] {
        &["tail"]
    }

    fn from_args(args: &[&str]) -> Self {
        Tail { args: owned(args) }
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        session: &mut Session,
        _metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        print_lines(End::Tail, &self.args, stdout, session)
    }
}

/// Total size of the regular files below a path.
pub struct Du {
    pub path: Option<String>,
}

impl BuiltinCommand for Du {
    fn names() -> &'static [&'static str] {
        &["du"]
    }

    fn from_args(args: &[&str]) -> Self {
        Du {
            path: args.first().map(|a| a.to_string()),
        }
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        session: &mut Session,
        _metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        let (target, shown) = match &self.path {
            Some(p) => (session.resolve(p), p.clone()),
            None => (
                session.current_dir().to_path_buf(),
                session.current_dir().display().to_string(),
            ),
        };
        if !target.exists() {
            writeln!(stdout, "du: '{shown}': No such file or directory")?;
            return Ok(Flow::Continue);
        }

        let total: u64 = WalkDir::new(&target)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| entry.metadata().ok())
            .map(|meta| meta.len())
            .sum();
        let megabytes = total as f64 / (1024.0 * 1024.0);
        writeln!(stdout, "{megabytes:.2} MB\t{shown}")?;
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::metrics::{CpuSnapshot, DiskSnapshot, MemorySnapshot, ProcessSnapshot};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Metrics provider that fails loudly if a file built-in touches it.
    pub(crate) struct NoMetrics;

    impl MetricsProvider for NoMetrics {
        fn cpu(&mut self) -> Result<CpuSnapshot> {
            unreachable!("cpu")
        }
        fn memory(&mut self) -> Result<MemorySnapshot> {
            unreachable!("memory")
        }
        fn processes(&mut self) -> Result<Vec<ProcessSnapshot>> {
            unreachable!("processes")
        }
        fn uptime(&mut self) -> Result<Duration> {
            unreachable!("uptime")
        }
        fn disk(&mut self, _path: &Path) -> Result<DiskSnapshot> {
            unreachable!("disk")
        }
    }

    fn run<T: BuiltinCommand + 'static>(session: &mut Session, args: &[&str]) -> String {
        let cmd: Box<dyn ExecutableCommand> = Box::new(T::from_args(args));
        let mut out = Vec::new();
        let flow = cmd.execute(&mut out, session, &mut NoMetrics).unwrap();
        assert_eq!(flow, Flow::Continue);
        String::from_utf8(out).unwrap()
    }

    fn setup() -> (TempDir, Session) {
        let dir = TempDir::new().unwrap();
        let session = Session::with_dir(dir.path()).unwrap();
        (dir, session)
    }

    #[test]
    fn test_pwd_prints_session_dir() {
        let (dir, mut session) = setup();
        let expected = format!("{}\n", fs::canonicalize(dir.path()).unwrap().display());
        assert_eq!(run::<Pwd>(&mut session, &[]), expected);
    }

    #[test]
    fn test_ls_lists_sorted_entries_with_dir_suffix() {
        let (dir, mut session) = setup();
        fs::create_dir(dir.path().join("beta")).unwrap();
        fs::write(dir.path().join("alpha.txt"), "hello").unwrap();

        let out = run::<Ls>(&mut session, &[]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("-rw-r--r--"));
        assert!(lines[0].ends_with(" alpha.txt"));
        assert!(lines[0].contains("       5 "));
        assert!(lines[1].starts_with("drwxr-xr-x"));
        assert!(lines[1].ends_with(" beta/"));
    }

    #[test]
    fn test_ls_diagnostics() {
        let (dir, mut session) = setup();
        fs::write(dir.path().join("plain"), "").unwrap();

        assert_eq!(
            run::<Ls>(&mut session, &["nope"]),
            "ls: cannot access 'nope': No such file or directory\n"
        );
        assert_eq!(run::<Ls>(&mut session, &["plain"]), "ls: 'plain': Not a directory\n");
    }

    #[test]
    fn test_cd_relative_and_parent() {
        let (dir, mut session) = setup();
        let base = fs::canonicalize(dir.path()).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        assert_eq!(run::<Cd>(&mut session, &["sub"]), "");
        assert_eq!(session.current_dir(), base.join("sub"));

        assert_eq!(run::<Cd>(&mut session, &[".."]), "");
        assert_eq!(session.current_dir(), base);
    }

    #[test]
    fn test_cd_without_target_goes_home() {
        let (_dir, mut session) = setup();
        let home = TempDir::new().unwrap();
        session.set_var("HOME", home.path().to_string_lossy().to_string());

        run::<Cd>(&mut session, &[]);
        assert_eq!(session.current_dir(), fs::canonicalize(home.path()).unwrap());
    }

    #[test]
    fn test_cd_failure_leaves_session_unchanged() {
        let (dir, mut session) = setup();
        fs::write(dir.path().join("file.txt"), "").unwrap();
        let before = session.current_dir().to_path_buf();

        let out = run::<Cd>(&mut session, &["missing"]);
        assert_eq!(
            out,
            format!("cd: {}: No such file or directory\n", before.join("missing").display())
        );
        let out = run::<Cd>(&mut session, &["file.txt"]);
        assert!(out.ends_with("file.txt: Not a directory\n"));
        assert_eq!(session.current_dir(), before);
    }

    #[test]
    fn test_mkdir_rm_round_trip() {
        let (dir, mut session) = setup();
        assert_eq!(run::<Mkdir>(&mut session, &[]), "mkdir: missing operand\n");

        assert_eq!(run::<Mkdir>(&mut session, &["a/b/c"]), "");
        assert!(dir.path().join("a/b/c").is_dir());

        assert_eq!(run::<Rm>(&mut session, &["-r", "a"]), "");
        assert!(!dir.path().join("a").exists());

        assert_eq!(run::<Rm>(&mut session, &[]), "rm: missing operand\n");
        assert_eq!(
            run::<Rm>(&mut session, &["a"]),
            "rm: cannot remove 'a': No such file or directory\n"
        );
    }

    #[test]
    fn test_cp_file_into_directory_and_tree() {
        let (dir, mut session) = setup();
        fs::write(dir.path().join("src.txt"), "data").unwrap();
        fs::create_dir(dir.path().join("backup")).unwrap();

        assert_eq!(run::<Cp>(&mut session, &["src.txt", "backup"]), "");
        assert_eq!(fs::read_to_string(dir.path().join("backup/src.txt")).unwrap(), "data");

        assert_eq!(run::<Cp>(&mut session, &["backup", "mirror"]), "");
        assert_eq!(fs::read_to_string(dir.path().join("mirror/src.txt")).unwrap(), "data");

        assert_eq!(run::<Cp>(&mut session, &["only"]), "cp: missing file operand\n");
        assert_eq!(
            run::<Cp>(&mut session, &["ghost", "x"]),
            "cp: cannot stat 'ghost': No such file or directory\n"
        );
    }

    #[test]
    fn test_mv_renames_and_moves_into_directory() {
        let (dir, mut session) = setup();
        fs::write(dir.path().join("old.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("trash")).unwrap();

        assert_eq!(run::<Mv>(&mut session, &["old.txt", "new.txt"]), "");
        assert!(dir.path().join("new.txt").exists());

        assert_eq!(run::<Mv>(&mut session, &["new.txt", "trash"]), "");
        assert!(dir.path().join("trash/new.txt").exists());

        assert_eq!(
            run::<Mv>(&mut session, &["old.txt", "x"]),
            "mv: cannot stat 'old.txt': No such file or directory\n"
        );
    }

    #[test]
    fn test_rm_refuses_session_directory_and_its_parents() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("work")).unwrap();
        fs::write(dir.path().join("precious.txt"), "keep").unwrap();
        let mut session = Session::with_dir(dir.path().join("work")).unwrap();

        assert_eq!(
            run::<Rm>(&mut session, &[".."]),
            "rm: refusing to remove '.' or '..' directory: skipping '..'\n"
        );
        assert_eq!(
            run::<Rm>(&mut session, &["-rf", "./"]),
            "rm: refusing to remove '.' or '..' directory: skipping './'\n"
        );
        let outer = dir.path().to_str().unwrap();
        assert_eq!(
            run::<Rm>(&mut session, &[outer]),
            format!("rm: cannot remove '{outer}': Contains the current working directory\n")
        );

        assert!(dir.path().join("precious.txt").exists());
        assert!(session.current_dir().is_dir());
        assert!(run::<Ls>(&mut session, &[]).is_empty());
    }

    #[test]
    fn test_copy_then_remove_moves_files_and_trees() {
        let (dir, _session) = setup();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::create_dir_all(dir.path().join("tree/sub")).unwrap();
        fs::write(dir.path().join("tree/sub/b.txt"), "b").unwrap();

        copy_then_remove(&dir.path().join("a.txt"), &dir.path().join("moved.txt")).unwrap();
        copy_then_remove(&dir.path().join("tree"), &dir.path().join("moved_tree")).unwrap();

        assert!(!dir.path().join("a.txt").exists());
        assert_eq!(fs::read_to_string(dir.path().join("moved.txt")).unwrap(), "a");
        assert!(!dir.path().join("tree").exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("moved_tree/sub/b.txt")).unwrap(),
            "b"
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_mv_across_filesystems() {
        use std::os::unix::fs::MetadataExt;

        // needs a tmpfs distinct from the temp dir; skip quietly otherwise
        let Ok(far) = TempDir::new_in("/dev/shm") else {
            return;
        };
        let (dir, mut session) = setup();
        let device = |p: &Path| fs::metadata(p).unwrap().dev();
        if device(far.path()) == device(dir.path()) {
            return;
        }

        let src = far.path().join("a.txt");
        fs::write(&src, "far away").unwrap();
        assert_eq!(run::<Mv>(&mut session, &[src.to_str().unwrap(), "a.txt"]), "");
        assert!(!src.exists());
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "far away");
    }

    #[test]
    fn test_cat_reports_each_file() {
        let (dir, mut session) = setup();
        fs::write(dir.path().join("hello.txt"), "hello\nworld").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let out = run::<Cat>(&mut session, &["hello.txt", "missing", "sub"]);
        assert_eq!(
            out,
            "hello\nworld\ncat: missing: No such file or directory\ncat: sub: Is a directory\n"
        );
        assert_eq!(run::<Cat>(&mut session, &[]), "cat: missing operand\n");
    }

    #[test]
    fn test_echo_strips_quotes() {
        let (_dir, mut session) = setup();
        assert_eq!(run::<Echo>(&mut session, &["\"hello\"", "'world'", "x"]), "hello world x\n");
    }

    #[test]
    fn test_touch_creates_parents_and_keeps_content() {
        let (dir, mut session) = setup();
        assert_eq!(run::<Touch>(&mut session, &["deep/new.txt"]), "");
        assert!(dir.path().join("deep/new.txt").is_file());

        fs::write(dir.path().join("keep.txt"), "content").unwrap();
        run::<Touch>(&mut session, &["keep.txt"]);
        assert_eq!(fs::read_to_string(dir.path().join("keep.txt")).unwrap(), "content");
    }

    #[test]
    fn test_history_formats_tail_with_slice_indexes() {
        let (_dir, mut session) = setup();
        assert_eq!(run::<HistoryCmd>(&mut session, &[]), "No commands in history\n");

        for cmd in ["ls", "pwd", "date"] {
            session.history.push(cmd);
        }
        assert_eq!(
            run::<HistoryCmd>(&mut session, &["2"]),
            "   1  pwd\n   2  date\n"
        );
        assert_eq!(run::<HistoryCmd>(&mut session, &[]).lines().count(), 3);
        assert_eq!(
            run::<HistoryCmd>(&mut session, &["0"]),
            "   1  ls\n   2  pwd\n   3  date\n"
        );
    }

    #[test]
    fn test_exit_stops_the_session() {
        let (_dir, mut session) = setup();
        let mut out = Vec::new();
        let flow = BuiltinCommand::execute(Exit, &mut out, &mut session, &mut NoMetrics).unwrap();
        assert_eq!(flow, Flow::Exit);
        assert_eq!(String::from_utf8(out).unwrap(), "Goodbye!\n");
    }

    #[test]
    fn test_find_substring_and_name_glob() {
        let (dir, mut session) = setup();
        let base = fs::canonicalize(dir.path()).unwrap();
        fs::create_dir(dir.path().join("conf")).unwrap();
        fs::write(dir.path().join("conf/app_config.toml"), "").unwrap();
        fs::write(dir.path().join("readme.md"), "").unwrap();

        let expected = format!("{}\n", base.join("conf/app_config.toml").display());
        assert_eq!(run::<Find>(&mut session, &["config"]), expected);
        assert_eq!(run::<Find>(&mut session, &[".", "-name", "'*config*'"]), expected);

        assert_eq!(
            run::<Find>(&mut session, &["zzz"]),
            "No files found matching 'zzz'\n"
        );
        assert_eq!(run::<Find>(&mut session, &[]), "find: missing search pattern\n");
        assert_eq!(
            run::<Find>(&mut session, &["x", "nowhere"]),
            "find: 'nowhere': No such file or directory\n"
        );
    }

    #[test]
    fn test_grep_quoted_multi_word_pattern() {
        let (dir, mut session) = setup();
        fs::write(dir.path().join("log.txt"), "ok\nan Error here\nerror again\n").unwrap();

        assert_eq!(
            run::<Grep>(&mut session, &["\"Error", "here\"", "log.txt"]),
            "log.txt:2:an Error here\n"
        );
        assert_eq!(
            run::<Grep>(&mut session, &["-i", "\"error\"", "log.txt"]),
            "log.txt:2:an Error here\nlog.txt:3:error again\n"
        );
        assert_eq!(
            run::<Grep>(&mut session, &["missing", "log.txt"]),
            "No matches found for 'missing'\n"
        );
        assert_eq!(run::<Grep>(&mut session, &["x"]), "grep: missing pattern or file\n");
        assert_eq!(
            run::<Grep>(&mut session, &["x", "nope.txt"]),
            "grep: nope.txt: No such file or directory\n"
        );
    }

    #[test]
    fn test_head_and_tail() {
        let (dir, mut session) = setup();
        let text: String = (1..=15).map(|i| format!("line {i}\n")).collect();
        fs::write(dir.path().join("f.txt"), text).unwrap();

        let head = run::<Head>(&mut session, &["f.txt"]);
        assert_eq!(head.lines().count(), 10);
        assert!(head.starts_with("line 1\n"));

        assert_eq!(run::<Tail>(&mut session, &["f.txt", "2"]), "line 14\nline 15\n");
        assert_eq!(run::<Head>(&mut session, &[]), "head: missing file operand\n");
        assert_eq!(
            run::<Tail>(&mut session, &["."]),
            "tail: .: Is a directory\n"
        );
    }

    #[test]
    fn test_du_sums_file_sizes() {
        let (dir, mut session) = setup();
        fs::create_dir(dir.path().join("data")).unwrap();
        fs::write(dir.path().join("data/blob"), vec![0u8; 1024 * 1024]).unwrap();

        assert_eq!(run::<Du>(&mut session, &["data"]), "1.00 MB\tdata\n");
        assert_eq!(
            run::<Du>(&mut session, &["void"]),
            "du: 'void': No such file or directory\n"
        );
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"a b\""), "a b");
        assert_eq!(unquote("'x'"), "x");
        assert_eq!(unquote("\""), "\"");
        assert_eq!(unquote("plain"), "plain");
    }
}
