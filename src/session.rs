use crate::history::History;
use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::env as stdenv;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Mutable per-run state of the shell.
///
/// The session contains:
/// - `vars`: a snapshot of environment variables, consulted for `HOME` and `USER`.
/// - the working directory every relative path is resolved against.
/// - `history`: the bounded list of lines entered so far.
///
/// The working directory is tracked here and never pushed into the process via
/// `std::env::set_current_dir`. Only [`crate::builtin`]'s `cd` moves it, and only after the
/// target was verified to be an existing directory.
#[derive(Debug, Clone)]
pub struct Session {
    /// Literal variables visible to built-ins.
    pub vars: HashMap<String, String>,
    /// Lines entered during this and previous sessions.
    pub history: History,
    current_dir: PathBuf,
}

impl Session {
    /// Capture the current process state into a new `Session`.
    ///
    /// Copies variables from `std::env::vars()` and starts in the process working
    /// directory, falling back to `/` if it cannot be determined.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir()
            .and_then(fs::canonicalize)
            .unwrap_or_else(|_| PathBuf::from("/"));
        Self {
            vars: stdenv::vars().collect(),
            history: History::default(),
            current_dir,
        }
    }

    /// Start a session in `dir`, which must exist and be a directory.
    pub fn with_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let canonical = fs::canonicalize(dir)
            .with_context(|| format!("can't canonicalize {}", dir.display()))?;
        if !canonical.is_dir() {
            bail!("{}: Not a directory", canonical.display());
        }
        Ok(Self {
            current_dir: canonical,
            ..Self::new()
        })
    }

    pub fn current_dir(&self) -> &Path {
        &self.current_dir
    }

    /// Moves the session to `dir`. Callers verify `dir` is an existing directory.
    pub(crate) fn set_current_dir(&mut self, dir: PathBuf) {
        self.current_dir = dir;
    }

    /// Get the value of a variable, falling back to the process environment.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Home directory: `$HOME` when set, else the platform default.
    pub fn home_dir(&self) -> Option<PathBuf> {
        self.get_var("HOME")
            .filter(|h| !h.is_empty())
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
    }

    /// Name of the user running the shell.
    pub fn user_name(&self) -> Option<String> {
        self.get_var("USER").or_else(|| self.get_var("USERNAME"))
    }

    /// Resolve a user supplied path against the session directory.
    ///
    /// Absolute paths pass through unchanged, `~` and `~/...` expand to the home
    /// directory, everything else is joined onto the working directory.
    pub fn resolve(&self, path: &str) -> PathBuf {
        if path == "~" || path.starts_with("~/") {
            if let Some(home) = self.home_dir() {
                return match path.strip_prefix("~/") {
                    Some(rest) => home.join(rest),
                    None => home,
                };
            }
        }
        let path = Path::new(path);
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.current_dir.join(path)
        };
        // drop `.` components so `find .` reports clean paths
        joined
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_and_get_var() {
        let mut session = Session::new();
        assert_eq!(session.get_var("SOME_RANDOM_SESSION_VAR_12345"), None);

        session.set_var("KEY", "VALUE");
        assert_eq!(session.get_var("KEY"), Some("VALUE".to_string()));
    }

    #[test]
    fn test_resolve_relative_absolute_and_home() {
        let dir = TempDir::new().unwrap();
        let mut session = Session::with_dir(dir.path()).unwrap();
        let base = fs::canonicalize(dir.path()).unwrap();
        session.set_var("HOME", "/home/someone");

        assert_eq!(session.resolve("a/b.txt"), base.join("a/b.txt"));
        assert_eq!(session.resolve("."), base);
        assert_eq!(session.resolve("./x/./y"), base.join("x/y"));
        assert_eq!(session.resolve("/etc/hosts"), PathBuf::from("/etc/hosts"));
        assert_eq!(session.resolve("~"), PathBuf::from("/home/someone"));
        assert_eq!(
            session.resolve("~/notes.txt"),
            PathBuf::from("/home/someone/notes.txt")
        );
    }

    #[test]
    fn test_with_dir_rejects_files() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain.txt");
        fs::write(&file, "x").unwrap();

        assert!(Session::with_dir(&file).is_err());
        assert!(Session::with_dir(dir.path().join("missing")).is_err());
    }
}
