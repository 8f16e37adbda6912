//! Turns a matched intent into concrete shell command lines.

use crate::intent::{self, Intent};

/// Commands produced for one natural-language request, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesis {
    pub commands: Vec<String>,
    /// Human readable description. Never parsed.
    pub explanation: String,
}

impl Synthesis {
    fn single(command: String, explanation: String) -> Self {
        Self {
            commands: vec![command],
            explanation,
        }
    }
}

/// Commands offered when no pattern matches and no keyword is recognised.
pub const DEFAULT_SUGGESTIONS: [&str; 5] = ["help", "ls", "pwd", "cpu", "memory"];

const NOT_UNDERSTOOD: &str = "I couldn't understand that command. Here are some suggestions:";

/// Map `intent` and its captures onto command lines.
///
/// `captures` must carry as many entries as the intent's patterns declare
/// groups; a missing entry is treated as empty.
pub fn synthesize(intent: Intent, captures: &[String], _text: &str) -> Synthesis {
    let arg = |i: usize| captures.get(i).map(String::as_str).unwrap_or_default();

    match intent {
        Intent::CreateFile => Synthesis::single(
            format!("touch {}", arg(0)),
            format!("Creating file '{}'", arg(0)),
        ),
        Intent::CreateFolder => Synthesis::single(
            format!("mkdir {}", arg(0)),
            format!("Creating directory '{}'", arg(0)),
        ),
        Intent::DeleteFile => Synthesis::single(
            format!("rm {}", arg(0)),
            format!("Deleting file '{}'", arg(0)),
        ),
        Intent::DeleteFolder => Synthesis::single(
            format!("rm -r {}", arg(0)),
            format!("Deleting directory '{}'", arg(0)),
        ),
        Intent::ListFiles => {
            let path = arg(0);
            if path.is_empty() {
                Synthesis::single(
                    "ls".to_string(),
                    "Listing files in current directory".to_string(),
                )
            } else {
                Synthesis::single(format!("ls {path}"), format!("Listing files in '{path}'"))
            }
        }
        Intent::ChangeDirectory => Synthesis::single(
            format!("cd {}", arg(0)),
            format!("Changing to directory '{}'", arg(0)),
        ),
        Intent::CopyFile => Synthesis::single(
            format!("cp {} {}", arg(0), arg(1)),
            format!("Copying '{}' to '{}'", arg(0), arg(1)),
        ),
        Intent::MoveFile => Synthesis::single(
            format!("mv {} {}", arg(0), arg(1)),
            format!("Moving '{}' to '{}'", arg(0), arg(1)),
        ),
        Intent::ReadFile => Synthesis::single(
            format!("cat {}", arg(0)),
            format!("Reading file '{}'", arg(0)),
        ),
        Intent::SearchFiles => Synthesis::single(
            format!("find . -name '*{}*'", arg(0)),
            format!("Searching for files matching '{}'", arg(0)),
        ),
        Intent::SearchText => Synthesis::single(
            format!("grep \"{}\" {}", arg(0), arg(1)),
            format!("Searching for '{}' in '{}'", arg(0), arg(1)),
        ),
        Intent::CpuUsage => fixed(&["cpu"], "Showing CPU usage"),
        Intent::MemoryUsage => fixed(&["memory"], "Showing memory usage"),
        Intent::RunningProcesses => fixed(&["ps"], "Showing running processes"),
        Intent::SystemInfo => fixed(&["uptime", "cpu", "memory"], "Showing system information"),
        Intent::CurrentDirectory => fixed(&["pwd"], "Showing current directory"),
        Intent::GoHome => fixed(&["cd ~"], "Going to home directory"),
        Intent::GoUp => fixed(&["cd .."], "Going up one directory"),
        Intent::Help => fixed(&["help"], "Showing help information"),
        Intent::ClearScreen => fixed(&["clear"], "Clearing screen"),
    }
}

fn fixed(commands: &[&str], explanation: &str) -> Synthesis {
    Synthesis {
        commands: commands.iter().map(|c| c.to_string()).collect(),
        explanation: explanation.to_string(),
    }
}

/// Keyword driven suggestions for text that matched no pattern. Never empty.
pub fn suggest(text: &str) -> Vec<String> {
    let text = text.to_lowercase();
    let name = text
        .split_whitespace()
        .find(|w| w.contains('.') || w.chars().all(char::is_alphanumeric));
    let mut suggestions = Vec::new();

    if text.contains("file") || text.contains("document") {
        match name {
            Some(n) => suggestions.extend([format!("cat {n}"), format!("ls {n}")]),
            None => suggestions.extend(["ls".to_string(), "cat <filename>".to_string()]),
        }
    }
    if text.contains("folder") || text.contains("directory") {
        match name {
            Some(n) => suggestions.extend([format!("mkdir {n}"), format!("cd {n}")]),
            None => suggestions.extend(["ls".to_string(), "mkdir <foldername>".to_string()]),
        }
    }
    if text.contains("search") || text.contains("find") {
        suggestions.push("find . -name '*pattern*'".to_string());
        suggestions.push("grep 'text' filename".to_string());
    }
    if text.contains("system") || text.contains("status") {
        suggestions.extend(["cpu", "memory", "ps", "uptime"].map(String::from));
    }

    if suggestions.is_empty() {
        suggestions = DEFAULT_SUGGESTIONS.map(String::from).to_vec();
    }
    suggestions
}

/// Match `text` and synthesize its commands.
///
/// When nothing matches the result carries no commands; the explanation then
/// lists what [`suggest`] came up with.
pub fn interpret(text: &str) -> Synthesis {
    match intent::find(text) {
        Some(m) => synthesize(m.intent, &m.captures, text),
        None => {
            let mut explanation = NOT_UNDERSTOOD.to_string();
            for s in suggest(text) {
                explanation.push_str("\n  ");
                explanation.push_str(&s);
            }
            Synthesis {
                commands: Vec::new(),
                explanation,
            }
        }
    }
}
