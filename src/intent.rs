//! Ordered pattern table mapping free text onto a fixed set of intents.
//!
//! Intents are tried in declaration order and, within an intent, patterns are
//! tried in declaration order. The first regex that matches anywhere in the text
//! wins. Order is part of the behaviour: `delete_folder` sits before the looser
//! `delete_file`, `search_text` (quoted capture) before `search_files`, and the
//! monitoring intents before `read_file`/`list_files`, whose `show X` patterns
//! would otherwise swallow "show cpu usage". Reordering is a breaking change.

use regex::{Regex, RegexBuilder};
use std::fmt;
use std::sync::LazyLock;

/// A named category of request the matcher can recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    CreateFile,
    CreateFolder,
    DeleteFolder,
    DeleteFile,
    ChangeDirectory,
    CopyFile,
    MoveFile,
    SearchText,
    SearchFiles,
    CpuUsage,
    MemoryUsage,
    RunningProcesses,
    SystemInfo,
    CurrentDirectory,
    GoHome,
    GoUp,
    ReadFile,
    ListFiles,
    Help,
    ClearScreen,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::CreateFile => "create_file",
            Intent::CreateFolder => "create_folder",
            Intent::DeleteFolder => "delete_folder",
            Intent::DeleteFile => "delete_file",
            Intent::ChangeDirectory => "change_directory",
            Intent::CopyFile => "copy_file",
            Intent::MoveFile => "move_file",
            Intent::SearchText => "search_text",
            Intent::SearchFiles => "search_files",
            Intent::CpuUsage => "cpu_usage",
            Intent::MemoryUsage => "memory_usage",
            Intent::RunningProcesses => "running_processes",
            Intent::SystemInfo => "system_info",
            Intent::CurrentDirectory => "current_directory",
            Intent::GoHome => "go_home",
            Intent::GoUp => "go_up",
            Intent::ReadFile => "read_file",
            Intent::ListFiles => "list_files",
            Intent::Help => "help",
            Intent::ClearScreen => "clear_screen",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declaration-ordered `(intent, patterns)` table.
const INTENT_PATTERNS: &[(Intent, &[&str])] = &[
    (
        Intent::CreateFile,
        &[
            r"create\s+(?:a\s+)?file\s+(?:named\s+)?([^\s]+)",
            r"make\s+(?:a\s+)?file\s+(?:named\s+)?([^\s]+)",
            r"new\s+file\s+(?:named\s+)?([^\s]+)",
        ],
    ),
    (
        Intent::CreateFolder,
        &[
            r"create\s+(?:a\s+)?(?:folder|directory)\s+(?:named\s+)?([^\s]+)",
            r"make\s+(?:a\s+)?(?:folder|directory)\s+(?:named\s+)?([^\s]+)",
            r"new\s+(?:folder|directory)\s+(?:named\s+)?([^\s]+)",
            r"mkdir\s+([^\s]+)",
        ],
    ),
    (
        Intent::DeleteFolder,
        &[
            r"delete\s+(?:the\s+)?(?:folder|directory)\s+([^\s]+)",
            r"remove\s+(?:the\s+)?(?:folder|directory)\s+([^\s]+)",
            r"rmdir\s+([^\s]+)",
        ],
    ),
    (
        Intent::DeleteFile,
        &[
            r"delete\s+(?:the\s+)?(?:file\s+)?([^\s]+)",
            r"remove\s+(?:the\s+)?(?:file\s+)?([^\s]+)",
            r"rm\s+([^\s]+)",
        ],
    ),
    (
        Intent::ChangeDirectory,
        &[
            r"go\s+to\s+([^\s]+)",
            r"navigate\s+to\s+([^\s]+)",
            r"enter\s+([^\s]+)",
            r"cd\s+([^\s]+)",
        ],
    ),
    (
        Intent::CopyFile,
        &[r"copy\s+([^\s]+)\s+to\s+([^\s]+)", r"cp\s+([^\s]+)\s+([^\s]+)"],
    ),
    (
        Intent::MoveFile,
        &[r"move\s+([^\s]+)\s+to\s+([^\s]+)", r"mv\s+([^\s]+)\s+([^\s]+)"],
    ),
    (
        Intent::SearchText,
        &[
            r#"search\s+for\s+"([^"]+)"\s+in\s+([^\s]+)"#,
            r#"grep\s+"([^"]+)"\s+([^\s]+)"#,
            r#"find\s+"([^"]+)"\s+in\s+([^\s]+)"#,
        ],
    ),
    (
        Intent::SearchFiles,
        &[
            r"find\s+(?:files\s+)?(?:named\s+)?([^\s]+)",
            r"search\s+for\s+([^\s]+)",
            r"locate\s+([^\s]+)",
        ],
    ),
    (
        Intent::CpuUsage,
        &[
            r"show\s+cpu\s+usage",
            r"what\s+is\s+the\s+cpu\s+usage",
            r"cpu\s+status",
            r"cpu",
        ],
    ),
    (
        Intent::MemoryUsage,
        &[
            r"show\s+memory\s+usage",
            r"what\s+is\s+the\s+memory\s+usage",
            r"memory\s+status",
            r"memory",
        ],
    ),
    (
        Intent::RunningProcesses,
        &[
            r"show\s+running\s+processes",
            r"list\s+processes",
            r"what\s+processes\s+are\s+running",
            r"ps",
        ],
    ),
    (
        Intent::SystemInfo,
        &[r"show\s+system\s+info", r"system\s+status", r"uptime"],
    ),
    (
        Intent::CurrentDirectory,
        &[r"where\s+am\s+i", r"current\s+directory", r"pwd"],
    ),
    (Intent::GoHome, &[r"go\s+home", r"navigate\s+home", r"cd\s+~"]),
    (Intent::GoUp, &[r"go\s+up", r"go\s+back", r"cd\s+\.\."]),
    (
        Intent::ReadFile,
        &[
            r"read\s+(?:the\s+)?(?:file\s+)?([^\s]+)",
            r"show\s+(?:the\s+)?(?:contents\s+of\s+)?([^\s]+)",
            r"cat\s+([^\s]+)",
        ],
    ),
    (
        Intent::ListFiles,
        &[
            r"list\s+(?:files\s+)?(?:in\s+)?([^\s]*)",
            r"show\s+(?:files\s+)?(?:in\s+)?([^\s]*)",
            r"ls\s*([^\s]*)",
        ],
    ),
    (
        Intent::Help,
        &[r"help", r"what\s+commands\s+are\s+available", r"show\s+help"],
    ),
    (
        Intent::ClearScreen,
        &[r"clear\s+screen", r"clear", r"cls"],
    ),
];

static INTENT_TABLE: LazyLock<Vec<(Intent, Vec<Regex>)>> = LazyLock::new(|| {
    INTENT_PATTERNS
        .iter()
        .map(|(intent, patterns)| {
            let compiled = patterns
                .iter()
                .map(|p| {
                    RegexBuilder::new(p)
                        .case_insensitive(true)
                        .build()
                        .unwrap_or_else(|e| panic!("invalid pattern for {intent}: {e}"))
                })
                .collect();
            (*intent, compiled)
        })
        .collect()
});

/// Outcome of a successful match: the intent and its positional captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentMatch {
    pub intent: Intent,
    /// One entry per capture group of the winning pattern. Groups that did not
    /// participate in the match are empty strings.
    pub captures: Vec<String>,
}

/// Finds the first intent whose pattern matches `text`.
///
/// The text is trimmed and lower-cased first. `None` is the normal answer for
/// text that names no known request.
pub fn find(text: &str) -> Option<IntentMatch> {
    let text = text.trim().to_lowercase();
    for (intent, patterns) in INTENT_TABLE.iter() {
        for re in patterns {
            if let Some(caps) = re.captures(&text) {
                let captures = caps
                    .iter()
                    .skip(1)
                    .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect();
                return Some(IntentMatch {
                    intent: *intent,
                    captures,
                });
            }
        }
    }
    None
}

/// Every intent in declaration order.
pub fn intents() -> impl Iterator<Item = Intent> {
    INTENT_PATTERNS.iter().map(|(intent, _)| *intent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(m: &IntentMatch) -> Vec<&str> {
        m.captures.iter().map(String::as_str).collect()
    }

    /// A phrase made of the words of each intent's first pattern.
    fn first_pattern_phrase(intent: Intent) -> &'static str {
        match intent {
            Intent::CreateFile => "create a file named notes.txt",
            Intent::CreateFolder => "create a folder named projects",
            Intent::DeleteFolder => "delete the folder old_stuff",
            Intent::DeleteFile => "delete the file old.txt",
            Intent::ChangeDirectory => "go to docs",
            Intent::CopyFile => "copy a.txt to b.txt",
            Intent::MoveFile => "move a.txt to b.txt",
            Intent::SearchText => "search for \"todo\" in notes.txt",
            Intent::SearchFiles => "find files named config",
            Intent::CpuUsage => "show cpu usage",
            Intent::MemoryUsage => "show memory usage",
            Intent::RunningProcesses => "show running processes",
            Intent::SystemInfo => "show system info",
            Intent::CurrentDirectory => "where am i",
            Intent::GoHome => "go home",
            Intent::GoUp => "go up",
            Intent::ReadFile => "read the file notes.txt",
            Intent::ListFiles => "list files in docs",
            Intent::Help => "help",
            Intent::ClearScreen => "clear screen",
        }
    }

    #[test]
    fn test_first_pattern_of_every_intent_wins_over_earlier_intents() {
        for intent in intents() {
            let phrase = first_pattern_phrase(intent);
            let found = find(phrase).map(|m| m.intent);
            assert_eq!(found, Some(intent), "phrase {phrase:?}");
        }
    }

    #[test]
    fn test_table_has_one_row_per_intent() {
        let all: Vec<Intent> = intents().collect();
        assert_eq!(all.len(), 20);
        for (i, a) in all.iter().enumerate() {
            assert!(!all[i + 1..].contains(a), "{a} declared twice");
        }
    }

    #[test]
    fn test_captures_are_positional() {
        let m = find("create a file named test.txt").unwrap();
        assert_eq!(m.intent, Intent::CreateFile);
        assert_eq!(caps(&m), ["test.txt"]);

        let m = find("copy a.txt to backup/").unwrap();
        assert_eq!(m.intent, Intent::CopyFile);
        assert_eq!(caps(&m), ["a.txt", "backup/"]);

        let m = find("show cpu usage").unwrap();
        assert!(m.captures.is_empty());
    }

    #[test]
    fn test_matching_ignores_case_and_surrounding_space() {
        let m = find("   Create A File Named README.md  ").unwrap();
        assert_eq!(m.intent, Intent::CreateFile);
        assert_eq!(caps(&m), ["readme.md"]);
    }

    #[test]
    fn test_quoted_search_beats_file_search() {
        let m = find("search for \"hello world\" in log.txt").unwrap();
        assert_eq!(m.intent, Intent::SearchText);
        assert_eq!(caps(&m), ["hello world", "log.txt"]);

        let m = find("search for config").unwrap();
        assert_eq!(m.intent, Intent::SearchFiles);
        assert_eq!(caps(&m), ["config"]);
    }

    #[test]
    fn test_folder_deletion_beats_file_deletion() {
        let m = find("remove the directory build").unwrap();
        assert_eq!(m.intent, Intent::DeleteFolder);
        assert_eq!(caps(&m), ["build"]);
    }

    #[test]
    fn test_directory_change_beats_monitoring_substrings() {
        let m = find("go to apps").unwrap();
        assert_eq!(m.intent, Intent::ChangeDirectory);
        assert_eq!(caps(&m), ["apps"]);

        let m = find("navigate to cpu_logs").unwrap();
        assert_eq!(m.intent, Intent::ChangeDirectory);
    }

    #[test]
    fn test_list_files_capture_may_be_empty() {
        let m = find("ls").unwrap();
        assert_eq!(m.intent, Intent::ListFiles);
        assert_eq!(caps(&m), [""]);
    }

    #[test]
    fn test_unrecognised_text_is_not_an_error() {
        assert_eq!(find("good morning"), None);
        assert_eq!(find(""), None);
    }
}
