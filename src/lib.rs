//! An interactive shell with a natural-language front end.
//!
//! Lines are dispatched to built-in commands implemented in Rust (file
//! operations, navigation, search, system monitoring). Anything the shell does
//! not know is handed to the operating system's shell. A line starting with
//! `ai` is matched against a table of English phrasings and translated into
//! one or more ordinary commands, which are then run in order.
//!
//! The main entry point is [`Interpreter`]. [`intent`] and [`synth`] expose the
//! phrase recognizer on its own, and [`metrics`] the system information seam.

mod builtin;
pub mod command;
mod config;
mod external;
pub mod history;
pub mod intent;
mod interpreter;
pub mod metrics;
mod monitor;
pub mod session;
pub mod synth;

pub use command::ExecutionResult;
pub use config::ShellConfig;
/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;
pub use session::Session;
