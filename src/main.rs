use ai_shell::{Interpreter, ShellConfig};
use argh::FromArgs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// Interactive shell that also understands plain-English requests via `ai <phrase>`.
struct Args {
    /// file to load history from and save it to (default: ~/.ai_shell_history)
    #[argh(option)]
    history_file: Option<PathBuf>,

    /// seconds a command handed to the system shell may run
    #[argh(option, default = "30")]
    timeout: u64,

    /// run a single line and exit instead of starting the interactive loop
    #[argh(option, short = 'c')]
    command: Option<String>,

    /// neither load nor save history
    #[argh(switch)]
    no_history: bool,

    /// log dispatch details to stderr
    #[argh(switch, short = 'v')]
    verbose: bool,
}

impl Args {
    fn config(&self) -> ShellConfig {
        let mut config = ShellConfig {
            shell_timeout: Duration::from_secs(self.timeout),
            ..ShellConfig::default()
        };
        if self.no_history {
            config.history_file = None;
        } else if let Some(path) = &self.history_file {
            config.history_file = Some(path.clone());
        }
        config
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();
    init_logging(args.verbose);

    let mut shell = Interpreter::with_config(args.config());

    let Some(line) = &args.command else {
        return match shell.repl() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("ai_shell: {e}");
                ExitCode::FAILURE
            }
        };
    };

    if let Err(e) = shell.load_history() {
        tracing::warn!(error = %e, "could not load history");
    }
    let result = shell.execute(line);
    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    if let Err(e) = shell.save_history() {
        tracing::warn!(error = %e, "could not save history");
    }
    ExitCode::SUCCESS
}
