//! Purpose: `augbridge` CLI entry point.
//! Role: Binary crate root; parses args, hosts one session over a JSON-lines transport.
//! Invariants: stdout carries only protocol envelopes; logs and fatal errors go to stderr.
//! Invariants: Non-interactive fatal errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: The session is torn down on EOF, closing every handle the script left open.
#![allow(clippy::result_large_err)]
use std::fs::File;
use std::io::{self, BufReader, IsTerminal};
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use augeas_bridge::api::{
    DEFAULT_NAMESPACE, Engine, Error, ErrorKind, HostSession, MemoryEngine, SessionConfig,
    error_value, to_exit_code,
};

mod stdio;

fn main() {
    let exit_code = match run() {
        Ok(code) => code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<i32, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let code = match err.kind() {
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => 2,
                    _ => 0,
                };
                return Ok(code);
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage).with_message(clap_error_summary(&err)),
                    ColorMode::Auto,
                ));
            }
        },
    };

    init_tracing();
    let color_mode = cli.color;
    let config = SessionConfig::with_namespace(cli.namespace);
    let engine = cli.engine.unwrap_or_default();

    let result = match cli.command {
        Command::Stdio => {
            let stdin = io::stdin();
            host(engine, config, stdin.lock())
        }
        Command::Run { file } => File::open(&file)
            .map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to open script")
                    .with_detail(file.display().to_string())
                    .with_source(err)
            })
            .and_then(|script| host(engine, config, BufReader::new(script))),
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "augbridge", &mut io::stdout());
            Ok(())
        }
    };
    result.map(|()| 0).map_err(|err| (err, color_mode))
}

#[derive(Parser)]
#[command(
    name = "augbridge",
    version,
    about = "Host configuration-tree engine sessions over JSON lines",
    long_about = None,
    after_help = r#"PROTOCOL
  Each input line is a JSON array: the command name, then its arguments.
  Each output line is {"ok": <outcome>} or {"error": {"kind", "message", "detail"}}.

EXAMPLES
  $ printf '%s\n' '["init", "/tmp/root"]' '["set", "::augeas::1", "/a/b", "v"]' | augbridge stdio
  $ augbridge run script.jsonl
  $ RUST_LOG=debug augbridge stdio"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        default_value = DEFAULT_NAMESPACE,
        help = "Token namespace; tokens look like <namespace>::<n>"
    )]
    namespace: String,
    #[arg(
        long,
        value_enum,
        help = "Engine backing new handles (default: augeas when built with libaugeas, else memory)"
    )]
    engine: Option<EngineChoice>,
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Serve JSON-lines requests from stdin until EOF")]
    Stdio,
    #[command(about = "Run a JSON-lines script file, one request per line")]
    Run {
        #[arg(help = "Script to run", value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },
    #[command(
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ augbridge completion bash > ~/.local/share/bash-completion/completions/augbridge
  $ augbridge completion zsh > ~/.zfunc/_augbridge"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum EngineChoice {
    Memory,
    Augeas,
}

impl Default for EngineChoice {
    fn default() -> Self {
        if cfg!(feature = "libaugeas") {
            EngineChoice::Augeas
        } else {
            EngineChoice::Memory
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

fn host<R: io::BufRead>(engine: EngineChoice, config: SessionConfig, reader: R) -> Result<(), Error> {
    match engine {
        EngineChoice::Memory => host_with(MemoryEngine::new(), config, reader),
        #[cfg(feature = "libaugeas")]
        EngineChoice::Augeas => host_with(augeas_bridge::api::LibAugeas::new(), config, reader),
        #[cfg(not(feature = "libaugeas"))]
        EngineChoice::Augeas => Err(Error::new(ErrorKind::Usage)
            .with_message("the augeas engine is not available in this build")
            .with_detail("rebuild with `--features libaugeas`")),
    }
}

fn host_with<E: Engine, R: io::BufRead>(engine: E, config: SessionConfig, reader: R) -> Result<(), Error> {
    let mut session = HostSession::new(engine, config)?;
    let stdout = io::stdout();
    let result = stdio::serve(&mut session, reader, io::BufWriter::new(stdout.lock()));
    let closed = session.shutdown();
    if let Ok(answered) = &result {
        tracing::debug!(answered, closed, "transport closed");
    }
    result.map(|_| ())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let first = rendered.lines().next().unwrap_or("invalid arguments");
    first
        .strip_prefix("error: ")
        .unwrap_or(first)
        .trim()
        .to_string()
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_json(err: &Error) -> Value {
    json!({ "error": error_value(err) })
}

enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = vec![format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        err.message().unwrap_or(err.kind_label())
    )];
    if let Some(detail) = err.detail() {
        lines.push(format!(
            "{} {detail}",
            colorize_label("detail:", use_color, AnsiColor::Yellow)
        ));
    }
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
        source = std::error::Error::source(cause);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{Cli, EngineChoice, error_json, error_text};
    use augeas_bridge::api::{Error, ErrorKind};
    use clap::{CommandFactory, Parser};
    use serde_json::json;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn namespace_defaults_and_overrides() {
        let cli = Cli::try_parse_from(["augbridge", "stdio"]).expect("parse");
        assert_eq!(cli.namespace, "::augeas");
        assert_eq!(cli.engine, None);
        let cli = Cli::try_parse_from(["augbridge", "--namespace", "::x", "--engine", "memory", "stdio"])
            .expect("parse");
        assert_eq!(cli.namespace, "::x");
        assert_eq!(cli.engine, Some(EngineChoice::Memory));
    }

    #[test]
    fn error_text_respects_color_flag() {
        let err = Error::new(ErrorKind::Usage)
            .with_message("bad input")
            .with_detail("line 3");
        let colored = error_text(&err, true);
        let plain = error_text(&err, false);
        assert!(colored.contains("\u{1b}[31merror:\u{1b}[0m"));
        assert!(plain.contains("error: bad input"));
        assert!(plain.contains("detail: line 3"));
        assert!(!plain.contains("\u{1b}["));
    }

    #[test]
    fn error_json_uses_kind_labels() {
        let err = Error::new(ErrorKind::Io).with_message("failed to open script");
        assert_eq!(
            error_json(&err),
            json!({"error": {"kind": "io", "message": "failed to open script"}})
        );
    }
}
