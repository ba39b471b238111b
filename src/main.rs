use std::fs::File;
use std::io::{self, BufRead, BufReader, IsTerminal, Write};

use anyhow::{bail, Context, Result};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use acpview::config::Settings;
use acpview::AggregateOptions;
use acpview::render::{flatten_lines_to_plain, render_messages};
use acpview::session::{spawn_update_source, SessionLog};
use acpview::update::read_update_log;

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "usage: acpview [--session ID] [--json] [--strict] [--live] [--list-sessions] [PATH|-]";

#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    path: Option<String>,
    session: Option<String>,
    json: bool,
    strict: bool,
    /// Keep the last turn open, as for a session still in progress.
    live: bool,
    list_sessions: bool,
}

enum Command {
    Run(Args),
    Version,
    Help,
}

fn parse_args(raw: &[String]) -> Result<Command> {
    let mut args = Args::default();
    let mut iter = raw.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--version" | "-v" => return Ok(Command::Version),
            "--help" | "-h" => return Ok(Command::Help),
            "--json" => args.json = true,
            "--strict" => args.strict = true,
            "--live" => args.live = true,
            "--list-sessions" => args.list_sessions = true,
            "--session" | "-s" => {
                let id = iter.next().context("--session requires a value")?;
                args.session = Some(id.clone());
            }
            "-" => args.path = None,
            flag if flag.starts_with('-') => bail!("unknown argument: {flag}"),
            path => {
                if args.path.is_some() {
                    bail!("only one update log may be given");
                }
                args.path = Some(path.to_string());
            }
        }
    }
    Ok(Command::Run(args))
}

fn init_logging() {
    let default_level = "warn";
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_ansi(io::stderr().is_terminal())
        .with_writer(io::stderr)
        .try_init();
}

fn open_input(path: Option<&str>) -> Result<Box<dyn BufRead + Send>> {
    match path {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("open update log {path}"))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

/// A log read to its end is a finished transcript unless `--live` says the
/// session is still running.
fn aggregate_options(args: &Args, settings: &Settings) -> AggregateOptions {
    AggregateOptions {
        close_final_turn: !args.live,
        ..settings.aggregate
    }
}

fn load_sessions(args: &Args, settings: &Settings) -> Result<SessionLog> {
    let input = open_input(args.path.as_deref())?;
    let mut log = SessionLog::new(aggregate_options(args, settings));
    if args.strict {
        log.extend(read_update_log(input, true)?);
    } else {
        let rx = spawn_update_source(input);
        log.drain_blocking(&rx);
    }
    Ok(log)
}

fn run(args: Args) -> Result<()> {
    let settings = Settings::from_env();
    let mut log = load_sessions(&args, &settings)?;
    let mut stdout = io::stdout().lock();

    if args.list_sessions {
        for id in log.session_ids() {
            writeln!(stdout, "{id}\t{} updates", log.updates(id).len())?;
        }
        return Ok(());
    }

    let session_id = match args.session {
        Some(id) => id,
        None => match log.session_ids().first() {
            Some(id) => id.clone(),
            None => {
                tracing::info!("update log is empty");
                return Ok(());
            }
        },
    };
    if log.updates(&session_id).is_empty() {
        bail!("no updates for session {session_id}");
    }

    let messages = log.messages(&session_id);
    tracing::debug!(
        session = %session_id,
        updates = log.updates(&session_id).len(),
        messages = messages.len(),
        "aggregated session"
    );

    if args.json {
        let out = json!({
            "sessionId": session_id,
            "state": log.state(&session_id),
            "messages": messages,
        });
        serde_json::to_writer_pretty(&mut stdout, &out).context("write json output")?;
        writeln!(stdout)?;
        return Ok(());
    }

    let palette = settings.theme.palette();
    let lines = render_messages(&messages, &palette, settings.width);
    for line in flatten_lines_to_plain(&lines) {
        writeln!(stdout, "{line}")?;
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logging();
    let raw: Vec<String> = std::env::args().skip(1).collect();
    match parse_args(&raw) {
        Ok(Command::Version) => {
            println!("acpview {}", APP_VERSION);
            Ok(())
        }
        Ok(Command::Help) => {
            println!("{USAGE}");
            Ok(())
        }
        Ok(Command::Run(args)) => run(args),
        Err(err) => {
            eprintln!("{err}\n{USAGE}");
            std::process::exit(2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_flags_and_path() {
        let Command::Run(args) =
            parse_args(&argv(&["--json", "-s", "abc", "log.jsonl"])).expect("parse")
        else {
            panic!("expected run");
        };
        assert_eq!(
            args,
            Args {
                path: Some("log.jsonl".to_string()),
                session: Some("abc".to_string()),
                json: true,
                strict: false,
                live: false,
                list_sessions: false,
            }
        );
    }

    #[test]
    fn rejects_unknown_flags_and_missing_values() {
        assert!(parse_args(&argv(&["--bogus"])).is_err());
        assert!(parse_args(&argv(&["--session"])).is_err());
        assert!(parse_args(&argv(&["a", "b"])).is_err());
        assert!(matches!(
            parse_args(&argv(&["--version"])),
            Ok(Command::Version)
        ));
    }

    #[test]
    fn finished_logs_close_the_final_turn_unless_live() {
        let settings = Settings::default();
        let Command::Run(args) = parse_args(&argv(&["log.jsonl"])).expect("parse") else {
            panic!("expected run");
        };
        assert!(aggregate_options(&args, &settings).close_final_turn);

        let Command::Run(args) = parse_args(&argv(&["--live", "-"])).expect("parse") else {
            panic!("expected run");
        };
        let options = aggregate_options(&args, &settings);
        assert!(!options.close_final_turn);
        assert_eq!(options.output_limit, settings.aggregate.output_limit);
    }
}
