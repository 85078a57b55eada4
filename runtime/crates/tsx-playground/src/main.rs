//! `tsx-play`: run one snippet through the playground engine from a shell.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use tsx_playground::{EngineConfig, EventLog, OutputKind, Playground, RunTrigger, SessionId};

/// Screen, transpile and run a JS/TS snippet in the playground sandbox
#[derive(Parser, Debug)]
#[command(name = "tsx-play")]
#[command(about = "Screen, transpile and run a JS/TS snippet in the playground sandbox")]
#[command(after_help = "Reads the snippet from stdin when neither --eval nor a file is given.")]
struct Args {
    /// Evaluate code
    #[arg(short, long, value_name = "CODE", conflicts_with = "file")]
    eval: Option<String>,

    /// Load engine settings from a TOML file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,

    /// Snippet file to run
    file: Option<PathBuf>,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tsx_playground=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let source = match (args.eval, &args.file) {
        (Some(code), _) => code,
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    if source.trim().is_empty() {
        bail!("no code to execute");
    }

    let mut playground = Playground::new(config);
    let session = playground.open_session(SessionId::from("cli"));
    let mut log = EventLog::new();
    playground.request_run(&session, &source, RunTrigger::Manual, Instant::now(), &mut log);

    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    for event in log.for_session(&session) {
        if args.json {
            writeln!(stdout, "{}", serde_json::to_string(event)?)?;
        } else {
            match event.kind {
                OutputKind::Log | OutputKind::Info | OutputKind::Result => {
                    writeln!(stdout, "{}", event.text())?
                }
                _ => writeln!(stderr, "{}", event.text())?,
            }
        }
    }

    let completed = match log.finished.last() {
        Some((_, outcome)) => {
            if args.json {
                writeln!(stdout, "{}", serde_json::to_string(outcome)?)?;
            }
            outcome.is_completed()
        }
        None => false,
    };

    Ok(if completed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_eval_and_json() {
        let args = Args::parse_from(["tsx-play", "-e", "console.log(1)", "--json"]);
        assert_eq!(args.eval.as_deref(), Some("console.log(1)"));
        assert!(args.json);
        assert!(args.file.is_none());
    }

    #[test]
    fn test_args_file_and_config() {
        let args = Args::parse_from(["tsx-play", "--config", "play.toml", "snippet.ts"]);
        assert_eq!(args.config, Some(PathBuf::from("play.toml")));
        assert_eq!(args.file, Some(PathBuf::from("snippet.ts")));
        assert!(args.eval.is_none());
    }

    #[test]
    fn test_args_eval_conflicts_with_file() {
        assert!(Args::try_parse_from(["tsx-play", "-e", "1", "snippet.ts"]).is_err());
    }
}
