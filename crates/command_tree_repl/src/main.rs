use std::{
    env,
    io::{self, BufRead, Write},
    path::PathBuf,
    process::ExitCode,
};

use command_tree::EngineConfig;
use command_tree_repl::{demo_manager, Evaluation, ReplSender, ReplSession};

struct Options {
    config: Option<PathBuf>,
    sender: ReplSender,
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<Options, String> {
    let mut config = None;
    let mut name = "console".to_string();
    let mut grants = Vec::new();
    let mut args = args;
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| args.next().ok_or_else(|| format!("{flag} needs a value"));
        match arg.as_str() {
            "--config" => config = Some(PathBuf::from(value("--config")?)),
            "--as" => name = value("--as")?,
            "--grant" => grants.push(value("--grant")?),
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    let sender = grants
        .into_iter()
        .fold(ReplSender::new(name), ReplSender::grant);
    Ok(Options { config, sender })
}

fn print_usage() {
    eprintln!("usage: command_tree_repl [--config <path>] [--as <name>] [--grant <permission>]...");
    eprintln!("lines: `?partial` completes, `:commands` lists commands, anything else runs");
}

fn run(options: Options) -> Result<(), String> {
    let config = match &options.config {
        Some(path) => EngineConfig::load(path).map_err(|err| err.to_string())?,
        None => EngineConfig::default(),
    };
    let manager = demo_manager(&config).map_err(|err| err.to_string())?;
    let session = ReplSession::new(manager, options.sender);
    tracing::info!(sender = %session.sender().name, "session started");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = line.map_err(|err| err.to_string())?;
        match session.eval_line(&line) {
            Evaluation::Empty => {}
            Evaluation::Output(lines) => {
                for line in lines {
                    writeln!(stdout, "{line}").map_err(|err| err.to_string())?;
                }
            }
            Evaluation::Failure { message, code } => eprintln!("error ({code}): {message}"),
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .init();

    let options = match parse_args(env::args().skip(1)) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("error: {err}");
            print_usage();
            return ExitCode::from(2);
        }
    };

    match run(options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}
