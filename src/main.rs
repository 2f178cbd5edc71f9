use clap::Parser;
use std::io::IsTerminal;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cleanup;
mod cli;
mod config;
mod git;
mod github;
mod layers;
mod placeholders;
mod provision;
mod render;
mod util;

use cli::{Command, RootArgs};

fn main() -> ExitCode {
    let args = RootArgs::parse();
    init_logging(verbose(&args.command));

    let result = match &args.command {
        Command::Provision(args) => provision::run_provision(args),
        Command::Cleanup(args) => cleanup::run_cleanup(args),
        Command::ResolveLayers(args) => layers::run_resolve_layers(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "run failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn verbose(command: &Command) -> bool {
    match command {
        Command::Provision(args) => args.verbose,
        Command::Cleanup(args) => args.verbose,
        Command::ResolveLayers(_) => false,
    }
}

/// Logs go to stderr; stdout carries results for the calling pipeline.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}
