//! Yawn Dataset CLI - build a mouth open/closed dataset from yawning videos.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::extract::{self, ExtractArgs};
use commands::{Cli, Commands, ExitCode};
use config::AppConfig;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = AppConfig::load();

    let exit_code = match cli.command {
        Some(Commands::Models(ref args)) => match commands::models::run(args, &config) {
            Ok(()) => ExitCode::Success,
            Err(e) => {
                eprintln!("error: {e:#}");
                ExitCode::Error
            }
        },
        Some(Commands::Extract(args)) => run_extract(args, &config),
        None => run_extract(cli.extract, &config),
    };

    exit_code.into()
}

fn run_extract(args: ExtractArgs, config: &AppConfig) -> ExitCode {
    let args = ExtractArgs::with_config(args, config);
    match extract::run(&args) {
        Ok(summary) => extract::exit_code(&summary),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::Error
        }
    }
}
