//! CLI command definitions and handlers.

pub mod extract;
pub mod models;

use clap::{Parser, Subcommand};

/// Yawn Dataset - extract a mouth open/closed image dataset from videos
#[derive(Parser)]
#[command(name = "yawn-dataset")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Shared extract arguments (dataset, output, thresholds, flags).
    #[command(flatten)]
    pub extract: extract::ExtractArgs,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Extract labeled mouth crops from a video dataset
    Extract(extract::ExtractArgs),
    /// Manage ML models
    Models(models::ModelsArgs),
}

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Every video was processed.
    Success = 0,
    /// At least one video was abandoned.
    VideosFailed = 1,
    /// The run could not start or a command failed.
    Error = 2,
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        Self::from(code as u8)
    }
}
