//! Models command - manage ML models.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use clap::{Args, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use yawn_dataset_adapters::models::{
    ensure_models_with_progress, list_models as adapter_list_models, model_info, models_dir,
    set_models_dir, ProgressCallback,
};

use crate::config::AppConfig;

/// Arguments for the models command
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommand,

    /// Custom models directory (overrides default and config)
    #[arg(long, value_name = "DIR", global = true)]
    pub models_dir: Option<PathBuf>,
}

/// Models subcommands
#[derive(Subcommand)]
pub enum ModelsCommand {
    /// Download models that have a known URL
    Fetch,
    /// List models and whether they are installed
    List,
    /// Print model directory path
    Path,
}

/// Run the models command.
///
/// # Errors
///
/// Returns an error if a download fails.
pub fn run(args: &ModelsArgs, config: &AppConfig) -> Result<()> {
    if let Some(dir) = args.models_dir.as_ref().or(config.models.dir.as_ref()) {
        set_models_dir(dir.clone());
    }

    match args.command {
        ModelsCommand::Fetch => fetch_models(),
        ModelsCommand::List => {
            list_models();
            Ok(())
        }
        ModelsCommand::Path => {
            println!("{}", models_dir().display());
            Ok(())
        }
    }
}

fn fetch_models() -> Result<()> {
    let pb = Arc::new(ProgressBar::new(0));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}")
            .map_err(|e| anyhow::anyhow!("Invalid progress template: {e}"))?
            .progress_chars("#>-"),
    );

    let current_model: Arc<Mutex<String>> = Arc::new(Mutex::new(String::new()));
    let pb_clone = Arc::clone(&pb);
    let model_clone = Arc::clone(&current_model);

    let progress: ProgressCallback =
        Box::new(move |name: &str, downloaded: u64, total: Option<u64>| {
            let is_new_model = {
                let mut current = model_clone.lock().unwrap_or_else(PoisonError::into_inner);
                if *current == name {
                    false
                } else {
                    *current = name.to_string();
                    true
                }
            };
            if is_new_model {
                pb_clone.set_length(total.unwrap_or(0));
                pb_clone.set_message(name.to_string());
            }
            pb_clone.set_position(downloaded);
        });

    ensure_models_with_progress(Some(&progress))?;

    pb.finish_with_message("Downloadable models are present");
    Ok(())
}

fn list_models() {
    let models = adapter_list_models();

    println!("Models directory: {}", models_dir().display());
    println!();

    for (name, installed) in &models {
        let status = if *installed { "✓" } else { "✗" };
        let (filename, role, source) = model_info(name).map_or(("unknown", "", ""), |m| {
            (
                m.filename,
                m.role,
                if m.url.is_some() { "" } else { ", manual" },
            )
        });
        println!("  {status} {name} ({filename}) - {role}{source}");
    }

    println!();
    let installed_count = models.iter().filter(|(_, installed)| *installed).count();
    println!("{}/{} models installed", installed_count, models.len());
}
