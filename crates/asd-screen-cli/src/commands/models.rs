//! Models command - inspect the models directory.

use std::path::PathBuf;

use anyhow::Result;
use asd_screen_adapters::models::MODELS;
use asd_screen_adapters::{list_models as adapter_list_models, models_dir};
use clap::{Args, Subcommand};

use super::apply_models_dir;
use crate::config::AppConfig;

/// Arguments for the models command
#[derive(Args, Clone)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommand,

    /// Custom models directory (overrides default and config)
    #[arg(long, value_name = "DIR", global = true)]
    pub models_dir: Option<PathBuf>,
}

/// Models subcommands
#[derive(Subcommand, Clone, Copy)]
pub enum ModelsCommand {
    /// List known models and whether their weights are present
    List,
    /// Print model directory path
    Path,
}

impl ModelsArgs {
    /// Apply the configured models directory unless one was passed.
    pub fn with_config(mut args: Self, config: &AppConfig) -> Self {
        if args.models_dir.is_none() {
            args.models_dir.clone_from(&config.models.dir);
        }
        args
    }
}

/// Run the models command.
#[allow(clippy::unnecessary_wraps)]
pub fn run(args: &ModelsArgs) -> Result<()> {
    apply_models_dir(args.models_dir.as_deref());
    match args.command {
        ModelsCommand::List => list_models(),
        ModelsCommand::Path => print_path(),
    }
    Ok(())
}

fn list_models() {
    let models = adapter_list_models();

    println!("Models directory: {}", models_dir().display());
    println!();

    for status in &models {
        let mark = if status.installed { "✓" } else { "✗" };
        let description = MODELS
            .iter()
            .find(|m| m.name == status.name)
            .map_or("", |m| m.description);
        let filename = status
            .path
            .file_name()
            .map_or_else(String::new, |f| f.to_string_lossy().into_owned());
        println!("  {mark} {} ({filename}) - {description}", status.name);
    }

    println!();
    let installed_count = models.iter().filter(|m| m.installed).count();
    println!("{}/{} models installed", installed_count, models.len());
}

fn print_path() {
    println!("{}", models_dir().display());
}
