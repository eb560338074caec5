//! Command-line interface
//!
//! Each subcommand loads what it needs from the settings file and the result
//! table, runs one pipeline step, and writes the table back.

pub mod annotate;
pub mod audit;
pub mod export;
pub mod scrape;
pub mod search;

use crate::config::Settings;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "litsift")]
#[command(about = "Literature search aggregation and LLM-assisted screening")]
#[command(version)]
pub struct Cli {
    /// Settings file (defaults to <config dir>/litsift/settings.json)
    #[arg(long, global = true, env = "LITSIFT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Also write daily log files to this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search the configured providers and save the deduplicated results
    Search(search::SearchArgs),

    /// Annotate table rows with a chat model
    Annotate(annotate::AnnotateArgs),

    /// Download and extract full texts into the table
    Scrape(scrape::ScrapeArgs),

    /// Check how many gold papers a table contains
    Audit(audit::AuditArgs),

    /// Export a table to CSV
    Export(export::ExportArgs),
}

pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;

    match cli.command {
        Commands::Search(args) => search::run(args, &settings).await,
        Commands::Annotate(args) => annotate::run(args, &settings).await,
        Commands::Scrape(args) => scrape::run(args, &settings).await,
        Commands::Audit(args) => audit::run(args, &settings),
        Commands::Export(args) => export::run(args),
    }
}

/// Bar used by the long-running row loops
pub(crate) fn progress_bar(message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    bar.set_message(message);
    bar
}
