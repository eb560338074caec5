use crate::config::Settings;
use crate::services::{nr_gold_papers_found, GoldTitles};
use crate::storage::load_table;
use anyhow::{anyhow, Context, Result};
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct AuditArgs {
    /// Result table to check
    #[arg(long)]
    pub table: PathBuf,

    /// Gold titles file, one title per line (defaults to search.gold_titles_path)
    #[arg(long)]
    pub gold: Option<PathBuf>,

    /// List the gold papers that were not found
    #[arg(long)]
    pub verbose: bool,
}

pub fn run(args: AuditArgs, settings: &Settings) -> Result<()> {
    let gold_path = args
        .gold
        .or_else(|| settings.search.gold_titles_path.clone())
        .context("No gold titles file: pass --gold or set search.gold_titles_path")?;

    let gold = GoldTitles::load(&gold_path)
        .ok_or_else(|| anyhow!("Could not read gold titles from {}", gold_path.display()))?;
    let table = load_table(&args.table)?;

    let report = nr_gold_papers_found(&table.titles(), gold.titles(), args.verbose);
    println!("Gold papers found: {}/{}", report.found, report.total);
    if args.verbose {
        for title in &report.missing {
            println!("  missing: {}", title);
        }
    }
    Ok(())
}
