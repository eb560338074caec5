use super::progress_bar;
use crate::adapters::pdf_scraper::PdfScraper;
use crate::config::Settings;
use crate::storage::{load_table, save_table};
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct ScrapeArgs {
    /// Result table to fill in place
    #[arg(long)]
    pub table: PathBuf,

    /// First row to scrape
    #[arg(long, default_value = "0")]
    pub start: usize,

    /// Row to stop before
    #[arg(long)]
    pub end: Option<usize>,

    /// Re-download papers that already have text
    #[arg(long)]
    pub overwrite: bool,
}

pub async fn run(args: ScrapeArgs, settings: &Settings) -> Result<()> {
    let scraper = PdfScraper::new()
        .context("Failed to set up PDF downloads")?
        .with_column(settings.annotation.markdown_column.clone())
        .with_max_chars(settings.annotation.max_paper_chars);

    let mut table = load_table(&args.table)?;
    let bar = progress_bar("Scraping papers...");

    let summary = scraper
        .scrape_table(&mut table, args.start, args.end, !args.overwrite, Some(&bar))
        .await;

    save_table(&table, &args.table)?;
    println!(
        "{} scraped, {} already present, {} failed",
        summary.scraped, summary.kept, summary.failed
    );
    Ok(())
}
