use crate::adapters::{ProviderKind, ProviderOptions, SearchProvider};
use crate::config::Settings;
use crate::models::ResultTable;
use crate::services::{nr_gold_papers_found, run_all, AggregationSession, GoldTitles};
use crate::storage::{load_or_new, save_table};
use crate::utils::read_secret;
use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::warn;

#[derive(Args)]
pub struct SearchArgs {
    /// Where to save the result table
    #[arg(long)]
    pub out: PathBuf,

    /// Keyword to search for (repeatable, overrides the settings)
    #[arg(long = "keyword")]
    pub keywords: Vec<String>,

    /// Provider to query (repeatable, overrides the settings)
    #[arg(long = "provider")]
    pub providers: Vec<ProviderKind>,

    /// Keep the rows already in `--out` and only add new titles
    #[arg(long)]
    pub append: bool,

    /// Earliest publication year
    #[arg(long)]
    pub min_year: Option<i32>,

    /// Results per keyword and provider
    #[arg(long)]
    pub max_results: Option<usize>,
}

pub async fn run(args: SearchArgs, settings: &Settings) -> Result<()> {
    let mut query = settings.search.query();
    if !args.keywords.is_empty() {
        query.keywords = args.keywords;
    }
    if let Some(min_year) = args.min_year {
        query.min_year = min_year;
    }
    if let Some(max_results) = args.max_results {
        query.max_results = max_results;
    }
    if query.keywords.is_empty() {
        bail!("No keywords to search for: pass --keyword or set search.keywords");
    }

    let kinds = if args.providers.is_empty() {
        settings.search.providers.clone()
    } else {
        args.providers
    };

    let options = ProviderOptions {
        semantic_scholar_key: kinds
            .contains(&ProviderKind::SemanticScholar)
            .then(|| semantic_scholar_key(settings))
            .flatten(),
        contact_email: settings.search.openalex_email.clone(),
    };
    let providers = kinds
        .iter()
        .map(|kind| kind.build(&options))
        .collect::<Result<Vec<Box<dyn SearchProvider>>, _>>()
        .context("Failed to set up search providers")?;

    let mut table = if args.append {
        load_or_new(&args.out)?
    } else {
        ResultTable::new()
    };

    let gold = settings
        .search
        .gold_titles_path
        .as_deref()
        .and_then(GoldTitles::load);

    let mut session = AggregationSession::new()
        .with_gold_titles(gold)
        .with_known_titles(table.titles());

    let reports = run_all(&providers, &query, &mut session).await;

    for report in &reports {
        println!(
            "{:<16} {:>5} candidates, {:>5} added, {:>5} duplicates",
            report.provider, report.candidates, report.ingest.added, report.ingest.duplicates
        );
        if !report.failed_keywords.is_empty() {
            println!("  failed keywords: {}", report.failed_keywords.join(", "));
        }
    }

    let gold = session.gold_titles().cloned();
    table.extend_papers(session.into_results());

    if let Some(gold) = gold.filter(|g| !g.is_empty()) {
        let overall = nr_gold_papers_found(&table.titles(), gold.titles(), settings.search.verbose_gold);
        println!("Gold papers in table: {}/{}", overall.found, overall.total);
    }

    save_table(&table, &args.out)?;
    println!("Saved {} papers to {}", table.rows.len(), args.out.display());
    Ok(())
}

/// Key from the configured file, then the environment; anonymous otherwise
fn semantic_scholar_key(settings: &Settings) -> Option<String> {
    if let Some(path) = &settings.search.semantic_scholar_key_path {
        match read_secret(path) {
            Ok(key) => return Some(key),
            Err(e) => warn!("{}", e),
        }
    }

    let key = std::env::var("SEMANTIC_SCHOLAR_API_KEY").ok().filter(|k| !k.is_empty());
    if key.is_none() {
        warn!("Could not find Semantic Scholar API key (recommended). Continuing without...");
    }
    key
}
