//! Gold-set recall auditing
//!
//! A gold set is a hand-curated list of papers the search is expected to find.
//! Matching is fuzzy: a gold title counts as found when it contains, or is
//! contained in, a result title (case-insensitive).

use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Reference titles loaded from a newline-delimited file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoldTitles(Vec<String>);

impl GoldTitles {
    pub fn new(titles: Vec<String>) -> Self {
        Self(titles)
    }

    /// Load one title per line, ignoring blank lines.
    ///
    /// Returns `None` (and logs a warning) when the file cannot be read so the
    /// search can continue without an audit.
    pub fn load(path: &Path) -> Option<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Some(Self::parse(&content)),
            Err(e) => {
                warn!(
                    "Could not load gold titles from {}: {}. Continuing without...",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    pub fn parse(content: &str) -> Self {
        Self(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn titles(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Outcome of a recall check over one batch of titles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoldReport {
    pub found: usize,
    pub total: usize,
    /// Lowercased gold titles with no match in the batch.
    pub missing: Vec<String>,
}

/// Count how many gold titles appear in `batch_titles`.
///
/// Each gold title contributes at most once. Empty batch titles are a data
/// quality problem: they are logged and skipped.
pub fn nr_gold_papers_found<S: AsRef<str>>(
    batch_titles: &[S],
    gold_titles: &[String],
    verbose: bool,
) -> GoldReport {
    let result_titles: Vec<String> = batch_titles
        .iter()
        .map(|t| t.as_ref().replace('\n', " ").trim().to_lowercase())
        .collect();

    let empty = result_titles.iter().filter(|t| t.is_empty()).count();
    if empty > 0 {
        warn!("{} empty title(s) in results", empty);
    }

    let mut report = GoldReport {
        total: gold_titles.len(),
        ..Default::default()
    };

    for gold in gold_titles {
        let gold = gold.to_lowercase();
        let found = result_titles
            .iter()
            .filter(|t| !t.is_empty())
            .any(|t| t.contains(gold.as_str()) || gold.contains(t.as_str()));

        if found {
            report.found += 1;
        } else {
            if verbose {
                info!("Not found: {}", gold);
            }
            report.missing.push(gold);
        }
    }

    info!("Gold papers found in this search: {}", report.found);
    report
}
