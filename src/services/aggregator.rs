//! Cross-provider result aggregation
//!
//! Results from every provider flow into one `AggregationSession`, which owns
//! the seen-title set and the accepted records. Deduplication is by
//! lowercased title and strictly first-seen-wins.

use super::gold::{nr_gold_papers_found, GoldReport, GoldTitles};
use crate::models::PaperRecord;
use std::collections::HashSet;
use tracing::{info, warn};

/// Number of accepted titles echoed individually per batch.
const ECHO_TITLES: usize = 3;

/// Outcome of ingesting one provider batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestSummary {
    pub added: usize,
    pub duplicates: usize,
    pub empty_titles: usize,
    /// Recall over the accepted batch, when a gold set is configured.
    pub gold: Option<GoldReport>,
}

/// Merge `new_results` into `all_results`, skipping titles already seen.
///
/// Empty titles are logged and dropped without touching `seen_titles`.
/// When `gold_titles` is given the audit runs on the accepted batch only.
pub fn add_to_all_results(
    new_results: Vec<PaperRecord>,
    seen_titles: &mut HashSet<String>,
    all_results: &mut Vec<PaperRecord>,
    gold_titles: Option<&GoldTitles>,
) -> IngestSummary {
    let mut summary = IngestSummary::default();
    let mut accepted = Vec::new();

    for paper in new_results {
        let key = paper.dedup_key();
        if key.is_empty() {
            warn!("Empty title in results from {}", paper.source);
            summary.empty_titles += 1;
            continue;
        }

        if !seen_titles.insert(key) {
            summary.duplicates += 1;
            continue;
        }

        if accepted.len() < ECHO_TITLES {
            info!("Added: {}", paper.title);
        } else if accepted.len() == ECHO_TITLES {
            info!("Adding more...");
        }
        accepted.push(paper);
    }

    if let Some(gold) = gold_titles.filter(|g| !g.is_empty()) {
        let titles: Vec<&str> = accepted.iter().map(|p| p.title.as_str()).collect();
        summary.gold = Some(nr_gold_papers_found(&titles, gold.titles(), false));
    }

    summary.added = accepted.len();
    all_results.extend(accepted);
    info!("Added {} new papers", summary.added);

    summary
}

/// Owning context for one search session.
#[derive(Debug, Default)]
pub struct AggregationSession {
    seen_titles: HashSet<String>,
    results: Vec<PaperRecord>,
    gold_titles: Option<GoldTitles>,
}

impl AggregationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gold_titles(mut self, gold: Option<GoldTitles>) -> Self {
        self.gold_titles = gold;
        self
    }

    /// Seed the session with titles from an earlier run so they are not
    /// re-added. The seeded titles are not part of `results`.
    pub fn with_known_titles<I, S>(mut self, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.seen_titles.extend(
            titles
                .into_iter()
                .map(|t| t.as_ref().to_lowercase())
                .filter(|t| !t.is_empty()),
        );
        self
    }

    pub fn ingest(&mut self, batch: Vec<PaperRecord>) -> IngestSummary {
        add_to_all_results(
            batch,
            &mut self.seen_titles,
            &mut self.results,
            self.gold_titles.as_ref(),
        )
    }

    pub fn results(&self) -> &[PaperRecord] {
        &self.results
    }

    pub fn gold_titles(&self) -> Option<&GoldTitles> {
        self.gold_titles.as_ref()
    }

    pub fn into_results(self) -> Vec<PaperRecord> {
        self.results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(title: &str, source: &str) -> PaperRecord {
        PaperRecord::new(title, source).with_abstract("...")
    }

    #[test]
    fn test_same_title_across_calls_is_kept_once() {
        let mut session = AggregationSession::new();
        session.ingest(vec![paper("Foo", "arxiv")]);
        let summary = session.ingest(vec![paper("foo", "crossref")]);

        assert_eq!(session.results().len(), 1);
        assert_eq!(session.results()[0].source, "arxiv");
        assert_eq!(summary.added, 0);
        assert_eq!(summary.duplicates, 1);
    }

    #[test]
    fn test_duplicates_within_one_batch() {
        let mut seen = HashSet::new();
        let mut all = Vec::new();
        let summary = add_to_all_results(
            vec![paper("A", "x"), paper("B", "x"), paper("a", "x"), paper("C", "x")],
            &mut seen,
            &mut all,
            None,
        );

        let titles: Vec<&str> = all.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
        assert_eq!(summary.added, 3);
    }

    #[test]
    fn test_empty_title_is_rejected_and_not_seen() {
        let mut seen = HashSet::new();
        let mut all = Vec::new();
        let summary = add_to_all_results(vec![paper("", "x")], &mut seen, &mut all, None);

        assert!(all.is_empty());
        assert!(seen.is_empty());
        assert_eq!(summary.empty_titles, 1);
    }

    #[test]
    fn test_existing_results_are_appended_to() {
        let mut seen = HashSet::new();
        let mut all = Vec::new();
        add_to_all_results(vec![paper("First", "x")], &mut seen, &mut all, None);
        add_to_all_results(
            vec![paper("Second", "y"), paper("Third", "y")],
            &mut seen,
            &mut all,
            None,
        );

        let titles: Vec<&str> = all.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_gold_audit_covers_only_the_accepted_batch() {
        let gold = GoldTitles::new(vec!["Alpha".to_string(), "Beta".to_string()]);
        let mut session = AggregationSession::new().with_gold_titles(Some(gold));

        let first = session.ingest(vec![paper("Alpha", "x")]);
        assert_eq!(first.gold.as_ref().map(|g| g.found), Some(1));

        // Alpha is a duplicate here, so only Beta is in the accepted batch
        let second = session.ingest(vec![paper("alpha", "y"), paper("Beta", "y")]);
        assert_eq!(second.gold.as_ref().map(|g| g.found), Some(1));
    }

    #[test]
    fn test_known_titles_block_readding() {
        let mut session = AggregationSession::new().with_known_titles(["Old Paper"]);
        let summary = session.ingest(vec![paper("OLD PAPER", "x"), paper("New Paper", "x")]);

        assert_eq!(session.results().len(), 1);
        assert_eq!(summary.duplicates, 1);

        // The newly accepted title is now blocked too
        let again = session.ingest(vec![paper("new paper", "y")]);
        assert_eq!(again.added, 0);
    }
}
