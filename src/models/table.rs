//! Tabular result set shared by search and annotation
//!
//! A `ResultTable` is the caller-owned structure the annotation driver writes
//! into. Columns are free-form so model answers can add new ones per row.

use super::paper::PaperRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::Range;

/// Column holding the scraped full text of a paper.
pub const MARKDOWN_COLUMN: &str = "paper markdown";

/// Per-row annotation lifecycle.
///
/// Persisted as the nullable boolean `requires_reannotation`:
/// `null` = never attempted, `true` = needs retry, `false` = done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum AnnotationState {
    #[default]
    NeverAttempted,
    NeedsRetry,
    Done,
}

impl AnnotationState {
    /// Rows that are already done are skipped by the driver.
    pub fn is_done(self) -> bool {
        matches!(self, AnnotationState::Done)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnnotationState::NeverAttempted => "",
            AnnotationState::NeedsRetry => "true",
            AnnotationState::Done => "false",
        }
    }
}

impl From<Option<bool>> for AnnotationState {
    fn from(flag: Option<bool>) -> Self {
        match flag {
            None => AnnotationState::NeverAttempted,
            Some(true) => AnnotationState::NeedsRetry,
            Some(false) => AnnotationState::Done,
        }
    }
}

impl From<AnnotationState> for Option<bool> {
    fn from(state: AnnotationState) -> Self {
        match state {
            AnnotationState::NeverAttempted => None,
            AnnotationState::NeedsRetry => Some(true),
            AnnotationState::Done => Some(false),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Row {
    #[serde(default)]
    pub columns: BTreeMap<String, Value>,
    #[serde(default)]
    pub requires_reannotation: AnnotationState,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// String value of a column; `None` when missing or not a string.
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.columns.get(column).and_then(Value::as_str)
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.insert(column.into(), value.into());
    }

    pub fn title(&self) -> &str {
        self.get_str("title").unwrap_or_default()
    }
}

impl From<PaperRecord> for Row {
    fn from(paper: PaperRecord) -> Self {
        let mut row = Row::default();
        row.set("title", paper.title);
        row.set("authors", paper.authors);
        row.set("doi", paper.doi);
        row.set("abstract", paper.r#abstract);
        row.set("url", paper.url);
        row.set("year", paper.year);
        row.set("source", paper.source);
        row
    }
}

/// Minimal capability set the annotation driver relies on.
pub trait RowStore {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn row(&self, index: usize) -> Option<&Row>;

    fn get(&self, index: usize, column: &str) -> Option<&Value> {
        self.row(index).and_then(|row| row.get(column))
    }

    fn set(&mut self, index: usize, column: &str, value: Value);

    fn state(&self, index: usize) -> AnnotationState {
        self.row(index)
            .map(|row| row.requires_reannotation)
            .unwrap_or_default()
    }

    fn set_state(&mut self, index: usize, state: AnnotationState);

    /// Positional slice, clamped to the table bounds.
    fn slice(&self, range: Range<usize>) -> &[Row];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultTable {
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Default for ResultTable {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_papers(papers: impl IntoIterator<Item = PaperRecord>) -> Self {
        let mut table = Self::new();
        table.extend_papers(papers);
        table
    }

    pub fn extend_papers(&mut self, papers: impl IntoIterator<Item = PaperRecord>) {
        self.rows.extend(papers.into_iter().map(Row::from));
        self.touch();
    }

    pub fn titles(&self) -> Vec<String> {
        self.rows.iter().map(|row| row.title().to_string()).collect()
    }

    /// Every column name in the table, paper columns first.
    pub fn column_names(&self) -> Vec<String> {
        const LEADING: [&str; 7] = ["title", "authors", "doi", "abstract", "url", "year", "source"];

        let mut names: Vec<String> = LEADING.iter().map(|c| c.to_string()).collect();
        for row in &self.rows {
            for key in row.columns.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.clone());
                }
            }
        }
        names
    }

    pub fn count_by_state(&self, state: AnnotationState) -> usize {
        self.rows
            .iter()
            .filter(|row| row.requires_reannotation == state)
            .count()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl RowStore for ResultTable {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    fn set(&mut self, index: usize, column: &str, value: Value) {
        if let Some(row) = self.rows.get_mut(index) {
            row.set(column, value);
            self.updated_at = Utc::now();
        }
    }

    fn set_state(&mut self, index: usize, state: AnnotationState) {
        if let Some(row) = self.rows.get_mut(index) {
            row.requires_reannotation = state;
            self.updated_at = Utc::now();
        }
    }

    fn slice(&self, range: Range<usize>) -> &[Row] {
        let end = range.end.min(self.rows.len());
        let start = range.start.min(end);
        &self.rows[start..end]
    }
}
