//! Result table persistence
//!
//! Tables are stored as pretty-printed JSON so an interrupted annotation run
//! can be resumed from disk, and exported to CSV for spreadsheets.

use crate::models::{ResultTable, Row};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Column name used for the annotation state in CSV exports
pub const STATE_COLUMN: &str = "requires reannotation";

const LIST_SEPARATOR: &str = "; ";

#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to read table {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write table {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid table JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),
}

/// Load a table saved by [`save_table`]
pub fn load_table(path: &Path) -> Result<ResultTable, TableError> {
    let content = fs::read_to_string(path).map_err(|source| TableError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let table: ResultTable = serde_json::from_str(&content)?;
    debug!("Loaded {} rows from {}", table.rows.len(), path.display());
    Ok(table)
}

/// Load a table, or start an empty one if the file does not exist yet
pub fn load_or_new(path: &Path) -> Result<ResultTable, TableError> {
    if path.exists() {
        load_table(path)
    } else {
        Ok(ResultTable::new())
    }
}

/// Write the table as JSON, replacing the file atomically
pub fn save_table(table: &ResultTable, path: &Path) -> Result<(), TableError> {
    let write_err = |source: std::io::Error| TableError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let content = serde_json::to_string_pretty(table)?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, content).map_err(write_err)?;
    fs::rename(&tmp_path, path).map_err(write_err)?;

    info!("Saved {} rows to {}", table.rows.len(), path.display());
    Ok(())
}

/// Export every column (plus the annotation state) as CSV
pub fn export_csv(table: &ResultTable, path: &Path) -> Result<(), TableError> {
    let columns = table.column_names();
    let mut writer = csv::Writer::from_path(path)?;

    let mut header: Vec<&str> = columns.iter().map(String::as_str).collect();
    header.push(STATE_COLUMN);
    writer.write_record(&header)?;

    for row in &table.rows {
        writer.write_record(csv_record(row, &columns))?;
    }

    writer.flush().map_err(|source| TableError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Exported {} rows to {}", table.rows.len(), path.display());
    Ok(())
}

fn csv_record(row: &Row, columns: &[String]) -> Vec<String> {
    let mut record: Vec<String> = columns
        .iter()
        .map(|column| row.get(column).map(cell_text).unwrap_or_default())
        .collect();
    record.push(row.requires_reannotation.as_str().to_string());
    record
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(cell_text).collect::<Vec<_>>().join(LIST_SEPARATOR),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnnotationState, PaperRecord, RowStore};
    use serde_json::json;

    fn sample() -> ResultTable {
        let mut paper = PaperRecord::new("Narratives, Frames and \"Quotes\"", "arxiv").with_year(2022);
        paper.authors = vec!["A. One".to_string(), "B. Two".to_string()];

        let mut table = ResultTable::from_papers(vec![paper, PaperRecord::new("Second", "crossref")]);
        table.set(0, "survey", json!("No"));
        table.set_state(0, AnnotationState::Done);
        table.set_state(1, AnnotationState::NeedsRetry);
        table
    }

    #[test]
    fn test_save_and_load_keep_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results").join("table.json");

        let table = sample();
        save_table(&table, &path).unwrap();
        let loaded = load_table(&path).unwrap();

        assert_eq!(loaded.rows, table.rows);
        assert_eq!(loaded.state(0), AnnotationState::Done);
        assert_eq!(loaded.state(1), AnnotationState::NeedsRetry);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_load_or_new_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_or_new(&dir.path().join("none.json")).unwrap().is_empty());
    }

    #[test]
    fn test_csv_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");
        export_csv(&sample(), &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "title");
        assert_eq!(headers.iter().last(), Some(STATE_COLUMN));

        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);

        let col = |name: &str| headers.iter().position(|h| h == name).unwrap();
        assert_eq!(&records[0][col("title")], "Narratives, Frames and \"Quotes\"");
        assert_eq!(&records[0][col("authors")], "A. One; B. Two");
        assert_eq!(&records[0][col("year")], "2022");
        assert_eq!(&records[0][col("survey")], "No");
        assert_eq!(&records[0][col(STATE_COLUMN)], "false");
        assert_eq!(&records[1][col("survey")], "");
        assert_eq!(&records[1][col(STATE_COLUMN)], "true");
    }
}
