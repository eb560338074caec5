//! Storage module for result tables
//!
//! This module provides JSON persistence and CSV export for the table the
//! search and annotation pipelines share.

pub mod table_store;

pub use table_store::{export_csv, load_or_new, load_table, save_table, TableError};
