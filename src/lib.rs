//! Literature search aggregation and LLM-assisted screening
//!
//! Searches bibliographic APIs for keyword lists, deduplicates and filters
//! the hits into one result table, audits recall against a hand-picked gold
//! set, and annotates each paper with a chat model in resumable passes.

pub mod adapters;
pub mod commands;
pub mod config;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use config::{ConfigError, Settings};
pub use models::{AnnotationState, PaperRecord, ResultTable, Row, RowStore};
