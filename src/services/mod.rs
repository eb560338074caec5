//! Services module for business logic
//!
//! This module contains the search, audit and annotation pipelines that
//! coordinate between adapters, models, and storage.

pub mod aggregator;
pub mod annotator;
pub mod gold;
pub mod prompts;
pub mod relevance;
pub mod response_parser;
pub mod search_runner;

pub use aggregator::{add_to_all_results, AggregationSession, IngestSummary};
pub use annotator::{annotate_rows, AnnotationError, AnnotationRun, Annotator};
pub use gold::{nr_gold_papers_found, GoldReport, GoldTitles};
pub use prompts::PromptTemplates;
pub use relevance::{is_relevant, TermGroups};
pub use response_parser::{extract_json, ExtractError};
pub use search_runner::{run_all, run_provider, ProviderReport, SearchQuery};
