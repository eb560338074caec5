//! JSON settings file
//!
//! Looked up at an explicit path or `<config dir>/litsift/settings.json`.
//! Every section and field has a default, so a partial file is fine and a
//! missing default file means "all defaults".

use crate::adapters::chat_client::{ChatTimeouts, DEFAULT_BASE_URL};
use crate::adapters::ProviderKind;
use crate::models::MARKDOWN_COLUMN;
use crate::services::{SearchQuery, TermGroups};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not find a config directory")]
    NoConfigDir,

    #[error("failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub search: SearchSettings,
    pub llm: LlmSettings,
    pub annotation: AnnotationSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub keywords: Vec<String>,
    pub relevance_terms: TermGroups,
    pub min_year: i32,
    pub max_results: usize,
    pub providers: Vec<ProviderKind>,
    pub gold_titles_path: Option<PathBuf>,
    pub verbose_gold: bool,
    pub semantic_scholar_key_path: Option<PathBuf>,
    /// Contact address for the OpenAlex and Crossref polite pools
    pub openalex_email: Option<String>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            relevance_terms: TermGroups::default(),
            min_year: 0,
            max_results: 100,
            providers: ProviderKind::ALL.to_vec(),
            gold_titles_path: None,
            verbose_gold: false,
            semantic_scholar_key_path: None,
            openalex_email: None,
        }
    }
}

impl SearchSettings {
    pub fn query(&self) -> SearchQuery {
        SearchQuery {
            keywords: self.keywords.clone(),
            relevance_terms: self.relevance_terms.clone(),
            min_year: self.min_year,
            max_results: self.max_results,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key_path: Option<PathBuf>,
    pub model: String,
    pub stream: bool,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub overall_timeout_secs: u64,
    pub system_prompt: Option<String>,
    pub screening_prompt_path: Option<PathBuf>,
    pub review_prompt_path: Option<PathBuf>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_path: None,
            model: "meta-llama-3.1-8b-instruct".to_string(),
            stream: false,
            connect_timeout_secs: 3,
            read_timeout_secs: 200,
            overall_timeout_secs: 600,
            system_prompt: None,
            screening_prompt_path: None,
            review_prompt_path: None,
        }
    }
}

impl LlmSettings {
    pub fn timeouts(&self) -> ChatTimeouts {
        ChatTimeouts {
            connect: Duration::from_secs(self.connect_timeout_secs),
            read: Duration::from_secs(self.read_timeout_secs),
            overall: Duration::from_secs(self.overall_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationSettings {
    /// Column holding the topics passed to the review prompt
    pub topics_column: String,
    pub markdown_column: String,
    /// Cap on scraped text length, in characters
    pub max_paper_chars: Option<usize>,
}

impl Default for AnnotationSettings {
    fn default() -> Self {
        Self {
            topics_column: "disinformation topics".to_string(),
            markdown_column: MARKDOWN_COLUMN.to_string(),
            max_paper_chars: None,
        }
    }
}

/// `<config dir>/litsift/settings.json`
pub fn default_settings_path() -> Result<PathBuf, ConfigError> {
    Ok(dirs::config_dir()
        .ok_or(ConfigError::NoConfigDir)?
        .join("litsift")
        .join("settings.json"))
}

impl Settings {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (default_settings_path()?, false),
        };

        if !required && !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        let settings =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse { path: path.clone(), source })?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }
}
