use serde::{Deserialize, Serialize};

/// Normalised search hit from any provider.
///
/// Every adapter maps its native result shape onto this record before the
/// aggregator sees it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PaperRecord {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub doi: String,
    #[serde(default)]
    pub r#abstract: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub source: String,
}

impl PaperRecord {
    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn with_abstract(mut self, text: impl Into<String>) -> Self {
        self.r#abstract = text.into();
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = year;
        self
    }

    /// Lowercased title, the key used for cross-provider deduplication.
    pub fn dedup_key(&self) -> String {
        self.title.to_lowercase()
    }
}

/// Role-tagged chat message sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}
