//! Prompt templates for the screening and review stages
//!
//! Templates are plain text with `{name}` placeholders. The built-in ones ask
//! for answers in a fenced JSON list of field groups, which is the shape the
//! annotation driver merges into the table.

use crate::models::{ChatMessage, Row, MARKDOWN_COLUMN};
use crate::services::annotator::{AnnotationError, LIST_SEPARATOR};
use std::fs;
use std::path::Path;
use tracing::debug;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert researcher in computational social science \
with experience in narrative analysis, disinformation, and NLP.";

const DEFAULT_SCREENING_TEMPLATE: &str = include_str!("prompts/screening.txt");
const DEFAULT_REVIEW_TEMPLATE: &str = include_str!("prompts/review.txt");

#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplates {
    pub system: String,
    pub screening: String,
    pub review: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            screening: DEFAULT_SCREENING_TEMPLATE.to_string(),
            review: DEFAULT_REVIEW_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Built-in templates with any overrides applied
    pub fn load(
        system: Option<&str>,
        screening_path: Option<&Path>,
        review_path: Option<&Path>,
    ) -> std::io::Result<Self> {
        let mut templates = Self::default();

        if let Some(system) = system {
            templates.system = system.to_string();
        }
        if let Some(path) = screening_path {
            debug!("Loading screening prompt from {}", path.display());
            templates.screening = fs::read_to_string(path)?;
        }
        if let Some(path) = review_path {
            debug!("Loading review prompt from {}", path.display());
            templates.review = fs::read_to_string(path)?;
        }

        Ok(templates)
    }

    /// Title and abstract screening prompt
    pub fn screening_messages(&self, title: &str, r#abstract: &str) -> Vec<ChatMessage> {
        let user = render(&self.screening, &[("title", title), ("abstract", r#abstract)]);
        vec![ChatMessage::system(self.system.clone()), ChatMessage::user(user)]
    }

    /// Full-text review prompt
    pub fn review_messages<S: AsRef<str>>(&self, paper: &str, topics: &[S]) -> Vec<ChatMessage> {
        let noun = if topics.len() > 1 {
            "these concepts"
        } else {
            "this concept"
        };
        let user = render(
            &self.review,
            &[
                ("paper", paper),
                ("topics", &join_topics(topics)),
                ("topic_noun", noun),
            ],
        );
        vec![ChatMessage::system(self.system.clone()), ChatMessage::user(user)]
    }
}

/// Render `"a, b and c"`.
pub fn join_topics<S: AsRef<str>>(topics: &[S]) -> String {
    match topics {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [rest @ .., last] => {
            let head: Vec<&str> = rest.iter().map(|t| t.as_ref()).collect();
            format!("{} and {}", head.join(", "), last.as_ref())
        }
    }
}

/// Split a stored list cell back into topics.
pub fn split_topics(cell: &str) -> Vec<String> {
    cell.split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Substitute known `{name}` placeholders in a single pass.
///
/// Substituted values are never rescanned, so a paper body that happens to
/// contain `{title}` is left alone. Unknown braces pass through verbatim.
fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];

        let hit = values.iter().find_map(|(name, value)| {
            tail.strip_prefix(name)
                .and_then(|after| after.strip_prefix('}'))
                .map(|after| (value, after))
        });

        match hit {
            Some((value, after)) => {
                out.push_str(value);
                rest = after;
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Prompt arguments for the screening stage
pub fn screening_args(row: &Row) -> Result<(String, String), AnnotationError> {
    let title = row
        .get_str("title")
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AnnotationError::Prompt("row has no title".to_string()))?;
    let r#abstract = row.get_str("abstract").unwrap_or_default();
    Ok((title.to_string(), r#abstract.to_string()))
}

/// Prompt arguments for the review stage
pub fn review_args(
    row: &Row,
    markdown_column: &str,
    topics_column: &str,
) -> Result<(String, Vec<String>), AnnotationError> {
    let paper = row
        .get_str(markdown_column)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AnnotationError::Prompt(format!("row has no `{}`", markdown_column)))?;

    let topics = split_topics(row.get_str(topics_column).unwrap_or_default());
    if topics.is_empty() {
        return Err(AnnotationError::Prompt(format!(
            "row has no topics in `{}`",
            topics_column
        )));
    }

    Ok((paper.to_string(), topics))
}

/// Default review arguments using the standard column names
pub fn default_review_args(row: &Row) -> Result<(String, Vec<String>), AnnotationError> {
    review_args(row, MARKDOWN_COLUMN, "disinformation topics")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_topics() {
        assert_eq!(join_topics::<&str>(&[]), "");
        assert_eq!(join_topics(&["Fake News"]), "Fake News");
        assert_eq!(join_topics(&["a", "b"]), "a and b");
        assert_eq!(join_topics(&["a", "b", "c"]), "a, b and c");
    }

    #[test]
    fn test_screening_messages_fill_placeholders() {
        let templates = PromptTemplates::default();
        let messages = templates.screening_messages("Narratives at Scale", "We study narratives.");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[1].content.contains("TITLE\nNarratives at Scale"));
        assert!(messages[1].content.contains("We study narratives."));
        assert!(!messages[1].content.contains("{title}"));
        // JSON braces in the answer format survive
        assert!(messages[1].content.contains("\"shared task\": \"Yes|No\""));
    }

    #[test]
    fn test_review_noun_follows_topic_count() {
        let templates = PromptTemplates::default();

        let one = templates.review_messages("body", &["Propaganda"]);
        assert!(one[1].content.contains("concerned with Propaganda."));
        assert!(one[1].content.contains("for this concept?"));

        let many = templates.review_messages("body", &["Fake News", "Propaganda"]);
        assert!(many[1].content.contains("Fake News and Propaganda"));
        assert!(many[1].content.contains("for these concepts?"));
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let out = render("{a} {b} {c}", &[("a", "{b}"), ("b", "x")]);
        assert_eq!(out, "{b} x {c}");
    }

    #[test]
    fn test_split_topics_reads_joined_list_cells() {
        assert_eq!(split_topics("Fake News,\nPropaganda"), vec!["Fake News", "Propaganda"]);
        assert_eq!(
            split_topics("Rumours, hoaxes,\nPropaganda"),
            vec!["Rumours, hoaxes", "Propaganda"]
        );
        assert!(split_topics("").is_empty());
    }

    #[test]
    fn test_overrides_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("screen.txt");
        fs::write(&path, "Title: {title}").unwrap();

        let templates = PromptTemplates::load(Some("Be brief."), Some(&path), None).unwrap();
        let messages = templates.screening_messages("X", "Y");
        assert_eq!(messages[0].content, "Be brief.");
        assert_eq!(messages[1].content, "Title: X");
    }

    #[test]
    fn test_review_args_require_markdown_and_topics() {
        let mut row = Row::default();
        row.set("title", "T");
        assert!(default_review_args(&row).is_err());

        row.set(MARKDOWN_COLUMN, "# Paper");
        assert!(default_review_args(&row).is_err());

        row.set("disinformation topics", "Fake News,\nPropaganda");
        let (paper, topics) = default_review_args(&row).unwrap();
        assert_eq!(paper, "# Paper");
        assert_eq!(topics.len(), 2);
    }
}
