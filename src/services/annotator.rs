//! Resumable row-by-row LLM annotation
//!
//! Each row carries an `AnnotationState`. A run walks a range of rows in
//! order, skips rows already `Done`, and records `NeedsRetry` for rows that
//! fail. A rate-limit response stops the run at the current row; re-running
//! over the same range later picks up exactly the rows that still need work.

use super::response_parser::{extract_json, ExtractError};
use crate::adapters::chat_client::{ChatError, ChatModel};
use crate::models::{AnnotationState, ChatMessage, Row, RowStore};
use indicatif::ProgressBar;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Separator used when a list answer is flattened into one cell.
pub const LIST_SEPARATOR: &str = ",\n";

#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("could not build prompt: {0}")]
    Prompt(String),

    #[error(transparent)]
    Model(#[from] ChatError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("unexpected response shape: {0}")]
    Response(String),
}

impl AnnotationError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, AnnotationError::Model(ChatError::RateLimited { .. }))
    }
}

/// Summary of one annotation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationRun {
    pub start: usize,
    pub end: usize,
    pub annotated: usize,
    pub skipped: usize,
    /// Row indices that failed and were flagged for another pass.
    pub flagged: Vec<usize>,
    /// Row index at which a rate limit stopped the run.
    pub halted_at: Option<usize>,
}

impl AnnotationRun {
    pub fn halted(&self) -> bool {
        self.halted_at.is_some()
    }
}

/// Drives a chat model over a table of papers
pub struct Annotator<'a> {
    client: &'a dyn ChatModel,
    model: String,
    progress: Option<ProgressBar>,
}

impl<'a> Annotator<'a> {
    pub fn new(client: &'a dyn ChatModel, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            progress: None,
        }
    }

    /// Tick a progress bar once per row in range
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Annotate rows `[start, end)` of `rows`.
    ///
    /// `get_prompt_args` pulls what the prompt needs out of a row and
    /// `prompt_fn` turns that into chat messages. `end` is clamped to the
    /// table length.
    pub async fn run<S, A, P, G>(
        &self,
        rows: &mut S,
        prompt_fn: P,
        get_prompt_args: G,
        start: usize,
        end: Option<usize>,
    ) -> AnnotationRun
    where
        S: RowStore + ?Sized,
        P: Fn(A) -> Vec<ChatMessage>,
        G: Fn(&Row) -> Result<A, AnnotationError>,
    {
        let end = end.map_or(rows.len(), |e| e.min(rows.len()));
        let mut run = AnnotationRun {
            start,
            end,
            ..Default::default()
        };

        if let Some(bar) = &self.progress {
            bar.set_length(end.saturating_sub(start) as u64);
        }

        info!("Annotating papers {}..{} with {}", start, end, self.model);

        for i in start..end {
            if let Some(bar) = &self.progress {
                bar.inc(1);
            }

            if rows.state(i).is_done() {
                run.skipped += 1;
                continue;
            }

            match self.annotate_row(&*rows, i, &prompt_fn, &get_prompt_args).await {
                Ok(updates) => {
                    for (column, value) in updates {
                        rows.set(i, &column, Value::String(value));
                    }
                    rows.set_state(i, AnnotationState::Done);
                    run.annotated += 1;
                }
                Err(e) if e.is_rate_limit() => {
                    warn!(
                        "{}. Stopping early at index {}. Resume later when rate limit resets.",
                        e, i
                    );
                    run.halted_at = Some(i);
                    break;
                }
                Err(e) => {
                    error!("Error processing row {}: {}", i, e);
                    rows.set_state(i, AnnotationState::NeedsRetry);
                    run.flagged.push(i);
                }
            }
        }

        if let Some(bar) = &self.progress {
            bar.finish();
        }

        info!(
            annotated = run.annotated,
            skipped = run.skipped,
            flagged = run.flagged.len(),
            "Annotation run finished"
        );
        run
    }

    async fn annotate_row<S, A, P, G>(
        &self,
        rows: &S,
        index: usize,
        prompt_fn: &P,
        get_prompt_args: &G,
    ) -> Result<Vec<(String, String)>, AnnotationError>
    where
        S: RowStore + ?Sized,
        P: Fn(A) -> Vec<ChatMessage>,
        G: Fn(&Row) -> Result<A, AnnotationError>,
    {
        let row = rows
            .row(index)
            .ok_or_else(|| AnnotationError::Prompt(format!("no row at index {}", index)))?;

        let messages = prompt_fn(get_prompt_args(row)?);
        debug!("Prompting {} for row {}: {}", self.model, index, row.title());

        let response = self.client.complete(&messages, &self.model).await?;
        let parsed = extract_json(&response)?;

        field_updates(parsed)
    }
}

/// Annotate `[start, end)` of `rows` with a one-off `Annotator`.
pub async fn annotate_rows<S, A, P, G>(
    rows: &mut S,
    client: &dyn ChatModel,
    model: &str,
    prompt_fn: P,
    get_prompt_args: G,
    start: usize,
    end: Option<usize>,
) -> AnnotationRun
where
    S: RowStore + ?Sized,
    P: Fn(A) -> Vec<ChatMessage>,
    G: Fn(&Row) -> Result<A, AnnotationError>,
{
    Annotator::new(client, model)
        .run(rows, prompt_fn, get_prompt_args, start, end)
        .await
}

/// Flatten the model's field groups into `(column, cell)` writes.
///
/// Strings are written as-is and string lists are joined with
/// [`LIST_SEPARATOR`]. Other scalar answers are ignored. A lone object is
/// accepted as a single field group.
pub fn field_updates(parsed: Value) -> Result<Vec<(String, String)>, AnnotationError> {
    let groups = match parsed {
        Value::Array(groups) => groups,
        group @ Value::Object(_) => vec![group],
        other => {
            return Err(AnnotationError::Response(format!(
                "expected a list of field groups, got {}",
                other
            )))
        }
    };

    let mut updates = Vec::new();
    for group in groups {
        let Value::Object(fields) = group else {
            return Err(AnnotationError::Response(format!(
                "field group is not an object: {}",
                group
            )));
        };

        for (key, value) in fields {
            match value {
                Value::String(s) => updates.push((key, s)),
                Value::Array(items) => {
                    let parts = items
                        .into_iter()
                        .map(|item| match item {
                            Value::String(s) => Ok(s),
                            other => Err(AnnotationError::Response(format!(
                                "non-string item in list `{}`: {}",
                                key, other
                            ))),
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    updates.push((key, parts.join(LIST_SEPARATOR)));
                }
                _ => {}
            }
        }
    }

    Ok(updates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaperRecord, ResultTable};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    enum Reply {
        Text(&'static str),
        RateLimited,
        Down,
    }

    /// Model stub that answers from a fixed script and counts calls.
    struct ScriptedModel {
        replies: Mutex<VecDeque<Reply>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, messages: &[ChatMessage], _model: &str) -> Result<String, ChatError> {
            self.calls
                .lock()
                .unwrap()
                .push(messages.last().map(|m| m.content.clone()).unwrap_or_default());

            match self.replies.lock().unwrap().pop_front() {
                Some(Reply::Text(text)) => Ok(text.to_string()),
                Some(Reply::RateLimited) => Err(ChatError::RateLimited {
                    retry_after_secs: None,
                }),
                Some(Reply::Down) | None => Err(ChatError::Transient("connection reset".to_string())),
            }
        }
    }

    const GOOD: &str = "<think>hmm</think>\n```json\n[{\"survey\": \"No\"}, {\"methods present\": \"Yes\", \"methods\": [\"Clustering\", \"RAG\"]}]\n```";

    fn table(n: usize) -> ResultTable {
        ResultTable::from_papers(
            (0..n).map(|i| PaperRecord::new(format!("Paper {}", i), "test").with_abstract("abstract")),
        )
    }

    fn prompt(title: String) -> Vec<ChatMessage> {
        vec![ChatMessage::user(title)]
    }

    fn args(row: &Row) -> Result<String, AnnotationError> {
        row.get_str("title")
            .map(str::to_string)
            .ok_or_else(|| AnnotationError::Prompt("missing title".to_string()))
    }

    #[tokio::test]
    async fn test_every_row_ends_done_or_flagged() {
        let mut rows = table(3);
        let model = ScriptedModel::new(vec![Reply::Text(GOOD), Reply::Text("no json here"), Reply::Text(GOOD)]);

        let run = annotate_rows(&mut rows, &model, "m", prompt, args, 0, None).await;

        assert_eq!(run.annotated, 2);
        assert_eq!(run.flagged, vec![1]);
        assert_eq!(rows.state(0), AnnotationState::Done);
        assert_eq!(rows.state(1), AnnotationState::NeedsRetry);
        assert_eq!(rows.state(2), AnnotationState::Done);
        assert_eq!(rows.count_by_state(AnnotationState::NeverAttempted), 0);
    }

    #[tokio::test]
    async fn test_rerun_only_touches_flagged_rows() {
        let mut rows = table(3);
        let first = ScriptedModel::new(vec![Reply::Text(GOOD), Reply::Down, Reply::Text(GOOD)]);
        annotate_rows(&mut rows, &first, "m", prompt, args, 0, None).await;

        let second = ScriptedModel::new(vec![Reply::Text(GOOD)]);
        let run = annotate_rows(&mut rows, &second, "m", prompt, args, 0, None).await;

        assert_eq!(second.calls(), vec!["Paper 1".to_string()]);
        assert_eq!(run.skipped, 2);
        assert_eq!(run.annotated, 1);
        assert_eq!(rows.count_by_state(AnnotationState::Done), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_halts_the_run() {
        let mut rows = table(4);
        let model = ScriptedModel::new(vec![Reply::Text(GOOD), Reply::RateLimited, Reply::Text(GOOD)]);

        let run = annotate_rows(&mut rows, &model, "m", prompt, args, 0, None).await;

        assert_eq!(run.halted_at, Some(1));
        assert_eq!(model.calls().len(), 2);
        // The halted row is left untouched so a resume retries it
        assert_eq!(rows.state(1), AnnotationState::NeverAttempted);
        assert_eq!(rows.state(2), AnnotationState::NeverAttempted);
    }

    #[tokio::test]
    async fn test_answers_are_merged_into_columns() {
        let mut rows = table(1);
        let model = ScriptedModel::new(vec![Reply::Text(GOOD)]);

        annotate_rows(&mut rows, &model, "m", prompt, args, 0, None).await;

        assert_eq!(rows.get(0, "survey"), Some(&json!("No")));
        assert_eq!(rows.get(0, "methods"), Some(&json!("Clustering,\nRAG")));
    }

    #[tokio::test]
    async fn test_range_is_clamped_and_respected() {
        let mut rows = table(3);
        let model = ScriptedModel::new(vec![Reply::Text(GOOD), Reply::Text(GOOD)]);

        let run = annotate_rows(&mut rows, &model, "m", prompt, args, 1, Some(50)).await;

        assert_eq!(run.end, 3);
        assert_eq!(rows.state(0), AnnotationState::NeverAttempted);
        assert_eq!(model.calls(), vec!["Paper 1".to_string(), "Paper 2".to_string()]);
    }

    #[tokio::test]
    async fn test_prompt_argument_failure_flags_row() {
        let mut rows = table(1);
        rows.rows[0].columns.remove("title");
        let model = ScriptedModel::new(vec![Reply::Text(GOOD)]);

        let run = annotate_rows(&mut rows, &model, "m", prompt, args, 0, None).await;

        assert_eq!(run.flagged, vec![0]);
        assert!(model.calls().is_empty());
    }

    #[test]
    fn test_field_updates_rejects_non_object_groups() {
        assert!(field_updates(json!(["just a string"])).is_err());
        assert!(field_updates(json!("Yes")).is_err());
    }

    #[test]
    fn test_field_updates_ignores_other_scalars() {
        let updates = field_updates(json!({"score": 3, "survey": "No", "empty": null})).unwrap();
        assert_eq!(updates, vec![("survey".to_string(), "No".to_string())]);
    }

    #[test]
    fn test_non_string_list_items_fail() {
        let err = field_updates(json!([{"tasks": ["a", 1]}])).unwrap_err();
        assert!(matches!(err, AnnotationError::Response(_)));
    }
}
