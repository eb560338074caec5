use super::progress_bar;
use crate::adapters::OpenAiCompatClient;
use crate::config::Settings;
use crate::models::{AnnotationState, ChatMessage, ResultTable};
use crate::services::annotator::{AnnotationRun, Annotator};
use crate::services::prompts::{review_args, screening_args, PromptTemplates};
use crate::storage::{load_table, save_table};
use crate::utils::read_secret;
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Stage {
    /// Title and abstract screening
    Screening,
    /// Full-text review (needs scraped text)
    Review,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Screening => "screening",
            Stage::Review => "review",
        }
    }
}

#[derive(Args)]
pub struct AnnotateArgs {
    /// Result table to annotate in place
    #[arg(long)]
    pub table: PathBuf,

    #[arg(long, value_enum)]
    pub stage: Stage,

    /// First row to annotate
    #[arg(long, default_value = "0")]
    pub start: usize,

    /// Row to stop before
    #[arg(long)]
    pub end: Option<usize>,

    /// Model name (overrides llm.model)
    #[arg(long)]
    pub model: Option<String>,

    /// Echo model output as it streams in
    #[arg(long)]
    pub stream: bool,
}

pub async fn run(args: AnnotateArgs, settings: &Settings) -> Result<()> {
    let llm = &settings.llm;

    let key_path = llm
        .api_key_path
        .as_deref()
        .context("No model API key configured: set llm.api_key_path")?;
    let api_key = read_secret(key_path).context("Could not read the model API key")?;

    let stream = args.stream || llm.stream;
    let client = OpenAiCompatClient::new(&llm.base_url, api_key, llm.timeouts())?.with_streaming(stream);

    let templates = PromptTemplates::load(
        llm.system_prompt.as_deref(),
        llm.screening_prompt_path.as_deref(),
        llm.review_prompt_path.as_deref(),
    )
    .context("Failed to load prompt templates")?;

    let mut table = load_table(&args.table)?;
    let model = args.model.clone().unwrap_or_else(|| llm.model.clone());

    // Streamed output and a progress bar would fight over the terminal
    let bar = if stream {
        ProgressBar::hidden()
    } else {
        progress_bar("Annotating papers...")
    };
    let annotator = Annotator::new(&client, model).with_progress(bar);

    let run = match args.stage {
        Stage::Screening => {
            annotator
                .run(
                    &mut table,
                    |(title, r#abstract): (String, String)| -> Vec<ChatMessage> {
                        templates.screening_messages(&title, &r#abstract)
                    },
                    screening_args,
                    args.start,
                    args.end,
                )
                .await
        }
        Stage::Review => {
            let markdown_column = &settings.annotation.markdown_column;
            let topics_column = &settings.annotation.topics_column;
            annotator
                .run(
                    &mut table,
                    |(paper, topics): (String, Vec<String>)| -> Vec<ChatMessage> {
                        templates.review_messages(&paper, &topics)
                    },
                    |row| review_args(row, markdown_column, topics_column),
                    args.start,
                    args.end,
                )
                .await
        }
    };

    // Saved even after a halt so the run can be resumed
    save_table(&table, &args.table)?;
    report(&run, &table, &args.table, args.stage);
    Ok(())
}

fn report(run: &AnnotationRun, table: &ResultTable, table_path: &Path, stage: Stage) {
    println!(
        "Rows {}..{}: {} annotated, {} already done, {} flagged for retry",
        run.start,
        run.end,
        run.annotated,
        run.skipped,
        run.flagged.len()
    );
    println!(
        "Table: {} done, {} need retry, {} not attempted",
        table.count_by_state(AnnotationState::Done),
        table.count_by_state(AnnotationState::NeedsRetry),
        table.count_by_state(AnnotationState::NeverAttempted)
    );

    if let Some(index) = run.halted_at {
        println!(
            "Stopped by rate limit at row {}. Resume with: {}",
            index,
            resume_hint(table_path, stage, index)
        );
    } else if !run.flagged.is_empty() {
        println!("Re-run the same range to retry flagged rows.");
    }
}

fn resume_hint(table_path: &Path, stage: Stage, index: usize) -> String {
    format!(
        "litsift annotate --table {} --stage {} --start {}",
        table_path.display(),
        stage.as_str(),
        index
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn test_model_override_keeps_args_usable() {
        let cli = Cli::try_parse_from([
            "litsift", "annotate", "--table", "papers.json", "--stage", "screening", "--model", "qwen3-32b",
        ])
        .unwrap();
        let Commands::Annotate(args) = cli.command else {
            panic!("expected annotate");
        };

        let model = args.model.clone().unwrap_or_else(|| "default".to_string());
        assert_eq!(model, "qwen3-32b");
        assert_eq!(
            resume_hint(&args.table, args.stage, 7),
            "litsift annotate --table papers.json --stage screening --start 7"
        );
    }
}
