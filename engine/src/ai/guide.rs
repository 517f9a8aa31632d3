//! Grouping and summary generation over the Claude CLI.

use super::{extract_json_str, parse_json, run_claude};
use crate::classify::ClassifyError;
use crate::guide::{
    GroupingInput, GroupingService, GuideError, SummaryInput, SummaryResult, SummaryService,
};
use crate::review::state::HunkGroup;
use async_trait::async_trait;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Hunk bodies beyond this many characters are elided from prompts to stay
/// inside token limits on large reviews.
const MAX_HUNK_CHARS: usize = 4_000;

pub struct ClaudeGuide {
    repo_path: PathBuf,
    model: String,
}

impl ClaudeGuide {
    pub fn new(repo_path: impl Into<PathBuf>, model: impl Into<String>) -> Self {
        Self {
            repo_path: repo_path.into(),
            model: model.into(),
        }
    }

    async fn run(&self, prompt: String) -> Result<String, GuideError> {
        let repo = self.repo_path.clone();
        let model = self.model.clone();
        tokio::task::spawn_blocking(move || run_claude(&prompt, &repo, &model))
            .await
            .map_err(|e| GuideError::Service(format!("task join error: {e}")))?
            .map_err(service_error)
    }
}

fn service_error(e: ClassifyError) -> GuideError {
    GuideError::Service(e.to_string())
}

fn clipped(content: &str) -> &str {
    if content.len() <= MAX_HUNK_CHARS {
        return content;
    }
    // Clip on a char boundary at or below the limit.
    let mut end = MAX_HUNK_CHARS;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    &content[..end]
}

#[async_trait]
impl GroupingService for ClaudeGuide {
    async fn generate_grouping(
        &self,
        inputs: &[GroupingInput],
    ) -> Result<Vec<HunkGroup>, GuideError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let mut hunks_section = String::new();
        for input in inputs {
            let labels = if input.label.is_empty() {
                String::new()
            } else {
                format!(" (labels: {})", input.label.join(", "))
            };
            let _ = write!(
                hunks_section,
                "### {} — {}{}\n```diff\n{}\n```\n\n",
                input.id,
                input.file_path,
                labels,
                clipped(&input.content),
            );
        }

        let prompt = format!(
            "You are a code-review assistant. Group these diff hunks by logical concern so a \
             reviewer can work through the changes progressively.\n\n\
             ## Rules\n\n\
             - Group by logical concern, not file order.\n\
             - Each group is a reviewable unit with a short title and a one-sentence description.\n\
             - Every hunk ID must appear in exactly one group.\n\n\
             ## Hunks\n\n{hunks_section}\
             ## Response\n\nReturn a JSON array on its own line:\n\
             [{{\"title\": \"...\", \"description\": \"...\", \"hunkIds\": [\"...\"]}}]"
        );

        let output = self.run(prompt).await?;
        let json = extract_json_str(&output).map_err(service_error)?;
        // Models occasionally return a bare object instead of an array.
        let wrapped;
        let json = if json.starts_with('{') {
            wrapped = format!("[{json}]");
            &wrapped
        } else {
            json
        };
        parse_json(json).map_err(service_error)
    }
}

#[async_trait]
impl SummaryService for ClaudeGuide {
    async fn generate_summary(&self, inputs: &[SummaryInput]) -> Result<SummaryResult, GuideError> {
        if inputs.is_empty() {
            return Ok(SummaryResult {
                title: String::new(),
                summary: String::new(),
            });
        }

        let mut hunks_section = String::new();
        for input in inputs {
            let _ = write!(
                hunks_section,
                "### {}\n```diff\n{}\n```\n\n",
                input.file_path,
                clipped(&input.content),
            );
        }

        let prompt = format!(
            "Summarize this change set for a code reviewer.\n\n\
             ## Changes\n\n{hunks_section}\
             ## Response\n\n\
             First line: a short title (under 10 words).\n\
             Then a blank line, then a bullet-point summary of what changed and why it matters."
        );

        let output = self.run(prompt).await?;
        Ok(parse_summary_output(output.trim()))
    }
}

/// First non-empty line is the title; after a blank separator the rest is
/// the summary. Without a separator the whole output becomes the summary.
fn parse_summary_output(output: &str) -> SummaryResult {
    let mut lines = output.lines();
    let title = lines
        .by_ref()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("")
        .trim();

    let rest: Vec<&str> = lines.collect();
    if rest.first().is_some_and(|line| line.trim().is_empty()) {
        return SummaryResult {
            title: title.to_owned(),
            summary: rest[1..].join("\n").trim().to_owned(),
        };
    }

    SummaryResult {
        title: String::new(),
        summary: output.to_owned(),
    }
}
