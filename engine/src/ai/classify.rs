//! AI hunk classification over the Claude CLI.

use super::{extract_json_str, parse_json, run_claude};
use crate::classify::{
    AiClassifier, BatchCallback, ClassificationResult, ClassifyError, ClassifyOptions,
    ClassifyResponse, HunkInput,
};
use crate::trust::patterns::{is_valid_label, load_taxonomy};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Labels the static classifier owns entirely; offering them to the AI only
/// invites hallucinated matches.
const STATIC_ONLY_LABELS: &[&str] = &["formatting:whitespace", "generated:lockfile", "move:code"];

pub struct ClaudeClassifier {
    repo_path: PathBuf,
    model: String,
}

impl ClaudeClassifier {
    pub fn new(repo_path: impl Into<PathBuf>, model: impl Into<String>) -> Self {
        Self {
            repo_path: repo_path.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl AiClassifier for ClaudeClassifier {
    async fn classify(
        &self,
        hunks: Vec<HunkInput>,
        options: ClassifyOptions,
        on_batch: BatchCallback,
    ) -> Result<ClassifyResponse, ClassifyError> {
        if hunks.is_empty() {
            return Ok(ClassifyResponse::default());
        }

        let batches: Vec<Vec<HunkInput>> = hunks
            .chunks(options.batch_size.max(1))
            .map(<[HunkInput]>::to_vec)
            .collect();
        log::info!(
            "[ai] Classifying {} hunks in {} batches (batch_size={}, max_concurrent={})",
            hunks.len(),
            batches.len(),
            options.batch_size,
            options.max_concurrent
        );

        let semaphore = Arc::new(Semaphore::new(options.max_concurrent.max(1)));
        let tasks: Vec<_> = batches
            .into_iter()
            .map(|batch| {
                let semaphore = Arc::clone(&semaphore);
                let on_batch = Arc::clone(&on_batch);
                let repo = self.repo_path.clone();
                let model = self.model.clone();
                tokio::spawn(async move {
                    let _permit = semaphore.acquire().await.expect("semaphore closed unexpectedly");
                    let batch_ids: Vec<String> = batch.iter().map(|h| h.id.clone()).collect();

                    let result = tokio::task::spawn_blocking(move || {
                        classify_batch(&batch, &repo, &model)
                    })
                    .await
                    .map_err(|e| ClassifyError::Failed(format!("task join error: {e}")))
                    .and_then(|r| r);

                    let batch_results = result.as_ref().map(HashMap::clone).unwrap_or_default();
                    on_batch(batch_ids, batch_results);
                    result
                })
            })
            .collect();

        let mut classifications = HashMap::new();
        let mut errors = Vec::new();
        for joined in join_all(tasks).await {
            match joined {
                Ok(Ok(batch_results)) => classifications.extend(batch_results),
                Ok(Err(e)) => errors.push(e.to_string()),
                Err(e) => errors.push(format!("task join error: {e}")),
            }
        }

        // Total failure propagates; partial failure returns what we have.
        if classifications.is_empty() && !errors.is_empty() {
            return Err(ClassifyError::Failed(errors.join("; ")));
        }
        if !errors.is_empty() {
            log::warn!("[ai] {} batch(es) failed: {errors:?}", errors.len());
        }

        Ok(ClassifyResponse {
            classifications,
            skipped_hunk_ids: Vec::new(),
        })
    }
}

fn classify_batch(
    batch: &[HunkInput],
    repo_path: &std::path::Path,
    model: &str,
) -> Result<HashMap<String, ClassificationResult>, ClassifyError> {
    if batch.is_empty() {
        return Ok(HashMap::new());
    }

    if let [hunk] = batch {
        let output = run_claude(&single_hunk_prompt(hunk), repo_path, model)?;
        let result: ClassificationResult = parse_json(extract_json_str(&output)?)?;
        return Ok(HashMap::from([(hunk.id.clone(), validate_labels(result))]));
    }

    let output = run_claude(&batch_prompt(batch), repo_path, model)?;
    let parsed: HashMap<String, ClassificationResult> = parse_json(extract_json_str(&output)?)?;
    Ok(parsed
        .into_iter()
        .map(|(id, result)| (id, validate_labels(result)))
        .collect())
}

/// Drop labels the taxonomy does not define.
fn validate_labels(result: ClassificationResult) -> ClassificationResult {
    let label = result
        .label
        .into_iter()
        .filter(|label| {
            let valid = is_valid_label(label);
            if !valid {
                log::warn!("[ai] Dropping label not in taxonomy: '{label}'");
            }
            valid
        })
        .collect();
    ClassificationResult {
        label,
        reasoning: result.reasoning,
    }
}

/// Flat list of labels the AI is allowed to use, with descriptions.
fn taxonomy_section() -> String {
    let mut section = String::new();
    for category in load_taxonomy() {
        for pattern in category.patterns {
            if STATIC_ONLY_LABELS.contains(&pattern.id.as_str()) {
                continue;
            }
            let _ = writeln!(section, "- `{}`: {}", pattern.id, pattern.description);
        }
    }
    section
}

const RULES: &str = "\
1. DEFAULT TO EMPTY LABELS. Most hunks need human review; label only trivial, mechanical changes.
2. A label applies ONLY when the ENTIRE hunk matches its description.
3. Any change to values, logic, behavior, or configuration = empty labels.
4. Mixed changes (e.g. an import added alongside code changes) = empty labels.
5. Use ONLY the exact label strings listed above.";

fn single_hunk_prompt(hunk: &HunkInput) -> String {
    format!(
        "Determine whether this diff hunk is a trivial, mechanical change a reviewer can safely skip. \
         Apply the matching label if so; otherwise return an empty label array.\n\n\
         # Valid labels\n\n{taxonomy}\n# Rules\n\n{RULES}\n\n\
         # Hunk\n\nFile: {file}\n```diff\n{content}\n```\n\n\
         # Response\n\nReturn JSON on its own line:\n\
         {{\"label\": [], \"reasoning\": \"one sentence\"}}",
        taxonomy = taxonomy_section(),
        file = hunk.file_path,
        content = hunk.content,
    )
}

fn batch_prompt(batch: &[HunkInput]) -> String {
    let mut hunks_section = String::new();
    for (i, hunk) in batch.iter().enumerate() {
        let _ = write!(
            hunks_section,
            "### Hunk {} (ID: {})\nFile: {}\n```diff\n{}\n```\n\n",
            i + 1,
            hunk.id,
            hunk.file_path,
            hunk.content,
        );
    }

    format!(
        "Determine for each diff hunk whether it is a trivial, mechanical change a reviewer can \
         safely skip. Apply the matching label if so; otherwise return an empty label array. \
         You MUST answer for EVERY hunk ID listed.\n\n\
         # Valid labels\n\n{taxonomy}\n# Rules\n\n{RULES}\n\n\
         # Hunks\n\n{hunks_section}\
         # Response\n\nReturn JSON on its own line:\n\
         {{\n  \"<hunk_id>\": {{\"label\": [], \"reasoning\": \"one sentence\"}},\n  ...\n}}",
        taxonomy = taxonomy_section(),
    )
}
