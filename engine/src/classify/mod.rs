pub mod orchestrator;
pub mod static_rules;

pub use orchestrator::{ClassificationOrchestrator, ClassificationProgress};
pub use static_rules::{classify_hunks_static, should_skip_ai};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),
    #[error("Classifier call failed: {0}")]
    Failed(String),
    #[error("Failed to parse classifier response: {0}")]
    Parse(String),
    #[error("Empty response from classifier")]
    EmptyResponse,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Labels plus reasoning assigned to one hunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: Vec<String>,
    pub reasoning: String,
}

/// Outcome of a classification pass over a batch of hunks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifyResponse {
    /// Hunk id -> result, for the hunks the classifier decided about.
    pub classifications: HashMap<String, ClassificationResult>,
    /// Hunk ids not worth sending to the AI at all (heuristically certain
    /// to match no label).
    #[serde(default, rename = "skippedHunkIds", skip_serializing_if = "Vec::is_empty")]
    pub skipped_hunk_ids: Vec<String>,
}

/// How a hunk's labels were produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifiedVia {
    Static,
    Ai,
}

/// Batch and concurrency tuning for AI classification.
#[derive(Debug, Clone)]
pub struct ClassifyOptions {
    pub batch_size: usize,
    pub max_concurrent: usize,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            batch_size: 5,
            max_concurrent: 3,
        }
    }
}

/// The slice of a hunk the AI classifier needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HunkInput {
    pub id: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    pub content: String,
}

/// Invoked once per completed batch with the batch's hunk ids and whatever
/// results it produced (empty on a failed batch).
pub type BatchCallback =
    Arc<dyn Fn(Vec<String>, HashMap<String, ClassificationResult>) + Send + Sync>;

/// The external AI classifier service.
///
/// Implementations own transport, timeouts, and prompt content; the engine
/// only sees classifications, skip markers, and per-batch progress events.
#[async_trait]
pub trait AiClassifier: Send + Sync {
    async fn classify(
        &self,
        hunks: Vec<HunkInput>,
        options: ClassifyOptions,
        on_batch: BatchCallback,
    ) -> Result<ClassifyResponse, ClassifyError>;
}
