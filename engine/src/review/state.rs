//! The persisted review document.
//!
//! One `ReviewState` exists per comparison. The JSON shape here is shared
//! with non-Rust front-ends and the companion CLI, so field names are
//! normative; everything is camelCase on the wire.

use crate::classify::ClassifiedVia;
use crate::diff::parser::short_digest;
use crate::sources::traits::Comparison;
use crate::time::now_iso8601;
use crate::trust::matching::evaluate_trust;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Review decision for one hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Approved,
    Rejected,
    SavedForLater,
}

/// The persisted decision for one hunk key (`path:hash`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HunkState {
    #[serde(default)]
    pub label: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(
        default,
        rename = "classifiedVia",
        skip_serializing_if = "Option::is_none"
    )]
    pub classified_via: Option<ClassifiedVia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ReviewStatus>,
}

impl HunkState {
    /// A hunk counts as classified once it carries labels or reasoning —
    /// including an explicit empty-label result from the AI.
    pub fn is_classified(&self) -> bool {
        !self.label.is_empty() || self.reasoning.is_some()
    }
}

/// A free-form note attached to a line or range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "startLine")]
    pub start_line: u32,
    #[serde(rename = "endLine", skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    pub text: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

impl Annotation {
    pub fn new(file_path: &str, start_line: u32, end_line: Option<u32>, text: &str) -> Self {
        let created_at = now_iso8601();
        let id = short_digest(&format!("{file_path}:{start_line}:{text}:{created_at}"));
        Self {
            id,
            file_path: file_path.to_owned(),
            start_line,
            end_line,
            text: text.to_owned(),
            created_at,
        }
    }
}

/// One derived group of related hunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HunkGroup {
    pub title: String,
    pub description: String,
    #[serde(rename = "hunkIds")]
    pub hunk_ids: Vec<String>,
}

/// Cached guide artifacts (grouping and summary), each stamped with the
/// sorted hunk-id set it was computed over for staleness detection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuideArtifacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<HunkGroup>>,
    #[serde(default, rename = "groupsHunkIds", skip_serializing_if = "Option::is_none")]
    pub groups_hunk_ids: Option<Vec<String>>,
    #[serde(
        default,
        rename = "groupsGeneratedAt",
        skip_serializing_if = "Option::is_none"
    )]
    pub groups_generated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(
        default,
        rename = "summaryHunkIds",
        skip_serializing_if = "Option::is_none"
    )]
    pub summary_hunk_ids: Option<Vec<String>>,
    #[serde(
        default,
        rename = "summaryGeneratedAt",
        skip_serializing_if = "Option::is_none"
    )]
    pub summary_generated_at: Option<String>,
}

/// The versioned review document for one comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewState {
    pub comparison: Comparison,
    #[serde(default)]
    pub hunks: HashMap<String, HunkState>,
    #[serde(default, rename = "trustList")]
    pub trust_list: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default, rename = "autoApproveStaged")]
    pub auto_approve_staged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guide: Option<GuideArtifacts>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
    /// Incremented by exactly one per successful persisted write.
    #[serde(default)]
    pub version: u64,
    #[serde(default, rename = "totalDiffHunks")]
    pub total_diff_hunks: u32,
}

impl ReviewState {
    pub fn new(comparison: Comparison) -> Self {
        let now = now_iso8601();
        Self {
            comparison,
            hunks: HashMap::new(),
            trust_list: Vec::new(),
            notes: String::new(),
            annotations: Vec::new(),
            auto_approve_staged: false,
            guide: None,
            created_at: now.clone(),
            updated_at: now,
            version: 0,
            total_diff_hunks: 0,
        }
    }

    pub fn hunk(&self, hunk_id: &str) -> Option<&HunkState> {
        self.hunks.get(hunk_id)
    }

    pub fn hunk_mut(&mut self, hunk_id: &str) -> &mut HunkState {
        self.hunks.entry(hunk_id.to_owned()).or_default()
    }

    /// Whether a hunk counts as reviewed: an explicit status, or a non-empty
    /// label set fully covered by the trust list (dynamic auto-approval).
    pub fn is_hunk_reviewed(&self, hunk_id: &str) -> bool {
        let Some(state) = self.hunks.get(hunk_id) else {
            return false;
        };
        if state.status.is_some() {
            return true;
        }
        evaluate_trust(&state.label, &self.trust_list).all_trusted
    }

    /// Aggregate progress over the given current hunk ids. Stale keys left
    /// over from earlier diffs of the same comparison are not counted.
    pub fn progress(&self, current_hunk_ids: &[String]) -> ReviewProgress {
        let mut progress = ReviewProgress {
            total: current_hunk_ids.len() as u32,
            ..ReviewProgress::default()
        };

        for id in current_hunk_ids {
            let state = self.hunks.get(id);
            match state.and_then(|s| s.status) {
                Some(ReviewStatus::Approved) => progress.approved += 1,
                Some(ReviewStatus::Rejected) => progress.rejected += 1,
                Some(ReviewStatus::SavedForLater) => progress.saved_for_later += 1,
                None => {
                    let trusted = state.is_some_and(|s| {
                        evaluate_trust(&s.label, &self.trust_list).all_trusted
                    });
                    if trusted {
                        progress.trusted += 1;
                    }
                }
            }
            if self.is_hunk_reviewed(id) {
                progress.reviewed += 1;
            }
        }

        progress
    }

    pub fn to_summary(&self) -> ReviewSummary {
        ReviewSummary {
            key: self.comparison.key.clone(),
            reviewed_hunks: self.hunks.values().filter(|h| h.status.is_some()).count() as u32,
            total_diff_hunks: self.total_diff_hunks,
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        }
    }
}

/// Aggregate review progress for one comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReviewProgress {
    pub total: u32,
    /// Hunks with a status or with fully-trusted labels.
    pub reviewed: u32,
    pub approved: u32,
    pub rejected: u32,
    #[serde(rename = "savedForLater")]
    pub saved_for_later: u32,
    /// Hunks auto-approved by trust coverage alone (no persisted status).
    pub trusted: u32,
}

/// Lightweight listing entry for saved reviews.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub key: String,
    #[serde(rename = "reviewedHunks")]
    pub reviewed_hunks: u32,
    #[serde(rename = "totalDiffHunks")]
    pub total_diff_hunks: u32,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}
