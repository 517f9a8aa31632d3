//! Move-pair detection: correlating a deletion-only hunk in one file with an
//! addition-only hunk in another whose changed content is identical.
//!
//! Runs once per diff refresh, not per edit. Detection is best-effort and
//! never blocks a refresh — an undetected move just means two hunks get
//! reviewed separately.

use super::parser::{short_digest, Hunk, LineKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A symmetric relation between a deletion hunk and an addition hunk that
/// represent relocated code. Both members should be reviewed together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovePair {
    #[serde(rename = "sourceHunkId")]
    pub source_hunk_id: String,
    #[serde(rename = "destHunkId")]
    pub dest_hunk_id: String,
    #[serde(rename = "sourceFilePath")]
    pub source_file_path: String,
    #[serde(rename = "destFilePath")]
    pub dest_file_path: String,
}

/// Detect move pairs across `hunks` and set `move_pair_id` on both members.
///
/// A pair requires: identical changed-content hash (context lines excluded),
/// one deletions-only hunk, one additions-only hunk, and different files.
pub fn link_move_pairs(hunks: &mut [Hunk]) -> Vec<MovePair> {
    let mut deletions: HashMap<String, Vec<usize>> = HashMap::new();
    let mut additions: HashMap<String, Vec<usize>> = HashMap::new();

    for (idx, hunk) in hunks.iter().enumerate() {
        match changed_side(hunk) {
            Some(LineKind::Removed) => deletions
                .entry(changed_content_hash(hunk))
                .or_default()
                .push(idx),
            Some(LineKind::Added) => additions
                .entry(changed_content_hash(hunk))
                .or_default()
                .push(idx),
            _ => {}
        }
    }

    let mut pairs = Vec::new();
    for (hash, del_indices) in &deletions {
        let Some(add_indices) = additions.get(hash) else {
            continue;
        };
        for &del in del_indices {
            for &add in add_indices {
                if hunks[del].file_path == hunks[add].file_path {
                    continue;
                }
                pairs.push(MovePair {
                    source_hunk_id: hunks[del].id.clone(),
                    dest_hunk_id: hunks[add].id.clone(),
                    source_file_path: hunks[del].file_path.clone(),
                    dest_file_path: hunks[add].file_path.clone(),
                });
            }
        }
    }

    for pair in &pairs {
        for hunk in hunks.iter_mut() {
            if hunk.id == pair.source_hunk_id {
                hunk.move_pair_id = Some(pair.dest_hunk_id.clone());
            } else if hunk.id == pair.dest_hunk_id {
                hunk.move_pair_id = Some(pair.source_hunk_id.clone());
            }
        }
    }

    pairs
}

/// If every changed line in the hunk is on one side, return that side.
/// Hunks mixing additions and removals (or with no changes) return `None`.
fn changed_side(hunk: &Hunk) -> Option<LineKind> {
    let mut side = None;
    for line in &hunk.lines {
        match line.kind {
            LineKind::Context => {}
            kind => match side {
                None => side = Some(kind),
                Some(existing) if existing == kind => {}
                Some(_) => return None,
            },
        }
    }
    side
}

/// Hash over the changed lines only, so context drift around a moved block
/// does not break the correlation.
fn changed_content_hash(hunk: &Hunk) -> String {
    let changed: Vec<&str> = hunk
        .lines
        .iter()
        .filter(|l| l.kind != LineKind::Context)
        .map(|l| l.content.as_str())
        .collect();
    short_digest(&changed.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::parser::parse_file_diff;

    fn deletion_hunk(path: &str) -> Hunk {
        parse_file_diff("@@ -1,2 +1,0 @@\n-fn moved() {\n-}", path).remove(0)
    }

    fn addition_hunk(path: &str) -> Hunk {
        parse_file_diff("@@ -10,0 +10,2 @@\n+fn moved() {\n+}", path).remove(0)
    }

    #[test]
    fn test_detects_cross_file_move() {
        let mut hunks = vec![deletion_hunk("src/old.rs"), addition_hunk("src/new.rs")];
        let pairs = link_move_pairs(&mut hunks);

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].source_file_path, "src/old.rs");
        assert_eq!(pairs[0].dest_file_path, "src/new.rs");
        assert_eq!(hunks[0].move_pair_id.as_ref(), Some(&hunks[1].id));
        assert_eq!(hunks[1].move_pair_id.as_ref(), Some(&hunks[0].id));
    }

    #[test]
    fn test_same_file_is_not_a_move() {
        let mut hunks = vec![deletion_hunk("src/a.rs"), addition_hunk("src/a.rs")];
        let pairs = link_move_pairs(&mut hunks);
        assert!(pairs.is_empty());
        assert!(hunks.iter().all(|h| h.move_pair_id.is_none()));
    }

    #[test]
    fn test_different_content_is_not_a_move() {
        let mut hunks = vec![
            deletion_hunk("src/old.rs"),
            parse_file_diff("@@ -1,0 +1,1 @@\n+fn other() {}", "src/new.rs").remove(0),
        ];
        assert!(link_move_pairs(&mut hunks).is_empty());
    }

    #[test]
    fn test_mixed_hunk_is_not_a_move_candidate() {
        let mut hunks = vec![
            parse_file_diff("@@ -1,2 +1,2 @@\n-fn moved() {\n+fn changed() {\n }", "src/a.rs")
                .remove(0),
            addition_hunk("src/b.rs"),
        ];
        assert!(link_move_pairs(&mut hunks).is_empty());
    }

    #[test]
    fn test_empty_input() {
        let mut hunks: Vec<Hunk> = Vec::new();
        assert!(link_move_pairs(&mut hunks).is_empty());
    }
}
