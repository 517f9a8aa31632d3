use crate::diff::parser::Hunk;
use serde::{Deserialize, Serialize};

/// What is being reviewed: a base ref, an optional compare ref, and whether
/// uncommitted working-tree changes are included.
///
/// The canonical `key` (`old..new`, with a trailing `+` when the working tree
/// is included) is used for persistence lookup and equality. A `Comparison`
/// is never mutated in place; switching comparisons replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub old: String,
    pub new: Option<String>,
    #[serde(rename = "workingTree")]
    pub working_tree: bool,
    pub key: String,
}

impl Comparison {
    /// Compare two committed refs (no working-tree changes).
    pub fn new(old: &str, new: &str) -> Self {
        Self {
            old: old.to_owned(),
            new: Some(new.to_owned()),
            working_tree: false,
            key: format!("{old}..{new}"),
        }
    }

    /// Compare a base ref against a branch plus uncommitted changes.
    /// The key carries a `+` suffix to distinguish it from the committed form.
    pub fn with_working_tree(old: &str, branch: &str) -> Self {
        Self {
            old: old.to_owned(),
            new: Some(branch.to_owned()),
            working_tree: true,
            key: format!("{old}..{branch}+"),
        }
    }

    /// Reconstruct a `Comparison` from its canonical key.
    ///
    /// A bare ref (no `..`) means "base against the working tree".
    pub fn parse_key(key: &str) -> Self {
        let working_tree = key.ends_with('+');
        let trimmed = key.trim_end_matches('+');

        if let Some((old, new)) = trimmed.split_once("..") {
            return Self {
                old: old.to_owned(),
                new: if new.is_empty() {
                    None
                } else {
                    Some(new.to_owned())
                },
                working_tree: working_tree || new.is_empty(),
                key: key.to_owned(),
            };
        }

        Self {
            old: trimmed.to_owned(),
            new: None,
            working_tree: true,
            key: key.to_owned(),
        }
    }
}

/// Change status of a file within a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
    Untracked,
}

/// One changed file reported by the diff producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub status: FileStatus,
}

/// Supplier of raw diff data — local git, a forge API, or a test fake.
///
/// The engine never runs git itself; it consumes file lists and parsed hunks
/// through this trait and owns everything downstream of them.
pub trait DiffProducer {
    type Error: std::error::Error;

    /// List the files changed by the comparison.
    fn list_files(&self, comparison: &Comparison) -> Result<Vec<FileEntry>, Self::Error>;

    /// Produce the hunks for one changed file.
    fn file_hunks(&self, path: &str, comparison: &Comparison) -> Result<Vec<Hunk>, Self::Error>;
}
