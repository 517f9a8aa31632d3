//! The persistence backend: versioned load/save of review documents.
//!
//! `StateBackend` is the seam the engine writes through; `CentralStore` is
//! the file-based reference implementation over the central storage layout.
//!
//! Optimistic concurrency: `save` compares the document's `version` against
//! what is stored. On a match it writes the document with `version + 1` and
//! returns the new version; on a mismatch it rejects with `VersionConflict`
//! and writes nothing. The conflict-retry policy lives in the store, not
//! here.

use super::central::{self, CentralError};
use super::state::{ReviewState, ReviewSummary};
use crate::sources::traits::Comparison;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Version conflict: expected version {expected}, found {found} on disk")]
    VersionConflict { expected: u64, found: u64 },
    #[error("Central storage error: {0}")]
    Central(#[from] CentralError),
}

/// Versioned document storage for one repository.
pub trait StateBackend: Send + Sync {
    /// Load the stored document for a comparison, or `None` if none exists.
    fn load(&self, comparison: &Comparison) -> Result<Option<ReviewState>, StorageError>;

    /// Persist the document and return the newly assigned version.
    /// Rejects with [`StorageError::VersionConflict`] when the stored
    /// version does not match `state.version`.
    fn save(&self, state: &ReviewState) -> Result<u64, StorageError>;
}

/// File-based backend over the central storage layout.
pub struct CentralStore {
    repo_path: PathBuf,
}

impl CentralStore {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    fn reviews_dir(&self) -> Result<PathBuf, StorageError> {
        Ok(central::repo_storage_dir(&self.repo_path)?.join("reviews"))
    }

    fn review_path(&self, comparison_key: &str) -> Result<PathBuf, StorageError> {
        Ok(self
            .reviews_dir()?
            .join(format!("{}.json", sanitize_key(comparison_key))))
    }

    /// List summaries of every saved review, most recently updated first.
    pub fn list_reviews(&self) -> Result<Vec<ReviewSummary>, StorageError> {
        let dir = self.reviews_dir()?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut summaries = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            match read_state(&path) {
                Ok(Some(state)) => summaries.push(state.to_summary()),
                Ok(None) => {}
                Err(e) => log::warn!("[storage] Skipping unreadable {}: {e}", path.display()),
            }
        }

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    /// Delete a saved review. Missing files are not an error.
    pub fn delete_review(&self, comparison: &Comparison) -> Result<(), StorageError> {
        let path = self.review_path(&comparison.key)?;
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Key of the comparison the companion CLI is currently working on.
    pub fn current_comparison(&self) -> Result<Option<Comparison>, StorageError> {
        let marker = central::repo_storage_dir(&self.repo_path)?.join("current");
        if !marker.exists() {
            return Ok(None);
        }
        let key = fs::read_to_string(&marker)?;
        let key = key.trim();
        if key.is_empty() {
            return Ok(None);
        }
        Ok(Some(Comparison::parse_key(key)))
    }

    pub fn set_current_comparison(&self, comparison: &Comparison) -> Result<(), StorageError> {
        let dir = central::repo_storage_dir(&self.repo_path)?;
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("current"), format!("{}\n", comparison.key))?;
        Ok(())
    }
}

impl StateBackend for CentralStore {
    fn load(&self, comparison: &Comparison) -> Result<Option<ReviewState>, StorageError> {
        read_state(&self.review_path(&comparison.key)?)
    }

    fn save(&self, state: &ReviewState) -> Result<u64, StorageError> {
        let dir = self.reviews_dir()?;
        fs::create_dir_all(&dir)?;
        let path = self.review_path(&state.comparison.key)?;

        if let Some(existing) = read_state(&path)? {
            if existing.version != state.version {
                return Err(StorageError::VersionConflict {
                    expected: state.version,
                    found: existing.version,
                });
            }
        }

        let new_version = state.version + 1;
        let mut stamped = state.clone();
        stamped.version = new_version;

        // Atomic write: tmp + rename, so a concurrent reader never sees a
        // partial document.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&stamped)?)?;
        fs::rename(&tmp, &path)?;

        Ok(new_version)
    }
}

fn read_state(path: &Path) -> Result<Option<ReviewState>, StorageError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Comparison keys may contain path separators and other characters that are
/// unsafe in filenames.
fn sanitize_key(key: &str) -> String {
    key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::central::tests::ENV_LOCK;
    use crate::review::state::{HunkState, ReviewStatus};
    use tempfile::TempDir;

    /// Point REVIEW_ENGINE_HOME at a temp dir and create a fake repo.
    /// Caller must hold ENV_LOCK; both TempDirs must stay alive.
    fn setup() -> (TempDir, TempDir, CentralStore) {
        let home = TempDir::new().unwrap();
        std::env::set_var("REVIEW_ENGINE_HOME", home.path());
        let repo = TempDir::new().unwrap();
        let store = CentralStore::new(repo.path());
        (home, repo, store)
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("main..HEAD"), "main..HEAD");
        assert_eq!(sanitize_key("origin/main..HEAD+"), "origin_main..HEAD+");
        assert_eq!(sanitize_key("a:b*c?d"), "a_b_c_d");
    }

    #[test]
    fn test_load_missing_returns_none() {
        let _lock = ENV_LOCK.lock().unwrap();
        let (_home, _repo, store) = setup();
        let loaded = store.load(&Comparison::new("main", "HEAD")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_save_load_round_trip() {
        let _lock = ENV_LOCK.lock().unwrap();
        let (_home, _repo, store) = setup();
        let comparison = Comparison::new("main", "HEAD");

        let mut state = ReviewState::new(comparison.clone());
        state.notes = "round trip".to_owned();
        state.trust_list = vec!["imports:*".to_owned()];
        state.hunks.insert(
            "file.rs:abcd1234".to_owned(),
            HunkState {
                label: vec!["imports:added".to_owned()],
                reasoning: Some("Added import".to_owned()),
                classified_via: None,
                status: Some(ReviewStatus::Approved),
            },
        );

        let v1 = store.save(&state).unwrap();
        assert_eq!(v1, 1);

        let loaded = store.load(&comparison).unwrap().unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.notes, "round trip");
        let hunk = &loaded.hunks["file.rs:abcd1234"];
        assert_eq!(hunk.label, vec!["imports:added".to_owned()]);
        assert_eq!(hunk.status, Some(ReviewStatus::Approved));
    }

    #[test]
    fn test_version_advances_per_save() {
        let _lock = ENV_LOCK.lock().unwrap();
        let (_home, _repo, store) = setup();
        let comparison = Comparison::new("main", "HEAD");

        let state = ReviewState::new(comparison.clone());
        assert_eq!(store.save(&state).unwrap(), 1);

        let mut state = store.load(&comparison).unwrap().unwrap();
        state.notes = "second".to_owned();
        assert_eq!(store.save(&state).unwrap(), 2);
    }

    #[test]
    fn test_stale_version_conflicts() {
        let _lock = ENV_LOCK.lock().unwrap();
        let (_home, _repo, store) = setup();
        let comparison = Comparison::new("main", "HEAD");

        let state = ReviewState::new(comparison.clone());
        store.save(&state).unwrap();

        // A second writer with the same base version loses.
        let err = store.save(&state).unwrap_err();
        match err {
            StorageError::VersionConflict { expected, found } => {
                assert_eq!(expected, 0);
                assert_eq!(found, 1);
            }
            other => panic!("expected VersionConflict, got {other}"),
        }
    }

    #[test]
    fn test_list_reviews_sorted() {
        let _lock = ENV_LOCK.lock().unwrap();
        let (_home, _repo, store) = setup();

        store
            .save(&ReviewState::new(Comparison::new("main", "a")))
            .unwrap();
        store
            .save(&ReviewState::new(Comparison::new("main", "b")))
            .unwrap();

        let reviews = store.list_reviews().unwrap();
        assert_eq!(reviews.len(), 2);
        assert!(reviews[0].updated_at >= reviews[1].updated_at);
    }

    #[test]
    fn test_delete_review() {
        let _lock = ENV_LOCK.lock().unwrap();
        let (_home, _repo, store) = setup();
        let comparison = Comparison::new("main", "HEAD");

        store.save(&ReviewState::new(comparison.clone())).unwrap();
        assert_eq!(store.list_reviews().unwrap().len(), 1);

        store.delete_review(&comparison).unwrap();
        assert!(store.list_reviews().unwrap().is_empty());

        // Deleting again is not an error.
        store.delete_review(&comparison).unwrap();
    }

    #[test]
    fn test_current_comparison_marker() {
        let _lock = ENV_LOCK.lock().unwrap();
        let (_home, _repo, store) = setup();

        assert!(store.current_comparison().unwrap().is_none());

        let comparison = Comparison::with_working_tree("main", "feature");
        store.set_current_comparison(&comparison).unwrap();
        let current = store.current_comparison().unwrap().unwrap();
        assert_eq!(current.key, "main..feature+");
        assert!(current.working_tree);
    }
}
